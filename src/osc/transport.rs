use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Mutex;

use super::encoder::OutboundPacket;
use crate::error::{Error, Result};

/// デフォルトの送信先
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// OSC の UDP 送信
///
/// 送信先は `configure` でいつでも差し替えられる。送信は呼び出し時点の
/// 送信先をコピーしてから行うので、途中で変わった値が混ざることはない。
pub struct StreamTransport {
    socket: UdpSocket,
    destination: Mutex<SocketAddr>,
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| Error::malformed("host", format!("{}:{}", host, port)))
}

impl StreamTransport {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let destination = resolve(host, port)?;
        let bind_addr = if destination.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)?;
        // 送信で取り込みを止めない
        socket.set_nonblocking(true)?;
        log::info!("OSC transport ready, sending to {}", destination);
        Ok(Self {
            socket,
            destination: Mutex::new(destination),
        })
    }

    /// 送信先を差し替える。解決できなければ以前の送信先のまま
    pub fn configure(&self, host: &str, port: u16) -> Result<()> {
        let next = resolve(host, port)?;
        let mut guard = self.destination.lock().unwrap_or_else(|e| e.into_inner());
        if *guard != next {
            log::info!("OSC destination changed: {} -> {}", *guard, next);
            *guard = next;
        }
        Ok(())
    }

    /// 現在の送信先
    pub fn destination(&self) -> SocketAddr {
        *self.destination.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 1バンドルを送信。失敗しても再送しない
    pub fn send(&self, packet: &OutboundPacket) -> Result<usize> {
        let data = packet.encode()?;
        let target = self.destination();
        self.socket
            .send_to(&data, target)
            .map_err(Error::TransportSendFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::{decode_head, OutboundMessage};
    use std::time::{Duration, SystemTime};

    fn receiver() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    fn head_packet(x: f64) -> OutboundPacket {
        OutboundPacket {
            timestamp: SystemTime::now(),
            messages: vec![OutboundMessage::floats("/head".to_string(), &[x, 0.0, 0.0])],
        }
    }

    fn recv_head(socket: &UdpSocket) -> Option<[f32; 3]> {
        let mut buf = [0u8; 1536];
        let (n, _) = socket.recv_from(&mut buf).ok()?;
        decode_head(&buf[..n])
    }

    #[test]
    fn test_send_reaches_destination() {
        let (rx, port) = receiver();
        let transport = StreamTransport::new("127.0.0.1", port).unwrap();
        transport.send(&head_packet(1.5)).unwrap();
        assert_eq!(recv_head(&rx), Some([1.5, 0.0, 0.0]));
    }

    #[test]
    fn test_reconfigure_switches_destination() {
        let (old_rx, old_port) = receiver();
        let (new_rx, new_port) = receiver();
        let transport = StreamTransport::new("127.0.0.1", old_port).unwrap();

        transport.send(&head_packet(1.0)).unwrap();
        transport.configure("127.0.0.1", new_port).unwrap();
        assert_eq!(transport.destination().port(), new_port);
        transport.send(&head_packet(2.0)).unwrap();

        assert_eq!(recv_head(&old_rx), Some([1.0, 0.0, 0.0]));
        assert_eq!(recv_head(&new_rx), Some([2.0, 0.0, 0.0]));

        // 旧送信先には2通目が届かない
        old_rx.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
        assert_eq!(recv_head(&old_rx), None);
    }

    #[test]
    fn test_bad_host_keeps_previous_destination() {
        let (_rx, port) = receiver();
        let transport = StreamTransport::new("127.0.0.1", port).unwrap();
        let before = transport.destination();

        let err = transport.configure("no such host.invalid", 9000).unwrap_err();
        assert!(matches!(err, Error::MalformedConfiguration { field: "host", .. }));
        assert_eq!(transport.destination(), before);
    }
}
