use rosc::{decoder, OscPacket, OscType};

pub const HEAD_ADDRESS: &str = "/head";

/// 受信側: `/head` メッセージから頭の位置を取り出す
///
/// 引数がちょうど3個の float の場合のみ。バンドル内も探す。
pub fn decode_head(datagram: &[u8]) -> Option<[f32; 3]> {
    let (_, packet) = decoder::decode_udp(datagram).ok()?;
    find_head(&packet)
}

fn find_head(packet: &OscPacket) -> Option<[f32; 3]> {
    match packet {
        OscPacket::Message(msg) if msg.addr == HEAD_ADDRESS => match msg.args.as_slice() {
            [OscType::Float(x), OscType::Float(y), OscType::Float(z)] => Some([*x, *y, *z]),
            _ => None,
        },
        OscPacket::Message(_) => None,
        OscPacket::Bundle(bundle) => bundle.content.iter().find_map(find_head),
    }
}
