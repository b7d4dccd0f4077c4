//! センサー → エンコード → 送信 のストリーミングスレッド

use crossbeam_channel::{Receiver, Select};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

use crate::config::{SharedSettings, StreamSettings};
use crate::osc::{encode_skeleton, select_skeletons, OutboundPacket, StreamTransport};
use crate::sensor::{LocatedSensor, SensorSnapshot};

/// 停止フラグを確認する間隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 送信データのテキスト表示先
pub trait TextSink: Send {
    fn show(&mut self, text: &str);
}

/// スケルトン描画（デバッグ用）
pub trait VisualizationSink: Send {
    fn render(&mut self, sensor: &str, snapshot: &SensorSnapshot);
}

/// 1フレーム分の出力
#[derive(Debug, Default)]
pub struct FrameOutput {
    pub packets: Vec<OutboundPacket>,
    pub text: String,
}

/// スナップショット1つをエンコード
///
/// 送信値はグローバル座標。選択（最も近い1人）と百分率モードの
/// 深度画像位置はセンサーからの相対座標で求める。
pub fn encode_frame(
    settings: &StreamSettings,
    sensor: &LocatedSensor,
    snapshot: &SensorSnapshot,
) -> FrameOutput {
    let mut output = FrameOutput::default();
    let captured_at = snapshot.captured_at.unwrap_or_else(SystemTime::now);

    // relative と global は同じ並び
    for (counter, (index, relative)) in (1..).zip(select_skeletons(settings, &snapshot.relative)) {
        let Some(skeleton) = snapshot.global.get(index) else {
            continue;
        };
        let screen = |id| sensor.map_to_depth(&relative.joint(id).position);
        let encoded = encode_skeleton(settings, counter, skeleton, &screen, captured_at);

        output.text.push_str(&encoded.text);
        if let Some(packet) = encoded.packet {
            output.packets.push(packet);
        }
    }
    output
}

/// 送信統計
#[derive(Default)]
pub struct PipelineStats {
    frames: AtomicU64,
    packets_sent: AtomicU64,
    send_failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl PipelineStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    /// 直近の送信エラー（UI表示用）
    pub fn take_last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// 出力先をまとめたもの
pub struct Sinks {
    pub text: Option<Box<dyn TextSink>>,
    pub visualization: Option<Box<dyn VisualizationSink>>,
}

impl Sinks {
    pub fn none() -> Self {
        Self {
            text: None,
            visualization: None,
        }
    }
}

struct Worker {
    sensors: Vec<(Arc<LocatedSensor>, Receiver<Arc<SensorSnapshot>>)>,
    settings: SharedSettings,
    transport: Arc<StreamTransport>,
    sinks: Sinks,
    stats: Arc<PipelineStats>,
    running: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self) {
        while self.running.load(Ordering::Acquire) && !self.sensors.is_empty() {
            let (index, received) = {
                let mut select = Select::new();
                for (_, rx) in &self.sensors {
                    select.recv(rx);
                }
                let Ok(op) = select.select_timeout(POLL_INTERVAL) else {
                    continue;
                };
                let index = op.index();
                (index, op.recv(&self.sensors[index].1))
            };

            match received {
                Ok(snapshot) => self.process(index, &snapshot),
                Err(_) => {
                    // センサー停止
                    let (sensor, _) = self.sensors.remove(index);
                    log::debug!("Sensor {} left the stream", sensor.id());
                }
            }
        }
        log::info!("Streaming worker finished");
    }

    fn process(&mut self, index: usize, snapshot: &SensorSnapshot) {
        let sensor = &self.sensors[index].0;
        // 設定は1フレームの間固定
        let settings = self.settings.current();
        self.stats.frames.fetch_add(1, Ordering::Relaxed);

        if settings.draw_skeleton {
            if let Some(viz) = self.sinks.visualization.as_mut() {
                viz.render(sensor.id(), snapshot);
            }
        }

        let output = encode_frame(&settings, sensor, snapshot);

        if settings.show_data && !output.text.is_empty() {
            if let Some(text) = self.sinks.text.as_mut() {
                text.show(&output.text);
            }
        }

        // 文字列モードは表示専用
        if !settings.osc_enabled || settings.send_as_string {
            return;
        }
        for packet in &output.packets {
            match self.transport.send(packet) {
                Ok(_) => {
                    self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    log::warn!("{}", e);
                    self.stats.send_failures.fetch_add(1, Ordering::Relaxed);
                    *self.stats.last_error.lock().unwrap_or_else(|e| e.into_inner()) =
                        Some(e.to_string());
                }
            }
        }
    }
}

/// ストリーミングスレッド
///
/// 各センサーの最新スナップショットだけを処理する。送信が遅れても
/// センサー側のキューは1つまでで、古いフレームは捨てられる。
pub struct StreamPipeline {
    running: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamPipeline {
    pub fn spawn(
        sensors: &[Arc<LocatedSensor>],
        settings: SharedSettings,
        transport: Arc<StreamTransport>,
        sinks: Sinks,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(PipelineStats::default());
        let worker = Worker {
            sensors: sensors.iter().map(|s| (s.clone(), s.subscribe())).collect(),
            settings,
            transport,
            sinks,
            stats: stats.clone(),
            running: running.clone(),
        };
        let handle = thread::spawn(move || worker.run());
        Self {
            running,
            stats,
            handle: Some(handle),
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// 停止してスレッド終了を待つ
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Streaming worker panicked");
            }
        }
    }
}

impl Drop for StreamPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
