use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use super::depth::DepthPoint;
use super::source::{FrameEvent, SensorFrameSource, SkeletonFrame, SubscriptionId};
use crate::skeleton::SkeletonSnapshot;

/// センサーの設置姿勢（グローバル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPose {
    pub position: Vector3<f32>,
    /// センサーの正面（ローカル +Z）が向く方向
    pub front: Vector3<f32>,
}

impl SensorPose {
    pub fn new(position: Vector3<f32>, front: Vector3<f32>) -> Self {
        Self { position, front }
    }

    /// 回転（正面方向から）→ 並進 の剛体変換
    pub fn isometry(&self) -> Isometry3<f32> {
        let rotation = if self.front.norm() <= f32::EPSILON {
            UnitQuaternion::identity()
        } else {
            // 真後ろ向きは回転軸が決まらないので Y 軸まわりに半回転
            UnitQuaternion::rotation_between(&Vector3::z(), &self.front).unwrap_or_else(|| {
                UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::PI)
            })
        };
        Isometry3::from_parts(Translation3::from(self.position), rotation)
    }
}

/// センサーの最新スケルトン（相対・グローバル）
///
/// 両方とも同じフレームから作られ、まとめて差し替わる。
#[derive(Debug, Clone, Default)]
pub struct SensorSnapshot {
    pub sequence: u64,
    pub captured_at: Option<SystemTime>,
    pub relative: Vec<SkeletonSnapshot>,
    pub global: Vec<SkeletonSnapshot>,
}

struct SensorState {
    snapshot: Arc<SensorSnapshot>,
    stopped: bool,
    subscribers: Vec<(Sender<Arc<SensorSnapshot>>, Receiver<Arc<SensorSnapshot>>)>,
}

struct Shared {
    id: String,
    transform: Option<Isometry3<f32>>,
    state: Mutex<SensorState>,
    frame_id: AtomicU64,
}

impl Shared {
    fn on_event(&self, event: &FrameEvent) {
        if let FrameEvent::Skeleton(frame) = event {
            self.apply(frame);
        }
    }

    /// 新フレームを変換して公開
    fn apply(&self, frame: &SkeletonFrame) {
        let Some(relative) = frame.skeletons.as_ref() else {
            // 前回の値を残す
            log::debug!(
                "{}",
                crate::error::Error::FrameDecodeEmpty {
                    sensor: self.id.clone(),
                    sequence: frame.sequence,
                }
            );
            return;
        };

        let global = match &self.transform {
            Some(iso) => relative.iter().map(|s| s.transformed(iso)).collect(),
            None => relative.clone(),
        };
        let snapshot = Arc::new(SensorSnapshot {
            sequence: frame.sequence,
            captured_at: Some(frame.captured_at),
            relative: relative.clone(),
            global,
        });

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.stopped {
            return;
        }
        state.snapshot = snapshot.clone();
        self.frame_id.fetch_add(1, Ordering::Release);

        // 最新優先: 溜まっている古いスナップショットは捨てる
        state.subscribers.retain(|(tx, rx)| match tx.try_send(snapshot.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(latest)) => {
                let _ = rx.try_recv();
                !matches!(tx.try_send(latest), Err(TrySendError::Disconnected(_)))
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

/// 設置位置を持つセンサー
///
/// 自分のセンサーのコールバックだけが状態を書き換え、
/// 他は `snapshot()` で公開済みの値を読むだけ。
pub struct LocatedSensor {
    source: Arc<dyn SensorFrameSource>,
    pose: Option<SensorPose>,
    shared: Arc<Shared>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl LocatedSensor {
    /// pose が None なら グローバル = 相対（単一センサー構成）
    pub fn new(source: Arc<dyn SensorFrameSource>, pose: Option<SensorPose>) -> Self {
        let shared = Arc::new(Shared {
            id: source.id().to_string(),
            transform: pose.as_ref().map(SensorPose::isometry),
            state: Mutex::new(SensorState {
                snapshot: Arc::new(SensorSnapshot::default()),
                stopped: false,
                subscribers: Vec::new(),
            }),
            frame_id: AtomicU64::new(0),
        });

        let handler_shared = shared.clone();
        let id = source.subscribe(Arc::new(move |event: &FrameEvent| {
            handler_shared.on_event(event)
        }));

        Self {
            source,
            pose,
            shared,
            subscription: Mutex::new(Some(id)),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn pose(&self) -> Option<&SensorPose> {
        self.pose.as_ref()
    }

    /// 最新のスナップショット。初回フレーム前は空
    pub fn snapshot(&self) -> Arc<SensorSnapshot> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot
            .clone()
    }

    /// 公開回数。新しいスナップショットが出るたびに増える
    pub fn frame_id(&self) -> u64 {
        self.shared.frame_id.load(Ordering::Acquire)
    }

    /// 新しいスナップショットの通知を受け取る（容量1、最新優先）
    pub fn subscribe(&self) -> Receiver<Arc<SensorSnapshot>> {
        let (tx, rx) = bounded(1);
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.stopped {
            state.subscribers.push((tx, rx.clone()));
        }
        rx
    }

    pub fn map_to_depth(&self, point: &Vector3<f32>) -> Option<DepthPoint> {
        self.source.map_to_depth(point)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner()).stopped
    }

    /// 停止。何度呼んでもよい
    ///
    /// 戻った後はこのセンサーの状態は書き換わらない。
    pub fn stop(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(id) = subscription else {
            return;
        };
        self.source.unsubscribe(id);
        {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            state.stopped = true;
            // 送信側を落として購読者に終了を伝える
            state.subscribers.clear();
        }
        self.source.stop();
        log::info!("Sensor {} stopped", self.shared.id);
    }
}

impl Drop for LocatedSensor {
    fn drop(&mut self) {
        self.stop();
    }
}
