use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use super::source::{FrameEvent, FrameHandler, SensorFrameSource, SkeletonFrame, SubscriptionId};
use crate::error::{Error, Result};
use crate::skeleton::SkeletonSnapshot;

/// プロセス内から `push` でフレームを流すセンサー
///
/// テストとフロントエンドの試験送信で使う。
/// ハンドラは `push` を呼んだスレッドで同期的に呼ばれる。
pub struct ManualSensor {
    id: String,
    available: bool,
    running: AtomicBool,
    sequence: AtomicU64,
    next_subscription: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, FrameHandler)>>,
}

impl ManualSensor {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            available: true,
            running: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            next_subscription: AtomicU64::new(0),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// 開始に失敗するセンサー（他プロセスが使用中など）
    pub fn unavailable(id: &str) -> Self {
        Self {
            available: false,
            ..Self::new(id)
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 停止中は何もしない
    pub fn push(&self, event: FrameEvent) {
        if !self.is_running() {
            return;
        }
        let handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handler) in handlers.iter() {
            handler(&event);
        }
    }

    /// スケルトンフレームを流す。戻り値はフレーム番号
    pub fn push_skeletons(&self, skeletons: Vec<SkeletonSnapshot>) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        self.push(FrameEvent::Skeleton(SkeletonFrame {
            sequence,
            captured_at: SystemTime::now(),
            skeletons: Some(skeletons),
        }));
        sequence
    }

    /// ペイロード無しのフレーム
    pub fn push_empty(&self) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        self.push(FrameEvent::Skeleton(SkeletonFrame {
            sequence,
            captured_at: SystemTime::now(),
            skeletons: None,
        }));
        sequence
    }
}

impl SensorFrameSource for ManualSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&self) -> Result<()> {
        if !self.available {
            return Err(Error::SensorUnavailable {
                sensor: self.id.clone(),
                reason: "device in use".to_string(),
            });
        }
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn subscribe(&self, handler: FrameHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::AcqRel));
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(sid, _)| *sid != id);
    }
}
