//! センサー入力の契約
//!
//! 実機ドライバはこのトレイトを実装する。コアはハードウェアに依存しない。

use nalgebra::Vector3;
use std::sync::Arc;
use std::time::SystemTime;

use super::depth::{self, DepthPoint};
use crate::error::Result;
use crate::skeleton::SkeletonSnapshot;

/// スケルトンフレーム
#[derive(Debug, Clone)]
pub struct SkeletonFrame {
    pub sequence: u64,
    pub captured_at: SystemTime,
    /// None はデコード失敗（ペイロード無し）
    pub skeletons: Option<Vec<SkeletonSnapshot>>,
}

/// カラーフレーム（BGR32）。描画専用
#[derive(Debug, Clone)]
pub struct ColorFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum FrameEvent {
    Skeleton(SkeletonFrame),
    Color(ColorFrame),
}

pub type FrameHandler = Arc<dyn Fn(&FrameEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// 1台の物理センサー
pub trait SensorFrameSource: Send + Sync {
    fn id(&self) -> &str;

    /// 開始。使用中などで失敗したら `Error::SensorUnavailable`
    fn start(&self) -> Result<()>;

    /// 停止。複数回呼んでもよい
    fn stop(&self);

    /// フレームイベントの購読。ハンドラはセンサーのスレッドから呼ばれる
    fn subscribe(&self, handler: FrameHandler) -> SubscriptionId;

    /// 戻った時点でハンドラはもう呼ばれない
    fn unsubscribe(&self, id: SubscriptionId);

    /// センサー座標の点を 640x480 深度画像へ写像
    fn map_to_depth(&self, point: &Vector3<f32>) -> Option<DepthPoint> {
        depth::project(point)
    }
}

/// 接続中センサーの列挙
pub trait SensorBackend {
    fn connected_sensors(&self) -> Vec<Arc<dyn SensorFrameSource>>;
}
