use nalgebra::{Isometry3, Point3, Vector3};

use super::joint::{JointId, JointSample, TrackingState};

/// スケルトン全体の追跡状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkeletonTrackingState {
    Tracked,
    PositionOnly,
    #[default]
    NotTracked,
}

/// フレーム境界で切れている辺
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClippedEdges(u8);

impl ClippedEdges {
    pub const NONE: Self = Self(0);
    pub const TOP: Self = Self(1 << 0);
    pub const BOTTOM: Self = Self(1 << 1);
    pub const LEFT: Self = Self(1 << 2);
    pub const RIGHT: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ClippedEdges {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 1フレーム・1人分のスケルトン
///
/// 生成後は変更しない。次フレームで丸ごと置き換わる。
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonSnapshot {
    pub tracking_id: i32,
    pub state: SkeletonTrackingState,
    /// スケルトン中心位置
    pub position: Vector3<f32>,
    pub joints: [JointSample; JointId::COUNT],
    pub clipped_edges: ClippedEdges,
}

impl SkeletonSnapshot {
    pub fn new(
        tracking_id: i32,
        state: SkeletonTrackingState,
        position: Vector3<f32>,
        joints: [JointSample; JointId::COUNT],
    ) -> Self {
        Self {
            tracking_id,
            state,
            position,
            joints,
            clipped_edges: ClippedEdges::NONE,
        }
    }

    /// 全関節が未追跡の空スケルトン
    pub fn empty(tracking_id: i32) -> Self {
        Self::new(
            tracking_id,
            SkeletonTrackingState::NotTracked,
            Vector3::zeros(),
            JointId::ALL.map(JointSample::not_tracked),
        )
    }

    pub fn with_clipped_edges(mut self, edges: ClippedEdges) -> Self {
        self.clipped_edges = edges;
        self
    }

    /// 関節IDで取得
    pub fn joint(&self, id: JointId) -> &JointSample {
        &self.joints[id as usize]
    }

    pub fn set_joint(&mut self, id: JointId, position: Vector3<f32>, state: TrackingState) {
        self.joints[id as usize] = JointSample::new(id, position, state);
    }

    /// 描画・送信に使える関節
    pub fn usable_joints(&self) -> impl Iterator<Item = &JointSample> {
        self.joints.iter().filter(|j| j.state.is_usable())
    }

    /// 剛体変換を全関節とスケルトン中心に適用
    ///
    /// 追跡状態とクリップ情報はそのまま引き継ぐ。
    pub fn transformed(&self, iso: &Isometry3<f32>) -> Self {
        let apply = |v: &Vector3<f32>| (iso * Point3::from(*v)).coords;
        Self {
            tracking_id: self.tracking_id,
            state: self.state,
            position: apply(&self.position),
            joints: self
                .joints
                .map(|j| JointSample::new(j.id, apply(&j.position), j.state)),
            clipped_edges: self.clipped_edges,
        }
    }
}
