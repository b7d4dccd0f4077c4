use super::joint::{JointId, TrackingState};
use super::snapshot::SkeletonSnapshot;

/// 骨格の接続定義 (開始関節, 終了関節)
pub const BONES: [(JointId, JointId); 19] = [
    // 胴体
    (JointId::Head, JointId::ShoulderCenter),
    (JointId::ShoulderCenter, JointId::ShoulderLeft),
    (JointId::ShoulderCenter, JointId::ShoulderRight),
    (JointId::ShoulderCenter, JointId::Spine),
    (JointId::Spine, JointId::HipCenter),
    (JointId::HipCenter, JointId::HipLeft),
    (JointId::HipCenter, JointId::HipRight),
    // 左腕
    (JointId::ShoulderLeft, JointId::ElbowLeft),
    (JointId::ElbowLeft, JointId::WristLeft),
    (JointId::WristLeft, JointId::HandLeft),
    // 右腕
    (JointId::ShoulderRight, JointId::ElbowRight),
    (JointId::ElbowRight, JointId::WristRight),
    (JointId::WristRight, JointId::HandRight),
    // 左脚
    (JointId::HipLeft, JointId::KneeLeft),
    (JointId::KneeLeft, JointId::AnkleLeft),
    (JointId::AnkleLeft, JointId::FootLeft),
    // 右脚
    (JointId::HipRight, JointId::KneeRight),
    (JointId::KneeRight, JointId::AnkleRight),
    (JointId::AnkleRight, JointId::FootRight),
];

/// 骨の描画スタイル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneStyle {
    /// 両端とも Tracked
    Tracked,
    /// 片側が Inferred
    Inferred,
}

/// 骨の描画可否を判定
///
/// どちらかが NotTracked、または両端とも Inferred なら描かない。
pub fn bone_style(a: TrackingState, b: TrackingState) -> Option<BoneStyle> {
    use TrackingState::*;
    match (a, b) {
        (NotTracked, _) | (_, NotTracked) => None,
        (Inferred, Inferred) => None,
        (Tracked, Tracked) => Some(BoneStyle::Tracked),
        _ => Some(BoneStyle::Inferred),
    }
}

/// 描画可能な骨を列挙
pub fn drawable_bones(
    skeleton: &SkeletonSnapshot,
) -> impl Iterator<Item = (JointId, JointId, BoneStyle)> + '_ {
    BONES.iter().filter_map(move |&(a, b)| {
        bone_style(skeleton.joint(a).state, skeleton.joint(b).state).map(|s| (a, b, s))
    })
}
