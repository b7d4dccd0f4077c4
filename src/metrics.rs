//! スケルトンからの計測値（関節間距離・身長推定）

use crate::skeleton::{JointId, JointSample, SkeletonSnapshot, TrackingState};

/// 頭頂と Head 関節の差を補う経験的な補正値（メートル）
pub const HEAD_DIVERGENCE: f32 = 0.1;

const TORSO_CHAIN: [JointId; 4] = [
    JointId::Head,
    JointId::ShoulderCenter,
    JointId::Spine,
    JointId::HipCenter,
];
const LEFT_LEG_CHAIN: [JointId; 4] = [
    JointId::HipLeft,
    JointId::KneeLeft,
    JointId::AnkleLeft,
    JointId::FootLeft,
];
const RIGHT_LEG_CHAIN: [JointId; 4] = [
    JointId::HipRight,
    JointId::KneeRight,
    JointId::AnkleRight,
    JointId::FootRight,
];

/// 2関節間のユークリッド距離。追跡状態は見ない。
pub fn joint_distance(a: &JointSample, b: &JointSample) -> f32 {
    (a.position - b.position).norm()
}

/// 連続する関節間距離の合計
pub fn chain_length(joints: &[&JointSample]) -> f32 {
    joints
        .windows(2)
        .map(|pair| joint_distance(pair[0], pair[1]))
        .sum()
}

/// Tracked の関節数（Inferred は数えない）
pub fn tracked_count(joints: &[&JointSample]) -> usize {
    joints.iter().filter(|j| j.state == TrackingState::Tracked).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Left,
    Right,
}

/// 身長推定の結果と、その根拠になった追跡数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightEstimate {
    pub meters: f32,
    pub leg: Leg,
    pub left_tracked: usize,
    pub right_tracked: usize,
}

impl HeightEstimate {
    /// どちらかの脚で2関節以上 Tracked なら信頼できる
    pub fn is_reliable(&self) -> bool {
        self.left_tracked.max(self.right_tracked) >= 2
    }
}

fn chain<'a>(skeleton: &'a SkeletonSnapshot, ids: &[JointId; 4]) -> [&'a JointSample; 4] {
    ids.map(|id| skeleton.joint(id))
}

/// 身長推定（詳細付き）
///
/// Tracked 関節が多い方の脚を使う。同数なら右脚。
/// この同数時の選択は意図が確認されていない挙動だが、互換のため維持する。
pub fn estimate_height_detailed(skeleton: &SkeletonSnapshot) -> HeightEstimate {
    let left = chain(skeleton, &LEFT_LEG_CHAIN);
    let right = chain(skeleton, &RIGHT_LEG_CHAIN);
    let left_tracked = tracked_count(&left);
    let right_tracked = tracked_count(&right);

    let (leg, leg_length) = if left_tracked > right_tracked {
        (Leg::Left, chain_length(&left))
    } else {
        (Leg::Right, chain_length(&right))
    };

    let torso = chain(skeleton, &TORSO_CHAIN);
    HeightEstimate {
        meters: chain_length(&torso) + leg_length + HEAD_DIVERGENCE,
        leg,
        left_tracked,
        right_tracked,
    }
}

/// 推定身長（メートル）
///
/// 追跡状態に関係なく常に値を返す。全関節 NotTracked でも落ちないが、
/// 値の信頼性は [`HeightEstimate::is_reliable`] か
/// [`estimate_height_checked`] で呼び出し側が判断する。
pub fn estimate_height(skeleton: &SkeletonSnapshot) -> f32 {
    estimate_height_detailed(skeleton).meters
}

/// 使用する関節に NotTracked が含まれていれば None
pub fn estimate_height_checked(skeleton: &SkeletonSnapshot) -> Option<HeightEstimate> {
    let estimate = estimate_height_detailed(skeleton);
    let leg_chain = match estimate.leg {
        Leg::Left => &LEFT_LEG_CHAIN,
        Leg::Right => &RIGHT_LEG_CHAIN,
    };
    let usable = TORSO_CHAIN
        .iter()
        .chain(leg_chain.iter())
        .all(|&id| skeleton.joint(id).state.is_usable());
    usable.then_some(estimate)
}
