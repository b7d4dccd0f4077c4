use nalgebra::Vector3;

/// Kinect の 20 関節インデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum JointId {
    HipCenter = 0,
    Spine = 1,
    ShoulderCenter = 2,
    Head = 3,
    ShoulderLeft = 4,
    ElbowLeft = 5,
    WristLeft = 6,
    HandLeft = 7,
    ShoulderRight = 8,
    ElbowRight = 9,
    WristRight = 10,
    HandRight = 11,
    HipLeft = 12,
    KneeLeft = 13,
    AnkleLeft = 14,
    FootLeft = 15,
    HipRight = 16,
    KneeRight = 17,
    AnkleRight = 18,
    FootRight = 19,
}

impl JointId {
    pub const COUNT: usize = 20;

    pub const ALL: [JointId; JointId::COUNT] = [
        Self::HipCenter,
        Self::Spine,
        Self::ShoulderCenter,
        Self::Head,
        Self::ShoulderLeft,
        Self::ElbowLeft,
        Self::WristLeft,
        Self::HandLeft,
        Self::ShoulderRight,
        Self::ElbowRight,
        Self::WristRight,
        Self::HandRight,
        Self::HipLeft,
        Self::KneeLeft,
        Self::AnkleLeft,
        Self::FootLeft,
        Self::HipRight,
        Self::KneeRight,
        Self::AnkleRight,
        Self::FootRight,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// OSCアドレスに埋め込む関節名
    pub fn name(self) -> &'static str {
        match self {
            Self::HipCenter => "HipCenter",
            Self::Spine => "Spine",
            Self::ShoulderCenter => "ShoulderCenter",
            Self::Head => "Head",
            Self::ShoulderLeft => "ShoulderLeft",
            Self::ElbowLeft => "ElbowLeft",
            Self::WristLeft => "WristLeft",
            Self::HandLeft => "HandLeft",
            Self::ShoulderRight => "ShoulderRight",
            Self::ElbowRight => "ElbowRight",
            Self::WristRight => "WristRight",
            Self::HandRight => "HandRight",
            Self::HipLeft => "HipLeft",
            Self::KneeLeft => "KneeLeft",
            Self::AnkleLeft => "AnkleLeft",
            Self::FootLeft => "FootLeft",
            Self::HipRight => "HipRight",
            Self::KneeRight => "KneeRight",
            Self::AnkleRight => "AnkleRight",
            Self::FootRight => "FootRight",
        }
    }
}

/// 関節ごとの追跡状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    Tracked,
    Inferred,
    #[default]
    NotTracked,
}

impl TrackingState {
    /// 描画・送信・計測に使ってよいか
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Tracked | Self::Inferred)
    }
}

/// 単一関節のサンプル（メートル座標）
///
/// `NotTracked` でも位置は入っているが、状態を確認せずに使ってはいけない。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSample {
    pub id: JointId,
    pub position: Vector3<f32>,
    pub state: TrackingState,
}

impl JointSample {
    pub fn new(id: JointId, position: Vector3<f32>, state: TrackingState) -> Self {
        Self { id, position, state }
    }

    /// 原点、未追跡
    pub fn not_tracked(id: JointId) -> Self {
        Self::new(id, Vector3::zeros(), TrackingState::NotTracked)
    }

    pub fn is_tracked(&self) -> bool {
        self.state == TrackingState::Tracked
    }
}
