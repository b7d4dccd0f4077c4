use nalgebra::Vector3;

/// 深度画像の解像度（640x480 固定）
pub const DEPTH_WIDTH: f32 = 640.0;
pub const DEPTH_HEIGHT: f32 = 480.0;

/// 640x480 深度カメラの公称焦点距離（ピクセル）
pub const NOMINAL_FOCAL_LENGTH: f32 = 571.26;

/// 深度画像上の位置（左上原点、ピクセル）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthPoint {
    pub x: f32,
    pub y: f32,
}

impl DepthPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 画像幅・高さに対する百分率
    pub fn percent(&self) -> (f32, f32) {
        (self.x / DEPTH_WIDTH * 100.0, self.y / DEPTH_HEIGHT * 100.0)
    }
}

/// センサー座標の3D点を深度画像へピンホール投影
///
/// カメラの後ろ（z <= 0）や画像の外に落ちる点は None。
/// 画像内なら百分率は 0..=100 に収まる。
pub fn project(point: &Vector3<f32>) -> Option<DepthPoint> {
    if point.z <= f32::EPSILON {
        return None;
    }
    let x = DEPTH_WIDTH / 2.0 + NOMINAL_FOCAL_LENGTH * point.x / point.z;
    // 画像は上が原点なので Y を反転
    let y = DEPTH_HEIGHT / 2.0 - NOMINAL_FOCAL_LENGTH * point.y / point.z;
    let inside = (0.0..=DEPTH_WIDTH).contains(&x) && (0.0..=DEPTH_HEIGHT).contains(&y);
    inside.then(|| DepthPoint::new(x, y))
}
