use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::osc::{AddressMode, DEFAULT_HOST};
use crate::sensor::SensorPose;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub osc: OscConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub animata: AnimataConfig,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OscConfig {
    /// 送信先ホスト
    #[serde(default = "default_host")]
    pub host: String,
    /// 送信先ポート
    #[serde(default = "default_port")]
    pub port: u16,
    /// ベースアドレス（空なら /skeleton{n}/{関節}/{軸} 形式）
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// OSC送信
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 送信内容をテキスト表示
    #[serde(default)]
    pub show_data: bool,
    /// 文字列モード（表示専用、送信しない）
    #[serde(default)]
    pub send_as_string: bool,
    /// スケルトン描画
    #[serde(default)]
    pub draw_skeleton: bool,
    /// 最も近い1人だけ
    #[serde(default)]
    pub track_nearest_only: bool,
    /// 位置を深度画像上の百分率で送る
    #[serde(default = "default_true")]
    pub positions_as_percentage: bool,
    /// 軸ごとに別メッセージ
    #[serde(default)]
    pub send_all_separately: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnimataConfig {
    /// 頭だけを /head に送る Animata 互換モード
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

/// センサーの設置位置（グローバル座標）
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    pub id: String,
    #[serde(default)]
    pub position: [f32; 3],
    /// 正面方向。ゼロベクトルなら回転なし
    #[serde(default = "default_front")]
    pub front: [f32; 3],
}

fn default_host() -> String { DEFAULT_HOST.to_string() }
fn default_port() -> u16 { 7110 }
fn default_true() -> bool { true }
fn default_scale() -> f64 { 1.0 }
fn default_front() -> [f32; 3] { [0.0, 0.0, 1.0] }

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            address: String::new(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_data: false,
            send_as_string: false,
            draw_skeleton: false,
            track_nearest_only: false,
            positions_as_percentage: true,
            send_all_separately: false,
        }
    }
}

impl Default for AnimataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: default_scale(),
        }
    }
}

impl SensorConfig {
    pub fn pose(&self) -> SensorPose {
        SensorPose::new(self.position.into(), self.front.into())
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 読めなければデフォルト
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{} を読めませんでした ({}), デフォルト設定を使用", path.display(), e);
                Self::default()
            }
        }
    }

    /// 設定ファイルに書かれたセンサー位置
    pub fn sensor_pose(&self, id: &str) -> Option<SensorPose> {
        self.sensors.iter().find(|s| s.id == id).map(SensorConfig::pose)
    }

    pub fn settings(&self) -> StreamSettings {
        StreamSettings {
            address_mode: AddressMode::from_base(&self.osc.address),
            osc_enabled: self.stream.enabled,
            show_data: self.stream.show_data,
            send_as_string: self.stream.send_as_string,
            draw_skeleton: self.stream.draw_skeleton,
            track_nearest_only: self.stream.track_nearest_only,
            positions_as_percentage: self.stream.positions_as_percentage,
            send_all_separately: self.stream.send_all_separately,
            animata: self.animata.enabled,
            animata_scale: self.animata.scale,
        }
    }
}

/// パイプライン各段に渡す設定
///
/// 変更時は丸ごと置き換える（共有フラグを個別に書き換えない）。
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub address_mode: AddressMode,
    pub osc_enabled: bool,
    pub show_data: bool,
    pub send_as_string: bool,
    pub draw_skeleton: bool,
    pub track_nearest_only: bool,
    pub positions_as_percentage: bool,
    pub send_all_separately: bool,
    pub animata: bool,
    pub animata_scale: f64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Config::default().settings()
    }
}

impl StreamSettings {
    /// ベースアドレスを設定（先頭に / が無ければ補う）
    pub fn with_address(mut self, address: &str) -> Self {
        self.address_mode = AddressMode::from_base(address);
        self
    }

    /// Animata スケールを文字列から設定
    pub fn with_scale_text(mut self, text: &str) -> crate::error::Result<Self> {
        self.animata_scale = parse_scale(text)?;
        Ok(self)
    }
}

/// ポート番号を解釈
pub fn parse_port(text: &str) -> crate::error::Result<u16> {
    match text.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(Error::malformed("port", text)),
    }
}

/// 正の有限値のみ
pub fn parse_scale(text: &str) -> crate::error::Result<f64> {
    match text.trim().parse::<f64>() {
        Ok(scale) if scale.is_finite() && scale > 0.0 => Ok(scale),
        _ => Err(Error::malformed("animata_scale", text)),
    }
}

/// 設定の共有ハンドル
///
/// 書き手は `update` で新しい値に差し替え、読み手は `current` で
/// その時点の `Arc` を受け取る。
#[derive(Clone, Default)]
pub struct SharedSettings {
    inner: Arc<Mutex<Arc<StreamSettings>>>,
}

impl SharedSettings {
    pub fn new(settings: StreamSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Arc::new(settings))),
        }
    }

    pub fn current(&self) -> Arc<StreamSettings> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 現在値から新しい設定を作って差し替える。失敗時は何も変えない。
    pub fn update<F>(&self, f: F) -> crate::error::Result<()>
    where
        F: FnOnce(StreamSettings) -> crate::error::Result<StreamSettings>,
    {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let next = f((**guard).clone())?;
        *guard = Arc::new(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = StreamSettings::default();
        assert!(settings.osc_enabled);
        assert!(!settings.show_data);
        assert!(!settings.send_as_string);
        assert!(settings.positions_as_percentage);
        assert!(settings.animata);
        assert_eq!(settings.animata_scale, 1.0);
        assert_eq!(settings.address_mode, AddressMode::Templated);
        assert_eq!(Config::default().osc.port, 7110);
        assert_eq!(Config::default().osc.host, DEFAULT_HOST);
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [osc]
            port = 9000
            address = "kinect"

            [stream]
            send_all_separately = true

            [animata]
            enabled = false
            scale = 2.5

            [[sensors]]
            id = "front"
            position = [0.0, 1.0, 0.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.osc.host, "127.0.0.1");
        assert_eq!(config.osc.port, 9000);
        let settings = config.settings();
        assert_eq!(
            settings.address_mode,
            AddressMode::Positional { base: "/kinect".to_string() }
        );
        assert!(settings.send_all_separately);
        assert!(settings.positions_as_percentage);
        assert!(!settings.animata);
        assert_eq!(settings.animata_scale, 2.5);

        let pose = config.sensor_pose("front").unwrap();
        assert_eq!(pose.position.y, 1.0);
        assert_eq!(pose.front.z, 1.0);
        assert!(config.sensor_pose("back").is_none());
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("7110").unwrap(), 7110);
        assert_eq!(parse_port(" 9000 ").unwrap(), 9000);
        assert!(matches!(
            parse_port("seventy"),
            Err(Error::MalformedConfiguration { field: "port", .. })
        ));
        assert!(parse_port("0").is_err());
        assert!(parse_port("70000").is_err());
    }

    #[test]
    fn test_parse_scale() {
        assert_eq!(parse_scale("1.5").unwrap(), 1.5);
        assert!(parse_scale("abc").is_err());
        assert!(parse_scale("-1").is_err());
        assert!(parse_scale("0").is_err());
        assert!(parse_scale("NaN").is_err());
    }

    #[test]
    fn test_shared_settings_rejects_bad_update() {
        let shared = SharedSettings::new(StreamSettings::default());
        let before = shared.current();

        let result = shared.update(|s| s.with_scale_text("big"));
        assert!(result.is_err());
        assert_eq!(shared.current().animata_scale, 1.0);

        shared.update(|s| s.with_scale_text("3")).unwrap();
        assert_eq!(shared.current().animata_scale, 3.0);
        // 以前の Arc は古い値のまま
        assert_eq!(before.animata_scale, 1.0);
    }

    #[test]
    fn test_with_address_normalizes() {
        let s = StreamSettings::default().with_address("foo");
        assert_eq!(s.address_mode, AddressMode::Positional { base: "/foo".to_string() });
        let s = s.with_address("");
        assert_eq!(s.address_mode, AddressMode::Templated);
    }
}
