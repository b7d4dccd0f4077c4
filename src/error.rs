//! Error types for skeleton streaming

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ストリーミングパイプラインのエラー
///
/// フレーム単位のエラー（`FrameDecodeEmpty`, `TransportSendFailure`）は
/// その場で処理され、パイプラインを止めない。
/// 設定エラーだけが呼び出し元に同期的に返る。
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// センサーを開始できなかった（使用中など）
    #[error("Sensor {sensor} unavailable: {reason}")]
    SensorUnavailable { sensor: String, reason: String },

    /// フレームイベントにスケルトンデータが無かった
    #[error("Sensor {sensor} frame {sequence} carried no skeleton data")]
    FrameDecodeEmpty { sensor: String, sequence: u64 },

    /// 送信先に届かなかった / ソケット書き込み失敗
    #[error("Transport send failed: {0}")]
    TransportSendFailure(#[source] std::io::Error),

    /// 数値として解釈できない設定値
    #[error("Malformed configuration for {field}: {value:?}")]
    MalformedConfiguration { field: &'static str, value: String },

    /// OSCエンコード失敗
    #[error("OSC encode error: {0:?}")]
    Encode(rosc::OscError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rosc::OscError> for Error {
    fn from(e: rosc::OscError) -> Self {
        Error::Encode(e)
    }
}

impl Error {
    pub(crate) fn malformed(field: &'static str, value: impl Into<String>) -> Self {
        Error::MalformedConfiguration {
            field,
            value: value.into(),
        }
    }
}
