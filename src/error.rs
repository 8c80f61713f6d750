//! クレート共通のエラー型

use std::fmt;

#[derive(Debug)]
pub enum SignError {
    /// フレームのペイロードが壊れている（フレーム単位で回復）
    TransportDecode(String),
    /// 重み・ラベル表の欠損、破損、形状不一致（起動時に致命的）
    ModelLoad(String),
    /// 推論中の失敗（空ラベルとして回復）
    Prediction(String),
    /// サンプル長の不一致や空のラベルディレクトリ（学習を中断）
    DatasetInconsistency(String),
    /// 検出器の失敗（セッションを閉じる）
    Detector(String),
    /// 設定値が不正
    InvalidConfig(String),
    Io(std::io::Error),
}

pub type Result<T, E = SignError> = std::result::Result<T, E>;

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignError::TransportDecode(msg) => write!(f, "malformed frame: {msg}"),
            SignError::ModelLoad(msg) => write!(f, "model load failed: {msg}"),
            SignError::Prediction(msg) => write!(f, "prediction failed: {msg}"),
            SignError::DatasetInconsistency(msg) => write!(f, "inconsistent dataset: {msg}"),
            SignError::Detector(msg) => write!(f, "detector failed: {msg}"),
            SignError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            SignError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for SignError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SignError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SignError {
    fn from(e: std::io::Error) -> Self {
        SignError::Io(e)
    }
}
