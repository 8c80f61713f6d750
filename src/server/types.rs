use serde::{Deserialize, Serialize};

/// 1フレーム分のリクエスト
///
/// `frame` は `data:image/jpeg;base64,<データ>` のようなデータURI。
/// 最初のカンマより前は無視されます。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRequest {
    pub frame: String,
}

/// 1フレーム分のレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameResponse {
    /// 予測ラベル。手なし・失敗時は空文字列
    pub text: String,
    /// フレームを処理できなかった場合の理由
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameResponse {
    pub fn label(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self::label(String::new())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            error: Some(message.into()),
        }
    }
}

/// ヘルスチェックのレスポンス
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub model_loaded: bool,
}
