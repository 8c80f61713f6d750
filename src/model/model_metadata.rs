//! モデルメタデータの定義と永続化
//!
//! tar.gz形式でモデルと関連するメタデータを保存・読み込みします。
//!
//! ## 入力ベクトルの仕様
//! - 1つの手 = 21ランドマーク × (x, y, z) = 63要素
//! - 入力サイズ = 63 × max_hands（片手 63、両手 126）
//! - 両手の場合は [Left 63要素][Right 63要素] の順

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - labels.json: ラベル表（`{"0": "HELLO", ...}`）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// 特徴ベクトル長（モデルの入力サイズ）
    pub input_size: usize,

    /// エンコード時の最大の手の数（1 または 2）
    pub max_hands: usize,

    /// 隠れ層のユニット数
    pub hidden_sizes: [usize; 2],

    /// 出力クラス数（labels.json のエントリ数と一致する）
    pub num_classes: usize,

    /// 学習エポック数
    pub num_epochs: usize,

    /// バッチサイズ
    pub batch_size: usize,

    /// 学習率
    pub learning_rate: f64,

    /// 最終エポックの平均損失
    #[serde(default)]
    pub final_loss: Option<f64>,

    /// 学習に使ったサンプル数
    #[serde(default)]
    pub num_samples: usize,

    /// モデルの学習時刻（ISO8601形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(
        input_size: usize,
        max_hands: usize,
        hidden_sizes: [usize; 2],
        num_classes: usize,
        num_epochs: usize,
        batch_size: usize,
        learning_rate: f64,
    ) -> Self {
        let trained_at = chrono::Local::now().to_rfc3339();

        Self {
            input_size,
            max_hands,
            hidden_sizes,
            num_classes,
            num_epochs,
            batch_size,
            learning_rate,
            final_loss: None,
            num_samples: 0,
            trained_at,
        }
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}
