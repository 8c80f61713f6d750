//! 手話ジェスチャー認識
//!
//! - `analyzer`: 手ランドマークの特徴ベクトル化とセッションクロック
//! - `detector`: 外部の手検出器との境界
//! - `ml`: 分類モデル、学習、推論
//! - `model`: 設定、ラベル表、モデルアーカイブ
//! - `sample_store`: 学習サンプルの保存先
//! - `server`: WebSocket による推論セッション

pub mod analyzer;
pub mod cli;
pub mod detector;
pub mod error;
pub mod ml;
pub mod model;
pub mod sample_store;
pub mod server;
pub mod types;

pub use error::{Result, SignError};
