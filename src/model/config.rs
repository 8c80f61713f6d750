//! アプリケーション設定管理モジュール
//!
//! 学習デバイスやモデル・学習・サーバー設定をJSON形式で保存・読み込みします。

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analyzer::DEFAULT_FRAME_INTERVAL_MS;

/// 学習に使う計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DeviceType {
    /// NdArray (CPU) バックエンド
    #[default]
    Cpu,
    /// WGPU (GPU) バックエンド（`wgpu` フィーチャーが必要）
    Wgpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// 使用するモデルアーカイブのパス
    pub model_path: String,
    /// エンコードする最大の手の数（1 または 2）
    pub max_hands: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/sign_classifier.tar.gz".to_string(),
            max_hands: 2,
        }
    }
}

/// トレーニング設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// エポック数
    pub num_epochs: usize,
    /// バッチサイズ
    pub batch_size: usize,
    /// 学習率
    pub learning_rate: f64,
    /// シャッフル用のランダムシード
    pub seed: u64,
    /// サンプルストアのルート（ラベルごとのディレクトリを含む）
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: String,
}

fn default_dataset_dir() -> String {
    "dataset".to_string()
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            num_epochs: 40,
            batch_size: 32,
            learning_rate: 1e-3,
            seed: 42,
            dataset_dir: default_dataset_dir(),
        }
    }
}

/// 推論サーバー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// 待ち受けアドレス
    pub addr: String,
    /// 同時に受け付けるセッション数の上限
    pub max_sessions: usize,
    /// セッションクロックの1フレーム間隔（ms）
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_frame_interval_ms() -> u64 {
    DEFAULT_FRAME_INTERVAL_MS
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
            max_sessions: 8,
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 学習デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// トレーニング設定
    #[serde(default)]
    pub training: TrainingSettings,
    /// サーバー設定
    #[serde(default)]
    pub server: ServerSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("sign_stream.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 指定パスから設定を読み込む、存在しない・壊れている場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定情報をログに出力
    pub fn display(&self) {
        info!("=== アプリケーション設定 ===");
        info!("計算デバイス: {}", self.device_type);
        info!("モデルパス: {}", self.model.model_path);
        info!("最大の手の数: {}", self.model.max_hands);
        info!("--- トレーニング設定 ---");
        info!("データセット: {}", self.training.dataset_dir);
        info!("エポック数: {}", self.training.num_epochs);
        info!("バッチサイズ: {}", self.training.batch_size);
        info!("学習率: {}", self.training.learning_rate);
        info!("シード: {}", self.training.seed);
        info!("--- サーバー設定 ---");
        info!("アドレス: {}", self.server.addr);
        info!("最大セッション数: {}", self.server.max_sessions);
        info!("フレーム間隔: {}ms", self.server.frame_interval_ms);
        info!("========================");
    }
}
