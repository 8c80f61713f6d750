use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use tokio::net::TcpListener;

use crate::analyzer::LandmarkEncoder;
use crate::cli::SubCommandExtend;
use crate::detector::{DetectorFactory, NoHandDetectorFactory, ReplayDetectorFactory};
use crate::ml::GestureClassifier;
use crate::model::{print_metadata_info, AppConfig};
use crate::server;

/// 使用する手検出器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DetectorKind {
    /// 常に「手なし」
    #[default]
    None,
    /// 記録済みの検出結果を再生
    Replay,
}

#[derive(Parser, Debug, Clone)]
pub struct ServeCommand {
    /// 待ち受けアドレス
    #[arg(long)]
    pub addr: Option<String>,
    /// モデルアーカイブのパス
    #[arg(long)]
    pub model: Option<PathBuf>,
    /// 同時セッション数の上限
    #[arg(long)]
    pub max_sessions: Option<usize>,
    /// 手検出器
    #[arg(long, value_enum, default_value_t = DetectorKind::None)]
    pub detector: DetectorKind,
    /// `replay` 検出器が読み込む JSON
    #[arg(long, required_if_eq("detector", "replay"))]
    pub replay_file: Option<PathBuf>,
}

impl ServeCommand {
    fn detector_factory(&self) -> anyhow::Result<Arc<dyn DetectorFactory>> {
        Ok(match self.detector {
            DetectorKind::None => Arc::new(NoHandDetectorFactory),
            DetectorKind::Replay => {
                let path = self
                    .replay_file
                    .as_ref()
                    .context("--replay-file is required for the replay detector")?;
                let factory = ReplayDetectorFactory::from_json_file(path)?;
                info!("{} フレーム分の検出結果を読み込みました", factory.len());
                Arc::new(factory)
            }
        })
    }
}

impl SubCommandExtend for ServeCommand {
    #[tokio::main]
    async fn run(&self, config: &AppConfig) -> anyhow::Result<()> {
        let mut settings = config.server.clone();
        if let Some(addr) = &self.addr {
            settings.addr = addr.clone();
        }
        if let Some(max_sessions) = self.max_sessions {
            settings.max_sessions = max_sessions;
        }
        let model_path = self
            .model
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.model.model_path));

        let classifier = GestureClassifier::load(&model_path)?;
        print_metadata_info(classifier.metadata(), classifier.labels());

        // 手の数はモデルに合わせる
        if config.model.max_hands != classifier.max_hands() {
            warn!(
                "設定の max_hands ({}) はモデル ({}) と異なります。モデルの値を使用します",
                config.model.max_hands,
                classifier.max_hands()
            );
        }
        let encoder = LandmarkEncoder::new(classifier.max_hands())?;
        let state = server::AppState::new(classifier, self.detector_factory()?, encoder, settings.clone())?;
        info!("検出器: {}", state.detector_name());

        let app = server::create_app(state);

        info!("starting server at http://{}", &settings.addr);
        let listener = TcpListener::bind(&settings.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
