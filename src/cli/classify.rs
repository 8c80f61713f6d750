use std::path::PathBuf;

use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::ml::GestureClassifier;
use crate::model::AppConfig;
use crate::sample_store::SampleStore;

#[derive(Parser, Debug, Clone)]
pub struct ClassifyCommand {
    /// モデルアーカイブ（省略時は設定ファイルの値）
    #[arg(long)]
    pub model: Option<PathBuf>,
    /// 分類する `.npy` 特徴ベクトル
    #[arg(required = true)]
    pub samples: Vec<PathBuf>,
}

impl SubCommandExtend for ClassifyCommand {
    fn run(&self, config: &AppConfig) -> anyhow::Result<()> {
        let path = self
            .model
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.model.model_path));
        let classifier = GestureClassifier::load(&path)?;

        for sample in &self.samples {
            let features = SampleStore::load_sample(sample)?;
            println!("{}\t{}", sample.display(), classifier.predict(&features));
        }
        Ok(())
    }
}
