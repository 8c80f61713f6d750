use std::path::PathBuf;

use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::model::{load_model_with_metadata, print_metadata_info, AppConfig};

#[derive(Parser, Debug, Clone)]
pub struct InspectCommand {
    /// モデルアーカイブ（省略時は設定ファイルの値）
    pub model: Option<PathBuf>,
    /// JSON で標準出力に書き出す
    #[arg(long)]
    pub json: bool,
}

impl SubCommandExtend for InspectCommand {
    fn run(&self, config: &AppConfig) -> anyhow::Result<()> {
        let path = self
            .model
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.model.model_path));
        let artifact = load_model_with_metadata(&path)?;

        if self.json {
            let value = serde_json::json!({
                "metadata": artifact.metadata,
                "labels": artifact.labels,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            print_metadata_info(&artifact.metadata, &artifact.labels);
        }
        Ok(())
    }
}
