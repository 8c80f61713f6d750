use std::path::PathBuf;

use clap::Parser;

use crate::analyzer::LandmarkEncoder;
use crate::cli::SubCommandExtend;
use crate::ml::train_from_directory;
use crate::model::{AppConfig, DeviceType};

#[derive(Parser, Debug, Clone)]
pub struct TrainCommand {
    /// サンプルストアのルート
    #[arg(long)]
    pub dataset: Option<PathBuf>,
    /// 出力するモデルアーカイブ
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// エポック数
    #[arg(long)]
    pub epochs: Option<usize>,
    /// バッチサイズ
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// 学習率
    #[arg(long)]
    pub lr: Option<f64>,
    /// エンコードした手の数（1 または 2）
    #[arg(long)]
    pub max_hands: Option<usize>,
    /// 計算デバイス
    #[arg(long, value_enum)]
    pub device: Option<DeviceType>,
}

impl SubCommandExtend for TrainCommand {
    fn run(&self, config: &AppConfig) -> anyhow::Result<()> {
        let mut settings = config.training.clone();
        if let Some(epochs) = self.epochs {
            settings.num_epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(lr) = self.lr {
            settings.learning_rate = lr;
        }
        let max_hands = self.max_hands.unwrap_or(config.model.max_hands);
        // 1 / 2 以外はここで弾く
        LandmarkEncoder::new(max_hands)?;

        let dataset = self
            .dataset
            .clone()
            .unwrap_or_else(|| PathBuf::from(&settings.dataset_dir));
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.model.model_path));

        train_from_directory(
            &dataset,
            &output,
            &settings,
            max_hands,
            self.device.unwrap_or(config.device_type),
        )?;
        Ok(())
    }
}
