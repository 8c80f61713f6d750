mod classify;
mod inspect;
mod serve;
mod train;

pub use classify::*;
pub use inspect::*;
pub use serve::*;
pub use train::*;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::model::AppConfig;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "手話ジェスチャー認識サーバー")]
pub struct Opts {
    /// 設定ファイルのパス
    #[arg(short, long, default_value = "sign_stream.json")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 推論サーバーを起動
    Serve(ServeCommand),
    /// サンプルストアからモデルを学習
    Train(TrainCommand),
    /// モデルアーカイブの内容を表示
    Inspect(InspectCommand),
    /// 保存済みの特徴ベクトルを分類
    Classify(ClassifyCommand),
}

pub trait SubCommandExtend {
    fn run(&self, config: &AppConfig) -> anyhow::Result<()>;
}

impl SubCommandExtend for SubCommand {
    fn run(&self, config: &AppConfig) -> anyhow::Result<()> {
        match self {
            SubCommand::Serve(cmd) => cmd.run(config),
            SubCommand::Train(cmd) => cmd.run(config),
            SubCommand::Inspect(cmd) => cmd.run(config),
            SubCommand::Classify(cmd) => cmd.run(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let opts = Opts::try_parse_from(["sign_stream", "serve", "--addr", "0.0.0.0:9000", "--max-sessions", "2"]).unwrap();
        match opts.subcmd {
            SubCommand::Serve(cmd) => {
                assert_eq!(cmd.addr.as_deref(), Some("0.0.0.0:9000"));
                assert_eq!(cmd.max_sessions, Some(2));
                assert_eq!(cmd.detector, DetectorKind::None);
            }
            other => panic!("unexpected subcommand: {:?}", other),
        }
    }

    #[test]
    fn test_parse_train_defaults_to_config() {
        let opts = Opts::try_parse_from(["sign_stream", "-c", "x.json", "train", "--epochs", "5"]).unwrap();
        assert_eq!(opts.config, PathBuf::from("x.json"));
        match opts.subcmd {
            SubCommand::Train(cmd) => {
                assert_eq!(cmd.epochs, Some(5));
                assert!(cmd.dataset.is_none());
            }
            other => panic!("unexpected subcommand: {:?}", other),
        }
    }
}
