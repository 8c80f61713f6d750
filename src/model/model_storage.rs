//! モデルとメタデータの永続化
//!
//! Tar.gz形式でモデル・ラベル表・メタデータを1ファイルに統合して保存・読み込みします。
//!
//! ファイル構成（tar.gz内部）:
//! - metadata.json   - メタデータ（入力サイズ、学習設定など）
//! - labels.json     - ラベル表
//! - model.bin       - モデルの重み（バイナリ）
//!
//! 保存は一時ファイルに書き出してからリネームするため、
//! 同時に読み込むプロセスが片方だけ新しいペアを見ることはありません。

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use tar::{Archive, Builder};

use crate::model::label_table::LabelTable;
use crate::model::model_metadata::ModelMetadata;

const METADATA_ENTRY: &str = "metadata.json";
const LABELS_ENTRY: &str = "labels.json";
const MODEL_ENTRY: &str = "model.bin";

/// 読み込んだアーカイブの中身
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub labels: LabelTable,
    pub model_binary: Vec<u8>,
}

/// `.tar.gz` で終わっていなければ拡張子を付ける
pub fn archive_path(output_path: &Path) -> PathBuf {
    if output_path.extension().and_then(|s| s.to_str()) == Some("gz") {
        output_path.to_path_buf()
    } else {
        output_path.with_extension("tar.gz")
    }
}

fn append_entry<W: Write>(builder: &mut Builder<W>, name: &str, bytes: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .context(format!("Failed to add {} to tar", name))
}

/// メタデータ・ラベル表と共にモデルをTar.gz形式で保存
///
/// 保存先のパスを返します。
pub fn save_model_with_metadata(
    output_path: &Path,
    metadata: &ModelMetadata,
    labels: &LabelTable,
    model_binary: &[u8],
) -> Result<PathBuf> {
    let tar_gz_path = archive_path(output_path);

    // 親ディレクトリが存在しない場合は作成
    if let Some(parent) = tar_gz_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create parent directory: {:?}", parent))?;
        }
    }

    let tmp_path = tar_gz_path.with_extension("gz.tmp");
    {
        let tar_gz_file = File::create(&tmp_path)
            .context(format!("Failed to create tar.gz file: {:?}", tmp_path))?;

        let encoder = GzEncoder::new(tar_gz_file, Compression::default());
        let mut tar_builder = Builder::new(encoder);

        append_entry(&mut tar_builder, METADATA_ENTRY, metadata.to_json_string()?.as_bytes())?;
        append_entry(&mut tar_builder, LABELS_ENTRY, labels.to_json_string()?.as_bytes())?;
        append_entry(&mut tar_builder, MODEL_ENTRY, model_binary)?;

        // tarアーカイブとgzipストリームを完成させる
        let encoder = tar_builder
            .into_inner()
            .context("Failed to finalize tar archive")?;
        let file = encoder.finish().context("Failed to finalize gzip stream")?;
        file.sync_all().context("Failed to flush tar.gz file")?;
    }

    std::fs::rename(&tmp_path, &tar_gz_path)
        .context(format!("Failed to move {:?} into place", tmp_path))?;

    info!("モデルを保存しました: {}", tar_gz_path.display());
    Ok(tar_gz_path)
}

fn open_archive(tar_gz_path: &Path) -> Result<Archive<GzDecoder<File>>> {
    let tar_gz_file = File::open(tar_gz_path)
        .context(format!("Failed to open tar.gz file: {:?}", tar_gz_path))?;
    Ok(Archive::new(GzDecoder::new(tar_gz_file)))
}

/// Tar.gzからモデルメタデータだけを読み込む
pub fn load_metadata(tar_gz_path: &Path) -> Result<ModelMetadata> {
    let mut archive = open_archive(tar_gz_path)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_str() == Some(METADATA_ENTRY) {
            let mut json_str = String::new();
            entry.read_to_string(&mut json_str)?;
            return ModelMetadata::from_json_string(&json_str);
        }
    }

    Err(anyhow::anyhow!("metadata.json not found in tar.gz archive"))
}

/// メタデータ・ラベル表・モデルバイナリをまとめて読み込む
///
/// いずれか1つでも欠けていればエラーになります。
pub fn load_model_with_metadata(tar_gz_path: &Path) -> Result<ModelArtifact> {
    let mut archive = open_archive(tar_gz_path)?;

    let mut metadata_opt: Option<ModelMetadata> = None;
    let mut labels_opt: Option<LabelTable> = None;
    let mut model_binary_opt: Option<Vec<u8>> = None;

    for entry in archive
        .entries()
        .context(format!("Failed to read tar.gz archive: {:?}", tar_gz_path))?
    {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();

        match path.as_str() {
            METADATA_ENTRY => {
                let mut json_str = String::new();
                entry.read_to_string(&mut json_str)?;
                metadata_opt = Some(ModelMetadata::from_json_string(&json_str)?);
            }
            LABELS_ENTRY => {
                let mut json_str = String::new();
                entry.read_to_string(&mut json_str)?;
                labels_opt = Some(LabelTable::from_json_string(&json_str)?);
            }
            MODEL_ENTRY => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer)?;
                model_binary_opt = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata_opt, labels_opt, model_binary_opt) {
        (Some(metadata), Some(labels), Some(model_binary)) => Ok(ModelArtifact {
            metadata,
            labels,
            model_binary,
        }),
        (None, _, _) => Err(anyhow::anyhow!("metadata.json not found in tar.gz archive")),
        (_, None, _) => Err(anyhow::anyhow!("labels.json not found in tar.gz archive")),
        (_, _, None) => Err(anyhow::anyhow!("model.bin not found in tar.gz archive")),
    }
}

/// メタデータとラベル表をログに出力
pub fn print_metadata_info(metadata: &ModelMetadata, labels: &LabelTable) {
    info!("=== モデルメタデータ ===");
    info!("入力サイズ: {} (max_hands = {})", metadata.input_size, metadata.max_hands);
    info!(
        "構成: {} -> {} -> {} -> {}",
        metadata.input_size, metadata.hidden_sizes[0], metadata.hidden_sizes[1], metadata.num_classes
    );
    info!(
        "学習設定: エポック数 {}, バッチサイズ {}, 学習率 {}",
        metadata.num_epochs, metadata.batch_size, metadata.learning_rate
    );
    if let Some(loss) = metadata.final_loss {
        info!("最終損失: {:.4}", loss);
    }
    info!("サンプル数: {}", metadata.num_samples);
    info!("学習日時: {}", metadata.trained_at);
    for (index, label) in labels.iter() {
        info!("  {}: {}", index, label);
    }
    info!("========================");
}
