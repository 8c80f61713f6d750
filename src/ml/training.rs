//! データセット構築とモデル学習

use std::path::{Path, PathBuf};

use anyhow::Context;
use burn::{
    backend::{Autodiff, NdArray},
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion, Int, Tensor, TensorData},
};
use burn_ndarray::NdArrayDevice;
use log::{info, warn};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::{Result, SignError};
use crate::ml::ModelConfig;
use crate::model::{save_model_with_metadata, DeviceType, LabelTable, ModelMetadata, TrainingSettings};
use crate::sample_store::SampleStore;
use crate::types::{FeatureVector, HAND_FEATURE_LEN};

/// 学習データセット
///
/// 構築時は「ラベル順 → ファイル番号順」の挿入順を保ちます。シャッフルは学習側で行います。
#[derive(Debug, Clone)]
pub struct SignDataset {
    samples: Vec<FeatureVector>,
    targets: Vec<usize>,
    labels: LabelTable,
    feature_len: usize,
}

impl SignDataset {
    /// サンプルストアのディレクトリから学習データを読み込む
    ///
    /// - ラベルはディレクトリ名の辞書順でインデックスを割り当てる
    /// - 全サンプルの長さが同じでなければエラー（スキップはしない）
    /// - サンプルが1つも無いラベルディレクトリはエラー
    /// - `expected_len` を指定した場合、サンプル長がそれと一致しなければエラー
    pub fn from_directory(data_dir: &Path, expected_len: Option<usize>) -> Result<Self> {
        Self::from_sample_store(&SampleStore::new(data_dir), expected_len)
    }

    pub fn from_sample_store(store: &SampleStore, expected_len: Option<usize>) -> Result<Self> {
        let names = store.labels().map_err(inconsistent)?;
        if names.is_empty() {
            return Err(SignError::DatasetInconsistency(format!(
                "no label directories in {}",
                store.root().display()
            )));
        }
        let labels = LabelTable::from_ordered(names);

        let mut samples = Vec::new();
        let mut targets = Vec::new();
        let mut feature_len = expected_len;
        let mut empty_classes = Vec::new();

        for (class_id, class_name) in labels.iter() {
            let paths = store.sample_paths(class_name).map_err(inconsistent)?;
            if paths.is_empty() {
                empty_classes.push(class_name.to_string());
                continue;
            }

            for path in paths {
                let sample = SampleStore::load_sample(&path).map_err(inconsistent)?;
                match feature_len {
                    None => feature_len = Some(sample.len()),
                    Some(len) if len != sample.len() => {
                        return Err(SignError::DatasetInconsistency(format!(
                            "sample {} has length {}, expected {}",
                            path.display(),
                            sample.len(),
                            len
                        )));
                    }
                    Some(_) => {}
                }
                samples.push(sample);
                targets.push(class_id);
            }
        }

        if !empty_classes.is_empty() {
            return Err(SignError::DatasetInconsistency(format!(
                "label directories without samples: {}",
                empty_classes.join(", ")
            )));
        }

        let feature_len = feature_len.unwrap_or(0);
        if feature_len == 0 {
            return Err(SignError::DatasetInconsistency("samples are empty vectors".to_string()));
        }

        let dataset = Self {
            samples,
            targets,
            labels,
            feature_len,
        };
        dataset.log_summary();
        Ok(dataset)
    }

    fn log_summary(&self) {
        info!(
            "{} サンプル / {} クラスを読み込みました（特徴長 {}）",
            self.samples.len(),
            self.labels.len(),
            self.feature_len
        );
        for ((class_id, name), count) in self.labels.iter().zip(self.class_counts()) {
            info!("  クラス {}: {} ({} サンプル)", class_id, name, count);
        }
        if self.feature_len % HAND_FEATURE_LEN != 0 {
            warn!("特徴長 {} は手1つ分 ({}) の倍数ではありません", self.feature_len, HAND_FEATURE_LEN);
        }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn feature_len(&self) -> usize {
        self.feature_len
    }

    pub fn sample(&self, index: usize) -> Option<&FeatureVector> {
        self.samples.get(index)
    }

    pub fn target(&self, index: usize) -> Option<usize> {
        self.targets.get(index).copied()
    }

    /// クラスごとのサンプル数
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.labels.len()];
        for &t in &self.targets {
            counts[t] += 1;
        }
        counts
    }

    /// 特徴量 [N, D] を行優先で平坦化したもの
    pub fn features_flat(&self) -> Vec<f32> {
        self.samples.iter().flat_map(|s| s.as_slice().iter().copied()).collect()
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }
}

fn inconsistent(e: anyhow::Error) -> SignError {
    SignError::DatasetInconsistency(format!("{e:#}"))
}

/// データセットアイテム
#[derive(Clone, Debug)]
pub struct SignItem {
    pub features: Vec<f32>,
    pub label: usize,
}

impl Dataset<SignItem> for SignDataset {
    fn get(&self, index: usize) -> Option<SignItem> {
        Some(SignItem {
            features: self.samples.get(index)?.as_slice().to_vec(),
            label: *self.targets.get(index)?,
        })
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// バッチャー
#[derive(Clone)]
pub struct SignBatcher<B: Backend> {
    device: B::Device,
    feature_len: usize,
}

impl<B: Backend> SignBatcher<B> {
    pub fn new(device: B::Device, feature_len: usize) -> Self {
        Self { device, feature_len }
    }
}

impl<B: Backend> Batcher<B, SignItem, SignBatch<B>> for SignBatcher<B> {
    fn batch(&self, items: Vec<SignItem>, _device: &B::Device) -> SignBatch<B> {
        let batch_size = items.len();
        let mut all_features = Vec::with_capacity(batch_size * self.feature_len);
        let mut targets_vec = Vec::with_capacity(batch_size);

        for item in items {
            all_features.extend_from_slice(&item.features);
            targets_vec.push(item.label as i64);
        }

        let features = Tensor::<B, 2>::from_data(
            TensorData::new(all_features, [batch_size, self.feature_len]),
            &self.device,
        );
        let targets = Tensor::<B, 1, Int>::from_ints(targets_vec.as_slice(), &self.device);

        SignBatch { features, targets }
    }
}

/// バッチデータ
#[derive(Clone, Debug)]
pub struct SignBatch<B: Backend> {
    pub features: Tensor<B, 2>,
    pub targets: Tensor<B, 1, Int>,
}

/// 学習結果
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// `BinBytesRecorder<FullPrecisionSettings>` で書き出した重み
    pub model_binary: Vec<u8>,
    /// エポックごとの平均損失
    pub epoch_losses: Vec<f64>,
    pub model_config: ModelConfig,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

/// モデル学習を実行
///
/// 各エポックでデータをシャッフルしてミニバッチに分け、
/// 交差エントロピー損失 + Adam で更新します。早期終了・検証分割はありません。
pub fn train_model<B: AutodiffBackend>(
    dataset: &SignDataset,
    settings: &TrainingSettings,
    device: &B::Device,
) -> Result<TrainingReport> {
    if dataset.is_empty() {
        return Err(SignError::DatasetInconsistency("学習データが見つかりません".to_string()));
    }
    if settings.batch_size == 0 {
        return Err(SignError::InvalidConfig("batch_size must be positive".to_string()));
    }

    let model_config = ModelConfig::new(dataset.feature_len(), dataset.num_classes());
    let mut model = model_config.init::<B>(device);
    let mut optim = AdamConfig::new().init();
    let batcher = SignBatcher::<B>::new(device.clone(), dataset.feature_len());

    info!(
        "学習を開始します: エポック数 {}, バッチサイズ {}, 学習率 {}",
        settings.num_epochs, settings.batch_size, settings.learning_rate
    );

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    let mut epoch_losses = Vec::with_capacity(settings.num_epochs);

    for epoch in 1..=settings.num_epochs {
        indices.shuffle(&mut rng);

        let mut total_loss = 0.0;
        let mut num_batches = 0usize;

        for chunk in indices.chunks(settings.batch_size) {
            let items: Vec<SignItem> = chunk.iter().filter_map(|&i| dataset.get(i)).collect();
            let batch = batcher.batch(items, device);

            let output = model.forward_classification(batch.features, batch.targets);
            total_loss += output.loss.clone().into_scalar().elem::<f64>();
            num_batches += 1;

            let grads = output.loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(settings.learning_rate, model, grads);
        }

        let mean_loss = total_loss / num_batches as f64;
        info!("Epoch {}/{}: loss {:.4} (合計 {:.4})", epoch, settings.num_epochs, mean_loss, total_loss);
        epoch_losses.push(mean_loss);
    }

    // 勾配なしのバックエンドへ変換してから書き出す
    let trained = model.valid();
    let model_binary = BinBytesRecorder::<FullPrecisionSettings>::default()
        .record(trained.into_record(), ())
        .map_err(|e| SignError::Io(std::io::Error::other(format!("モデル重みの書き出しエラー: {:?}", e))))?;

    Ok(TrainingReport {
        model_binary,
        epoch_losses,
        model_config,
    })
}

/// 学習結果をラベル表と共に1つのアーカイブに保存
pub fn save_trained_model(
    output_model_path: &Path,
    dataset: &SignDataset,
    report: &TrainingReport,
    settings: &TrainingSettings,
    max_hands: usize,
) -> anyhow::Result<PathBuf> {
    let mut metadata = ModelMetadata::new(
        report.model_config.input_size,
        max_hands,
        [report.model_config.hidden_size_1, report.model_config.hidden_size_2],
        report.model_config.num_classes,
        settings.num_epochs,
        settings.batch_size,
        settings.learning_rate,
    );
    metadata.final_loss = report.final_loss();
    metadata.num_samples = dataset.len();

    save_model_with_metadata(output_model_path, &metadata, dataset.labels(), &report.model_binary)
}

/// データセット構築 → 学習 → 保存 までを実行
///
/// 保存先のパスを返します。
pub fn train_from_directory(
    data_dir: &Path,
    output_model_path: &Path,
    settings: &TrainingSettings,
    max_hands: usize,
    device_type: DeviceType,
) -> anyhow::Result<PathBuf> {
    let expected_len = HAND_FEATURE_LEN * max_hands;
    let dataset = SignDataset::from_directory(data_dir, Some(expected_len))
        .context(format!("Failed to build dataset from {:?}", data_dir))?;

    info!("計算デバイス: {}", device_type);
    let report = match device_type {
        DeviceType::Cpu => train_model::<Autodiff<NdArray<f32>>>(&dataset, settings, &NdArrayDevice::Cpu)?,
        #[cfg(feature = "wgpu")]
        DeviceType::Wgpu => {
            let device = burn_wgpu::WgpuDevice::default();
            train_model::<Autodiff<burn::backend::Wgpu>>(&dataset, settings, &device)?
        }
        #[cfg(not(feature = "wgpu"))]
        DeviceType::Wgpu => anyhow::bail!("WGPU で学習するには `wgpu` フィーチャーを有効にしてビルドしてください"),
    };

    let saved = save_trained_model(output_model_path, &dataset, &report, settings, max_hands)?;

    let mapping: Vec<String> = dataset.labels().iter().map(|(i, l)| format!("{i}: {l}")).collect();
    info!("学習完了: {} に保存しました", saved.display());
    info!("ラベル対応: {{{}}}", mapping.join(", "));
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(dir: &Path, layout: &[(&str, usize, usize)]) -> SampleStore {
        let store = SampleStore::new(dir);
        for (label, count, len) in layout {
            for i in 0..*count {
                store
                    .append(label, &FeatureVector::new(vec![i as f32 * 0.1; *len]))
                    .unwrap();
            }
        }
        store
    }

    #[test]
    fn test_labels_follow_sorted_directory_names() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path(), &[("C", 1, 63), ("A", 2, 63), ("B", 1, 63)]);

        let first = SignDataset::from_sample_store(&store, None).unwrap();
        let second = SignDataset::from_sample_store(&store, None).unwrap();

        assert_eq!(first.labels().labels(), &["A", "B", "C"]);
        assert_eq!(first.labels(), second.labels());
        assert_eq!(first.targets(), &[0, 0, 1, 2]);
        assert_eq!(first.class_counts(), vec![2, 1, 1]);
        assert_eq!(first.features_flat().len(), 4 * 63);
    }

    #[test]
    fn test_mismatched_sample_length_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path(), &[("HELLO", 2, 126), ("ME", 1, 63)]);

        let err = SignDataset::from_sample_store(&store, None).unwrap_err();
        assert!(matches!(err, SignError::DatasetInconsistency(_)));
    }

    #[test]
    fn test_expected_length_is_enforced() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path(), &[("HELLO", 2, 63)]);

        assert!(matches!(
            SignDataset::from_sample_store(&store, Some(126)),
            Err(SignError::DatasetInconsistency(_))
        ));
    }

    #[test]
    fn test_empty_label_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path(), &[("HELLO", 2, 63)]);
        std::fs::create_dir_all(dir.path().join("ME")).unwrap();

        let err = SignDataset::from_sample_store(&store, None).unwrap_err();
        assert!(err.to_string().contains("ME"));
    }

    #[test]
    fn test_empty_store_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SignDataset::from_directory(dir.path(), None),
            Err(SignError::DatasetInconsistency(_))
        ));
    }

    #[test]
    fn test_batcher_shapes() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path(), &[("A", 3, 63)]);
        let dataset = SignDataset::from_sample_store(&store, None).unwrap();

        let batcher = SignBatcher::<NdArray<f32>>::new(NdArrayDevice::Cpu, dataset.feature_len());
        let items = (0..3).filter_map(|i| dataset.get(i)).collect();
        let batch = batcher.batch(items, &NdArrayDevice::Cpu);

        assert_eq!(batch.features.dims(), [3, 63]);
        assert_eq!(batch.targets.dims(), [3]);
    }

    #[test]
    fn test_training_loss_decreases() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::new(dir.path());
        for i in 0..4 {
            store.append("A", &FeatureVector::new(vec![0.1 + i as f32 * 0.01; 63])).unwrap();
            store.append("B", &FeatureVector::new(vec![0.9 - i as f32 * 0.01; 63])).unwrap();
        }
        let dataset = SignDataset::from_sample_store(&store, Some(63)).unwrap();
        let settings = TrainingSettings {
            num_epochs: 30,
            batch_size: 4,
            learning_rate: 1e-2,
            ..TrainingSettings::default()
        };

        let report = train_model::<Autodiff<NdArray<f32>>>(&dataset, &settings, &NdArrayDevice::Cpu).unwrap();
        assert_eq!(report.epoch_losses.len(), 30);
        assert!(report.final_loss().unwrap() < report.epoch_losses[0]);
        assert!(!report.model_binary.is_empty());
    }
}
