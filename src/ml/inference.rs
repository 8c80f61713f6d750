//! モデル推論機能

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use burn::{
    backend::NdArray,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{Tensor, TensorData},
};
use burn_ndarray::NdArrayDevice;
use log::{debug, warn};

use crate::analyzer::MAX_SUPPORTED_HANDS;
use crate::error::{Result, SignError};
use crate::ml::{ModelConfig, SignClassifier, HIDDEN_SIZE_1, HIDDEN_SIZE_2};
use crate::model::{load_model_with_metadata, LabelTable, ModelArtifact, ModelMetadata};
use crate::types::{FeatureVector, HAND_FEATURE_LEN};

/// 推論に使うバックエンド（CPU）
pub type InferenceBackend = NdArray<f32>;

/// 学習済み分類器
///
/// 読み込み後は不変です。セッションごとに `clone()` して使います。
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    model: SignClassifier<InferenceBackend>,
    labels: Arc<LabelTable>,
    metadata: Arc<ModelMetadata>,
    device: NdArrayDevice,
}

impl GestureClassifier {
    /// アーカイブからモデルとラベル表を読み込む
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let artifact = load_model_with_metadata(model_path)
            .map_err(|e| SignError::ModelLoad(format!("{}: {e:#}", model_path.display())))?;
        Self::from_artifact(artifact)
    }

    /// 読み込み済みのアーカイブ内容から分類器を組み立てる
    ///
    /// 以下のいずれかに当てはまればエラー:
    /// - ラベル表が空
    /// - メタデータのクラス数とラベル数が一致しない
    /// - `max_hands` が 1 / 2 以外
    /// - 隠れ層の構成が 128 → 64 以外
    /// - 入力サイズが `63 × max_hands` と一致しない
    /// - 重みの形状がメタデータの構成と一致しない
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        let ModelArtifact {
            metadata,
            labels,
            model_binary,
        } = artifact;

        if labels.is_empty() {
            return Err(SignError::ModelLoad("label table is empty".to_string()));
        }
        if metadata.num_classes != labels.len() {
            return Err(SignError::ModelLoad(format!(
                "model has {} outputs but label table has {} entries",
                metadata.num_classes,
                labels.len()
            )));
        }
        if !(1..=MAX_SUPPORTED_HANDS).contains(&metadata.max_hands) {
            return Err(SignError::ModelLoad(format!(
                "max_hands must be 1..={}, got {}",
                MAX_SUPPORTED_HANDS, metadata.max_hands
            )));
        }
        if metadata.hidden_sizes != [HIDDEN_SIZE_1, HIDDEN_SIZE_2] {
            return Err(SignError::ModelLoad(format!(
                "hidden sizes {:?} do not match the architecture [{}, {}]",
                metadata.hidden_sizes, HIDDEN_SIZE_1, HIDDEN_SIZE_2
            )));
        }
        if metadata.input_size != HAND_FEATURE_LEN * metadata.max_hands {
            return Err(SignError::ModelLoad(format!(
                "input size {} does not match max_hands {}",
                metadata.input_size, metadata.max_hands
            )));
        }

        let device = NdArrayDevice::Cpu;
        let model_config = ModelConfig::new(metadata.input_size, labels.len());
        let model = model_config.init::<InferenceBackend>(&device);

        // モデルの重みを復元
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, &device)
            .map_err(|e| SignError::ModelLoad(format!("モデル重みの読み込みエラー: {:?}", e)))?;
        let model = catch_unwind(AssertUnwindSafe(|| model.load_record(record)))
            .map_err(|_| SignError::ModelLoad("weights do not fit the model structure".to_string()))?;

        let expected = model_config.layer_shapes();
        let actual = model.layer_shapes();
        if expected != actual {
            return Err(SignError::ModelLoad(format!(
                "weight shapes {:?} do not match expected {:?}",
                actual, expected
            )));
        }

        debug!("分類器を読み込みました: {} クラス", labels.len());
        Ok(Self {
            model,
            labels: Arc::new(labels),
            metadata: Arc::new(metadata),
            device,
        })
    }

    /// 1サンプルを分類してラベルを返す
    pub fn try_predict(&self, features: &FeatureVector) -> Result<String> {
        let input_size = self.input_size();
        if features.len() != input_size {
            return Err(SignError::Prediction(format!(
                "feature length {} does not match model input {}",
                features.len(),
                input_size
            )));
        }

        let class_idx = catch_unwind(AssertUnwindSafe(|| {
            let input = Tensor::<InferenceBackend, 2>::from_data(
                TensorData::new(features.as_slice().to_vec(), [1, input_size]),
                &self.device,
            );
            let (predictions, _) = self.model.predict(input);
            predictions.into_data().iter::<i64>().next()
        }))
        .map_err(|_| SignError::Prediction("forward pass panicked".to_string()))?
        .ok_or_else(|| SignError::Prediction("empty prediction".to_string()))?;

        // クラス名に変換
        usize::try_from(class_idx)
            .ok()
            .and_then(|i| self.labels.label(i))
            .map(str::to_string)
            .ok_or_else(|| SignError::Prediction(format!("クラスインデックス {} は範囲外です", class_idx)))
    }

    /// 1サンプルを分類する。失敗時は空文字列
    pub fn predict(&self, features: &FeatureVector) -> String {
        match self.try_predict(features) {
            Ok(label) => label,
            Err(e) => {
                warn!("推論に失敗しました: {}", e);
                String::new()
            }
        }
    }

    /// 複数サンプルを分類
    pub fn classify_batch(&self, samples: &[FeatureVector]) -> Vec<String> {
        samples.iter().map(|s| self.predict(s)).collect()
    }

    pub fn input_size(&self) -> usize {
        self.metadata.input_size
    }

    pub fn max_hands(&self) -> usize {
        self.metadata.max_hands
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}
