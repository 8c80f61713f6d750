//! 機械学習モデルの共通定義
//!
//! 手話ジェスチャー分類用の全結合ネットワークと関連する設定を提供します。

use burn::{
    config::Config,
    module::Module,
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig, Relu},
    tensor::{backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};
use log::debug;

/// 隠れ層1のユニット数
pub const HIDDEN_SIZE_1: usize = 128;

/// 隠れ層2のユニット数
pub const HIDDEN_SIZE_2: usize = 64;

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 入力特徴ベクトル長（63 または 126）
    pub input_size: usize,
    /// 分類クラス数（ラベル表のサイズ）
    pub num_classes: usize,
    /// 隠れ層1のユニット数
    #[config(default = "HIDDEN_SIZE_1")]
    pub hidden_size_1: usize,
    /// 隠れ層2のユニット数
    #[config(default = "HIDDEN_SIZE_2")]
    pub hidden_size_2: usize,
}

impl ModelConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> SignClassifier<B> {
        debug!(
            "[Model] FC: {} -> {} -> {} -> {}",
            self.input_size, self.hidden_size_1, self.hidden_size_2, self.num_classes
        );

        SignClassifier {
            fc1: LinearConfig::new(self.input_size, self.hidden_size_1).init(device),
            fc2: LinearConfig::new(self.hidden_size_1, self.hidden_size_2).init(device),
            fc3: LinearConfig::new(self.hidden_size_2, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }

    /// 各全結合層の重み形状 `[入力, 出力]`
    pub fn layer_shapes(&self) -> [[usize; 2]; 3] {
        [
            [self.input_size, self.hidden_size_1],
            [self.hidden_size_1, self.hidden_size_2],
            [self.hidden_size_2, self.num_classes],
        ]
    }
}

/// 手話ジェスチャー分類モデル
///
/// # アーキテクチャ
/// - FC: input -> 128 + ReLU
/// - FC: 128 -> 64 + ReLU
/// - FC: 64 -> num_classes
/// - argmax (分類時)
#[derive(Module, Debug)]
pub struct SignClassifier<B: Backend> {
    fc1: Linear<B>, // input -> 128
    fc2: Linear<B>, // 128 -> 64
    fc3: Linear<B>, // 64 -> num_classes

    activation: Relu,
}

impl<B: Backend> SignClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `features`: 特徴ベクトルのバッチ [batch_size, input_size]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(features);
        let x = self.activation.forward(x);

        let x = self.fc2.forward(x);
        let x = self.activation.forward(x);

        self.fc3.forward(x)
    }

    /// 予測を実行
    ///
    /// # 戻り値
    /// - (予測クラスID [batch_size, 1], ロジット)
    pub fn predict(&self, features: Tensor<B, 2>) -> (Tensor<B, 2, Int>, Tensor<B, 2>) {
        let output = self.forward(features);
        let predictions = output.clone().argmax(1);
        (predictions, output)
    }

    /// 順伝播と損失計算（学習用）
    ///
    /// # 引数
    /// - `features`: 特徴ベクトル [batch_size, input_size]
    /// - `targets`: ターゲットラベル [batch_size]
    pub fn forward_classification(
        &self,
        features: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(features);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }

    /// 読み込まれた各層の重み形状 `[入力, 出力]`
    pub fn layer_shapes(&self) -> [[usize; 2]; 3] {
        [
            self.fc1.weight.val().dims(),
            self.fc2.weight.val().dims(),
            self.fc3.weight.val().dims(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_output_shape() {
        let device = Default::default();
        let model = ModelConfig::new(126, 3).init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 2>::zeros([4, 126], &device);

        let (predictions, logits) = model.predict(input);
        assert_eq!(logits.dims(), [4, 3]);
        assert_eq!(predictions.dims(), [4, 1]);
    }

    #[test]
    fn test_layer_shapes_match_config() {
        let device = Default::default();
        let config = ModelConfig::new(63, 5);
        let model = config.init::<TestBackend>(&device);
        assert_eq!(model.layer_shapes(), config.layer_shapes());
        assert_eq!(config.layer_shapes()[0], [63, HIDDEN_SIZE_1]);
        assert_eq!(config.layer_shapes()[2], [HIDDEN_SIZE_2, 5]);
    }
}
