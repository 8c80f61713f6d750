pub mod ml_model;
pub mod training;
pub mod inference;

pub use ml_model::{ModelConfig, SignClassifier, HIDDEN_SIZE_1, HIDDEN_SIZE_2};
pub use training::{
    save_trained_model, train_from_directory, train_model, SignBatch, SignBatcher, SignDataset, SignItem,
    TrainingReport,
};
pub use inference::{GestureClassifier, InferenceBackend};
