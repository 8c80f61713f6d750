pub mod config;
pub mod label_table;
pub mod model_metadata;
pub mod model_storage;

pub use config::{AppConfig, DeviceType, ModelSettings, ServerSettings, TrainingSettings};
pub use label_table::LabelTable;
pub use model_metadata::ModelMetadata;
pub use model_storage::{
    archive_path, load_metadata, load_model_with_metadata, print_metadata_info, save_model_with_metadata,
    ModelArtifact,
};
