use std::path::Path;

use anyhow::Result;
use burn::backend::{Autodiff, NdArray};
use burn_ndarray::NdArrayDevice;
use rstest::*;
use tempfile::TempDir;

use sign_stream_lib::ml::{save_trained_model, train_model, GestureClassifier, SignDataset};
use sign_stream_lib::model::{
    load_model_with_metadata, save_model_with_metadata, LabelTable, TrainingSettings,
};
use sign_stream_lib::sample_store::SampleStore;
use sign_stream_lib::types::FeatureVector;
use sign_stream_lib::SignError;

const DIM: usize = 126;

fn sample(base: f32, i: usize) -> FeatureVector {
    FeatureVector::new((0..DIM).map(|j| base + ((i + j) % 5) as f32 * 0.01).collect())
}

#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn hello_me_store(root: &Path) -> SampleStore {
    let store = SampleStore::new(root);
    for i in 0..5 {
        store.append("HELLO", &sample(0.1, i)).unwrap();
        store.append("ME", &sample(0.9, i)).unwrap();
    }
    store
}

fn quick_settings() -> TrainingSettings {
    TrainingSettings {
        num_epochs: 60,
        batch_size: 4,
        learning_rate: 1e-2,
        ..TrainingSettings::default()
    }
}

#[rstest]
fn dataset_assigns_sorted_labels(temp_dir: TempDir) -> Result<()> {
    let store = hello_me_store(temp_dir.path());
    let dataset = SignDataset::from_sample_store(&store, Some(DIM))?;

    assert_eq!(dataset.labels().label(0), Some("HELLO"));
    assert_eq!(dataset.labels().label(1), Some("ME"));
    assert_eq!(dataset.feature_len(), DIM);
    assert_eq!(dataset.class_counts(), vec![5, 5]);
    Ok(())
}

#[rstest]
fn short_training_run_memorizes_samples(temp_dir: TempDir) -> Result<()> {
    let store = hello_me_store(&temp_dir.path().join("dataset"));
    let dataset = SignDataset::from_sample_store(&store, Some(DIM))?;
    let settings = quick_settings();

    let report = train_model::<Autodiff<NdArray<f32>>>(&dataset, &settings, &NdArrayDevice::Cpu)?;
    let saved = save_trained_model(&temp_dir.path().join("model"), &dataset, &report, &settings, 2)?;

    let classifier = GestureClassifier::load(&saved)?;
    assert_eq!(classifier.input_size(), DIM);
    assert_eq!(classifier.predict(&sample(0.1, 2)), "HELLO");
    assert_eq!(classifier.predict(&sample(0.9, 3)), "ME");

    let artifact = load_model_with_metadata(&saved)?;
    assert_eq!(artifact.metadata.num_samples, 10);
    assert_eq!(artifact.metadata.num_epochs, 60);
    assert!(artifact.metadata.final_loss.is_some());
    Ok(())
}

#[rstest]
fn label_table_survives_persist_and_reload(temp_dir: TempDir) -> Result<()> {
    let store = SampleStore::new(temp_dir.path().join("dataset"));
    for label in ["C", "A", "B"] {
        store.append(label, &FeatureVector::new(vec![0.5; 63]))?;
    }
    let dataset = SignDataset::from_sample_store(&store, Some(63))?;
    let settings = TrainingSettings {
        num_epochs: 1,
        ..TrainingSettings::default()
    };
    let report = train_model::<Autodiff<NdArray<f32>>>(&dataset, &settings, &NdArrayDevice::Cpu)?;
    let saved = save_trained_model(&temp_dir.path().join("abc.tar.gz"), &dataset, &report, &settings, 1)?;

    let classifier = GestureClassifier::load(&saved)?;
    let labels = classifier.labels();
    assert_eq!(labels.index_of("A"), Some(0));
    assert_eq!(labels.index_of("B"), Some(1));
    assert_eq!(labels.index_of("C"), Some(2));
    assert_eq!(labels, &LabelTable::from_names(["A", "B", "C"]));
    Ok(())
}

#[rstest]
fn output_width_mismatch_is_a_load_error(temp_dir: TempDir) -> Result<()> {
    let store = hello_me_store(&temp_dir.path().join("dataset"));
    let dataset = SignDataset::from_sample_store(&store, Some(DIM))?;
    let settings = TrainingSettings {
        num_epochs: 1,
        ..TrainingSettings::default()
    };
    let report = train_model::<Autodiff<NdArray<f32>>>(&dataset, &settings, &NdArrayDevice::Cpu)?;
    let saved = save_trained_model(&temp_dir.path().join("model"), &dataset, &report, &settings, 2)?;

    // 2出力の重みに3ラベルの表を組み合わせる
    let mut artifact = load_model_with_metadata(&saved)?;
    artifact.metadata.num_classes = 3;
    let three = LabelTable::from_names(["HELLO", "ME", "YOU"]);
    let broken = save_model_with_metadata(
        &temp_dir.path().join("broken"),
        &artifact.metadata,
        &three,
        &artifact.model_binary,
    )?;

    assert!(matches!(GestureClassifier::load(&broken), Err(SignError::ModelLoad(_))));
    Ok(())
}

#[rstest]
fn missing_archive_is_a_load_error(temp_dir: TempDir) {
    assert!(matches!(
        GestureClassifier::load(temp_dir.path().join("nope.tar.gz")),
        Err(SignError::ModelLoad(_))
    ));
}
