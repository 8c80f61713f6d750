//! ラベルごとのディレクトリに特徴ベクトルを保存するサンプルストア
//!
//! ```text
//! dataset/
//!   HELLO/0.npy 1.npy ...
//!   ME/0.npy ...
//! ```
//!
//! 各ファイルは1次元の float32 `.npy` 配列。収集中は追記のみ、学習中は読み取り専用です。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use ndarray::Array1;
use ndarray_npy::{read_npy, write_npy};

use crate::types::FeatureVector;

const SAMPLE_EXT: &str = "npy";

#[derive(Debug, Clone)]
pub struct SampleStore {
    root: PathBuf,
}

impl SampleStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn label_dir(&self, label: &str) -> PathBuf {
        self.root.join(label)
    }

    /// ラベルディレクトリ名を辞書順で返す（隠しディレクトリは除外）
    pub fn labels(&self) -> Result<Vec<String>> {
        let mut labels = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .context(format!("Failed to read sample store: {:?}", self.root))?
        {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("Invalid directory name: {:?}", path))?
                .to_string();
            if name.starts_with('.') {
                continue;
            }
            labels.push(name);
        }
        labels.sort();
        Ok(labels)
    }

    /// ラベル内のサンプルファイルを番号順で返す
    pub fn sample_paths(&self, label: &str) -> Result<Vec<PathBuf>> {
        let dir = self.label_dir(label);
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir).context(format!("Failed to read label directory: {:?}", dir))? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) == Some(SAMPLE_EXT) {
                paths.push(path);
            } else {
                warn!("サンプル以外のファイルを無視します: {}", path.display());
            }
        }
        paths.sort_by(|a, b| sample_sort_key(a).cmp(&sample_sort_key(b)));
        Ok(paths)
    }

    pub fn sample_count(&self, label: &str) -> Result<usize> {
        if !self.label_dir(label).is_dir() {
            return Ok(0);
        }
        Ok(self.sample_paths(label)?.len())
    }

    /// 次の空き番号でサンプルを追記し、書き込んだパスを返す
    pub fn append(&self, label: &str, features: &FeatureVector) -> Result<PathBuf> {
        let dir = self.label_dir(label);
        std::fs::create_dir_all(&dir).context(format!("Failed to create label directory: {:?}", dir))?;

        let next = self
            .sample_paths(label)?
            .iter()
            .filter_map(|p| sample_number(p))
            .max()
            .map_or(0, |n| n + 1);

        let path = dir.join(format!("{next}.{SAMPLE_EXT}"));
        let array = Array1::from(features.as_slice().to_vec());
        write_npy(&path, &array).context(format!("Failed to write sample: {:?}", path))?;
        Ok(path)
    }

    /// `.npy` を1つ読み込む（float64で保存されたものは float32 に変換）
    pub fn load_sample(path: &Path) -> Result<FeatureVector> {
        match read_npy::<_, Array1<f32>>(path) {
            Ok(array) => Ok(FeatureVector::new(array.to_vec())),
            Err(f32_err) => {
                let array: Array1<f64> = read_npy(path)
                    .map_err(|_| f32_err)
                    .context(format!("Failed to read sample: {:?}", path))?;
                Ok(FeatureVector::new(array.iter().map(|v| *v as f32).collect()))
            }
        }
    }
}

fn sample_number(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// 数値名のファイルを先に番号順、それ以外は名前順
fn sample_sort_key(path: &Path) -> (u8, u64, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match sample_number(path) {
        Some(n) => (0, n, name),
        None => (1, 0, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_numbers_samples_sequentially() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::new(dir.path());
        let features = FeatureVector::new(vec![0.5; 63]);

        for _ in 0..11 {
            store.append("HELLO", &features).unwrap();
        }

        let paths = store.sample_paths("HELLO").unwrap();
        assert_eq!(paths.len(), 11);
        assert!(paths[2].ends_with("2.npy"));
        assert!(paths[10].ends_with("10.npy"));
        assert_eq!(store.sample_count("ME").unwrap(), 0);
    }

    #[test]
    fn test_load_sample_roundtrip_values() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::new(dir.path());
        let features = FeatureVector::new((0..126).map(|i| i as f32 / 126.0).collect());
        let path = store.append("ME", &features).unwrap();

        assert_eq!(SampleStore::load_sample(&path).unwrap(), features);
    }

    #[test]
    fn test_reads_float64_samples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0.npy");
        write_npy(&path, &Array1::from(vec![0.25f64, 0.5, 0.75])).unwrap();

        let features = SampleStore::load_sample(&path).unwrap();
        assert_eq!(features.as_slice(), &[0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_labels_sorted_and_skip_files() {
        let dir = TempDir::new().unwrap();
        for label in ["ME", "HELLO", ".cache"] {
            std::fs::create_dir_all(dir.path().join(label)).unwrap();
        }
        std::fs::write(dir.path().join("README.txt"), "x").unwrap();

        let store = SampleStore::new(dir.path());
        assert_eq!(store.labels().unwrap(), vec!["HELLO".to_string(), "ME".to_string()]);
    }
}
