//! クラスインデックス ↔ ラベル名の対応表
//!
//! 学習時にデータセットのディレクトリ名（辞書順）から1度だけ作成し、
//! 重みと一緒に保存します。推論時は保存された表をそのまま使い、再計算しません。

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HashMap<String, String>", into = "HashMap<String, String>")]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// ラベル名を辞書順に並べてインデックスを割り当てる
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels: Vec<String> = names.into_iter().map(Into::into).collect();
        labels.sort();
        labels.dedup();
        Self { labels }
    }

    /// 既に並んでいる順序のまま作成（インデックス = 位置）
    pub fn from_ordered(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// クラスインデックスからラベルを取得
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// ラベルからクラスインデックスを取得
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().enumerate().map(|(i, l)| (i, l.as_str()))
    }

    /// `{"0": "HELLO", "1": "ME"}` 形式のJSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize label table to JSON")
    }

    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize label table from JSON")
    }
}

impl TryFrom<HashMap<String, String>> for LabelTable {
    type Error = anyhow::Error;

    /// キーが `0..N-1` を過不足なく埋めていることを要求する
    fn try_from(map: HashMap<String, String>) -> Result<Self> {
        let mut slots: Vec<Option<String>> = vec![None; map.len()];
        for (key, label) in map {
            let index: usize = key
                .parse()
                .with_context(|| format!("label index is not an integer: {key:?}"))?;
            match slots.get_mut(index) {
                Some(slot) => *slot = Some(label),
                None => bail!("label index {index} out of range (table has {} entries)", slots.len()),
            }
        }
        let labels = slots
            .into_iter()
            .enumerate()
            .map(|(i, l)| l.with_context(|| format!("label index {i} is missing")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { labels })
    }
}

impl From<LabelTable> for HashMap<String, String> {
    fn from(table: LabelTable) -> Self {
        table
            .labels
            .into_iter()
            .enumerate()
            .map(|(i, l)| (i.to_string(), l))
            .collect()
    }
}
