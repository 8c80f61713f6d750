use serde::{Deserialize, Serialize};

/// 1つの手のランドマーク数
pub const NUM_LANDMARKS: usize = 21;

/// 1点あたりの座標数 (x, y, z)
pub const COORDS_PER_LANDMARK: usize = 3;

/// 1つの手を平坦化した時の長さ (21 * 3 = 63)
pub const HAND_FEATURE_LEN: usize = NUM_LANDMARKS * COORDS_PER_LANDMARK;

/// 検出器が報告する左右の区別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// 両手モードでのブロック位置（Left=0, Right=1）
    pub fn slot(self) -> usize {
        match self {
            Handedness::Left => 0,
            Handedness::Right => 1,
        }
    }
}

impl std::fmt::Display for Handedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handedness::Left => write!(f, "Left"),
            Handedness::Right => write!(f, "Right"),
        }
    }
}

/// 正規化画像座標上の1点
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// 検出された手1つ分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandLandmarks {
    pub handedness: Handedness,
    pub landmarks: [Landmark; NUM_LANDMARKS],
}

impl HandLandmarks {
    pub fn new(handedness: Handedness, landmarks: [Landmark; NUM_LANDMARKS]) -> Self {
        Self { handedness, landmarks }
    }

    /// ランドマーク順・(x, y, z) 順で `out` に書き込む
    ///
    /// `out` は長さ `HAND_FEATURE_LEN` であること。
    pub fn write_flat(&self, out: &mut [f32]) {
        for (chunk, lm) in out.chunks_exact_mut(COORDS_PER_LANDMARK).zip(self.landmarks.iter()) {
            chunk[0] = lm.x;
            chunk[1] = lm.y;
            chunk[2] = lm.z;
        }
    }
}

/// 1フレーム分の検出結果（0〜2個の手、順序は検出器依存）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
}

impl RawDetection {
    pub fn empty() -> Self {
        Self { hands: Vec::new() }
    }

    pub fn new(hands: Vec<HandLandmarks>) -> Self {
        Self { hands }
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}

/// 分類器への入力となる固定長ベクトル
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
