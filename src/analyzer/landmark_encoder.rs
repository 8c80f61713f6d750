//! ランドマーク → 固定長特徴ベクトル
//!
//! ## エンコード仕様
//! - 片手モード (max_hands = 1): 最初に報告された手を左右に関係なく使用、長さ63
//! - 両手モード (max_hands = 2): 長さ126。ブロック0 = Left、ブロック1 = Right。
//!   検出されなかった手のブロックはゼロのまま
//! - 手が1つも無いフレームは `None`（ゼロ埋めベクトルで代用しない）
//!
//! 左右 → ブロックの対応は固定で、検出器の報告順には依存しません。

use log::warn;

use crate::analyzer::SequenceClock;
use crate::error::{Result, SignError};
use crate::types::{FeatureVector, RawDetection, HAND_FEATURE_LEN};

/// サポートする最大の手の数
pub const MAX_SUPPORTED_HANDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandmarkEncoder {
    max_hands: usize,
}

impl LandmarkEncoder {
    /// `max_hands` は 1 または 2
    pub fn new(max_hands: usize) -> Result<Self> {
        if max_hands == 0 || max_hands > MAX_SUPPORTED_HANDS {
            return Err(SignError::InvalidConfig(format!(
                "max_hands must be 1 or 2, got {max_hands}"
            )));
        }
        Ok(Self { max_hands })
    }

    pub fn single_hand() -> Self {
        Self { max_hands: 1 }
    }

    pub fn dual_hand() -> Self {
        Self { max_hands: 2 }
    }

    pub fn max_hands(&self) -> usize {
        self.max_hands
    }

    /// 出力ベクトル長（モデルの入力サイズと一致している必要がある）
    pub fn feature_len(&self) -> usize {
        HAND_FEATURE_LEN * self.max_hands
    }

    /// 1フレーム分をエンコード
    ///
    /// 検出の成否に関わらずクロックを1フレーム進めます。
    pub fn encode(&self, detection: &RawDetection, clock: &mut SequenceClock) -> Option<FeatureVector> {
        clock.advance();

        let first = detection.hands.first()?;

        if self.max_hands == 1 {
            let mut features = FeatureVector::zeros(HAND_FEATURE_LEN);
            first.write_flat(features.as_mut_slice());
            return Some(features);
        }

        let mut features = FeatureVector::zeros(self.feature_len());
        let mut written = [false; MAX_SUPPORTED_HANDS];

        for hand in &detection.hands {
            let slot = hand.handedness.slot();
            if written[slot] {
                // 正しい検出器では起こらない。先に報告された手を残す
                warn!(
                    "同じ手 ({}) が1フレームに複数報告されました。後続を無視します",
                    hand.handedness
                );
                continue;
            }
            let start = slot * HAND_FEATURE_LEN;
            hand.write_flat(&mut features.as_mut_slice()[start..start + HAND_FEATURE_LEN]);
            written[slot] = true;
        }

        Some(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HandLandmarks, Handedness, Landmark, NUM_LANDMARKS};
    use rstest::rstest;

    fn hand(handedness: Handedness, base: f32) -> HandLandmarks {
        let mut landmarks = [Landmark::default(); NUM_LANDMARKS];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            let v = base + i as f32 * 0.01;
            *lm = Landmark::new(v, v + 0.001, -v);
        }
        HandLandmarks::new(handedness, landmarks)
    }

    #[rstest]
    #[case(1, 63)]
    #[case(2, 126)]
    fn test_feature_len(#[case] max_hands: usize, #[case] expected: usize) {
        let encoder = LandmarkEncoder::new(max_hands).unwrap();
        assert_eq!(encoder.feature_len(), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    fn test_rejects_unsupported_max_hands(#[case] max_hands: usize) {
        assert!(matches!(
            LandmarkEncoder::new(max_hands),
            Err(SignError::InvalidConfig(_))
        ));
    }

    #[rstest]
    #[case(LandmarkEncoder::single_hand())]
    #[case(LandmarkEncoder::dual_hand())]
    fn test_no_hands_is_absent(#[case] encoder: LandmarkEncoder) {
        let mut clock = SequenceClock::default();
        assert!(encoder.encode(&RawDetection::empty(), &mut clock).is_none());
        // 手が無くてもクロックは進む
        assert_eq!(clock.timestamp_ms(), 33);
    }

    #[test]
    fn test_single_hand_takes_first_reported() {
        let encoder = LandmarkEncoder::single_hand();
        let mut clock = SequenceClock::default();
        let detection = RawDetection::new(vec![hand(Handedness::Right, 0.5), hand(Handedness::Left, 0.1)]);

        let features = encoder.encode(&detection, &mut clock).unwrap();
        assert_eq!(features.len(), 63);
        // 先頭ランドマークの (x, y, z)
        assert_eq!(&features.as_slice()[..3], &[0.5, 0.5 + 0.001, -0.5]);
        // 2番目のランドマーク
        assert!((features.as_slice()[3] - 0.51).abs() < 1e-6);
    }

    #[test]
    fn test_dual_hand_single_detection_zero_fills_other_block() {
        let encoder = LandmarkEncoder::dual_hand();
        let mut clock = SequenceClock::default();
        let detection = RawDetection::new(vec![hand(Handedness::Right, 0.3)]);

        let features = encoder.encode(&detection, &mut clock).unwrap();
        assert_eq!(features.len(), 126);
        assert!(features.as_slice()[..63].iter().all(|v| *v == 0.0));
        assert_eq!(features.as_slice()[63], 0.3);
    }

    #[test]
    fn test_dual_hand_is_order_independent() {
        let encoder = LandmarkEncoder::dual_hand();
        let left = hand(Handedness::Left, 0.1);
        let right = hand(Handedness::Right, 0.7);

        let mut clock_a = SequenceClock::default();
        let mut clock_b = SequenceClock::default();
        let a = encoder
            .encode(&RawDetection::new(vec![left.clone(), right.clone()]), &mut clock_a)
            .unwrap();
        let b = encoder
            .encode(&RawDetection::new(vec![right, left]), &mut clock_b)
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.as_slice()[0], 0.1);
        assert_eq!(a.as_slice()[63], 0.7);
    }

    #[test]
    fn test_duplicate_handedness_keeps_first() {
        let encoder = LandmarkEncoder::dual_hand();
        let mut clock = SequenceClock::default();
        let detection = RawDetection::new(vec![hand(Handedness::Left, 0.2), hand(Handedness::Left, 0.9)]);

        let features = encoder.encode(&detection, &mut clock).unwrap();
        assert_eq!(features.as_slice()[0], 0.2);
        assert!(features.as_slice()[63..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_clock_advances_every_call() {
        let encoder = LandmarkEncoder::dual_hand();
        let mut clock = SequenceClock::new(10);
        let detection = RawDetection::new(vec![hand(Handedness::Left, 0.2)]);
        for _ in 0..3 {
            encoder.encode(&detection, &mut clock);
        }
        encoder.encode(&RawDetection::empty(), &mut clock);
        assert_eq!(clock.timestamp_ms(), 40);
    }
}
