//! 手ランドマーク検出器との境界
//!
//! 検出器本体は外部コンポーネントです。ここでは呼び出し規約と、
//! セッションごとにインスタンスを生成するファクトリだけを定義します。
//!
//! 検出器は連続動画モードの状態機械として扱い、タイムスタンプは
//! 単調非減少でなければなりません。1インスタンスを複数セッションで共有しないこと。

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use image::RgbImage;

use crate::error::{Result, SignError};
use crate::types::RawDetection;

/// 連続動画モードの検出器
pub trait HandDetector: Send {
    /// 1フレームを検出
    ///
    /// `timestamp_ms` は前回の呼び出し以上であること。
    fn detect(&mut self, image: &RgbImage, timestamp_ms: u64) -> Result<RawDetection>;
}

/// セッション開始時に専用の検出器を生成する
pub trait DetectorFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn HandDetector>>;

    /// ログ表示用の名前
    fn name(&self) -> &str;
}

/// 常に「手なし」を返す検出器（疎通確認用）
#[derive(Debug, Default)]
pub struct NoHandDetector {
    last_timestamp: Option<u64>,
}

impl HandDetector for NoHandDetector {
    fn detect(&mut self, _image: &RgbImage, timestamp_ms: u64) -> Result<RawDetection> {
        check_monotonic(&mut self.last_timestamp, timestamp_ms)?;
        Ok(RawDetection::empty())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoHandDetectorFactory;

impl DetectorFactory for NoHandDetectorFactory {
    fn create(&self) -> Result<Box<dyn HandDetector>> {
        Ok(Box::new(NoHandDetector::default()))
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// 記録済みの検出結果を順番に返す検出器
///
/// 末尾まで来たら先頭に戻ります。
#[derive(Debug)]
pub struct ReplayDetector {
    detections: Arc<Vec<RawDetection>>,
    cursor: usize,
    last_timestamp: Option<u64>,
}

impl ReplayDetector {
    pub fn new(detections: Arc<Vec<RawDetection>>) -> Self {
        Self {
            detections,
            cursor: 0,
            last_timestamp: None,
        }
    }
}

impl HandDetector for ReplayDetector {
    fn detect(&mut self, _image: &RgbImage, timestamp_ms: u64) -> Result<RawDetection> {
        check_monotonic(&mut self.last_timestamp, timestamp_ms)?;
        if self.detections.is_empty() {
            return Ok(RawDetection::empty());
        }
        let detection = self.detections[self.cursor % self.detections.len()].clone();
        self.cursor += 1;
        Ok(detection)
    }
}

/// 記録をセッション間で共有し、セッションごとに独立したカーソルを持たせる
#[derive(Debug, Clone)]
pub struct ReplayDetectorFactory {
    detections: Arc<Vec<RawDetection>>,
}

impl ReplayDetectorFactory {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections: Arc::new(detections),
        }
    }

    /// JSON配列 (`[{"hands": [...]}, ...]`) から読み込む
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read detection recording: {:?}", path))?;
        let detections: Vec<RawDetection> = serde_json::from_str(&content)
            .context(format!("Failed to parse detection recording: {:?}", path))?;
        Ok(Self::new(detections))
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

impl DetectorFactory for ReplayDetectorFactory {
    fn create(&self) -> Result<Box<dyn HandDetector>> {
        Ok(Box::new(ReplayDetector::new(Arc::clone(&self.detections))))
    }

    fn name(&self) -> &str {
        "replay"
    }
}

fn check_monotonic(last: &mut Option<u64>, timestamp_ms: u64) -> Result<()> {
    if let Some(prev) = *last {
        if timestamp_ms < prev {
            return Err(SignError::Detector(format!(
                "timestamp went backwards: {timestamp_ms}ms < {prev}ms"
            )));
        }
    }
    *last = Some(timestamp_ms);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HandLandmarks, Handedness, Landmark, NUM_LANDMARKS};

    fn left_hand() -> RawDetection {
        RawDetection::new(vec![HandLandmarks::new(
            Handedness::Left,
            [Landmark::new(0.1, 0.2, 0.3); NUM_LANDMARKS],
        )])
    }

    #[test]
    fn test_replay_cycles_through_recording() {
        let factory = ReplayDetectorFactory::new(vec![left_hand(), RawDetection::empty()]);
        let mut detector = factory.create().unwrap();
        let image = RgbImage::new(2, 2);

        assert_eq!(detector.detect(&image, 0).unwrap().hands.len(), 1);
        assert!(detector.detect(&image, 33).unwrap().is_empty());
        assert_eq!(detector.detect(&image, 66).unwrap().hands.len(), 1);
    }

    #[test]
    fn test_each_session_gets_its_own_cursor() {
        let factory = ReplayDetectorFactory::new(vec![left_hand(), RawDetection::empty()]);
        let image = RgbImage::new(2, 2);
        let mut a = factory.create().unwrap();
        let mut b = factory.create().unwrap();

        assert_eq!(a.detect(&image, 0).unwrap().hands.len(), 1);
        assert_eq!(b.detect(&image, 0).unwrap().hands.len(), 1);
    }

    #[test]
    fn test_rejects_backwards_timestamp() {
        let mut detector = NoHandDetector::default();
        let image = RgbImage::new(2, 2);
        detector.detect(&image, 66).unwrap();
        detector.detect(&image, 66).unwrap();
        assert!(matches!(detector.detect(&image, 33), Err(SignError::Detector(_))));
    }

    #[test]
    fn test_recording_json_roundtrip() {
        let json = serde_json::to_string(&vec![left_hand()]).unwrap();
        let parsed: Vec<RawDetection> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0].hands[0].handedness, Handedness::Left);
        assert_eq!(parsed[0].hands[0].landmarks.len(), NUM_LANDMARKS);
    }
}
