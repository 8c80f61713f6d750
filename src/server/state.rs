use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use super::session::Session;
use crate::analyzer::LandmarkEncoder;
use crate::detector::DetectorFactory;
use crate::error::{Result, SignError};
use crate::ml::GestureClassifier;
use crate::model::ServerSettings;

/// アプリケーション状態
pub struct AppState {
    /// 学習済み分類器（セッション開始時に複製する）
    classifier: Mutex<GestureClassifier>,
    /// セッションごとの検出器を作るファクトリ
    detectors: Arc<dyn DetectorFactory>,
    encoder: LandmarkEncoder,
    /// 同時セッション数の上限
    pub admission: Arc<Semaphore>,
    pub settings: ServerSettings,
    next_session_id: AtomicU64,
}

impl AppState {
    /// 新しいアプリケーション状態を作成
    ///
    /// エンコーダーの出力長とモデルの入力サイズが一致しなければエラー。
    pub fn new(
        classifier: GestureClassifier,
        detectors: Arc<dyn DetectorFactory>,
        encoder: LandmarkEncoder,
        settings: ServerSettings,
    ) -> Result<Arc<Self>> {
        if encoder.feature_len() != classifier.input_size() {
            return Err(SignError::ModelLoad(format!(
                "encoder produces {} features but the model expects {}",
                encoder.feature_len(),
                classifier.input_size()
            )));
        }
        if settings.max_sessions == 0 {
            return Err(SignError::InvalidConfig("max_sessions must be positive".to_string()));
        }

        Ok(Arc::new(AppState {
            classifier: Mutex::new(classifier),
            detectors,
            encoder,
            admission: Arc::new(Semaphore::new(settings.max_sessions)),
            settings,
            next_session_id: AtomicU64::new(1),
        }))
    }

    /// 新しいセッションを作成（専用の検出器とクロックを持つ）
    pub fn open_session(&self) -> Result<Session> {
        let classifier = self
            .classifier
            .lock()
            .map_err(|_| SignError::ModelLoad("classifier lock poisoned".to_string()))?
            .clone();
        let detector = self.detectors.create()?;
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        Ok(Session::new(
            id,
            detector,
            self.encoder,
            classifier,
            self.settings.frame_interval_ms,
        ))
    }

    pub fn detector_name(&self) -> &str {
        self.detectors.name()
    }

    pub fn available_sessions(&self) -> usize {
        self.admission.available_permits()
    }
}
