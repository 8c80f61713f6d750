//! 1接続分の推論セッション
//!
//! 状態遷移: `Connected → Streaming → Closed`
//!
//! フレームは受信順に1つずつ処理し、1フレームにつき必ず1つのレスポンスを返します。
//! 壊れたフレームはエラー付きの空ラベルで応答してセッションを継続し、
//! 検出器の失敗や通信エラーの場合はセッションを閉じます。

use std::fmt::Display;

use axum::extract::ws::Message;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{Sink, SinkExt, Stream, StreamExt};
use image::RgbImage;
use log::{debug, error, info, warn};
use tokio::task::block_in_place;

use super::types::{FrameRequest, FrameResponse};
use crate::analyzer::{LandmarkEncoder, SequenceClock};
use crate::detector::HandDetector;
use crate::error::{Result, SignError};
use crate::ml::GestureClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Streaming,
    Closed,
}

/// データURIの画像部分をデコード
///
/// 最初のカンマより後ろを base64 として扱います。
pub fn decode_frame(frame: &str) -> Result<RgbImage> {
    let (_, data) = frame
        .split_once(',')
        .ok_or_else(|| SignError::TransportDecode("frame is not a data URI".to_string()))?;
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| SignError::TransportDecode(format!("invalid base64: {e}")))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| SignError::TransportDecode(format!("invalid image: {e}")))?;
    Ok(image.to_rgb8())
}

pub struct Session {
    id: u64,
    state: SessionState,
    clock: SequenceClock,
    detector: Box<dyn HandDetector>,
    encoder: LandmarkEncoder,
    classifier: GestureClassifier,
    frames: u64,
    hands_seen: u64,
}

impl Session {
    pub fn new(
        id: u64,
        detector: Box<dyn HandDetector>,
        encoder: LandmarkEncoder,
        classifier: GestureClassifier,
        frame_interval_ms: u64,
    ) -> Self {
        Self {
            id,
            state: SessionState::Connected,
            clock: SequenceClock::new(frame_interval_ms),
            detector,
            encoder,
            classifier,
            frames: 0,
            hands_seen: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    pub fn clock(&self) -> &SequenceClock {
        &self.clock
    }

    /// 受信を開始する。クロックは0から
    pub fn start(&mut self) {
        self.clock = SequenceClock::new(self.clock.step_ms());
        self.state = SessionState::Streaming;
        info!("[Session {}] 開始", self.id);
    }

    /// テキストメッセージ1つを処理
    ///
    /// `Err` はセッションを閉じるべき失敗（検出器エラーなど）だけです。
    pub fn handle_text(&mut self, text: &str) -> Result<FrameResponse> {
        let request: FrameRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => {
                debug!("[Session {}] 不正なメッセージ: {}", self.id, e);
                self.frames += 1;
                return Ok(FrameResponse::error(format!("malformed message: {e}")));
            }
        };
        self.handle_frame(&request)
    }

    pub fn handle_frame(&mut self, request: &FrameRequest) -> Result<FrameResponse> {
        if self.state != SessionState::Streaming {
            return Err(SignError::Detector(format!("session {} is not streaming", self.id)));
        }
        self.frames += 1;

        let image = match decode_frame(&request.frame) {
            Ok(image) => image,
            Err(e) => {
                debug!("[Session {}] フレーム {} のデコードに失敗: {}", self.id, self.frames, e);
                return Ok(FrameResponse::error(e.to_string()));
            }
        };

        let detection = self.detector.detect(&image, self.clock.timestamp_ms())?;
        let Some(features) = self.encoder.encode(&detection, &mut self.clock) else {
            return Ok(FrameResponse::empty());
        };
        self.hands_seen += 1;

        Ok(FrameResponse::label(self.classifier.predict(&features)))
    }

    /// セッションを閉じて検出器を解放
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        info!(
            "[Session {}] 終了: {} フレーム処理 (手あり {})",
            self.id, self.frames, self.hands_seen
        );
    }
}

/// 送受信チャネル上でセッションを実行する
///
/// 受信側が閉じる・Close を受け取る・致命的なエラーが起きるまで続けます。
pub async fn drive<S, R, E>(mut sender: S, mut receiver: R, mut session: Session) -> Session
where
    S: Sink<Message> + Unpin,
    <S as Sink<Message>>::Error: Display,
    R: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: Display,
{
    session.start();

    while let Some(message) = receiver.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!("[Session {}] 受信エラー: {}", session.id(), e);
                break;
            }
        };

        let response = match message {
            Message::Text(text) => match block_in_place(|| session.handle_text(text.as_str())) {
                Ok(response) => response,
                Err(e) => {
                    error!("[Session {}] セッションを終了します: {}", session.id(), e);
                    break;
                }
            },
            Message::Binary(_) => FrameResponse::error("binary messages are not supported"),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
        };

        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                error!("[Session {}] レスポンスのシリアライズに失敗: {}", session.id(), e);
                break;
            }
        };
        if let Err(e) = sender.send(Message::Text(payload.into())).await {
            warn!("[Session {}] 送信エラー: {}", session.id(), e);
            break;
        }
    }

    session.close();
    session
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_requires_separator() {
        assert!(matches!(decode_frame("abc"), Err(SignError::TransportDecode(_))));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(
            decode_frame("data:image/jpeg;base64,@@@"),
            Err(SignError::TransportDecode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_non_image_bytes() {
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(b"not an image"));
        assert!(matches!(decode_frame(&payload), Err(SignError::TransportDecode(_))));
    }

    #[test]
    fn test_decode_png() {
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(RgbImage::new(4, 3))
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(bytes.get_ref()));

        let image = decode_frame(&payload).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
    }
}
