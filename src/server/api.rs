use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use futures::StreamExt;
use log::warn;

use super::error::{AppError, Result};
use super::session::drive;
use super::state::AppState;
use super::types::HealthResponse;

/// 推論セッション（WebSocket）
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Result<Response> {
    let permit = state.admission.clone().try_acquire_owned().map_err(|_| {
        warn!("同時セッション数の上限 ({}) に達しました", state.settings.max_sessions);
        AppError::Busy
    })?;
    let session = state.open_session()?;

    Ok(ws.on_upgrade(move |socket| async move {
        let (sender, receiver) = socket.split();
        drive(sender, receiver, session).await;
        drop(permit);
    }))
}

/// ヘルスチェック
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        // 分類器が読み込めない場合はサーバー自体が起動しない
        model_loaded: true,
    })
}
