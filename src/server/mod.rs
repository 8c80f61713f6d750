mod api;
mod error;
pub mod session;
mod state;
pub mod types;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

pub use self::error::AppError;
pub use self::session::{decode_frame, drive, Session, SessionState};
pub use self::state::*;

/// API サーバーを構築
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(api::ws_handler))
        .route("/health", get(api::health_handler))
        .with_state(state)
}
