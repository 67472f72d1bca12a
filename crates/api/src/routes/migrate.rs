//! Route definitions for the export/import endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{export, import};
use crate::state::AppState;

/// ```text
/// GET    /export   -> export::export   (query-driven)
/// POST   /import   -> import::import   (multipart)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/export", get(export::export))
        .route("/import", post(import::import))
}
