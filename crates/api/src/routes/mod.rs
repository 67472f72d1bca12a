pub mod health;
pub mod migrate;

use axum::Router;

use crate::state::AppState;

/// Build the full route tree.
///
/// ```text
/// GET  /health    service health
/// GET  /version   crate version
/// GET  /export    export a collection from a source service
/// POST /import    import a file into a target service (multipart)
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(migrate::router())
}
