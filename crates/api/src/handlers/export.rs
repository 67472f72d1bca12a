//! Handler for the export endpoint.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use ferry_core::codec::{Dialect, Format};
use serde::Deserialize;

use crate::engine::export::{self, ExportOptions};
use crate::error::{AppError, AppResult};
use crate::handlers::parse_lookup_config;
use crate::middleware::auth::{authorize, Caller};
use crate::state::AppState;

/// Query parameters for the export endpoint.
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    /// Source service endpoint to export from.
    pub url: Option<String>,
    /// Export format: json, csv, or mermaid (default: json).
    #[serde(rename = "type")]
    pub format: Option<String>,
    /// Attach reference metadata (default: true).
    pub enrich: Option<bool>,
    /// Convert to a nested tree (json only, default: false).
    pub tree: Option<bool>,
    /// Diagram dialect (mermaid only, default: flowchart).
    pub diagram_type: Option<String>,
    /// JSON object with custom lookup fields per collection.
    pub lookup_config: Option<String>,
}

/// GET /export
///
/// Fetch a collection from the source service and return it encoded in the
/// requested format, as a file download.
pub async fn export(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<ExportParams>,
) -> AppResult<Response> {
    let url = params
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing required parameter: url".into()))?;
    let format = Format::parse(params.format.as_deref().unwrap_or("json"))?;
    let dialect = Dialect::parse(params.diagram_type.as_deref().unwrap_or("flowchart"))?;
    let lookup = parse_lookup_config(params.lookup_config.as_deref())?;

    authorize(&state, &caller.credential).await?;

    let output = export::run(
        &state,
        &caller.credential,
        ExportOptions {
            url,
            format,
            enrich: params.enrich.unwrap_or(true),
            tree: params.tree.unwrap_or(false),
            dialect,
            lookup,
        },
    )
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, output.media_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", output.filename),
            ),
        ],
        output.body,
    )
        .into_response())
}
