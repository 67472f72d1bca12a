//! Handler for the import endpoint.

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use ferry_core::codec::Format;
use ferry_core::report::ImportReport;
use serde::Deserialize;

use crate::engine::import::{self, ImportOptions, Policy};
use crate::error::{AppError, AppResult};
use crate::handlers::parse_lookup_config;
use crate::middleware::auth::{authorize, Caller};
use crate::state::AppState;

/// Query parameters for the import endpoint.
#[derive(Debug, Deserialize)]
pub struct ImportParams {
    /// Target service endpoint to import into.
    pub url: Option<String>,
    /// Import format: json, csv, or mermaid (default: json).
    #[serde(rename = "type")]
    pub format: Option<String>,
    /// How to handle ambiguous references: skip or fail (default: skip).
    pub on_ambiguous: Option<String>,
    /// How to handle missing references: skip or fail (default: skip).
    pub on_missing: Option<String>,
    /// Warn about circular parent references before importing
    /// (default: true).
    pub detect_cycles: Option<bool>,
    /// JSON object with custom lookup fields per collection.
    pub lookup_config: Option<String>,
}

/// POST /import
///
/// Decode the uploaded file, rebuild its reference graph against the target
/// service, create the records in dependency order, and return the report.
pub async fn import(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<ImportParams>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ImportReport>)> {
    let url = params
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing required parameter: url".into()))?;
    let format = Format::parse(params.format.as_deref().unwrap_or("json"))?;
    let on_ambiguous = Policy::parse(params.on_ambiguous.as_deref().unwrap_or("skip"))
        .map_err(|msg| AppError::BadRequest(format!("on_ambiguous: {msg}")))?;
    let on_missing = Policy::parse(params.on_missing.as_deref().unwrap_or("skip"))
        .map_err(|msg| AppError::BadRequest(format!("on_missing: {msg}")))?;

    // Validated for well-formedness; resolution itself runs off the lookup
    // metadata captured at export time.
    parse_lookup_config(params.lookup_config.as_deref())?;

    authorize(&state, &caller.credential).await?;

    let body = read_file_part(&mut multipart).await?;
    tracing::info!(
        url = %url,
        format = ?format,
        bytes = body.len(),
        "Import request received"
    );

    let (status, report) = import::run(
        &state,
        &caller.credential,
        ImportOptions {
            url,
            format,
            on_ambiguous,
            on_missing,
            detect_cycles: params.detect_cycles.unwrap_or(true),
        },
        &body,
    )
    .await?;

    Ok((status, Json(report)))
}

/// Pull the `file` part out of the multipart body as UTF-8 text.
async fn read_file_part(multipart: &mut Multipart) -> AppResult<String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.to_string()))?
    {
        if field.name() == Some("file") {
            return field
                .text()
                .await
                .map_err(|err| AppError::BadRequest(format!("Failed to read file: {err}")));
        }
    }
    Err(AppError::BadRequest("No file provided".into()))
}
