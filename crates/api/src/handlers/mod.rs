pub mod export;
pub mod import;

use ferry_core::lookup::LookupConfig;

use crate::error::AppError;

/// Parse the `lookup_config` query parameter: a JSON object mapping
/// collection names to ordered lookup field lists.
pub(crate) fn parse_lookup_config(raw: Option<&str>) -> Result<Option<LookupConfig>, AppError> {
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|_| AppError::BadRequest("Invalid lookup_config JSON".into())),
    }
}
