//! Credential extraction and the access-control gate.
//!
//! The proxy does not validate credentials itself; it requires that one is
//! present and forwards it verbatim on every outbound call. The optional
//! access-control service is consulted once per request, before any outbound
//! I/O.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use ferry_client::{Credential, UpstreamError};

use crate::error::AppError;
use crate::state::AppState;

/// The caller's credential, extracted from the `Authorization` header or the
/// `access_token` cookie.
///
/// Use this as an extractor parameter in any handler that talks to a source
/// or target service:
///
/// ```ignore
/// async fn my_handler(caller: Caller) -> AppResult<Json<()>> {
///     state.client.list(&url, &caller.credential).await?;
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Caller {
    pub credential: Credential,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let access_token = parts
            .headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(cookie_value);

        let credential = Credential {
            authorization,
            access_token,
        };

        if credential.is_empty() {
            return Err(AppError::Unauthorized(
                "Missing credentials. Provide an Authorization header or access_token cookie"
                    .into(),
            ));
        }

        Ok(Caller { credential })
    }
}

/// Pull the `access_token` value out of a `Cookie` header.
fn cookie_value(header: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "access_token").then(|| value.to_string())
    })
}

/// Consult the access-control service, when one is configured. A non-2xx
/// answer denies the request; transport failures surface as upstream errors.
pub async fn authorize(state: &AppState, credential: &Credential) -> Result<(), AppError> {
    let Some(gate_url) = &state.config.access_control_url else {
        return Ok(());
    };

    match state.client.probe(gate_url, credential).await {
        Ok(()) => Ok(()),
        Err(UpstreamError::Rejected { status, .. }) => {
            tracing::warn!(status, "Access control denied request");
            Err(AppError::Forbidden("Access denied".into()))
        }
        Err(err) => Err(AppError::Upstream(err)),
    }
}
