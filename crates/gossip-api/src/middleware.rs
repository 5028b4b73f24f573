use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::warn;

use crate::auth::AppState;
use crate::error::ApiError;

/// Check HTTP basic credentials against the configured admin account.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|encoded| B64.decode(encoded.trim()).ok())
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or(ApiError::Unauthorized)?;

    let (user, password) = credentials.split_once(':').ok_or(ApiError::Unauthorized)?;
    if user != state.admin_user || password != state.admin_password {
        warn!("Rejected admin credentials for user '{}'", user);
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(req).await)
}
