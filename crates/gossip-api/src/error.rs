use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use gossip_chat::ChatError;
use gossip_types::api::ErrorResponse;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Chat(ChatError::NickTaken | ChatError::ChannelExists(_)) => StatusCode::CONFLICT,
            ApiError::Chat(ChatError::ChannelNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Chat(ChatError::InvalidChannelSecret) => StatusCode::FORBIDDEN,
            ApiError::Chat(ChatError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Chat(ChatError::StoreUnavailable(_)) | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Store failures are logged here and reported without detail.
        let message = match &self {
            ApiError::Chat(ChatError::StoreUnavailable(e)) => {
                error!("Store failure: {:#}", e);
                "store unavailable".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(ErrorResponse { error: message });

        if status == StatusCode::UNAUTHORIZED {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"gossip\"")],
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}

/// Run blocking store work off the async runtime.
pub async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
}
