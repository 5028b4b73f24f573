use axum::{Json, extract::State};
use tracing::{debug, error};

use gossip_broker::encode_msg;
use gossip_ingest::queue_name;
use gossip_types::Msg;
use gossip_types::api::{HistoryRequest, SendMessageRequest, SendMessageResponse};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::validate::{MAX_HISTORY, Validate};

/// POST /chat/send_message — publish a message on the channel's queue.
///
/// The message reaches the read model asynchronously, through the channel's
/// ingest pipeline.
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    req.validate()?;

    let registry = state.registry.clone();
    let (channel, nick, secret) = (req.channel.clone(), req.nick.clone(), req.secret.clone());
    blocking(move || Ok(registry.authenticate_member(&channel, &nick, &secret)?)).await?;

    state.supervisor.ensure(&req.channel).map_err(|e| {
        error!("Could not start ingest for {}: {}", req.channel, e);
        ApiError::Internal
    })?;

    let msg = Msg::new(req.nick, req.text);
    let seq = state
        .broker
        .publish(&queue_name(&req.channel), encode_msg(&msg))
        .map_err(|e| {
            error!("Publish to {} failed: {}", req.channel, e);
            ApiError::Internal
        })?;

    debug!("Published {} on {}", seq, req.channel);
    Ok(Json(SendMessageResponse { seq }))
}

/// POST /chat/history — recent messages of a channel. Marks them read for
/// the requesting nick.
pub async fn history(
    State(state): State<AppState>,
    Json(req): Json<HistoryRequest>,
) -> Result<Json<Vec<Msg>>, ApiError> {
    req.validate()?;

    let registry = state.registry.clone();
    let limit = req.limit.min(MAX_HISTORY);
    let messages =
        blocking(move || Ok(registry.history(&req.channel, &req.nick, &req.secret, limit)?)).await?;

    Ok(Json(messages))
}
