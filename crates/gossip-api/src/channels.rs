use axum::{Json, extract::State};
use tracing::{error, info};

use gossip_types::User;
use gossip_types::api::{ChannelMembersRequest, CreateChannelRequest, SecretResponse, UnreadCountRequest};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::validate::Validate;

/// POST /chat/admin/create_channel — create a channel and start ingesting it.
pub async fn create_channel(
    State(state): State<AppState>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<Json<SecretResponse>, ApiError> {
    req.validate()?;

    let registry = state.registry.clone();
    let name = req.name.clone();
    let channel = blocking(move || Ok(registry.create_channel(&name, req.private)?)).await?;

    state.supervisor.ensure(channel.name()).map_err(|e| {
        error!("Could not start ingest for {}: {}", channel.name(), e);
        ApiError::Internal
    })?;

    info!("Channel {} ready", channel.name());
    Ok(Json(SecretResponse {
        secret: channel.secret().to_string(),
    }))
}

/// POST /chat/admin/unread_count
pub async fn unread_count(
    State(state): State<AppState>,
    Json(req): Json<UnreadCountRequest>,
) -> Result<Json<u64>, ApiError> {
    req.validate()?;

    let registry = state.registry.clone();
    let count = blocking(move || Ok(registry.unread_count(&req.nick, &req.channel))).await?;
    Ok(Json(count))
}

/// GET /chat/list_channels
pub async fn list_channels(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let registry = state.registry.clone();
    let channels = blocking(move || Ok(registry.list_channels()?)).await?;
    Ok(Json(channels))
}

/// POST /chat/channel_members — members of a channel, secrets stripped.
pub async fn channel_members(
    State(state): State<AppState>,
    Json(req): Json<ChannelMembersRequest>,
) -> Result<Json<Vec<User>>, ApiError> {
    req.validate()?;

    let registry = state.registry.clone();
    let members = blocking(move || Ok(registry.members(&req.channel, &req.channel_secret)?)).await?;
    Ok(Json(members))
}
