use std::sync::Arc;

use axum::{Json, extract::State};
use tracing::info;

use gossip_broker::MemoryBroker;
use gossip_chat::Registry;
use gossip_ingest::Supervisor;
use gossip_types::User;
use gossip_types::api::{RegisterNickRequest, SecretResponse};

use crate::error::{ApiError, blocking};
use crate::validate::Validate;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub registry: Arc<Registry>,
    pub broker: MemoryBroker,
    pub supervisor: Supervisor,
    pub admin_user: String,
    pub admin_password: String,
}

/// POST /chat/register_nick — claim a nick, or re-claim it with its secret.
pub async fn register_nick(
    State(state): State<AppState>,
    Json(req): Json<RegisterNickRequest>,
) -> Result<Json<SecretResponse>, ApiError> {
    req.validate()?;

    let registry = state.registry.clone();
    let channel = req.channel.clone();
    let nick = req.nick.clone();
    let secret = blocking(move || {
        let candidate = User::new(req.nick, req.full_name, req.email);
        Ok(registry.register(&req.channel, &req.channel_secret, candidate, &req.secret)?)
    })
    .await?;

    info!("Nick {} claimed in {}", nick, channel);
    Ok(Json(SecretResponse { secret }))
}
