//! HTTP API of the chat backend.
//!
//! Admin routes sit behind HTTP basic auth; everything else is gated by the
//! channel secret or a member secret carried in the request body.

pub mod auth;
pub mod channels;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod validate;

use axum::{
    Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::auth::AppState;
use crate::middleware::require_admin;

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/chat/admin/create_channel", post(channels::create_channel))
        .route("/chat/admin/unread_count", post(channels::unread_count))
        .layer(from_fn_with_state(state.clone(), require_admin))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/chat/list_channels", get(channels::list_channels))
        .route("/chat/register_nick", post(auth::register_nick))
        .route("/chat/channel_members", post(channels::channel_members))
        .route("/chat/send_message", post(messages::send_message))
        .route("/chat/history", post(messages::history))
        .route("/health", get(health))
        .with_state(state);

    Router::new().merge(admin_routes).merge(public_routes)
}

/// GET /health — ingest counters and the channels being ingested.
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ingest": state.supervisor.ingest().stats().snapshot(),
        "channels": state.supervisor.running(),
    }))
}
