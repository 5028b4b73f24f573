//! Types shared between the chat registry, the ingestion pipeline, the store
//! and the HTTP API.

pub mod api;
pub mod models;

pub use models::{Msg, User};
