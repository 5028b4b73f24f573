//! Per-channel ingestion of broker deliveries into the chat read model.
//!
//! One pipeline per channel joins the `ingest` queue group on
//! `chat.<channel>`, decodes each delivery, stamps it with the broker's
//! sequence number and appends it to a [`ChatLog`]. A delivery is only
//! acknowledged after its append succeeded; a failed append is nacked so the
//! broker redelivers it. Appends are keyed by `(channel, seq)`, which makes
//! redeliveries harmless.

pub mod pipeline;
pub mod stats;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use pipeline::{
    ChatLog, INGEST_GROUP, Ingest, IngestError, PLACEHOLDER_FROM, PLACEHOLDER_TEXT, StopHandle,
    placeholder, queue_name,
};
pub use stats::{IngestStats, StatsSnapshot};
pub use supervisor::Supervisor;
