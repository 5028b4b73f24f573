//! Channel registry and the identity-claim protocol.
//!
//! A [`Channel`] is a secret-gated namespace of claimed nicks. Claims are pure
//! in-memory operations on the aggregate; the [`Registry`] brackets them with
//! a per-channel lock and the load/save round trip through a [`Store`] so a
//! claim and its persistence form one unit.

pub mod channel;
pub mod error;
pub mod registry;
pub mod secret;
pub mod store;

pub use channel::Channel;
pub use error::{ChatError, StoreError};
pub use registry::Registry;
pub use store::Store;
