//! Broker plumbing for the chat backend.
//!
//! - `codec`: wire encoding of [`gossip_types::Msg`] payloads
//! - `queue`: the queue-group subscription contract ([`MessageQueue`])
//! - `memory`: an in-process, durable queue-group broker ([`MemoryBroker`])

pub mod codec;
pub mod memory;
pub mod queue;

pub use codec::{DecodeError, decode_msg, encode_msg};
pub use memory::{BrokerConfig, MemoryBroker};
pub use queue::{BrokerError, Delivery, MessageQueue, Outcome, Subscription, Unsubscribe};
