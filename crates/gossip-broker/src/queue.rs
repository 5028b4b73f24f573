use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker is closed")]
    Closed,

    #[error("invalid subject or queue group: {0:?}")]
    InvalidSubject(String),
}

/// How a delivery was settled by its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handled; the broker forgets the message.
    Ack,
    /// Not handled; the broker redelivers the message.
    Nack,
}

type Settle = Box<dyn FnOnce(Outcome) + Send>;

/// One message handed to one member of a queue group.
///
/// A delivery must be settled with [`Delivery::ack`] or [`Delivery::nack`].
/// Dropping it unsettled counts as a nack, so a handler that bails out early
/// never loses the message.
pub struct Delivery {
    seq: u64,
    payload: Bytes,
    settle: Option<Settle>,
}

impl Delivery {
    pub fn new(seq: u64, payload: Bytes, settle: impl FnOnce(Outcome) + Send + 'static) -> Self {
        Self {
            seq,
            payload,
            settle: Some(Box::new(settle)),
        }
    }

    /// A delivery whose settlement goes nowhere.
    pub fn detached(seq: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            seq,
            payload: payload.into(),
            settle: None,
        }
    }

    /// Broker-assigned position of this message within its subject.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn ack(mut self) {
        self.finish(Outcome::Ack);
    }

    pub fn nack(mut self) {
        self.finish(Outcome::Nack);
    }

    /// Take the message back without settling it.
    pub(crate) fn disarm(mut self) -> (u64, Bytes) {
        self.settle = None;
        (self.seq, std::mem::take(&mut self.payload))
    }

    fn finish(&mut self, outcome: Outcome) {
        if let Some(settle) = self.settle.take() {
            settle(outcome);
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.finish(Outcome::Nack);
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("seq", &self.seq)
            .field("len", &self.payload.len())
            .field("settled", &self.settle.is_none())
            .finish()
    }
}

/// Releases a queue subscription. Must be idempotent.
pub trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self);
}

/// An active membership in a queue group.
pub struct Subscription {
    deliveries: mpsc::UnboundedReceiver<Delivery>,
    closer: Arc<dyn Unsubscribe>,
}

impl Subscription {
    pub fn new(deliveries: mpsc::UnboundedReceiver<Delivery>, closer: Arc<dyn Unsubscribe>) -> Self {
        Self { deliveries, closer }
    }

    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<Delivery>, Arc<dyn Unsubscribe>) {
        (self.deliveries, self.closer)
    }
}

/// Queue-group subscriptions: every message published on a subject is
/// delivered at least once to exactly one member of each group subscribed to
/// it.
pub trait MessageQueue: Send + Sync {
    fn subscribe_queue(&self, subject: &str, group: &str) -> Result<Subscription, BrokerError>;
}
