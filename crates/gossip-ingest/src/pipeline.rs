use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use gossip_broker::{BrokerError, Delivery, MessageQueue, Unsubscribe, decode_msg};
use gossip_types::Msg;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::stats::IngestStats;

/// Queue group every ingest pipeline joins.
pub const INGEST_GROUP: &str = "ingest";

/// Sender of the entry written in place of an undecodable delivery.
pub const PLACEHOLDER_FROM: &str = "ingest";

pub const PLACEHOLDER_TEXT: &str = "ingest: message unavailable: decoding error";

/// Broker subject carrying a channel's messages.
pub fn queue_name(channel_id: &str) -> String {
    format!("chat.{channel_id}")
}

/// Entry appended when a delivery cannot be decoded, so the channel's
/// history keeps the position.
pub fn placeholder() -> Msg {
    Msg {
        from: PLACEHOLDER_FROM.to_string(),
        text: PLACEHOLDER_TEXT.to_string(),
        time: Utc::now(),
        seq: 0,
    }
}

/// Append side of the chat store.
pub trait ChatLog: Send + Sync + 'static {
    /// Append `msg` to the log of `channel_id`. Appending a `(channel, seq)`
    /// pair that is already present must succeed without adding an entry.
    fn append_message(&self, channel_id: &str, msg: &Msg) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("ingest: could not subscribe: {0}")]
    Subscribe(#[from] BrokerError),
}

/// Starts ingestion pipelines.
#[derive(Clone)]
pub struct Ingest {
    mq: Arc<dyn MessageQueue>,
    store: Arc<dyn ChatLog>,
    stats: Arc<IngestStats>,
}

impl Ingest {
    pub fn new(mq: Arc<dyn MessageQueue>, store: Arc<dyn ChatLog>) -> Self {
        Self {
            mq,
            store,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// Subscribe to the channel's queue and start appending its deliveries.
    ///
    /// Must be called from within a tokio runtime; the delivery loop runs on
    /// its own task until the returned handle is stopped.
    pub fn run(&self, channel_id: &str) -> Result<StopHandle, IngestError> {
        let subscription = self.mq.subscribe_queue(&queue_name(channel_id), INGEST_GROUP)?;
        let (deliveries, closer) = subscription.into_parts();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            channel_id.to_string(),
            deliveries,
            self.store.clone(),
            self.stats.clone(),
            cancel.clone(),
        ));

        info!("Ingest for {} started", channel_id);
        Ok(StopHandle {
            channel: channel_id.to_string(),
            cancel,
            closer,
            stopped: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
        })
    }
}

async fn run_loop(
    channel: String,
    mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    store: Arc<dyn ChatLog>,
    stats: Arc<IngestStats>,
    cancel: CancellationToken,
) {
    loop {
        let delivery = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = deliveries.recv() => match next {
                Some(delivery) => delivery,
                None => {
                    debug!("Subscription for {} closed", channel);
                    break;
                }
            },
        };

        // Left unsettled, the delivery goes back to the queue group.
        if cancel.is_cancelled() {
            break;
        }

        handle(&channel, delivery, &store, &stats).await;
    }

    // Anything still buffered is dropped unsettled here and redelivered.
    drop(deliveries);
    debug!("Ingest loop for {} exited", channel);
}

async fn handle(channel: &str, delivery: Delivery, store: &Arc<dyn ChatLog>, stats: &IngestStats) {
    let seq = delivery.seq();

    let (mut msg, substituted) = match decode_msg(delivery.payload()) {
        Ok(msg) => (msg, false),
        Err(e) => {
            warn!("Ingest {}: delivery {} undecodable: {}", channel, seq, e);
            (placeholder(), true)
        }
    };
    msg.seq = seq;

    let store = store.clone();
    let target = channel.to_string();
    let appended = tokio::task::spawn_blocking(move || store.append_message(&target, &msg)).await;

    match appended {
        Ok(Ok(())) => {
            if substituted {
                stats.record_placeholder();
            }
            stats.record_append();
            delivery.ack();
        }
        Ok(Err(e)) => {
            stats.record_append_failure();
            warn!("Ingest {}: append of {} failed, requesting redelivery: {}", channel, seq, e);
            delivery.nack();
        }
        Err(e) => {
            stats.record_append_failure();
            error!("Ingest {}: append task for {} failed: {}", channel, seq, e);
            delivery.nack();
        }
    }
}

/// Stops one pipeline. Stopping is idempotent and never waits for the
/// delivery loop; use [`StopHandle::stopped`] to wait for it.
///
/// Dropping the handle stops the pipeline.
pub struct StopHandle {
    channel: String,
    cancel: CancellationToken,
    closer: Arc<dyn Unsubscribe>,
    stopped: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StopHandle {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Cancel the delivery loop and leave the queue group. An append already
    /// in progress completes and is acknowledged.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        self.closer.unsubscribe();
        info!("Ingest for {} stopped", self.channel);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wait until the delivery loop has exited.
    pub async fn stopped(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Ingest loop for {} panicked: {}", self.channel, e);
            }
        }
    }
}

impl Drop for StopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
