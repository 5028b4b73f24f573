//! Fakes shared by the pipeline and supervisor tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gossip_broker::{BrokerError, Delivery, MessageQueue, Subscription, Unsubscribe};
use gossip_types::Msg;
use tokio::sync::mpsc;

use crate::pipeline::ChatLog;

/// Chat log keyed by `(channel, seq)`, with injectable append failures.
#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<BTreeMap<(String, u64), Msg>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
}

impl MemoryLog {
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn messages(&self, channel: &str) -> Vec<Msg> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|((ch, _), _)| ch == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl ChatLog for MemoryLog {
    fn append_message(&self, channel_id: &str, msg: &Msg) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("store unavailable");
        }
        self.entries
            .lock()
            .unwrap()
            .entry((channel_id.to_string(), msg.seq))
            .or_insert_with(|| msg.clone());
        Ok(())
    }
}

/// Queue handing each new subscription the next scripted batch of
/// deliveries. Subscriptions stay open until unsubscribed.
#[derive(Default)]
pub struct ScriptedQueue {
    scripts: Mutex<VecDeque<Vec<Delivery>>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<Delivery>>>,
    unsubscribes: Arc<AtomicUsize>,
}

impl ScriptedQueue {
    pub fn script(&self, deliveries: Vec<Delivery>) {
        self.scripts.lock().unwrap().push_back(deliveries);
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

struct CountingCloser(Arc<AtomicUsize>);

impl Unsubscribe for CountingCloser {
    fn unsubscribe(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl MessageQueue for ScriptedQueue {
    fn subscribe_queue(&self, _subject: &str, _group: &str) -> Result<Subscription, BrokerError> {
        let batch = self.scripts.lock().unwrap().pop_front().ok_or(BrokerError::Closed)?;
        let (tx, rx) = mpsc::unbounded_channel();
        for delivery in batch {
            let _ = tx.send(delivery);
        }
        self.senders.lock().unwrap().push(tx);
        Ok(Subscription::new(rx, Arc::new(CountingCloser(self.unsubscribes.clone()))))
    }
}

/// Poll `cond` until it holds, failing the test after a few seconds.
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}
