use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::queue::{BrokerError, Delivery, MessageQueue, Outcome, Subscription, Unsubscribe};

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// How long a negatively acknowledged message waits before redelivery.
    pub redelivery_delay: Duration,
    /// Unsettled deliveries a single group member may hold.
    pub max_in_flight: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            redelivery_delay: Duration::from_millis(500),
            max_in_flight: 1,
        }
    }
}

/// In-process broker with durable queue groups.
///
/// Every subject numbers its messages from 1. Each queue group on a subject
/// keeps its own backlog, which survives while the group has no members.
/// Members are served round-robin, each holding at most
/// `max_in_flight` unsettled deliveries. A nacked (or dropped) delivery goes
/// back into its group's backlog at its seq position, ahead of newer work.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    config: BrokerConfig,
    state: Mutex<BrokerState>,
    next_member: AtomicU64,
}

#[derive(Default)]
struct BrokerState {
    closed: bool,
    subjects: HashMap<String, SubjectState>,
}

#[derive(Default)]
struct SubjectState {
    last_seq: u64,
    groups: HashMap<String, Group>,
}

#[derive(Default)]
struct Group {
    backlog: VecDeque<(u64, Bytes)>,
    members: Vec<Member>,
    next: usize,
}

struct Member {
    id: u64,
    tx: mpsc::UnboundedSender<Delivery>,
    in_flight: usize,
}

/// Identifies one member of one queue group.
#[derive(Clone)]
struct MemberKey {
    subject: String,
    group: String,
    id: u64,
}

impl MemoryBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                config,
                state: Mutex::new(BrokerState::default()),
                next_member: AtomicU64::new(1),
            }),
        }
    }

    /// Publish `payload` on `subject`, returning its sequence number.
    ///
    /// Messages published before any group subscribed to the subject are not
    /// retained.
    pub fn publish(&self, subject: &str, payload: impl Into<Bytes>) -> Result<u64, BrokerError> {
        let payload = payload.into();
        let mut graveyard = Vec::new();

        let seq = {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(BrokerError::Closed);
            }

            let subj = state.subjects.entry(subject.to_string()).or_default();
            subj.last_seq += 1;
            let seq = subj.last_seq;

            if subj.groups.is_empty() {
                debug!("No queue group on {}, message {} dropped", subject, seq);
            }

            for (name, group) in subj.groups.iter_mut() {
                group.backlog.push_back((seq, payload.clone()));
                self.inner.pump(subject, name, group, &mut graveyard);
            }
            seq
        };

        drop(graveyard);
        Ok(seq)
    }

    /// Messages waiting in a group's backlog (not yet handed to a member).
    pub fn backlog(&self, subject: &str, group: &str) -> usize {
        self.inner
            .lock()
            .subjects
            .get(subject)
            .and_then(|s| s.groups.get(group))
            .map_or(0, |g| g.backlog.len())
    }

    /// Number of members currently in a group.
    pub fn members(&self, subject: &str, group: &str) -> usize {
        self.inner
            .lock()
            .subjects
            .get(subject)
            .and_then(|s| s.groups.get(group))
            .map_or(0, |g| g.members.len())
    }

    /// Stop accepting publishes and subscriptions and detach every member.
    /// Members drain what was already handed to them, then see end of stream.
    pub fn shutdown(&self) {
        let detached: Vec<Member> = {
            let mut state = self.inner.lock();
            state.closed = true;
            state
                .subjects
                .values_mut()
                .flat_map(|s| s.groups.values_mut())
                .flat_map(|g| g.members.drain(..))
                .collect()
        };
        debug!("Broker shut down, {} members detached", detached.len());
    }
}

impl MessageQueue for MemoryBroker {
    fn subscribe_queue(&self, subject: &str, group: &str) -> Result<Subscription, BrokerError> {
        if subject.is_empty() || group.is_empty() {
            return Err(BrokerError::InvalidSubject(format!("{subject}/{group}")));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_member.fetch_add(1, Ordering::Relaxed);
        let mut graveyard = Vec::new();

        {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(BrokerError::Closed);
            }

            let g = state
                .subjects
                .entry(subject.to_string())
                .or_default()
                .groups
                .entry(group.to_string())
                .or_default();
            g.members.push(Member { id, tx, in_flight: 0 });
            self.inner.pump(subject, group, g, &mut graveyard);
        }
        drop(graveyard);

        debug!("Member {} joined queue group {} on {}", id, group, subject);

        let closer = MemberHandle {
            broker: Arc::downgrade(&self.inner),
            key: MemberKey {
                subject: subject.to_string(),
                group: group.to_string(),
                id,
            },
            closed: AtomicBool::new(false),
        };
        Ok(Subscription::new(rx, Arc::new(closer)))
    }
}

impl BrokerInner {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand backlog messages to members with spare capacity.
    ///
    /// Members whose receiver is gone are moved into `graveyard`; the caller
    /// drops them after releasing the state lock.
    fn pump(self: &Arc<Self>, subject: &str, group_name: &str, group: &mut Group, graveyard: &mut Vec<Member>) {
        let max = self.config.max_in_flight.max(1);

        while !group.backlog.is_empty() {
            let n = group.members.len();
            let Some(idx) = (0..n)
                .map(|i| (group.next + i) % n)
                .find(|&i| group.members[i].in_flight < max)
            else {
                break;
            };

            let Some((seq, payload)) = group.backlog.pop_front() else {
                break;
            };
            let member = &mut group.members[idx];
            let key = MemberKey {
                subject: subject.to_string(),
                group: group_name.to_string(),
                id: member.id,
            };
            let delivery = Delivery::new(seq, payload.clone(), settle_fn(Arc::downgrade(self), key, seq, payload));

            match member.tx.send(delivery) {
                Ok(()) => {
                    member.in_flight += 1;
                    group.next = (idx + 1) % n;
                }
                Err(mpsc::error::SendError(delivery)) => {
                    let (seq, payload) = delivery.disarm();
                    group.backlog.push_front((seq, payload));
                    graveyard.push(group.members.remove(idx));
                    group.next = 0;
                }
            }
        }
    }

    fn with_group(
        self: &Arc<Self>,
        key: &MemberKey,
        f: impl FnOnce(&mut Group, &mut Vec<Member>),
    ) {
        let mut graveyard = Vec::new();
        {
            let mut state = self.lock();
            let Some(group) = state
                .subjects
                .get_mut(&key.subject)
                .and_then(|s| s.groups.get_mut(&key.group))
            else {
                return;
            };
            f(group, &mut graveyard);
            self.pump(&key.subject, &key.group, group, &mut graveyard);
        }
        drop(graveyard);
    }

    fn settle(self: &Arc<Self>, key: MemberKey, seq: u64, payload: Bytes, outcome: Outcome) {
        match outcome {
            Outcome::Ack => self.with_group(&key, |group, _| release(group, key.id)),
            Outcome::Nack => {
                let delay = self.config.redelivery_delay;
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) if !delay.is_zero() => {
                        let broker = Arc::downgrade(self);
                        handle.spawn(async move {
                            tokio::time::sleep(delay).await;
                            if let Some(broker) = broker.upgrade() {
                                broker.requeue(key, seq, payload);
                            }
                        });
                    }
                    _ => self.requeue(key, seq, payload),
                }
            }
        }
    }

    /// Put a nacked message back into its group's backlog, which stays
    /// ordered by seq. The member's in-flight slot stays occupied until this
    /// point.
    fn requeue(self: &Arc<Self>, key: MemberKey, seq: u64, payload: Bytes) {
        debug!("Redelivering {} on {}/{}", seq, key.subject, key.group);
        self.with_group(&key, |group, _| {
            release(group, key.id);
            let pos = group.backlog.partition_point(|(s, _)| *s < seq);
            group.backlog.insert(pos, (seq, payload));
        });
    }

    fn remove_member(self: &Arc<Self>, key: &MemberKey) {
        self.with_group(key, |group, graveyard| {
            if let Some(pos) = group.members.iter().position(|m| m.id == key.id) {
                graveyard.push(group.members.remove(pos));
                group.next = 0;
            }
        });
    }
}

fn release(group: &mut Group, member_id: u64) {
    if let Some(m) = group.members.iter_mut().find(|m| m.id == member_id) {
        m.in_flight = m.in_flight.saturating_sub(1);
    }
}

fn settle_fn(broker: Weak<BrokerInner>, key: MemberKey, seq: u64, payload: Bytes) -> impl FnOnce(Outcome) + Send + 'static {
    move |outcome| match broker.upgrade() {
        Some(broker) => broker.settle(key, seq, payload, outcome),
        None => warn!("Delivery {} settled after broker was dropped", seq),
    }
}

struct MemberHandle {
    broker: Weak<BrokerInner>,
    key: MemberKey,
    closed: AtomicBool,
}

impl Unsubscribe for MemberHandle {
    fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(broker) = self.broker.upgrade() {
            broker.remove_member(&self.key);
            debug!(
                "Member {} left queue group {} on {}",
                self.key.id, self.key.group, self.key.subject
            );
        }
    }
}
