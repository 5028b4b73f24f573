use std::collections::HashMap;
use std::sync::Mutex;

use tracing::info;

use crate::pipeline::{Ingest, IngestError, StopHandle};

/// Keeps at most one running pipeline per channel.
pub struct Supervisor {
    ingest: Ingest,
    running: Mutex<HashMap<String, StopHandle>>,
}

impl Supervisor {
    pub fn new(ingest: Ingest) -> Self {
        Self {
            ingest,
            running: Mutex::new(HashMap::new()),
        }
    }

    pub fn ingest(&self) -> &Ingest {
        &self.ingest
    }

    /// Start the channel's pipeline unless it is already running. Returns
    /// whether a pipeline was started.
    pub fn ensure(&self, channel: &str) -> Result<bool, IngestError> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.contains_key(channel) {
            return Ok(false);
        }
        let handle = self.ingest.run(channel)?;
        running.insert(channel.to_string(), handle);
        Ok(true)
    }

    /// Stop the channel's pipeline. Returns whether one was running.
    pub fn stop(&self, channel: &str) -> bool {
        let handle = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(channel);
        match handle {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    /// Channels with a running pipeline, sorted.
    pub fn running(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        channels.sort();
        channels
    }

    /// Stop every pipeline and wait for their loops to exit.
    pub async fn stop_all(&self) {
        let handles: Vec<StopHandle> = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, h)| h)
            .collect();

        for handle in &handles {
            handle.stop();
        }
        for handle in &handles {
            handle.stopped().await;
        }
        info!("Stopped {} ingest pipelines", handles.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use gossip_broker::{BrokerConfig, MemoryBroker, encode_msg};
    use gossip_types::Msg;

    use crate::pipeline::INGEST_GROUP;
    use crate::testing::{MemoryLog, wait_for};

    fn setup() -> (MemoryBroker, Arc<MemoryLog>, Supervisor) {
        let broker = MemoryBroker::new(BrokerConfig {
            redelivery_delay: Duration::ZERO,
            max_in_flight: 1,
        });
        let log = Arc::new(MemoryLog::default());
        let supervisor = Supervisor::new(Ingest::new(Arc::new(broker.clone()), log.clone()));
        (broker, log, supervisor)
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let (broker, _log, supervisor) = setup();

        assert!(supervisor.ensure("general").unwrap());
        assert!(!supervisor.ensure("general").unwrap());
        assert!(supervisor.ensure("random").unwrap());

        assert_eq!(supervisor.running(), vec!["general", "random"]);
        assert_eq!(broker.members("chat.general", INGEST_GROUP), 1);
    }

    #[tokio::test]
    async fn channels_are_ingested_independently() {
        let (broker, log, supervisor) = setup();
        supervisor.ensure("general").unwrap();
        supervisor.ensure("random").unwrap();

        broker.publish("chat.general", encode_msg(&Msg::new("alice", "g1"))).unwrap();
        broker.publish("chat.random", encode_msg(&Msg::new("bob", "r1"))).unwrap();
        broker.publish("chat.general", encode_msg(&Msg::new("alice", "g2"))).unwrap();

        wait_for(|| log.messages("general").len() == 2 && log.messages("random").len() == 1).await;
        assert_eq!(log.messages("random")[0].seq, 1);
        assert_eq!(log.messages("general")[1].seq, 2);
    }

    #[tokio::test]
    async fn stop_and_stop_all() {
        let (broker, _log, supervisor) = setup();
        supervisor.ensure("general").unwrap();
        supervisor.ensure("random").unwrap();

        assert!(supervisor.stop("general"));
        assert!(!supervisor.stop("general"));
        assert_eq!(broker.members("chat.general", INGEST_GROUP), 0);

        supervisor.stop_all().await;
        assert!(supervisor.running().is_empty());
        assert_eq!(broker.members("chat.random", INGEST_GROUP), 0);
    }
}
