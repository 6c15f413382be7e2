//! Outbound event bus.
//!
//! Publishes results of successful commands to in-process subscribers such as
//! platform action wrappers.

use async_trait::async_trait;
use cmdhub_core::{EventPublisher, HubResult, OutboundEvent};
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 256;

pub struct BroadcastPublisher {
    sender: broadcast::Sender<OutboundEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { sender: tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    /// Having no subscribers is not an error; the event is dropped.
    async fn publish(&self, event: OutboundEvent) -> HubResult<()> {
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers, "Published outbound event"),
            Err(broadcast::error::SendError(event)) => {
                debug!(session_id = %event.session_id, "No outbound subscribers; event dropped")
            }
        }
        Ok(())
    }
}
