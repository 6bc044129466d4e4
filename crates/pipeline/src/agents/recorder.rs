//! Store-owning agent
//!
//! The only writer of the [`StateStore`]. Scored readings are applied together
//! with their prediction so the reading and prediction histories stay aligned;
//! unscored readings only extend the metric histories. A backlog from the
//! readings log is replayed at startup, before any message is handled.

use super::Telemetry;
use crate::bus::{Agent, AgentAddress, AgentContext, Envelope};
use crate::health::components;
use crate::models::{MessageKind, Reading};
use crate::store::StateStore;
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub struct RecorderAgent {
    address: AgentAddress,
    store: StateStore,
    telemetry: Telemetry,
    backlog: Vec<Reading>,
}

impl RecorderAgent {
    pub fn new(address: AgentAddress, store: StateStore, telemetry: Telemetry) -> Self {
        Self {
            address,
            store,
            telemetry,
            backlog: Vec::new(),
        }
    }

    /// Readings to restore into the store on startup, oldest first
    pub fn with_backlog(mut self, backlog: Vec<Reading>) -> Self {
        self.backlog = backlog;
        self
    }

    async fn replay_backlog(&mut self) {
        if self.backlog.is_empty() {
            return;
        }

        let mut restored = 0usize;
        for reading in std::mem::take(&mut self.backlog) {
            if let Err(e) = reading.blood_pressure() {
                warn!(error = %e, "Skipping logged reading");
                continue;
            }
            self.store.record_reading(&reading).await;
            restored += 1;
        }

        let buffered = self.store.readings_len().await;
        self.telemetry.metrics.set_buffered_readings(buffered);
        info!(restored = restored, buffered = buffered, "Restored readings from log");
    }
}

#[async_trait]
impl Agent for RecorderAgent {
    fn address(&self) -> &AgentAddress {
        &self.address
    }

    async fn on_startup(&mut self, _ctx: &AgentContext) {
        self.replay_backlog().await;
        self.telemetry.health.set_healthy(components::RECORDER).await;
    }

    async fn on_message(&mut self, _ctx: &AgentContext, envelope: Envelope) {
        let message = envelope.message;
        match message.kind() {
            MessageKind::Reading => self.store.record_reading(&message.reading).await,
            MessageKind::Enriched => {
                self.store
                    .record(&message.reading, message.prediction)
                    .await
            }
        }

        let buffered = self.store.readings_len().await;
        self.telemetry.metrics.set_buffered_readings(buffered);
        debug!(
            sequence = message.sequence,
            from = %envelope.sender,
            buffered = buffered,
            "Recorded reading"
        );
    }
}
