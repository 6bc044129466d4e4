//! Pipeline agents and their wiring
//!
//! `generator` → `predictor` → `recorder`. The generator emits a reading per
//! tick, the predictor scores it when it can, and the recorder applies the
//! reading, with its score if there is one, to the shared store.

mod generator;
mod prediction;
mod recorder;

#[cfg(test)]
mod tests;

pub use generator::{GeneratorAgent, ReadingGenerator};
pub use prediction::{ModelState, PredictionAgent};
pub use recorder::RecorderAgent;

use crate::bus::{AgentAddress, AgentRuntime, MessageBus, RuntimeError, DEFAULT_MAILBOX_CAPACITY};
use crate::health::HealthRegistry;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::persistence::ReadingsLog;
use crate::predictor::ModelLoader;
use crate::store::StateStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default agent addresses
pub mod addresses {
    pub const GENERATOR: &str = "generator";
    pub const PREDICTOR: &str = "predictor";
    pub const RECORDER: &str = "recorder";
}

/// Health, metrics and lifecycle logging shared by every agent
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub health: HealthRegistry,
    pub metrics: PipelineMetrics,
    pub logger: StructuredLogger,
}

impl Telemetry {
    pub fn new(health: HealthRegistry, logger: StructuredLogger) -> Self {
        Self {
            health,
            metrics: PipelineMetrics::new(),
            logger,
        }
    }
}

/// Builds and spawns the three pipeline agents on a fresh runtime
pub struct PipelineBuilder {
    store: StateStore,
    loader: Arc<dyn ModelLoader>,
    telemetry: Telemetry,
    interval: Duration,
    seed: Option<u64>,
    readings_log: Option<PathBuf>,
    log_capacity: usize,
    mailbox_capacity: usize,
    with_generator: bool,
}

impl PipelineBuilder {
    pub fn new(store: StateStore, loader: Arc<dyn ModelLoader>, telemetry: Telemetry) -> Self {
        let log_capacity = store.capacity();
        Self {
            store,
            loader,
            telemetry,
            interval: Duration::from_secs(10),
            seed: None,
            readings_log: None,
            log_capacity,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            with_generator: true,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn readings_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.readings_log = Some(path.into());
        self
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Leave out the generator, so readings are only fed in externally
    pub fn without_generator(mut self) -> Self {
        self.with_generator = false;
        self
    }

    /// Spawn the agents, downstream first, and return the running runtime.
    ///
    /// With a readings log configured, its readings are restored into the
    /// store before the recorder handles its first message.
    pub fn spawn(self) -> Result<AgentRuntime, RuntimeError> {
        let mut runtime = AgentRuntime::new(MessageBus::new(self.mailbox_capacity));
        let log = self
            .readings_log
            .map(|path| ReadingsLog::open(path, self.log_capacity));
        let backlog = log.as_ref().map(ReadingsLog::readings).unwrap_or_default();

        let recorder = runtime.spawn(
            RecorderAgent::new(
                AgentAddress::new(addresses::RECORDER),
                self.store,
                self.telemetry.clone(),
            )
            .with_backlog(backlog),
        )?;

        let predictor = runtime.spawn(PredictionAgent::new(
            AgentAddress::new(addresses::PREDICTOR),
            recorder,
            self.loader,
            self.telemetry.clone(),
        ))?;

        if self.with_generator {
            let generator = GeneratorAgent::new(
                AgentAddress::new(addresses::GENERATOR),
                predictor,
                self.interval,
                ReadingGenerator::new(self.seed),
                self.telemetry,
            );
            runtime.spawn(match log {
                Some(log) => generator.with_log(log),
                None => generator,
            })?;
        }

        Ok(runtime)
    }
}
