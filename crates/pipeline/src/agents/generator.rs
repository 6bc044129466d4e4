//! Synthetic reading generator

use super::Telemetry;
use crate::bus::{Agent, AgentAddress, AgentContext, Envelope};
use crate::health::components;
use crate::models::{Message, Reading};
use crate::persistence::{LoggedReading, ReadingsLog};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::{debug, warn};

/// Produces plausible physiological readings
#[derive(Debug)]
pub struct ReadingGenerator {
    rng: StdRng,
}

impl ReadingGenerator {
    /// Seeded generators produce the same sequence every run
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn next_reading(&mut self) -> Reading {
        let systolic: u32 = self.rng.gen_range(110..140);
        let diastolic: u32 = self.rng.gen_range(75..90);

        Reading {
            heart_rate: self.rng.gen_range(65..90),
            blood_pressure: format!("{systolic}/{diastolic}"),
            temperature: round_tenth(self.rng.gen_range(36.4..=37.5)),
            moisture: round_tenth(self.rng.gen_range(0.4..=0.7)),
            body_water_content: self.rng.gen_range(50..60),
            fatigue_level: self.rng.gen_range(1..5),
            drowsiness_level: self.rng.gen_range(1..4),
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Emits one reading per interval to its target
pub struct GeneratorAgent {
    address: AgentAddress,
    target: AgentAddress,
    period: Duration,
    generator: ReadingGenerator,
    log: Option<ReadingsLog>,
    next_sequence: u64,
    telemetry: Telemetry,
}

impl GeneratorAgent {
    pub fn new(
        address: AgentAddress,
        target: AgentAddress,
        period: Duration,
        generator: ReadingGenerator,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            address,
            target,
            period,
            generator,
            log: None,
            next_sequence: 0,
            telemetry,
        }
    }

    /// Persist every reading to `log` and resume numbering after its last entry
    pub fn with_log(mut self, log: ReadingsLog) -> Self {
        self.log = Some(log);
        self
    }

    fn persist(&mut self, sequence: u64, reading: &Reading) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        if let Err(e) = log.append(LoggedReading::now(sequence, reading.clone())) {
            warn!(
                sequence = sequence,
                path = %log.path().display(),
                error = %format!("{e:#}"),
                "Failed to persist reading"
            );
        }
    }
}

#[async_trait]
impl Agent for GeneratorAgent {
    fn address(&self) -> &AgentAddress {
        &self.address
    }

    fn interval(&self) -> Option<Duration> {
        Some(self.period)
    }

    async fn on_startup(&mut self, _ctx: &AgentContext) {
        if let Some(last) = self.log.as_ref().and_then(ReadingsLog::last_sequence) {
            self.next_sequence = last + 1;
            debug!(next_sequence = self.next_sequence, "Resuming after logged readings");
        }
        self.telemetry.health.set_healthy(components::GENERATOR).await;
    }

    async fn on_interval(&mut self, ctx: &AgentContext) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let reading = self.generator.next_reading();
        self.persist(sequence, &reading);
        self.telemetry.metrics.inc_readings_generated();
        debug!(sequence = sequence, heart_rate = reading.heart_rate, "Reading generated");

        if let Err(e) = ctx.send(&self.target, Message::reading(sequence, reading)) {
            self.telemetry.metrics.inc_delivery_failures(self.target.as_str());
            self.telemetry.logger.log_delivery_failed(
                self.address.as_str(),
                self.target.as_str(),
                &e.to_string(),
            );
        }
    }

    async fn on_message(&mut self, _ctx: &AgentContext, envelope: Envelope) {
        debug!(from = %envelope.sender, "Generator ignores incoming messages");
    }
}
