//! Agent runtime
//!
//! Runs each agent as its own task: startup once, then interval ticks and
//! mailbox messages handled one at a time until shutdown. Handlers of one
//! agent never overlap; different agents run concurrently.

use super::{AgentAddress, BusError, DeliveryError, Envelope, MessageBus};
use crate::models::Message;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// An independently addressed unit of the pipeline
#[async_trait]
pub trait Agent: Send + 'static {
    /// Address this agent receives messages on
    fn address(&self) -> &AgentAddress;

    /// Period of the interval handler, if the agent has one
    fn interval(&self) -> Option<Duration> {
        None
    }

    /// Runs once, before any other handler
    async fn on_startup(&mut self, _ctx: &AgentContext) {}

    /// Runs on every interval tick
    async fn on_interval(&mut self, _ctx: &AgentContext) {}

    /// Runs once per received message
    async fn on_message(&mut self, ctx: &AgentContext, envelope: Envelope);
}

/// Handle given to agent handlers for sending messages
#[derive(Debug, Clone)]
pub struct AgentContext {
    address: AgentAddress,
    bus: MessageBus,
}

impl AgentContext {
    pub fn new(address: AgentAddress, bus: MessageBus) -> Self {
        Self { address, bus }
    }

    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    /// Fire-and-forget send; the error only reports that enqueueing failed
    pub fn send(&self, to: &AgentAddress, message: Message) -> Result<(), DeliveryError> {
        self.bus.send(&self.address, to, message)
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Cloneable trigger for stopping every agent of a runtime
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    shutdown_tx: broadcast::Sender<()>,
}

impl RuntimeHandle {
    pub fn shutdown(&self) {
        // No receivers just means every agent already stopped
        let _ = self.shutdown_tx.send(());
    }
}

/// Owns the agent tasks spawned on one message bus
pub struct AgentRuntime {
    bus: MessageBus,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<(AgentAddress, JoinHandle<()>)>,
}

impl AgentRuntime {
    pub fn new(bus: MessageBus) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            bus,
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Register the agent's mailbox and start its task.
    ///
    /// The address resolves as soon as this returns; messages sent before the
    /// startup handler finishes are queued until it does.
    pub fn spawn<A: Agent>(&mut self, agent: A) -> Result<AgentAddress, RuntimeError> {
        let address = agent.address().clone();
        let mailbox = self.bus.register(&address)?;
        let ctx = AgentContext::new(address.clone(), self.bus.clone());
        let shutdown = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(drive(agent, ctx, mailbox, shutdown));
        self.tasks.push((address.clone(), handle));
        Ok(address)
    }

    /// Addresses of the agents spawned so far
    pub fn addresses(&self) -> Vec<AgentAddress> {
        self.tasks.iter().map(|(address, _)| address.clone()).collect()
    }

    /// Stop every agent and wait for its task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for (address, handle) in self.tasks {
            if let Err(e) = handle.await {
                warn!(agent = %address, error = %e, "Agent task ended abnormally");
            }
        }
    }
}

async fn drive<A: Agent>(
    mut agent: A,
    ctx: AgentContext,
    mut mailbox: mpsc::Receiver<Envelope>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let address = ctx.address().clone();
    info!(agent = %address, "Agent starting");

    agent.on_startup(&ctx).await;

    let mut ticker = agent.interval().map(|period| {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                debug!(agent = %address, "Shutdown received");
                break;
            }
            Some(envelope) = mailbox.recv() => {
                agent.on_message(&ctx, envelope).await;
            }
            _ = next_tick(&mut ticker) => {
                agent.on_interval(&ctx).await;
            }
        }
    }

    ctx.bus.deregister(&address);
    info!(agent = %address, "Agent stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_reading;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Startup,
        Tick,
        Message(u64),
    }

    struct RecordingAgent {
        address: AgentAddress,
        interval: Option<Duration>,
        startup_delay: Duration,
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl RecordingAgent {
        fn new(name: &str, events: Arc<Mutex<Vec<Event>>>) -> Self {
            Self {
                address: AgentAddress::new(name),
                interval: None,
                startup_delay: Duration::ZERO,
                events,
            }
        }
    }

    #[async_trait]
    impl Agent for RecordingAgent {
        fn address(&self) -> &AgentAddress {
            &self.address
        }

        fn interval(&self) -> Option<Duration> {
            self.interval
        }

        async fn on_startup(&mut self, _ctx: &AgentContext) {
            tokio::time::sleep(self.startup_delay).await;
            self.events.lock().unwrap().push(Event::Startup);
        }

        async fn on_interval(&mut self, _ctx: &AgentContext) {
            self.events.lock().unwrap().push(Event::Tick);
        }

        async fn on_message(&mut self, _ctx: &AgentContext, envelope: Envelope) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Message(envelope.message.sequence));
        }
    }

    async fn wait_for(events: &Arc<Mutex<Vec<Event>>>, count: usize) {
        for _ in 0..200 {
            if events.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {} events", count);
    }

    #[tokio::test]
    async fn test_startup_runs_before_messages() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut agent = RecordingAgent::new("slow-start", events.clone());
        agent.startup_delay = Duration::from_millis(50);

        let mut runtime = AgentRuntime::new(MessageBus::default());
        let address = runtime.spawn(agent).unwrap();

        // Queued while startup is still running
        let sender = AgentAddress::new("test");
        for seq in 0..3 {
            runtime
                .bus()
                .send(&sender, &address, Message::reading(seq, sample_reading()))
                .unwrap();
        }

        wait_for(&events, 4).await;
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                Event::Startup,
                Event::Message(0),
                Event::Message(1),
                Event::Message(2)
            ]
        );

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_interval_handler_ticks() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut agent = RecordingAgent::new("ticker", events.clone());
        agent.interval = Some(Duration::from_millis(10));

        let mut runtime = AgentRuntime::new(MessageBus::default());
        runtime.spawn(agent).unwrap();

        wait_for(&events, 4).await;
        let recorded = events.lock().unwrap().clone();
        assert_eq!(recorded[0], Event::Startup);
        assert!(recorded[1..].iter().all(|e| *e == Event::Tick));

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_agent_address_rejected() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut runtime = AgentRuntime::new(MessageBus::default());

        runtime
            .spawn(RecordingAgent::new("twin", events.clone()))
            .unwrap();
        let result = runtime.spawn(RecordingAgent::new("twin", events));

        assert!(matches!(
            result,
            Err(RuntimeError::Bus(BusError::AddressInUse(_)))
        ));
        assert_eq!(runtime.addresses(), vec![AgentAddress::new("twin")]);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_deregisters_addresses() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let bus = MessageBus::default();
        let mut runtime = AgentRuntime::new(bus.clone());
        let address = runtime
            .spawn(RecordingAgent::new("short-lived", events))
            .unwrap();
        assert!(bus.is_registered(&address));

        runtime.shutdown().await;

        assert!(!bus.is_registered(&address));
        let result = bus.send(
            &AgentAddress::new("test"),
            &address,
            Message::reading(0, sample_reading()),
        );
        assert!(matches!(result, Err(DeliveryError::UnknownAddress(_))));
    }

    #[tokio::test]
    async fn test_context_send_reports_unknown_destination() {
        let ctx = AgentContext::new(AgentAddress::new("a"), MessageBus::default());
        let result = ctx.send(&AgentAddress::new("b"), Message::reading(0, sample_reading()));
        assert_eq!(
            result,
            Err(DeliveryError::UnknownAddress(AgentAddress::new("b")))
        );
    }
}
