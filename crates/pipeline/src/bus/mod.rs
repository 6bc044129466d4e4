//! Address-keyed message delivery between agents
//!
//! Every agent owns a bounded single-consumer mailbox registered under its
//! address. Senders resolve the address at send time and enqueue without
//! waiting; a missing, closed or full mailbox is reported back to the sender
//! as a [`DeliveryError`] and never retried.

mod runtime;

pub use runtime::{Agent, AgentContext, AgentRuntime, RuntimeError, RuntimeHandle};

use crate::models::Message;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Default number of queued messages per mailbox
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Opaque agent address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentAddress(String);

impl AgentAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message together with the address it came from
#[derive(Debug, Clone)]
pub struct Envelope {
    pub sender: AgentAddress,
    pub message: Message,
}

/// Failure to hand a message to its destination mailbox
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("no agent registered at {0}")]
    UnknownAddress(AgentAddress),
    #[error("mailbox of {0} is full")]
    MailboxFull(AgentAddress),
    #[error("mailbox of {0} is closed")]
    MailboxClosed(AgentAddress),
}

/// Mailbox registration failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("address {0} is already registered")]
    AddressInUse(AgentAddress),
}

/// Registry of agent mailboxes, shared by every agent in a runtime
#[derive(Debug, Clone)]
pub struct MessageBus {
    mailboxes: Arc<DashMap<AgentAddress, mpsc::Sender<Envelope>>>,
    mailbox_capacity: usize,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

impl MessageBus {
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            mailboxes: Arc::new(DashMap::new()),
            mailbox_capacity: mailbox_capacity.max(1),
        }
    }

    /// Register a mailbox for `address` and return its receiving end
    pub fn register(&self, address: &AgentAddress) -> Result<mpsc::Receiver<Envelope>, BusError> {
        match self.mailboxes.entry(address.clone()) {
            Entry::Occupied(_) => Err(BusError::AddressInUse(address.clone())),
            Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::channel(self.mailbox_capacity);
                slot.insert(tx);
                debug!(address = %address, "Mailbox registered");
                Ok(rx)
            }
        }
    }

    /// Remove the mailbox for `address`; later sends to it fail
    pub fn deregister(&self, address: &AgentAddress) {
        if self.mailboxes.remove(address).is_some() {
            debug!(address = %address, "Mailbox removed");
        }
    }

    /// Whether `address` currently resolves to a mailbox
    pub fn is_registered(&self, address: &AgentAddress) -> bool {
        self.mailboxes.contains_key(address)
    }

    /// Enqueue `message` for `to` without waiting for delivery
    pub fn send(
        &self,
        from: &AgentAddress,
        to: &AgentAddress,
        message: Message,
    ) -> Result<(), DeliveryError> {
        let sender = self
            .mailboxes
            .get(to)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DeliveryError::UnknownAddress(to.clone()))?;

        let envelope = Envelope {
            sender: from.clone(),
            message,
        };

        sender.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::MailboxFull(to.clone()),
            TrySendError::Closed(_) => DeliveryError::MailboxClosed(to.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_reading;

    fn addr(name: &str) -> AgentAddress {
        AgentAddress::new(name)
    }

    #[tokio::test]
    async fn test_send_to_unknown_address_fails() {
        let bus = MessageBus::default();
        let result = bus.send(&addr("a"), &addr("nobody"), Message::reading(0, sample_reading()));
        assert_eq!(result, Err(DeliveryError::UnknownAddress(addr("nobody"))));
    }

    #[tokio::test]
    async fn test_duplicate_address_rejected() {
        let bus = MessageBus::default();
        let _rx = bus.register(&addr("predictor")).unwrap();
        assert_eq!(
            bus.register(&addr("predictor")).unwrap_err(),
            BusError::AddressInUse(addr("predictor"))
        );
    }

    #[tokio::test]
    async fn test_delivery_order_preserved() {
        let bus = MessageBus::new(100);
        let mut rx = bus.register(&addr("b")).unwrap();

        for seq in 0..50 {
            bus.send(&addr("a"), &addr("b"), Message::reading(seq, sample_reading()))
                .unwrap();
        }

        for expected in 0..50 {
            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.sender, addr("a"));
            assert_eq!(envelope.message.sequence, expected);
        }
    }

    #[tokio::test]
    async fn test_full_mailbox_reports_failure() {
        let bus = MessageBus::new(2);
        let _rx = bus.register(&addr("b")).unwrap();

        bus.send(&addr("a"), &addr("b"), Message::reading(0, sample_reading()))
            .unwrap();
        bus.send(&addr("a"), &addr("b"), Message::reading(1, sample_reading()))
            .unwrap();
        let result = bus.send(&addr("a"), &addr("b"), Message::reading(2, sample_reading()));

        assert_eq!(result, Err(DeliveryError::MailboxFull(addr("b"))));
    }

    #[tokio::test]
    async fn test_closed_mailbox_reports_failure() {
        let bus = MessageBus::default();
        let rx = bus.register(&addr("b")).unwrap();
        drop(rx);

        let result = bus.send(&addr("a"), &addr("b"), Message::reading(0, sample_reading()));
        assert_eq!(result, Err(DeliveryError::MailboxClosed(addr("b"))));
    }

    #[tokio::test]
    async fn test_deregister_makes_address_unresolvable() {
        let bus = MessageBus::default();
        let _rx = bus.register(&addr("b")).unwrap();
        assert!(bus.is_registered(&addr("b")));

        bus.deregister(&addr("b"));
        assert!(!bus.is_registered(&addr("b")));

        let result = bus.send(&addr("a"), &addr("b"), Message::reading(0, sample_reading()));
        assert!(matches!(result, Err(DeliveryError::UnknownAddress(_))));

        // The address can be reused after deregistration
        assert!(bus.register(&addr("b")).is_ok());
    }
}
