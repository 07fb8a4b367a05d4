//! Capability surface of the real-time media connection.
//!
//! The controller never talks to a concrete media engine. Anything that can
//! connect, toggle the microphone, publish data, and emit lifecycle events can be
//! plugged in through [`Transport`].

pub mod rest;

use crate::error::DeviceError;
use crate::protocol::AgentState;
use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receiving end handed to [`Transport::subscribe`].
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Disconnected,
    MediaDevicesError(DeviceError),
    StatusChanged(ConnectionStatus),
    AgentStateChanged(AgentState),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MicrophoneOptions {
    /// Start capturing before the connection exists and buffer until it does.
    pub pre_connect_buffer: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub reliable: bool,
    pub topic: Option<String>,
}

impl PublishOptions {
    #[must_use]
    pub const fn reliable() -> Self {
        Self {
            reliable: true,
            topic: None,
        }
    }

    #[must_use]
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            reliable: true,
            topic: Some(topic.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub trait Transport: Send + Sync {
    fn connect<'a>(&'a self, server_url: &'a str, token: &'a str) -> BoxFuture<'a, Result<()>>;
    fn disconnect(&self) -> BoxFuture<'_, Result<()>>;
    fn set_microphone_enabled(
        &self,
        enabled: bool,
        options: MicrophoneOptions,
    ) -> BoxFuture<'_, Result<()>>;
    fn publish_data(&self, payload: Vec<u8>, options: PublishOptions) -> BoxFuture<'_, Result<()>>;
    fn status(&self) -> ConnectionStatus;
    fn subscribe(&self, sink: EventSink) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Subscriber registry for [`Transport`] implementations.
#[derive(Debug, Default)]
pub struct TransportEvents {
    next_id: AtomicU64,
    sinks: Mutex<HashMap<SubscriptionId, EventSink>>,
}

impl TransportEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sink: EventSink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, sink);
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().remove(&id);
    }

    /// Deliver an event to every live subscriber, dropping the ones that went away.
    pub fn emit(&self, event: &TransportEvent) {
        self.lock().retain(|_, sink| sink.send(event.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, EventSink>> {
        self.sinks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
