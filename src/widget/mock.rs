use crate::error::DeviceError;
use crate::transport::{
    BoxFuture, ConnectionStatus, EventSink, MicrophoneOptions, PublishOptions, SubscriptionId,
    Transport, TransportEvent, TransportEvents,
};
use crate::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect { server_url: String, token: String },
    Disconnect,
    Microphone { enabled: bool, pre_connect_buffer: bool },
    Publish { payload: Vec<u8>, options: PublishOptions },
}

pub struct MockTransport {
    status: Mutex<ConnectionStatus>,
    events: TransportEvents,
    calls: Mutex<Vec<Call>>,
    call_tx: mpsc::UnboundedSender<Call>,
    connect_failures: AtomicUsize,
    microphone_failures: AtomicUsize,
    connect_gate: Mutex<Option<Arc<Notify>>>,
    publish_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Call>) {
        let (call_tx, call_rx) = mpsc::unbounded_channel();
        let transport = Self {
            status: Mutex::new(ConnectionStatus::Disconnected),
            events: TransportEvents::new(),
            calls: Mutex::new(Vec::new()),
            call_tx,
            connect_failures: AtomicUsize::new(0),
            microphone_failures: AtomicUsize::new(0),
            connect_gate: Mutex::new(None),
            publish_gate: Mutex::new(None),
        };
        (Arc::new(transport), call_rx)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn fail_next_connects(&self, n: usize) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_microphone(&self, n: usize) {
        self.microphone_failures.store(n, Ordering::SeqCst);
    }

    /// Park the next connect until the returned gate is notified.
    pub fn hold_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.connect_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Park the next publish until the returned gate is notified.
    pub fn hold_publishes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.publish_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn emit(&self, event: TransportEvent) {
        self.events.emit(&event);
    }

    /// Simulate the server closing the connection.
    pub fn drop_connection(&self) {
        self.set_status(ConnectionStatus::Disconnected);
        self.events.emit(&TransportEvent::Disconnected);
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call.clone());
        let _ = self.call_tx.send(call);
    }

    fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock().unwrap() = status;
        self.events.emit(&TransportEvent::StatusChanged(status));
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl Transport for MockTransport {
    fn connect<'a>(&'a self, server_url: &'a str, token: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(Call::Connect {
                server_url: server_url.to_string(),
                token: token.to_string(),
            });
            self.set_status(ConnectionStatus::Connecting);
            let gate = self.connect_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if take_failure(&self.connect_failures) {
                self.set_status(ConnectionStatus::Disconnected);
                return Err(Error::transport("ConnectionError", "could not establish signal connection"));
            }
            self.set_status(ConnectionStatus::Connected);
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record(Call::Disconnect);
            let was = *self.status.lock().unwrap();
            if was != ConnectionStatus::Disconnected {
                self.set_status(ConnectionStatus::Disconnected);
                self.events.emit(&TransportEvent::Disconnected);
            }
            Ok(())
        })
    }

    fn set_microphone_enabled(
        &self,
        enabled: bool,
        options: MicrophoneOptions,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record(Call::Microphone {
                enabled,
                pre_connect_buffer: options.pre_connect_buffer,
            });
            if take_failure(&self.microphone_failures) {
                return Err(DeviceError::new("NotAllowedError", "Permission denied").into());
            }
            Ok(())
        })
    }

    fn publish_data(&self, payload: Vec<u8>, options: PublishOptions) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record(Call::Publish { payload, options });
            let gate = self.publish_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            Ok(())
        })
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.lock().unwrap()
    }

    fn subscribe(&self, sink: EventSink) -> SubscriptionId {
        self.events.subscribe(sink)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }
}
