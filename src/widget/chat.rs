use crate::protocol::OutgoingMessage;
use crate::transport::Transport;
use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Publishes user chat text on the chat topic, one message at a time.
#[derive(Clone)]
pub struct ChatSender {
    transport: Arc<dyn Transport>,
    sending: Arc<AtomicBool>,
}

struct SendingGuard<'a>(&'a AtomicBool);

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ChatSender {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a previous send has not settled yet.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Trim and publish `text`.
    ///
    /// # Errors
    /// Returns [`Error::EmptyMessage`] for blank input, [`Error::SendInFlight`]
    /// while another send is pending, or the transport's publish error.
    pub async fn send(&self, text: &str) -> Result<()> {
        let message = text.trim();
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }
        if self.sending.swap(true, Ordering::AcqRel) {
            return Err(Error::SendInFlight);
        }
        let _guard = SendingGuard(&self.sending);

        let outgoing = OutgoingMessage::chat(message, now_ms());
        let options = outgoing.publish_options();
        let payload = outgoing.encode()?;
        crate::trace_payload("publishing chat message", &payload);
        self.transport.publish_data(payload, options).await?;
        tracing::debug!(chars = message.chars().count(), "chat message published");
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, crate::config::duration_ms)
}
