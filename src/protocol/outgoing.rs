use serde::{Deserialize, Serialize};

use crate::transport::PublishOptions;
use crate::Result;

/// Topic label used for user chat text on the data channel.
pub const CHAT_TOPIC: &str = "lk.chat";

/// Control messages distinguished by an explicit `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    VoiceConfig { voice: String },
}

/// Everything the widget publishes to the agent over the data channel.
///
/// Voice selection travels as a tagged control message; chat text carries no tag
/// and is told apart by its topic instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OutgoingMessage {
    Control(ControlMessage),
    Chat {
        message: String,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },
}

impl OutgoingMessage {
    #[must_use]
    pub fn voice_config(voice: impl Into<String>) -> Self {
        Self::Control(ControlMessage::VoiceConfig { voice: voice.into() })
    }

    #[must_use]
    pub fn chat(message: impl Into<String>, timestamp: u64) -> Self {
        Self::Chat {
            message: message.into(),
            timestamp,
        }
    }

    /// Delivery options this message is published with.
    #[must_use]
    pub fn publish_options(&self) -> PublishOptions {
        match self {
            Self::Control(_) => PublishOptions::reliable(),
            Self::Chat { .. } => PublishOptions::topic(CHAT_TOPIC),
        }
    }

    /// Serialize to UTF-8 JSON bytes.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    #[allow(clippy::result_large_err)]
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse UTF-8 JSON bytes produced by [`OutgoingMessage::encode`].
    ///
    /// # Errors
    /// Returns an error if the payload is not a known message shape.
    #[allow(clippy::result_large_err)]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
