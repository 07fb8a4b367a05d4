use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure reported by the media device layer (permission denied, missing hardware).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeviceError {
    /// Category of the failure, e.g. `NotAllowedError` or `NotFoundError`.
    pub name: String,
    pub message: String,
}

impl DeviceError {
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error ({name}): {message}")]
    Transport { name: String, message: String },

    #[error("Media device error: {0}")]
    MediaDevices(DeviceError),

    #[error("HTTP protocol error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Header error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Widget is missing a required component: {0}")]
    MissingComponent(&'static str),

    #[error("Invalid participant token: {0}")]
    InvalidToken(String),

    #[error("Chat message is empty")]
    EmptyMessage,

    #[error("A chat message is already being sent")]
    SendInFlight,

    #[error("Chat is unavailable until the agent is ready")]
    ChatUnavailable,

    #[error("The controller has shut down")]
    ConnectionClosed,
}

impl Error {
    /// Builds a transport failure with an explicit category name.
    #[must_use]
    pub fn transport(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Category used in user-facing alert descriptions.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Transport { name, .. } => name.as_str(),
            Self::MediaDevices(err) => err.name.as_str(),
            Self::Http(_) => "NetworkError",
            Self::Serialization(_) => "SerializationError",
            Self::Url(_) | Self::Header(_) | Self::MissingComponent(_) => "ConfigurationError",
            Self::InvalidToken(_) => "TokenError",
            Self::EmptyMessage | Self::SendInFlight | Self::ChatUnavailable => "ChatError",
            Self::ConnectionClosed => "ConnectionClosed",
        }
    }

    /// Human-readable detail without the category prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Transport { message, .. } => message.clone(),
            Self::MediaDevices(err) => err.message.clone(),
            other => other.to_string(),
        }
    }

    /// `"{name}: {message}"`, the form shown in alerts.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}: {}", self.name(), self.message())
    }
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        Self::MediaDevices(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
