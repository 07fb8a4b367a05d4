use crate::protocol::HostSignal;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

const SESSION_ENDED_HINT: &str = "Please try again or check your connection.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Connecting the transport or enabling the microphone for a new session failed.
    Connection,
    /// The media device layer reported a permission or hardware failure.
    MediaDevices,
    /// The agent did not become available in time and the session was ended.
    SessionEnded,
}

impl AlertKind {
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Connection => "Error connecting to agent",
            Self::MediaDevices => "Encountered an error with your media devices",
            Self::SessionEnded => "Session ended",
        }
    }
}

/// A dismissible, non-blocking notice for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
}

impl Alert {
    #[must_use]
    pub fn new(kind: AlertKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: kind.title().to_string(),
            description: description.into(),
        }
    }

    /// Alert for an agent that never became available; `reason` tells whether
    /// it never joined or never finished initializing.
    #[must_use]
    pub fn session_ended(agent_joined: bool) -> Self {
        let reason = if agent_joined {
            "Agent connected but did not complete initializing."
        } else {
            "Agent did not join the room."
        };
        Self::new(AlertKind::SessionEnded, format!("{reason} {SESSION_ENDED_HINT}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    Alert(Alert),
    HostSignal(HostSignal),
}

pub struct WidgetEventStream<'a> {
    rx: &'a mut mpsc::Receiver<WidgetEvent>,
}

impl<'a> WidgetEventStream<'a> {
    #[must_use]
    pub const fn new(rx: &'a mut mpsc::Receiver<WidgetEvent>) -> Self {
        Self { rx }
    }
}

impl Stream for WidgetEventStream<'_> {
    type Item = WidgetEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll_recv(cx)
    }
}
