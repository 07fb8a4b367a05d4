#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Session lifecycle controller for a floating voice/chat assistant widget.
//!
//! The widget opens and closes a popup around a live session with a remote
//! agent. This crate owns the part with real state: connecting exactly once per
//! session, keeping microphone and connection consistent across open/close and
//! teardown, publishing voice and chat messages on the data channel, and ending
//! sessions whose agent never shows up. The media engine, credential issuer, and
//! rendering are plugged in through traits.

pub mod config;
pub mod details;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod widget;

pub use config::WidgetConfig;
pub use details::{
    CachedConnectionDetails, ConnectionDetails, ConnectionDetailsProvider, DetailsSource,
};
pub use error::{DeviceError, Error, Result};
pub use protocol::{AgentState, ControlMessage, HostAction, HostSignal, OutgoingMessage};
pub use transport::rest::HttpDetailsSource;
pub use transport::{
    ConnectionStatus, MicrophoneOptions, PublishOptions, Transport, TransportEvent,
    TransportEvents,
};
pub use widget::{
    Alert, AlertKind, AssistantWidget, ChatSender, WidgetBuilder, WidgetEvent, WidgetHandle,
    WidgetHandlers, WidgetState,
};

const TRACE_LOG_MAX_BYTES: usize = 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";

/// Cap a payload for trace logging without splitting a UTF-8 character.
pub(crate) fn safe_truncate(s: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}

/// Trace-log an outgoing data-channel payload.
pub(crate) fn trace_payload(label: &str, payload: &[u8]) {
    if tracing::enabled!(tracing::Level::TRACE) {
        let text = String::from_utf8_lossy(payload);
        tracing::trace!("{label}: {}", safe_truncate(&text, TRACE_LOG_MAX_BYTES));
    }
}
