use crate::protocol::AgentState;
use crate::transport::ConnectionStatus;

/// Snapshot of everything the presentation layer renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetState {
    pub is_open: bool,
    pub session_started: bool,
    pub status: ConnectionStatus,
    pub agent_state: AgentState,
    /// True during the short "starting" window after a session begins.
    pub loading: bool,
    /// Empty means no voice selected.
    pub selected_voice: String,
    pub language: String,
}

impl WidgetState {
    #[must_use]
    pub const fn agent_available(&self) -> bool {
        self.agent_state.is_available()
    }

    /// Whether the chat input should accept text.
    #[must_use]
    pub const fn chat_enabled(&self) -> bool {
        self.session_started && self.agent_available() && !self.loading
    }
}
