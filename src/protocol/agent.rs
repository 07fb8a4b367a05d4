use serde::{Deserialize, Serialize};

/// Lifecycle of the remote agent as reported by the transport.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AgentState {
    #[default]
    Disconnected,
    Connecting,
    PreConnectBuffering,
    Initializing,
    Listening,
    Thinking,
    Speaking,
}

impl AgentState {
    /// Whether the agent has reached one of the active states.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Listening | Self::Thinking | Self::Speaking)
    }

    /// Whether the agent was still on its way into the room. Any other
    /// unavailable state counts as joined but not initialized.
    #[must_use]
    pub const fn never_joined(self) -> bool {
        matches!(self, Self::Connecting)
    }
}
