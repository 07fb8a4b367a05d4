//! Wire shapes exchanged with the agent and the embedding page.

pub mod agent;
pub mod host;
pub mod outgoing;

pub use agent::AgentState;
pub use host::{HostAction, HostSignal};
pub use outgoing::{CHAT_TOPIC, ControlMessage, OutgoingMessage};
