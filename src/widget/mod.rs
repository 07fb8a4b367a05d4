//! The floating assistant widget and its session lifecycle controller.
//!
//! [`AssistantWidget`] owns a single controller task. User toggles, transport
//! events, and timer expiries are all funnelled through that task, so every state
//! transition is applied one at a time against one shared [`crate::transport::Transport`].

mod builder;
mod chat;
mod controller;
pub mod events;
mod handlers;
mod state;
mod watchdog;

#[cfg(test)]
mod mock;

pub use builder::WidgetBuilder;
pub use chat::ChatSender;
pub use controller::{AssistantWidget, WidgetHandle};
pub use events::{Alert, AlertKind, WidgetEvent, WidgetEventStream};
pub use handlers::{AlertHandler, HostSignalHandler, WidgetHandlers};
pub use state::WidgetState;
