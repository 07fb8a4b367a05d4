use super::events::Alert;
use crate::protocol::HostSignal;

pub type AlertHandler = Box<dyn Fn(Alert) + Send + Sync>;
pub type HostSignalHandler = Box<dyn Fn(HostSignal) + Send + Sync>;

/// Synchronous callbacks invoked from the controller task.
///
/// Handlers must not block; they run inline with state transitions.
#[derive(Default)]
pub struct WidgetHandlers {
    pub on_alert: Option<AlertHandler>,
    pub on_host_signal: Option<HostSignalHandler>,
}

impl WidgetHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_alert<F>(mut self, handler: F) -> Self
    where
        F: Fn(Alert) + Send + Sync + 'static,
    {
        self.on_alert = Some(Box::new(handler));
        self
    }

    /// Called with `{type:"assistant", action}` whenever the widget opens or
    /// closes, e.g. to forward to an embedding iframe parent.
    #[must_use]
    pub fn on_host_signal<F>(mut self, handler: F) -> Self
    where
        F: Fn(HostSignal) + Send + Sync + 'static,
    {
        self.on_host_signal = Some(Box::new(handler));
        self
    }
}
