use crate::config::{WidgetConfig, duration_ms};
use crate::details::{CachedConnectionDetails, ConnectionDetailsProvider};
use crate::protocol::HostSignal;
use crate::transport::Transport;
use crate::transport::rest::HttpDetailsSource;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

use super::controller::{self, AssistantWidget, WidgetParts};
use super::events::Alert;
use super::handlers::WidgetHandlers;

pub struct WidgetBuilder {
    transport: Option<Arc<dyn Transport>>,
    details: Option<Arc<dyn ConnectionDetailsProvider>>,
    config: WidgetConfig,
    handlers: WidgetHandlers,
}

impl WidgetBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: None,
            details: None,
            config: WidgetConfig::default(),
            handlers: WidgetHandlers::new(),
        }
    }

    /// The one transport this widget will ever drive.
    #[must_use]
    pub fn transport<T: Transport + 'static>(self, transport: T) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    #[must_use]
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn details<P: ConnectionDetailsProvider + 'static>(self, provider: P) -> Self {
        self.shared_details(Arc::new(provider))
    }

    #[must_use]
    pub fn shared_details(mut self, provider: Arc<dyn ConnectionDetailsProvider>) -> Self {
        self.details = Some(provider);
        self
    }

    /// Replace the whole configuration. Later setters still apply on top.
    #[must_use]
    pub fn config(mut self, config: WidgetConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.config.default_voice = voice.into();
        self
    }

    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    #[must_use]
    pub const fn pre_connect_buffer(mut self, enabled: bool) -> Self {
        self.config.pre_connect_buffer = enabled;
        self
    }

    #[must_use]
    pub const fn chat_input(mut self, enabled: bool) -> Self {
        self.config.supports_chat_input = enabled;
        self
    }

    #[must_use]
    pub fn loading_window(mut self, window: Duration) -> Self {
        self.config.loading_window_ms = duration_ms(window);
        self
    }

    #[must_use]
    pub fn agent_join_timeout(mut self, timeout: Duration) -> Self {
        self.config.agent_join_timeout_ms = duration_ms(timeout);
        self
    }

    /// Fetch credentials from this endpoint when no provider is set.
    #[must_use]
    pub fn details_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.details_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn handlers(mut self, handlers: WidgetHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    #[must_use]
    pub fn on_alert<F>(mut self, handler: F) -> Self
    where
        F: Fn(Alert) + Send + Sync + 'static,
    {
        self.handlers = self.handlers.on_alert(handler);
        self
    }

    #[must_use]
    pub fn on_host_signal<F>(mut self, handler: F) -> Self
    where
        F: Fn(HostSignal) + Send + Sync + 'static,
    {
        self.handlers = self.handlers.on_host_signal(handler);
        self
    }

    #[allow(clippy::result_large_err)]
    fn resolve_details(
        details: Option<Arc<dyn ConnectionDetailsProvider>>,
        config: &WidgetConfig,
    ) -> Result<Arc<dyn ConnectionDetailsProvider>> {
        if let Some(details) = details {
            return Ok(details);
        }
        let endpoint = config
            .details_endpoint
            .as_deref()
            .ok_or(Error::MissingComponent("connection details provider or endpoint"))?;

        let mut source = HttpDetailsSource::new(endpoint)?;
        if let Some(agent_name) = &config.agent_name {
            source = source.with_agent_name(agent_name.clone());
        }
        if let Some(sandbox_id) = &config.sandbox_id {
            source = source.with_sandbox_id(sandbox_id)?;
        }
        Ok(Arc::new(CachedConnectionDetails::new(source)))
    }

    /// Spawn the controller task. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if no transport was given, or if no details provider was
    /// given and the configured endpoint is missing or invalid.
    #[allow(clippy::result_large_err)]
    pub fn build(self) -> Result<AssistantWidget> {
        let transport = self
            .transport
            .ok_or(Error::MissingComponent("transport"))?;
        let details = Self::resolve_details(self.details, &self.config)?;

        Ok(controller::spawn(WidgetParts {
            transport,
            details,
            config: self.config,
            handlers: self.handlers,
        }))
    }
}

impl Default for WidgetBuilder {
    fn default() -> Self {
        Self::new()
    }
}
