use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_LOADING_WINDOW: Duration = Duration::from_secs(6);
pub const DEFAULT_AGENT_JOIN_TIMEOUT: Duration = Duration::from_secs(20);

/// Embedding-time settings for the widget.
///
/// Every field is optional in serialized form; missing keys fall back to the
/// defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfig {
    /// Capture microphone audio before the connection is up.
    pub pre_connect_buffer: bool,
    /// Voice selected when the widget mounts. Empty means unset.
    pub default_voice: String,
    pub language: String,
    pub agent_name: Option<String>,
    pub supports_chat_input: bool,
    /// Token issuance endpoint, used when no provider is supplied explicitly.
    pub details_endpoint: Option<String>,
    pub sandbox_id: Option<String>,
    pub loading_window_ms: u64,
    pub agent_join_timeout_ms: u64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            pre_connect_buffer: true,
            default_voice: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            agent_name: None,
            supports_chat_input: true,
            details_endpoint: None,
            sandbox_id: None,
            loading_window_ms: duration_ms(DEFAULT_LOADING_WINDOW),
            agent_join_timeout_ms: duration_ms(DEFAULT_AGENT_JOIN_TIMEOUT),
        }
    }
}

impl WidgetConfig {
    /// Parse a JSON configuration blob.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or has mistyped fields.
    #[allow(clippy::result_large_err)]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub const fn loading_window(&self) -> Duration {
        Duration::from_millis(self.loading_window_ms)
    }

    #[must_use]
    pub const fn agent_join_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_join_timeout_ms)
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
