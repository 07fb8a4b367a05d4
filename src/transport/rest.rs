use crate::details::{ConnectionDetails, DetailsSource};
use crate::error::Result;
use crate::transport::BoxFuture;
use reqwest::Client;
use reqwest::header::HeaderValue;
use serde::Serialize;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const SANDBOX_HEADER: &str = "X-Sandbox-Id";

#[derive(Debug, Clone, Serialize)]
struct AgentDispatch {
    agent_name: String,
}

#[derive(Debug, Clone, Serialize)]
struct RoomConfig {
    agents: Vec<AgentDispatch>,
}

#[derive(Debug, Clone, Serialize)]
struct DetailsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    room_config: Option<RoomConfig>,
    language: &'a str,
}

/// Fetches fresh connection details from the token issuance endpoint.
#[derive(Clone, Debug)]
pub struct HttpDetailsSource {
    client: Client,
    endpoint: Url,
    sandbox_id: Option<HeaderValue>,
    agent_name: Option<String>,
}

impl HttpDetailsSource {
    /// Create a source posting to `endpoint`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::new_with_timeouts(endpoint, DEFAULT_TIMEOUT, DEFAULT_POOL_IDLE_TIMEOUT)
    }

    /// Create a source with custom timeouts.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new_with_timeouts(
        endpoint: &str,
        timeout: Duration,
        pool_idle_timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(pool_idle_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            sandbox_id: None,
            agent_name: None,
        })
    }

    /// Send the sandbox id header with every request.
    ///
    /// # Errors
    /// Returns an error if the id is not a valid header value.
    #[allow(clippy::result_large_err)]
    pub fn with_sandbox_id(mut self, sandbox_id: &str) -> Result<Self> {
        self.sandbox_id = Some(HeaderValue::from_str(sandbox_id)?);
        Ok(self)
    }

    /// Ask the issuer to dispatch a specific agent into the room.
    #[must_use]
    pub fn with_agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[allow(clippy::result_large_err)]
    fn build_request(&self, language: &str) -> Result<reqwest::Request> {
        let body = DetailsRequest {
            room_config: self.agent_name.as_ref().map(|name| RoomConfig {
                agents: vec![AgentDispatch { agent_name: name.clone() }],
            }),
            language,
        };

        let mut req = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(sandbox_id) = &self.sandbox_id {
            req = req.header(SANDBOX_HEADER, sandbox_id);
        }
        Ok(req.build()?)
    }

    async fn request(&self, language: &str) -> Result<ConnectionDetails> {
        let req = self.build_request(language)?;
        let res = self.client.execute(req).await?.error_for_status()?;
        let details: ConnectionDetails = res.json().await?;
        tracing::debug!(server_url = %details.server_url, language, "fetched connection details");
        Ok(details)
    }
}

impl DetailsSource for HttpDetailsSource {
    fn fetch<'a>(&'a self, language: &'a str) -> BoxFuture<'a, Result<ConnectionDetails>> {
        Box::pin(self.request(language))
    }
}
