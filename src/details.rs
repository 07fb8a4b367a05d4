//! Connection credentials for a session and the cache in front of the issuer.

use crate::transport::BoxFuture;
use crate::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Tokens this close to expiry are treated as already expired.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub server_url: String,
    pub participant_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
}

impl ConnectionDetails {
    #[must_use]
    pub fn new(server_url: impl Into<String>, participant_token: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            participant_token: participant_token.into(),
            room_name: None,
            participant_name: None,
        }
    }

    /// Expiry encoded in the participant token's `exp` claim.
    ///
    /// # Errors
    /// Returns an error if the token is not a decodable JWT.
    #[allow(clippy::result_large_err)]
    pub fn expires_at(&self) -> Result<Option<SystemTime>> {
        token_expiry(&self.participant_token)
    }

    /// Whether the token is missing an expiry, undecodable, or within
    /// [`EXPIRY_MARGIN`] of `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        match self.expires_at() {
            Ok(Some(expires_at)) => now + EXPIRY_MARGIN >= expires_at,
            Ok(None) => true,
            Err(err) => {
                tracing::warn!(error = %err, "treating undecodable participant token as expired");
                true
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<u64>,
}

#[allow(clippy::result_large_err)]
fn token_expiry(token: &str) -> Result<Option<SystemTime>> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::InvalidToken("expected three dot-separated segments".to_string()))?;
    let decoded = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::InvalidToken(e.to_string()))?;
    let claims: Claims = serde_json::from_slice(&decoded)?;
    Ok(claims.exp.map(|exp| UNIX_EPOCH + Duration::from_secs(exp)))
}

/// Where the widget obtains credentials for a session.
pub trait ConnectionDetailsProvider: Send + Sync {
    /// Return cached details while they are still valid, otherwise fetch new ones.
    fn get_or_refresh<'a>(&'a self, language: &'a str) -> BoxFuture<'a, Result<ConnectionDetails>>;
    /// Invalidate whatever is cached so the next call fetches fresh details.
    fn force_refresh(&self);
}

/// Raw, uncached access to the credential issuer.
pub trait DetailsSource: Send + Sync {
    fn fetch<'a>(&'a self, language: &'a str) -> BoxFuture<'a, Result<ConnectionDetails>>;
}

struct CachedEntry {
    details: ConnectionDetails,
    language: String,
    generation: u64,
}

/// Reuses details until the token nears expiry, the language changes, or a
/// refresh is forced.
pub struct CachedConnectionDetails<S> {
    source: S,
    cache: Mutex<Option<CachedEntry>>,
    generation: AtomicU64,
}

impl<S: DetailsSource> CachedConnectionDetails<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    async fn lookup(&self, language: &str) -> Result<ConnectionDetails> {
        // Held across the fetch so concurrent callers share one request.
        let mut cache = self.cache.lock().await;
        let generation = self.generation.load(Ordering::Acquire);

        if let Some(entry) = cache.as_ref() {
            if entry.generation == generation
                && entry.language == language
                && !entry.details.is_expired_at(SystemTime::now())
            {
                return Ok(entry.details.clone());
            }
        }

        let details = self.source.fetch(language).await?;
        *cache = Some(CachedEntry {
            details: details.clone(),
            language: language.to_string(),
            generation,
        });
        Ok(details)
    }
}

impl<S: DetailsSource> ConnectionDetailsProvider for CachedConnectionDetails<S> {
    fn get_or_refresh<'a>(&'a self, language: &'a str) -> BoxFuture<'a, Result<ConnectionDetails>> {
        Box::pin(self.lookup(language))
    }

    fn force_refresh(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("connection details invalidated");
    }
}
