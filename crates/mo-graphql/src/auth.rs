//! OAuth2 client-credentials tokens for OS2mo.
//!
//! OS2mo sits behind Keycloak. Every GraphQL request carries a bearer token
//! obtained from the realm's token endpoint with the integration's client id
//! and secret. Tokens are cached until shortly before they expire.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use configurator::MoError;

/// Tokens are refreshed this long before the auth server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Client-credentials settings for the Keycloak realm guarding OS2mo.
#[derive(Clone)]
pub struct AuthConfig {
    /// Base URL of the auth server, e.g. `http://keycloak:8080/auth`.
    pub auth_server: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
}

impl AuthConfig {
    /// The realm's OpenID Connect token endpoint.
    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.auth_server.trim_end_matches('/'),
            self.realm
        )
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("auth_server", &self.auth_server)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds.
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Fetches and caches bearer tokens.
#[derive(Debug)]
pub struct TokenProvider {
    http: reqwest::Client,
    config: AuthConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, config: AuthConfig) -> Self {
        Self {
            http,
            config,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, fetching a new one if the cache is empty
    /// or the cached token is about to expire.
    ///
    /// The lock is held across the fetch so concurrent callers share one
    /// token request.
    pub async fn token(&self) -> Result<String, MoError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    /// Drops the cached token, e.g. after OS2mo rejected it with 401.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> Result<CachedToken, MoError> {
        let url = self.config.token_url();
        debug!(%url, client_id = %self.config.client_id, "Requesting access token");

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MoError::Authentication {
                message: format!("token request to {url} failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MoError::Authentication {
                message: format!("token endpoint returned HTTP {}: {body}", status.as_u16()),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| MoError::Authentication {
            message: format!("invalid token response: {e}"),
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}
