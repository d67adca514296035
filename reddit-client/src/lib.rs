pub mod api;
pub mod rate_limiter;
pub mod stream;

#[cfg(test)]
mod tests;

use api::RedditApiClient;
use async_trait::async_trait;
use monitor_core::{CoreError, FeedKind, FeedSource, FeedSubscription};
use oauth2::{ClientId, ClientSecret, TokenResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stream::RedditSubscription;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens are refreshed this long before Reddit says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Used when the token response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct AppToken {
    access_token: String,
    refresh_at: Instant,
}

impl AppToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

struct ClientInner {
    api: RedditApiClient,
    client_id: ClientId,
    client_secret: ClientSecret,
    token: Mutex<Option<AppToken>>,
}

/// Read-only, app-only Reddit client. Cheap to clone; clones share the
/// HTTP client, rate limiter and cached token.
#[derive(Clone)]
pub struct RedditClient {
    inner: Arc<ClientInner>,
}

impl RedditClient {
    pub fn new(
        user_agent: String,
        client_id: String,
        client_secret: String,
    ) -> Result<Self, CoreError> {
        Self::with_api(RedditApiClient::new(user_agent)?, client_id, client_secret)
    }

    pub fn with_api(
        api: RedditApiClient,
        client_id: String,
        client_secret: String,
    ) -> Result<Self, CoreError> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "Reddit client id and secret must not be empty".to_string(),
            });
        }

        Ok(Self {
            inner: Arc::new(ClientInner {
                api,
                client_id: ClientId::new(client_id),
                client_secret: ClientSecret::new(client_secret),
                token: Mutex::new(None),
            }),
        })
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.inner.api
    }

    /// Returns a cached app-only token, requesting a new one when missing or
    /// about to expire.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.inner.token.lock().await;
        let now = Instant::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        let response = self
            .inner
            .api
            .request_app_token(&self.inner.client_id, &self.inner.client_secret)
            .await?;
        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let token = AppToken {
            access_token: response.access_token().secret().clone(),
            refresh_at: now + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        };
        info!("Obtained Reddit access token valid for {:?}", lifetime);

        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token so the next request authenticates again.
    pub async fn invalidate_token(&self) {
        debug!("Invalidating cached Reddit access token");
        *self.inner.token.lock().await = None;
    }

    pub async fn has_token(&self) -> bool {
        self.inner.token.lock().await.is_some()
    }

    #[cfg(test)]
    pub(crate) async fn set_token(&self, access_token: &str, lifetime: Duration) {
        *self.inner.token.lock().await = Some(AppToken {
            access_token: access_token.to_string(),
            refresh_at: Instant::now() + lifetime,
        });
    }
}

#[async_trait]
impl FeedSource for RedditClient {
    async fn subscribe(&self, kind: FeedKind) -> Result<Box<dyn FeedSubscription>, CoreError> {
        debug!("Opening {} subscription", kind);
        Ok(Box::new(RedditSubscription::new(self.clone(), kind)))
    }
}
