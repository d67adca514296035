use crate::rate_limiter::{QuotaHeaders, RateLimitConfig, RateLimiter};
use monitor_core::{
    timestamp_from_epoch_seconds, Comment, ContentItem, CoreError, RedditApiError, Submission,
};
use oauth2::basic::BasicTokenResponse;
use oauth2::{ClientId, ClientSecret};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const REDDIT_WEB_BASE: &str = "https://reddit.com";

/// Largest page Reddit serves for listing endpoints.
pub const LISTING_LIMIT: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

impl<T> RedditListing<T> {
    /// Children in the order Reddit returned them (newest first for `new`
    /// and `comments` listings).
    pub fn into_items(self) -> Vec<T> {
        self.data.children.into_iter().map(|c| c.data).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
}

impl From<RedditPostData> for ContentItem {
    fn from(post: RedditPostData) -> Self {
        ContentItem::Submission(Submission {
            id: post.id,
            title: post.title,
            selftext: post.selftext,
            score: post.score,
            url: post.url,
            created_at: timestamp_from_epoch_seconds(post.created_utc),
            author: post.author,
            subreddit: post.subreddit,
        })
    }
}

impl From<RedditCommentData> for ContentItem {
    fn from(comment: RedditCommentData) -> Self {
        ContentItem::Comment(Comment {
            id: comment.id,
            body: comment.body,
            score: comment.score,
            link: format!("{}{}", REDDIT_WEB_BASE, comment.permalink),
            created_at: timestamp_from_epoch_seconds(comment.created_utc),
            author: comment.author,
            subreddit: comment.subreddit,
        })
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: Url,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String) -> Result<Self, CoreError> {
        Self::with_base_url(user_agent, REDDIT_API_BASE)
    }

    pub fn with_base_url(user_agent: String, base_url: &str) -> Result<Self, CoreError> {
        let base_url = Url::parse(base_url).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid Reddit API base URL '{}': {}", base_url, e),
        })?;
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth()));

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter,
            base_url,
            user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, CoreError> {
        self.base_url
            .join(endpoint)
            .map_err(|e| CoreError::InvalidInput {
                message: format!("invalid endpoint '{}': {}", endpoint, e),
            })
    }

    /// Exchanges app credentials for an app-only bearer token
    /// (`client_credentials` grant).
    pub async fn request_app_token(
        &self,
        client_id: &ClientId,
        client_secret: &ClientSecret,
    ) -> Result<BasicTokenResponse, CoreError> {
        let _wait = self.rate_limiter.acquire_permit().await;
        info!("Requesting Reddit app-only access token");

        let response = self
            .http_client
            .post(REDDIT_TOKEN_URL)
            .basic_auth(client_id.as_str(), Some(client_secret.secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("token endpoint returned {}", status),
            }));
        }
        let response = check_status(response, "/api/v1/access_token")?;

        response.json::<BasicTokenResponse>().await.map_err(|e| {
            error!("Failed to parse token response: {}", e);
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: "token response did not contain an access token".to_string(),
            })
        })
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = self.endpoint_url(endpoint)?;

        let waited = self.rate_limiter.acquire_permit().await;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, waited
        );

        let mut request_builder = self
            .http_client
            .request(method.clone(), url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = request_builder.send().await.map_err(|e| {
            error!("Network error for {} {}: {}", method, endpoint, e);
            map_transport_error(e)
        })?;

        if let Some(quota) = QuotaHeaders::from_headers(response.headers()) {
            debug!(
                "Reddit quota: {} remaining, resets in {:?}",
                quota.remaining, quota.reset
            );
            self.rate_limiter.observe_quota(quota).await;
        }

        let result = check_status(response, endpoint);
        if let Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after })) =
            &result
        {
            self.rate_limiter
                .pause_for(Duration::from_secs(*retry_after))
                .await;
        }
        result
    }

    async fn get_listing<T>(
        &self,
        access_token: &str,
        endpoint: &str,
        limit: u32,
    ) -> Result<RedditListing<T>, CoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let limit_str = limit.min(LISTING_LIMIT).to_string();
        let params = [("limit", limit_str.as_str()), ("raw_json", "1")];

        let response = self
            .make_request(Method::GET, endpoint, access_token, Some(&params[..]))
            .await?;

        let listing: RedditListing<T> = response.json().await.map_err(|e| {
            error!("Failed to parse listing from {}: {}", endpoint, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse listing from {}", endpoint),
            })
        })?;

        debug!(
            "Retrieved {} items from {}",
            listing.data.children.len(),
            endpoint
        );
        Ok(listing)
    }

    /// Newest submissions across all subreddits, newest first.
    pub async fn get_new_submissions(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        let listing: RedditListing<RedditPostData> =
            self.get_listing(access_token, "/r/all/new", limit).await?;
        Ok(listing.into_items().into_iter().map(ContentItem::from).collect())
    }

    /// Newest comments across all subreddits, newest first.
    pub async fn get_new_comments(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        let listing: RedditListing<RedditCommentData> =
            self.get_listing(access_token, "/r/all/comments", limit).await?;
        Ok(listing.into_items().into_iter().map(ContentItem::from).collect())
    }

    pub async fn get_rate_limit_status(&self) -> crate::rate_limiter::RateLimitStatus {
        self.rate_limiter.status().await
    }
}

fn map_transport_error(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        CoreError::RedditApi(RedditApiError::RequestTimeout)
    } else {
        CoreError::Network(e)
    }
}

/// Wait used when a 429 carries no usable Retry-After.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub(crate) fn check_status(response: Response, endpoint: &str) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    error!("Request failed with status: {} for {}", status, endpoint);
    Err(status_error(status, response.headers(), endpoint))
}

/// Maps a non-success status onto a [`RedditApiError`] variant.
pub(crate) fn status_error(status: StatusCode, headers: &HeaderMap, endpoint: &str) -> CoreError {
    let error = match status.as_u16() {
        429 => {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        401 => RedditApiError::InvalidToken,
        403 => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        404 => RedditApiError::InvalidResponse {
            details: "Resource not found".to_string(),
        },
        code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
        code => {
            return CoreError::RequestFailed {
                message: format!("{} returned {}", endpoint, status),
                status_code: Some(code),
            }
        }
    };
    CoreError::RedditApi(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMISSION_LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_b",
            "dist": 2,
            "modhash": "",
            "before": null,
            "children": [
                {"kind": "t3", "data": {
                    "id": "b", "title": "New Rocket Launch", "selftext": "",
                    "author": "astro", "subreddit": "spacex",
                    "url": "https://example.com/launch",
                    "permalink": "/r/spacex/comments/b/new_rocket_launch/",
                    "created_utc": 1714521600.0, "score": 42, "over_18": false
                }},
                {"kind": "t3", "data": {
                    "id": "a", "title": "Older", "author": "[deleted]",
                    "subreddit": "rust", "created_utc": 1714521500.5
                }}
            ]
        }
    }"#;

    const COMMENT_LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "children": [
                {"kind": "t1", "data": {
                    "id": "c1", "body": "the rocket looked great",
                    "author": "viewer", "subreddit": "spacex",
                    "permalink": "/r/spacex/comments/b/x/c1/",
                    "created_utc": 1714521700.0, "score": 3
                }}
            ]
        }
    }"#;

    #[tokio::test]
    async fn test_api_client_creation() {
        let client = RedditApiClient::new("test-user-agent/1.0".to_string()).unwrap();
        assert_eq!(client.user_agent(), "test-user-agent/1.0");

        let status = client.get_rate_limit_status().await;
        assert!(status.available_tokens > 0);
    }

    #[test]
    fn test_endpoint_url() {
        let client = RedditApiClient::new("ua".to_string()).unwrap();
        assert_eq!(
            client.endpoint_url("/r/all/new").unwrap().as_str(),
            "https://oauth.reddit.com/r/all/new"
        );
        assert!(RedditApiClient::with_base_url("ua".to_string(), "not a url").is_err());
    }

    #[test]
    fn test_submission_listing_conversion() {
        let listing: RedditListing<RedditPostData> =
            serde_json::from_str(SUBMISSION_LISTING).unwrap();
        let items: Vec<ContentItem> = listing
            .into_items()
            .into_iter()
            .map(ContentItem::from)
            .collect();

        assert_eq!(items.len(), 2);
        match &items[0] {
            ContentItem::Submission(s) => {
                assert_eq!(s.id, "b");
                assert_eq!(s.title, "New Rocket Launch");
                assert_eq!(s.score, 42);
                assert_eq!(s.url, "https://example.com/launch");
                assert_eq!(s.created_at.timestamp(), 1714521600);
            }
            other => panic!("expected submission, got {:?}", other),
        }
        match &items[1] {
            ContentItem::Submission(s) => {
                assert_eq!(s.selftext, "");
                assert_eq!(s.score, 0);
                assert_eq!(s.created_at.timestamp_micros(), 1714521500_500_000);
            }
            other => panic!("expected submission, got {:?}", other),
        }
    }

    #[test]
    fn test_comment_listing_conversion_builds_link() {
        let listing: RedditListing<RedditCommentData> =
            serde_json::from_str(COMMENT_LISTING).unwrap();
        let items: Vec<ContentItem> = listing
            .into_items()
            .into_iter()
            .map(ContentItem::from)
            .collect();

        match &items[0] {
            ContentItem::Comment(c) => {
                assert_eq!(c.link, "https://reddit.com/r/spacex/comments/b/x/c1/");
                assert_eq!(c.body, "the rocket looked great");
                assert_eq!(c.subreddit, "spacex");
            }
            other => panic!("expected comment, got {:?}", other),
        }
    }

    fn retry_after(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_too_many_requests_honours_retry_after() {
        let error = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            &retry_after("120"),
            "/r/all/new",
        );
        assert!(matches!(
            error,
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 120 })
        ));
    }

    #[test]
    fn test_too_many_requests_without_usable_retry_after_waits_default() {
        for headers in [HeaderMap::new(), retry_after("soon"), retry_after("-5")] {
            match status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "/r/all/new") {
                CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after }) => {
                    assert_eq!(retry_after, DEFAULT_RETRY_AFTER_SECS);
                }
                other => panic!("expected rate limit error, got {:?}", other),
            }
        }
        assert_eq!(DEFAULT_RETRY_AFTER_SECS, 60);
    }

    #[test]
    fn test_auth_and_missing_resource_statuses() {
        let headers = HeaderMap::new();
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, &headers, "/r/all/new"),
            CoreError::RedditApi(RedditApiError::InvalidToken)
        ));
        match status_error(StatusCode::FORBIDDEN, &headers, "/r/all/comments") {
            CoreError::RedditApi(RedditApiError::Forbidden { resource }) => {
                assert_eq!(resource, "/r/all/comments");
            }
            other => panic!("expected forbidden, got {:?}", other),
        }
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, &headers, "/r/all/new"),
            CoreError::RedditApi(RedditApiError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_server_and_other_client_errors() {
        let headers = HeaderMap::new();
        for status in [StatusCode::INTERNAL_SERVER_ERROR, StatusCode::SERVICE_UNAVAILABLE] {
            match status_error(status, &headers, "/r/all/new") {
                CoreError::RedditApi(RedditApiError::ServerError { status_code }) => {
                    assert_eq!(status_code, status.as_u16());
                }
                other => panic!("expected server error, got {:?}", other),
            }
        }
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, &headers, "/r/all/new"),
            CoreError::RequestFailed {
                status_code: Some(400),
                ..
            }
        ));
    }

    #[test]
    fn test_token_response_parses() {
        use oauth2::TokenResponse;

        let token: BasicTokenResponse = serde_json::from_str(
            r#"{"access_token": "abc", "token_type": "bearer", "expires_in": 86400, "scope": "*"}"#,
        )
        .unwrap();
        assert_eq!(token.access_token().secret(), "abc");
        assert_eq!(token.expires_in(), Some(Duration::from_secs(86400)));
    }
}
