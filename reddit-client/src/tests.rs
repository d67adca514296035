use crate::api::{RedditApiClient, LISTING_LIMIT};
use crate::RedditClient;
use monitor_core::{CoreError, FeedKind, FeedSource, FeedSubscription, RedditApiError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn create_test_client() -> RedditClient {
    RedditClient::new(
        "reddit-monitor/0.1 by test_user".to_string(),
        "test_client_id".to_string(),
        "test_client_secret".to_string(),
    )
    .unwrap()
}

/// Serves `response` verbatim to every connection and returns the base URL.
async fn serve_fixed(response: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}", addr)
}

fn client_for(base_url: &str) -> RedditClient {
    let api = RedditApiClient::with_base_url("reddit-monitor/0.1".to_string(), base_url).unwrap();
    RedditClient::with_api(api, "id".to_string(), "secret".to_string()).unwrap()
}

#[test]
fn test_client_creation() {
    let client = create_test_client();
    assert_eq!(client.api().user_agent(), "reddit-monitor/0.1 by test_user");
    assert!(!tokio_test::block_on(client.has_token()));
}

#[test]
fn test_client_rejects_blank_credentials() {
    let result = RedditClient::new(
        "reddit-monitor/0.1".to_string(),
        "  ".to_string(),
        "secret".to_string(),
    );
    assert!(matches!(result, Err(CoreError::InvalidInput { .. })));

    let result = RedditClient::new(
        "reddit-monitor/0.1".to_string(),
        "id".to_string(),
        String::new(),
    );
    assert!(result.is_err());
}

#[test]
fn test_clones_share_api_client() {
    let client = create_test_client();
    let clone = client.clone();
    assert!(std::ptr::eq(client.api(), clone.api()));
}

#[tokio::test]
async fn test_invalidate_without_token_is_noop() {
    let client = create_test_client();
    client.invalidate_token().await;
    assert!(!client.has_token().await);
}

#[tokio::test]
async fn test_subscribe_is_lazy() {
    // Opening a subscription must not touch the network; polling does.
    let client = create_test_client();
    for kind in FeedKind::ALL {
        assert!(client.subscribe(kind).await.is_ok());
    }
    assert!(!client.has_token().await);
}

#[test]
fn test_custom_base_url() {
    let api = RedditApiClient::with_base_url(
        "reddit-monitor/0.1".to_string(),
        "http://127.0.0.1:9999",
    )
    .unwrap();
    let url = api.endpoint_url("/r/all/comments").unwrap();
    assert_eq!(url.as_str(), "http://127.0.0.1:9999/r/all/comments");

    let client = RedditClient::with_api(api, "id".to_string(), "secret".to_string()).unwrap();
    assert_eq!(client.api().user_agent(), "reddit-monitor/0.1");
}

#[test]
fn test_invalid_base_url() {
    let result = RedditApiClient::with_base_url("ua".to_string(), "not a url");
    assert!(matches!(result, Err(CoreError::InvalidInput { .. })));
}

#[tokio::test]
async fn test_fresh_client_rate_limit_status() {
    let client = create_test_client();
    let status = client.api().get_rate_limit_status().await;
    assert_eq!(status.requests_per_window, 600);
    assert_eq!(status.available_tokens, status.burst);
    assert!(!status.blocked);
    assert_eq!(LISTING_LIMIT, 100);
}

#[tokio::test]
async fn test_rejected_token_is_dropped_from_cache() {
    let base_url = serve_fixed(
        "HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
    )
    .await;
    let client = client_for(&base_url);
    client.set_token("stale", Duration::from_secs(3600)).await;
    assert!(client.has_token().await);

    let mut subscription = client.subscribe(FeedKind::Comments).await.unwrap();
    let result = subscription.next_batch().await;

    assert!(matches!(
        result,
        Err(CoreError::RedditApi(RedditApiError::InvalidToken))
    ));
    assert!(!client.has_token().await);
}

#[tokio::test]
async fn test_forbidden_listing_keeps_cached_token() {
    let base_url = serve_fixed(
        "HTTP/1.1 403 Forbidden\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
    )
    .await;
    let client = client_for(&base_url);
    client.set_token("valid", Duration::from_secs(3600)).await;

    let mut subscription = client.subscribe(FeedKind::Submissions).await.unwrap();
    let result = subscription.next_batch().await;

    assert!(matches!(
        result,
        Err(CoreError::RedditApi(RedditApiError::Forbidden { .. }))
    ));
    assert!(client.has_token().await);
}

#[tokio::test]
async fn test_too_many_requests_pauses_shared_budget() {
    let base_url = serve_fixed(
        "HTTP/1.1 429 Too Many Requests\r\nretry-after: 120\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
    )
    .await;
    let client = client_for(&base_url);

    let result = client.api().get_new_comments("token", 10).await;

    assert!(matches!(
        result,
        Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 120 }))
    ));
    assert!(client.api().get_rate_limit_status().await.blocked);
}
