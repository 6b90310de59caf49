use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Distinguishing client identifier sent with every feed request.
pub const USER_AGENT: &str = concat!("gather/", env!("CARGO_PKG_VERSION"));

/// Response bodies larger than this abort the fetch.
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving a feed document.
///
/// These cover the network leg only; parse and persistence failures have
/// their own error types downstream.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request exceeded the caller-supplied timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// TCP/TLS connection could not be established
    #[error("Connection failed: {0}")]
    ConnectionRefused(reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Any other network-level error (DNS, protocol, body read)
    #[error("Request failed: {0}")]
    Transport(reqwest::Error),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            FetchError::ConnectionRefused(err)
        } else {
            FetchError::Transport(err)
        }
    }
}

/// Fetch a feed document, returning the raw response bytes.
///
/// Sends a GET with the `gather/<version>` user agent. The whole
/// request/response cycle is bounded by `timeout` so one unreachable host
/// cannot hang an ingestion run. The response is owned by this scope, so
/// the connection is returned to the pool on every exit path.
///
/// There is no retry here. The caller (a human or an external scheduler)
/// decides whether to re-invoke.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let fetch_body = async {
        let response = client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE).await
    };

    tokio::time::timeout(timeout, fetch_body)
        .await
        .map_err(|_| FetchError::Timeout(timeout))?
}

/// Stream the body into memory, bailing out once `limit` bytes are exceeded.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<rss/>")
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let bytes = fetch(&client, &format!("{}/feed", mock_server.uri()), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(bytes, b"<rss/>");
    }

    #[tokio::test]
    async fn test_fetch_sends_client_identifier() {
        let mock_server = MockServer::start().await;
        // The matcher only responds 200 when our user agent is present
        Mock::given(method("GET"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch(&client, &mock_server.uri(), TIMEOUT).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_404_is_http_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch(&client, &mock_server.uri(), TIMEOUT)
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_fails_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1) // exactly one request: no retry policy
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch(&client, &mock_server.uri(), TIMEOUT)
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus(500) => {}
            e => panic!("Expected HttpStatus(500), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_slow_server_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch(&client, &mock_server.uri(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fetch_oversized_body_rejected() {
        let mock_server = MockServer::start().await;
        let body = vec![b'x'; MAX_FEED_SIZE + 1];
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch(&client, &mock_server.uri(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ResponseTooLarge));
    }

    #[tokio::test]
    async fn test_fetch_refused_connection() {
        // Nothing listens on this port
        let client = reqwest::Client::new();
        let err = fetch(&client, "http://127.0.0.1:1/feed.xml", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ConnectionRefused(_)));
    }
}
