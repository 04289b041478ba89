// Segment fetcher: raw download of a single URL, abortable through the job's token.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::FetchError;

/// Byte-fetch capability used by the orchestrator.
///
/// Implementations must return [`FetchError::Cancelled`] promptly once `token`
/// fires; every other error is treated as a retryable per-unit failure.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, token: &CancellationToken) -> Result<Bytes, FetchError>;
}

/// reqwest-backed fetcher.
pub struct HttpSegmentFetcher {
    http_client: Client,
    request_timeout: Option<Duration>,
}

impl HttpSegmentFetcher {
    pub fn new(http_client: Client) -> Self {
        Self {
            http_client,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn fetch_body(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }

        let http_version = response.version();
        let content_length = response.content_length().unwrap_or(0) as usize;
        let mut buffer = BytesMut::with_capacity(content_length);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_reqwest_error(url, e))?;
            buffer.extend_from_slice(&chunk);
        }

        trace!(
            url,
            http_version = ?http_version,
            bytes = buffer.len(),
            "Segment downloaded"
        );
        Ok(buffer.freeze())
    }
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::network(url, err.to_string())
    }
}

#[async_trait]
impl SegmentFetcher for HttpSegmentFetcher {
    async fn fetch(&self, url: &str, token: &CancellationToken) -> Result<Bytes, FetchError> {
        let request = async {
            match self.request_timeout {
                Some(timeout) => tokio::time::timeout(timeout, self.fetch_body(url))
                    .await
                    .map_err(|_| FetchError::Timeout {
                        url: url.to_string(),
                    })?,
                None => self.fetch_body(url).await,
            }
        };

        // Dropping the request future aborts the underlying connection.
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(FetchError::Cancelled),
            result = request => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use rustls::{ClientConfig, RootCertStore, crypto::aws_lc_rs};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(30)).await;
        "late"
    }

    /// Serves a tiny CDN on a random local port and returns its base URL.
    async fn serve() -> String {
        let app = Router::new()
            .route("/v/seg.ts", get(|| async { "segment-bytes" }))
            .route("/v/gone.ts", get(|| async { StatusCode::NOT_FOUND }))
            .route("/v/slow.ts", get(slow));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client() -> Client {
        let tls = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(RootCertStore::empty())
            .with_no_client_auth();
        Client::builder()
            .use_preconfigured_tls(tls)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let base = serve().await;
        let fetcher = HttpSegmentFetcher::new(client());

        let bytes = fetcher
            .fetch(&format!("{base}/v/seg.ts"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"segment-bytes");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let base = serve().await;
        let fetcher = HttpSegmentFetcher::new(client());
        let url = format!("{base}/v/gone.ts");

        let err = fetcher
            .fetch(&url, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus { status, url: failed } => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert_eq!(failed, url);
            }
            other => panic!("expected an HTTP status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn token_aborts_request_in_flight() {
        let base = serve().await;
        let fetcher = HttpSegmentFetcher::new(client());
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            fetcher.fetch(&format!("{base}/v/slow.ts"), &token),
        )
        .await
        .expect("Failed to abort the request after cancellation");
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn request_timeout_is_a_unit_failure() {
        let base = serve().await;
        let fetcher =
            HttpSegmentFetcher::new(client()).with_request_timeout(Some(Duration::from_millis(50)));

        let err = fetcher
            .fetch(&format!("{base}/v/slow.ts"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }
}
