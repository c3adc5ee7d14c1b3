//! Transport seam for the search stream.
//!
//! The session only needs "open a request, get a byte stream back". `HttpTransport`
//! is the real backend; tests plug in scripted streams.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use tracing::debug;

use crate::api_client::backend_error_message;
use crate::errors::TransportError;
use crate::models::SearchRequest;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

const STREAM_PATH: &str = "/api/jobs/search/stream";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Sends the search and returns the response body as raw chunks.
    /// A non-success status is an error here, before any byte is streamed.
    async fn open(&self, request: &SearchRequest) -> Result<ByteStream, TransportError>;
}

/// Streams search results from the backend over a long-lived HTTP response.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        // Only the connect phase is bounded; a total timeout would cut off long searches.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn stream_url(&self) -> String {
        format!("{}{}", self.base_url, STREAM_PATH)
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn open(&self, request: &SearchRequest) -> Result<ByteStream, TransportError> {
        let url = self.stream_url();
        debug!(%url, query = %request.query, "opening search stream");

        let response = self
            .client
            .post(&url)
            .header("accept", "text/event-stream")
            .header("cache-control", "no-cache")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: backend_error_message(&body),
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::stream::event::StreamEvent;
    use axum::{
        body::Body,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use std::convert::Infallible;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn stream_handler(Json(body): Json<serde_json::Value>) -> Response {
        let platforms = body["platforms"].clone();
        let start = format!(
            "data: {}\n\n",
            serde_json::json!({"type": "start", "platforms": platforms})
        );
        let chunks: Vec<Result<Bytes, Infallible>> = vec![
            Ok(Bytes::from(start)),
            Ok(Bytes::from_static(b"data: {\"type\":")),
            Ok(Bytes::from_static(b"\"done\"}\n\n")),
        ];
        Response::builder()
            .header("content-type", "text/event-stream")
            .body(Body::from_stream(futures::stream::iter(chunks)))
            .unwrap()
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_http_transport_streams_body() {
        let base = serve(Router::new().route(STREAM_PATH, post(stream_handler))).await;
        let transport = HttpTransport::new(format!("{base}/"));

        let request = SearchRequest::new("rust").with_sources([Source::Glassdoor]);
        let body = collect(transport.open(&request).await.unwrap()).await;

        let mut decoder = crate::stream::frame::FrameDecoder::default();
        let events: Vec<_> = decoder
            .decode(&body)
            .unwrap()
            .iter()
            .map(|f| crate::stream::event::parse_frame(f).unwrap().unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Start {
                    sources: vec!["glassdoor".to_string()]
                },
                StreamEvent::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_http_transport_maps_error_status() {
        async fn unavailable() -> impl IntoResponse {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"detail": "scrapers offline"})),
            )
        }
        let base = serve(Router::new().route(STREAM_PATH, post(unavailable))).await;
        let transport = HttpTransport::new(base);

        let err = transport
            .open(&SearchRequest::new("rust"))
            .await
            .err()
            .unwrap();
        assert_eq!(
            err,
            TransportError::Status {
                status: 503,
                message: "scrapers offline".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_http_transport_connect_failure() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(format!("http://{addr}"));
        let err = transport
            .open(&SearchRequest::new("rust"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
