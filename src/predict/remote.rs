//! Remote backend: POSTs the sequence to a prediction server
//!
//! The server's answer is trusted as-is. Its bases are not re-validated and
//! a missing `changeIndicator` is derived from the two sequences.

use super::{
    ChangeIndicator, OffTarget, PredictionBackend, PredictionError, PredictionRequest,
    PredictionResult,
};
use crate::sequence::Sequence;
use async_trait::async_trait;
use log::{info, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::time::{self, Duration};

/// Where and how to reach the prediction server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteEndpoint {
    /// Scheme, host and port, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Path of the predict route
    pub route: String,
    /// Extra attempts after a transport failure
    pub max_retries: u32,
    /// Backoff step between attempts; attempt `n` waits `n * retry_backoff_ms`
    pub retry_backoff_ms: u64,
}

impl Default for RemoteEndpoint {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            route: "/predict".to_string(),
            max_retries: 0,
            retry_backoff_ms: 250,
        }
    }
}

impl RemoteEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Deployments that mount the model under `/api/predict`
    pub fn api_variant(base_url: impl Into<String>) -> Self {
        Self {
            route: "/api/predict".to_string(),
            ..Self::new(base_url)
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.route.trim_start_matches('/')
        )
    }
}

/// Success body as the server sends it; most fields are optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteResponse {
    original_sequence: Option<String>,
    edited_sequence: String,
    change_indicator: Option<ChangeIndicator>,
    efficiency: f64,
    changed_position: Option<usize>,
    original_base: Option<char>,
    new_base: Option<char>,
    message: Option<String>,
    original_efficiency: Option<f64>,
    #[serde(default)]
    off_targets: Vec<OffTarget>,
    therapeutic_summary: Option<String>,
}

impl RemoteResponse {
    fn into_result(self, submitted: &Sequence) -> PredictionResult {
        let original_sequence = self
            .original_sequence
            .unwrap_or_else(|| submitted.to_string());
        let change_indicator = self
            .change_indicator
            .unwrap_or_else(|| ChangeIndicator::between(&original_sequence, &self.edited_sequence));
        // Single-change fields fall back to what the indicator implies
        let derived = PredictionResult::from_parts(
            original_sequence,
            self.edited_sequence,
            change_indicator,
            self.efficiency,
        );
        PredictionResult {
            changed_position: self.changed_position.or(derived.changed_position),
            original_base: self.original_base.or(derived.original_base),
            new_base: self.new_base.or(derived.new_base),
            message: self.message,
            original_efficiency: self.original_efficiency,
            off_targets: self.off_targets,
            therapeutic_summary: self.therapeutic_summary,
            ..derived
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Looks for `{"error": "..."}` first, then FastAPI's `{"detail": "..."}`.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "detail"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

/// Backend that calls a model server over HTTP
pub struct RemoteBackend {
    pub endpoint: RemoteEndpoint,
    client: reqwest::Client,
}

impl RemoteBackend {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    async fn send_once(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let response = self
            .client
            .post(self.endpoint.url())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| PredictionError::TransportFailure(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PredictionError::TransportFailure(e.to_string()))?;

        if !status.is_success() {
            let message = server_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(PredictionError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let wire: RemoteResponse =
            serde_json::from_str(&body).map_err(|e| PredictionError::ServerError {
                status: status.as_u16(),
                message: format!("Malformed prediction response: {}", e),
            })?;
        Ok(wire.into_result(&request.sequence))
    }
}

#[async_trait]
impl PredictionBackend for RemoteBackend {
    async fn predict(&self, request: PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Err(e) if e.is_retryable() && attempt < self.endpoint.max_retries => {
                    attempt += 1;
                    warn!(
                        "Prediction {} attempt {} failed ({}), retrying",
                        request.id, attempt, e
                    );
                    let backoff = self.endpoint.retry_backoff_ms * u64::from(attempt);
                    time::sleep(Duration::from_millis(backoff)).await;
                }
                Ok(result) => {
                    info!("Remote prediction {}: {}", request.id, result.summary());
                    return Ok(result);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::{EditContext, RiskLevel};
    use crate::sequence::validate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INPUT: &str = "ATCGATCGATCGATCGATCG";

    fn request() -> PredictionRequest {
        PredictionRequest::new(validate(INPUT).unwrap())
    }

    #[test]
    fn test_url_join() {
        assert_eq!(RemoteEndpoint::new("http://h:8000/").url(), "http://h:8000/predict");
        assert_eq!(RemoteEndpoint::api_variant("http://h:5000").url(), "http://h:5000/api/predict");
    }

    #[test]
    fn test_server_message_extraction() {
        assert_eq!(server_message(r#"{"error":"bad seq"}"#).as_deref(), Some("bad seq"));
        assert_eq!(server_message(r#"{"detail":"not found"}"#).as_deref(), Some("not found"));
        assert_eq!(server_message(r#"{"detail":[{"loc":["body"]}]}"#), None);
        assert_eq!(server_message(r#"{"error":"  "}"#), None);
        assert_eq!(server_message("<html>502</html>"), None);
    }

    #[tokio::test]
    async fn test_successful_prediction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .and(body_json(serde_json::json!({ "sequence": INPUT })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "originalSequence": INPUT,
                "editedSequence": "ATCGATCGATCGTTCGATCG",
                "changeIndicator": "............*.......",
                "efficiency": 0,
                "changedPosition": 13,
                "originalBase": "A",
                "newBase": "T",
                "message": "Editing improves similarity from 0 to 0",
                "originalEfficiency": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(RemoteEndpoint::new(server.uri()));
        let result = backend.predict(request()).await.unwrap();
        assert_eq!(result.edited_sequence, "ATCGATCGATCGTTCGATCG");
        assert_eq!(result.change_indicator.changed_positions(), vec![12]);
        assert_eq!(result.changed_position, Some(13));
        assert_eq!(result.original_base, Some('A'));
        assert_eq!(result.new_base, Some('T'));
        assert_eq!(result.original_efficiency, Some(0.0));
        assert_eq!(backend.name(), "remote");
    }

    #[tokio::test]
    async fn test_api_variant_without_indicator() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "editedSequence": "TTCGATCGATCGATCGATCC",
                "efficiency": 85.5,
                "offTargets": [
                    { "site": "chr7:145,789,543", "risk": "high" },
                    { "site": "chr12:78,901,234", "risk": "medium" }
                ],
                "therapeuticSummary": "Prediction summary..."
            })))
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(RemoteEndpoint::api_variant(server.uri()));
        let req = request().with_context(EditContext {
            disease: Some("Beta Thalassemia".into()),
            ..EditContext::default()
        });
        let result = backend.predict(req).await.unwrap();
        assert_eq!(result.original_sequence, INPUT);
        assert_eq!(result.change_indicator.to_string(), "*..................*");
        assert_eq!(result.efficiency, 85.5);
        assert_eq!(result.off_targets.len(), 2);
        assert_eq!(result.off_targets[0].risk, RiskLevel::High);
        assert_eq!(result.therapeutic_summary.as_deref(), Some("Prediction summary..."));
    }

    #[tokio::test]
    async fn test_server_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "error": "Sequence must contain only A, T, C, G" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(RemoteEndpoint {
            max_retries: 3,
            ..RemoteEndpoint::new(server.uri())
        });
        let err = backend.predict(request()).await.unwrap_err();
        assert_eq!(
            err,
            PredictionError::ServerError {
                status: 400,
                message: "Sequence must contain only A, T, C, G".into()
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_without_body_is_generic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(RemoteEndpoint::new(server.uri()));
        let err = backend.predict(request()).await.unwrap_err();
        assert_eq!(err, PredictionError::ServerError { status: 503, message: "HTTP 503".into() });
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(RemoteEndpoint::new(server.uri()));
        match backend.predict(request()).await {
            Err(PredictionError::ServerError { status: 200, message }) => {
                assert!(message.starts_with("Malformed prediction response"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        // Bind then drop a listener so the port is known to be closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = RemoteBackend::new(RemoteEndpoint {
            max_retries: 2,
            retry_backoff_ms: 1,
            ..RemoteEndpoint::new(format!("http://{}", addr))
        });
        let err = backend.predict(request()).await.unwrap_err();
        assert!(matches!(err, PredictionError::TransportFailure(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_missing_single_change_fields_are_derived() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "editedSequence": "TTCGATCGATCGATCGATCG",
                "efficiency": 80
            })))
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(RemoteEndpoint::new(server.uri()));
        let result = backend.predict(request()).await.unwrap();
        assert_eq!(result.change_indicator.to_string(), "*...................");
        assert_eq!(result.changed_position, Some(1));
        assert_eq!(result.original_base, Some('A'));
        assert_eq!(result.new_base, Some('T'));
    }

    /// Accepts connections forever, closing each one without a response
    async fn dropping_listener() -> (std::net::SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });
        (addr, accepted)
    }

    /// Read one HTTP request: headers, then `Content-Length` bytes of body
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_transport_failures_are_retried_up_to_limit() {
        let (addr, accepted) = dropping_listener().await;
        let backend = RemoteBackend::new(RemoteEndpoint {
            max_retries: 2,
            retry_backoff_ms: 1,
            ..RemoteEndpoint::new(format!("http://{}", addr))
        });
        let err = backend.predict(request()).await.unwrap_err();
        assert!(matches!(err, PredictionError::TransportFailure(_)), "got {:?}", err);
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retries_by_default() {
        let (addr, accepted) = dropping_listener().await;
        let backend = RemoteBackend::new(RemoteEndpoint::new(format!("http://{}", addr)));
        assert!(backend.predict(request()).await.is_err());
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_dropped_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (first, _) = listener.accept().await.unwrap();
            drop(first);

            let (mut second, _) = listener.accept().await.unwrap();
            read_request(&mut second).await;
            let body = serde_json::json!({
                "originalSequence": INPUT,
                "editedSequence": "ATCGATCGATCGATCGATCC",
                "efficiency": 72
            })
            .to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            second.write_all(response.as_bytes()).await.unwrap();
            second.shutdown().await.ok();
        });

        let backend = RemoteBackend::new(RemoteEndpoint {
            max_retries: 1,
            retry_backoff_ms: 1,
            ..RemoteEndpoint::new(format!("http://{}", addr))
        });
        let result = backend.predict(request()).await.unwrap();
        assert_eq!(result.edited_sequence, "ATCGATCGATCGATCGATCC");
        assert_eq!(result.changed_position, Some(20));
        assert_eq!(result.efficiency, 72.0);
        server.await.unwrap();
    }
}
