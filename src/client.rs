//! Outbound HTTP to the intake backend.
//!
//! [`IntakeBackend`] is the seam the wizard talks through; [`HttpBackend`]
//! is the reqwest implementation for the three endpoints.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Deserialize;

pub const SUBMIT_PATH: &str = "/api/submit-intake";
pub const SUMMARY_STREAM_PATH: &str = "/api/generate-summary/stream";
pub const SUMMARY_PATH: &str = "/api/generate-summary";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound for the request/response endpoints. The stream has none.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Streaming endpoint unavailable (HTTP {0})")]
    StreamingUnavailable(u16),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Network(e.to_string())
    }
}

/// Raw response body chunks, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, BackendError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub id: String,
    pub message: String,
}

#[async_trait]
pub trait IntakeBackend: Send + Sync {
    async fn submit_intake(&self, payload: &serde_json::Value) -> Result<SubmitReceipt, BackendError>;

    /// Open the summary event stream.
    async fn stream_summary(&self, payload: &serde_json::Value) -> Result<ByteStream, BackendError>;

    /// Non-streaming summary. Returns the summary text.
    async fn generate_summary(&self, payload: &serde_json::Value) -> Result<String, BackendError>;
}

// ═══════════════════════════════════════════════════════════
// reqwest implementation
// ═══════════════════════════════════════════════════════════

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SubmitBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    id: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct SummaryBody {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Backend at `PEXP_BACKEND_URL` (defaults to the local bind address).
    pub fn from_settings(settings: &crate::config::Settings) -> Result<Self, BackendError> {
        Self::new(&settings.backend_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Pull a user-facing message out of an error body.
fn error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait]
impl IntakeBackend for HttpBackend {
    async fn submit_intake(&self, payload: &serde_json::Value) -> Result<SubmitReceipt, BackendError> {
        let resp = self
            .client
            .post(self.url(SUBMIT_PATH))
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(&text, "Failed to submit assessment"),
            });
        }

        let body: SubmitBody = serde_json::from_str(&text)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        if !body.success {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: body
                    .message
                    .unwrap_or_else(|| "Failed to submit assessment".into()),
            });
        }

        let id = match body.id {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => return Err(BackendError::InvalidResponse("missing submission id".into())),
        };
        Ok(SubmitReceipt {
            id,
            message: body.message.unwrap_or_default(),
        })
    }

    async fn stream_summary(&self, payload: &serde_json::Value) -> Result<ByteStream, BackendError> {
        let resp = self
            .client
            .post(self.url(SUMMARY_STREAM_PATH))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(payload)
            .send()
            .await?;
        let status = resp.status();

        if matches!(status.as_u16(), 404 | 405 | 501) {
            return Err(BackendError::StreamingUnavailable(status.as_u16()));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(&text, &format!("AI summary request failed ({status})")),
            });
        }

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(BackendError::from));
        Ok(Box::pin(stream))
    }

    async fn generate_summary(&self, payload: &serde_json::Value) -> Result<String, BackendError> {
        let resp = self
            .client
            .post(self.url(SUMMARY_PATH))
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        let body: SummaryBody = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                BackendError::InvalidResponse(e.to_string())
            } else {
                BackendError::Status {
                    status: status.as_u16(),
                    message: format!("AI summary request failed ({status})"),
                }
            }
        })?;

        match (status.is_success(), body.summary, body.error) {
            (true, Some(summary), _) if !summary.trim().is_empty() => Ok(summary),
            (_, _, Some(error)) => Err(BackendError::Status {
                status: status.as_u16(),
                message: error,
            }),
            (true, _, None) => Err(BackendError::InvalidResponse("response had no summary".into())),
            (false, _, None) => Err(BackendError::Status {
                status: status.as_u16(),
                message: format!("AI summary request failed ({status})"),
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Scripted backend (tests)
// ═══════════════════════════════════════════════════════════


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn submit_returns_receipt() {
        let router = Router::new().route(
            SUBMIT_PATH,
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["email"], "jane@example.org");
                Json(json!({"success": true, "message": "ok", "id": "abc123"}))
            }),
        );
        let backend = HttpBackend::new(&serve(router).await).unwrap();
        let receipt = backend
            .submit_intake(&json!({"email": "jane@example.org"}))
            .await
            .unwrap();
        assert_eq!(receipt.id, "abc123");
    }

    #[tokio::test]
    async fn backend_from_settings_posts_to_configured_url() {
        let router = Router::new().route(
            SUBMIT_PATH,
            post(|| async { Json(json!({"success": true, "message": "ok", "id": "cfg1"})) }),
        );
        let base = serve(router).await;
        let settings = crate::config::Settings::from_lookup(|var| match var {
            "PEXP_BACKEND_URL" => Some(format!("{base}/")),
            _ => None,
        })
        .unwrap();
        let backend = HttpBackend::from_settings(&settings).unwrap();
        assert_eq!(backend.base_url, base);
        let receipt = backend.submit_intake(&json!({})).await.unwrap();
        assert_eq!(receipt.id, "cfg1");
    }

    #[tokio::test]
    async fn submit_failure_carries_server_message() {
        let router = Router::new().route(
            SUBMIT_PATH,
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"success": false, "message": "Failed to submit assessment"})),
                )
            }),
        );
        let backend = HttpBackend::new(&serve(router).await).unwrap();
        let err = backend.submit_intake(&json!({})).await.unwrap_err();
        match err {
            BackendError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Failed to submit assessment");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_stream_route_is_streaming_unavailable() {
        let backend = HttpBackend::new(&serve(Router::new()).await).unwrap();
        let err = backend.stream_summary(&json!({})).await.err().unwrap();
        assert!(matches!(err, BackendError::StreamingUnavailable(404)));
    }

    #[tokio::test]
    async fn stream_yields_body_bytes() {
        let router = Router::new().route(
            SUMMARY_STREAM_PATH,
            post(|| async { "data: {\"event\":\"complete\",\"html\":\"x\"}\n\n" }),
        );
        let backend = HttpBackend::new(&serve(router).await).unwrap();
        let mut stream = backend.stream_summary(&json!({})).await.unwrap();
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend(chunk.unwrap());
        }
        assert!(String::from_utf8(body).unwrap().contains("complete"));
    }

    #[tokio::test]
    async fn intake_router_stream_decodes_into_frames() {
        use crate::api::{intake_router, ApiContext};
        use crate::llm::{MockSummaryModel, SummaryModel};
        use crate::wizard::frames::{FrameDecoder, SummaryFrame};
        use std::sync::Arc;

        let model: Arc<dyn SummaryModel> = Arc::new(MockSummaryModel::new(["<p>a", "b</p>"]));
        let ctx = ApiContext::in_memory(Some(model)).unwrap();
        let backend = HttpBackend::new(&serve(intake_router(ctx)).await).unwrap();

        let mut stream = backend
            .stream_summary(&json!({"fullName": "Jane", "consent": "on"}))
            .await
            .unwrap();
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        while let Some(chunk) = stream.next().await {
            frames.extend(decoder.push(&chunk.unwrap()));
        }
        frames.extend(decoder.finish());

        assert!(matches!(frames.first(), Some(SummaryFrame::Status { .. })));
        assert!(matches!(
            frames.last(),
            Some(SummaryFrame::Complete { html: Some(h), .. }) if h == "<p>ab</p>"
        ));
    }

    #[tokio::test]
    async fn generate_summary_maps_error_body() {
        let router = Router::new().route(
            SUMMARY_PATH,
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({"error": "AI summary service is not configured."})),
                )
            }),
        );
        let backend = HttpBackend::new(&serve(router).await).unwrap();
        let err = backend.generate_summary(&json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "AI summary service is not configured.");
    }

    #[tokio::test]
    async fn generate_summary_returns_text() {
        let router = Router::new().route(
            SUMMARY_PATH,
            post(|| async { Json(json!({"summary": "<p>ok</p>"})) }),
        );
        let backend = HttpBackend::new(&serve(router).await).unwrap();
        assert_eq!(backend.generate_summary(&json!({})).await.unwrap(), "<p>ok</p>");
    }

    #[test]
    fn error_message_prefers_error_then_message() {
        assert_eq!(error_message(r#"{"error":"e","message":"m"}"#, "f"), "e");
        assert_eq!(error_message(r#"{"message":"m"}"#, "f"), "m");
        assert_eq!(error_message("<html>", "f"), "f");
    }
}
