//! AI summary endpoints: server-sent event stream and single response.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::api::error::{ApiError, INVALID_JSON_MESSAGE, PROMPT_FAILED_MESSAGE};
use crate::api::types::ApiContext;
use crate::llm::prompt::{build_prompt, GENERATE_MAX_TOKENS, STREAM_MAX_TOKENS};
use crate::llm::SummaryModel;
use crate::wizard::frames::{encode_frame, SummaryFrame};
use crate::wizard::summary::EMPTY_SUMMARY_MESSAGE;

pub const CONNECTING_MESSAGE: &str = "Connecting to AI...";
const STREAM_FAILED_MESSAGE: &str = "An unexpected error occurred while streaming the AI summary.";

fn parse_payload(payload: Result<Json<serde_json::Value>, JsonRejection>) -> Result<serde_json::Value, ApiError> {
    payload.map(|Json(v)| v).map_err(|e| {
        tracing::debug!(error = %e, "Rejected summary body");
        ApiError::BadRequest(INVALID_JSON_MESSAGE.into())
    })
}

fn prompt_for(payload: &serde_json::Value) -> Result<String, ApiError> {
    build_prompt(payload)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(PROMPT_FAILED_MESSAGE.into()))
}

fn frame_event(frame: &SummaryFrame) -> Event {
    let name = match frame {
        SummaryFrame::Status { .. } => "status",
        SummaryFrame::Delta { .. } => "delta",
        SummaryFrame::Complete { .. } => "complete",
        SummaryFrame::Error { .. } => "error",
    };
    match encode_frame(frame) {
        Ok(data) => Event::default().event(name).data(data),
        Err(_) => Event::default().event(name).data("{}"),
    }
}

/// Drive the model and forward frames. Returns when the stream ends or the
/// client goes away (send fails), dropping the model stream.
async fn pump(model: Arc<dyn SummaryModel>, prompt: String, tx: mpsc::Sender<SummaryFrame>) {
    let send = |frame: SummaryFrame| {
        let tx = tx.clone();
        async move { tx.send(frame).await.is_ok() }
    };

    if !send(SummaryFrame::Status {
        message: CONNECTING_MESSAGE.into(),
    })
    .await
    {
        return;
    }

    let mut tokens = match model.stream(&prompt, STREAM_MAX_TOKENS).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "Summary stream could not start");
            send(SummaryFrame::Error {
                message: e.to_string(),
            })
            .await;
            return;
        }
    };

    let mut summary = String::new();
    while let Some(token) = tokens.next().await {
        match token {
            Ok(chunk) if chunk.is_empty() => {}
            Ok(chunk) => {
                summary.push_str(&chunk);
                if !send(SummaryFrame::Delta {
                    html: Some(chunk),
                    text: None,
                })
                .await
                {
                    tracing::debug!("Summary client disconnected, stopping model stream");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Summary stream failed");
                let message = e.to_string();
                send(SummaryFrame::Error {
                    message: if message.is_empty() {
                        STREAM_FAILED_MESSAGE.into()
                    } else {
                        message
                    },
                })
                .await;
                return;
            }
        }
    }

    let summary = summary.trim().to_string();
    let last = if summary.is_empty() {
        SummaryFrame::Error {
            message: EMPTY_SUMMARY_MESSAGE.into(),
        }
    } else {
        tracing::info!(chars = summary.len(), model = model.model_name(), "Summary streamed");
        SummaryFrame::Complete {
            html: Some(summary),
            text: None,
        }
    };
    send(last).await;
}

/// `POST /api/generate-summary/stream`
pub async fn stream(
    State(ctx): State<ApiContext>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let payload = parse_payload(payload)?;
    let prompt = prompt_for(&payload)?;
    let model = Arc::clone(ctx.model()?);

    let (tx, rx) = mpsc::channel::<SummaryFrame>(32);
    tokio::spawn(pump(model, prompt, tx));

    let events = ReceiverStream::new(rx).map(|frame| Ok(frame_event(&frame)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// `POST /api/generate-summary`
pub async fn generate(
    State(ctx): State<ApiContext>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let model = Arc::clone(ctx.model()?);
    let payload = parse_payload(payload)?;
    let prompt = prompt_for(&payload)?;

    let summary = model.generate(&prompt, GENERATE_MAX_TOKENS).await?;
    let summary = summary.trim().to_string();
    if summary.is_empty() {
        return Err(ApiError::Upstream(EMPTY_SUMMARY_MESSAGE.into()));
    }
    Ok(Json(SummaryResponse { summary }))
}
