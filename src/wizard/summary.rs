//! AI summary streamer.
//!
//! `generate(force)` asks the backend for a clinical summary of the current
//! answers and writes the result into `WizardState::ai_summary`.
//!
//! - Consent is checked first; without it the backend is never contacted.
//! - A summary already generated for an identical answer set is reused
//!   unless `force` is set.
//! - At most one request writes at a time. A new request cancels the one in
//!   flight and waits for it to finish tearing down before it starts.
//! - Cancellation is checked at every chunk. A cancelled request writes
//!   nothing.
//! - Failures land in `error_message` and never touch the submission path.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::autosave::AutosaveController;
use super::frames::{FrameDecoder, SummaryFrame};
use super::persistence::snapshot_point;
use super::state::{lock_state, SharedState, StateLockError, WizardState};
use crate::client::{BackendError, ByteStream, IntakeBackend};
use crate::models::form::names;

pub const CONSENT_REQUIRED_MESSAGE: &str =
    "Please confirm your consent before generating an AI summary.";
pub const EMPTY_SUMMARY_MESSAGE: &str = "AI summary was empty.";
const STREAM_FAILED_MESSAGE: &str = "An unexpected error occurred while streaming the AI summary.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummaryError {
    #[error("{}", CONSENT_REQUIRED_MESSAGE)]
    ConsentRequired,

    /// Network, HTTP, or stream failure. Carries the user-facing message.
    #[error("{0}")]
    Backend(String),

    #[error("{}", EMPTY_SUMMARY_MESSAGE)]
    Empty,

    #[error("AI summary timed out waiting for data")]
    TimedOut,

    #[error(transparent)]
    Lock(#[from] StateLockError),
}

impl From<BackendError> for SummaryError {
    fn from(e: BackendError) -> Self {
        SummaryError::Backend(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Existing summary reused, no network call.
    Cached(String),
    Generated(String),
    /// Superseded or cancelled; nothing was written.
    Cancelled,
}

/// What the UI shows while a request runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SummaryProgress {
    Idle,
    Connecting,
    Status { message: String },
    /// Text accumulated so far, re-rendered on each delta.
    Partial { content: String },
    Complete,
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLimits {
    /// Longest wait for the next chunk before giving up.
    pub idle_timeout: Duration,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(120),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Payload and fingerprint
// ═══════════════════════════════════════════════════════════

/// Summary-relevant answers only: form fields, selected areas, pain points.
/// The summary itself, its error, the step, and the save time are excluded.
pub fn summary_payload(state: &WizardState) -> serde_json::Value {
    let mut payload = match serde_json::to_value(&state.fields) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    payload.insert(
        "selectedAreas".into(),
        serde_json::json!(state.pain_points.selected_areas()),
    );
    let points: Vec<_> = state.pain_points.iter().map(snapshot_point).collect();
    payload.insert(
        "painPoints".into(),
        serde_json::to_value(points).unwrap_or_default(),
    );
    serde_json::Value::Object(payload)
}

/// SHA-256 hex of the payload's canonical JSON (object keys are sorted).
pub fn fingerprint(payload: &serde_json::Value) -> String {
    let canonical = payload.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ═══════════════════════════════════════════════════════════
// Streamer
// ═══════════════════════════════════════════════════════════

enum StreamEnd {
    Completed(String),
    Cancelled,
}

pub struct SummaryStreamer {
    state: SharedState,
    backend: Arc<dyn IntakeBackend>,
    autosave: Option<AutosaveController>,
    limits: SummaryLimits,
    /// Token of the newest request, with its sequence number.
    current: Mutex<Option<(u64, CancellationToken)>>,
    next_seq: Mutex<u64>,
    /// Held for the whole life of a request: the single-writer lock.
    writer: tokio::sync::Mutex<()>,
    progress: watch::Sender<SummaryProgress>,
}

impl SummaryStreamer {
    pub fn new(
        state: SharedState,
        backend: Arc<dyn IntakeBackend>,
        autosave: Option<AutosaveController>,
        limits: SummaryLimits,
    ) -> Self {
        let (progress, _) = watch::channel(SummaryProgress::Idle);
        Self {
            state,
            backend,
            autosave,
            limits,
            current: Mutex::new(None),
            next_seq: Mutex::new(0),
            writer: tokio::sync::Mutex::new(()),
            progress,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SummaryProgress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> SummaryProgress {
        self.progress.borrow().clone()
    }

    /// Cancel the request in flight, if any.
    pub fn cancel(&self) -> bool {
        match self.current.lock() {
            Ok(slot) => match slot.as_ref() {
                Some((seq, token)) if !token.is_cancelled() => {
                    tracing::debug!(seq, "Cancelling AI summary request");
                    token.cancel();
                    true
                }
                _ => false,
            },
            Err(_) => false,
        }
    }

    fn schedule_autosave(&self) {
        if let Some(autosave) = &self.autosave {
            autosave.schedule();
        }
    }

    /// Replace the current token with a fresh one, cancelling the old one.
    fn begin(&self) -> (u64, CancellationToken) {
        let seq = match self.next_seq.lock() {
            Ok(mut next) => {
                *next += 1;
                *next
            }
            Err(_) => 0,
        };
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.current.lock() {
            if let Some((old_seq, old)) = slot.replace((seq, token.clone())) {
                tracing::debug!(old_seq, seq, "Superseding AI summary request");
                old.cancel();
            }
        }
        (seq, token)
    }

    fn finish(&self, seq: u64) {
        if let Ok(mut slot) = self.current.lock() {
            if slot.as_ref().is_some_and(|(s, _)| *s == seq) {
                *slot = None;
            }
        }
    }

    pub async fn generate(&self, force: bool) -> Result<SummaryOutcome, SummaryError> {
        let (payload, fp) = {
            let mut state = lock_state(&self.state)?;
            if !state.fields.is_filled(names::CONSENT) {
                state.ai_summary.error_message = CONSENT_REQUIRED_MESSAGE.to_string();
                state.ai_summary.payload_fingerprint.clear();
                drop(state);
                self.progress.send_replace(SummaryProgress::Failed {
                    message: CONSENT_REQUIRED_MESSAGE.to_string(),
                });
                self.schedule_autosave();
                return Err(SummaryError::ConsentRequired);
            }
            let payload = summary_payload(&state);
            let fp = fingerprint(&payload);
            if !force && state.ai_summary.is_cached_for(&fp) {
                tracing::debug!("AI summary unchanged, reusing cached content");
                return Ok(SummaryOutcome::Cached(state.ai_summary.content.clone()));
            }
            (payload, fp)
        };

        let (seq, token) = self.begin();
        let _writer = self.writer.lock().await;
        if token.is_cancelled() {
            self.finish(seq);
            return Ok(SummaryOutcome::Cancelled);
        }

        self.mark_in_flight(seq)?;
        self.progress.send_replace(SummaryProgress::Connecting);
        tracing::info!(seq, force, "AI summary request started");

        let result = self.run(&payload, &token).await;
        let outcome = self.apply(result, &fp, &token);
        self.finish(seq);
        outcome
    }

    /// Flag the request in state, releasing its slot if that fails.
    fn mark_in_flight(&self, seq: u64) -> Result<(), SummaryError> {
        match lock_state(&self.state) {
            Ok(mut state) => {
                state.ai_summary.in_flight = true;
                Ok(())
            }
            Err(e) => {
                self.finish(seq);
                Err(e.into())
            }
        }
    }

    /// Write the request's result into state. Runs under the writer lock.
    fn apply(
        &self,
        result: Result<StreamEnd, SummaryError>,
        fp: &str,
        token: &CancellationToken,
    ) -> Result<SummaryOutcome, SummaryError> {
        let mut state = lock_state(&self.state)?;
        state.ai_summary.in_flight = false;

        // A request cancelled after its last chunk still writes nothing.
        let result = if token.is_cancelled() {
            Ok(StreamEnd::Cancelled)
        } else {
            result
        };

        match result {
            Ok(StreamEnd::Completed(content)) => {
                state.ai_summary.content = content.clone();
                state.ai_summary.error_message.clear();
                state.ai_summary.payload_fingerprint = fp.to_string();
                drop(state);
                tracing::info!(chars = content.len(), "AI summary complete");
                self.progress.send_replace(SummaryProgress::Complete);
                self.schedule_autosave();
                Ok(SummaryOutcome::Generated(content))
            }
            Ok(StreamEnd::Cancelled) => {
                drop(state);
                tracing::debug!("AI summary request cancelled");
                self.progress.send_replace(SummaryProgress::Idle);
                Ok(SummaryOutcome::Cancelled)
            }
            Err(e) => {
                state.ai_summary.content.clear();
                state.ai_summary.payload_fingerprint.clear();
                state.ai_summary.error_message = e.to_string();
                drop(state);
                tracing::warn!(error = %e, "AI summary failed");
                self.progress.send_replace(SummaryProgress::Failed {
                    message: e.to_string(),
                });
                self.schedule_autosave();
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        payload: &serde_json::Value,
        token: &CancellationToken,
    ) -> Result<StreamEnd, SummaryError> {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
            opened = tokio::time::timeout(self.limits.idle_timeout, self.backend.stream_summary(payload)) => opened,
        };
        let Ok(opened) = opened else {
            return Err(SummaryError::TimedOut);
        };

        match opened {
            Ok(stream) => self.consume(stream, token).await,
            Err(BackendError::StreamingUnavailable(status)) => {
                tracing::info!(status, "Streaming endpoint unavailable, using fallback");
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Ok(StreamEnd::Cancelled),
                    summary = tokio::time::timeout(self.limits.idle_timeout, self.backend.generate_summary(payload)) => {
                        let summary = summary.map_err(|_| SummaryError::TimedOut)??;
                        if summary.trim().is_empty() {
                            Err(SummaryError::Empty)
                        } else {
                            Ok(StreamEnd::Completed(summary))
                        }
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn consume(
        &self,
        mut stream: ByteStream,
        token: &CancellationToken,
    ) -> Result<StreamEnd, SummaryError> {
        let mut decoder = FrameDecoder::new();
        let mut content = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
                next = tokio::time::timeout(self.limits.idle_timeout, stream.next()) => next,
            };
            let chunk = match next {
                Err(_) => return Err(SummaryError::TimedOut),
                Ok(None) => break,
                Ok(Some(chunk)) => chunk?,
            };

            for frame in decoder.push(&chunk) {
                if let Some(end) = self.handle_frame(frame, &mut content)? {
                    return Ok(end);
                }
            }
            if token.is_cancelled() {
                return Ok(StreamEnd::Cancelled);
            }
        }

        if let Some(frame) = decoder.finish() {
            if let Some(end) = self.handle_frame(frame, &mut content)? {
                return Ok(end);
            }
        }

        // Stream ended without `complete`.
        if content.trim().is_empty() {
            Err(SummaryError::Empty)
        } else {
            Ok(StreamEnd::Completed(content))
        }
    }

    /// Apply one frame. `Some` ends the stream.
    fn handle_frame(
        &self,
        frame: SummaryFrame,
        content: &mut String,
    ) -> Result<Option<StreamEnd>, SummaryError> {
        match frame {
            SummaryFrame::Status { message } => {
                self.progress.send_replace(SummaryProgress::Status { message });
                Ok(None)
            }
            SummaryFrame::Delta { .. } => {
                if let Some(chunk) = frame.content() {
                    content.push_str(chunk);
                    self.progress.send_replace(SummaryProgress::Partial {
                        content: content.clone(),
                    });
                }
                Ok(None)
            }
            SummaryFrame::Complete { .. } => {
                if let Some(full) = frame.content().filter(|c| !c.trim().is_empty()) {
                    *content = full.to_string();
                }
                if content.trim().is_empty() {
                    Err(SummaryError::Empty)
                } else {
                    Ok(Some(StreamEnd::Completed(std::mem::take(content))))
                }
            }
            SummaryFrame::Error { message } => {
                let message = if message.trim().is_empty() {
                    STREAM_FAILED_MESSAGE.to_string()
                } else {
                    message
                };
                Err(SummaryError::Backend(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::scripted::{ScriptStep, ScriptedBackend, StreamScript};
    use crate::wizard::state::shared;

    fn consented_state() -> SharedState {
        let mut state = WizardState::new();
        state.fields.set_text(names::FULL_NAME, "Jane Doe");
        state.fields.set_text(names::PAIN_DURATION, "1-3 months");
        state.fields.set_text(names::CONSENT, "on");
        shared(state)
    }

    fn streamer(state: &SharedState, backend: &Arc<ScriptedBackend>) -> Arc<SummaryStreamer> {
        Arc::new(SummaryStreamer::new(
            state.clone(),
            backend.clone(),
            None,
            SummaryLimits::default(),
        ))
    }

    fn happy_script(text: &str) -> StreamScript {
        StreamScript::Steps(vec![
            ScriptStep::frame(r#"{"event":"status","message":"Connecting to AI..."}"#),
            ScriptStep::frame(&format!(r#"{{"event":"delta","html":"{text}"}}"#)),
            ScriptStep::frame(r#"{"event":"complete"}"#),
        ])
    }

    #[tokio::test]
    async fn consent_required_without_network_call() {
        let state = shared(WizardState::new());
        let backend = Arc::new(ScriptedBackend::new());
        let streamer = streamer(&state, &backend);

        let err = streamer.generate(true).await.unwrap_err();
        assert_eq!(err, SummaryError::ConsentRequired);
        assert_eq!(backend.stream_calls(), 0);
        assert_eq!(
            lock_state(&state).unwrap().ai_summary.error_message,
            CONSENT_REQUIRED_MESSAGE
        );
    }

    #[tokio::test]
    async fn streams_deltas_into_summary() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Steps(vec![
            ScriptStep::Chunk(b"data: {\"event\":\"delta\",\"html\":\"<p>Pat".to_vec()),
            ScriptStep::Chunk(b"ient\"}\n\ndata: {\"event\":\"delta\",\"html\":\" ok</p>\"}\n".to_vec()),
            ScriptStep::frame(r#"{"event":"complete"}"#),
        ]));
        let streamer = streamer(&state, &backend);

        let outcome = streamer.generate(false).await.unwrap();
        assert_eq!(outcome, SummaryOutcome::Generated("<p>Patient ok</p>".into()));
        let summary = lock_state(&state).unwrap().ai_summary.clone();
        assert_eq!(summary.content, "<p>Patient ok</p>");
        assert!(summary.error_message.is_empty());
        assert!(!summary.in_flight);
        assert_eq!(summary.payload_fingerprint.len(), 64);
        assert_eq!(streamer.progress(), SummaryProgress::Complete);

        let sent = backend.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(sent["fullName"], "Jane Doe");
        assert!(sent.get("aiSummary").is_none());
        assert!(sent.get("currentStep").is_none());
    }

    #[tokio::test]
    async fn complete_content_replaces_accumulation() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Steps(vec![
            ScriptStep::frame(r#"{"event":"delta","html":"partial"}"#),
            ScriptStep::frame(r#"{"event":"complete","html":"<p>final</p>"}"#),
        ]));
        let streamer = streamer(&state, &backend);
        assert_eq!(
            streamer.generate(false).await.unwrap(),
            SummaryOutcome::Generated("<p>final</p>".into())
        );
    }

    #[tokio::test]
    async fn unchanged_answers_reuse_cached_summary() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(happy_script("first"));
        let streamer = streamer(&state, &backend);

        streamer.generate(false).await.unwrap();
        let again = streamer.generate(false).await.unwrap();
        assert_eq!(again, SummaryOutcome::Cached("first".into()));
        assert_eq!(backend.stream_calls(), 1);
        assert_eq!(backend.generate_calls(), 0);
    }

    #[tokio::test]
    async fn changed_answers_or_force_regenerate() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(happy_script("first"));
        backend.push_stream(happy_script("second"));
        backend.push_stream(happy_script("third"));
        let streamer = streamer(&state, &backend);

        streamer.generate(false).await.unwrap();
        lock_state(&state)
            .unwrap()
            .fields
            .set_values(names::GOALS, ["Return to sports"]);
        assert_eq!(
            streamer.generate(false).await.unwrap(),
            SummaryOutcome::Generated("second".into())
        );
        assert_eq!(
            streamer.generate(true).await.unwrap(),
            SummaryOutcome::Generated("third".into())
        );
        assert_eq!(backend.stream_calls(), 3);
    }

    #[tokio::test]
    async fn step_and_summary_do_not_change_fingerprint() {
        let state = consented_state();
        let before = fingerprint(&summary_payload(&*lock_state(&state).unwrap()));
        {
            let mut s = lock_state(&state).unwrap();
            s.current_step = 4;
            s.ai_summary.content = "x".into();
            s.ai_summary.error_message = "y".into();
            s.saved_at = Some(chrono::Utc::now());
        }
        let after = fingerprint(&summary_payload(&*lock_state(&state).unwrap()));
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn newer_request_cancels_older_one() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Steps(vec![
            ScriptStep::frame(r#"{"event":"delta","html":"stale"}"#),
            ScriptStep::Hang,
        ]));
        backend.push_stream(happy_script("fresh"));
        let streamer = streamer(&state, &backend);

        let first = {
            let streamer = streamer.clone();
            tokio::spawn(async move { streamer.generate(false).await })
        };
        // Let the first request reach its hanging stream.
        while !matches!(streamer.progress(), SummaryProgress::Partial { .. }) {
            tokio::task::yield_now().await;
        }
        assert!(lock_state(&state).unwrap().ai_summary.in_flight);

        let second = streamer.generate(true).await.unwrap();
        assert_eq!(second, SummaryOutcome::Generated("fresh".into()));
        assert_eq!(first.await.unwrap().unwrap(), SummaryOutcome::Cancelled);

        let summary = lock_state(&state).unwrap().ai_summary.clone();
        assert_eq!(summary.content, "fresh");
        assert!(!summary.in_flight);
    }

    #[tokio::test]
    async fn explicit_cancel_writes_nothing() {
        let state = consented_state();
        lock_state(&state).unwrap().ai_summary.content = "previous".into();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Steps(vec![
            ScriptStep::frame(r#"{"event":"delta","html":"new"}"#),
            ScriptStep::Hang,
        ]));
        let streamer = streamer(&state, &backend);

        let task = {
            let streamer = streamer.clone();
            tokio::spawn(async move { streamer.generate(true).await })
        };
        while !matches!(streamer.progress(), SummaryProgress::Partial { .. }) {
            tokio::task::yield_now().await;
        }
        assert!(streamer.cancel());
        assert_eq!(task.await.unwrap().unwrap(), SummaryOutcome::Cancelled);
        assert_eq!(lock_state(&state).unwrap().ai_summary.content, "previous");
        assert!(!streamer.cancel());
    }

    #[tokio::test]
    async fn error_frame_sets_message_and_clears_content() {
        let state = consented_state();
        lock_state(&state).unwrap().ai_summary.content = "old".into();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Steps(vec![
            ScriptStep::frame(r#"{"event":"delta","html":"half"}"#),
            ScriptStep::frame(r#"{"event":"error","message":"Model overloaded"}"#),
        ]));
        let streamer = streamer(&state, &backend);

        let err = streamer.generate(true).await.unwrap_err();
        assert_eq!(err, SummaryError::Backend("Model overloaded".into()));
        let summary = lock_state(&state).unwrap().ai_summary.clone();
        assert!(summary.content.is_empty());
        assert!(summary.payload_fingerprint.is_empty());
        assert_eq!(summary.error_message, "Model overloaded");
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Steps(vec![
            ScriptStep::Chunk(b"data: {garbage\n".to_vec()),
            ScriptStep::frame(r#"{"event":"delta","html":"ok"}"#),
        ]));
        let streamer = streamer(&state, &backend);
        // Ends without `complete` but with text: success.
        assert_eq!(
            streamer.generate(true).await.unwrap(),
            SummaryOutcome::Generated("ok".into())
        );
    }

    #[tokio::test]
    async fn successful_stream_with_no_text_is_empty_error() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Steps(vec![
            ScriptStep::frame(r#"{"event":"status","message":"Connecting to AI..."}"#),
            ScriptStep::frame(r#"{"event":"complete"}"#),
        ]));
        let streamer = streamer(&state, &backend);
        assert_eq!(streamer.generate(true).await.unwrap_err(), SummaryError::Empty);
        assert_eq!(
            lock_state(&state).unwrap().ai_summary.error_message,
            EMPTY_SUMMARY_MESSAGE
        );
    }

    #[tokio::test]
    async fn mid_stream_network_failure_is_reported() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Steps(vec![
            ScriptStep::frame(r#"{"event":"delta","html":"a"}"#),
            ScriptStep::Fail("connection reset".into()),
        ]));
        let streamer = streamer(&state, &backend);
        let err = streamer.generate(true).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn falls_back_to_plain_endpoint() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Unavailable(404));
        backend.push_summary(Ok("<p>fallback</p>".into()));
        let streamer = streamer(&state, &backend);

        assert_eq!(
            streamer.generate(false).await.unwrap(),
            SummaryOutcome::Generated("<p>fallback</p>".into())
        );
        assert_eq!(backend.generate_calls(), 1);

        // Cached afterwards, exactly like the streamed path.
        assert!(matches!(
            streamer.generate(false).await.unwrap(),
            SummaryOutcome::Cached(_)
        ));
        assert_eq!(backend.stream_calls(), 1);
    }

    #[tokio::test]
    async fn rejected_stream_surfaces_backend_message() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Rejected(
            503,
            "AI summary service is not configured.".into(),
        ));
        let streamer = streamer(&state, &backend);
        let err = streamer.generate(true).await.unwrap_err();
        assert_eq!(err.to_string(), "AI summary service is not configured.");
        assert_eq!(backend.generate_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_times_out() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::Steps(vec![ScriptStep::Hang]));
        let streamer = Arc::new(SummaryStreamer::new(
            state.clone(),
            backend.clone(),
            None,
            SummaryLimits {
                idle_timeout: Duration::from_secs(5),
            },
        ));
        assert_eq!(streamer.generate(true).await.unwrap_err(), SummaryError::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_stream_open_times_out() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(StreamScript::NoResponse);
        let streamer = Arc::new(SummaryStreamer::new(
            state.clone(),
            backend.clone(),
            None,
            SummaryLimits {
                idle_timeout: Duration::from_secs(5),
            },
        ));

        let result = tokio::time::timeout(Duration::from_secs(3600), streamer.generate(true))
            .await
            .expect("generate gives up on its own");
        assert_eq!(result.unwrap_err(), SummaryError::TimedOut);
        assert!(!lock_state(&state).unwrap().ai_summary.in_flight);
        assert!(!streamer.cancel());
    }

    #[test]
    fn poisoned_state_releases_request_slot() {
        let state = consented_state();
        let backend = Arc::new(ScriptedBackend::new());
        let streamer = streamer(&state, &backend);
        let (seq, _token) = streamer.begin();

        let poisoner = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the wizard state");
        })
        .join();

        assert!(matches!(streamer.mark_in_flight(seq), Err(SummaryError::Lock(_))));
        assert!(!streamer.cancel());
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let payload = serde_json::json!({"b": 1, "a": [1, 2]});
        let fp = fingerprint(&payload);
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, fingerprint(&serde_json::json!({"a": [1, 2], "b": 1})));
    }
}
