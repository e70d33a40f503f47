//! `IntakeSession`: one patient's wizard, wiring UI events to the pure
//! components and carrying out the side effects they ask for.
//!
//! Every mutating call is a discrete event: it updates [`WizardState`],
//! schedules an autosave, and returns what the UI needs to render next.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::autosave::{AutosaveConfig, AutosaveController, SaveStatus};
use super::body_map::{BodyMapError, ClickOutcome, Marker, PainPointRegistry, RenderedBox};
use super::navigator::{self, NavEffect, NavError, NavOutcome};
use super::persistence::{to_snapshot, DraftStore, Persistence, StorageError};
use super::restore::{self, DraftOffer, RestoreError};
use super::review::{build_review, red_flag_alert, RedFlagAlert, ReviewSummary};
use super::state::{lock_state, shared, SharedState, StateLockError, WizardState};
use super::steps::{validate_all, ValidationReport};
use super::summary::{SummaryError, SummaryLimits, SummaryOutcome, SummaryProgress, SummaryStreamer};
use crate::client::{IntakeBackend, SubmitReceipt};
use crate::models::{BodyView, PainPoint};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Some answers need attention")]
    Validation(ValidationReport),

    #[error(transparent)]
    Navigation(#[from] NavError),

    #[error(transparent)]
    BodyMap(#[from] BodyMapError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    #[error("{0}")]
    Submission(String),

    #[error("No saved draft is waiting")]
    NoDraft,

    #[error("Session state lock poisoned")]
    LockPoisoned,
}

impl From<StateLockError> for SessionError {
    fn from(_: StateLockError) -> Self {
        SessionError::LockPoisoned
    }
}

/// What the "continue or start over" banner shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftNotice {
    pub saved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub step: u8,
    pub pain_points: usize,
}

pub struct IntakeSession {
    state: SharedState,
    registry: Mutex<PainPointRegistry>,
    autosave: AutosaveController,
    streamer: Arc<SummaryStreamer>,
    backend: Arc<dyn IntakeBackend>,
    offer: Mutex<Option<DraftOffer>>,
    review: Mutex<Option<ReviewSummary>>,
    summary_task: Mutex<Option<JoinHandle<()>>>,
}

impl IntakeSession {
    pub fn new(backend: Arc<dyn IntakeBackend>, store: Arc<dyn DraftStore>) -> Self {
        Self::with_options(
            backend,
            Persistence::new(store),
            PainPointRegistry::default(),
            AutosaveConfig::default(),
            SummaryLimits::default(),
        )
    }

    pub fn with_options(
        backend: Arc<dyn IntakeBackend>,
        persistence: Persistence,
        registry: PainPointRegistry,
        autosave_config: AutosaveConfig,
        limits: SummaryLimits,
    ) -> Self {
        let state = shared(WizardState::new());
        let autosave = AutosaveController::new(state.clone(), persistence, autosave_config);
        let streamer = Arc::new(SummaryStreamer::new(
            state.clone(),
            backend.clone(),
            Some(autosave.clone()),
            limits,
        ));
        Self {
            state,
            registry: Mutex::new(registry),
            autosave,
            streamer,
            backend,
            offer: Mutex::new(None),
            review: Mutex::new(None),
            summary_task: Mutex::new(None),
        }
    }

    fn registry(&self) -> Result<MutexGuard<'_, PainPointRegistry>, SessionError> {
        self.registry.lock().map_err(|_| SessionError::LockPoisoned)
    }

    fn offer_slot(&self) -> Result<MutexGuard<'_, Option<DraftOffer>>, SessionError> {
        self.offer.lock().map_err(|_| SessionError::LockPoisoned)
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Check for a stored draft and start the fallback timer. A found draft
    /// is held (and autosave suppressed) until [`resume_draft`] or
    /// [`start_over`] resolves it.
    ///
    /// [`resume_draft`]: Self::resume_draft
    /// [`start_over`]: Self::start_over
    pub fn open(&self) -> Result<Option<DraftNotice>, SessionError> {
        // Storage trouble is reported on the status channel; the session
        // still runs in memory.
        let offer = restore::detect_draft(&self.autosave).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Continuing without draft storage");
            None
        });
        let notice = offer.as_ref().map(|offer| DraftNotice {
            saved_at: offer.saved_at(),
            step: offer.step(),
            pain_points: offer.pain_point_count(),
        });
        *self.offer_slot()? = offer;
        self.autosave.start_fallback();
        Ok(notice)
    }

    pub fn has_pending_draft(&self) -> bool {
        self.offer.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// "Continue": restore the held draft.
    pub fn resume_draft(&self) -> Result<NavOutcome, SessionError> {
        let offer = self.offer_slot()?.take().ok_or(SessionError::NoDraft)?;
        let outcome = {
            let mut registry = self.registry()?;
            restore::resume(offer, &self.state, &mut registry, &self.autosave)?
        };
        self.apply_effects(outcome.effects())?;
        Ok(outcome)
    }

    /// "Start over": discard any draft and reset everything to step 1.
    pub fn start_over(&self) -> Result<(), SessionError> {
        self.cancel_summary();
        *self.review.lock().map_err(|_| SessionError::LockPoisoned)? = None;
        let offer = self.offer_slot()?.take();
        let mut registry = self.registry()?;
        restore::start_over(offer, &self.state, &mut registry, &self.autosave)?;
        Ok(())
    }

    /// Stop timers and any summary request.
    pub fn close(&self) {
        self.cancel_summary();
        self.autosave.stop();
    }

    // ── Reads ───────────────────────────────────────────────

    pub fn state(&self) -> Result<WizardState, SessionError> {
        Ok(lock_state(&self.state)?.clone())
    }

    pub fn current_step(&self) -> Result<u8, SessionError> {
        Ok(lock_state(&self.state)?.current_step)
    }

    pub fn progress_percent(&self) -> Result<u8, SessionError> {
        Ok(navigator::progress_percent(self.current_step()?))
    }

    pub fn markers(&self, view: BodyView) -> Result<Vec<Marker>, SessionError> {
        Ok(PainPointRegistry::markers(&*lock_state(&self.state)?, view))
    }

    /// The review built on the last entry to the final step.
    pub fn review(&self) -> Option<ReviewSummary> {
        self.review.lock().ok().and_then(|r| r.clone())
    }

    pub fn save_status(&self) -> watch::Receiver<SaveStatus> {
        self.autosave.subscribe()
    }

    pub fn summary_progress(&self) -> watch::Receiver<SummaryProgress> {
        self.streamer.subscribe()
    }

    // ── Field edits ─────────────────────────────────────────

    /// Set a text/select/range/date value. Returns the red-flag alert when
    /// red flags remain selected.
    pub fn set_field(&self, name: &str, value: &str) -> Result<Option<RedFlagAlert>, SessionError> {
        let alert = {
            let mut state = lock_state(&self.state)?;
            state.fields.set_text(name, value);
            red_flag_alert(&state.fields)
        };
        self.autosave.schedule();
        Ok(alert)
    }

    /// Check or uncheck one value of a checkbox group.
    pub fn toggle_field(
        &self,
        name: &str,
        value: &str,
        checked: bool,
    ) -> Result<Option<RedFlagAlert>, SessionError> {
        let alert = {
            let mut state = lock_state(&self.state)?;
            state.fields.toggle_value(name, value, checked);
            red_flag_alert(&state.fields)
        };
        self.autosave.schedule();
        Ok(alert)
    }

    // ── Body map ────────────────────────────────────────────

    pub fn click_body_map(
        &self,
        view: BodyView,
        rendered: RenderedBox,
        click_x: f64,
        click_y: f64,
    ) -> Result<ClickOutcome, SessionError> {
        let outcome = {
            let mut registry = self.registry()?;
            let mut state = lock_state(&self.state)?;
            registry.click(&mut state, view, rendered, click_x, click_y)?
        };
        if matches!(outcome, ClickOutcome::Removed(_)) {
            self.autosave.schedule();
        }
        Ok(outcome)
    }

    pub fn confirm_pain_point(&self, intensity: Option<u8>) -> Result<PainPoint, SessionError> {
        let point = {
            let mut registry = self.registry()?;
            let mut state = lock_state(&self.state)?;
            registry.confirm_pending(&mut state, intensity)?
        };
        self.autosave.schedule();
        Ok(point)
    }

    pub fn cancel_pain_point(&self) -> Result<bool, SessionError> {
        Ok(self.registry()?.cancel_pending())
    }

    pub fn remove_pain_point(&self, key: &str) -> Result<Option<PainPoint>, SessionError> {
        let removed = {
            let mut registry = self.registry()?;
            let mut state = lock_state(&self.state)?;
            registry.remove(&mut state, key)
        };
        if removed.is_some() {
            self.autosave.schedule();
        }
        Ok(removed)
    }

    // ── Navigation ──────────────────────────────────────────

    pub fn next(&self) -> Result<NavOutcome, SessionError> {
        let outcome = navigator::advance(&mut *lock_state(&self.state)?);
        self.after_navigation(outcome)
    }

    pub fn back(&self) -> Result<NavOutcome, SessionError> {
        let outcome = navigator::retreat(&mut *lock_state(&self.state)?);
        self.after_navigation(outcome)
    }

    pub fn jump_to(&self, step: u8) -> Result<NavOutcome, SessionError> {
        let outcome = navigator::jump_to(&mut *lock_state(&self.state)?, step)?;
        self.after_navigation(outcome)
    }

    fn after_navigation(&self, outcome: NavOutcome) -> Result<NavOutcome, SessionError> {
        if outcome.moved() {
            self.apply_effects(outcome.effects())?;
            self.autosave.schedule();
        }
        Ok(outcome)
    }

    fn apply_effects(&self, effects: &[NavEffect]) -> Result<(), SessionError> {
        for effect in effects {
            match effect {
                NavEffect::RenderReview => {
                    let review = build_review(&*lock_state(&self.state)?);
                    *self.review.lock().map_err(|_| SessionError::LockPoisoned)? = Some(review);
                }
                NavEffect::StartSummary => self.spawn_summary(false),
                NavEffect::CancelSummary => self.cancel_summary(),
            }
        }
        Ok(())
    }

    // ── AI summary ──────────────────────────────────────────

    fn spawn_summary(&self, force: bool) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime, summary not started");
            return;
        };
        let streamer = Arc::clone(&self.streamer);
        let task = runtime.spawn(async move {
            // Outcome and errors land in state and the progress channel.
            let _ = streamer.generate(force).await;
        });
        if let Ok(mut slot) = self.summary_task.lock() {
            slot.replace(task);
        }
    }

    /// Generate (or regenerate with `force`) and wait for the result.
    pub async fn generate_summary(&self, force: bool) -> Result<SummaryOutcome, SummaryError> {
        self.streamer.generate(force).await
    }

    /// Cancel the request in flight and drop a spawned one that has not
    /// started yet.
    pub fn cancel_summary(&self) {
        self.streamer.cancel();
        let task = self.summary_task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            if !task.is_finished() {
                task.abort();
                if let Ok(mut state) = lock_state(&self.state) {
                    state.ai_summary.in_flight = false;
                }
            }
        }
    }

    /// Wait for a summary started by entering the review step.
    pub async fn wait_for_summary(&self) {
        let task = self.summary_task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    // ── Submission ──────────────────────────────────────────

    /// Validate every step, save, and post the answers. On success the draft
    /// is deleted and the session starts fresh. On failure the draft stays.
    pub async fn submit(&self) -> Result<SubmitReceipt, SessionError> {
        let payload = {
            let state = lock_state(&self.state)?;
            let report = validate_all(&state.fields);
            if !report.is_valid() {
                tracing::info!(issues = report.issues.len(), "Submission refused by validation");
                return Err(SessionError::Validation(report));
            }
            let snapshot = to_snapshot(&state, chrono::Utc::now());
            serde_json::to_value(&snapshot).map_err(StorageError::from)?
        };

        // A failed save must not block submission; the status shows it.
        if let Err(e) = self.autosave.flush() {
            tracing::warn!(error = %e, "Pre-submit save failed");
        }

        match self.backend.submit_intake(&payload).await {
            Ok(receipt) => {
                tracing::info!(id = %receipt.id, "Assessment submitted");
                // Reset before deleting: any write racing the clear then sees
                // pristine state and is skipped.
                let _guard = self.autosave.suppress();
                self.cancel_summary();
                self.registry()?.reset();
                lock_state(&self.state)?.reset();
                if let Err(e) = self.autosave.persistence().clear() {
                    tracing::warn!(error = %e, "Could not delete submitted draft");
                }
                *self.review.lock().map_err(|_| SessionError::LockPoisoned)? = None;
                self.autosave.set_status(SaveStatus::Idle);
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Submission failed, draft kept");
                Err(SessionError::Submission(e.to_string()))
            }
        }
    }
}

impl Drop for IntakeSession {
    fn drop(&mut self) {
        self.close();
    }
}
