//! Autosave controller.
//!
//! Every mutation calls [`AutosaveController::schedule`], which restarts a
//! trailing-edge debounce timer: a burst of edits produces one write. A
//! fallback interval saves regardless of activity. While a
//! [`SuppressionGuard`] is alive (draft restore, unresolved draft offer)
//! nothing is written. Storage failures are reported through the status
//! channel and never stop the controller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::persistence::{Persistence, StorageError};
use super::state::{lock_state, SharedState};
use crate::config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    /// A debounced write is pending.
    Saving,
    Saved(DateTime<Utc>),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub debounce: Duration,
    pub fallback_interval: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: config::autosave_debounce(),
            fallback_interval: config::autosave_fallback_interval(),
        }
    }
}

struct Inner {
    state: SharedState,
    persistence: Persistence,
    config: AutosaveConfig,
    status: watch::Sender<SaveStatus>,
    suppress_depth: AtomicUsize,
    debounce_task: Mutex<Option<JoinHandle<()>>>,
    fallback_task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn is_suppressed(&self) -> bool {
        self.suppress_depth.load(Ordering::SeqCst) > 0
    }

    fn take_debounce(&self) -> Option<JoinHandle<()>> {
        self.debounce_task.lock().ok().and_then(|mut slot| slot.take())
    }

    fn cancel_debounce(&self) {
        if let Some(handle) = self.take_debounce() {
            handle.abort();
            self.status.send_if_modified(|status| {
                if *status == SaveStatus::Saving {
                    *status = SaveStatus::Idle;
                    true
                } else {
                    false
                }
            });
        }
    }

    /// One whole-snapshot write. `Ok(None)` when skipped.
    fn save_now(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        if self.is_suppressed() {
            tracing::debug!("Autosave suppressed");
            return Ok(None);
        }

        let mut state = lock_state(&self.state)?;
        // Suppression may have started while this tick waited for the lock.
        if self.is_suppressed() {
            tracing::debug!("Autosave suppressed");
            return Ok(None);
        }
        if state.is_pristine() {
            self.status.send_if_modified(|status| {
                let changed = *status == SaveStatus::Saving;
                if changed {
                    *status = SaveStatus::Idle;
                }
                changed
            });
            return Ok(None);
        }

        match self.persistence.save(&state) {
            Ok(saved_at) => {
                state.saved_at = Some(saved_at);
                drop(state);
                tracing::debug!(saved_at = %saved_at, "Draft saved");
                self.status.send_replace(SaveStatus::Saved(saved_at));
                Ok(Some(saved_at))
            }
            Err(e) => {
                drop(state);
                tracing::warn!(error = %e, "Draft save failed");
                self.status.send_replace(SaveStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for slot in [&self.debounce_task, &self.fallback_task] {
            if let Ok(mut slot) = slot.lock() {
                if let Some(handle) = slot.take() {
                    handle.abort();
                }
            }
        }
    }
}

/// Cheap to clone; clones share the same timers and status.
#[derive(Clone)]
pub struct AutosaveController {
    inner: Arc<Inner>,
}

impl AutosaveController {
    pub fn new(state: SharedState, persistence: Persistence, config: AutosaveConfig) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(Inner {
                state,
                persistence,
                config,
                status,
                suppress_depth: AtomicUsize::new(0),
                debounce_task: Mutex::new(None),
                fallback_task: Mutex::new(None),
            }),
        }
    }

    pub fn persistence(&self) -> &Persistence {
        &self.inner.persistence
    }

    pub fn status(&self) -> SaveStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Publish a status without writing (restore reports the draft's own
    /// timestamp this way).
    pub fn set_status(&self, status: SaveStatus) {
        self.inner.status.send_replace(status);
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.is_suppressed()
    }

    /// Restart the debounce timer. Outside a Tokio runtime the write happens
    /// immediately instead.
    pub fn schedule(&self) {
        if self.inner.is_suppressed() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let _ = self.inner.save_now();
            return;
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let delay = self.inner.config.debounce;
        let Ok(mut slot) = self.inner.debounce_task.lock() else {
            tracing::warn!("Debounce slot lock poisoned, saving immediately");
            let _ = self.inner.save_now();
            return;
        };
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        self.inner.status.send_replace(SaveStatus::Saving);
        *slot = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut slot) = inner.debounce_task.lock() {
                    slot.take();
                }
                let _ = inner.save_now();
            }
        }));
    }

    /// Write now, dropping any pending debounce. Failures are also published
    /// on the status channel.
    pub fn flush(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        if let Some(handle) = self.inner.take_debounce() {
            handle.abort();
        }
        self.inner.save_now()
    }

    /// Drop a pending debounced write without saving.
    pub fn cancel_pending(&self) {
        self.inner.cancel_debounce();
    }

    /// Start the fallback interval. Calling it again restarts the interval.
    pub fn start_fallback(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, fallback autosave disabled");
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.fallback_interval;
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let _ = inner.save_now();
            }
        });
        if let Ok(mut slot) = self.inner.fallback_task.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }
    }

    /// Stop both timers.
    pub fn stop(&self) {
        self.inner.cancel_debounce();
        if let Ok(mut slot) = self.inner.fallback_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    /// Suppress all writes until the guard is dropped. Also cancels any
    /// pending debounced write, so stale state cannot land afterwards.
    pub fn suppress(&self) -> SuppressionGuard {
        self.inner.suppress_depth.fetch_add(1, Ordering::SeqCst);
        self.inner.cancel_debounce();
        SuppressionGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// SuppressionGuard: RAII write suppression
// ═══════════════════════════════════════════════════════════

/// Dropping the guard lifts its suppression. Guards nest.
pub struct SuppressionGuard {
    inner: Arc<Inner>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.inner.suppress_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SuppressionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressionGuard").finish_non_exhaustive()
    }
}
