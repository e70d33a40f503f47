//! Resume/restore orchestrator.
//!
//! A stored draft is never applied silently. [`detect_draft`] turns it into a
//! [`DraftOffer`] that the UI presents as "continue" or "start over". Until
//! the offer is resolved autosave stays suppressed, so the draft on disk
//! cannot be overwritten by the empty session.

use chrono::{DateTime, Utc};

use super::autosave::{AutosaveController, SaveStatus, SuppressionGuard};
use super::body_map::PainPointRegistry;
use super::navigator::{self, EntryMode, NavOutcome};
use super::persistence::{apply_snapshot, StorageError};
use super::state::{lock_state, SharedState, StateLockError};
use super::summary::{fingerprint, summary_payload};
use crate::models::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Lock(#[from] StateLockError),
}

/// A draft waiting for the user's decision.
#[derive(Debug)]
pub struct DraftOffer {
    snapshot: Snapshot,
    _guard: SuppressionGuard,
}

impl DraftOffer {
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.saved_at
    }

    /// The step the draft will reopen at.
    pub fn step(&self) -> u8 {
        self.snapshot.current_step
    }

    pub fn pain_point_count(&self) -> usize {
        self.snapshot.pain_points.len()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// Look for a stored draft. A draft that cannot be parsed is discarded.
pub fn detect_draft(autosave: &AutosaveController) -> Result<Option<DraftOffer>, StorageError> {
    // Suppress before reading so no write can slip in between.
    let guard = autosave.suppress();
    match autosave.persistence().load() {
        Ok(Some(snapshot)) => {
            tracing::info!(
                step = snapshot.current_step,
                pain_points = snapshot.pain_points.len(),
                "Found saved draft"
            );
            Ok(Some(DraftOffer {
                snapshot,
                _guard: guard,
            }))
        }
        Ok(None) => Ok(None),
        Err(StorageError::Corrupt(e)) => {
            tracing::warn!(error = %e, "Discarding unreadable draft");
            autosave.persistence().clear()?;
            Ok(None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Draft storage unavailable");
            autosave.set_status(SaveStatus::Failed(e.to_string()));
            Err(e)
        }
    }
}

/// Apply the draft and re-enter its step through the navigator. Nothing is
/// written while this runs.
pub fn resume(
    offer: DraftOffer,
    state: &SharedState,
    registry: &mut PainPointRegistry,
    autosave: &AutosaveController,
) -> Result<NavOutcome, RestoreError> {
    let DraftOffer { snapshot, _guard } = offer;

    registry.reset();
    let outcome = {
        let mut state = lock_state(state)?;
        state.reset();
        let step = apply_snapshot(&mut state, &snapshot);

        // The fingerprint is not persisted. A restored summary stays cached
        // for the answers it was restored with.
        if !state.ai_summary.content.trim().is_empty() && state.ai_summary.error_message.is_empty() {
            let fp = fingerprint(&summary_payload(&state));
            state.ai_summary.payload_fingerprint = fp;
        }
        navigator::enter(&mut state, step, EntryMode::Rehydrating)
    };

    if let Some(saved_at) = snapshot.saved_at {
        autosave.set_status(SaveStatus::Saved(saved_at));
    }
    tracing::info!(step = snapshot.current_step, "Draft restored");
    Ok(outcome)
}

/// Drop the draft and return every component to its initial state.
pub fn start_over(
    offer: Option<DraftOffer>,
    state: &SharedState,
    registry: &mut PainPointRegistry,
    autosave: &AutosaveController,
) -> Result<(), RestoreError> {
    // Hold suppression across the clear so a pending write cannot recreate it.
    let _guard = match offer {
        Some(offer) => offer._guard,
        None => autosave.suppress(),
    };
    autosave.persistence().clear()?;
    registry.reset();
    lock_state(state)?.reset();
    autosave.set_status(SaveStatus::Idle);
    tracing::info!("Started over with a fresh session");
    Ok(())
}
