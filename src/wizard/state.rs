//! The single owned wizard state.
//!
//! Every component (navigator, body map, autosave, summary streamer,
//! restore) mutates the same [`WizardState`] through a [`SharedState`]
//! handle. The lock is only ever held for short, synchronous sections and
//! never across an `.await`.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::config::TOTAL_STEPS;
use crate::models::{FormFields, PainPoint};

/// Lock poisoning is surfaced as an ordinary error, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Wizard state lock poisoned")]
pub struct StateLockError;

pub type SharedState = Arc<Mutex<WizardState>>;

pub fn shared(state: WizardState) -> SharedState {
    Arc::new(Mutex::new(state))
}

pub fn lock_state(state: &SharedState) -> Result<MutexGuard<'_, WizardState>, StateLockError> {
    state.lock().map_err(|_| StateLockError)
}

// ═══════════════════════════════════════════════════════════
// Pain points
// ═══════════════════════════════════════════════════════════

/// Pain points keyed by `PainPoint::key`, kept in insertion order for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PainPoints(Vec<PainPoint>);

impl PainPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|p| p.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&PainPoint> {
        self.0.iter().find(|p| p.key == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PainPoint> {
        self.0.iter_mut().find(|p| p.key == key)
    }

    /// Insert or replace by key. A replaced point keeps its display slot.
    pub fn insert(&mut self, point: PainPoint) {
        match self.0.iter_mut().find(|p| p.key == point.key) {
            Some(existing) => *existing = point,
            None => self.0.push(point),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<PainPoint> {
        let idx = self.0.iter().position(|p| p.key == key)?;
        Some(self.0.remove(idx))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &PainPoint> {
        self.0.iter()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|p| p.key.clone()).collect()
    }

    /// Derived "selected areas" list: display names in insertion order.
    pub fn selected_areas(&self) -> Vec<String> {
        self.0.iter().map(PainPoint::display_name).collect()
    }
}

impl FromIterator<PainPoint> for PainPoints {
    fn from_iter<I: IntoIterator<Item = PainPoint>>(iter: I) -> Self {
        let mut points = Self::new();
        for point in iter {
            points.insert(point);
        }
        points
    }
}

// ═══════════════════════════════════════════════════════════
// AI summary
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiSummaryState {
    /// Accumulated or final summary HTML/text.
    pub content: String,
    /// User-facing error from the last attempt, empty when none.
    pub error_message: String,
    /// Fingerprint of the answers `content` was generated from. Empty unless
    /// the last attempt succeeded.
    pub payload_fingerprint: String,
    pub in_flight: bool,
}

impl AiSummaryState {
    pub fn is_cached_for(&self, fingerprint: &str) -> bool {
        !self.content.trim().is_empty()
            && self.error_message.is_empty()
            && self.payload_fingerprint == fingerprint
    }
}

// ═══════════════════════════════════════════════════════════
// Wizard state
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    /// 1-based, always within `1..=TOTAL_STEPS`.
    pub current_step: u8,
    /// Steps the user has validated past (or that precede a restored step).
    pub completed_steps: BTreeSet<u8>,
    pub fields: FormFields,
    pub pain_points: PainPoints,
    pub ai_summary: AiSummaryState,
    /// Set only by the autosave controller after a successful write.
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            current_step: 1,
            completed_steps: BTreeSet::new(),
            fields: FormFields::new(),
            pain_points: PainPoints::new(),
            ai_summary: AiSummaryState::default(),
            saved_at: None,
        }
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_final_step(&self) -> bool {
        self.current_step == TOTAL_STEPS
    }

    /// Nothing worth persisting: no answers, no pain points, no summary, step 1.
    pub fn is_pristine(&self) -> bool {
        self.current_step == 1
            && self.fields.filled_count() == 0
            && self.pain_points.is_empty()
            && self.ai_summary.content.trim().is_empty()
            && self.ai_summary.error_message.is_empty()
    }

    /// Back to a fresh session. Keeps nothing.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
