//! Step navigator: a finite-state machine over the ordered wizard steps.
//!
//! Transitions are pure functions over [`WizardState`]. Side effects of
//! entering or leaving a step are returned as [`NavEffect`]s for the session
//! to carry out, so the machine itself never touches the network or storage.

use serde::Serialize;

use super::state::WizardState;
use super::steps::{validate_step, ValidationReport};
use crate::config::TOTAL_STEPS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavEffect {
    /// Rebuild the review summary.
    RenderReview,
    /// Ask the summary streamer for a (possibly cached) summary.
    StartSummary,
    /// Abort any in-flight summary request.
    CancelSummary,
}

/// Whether a step is being entered by the user or replayed from a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    Interactive,
    Rehydrating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Moved {
        from: u8,
        to: u8,
        effects: Vec<NavEffect>,
    },
    /// Already at the boundary or target; nothing happened.
    Unchanged,
    /// Validation failed; the step did not change.
    Refused(ValidationReport),
}

impl NavOutcome {
    pub fn effects(&self) -> &[NavEffect] {
        match self {
            Self::Moved { effects, .. } => effects,
            _ => &[],
        }
    }

    pub fn moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavError {
    #[error("Step {0} does not exist")]
    UnknownStep(u8),
    #[error("Step {target} is not reachable yet (current step {current})")]
    NotReachable { current: u8, target: u8 },
}

/// Validate the current step and move forward. No-op on the last step.
pub fn advance(state: &mut WizardState) -> NavOutcome {
    let from = state.current_step;
    let report = validate_step(from, &state.fields);
    if !report.is_valid() {
        tracing::debug!(step = from, issues = report.issues.len(), "Step validation refused advance");
        return NavOutcome::Refused(report);
    }
    state.completed_steps.insert(from);
    if from >= TOTAL_STEPS {
        return NavOutcome::Unchanged;
    }
    move_to(state, from + 1, EntryMode::Interactive)
}

/// Move back one step without validation.
pub fn retreat(state: &mut WizardState) -> NavOutcome {
    let from = state.current_step;
    if from <= 1 {
        return NavOutcome::Unchanged;
    }
    move_to(state, from - 1, EntryMode::Interactive)
}

/// Jump to the current step or any completed step. Never skips ahead.
pub fn jump_to(state: &mut WizardState, target: u8) -> Result<NavOutcome, NavError> {
    if !(1..=TOTAL_STEPS).contains(&target) {
        return Err(NavError::UnknownStep(target));
    }
    let current = state.current_step;
    if target == current {
        return Ok(NavOutcome::Unchanged);
    }
    if !state.completed_steps.contains(&target) {
        return Err(NavError::NotReachable { current, target });
    }
    Ok(move_to(state, target, EntryMode::Interactive))
}

/// Enter `step` unconditionally, as the restore path does. Earlier steps are
/// marked completed so the user can navigate back through them.
pub fn enter(state: &mut WizardState, step: u8, mode: EntryMode) -> NavOutcome {
    let step = step.clamp(1, TOTAL_STEPS);
    state.completed_steps.extend(1..step);
    let from = state.current_step;
    state.current_step = step;
    NavOutcome::Moved {
        from,
        to: step,
        effects: transition_effects(from, step, mode),
    }
}

fn move_to(state: &mut WizardState, to: u8, mode: EntryMode) -> NavOutcome {
    let from = state.current_step;
    state.current_step = to;
    tracing::debug!(from, to, "Step changed");
    NavOutcome::Moved {
        from,
        to,
        effects: transition_effects(from, to, mode),
    }
}

fn transition_effects(from: u8, to: u8, mode: EntryMode) -> Vec<NavEffect> {
    let mut effects = Vec::new();
    if from == TOTAL_STEPS && to != TOTAL_STEPS {
        effects.push(NavEffect::CancelSummary);
    }
    if to == TOTAL_STEPS {
        effects.push(NavEffect::RenderReview);
        if mode == EntryMode::Interactive {
            effects.push(NavEffect::StartSummary);
        }
    }
    effects
}

/// `(step - 1) / (total - 1) * 100`, rounded. Step 1 is 0, the last step 100.
pub fn progress_percent(step: u8) -> u8 {
    let step = step.clamp(1, TOTAL_STEPS);
    let pct = f64::from(step - 1) / f64::from(TOTAL_STEPS - 1) * 100.0;
    pct.round() as u8
}
