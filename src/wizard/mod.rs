//! The intake wizard: state, step navigation, body map, autosave, AI
//! summary, and draft restore. [`session::IntakeSession`] ties them together.

pub mod autosave;
pub mod body_map;
pub mod frames;
pub mod hotspots;
pub mod navigator;
pub mod persistence;
pub mod restore;
pub mod review;
pub mod session;
pub mod state;
pub mod steps;
pub mod summary;

pub use autosave::{AutosaveConfig, AutosaveController, SaveStatus};
pub use body_map::{ClickOutcome, Marker, PainPointRegistry, RenderedBox};
pub use navigator::{NavEffect, NavOutcome};
pub use persistence::{DraftStore, MemoryStore, Persistence, SqliteDraftStore, StorageError};
pub use session::{DraftNotice, IntakeSession, SessionError};
pub use state::{SharedState, WizardState};
pub use summary::{SummaryError, SummaryOutcome, SummaryProgress, SummaryStreamer};
