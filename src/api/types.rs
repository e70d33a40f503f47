//! Shared state for the intake API.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::db::{self, DatabaseError};
use crate::llm::SummaryModel;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the intake router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    db: Arc<Mutex<Connection>>,
    /// `None` when no summary model is configured; the summary routes then
    /// answer 503.
    pub model: Option<Arc<dyn SummaryModel>>,
}

impl ApiContext {
    pub fn new(conn: Connection, model: Option<Arc<dyn SummaryModel>>) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            model,
        }
    }

    /// In-memory database with migrations applied.
    pub fn in_memory(model: Option<Arc<dyn SummaryModel>>) -> Result<Self, DatabaseError> {
        Ok(Self::new(db::open_memory_database()?, model))
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".into()))
    }

    pub fn model(&self) -> Result<&Arc<dyn SummaryModel>, ApiError> {
        self.model.as_ref().ok_or(ApiError::NotConfigured)
    }
}
