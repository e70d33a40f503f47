//! Persistence adapter: wizard state to and from a stored snapshot.
//!
//! The whole snapshot lives under one key and is always overwritten whole,
//! so concurrent writers can only produce redundant writes, never torn ones.
//! No business logic here beyond the projection itself.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::state::{PainPoints, StateLockError, WizardState};
use crate::config::DRAFT_STORAGE_KEY;
use crate::db::{self, DatabaseError};
use crate::models::{PainPoint, RelativePosition, Snapshot, SnapshotPainPoint};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Stored draft is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Lock(#[from] StateLockError),
}

/// Synchronous string key-value storage. Every call may fail; callers catch
/// failures per call and keep running in memory.
pub trait DraftStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ═══════════════════════════════════════════════════════════
// Stores
// ═══════════════════════════════════════════════════════════

/// Draft storage in the local SQLite `kv_store` table.
pub struct SqliteDraftStore {
    conn: Mutex<Connection>,
}

impl SqliteDraftStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            conn: Mutex::new(db::open_database(path)?),
        })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            conn: Mutex::new(db::open_memory_database()?),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, StorageError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(f(&conn)?)
    }
}

impl DraftStore for SqliteDraftStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_conn(|conn| db::get_value(conn, key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| db::set_value(conn, key, value))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| db::delete_value(conn, key))
    }
}

/// In-process store. Used when no database is available and as the test
/// double; writes can be made to fail to simulate a full or disabled store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))
    }
}

impl DraftStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QuotaExceeded);
        }
        self.entries()?.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Projection
// ═══════════════════════════════════════════════════════════

/// Project the state into its persisted shape, stamped with `saved_at`.
pub fn to_snapshot(state: &WizardState, saved_at: DateTime<Utc>) -> Snapshot {
    Snapshot {
        fields: state.fields.clone(),
        selected_areas: state.pain_points.selected_areas(),
        pain_points: state.pain_points.iter().map(snapshot_point).collect(),
        ai_summary: state.ai_summary.content.clone(),
        ai_summary_error: state.ai_summary.error_message.clone(),
        current_step: state.current_step,
        saved_at: Some(saved_at),
    }
}

pub fn snapshot_point(point: &PainPoint) -> SnapshotPainPoint {
    SnapshotPainPoint {
        key: point.key.clone(),
        view: point.view,
        region: point.region.clone(),
        original_name: point.original_name.clone(),
        display_name: point.display_name(),
        x_percent: point.position.x_percent,
        y_percent: point.position.y_percent,
        intensity: point.intensity(),
        intensity_level: point.intensity_level(),
    }
}

/// Rebuild a pain point from its persisted form. The stored key stays the
/// identity; the level is recomputed from the intensity.
pub fn restore_point(saved: &SnapshotPainPoint) -> PainPoint {
    let hotspot_id = saved.key.splitn(3, ':').nth(1).unwrap_or_default();
    let original_name = if saved.original_name.is_empty() {
        saved.region.as_str()
    } else {
        saved.original_name.as_str()
    };
    let mut point = PainPoint::new(
        saved.view,
        hotspot_id,
        original_name,
        &saved.region,
        RelativePosition::clamped(saved.x_percent, saved.y_percent),
        saved.intensity,
    );
    point.key = saved.key.clone();
    point
}

/// Copy the snapshot's answers, pain points and summary into `state`.
/// The step is returned, not applied: re-entering it is the navigator's job.
pub fn apply_snapshot(state: &mut WizardState, snapshot: &Snapshot) -> u8 {
    state.fields = snapshot.fields.clone();
    state.pain_points = snapshot.pain_points.iter().map(restore_point).collect::<PainPoints>();
    state.ai_summary.content = snapshot.ai_summary.clone();
    state.ai_summary.error_message = snapshot.ai_summary_error.clone();
    state.ai_summary.payload_fingerprint.clear();
    state.ai_summary.in_flight = false;
    state.saved_at = snapshot.saved_at;
    snapshot.current_step
}

// ═══════════════════════════════════════════════════════════
// Adapter
// ═══════════════════════════════════════════════════════════

/// Reads and writes the one versioned draft key.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn DraftStore>,
    key: String,
}

impl Persistence {
    pub fn new(store: Arc<dyn DraftStore>) -> Self {
        Self::with_key(store, DRAFT_STORAGE_KEY)
    }

    pub fn with_key(store: Arc<dyn DraftStore>, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write the whole state. Returns the timestamp stored in the snapshot.
    pub fn save(&self, state: &WizardState) -> Result<DateTime<Utc>, StorageError> {
        let saved_at = Utc::now();
        let json = to_snapshot(state, saved_at).to_json()?;
        self.store.write(&self.key, &json)?;
        Ok(saved_at)
    }

    /// `Ok(None)` when no draft exists.
    pub fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        match self.store.read(&self.key)? {
            Some(raw) => Ok(Some(Snapshot::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::form::names;
    use crate::models::BodyView;
    use crate::wizard::navigator::{self, EntryMode};

    fn populated_state() -> WizardState {
        let mut state = WizardState::new();
        state.fields.set_text(names::FULL_NAME, "Jane Doe");
        state.fields.set_text(names::EMAIL, "jane@example.org");
        state.fields.set_values(names::GOALS, ["Return to sports", "Sleep better"]);
        state.pain_points.insert(PainPoint::new(
            BodyView::Front,
            "shoulder-l",
            "Left Shoulder",
            "Right Shoulder",
            RelativePosition::clamped(32.5, 19.5),
            7,
        ));
        state.pain_points.insert(PainPoint::new(
            BodyView::Back,
            "lower-back",
            "Lower Back",
            "Lower Back",
            RelativePosition::clamped(50.0, 39.0),
            3,
        ));
        state.ai_summary.content = "<p>Summary</p>".into();
        state.current_step = 3;
        state
    }

    fn memory_persistence() -> (Arc<MemoryStore>, Persistence) {
        let store = Arc::new(MemoryStore::new());
        let persistence = Persistence::new(store.clone());
        (store, persistence)
    }

    #[test]
    fn restore_of_serialized_state_is_equivalent() {
        let original = populated_state();
        let (_, persistence) = memory_persistence();
        persistence.save(&original).unwrap();

        let snapshot = persistence.load().unwrap().unwrap();
        let mut restored = WizardState::new();
        let step = apply_snapshot(&mut restored, &snapshot);
        navigator::enter(&mut restored, step, EntryMode::Rehydrating);

        assert_eq!(restored.fields, original.fields);
        assert_eq!(restored.pain_points, original.pain_points);
        assert_eq!(restored.current_step, original.current_step);
        assert_eq!(restored.ai_summary.content, original.ai_summary.content);
        assert!(restored.saved_at.is_some());
    }

    #[test]
    fn snapshot_includes_derived_entries() {
        let snapshot = to_snapshot(&populated_state(), Utc::now());
        assert_eq!(
            snapshot.selected_areas,
            vec!["Right Shoulder (Front)", "Lower Back (Back)"]
        );
        assert_eq!(snapshot.pain_points[0].display_name, "Right Shoulder (Front)");
        assert_eq!(snapshot.current_step, 3);
    }

    #[test]
    fn restored_point_keeps_stored_key_and_derives_hotspot() {
        let saved = SnapshotPainPoint {
            key: "front:knee-l:Right Knee".into(),
            view: BodyView::Front,
            region: "Right Knee".into(),
            original_name: String::new(),
            display_name: String::new(),
            x_percent: 120.0,
            y_percent: 70.0,
            intensity: 9,
            intensity_level: crate::models::IntensityLevel::Low,
        };
        let point = restore_point(&saved);
        assert_eq!(point.key, saved.key);
        assert_eq!(point.hotspot_id, "knee-l");
        assert_eq!(point.original_name, "Right Knee");
        assert_eq!(point.position.x_percent, 100.0);
        assert_eq!(point.intensity_level(), crate::models::IntensityLevel::High);
    }

    #[test]
    fn absent_key_means_no_draft() {
        let (_, persistence) = memory_persistence();
        assert!(persistence.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_draft_is_an_error() {
        let (store, persistence) = memory_persistence();
        store.write(DRAFT_STORAGE_KEY, "{oops").unwrap();
        assert!(matches!(persistence.load(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn failing_store_reports_quota() {
        let (store, persistence) = memory_persistence();
        store.set_fail_writes(true);
        assert!(matches!(
            persistence.save(&populated_state()),
            Err(StorageError::QuotaExceeded)
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn clear_removes_draft() {
        let (_, persistence) = memory_persistence();
        persistence.save(&populated_state()).unwrap();
        persistence.clear().unwrap();
        assert!(persistence.load().unwrap().is_none());
    }

    #[test]
    fn sqlite_store_round_trips_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pexp.db");
        {
            let store: Arc<dyn DraftStore> = Arc::new(SqliteDraftStore::open(&path).unwrap());
            Persistence::new(store).save(&populated_state()).unwrap();
        }
        let store: Arc<dyn DraftStore> = Arc::new(SqliteDraftStore::open(&path).unwrap());
        let snapshot = Persistence::new(store).load().unwrap().unwrap();
        assert_eq!(snapshot.pain_points.len(), 2);
        assert_eq!(snapshot.fields.text(names::FULL_NAME), Some("Jane Doe"));
    }
}
