//! The character record store: the single durable source of truth.
//!
//! Every adapter goes through the same read-fresh, mutate, write-through
//! path; in-memory state never outlives one operation, so nothing can
//! drift from storage. The per-character document is an explicit versioned
//! schema with a normalization step instead of an untyped nested blob.

use crate::analytics::AggregateMetrics;
use crate::config;
use crate::history::HistoryEntry;
use crate::identity::{AnchorAuditEntry, AnchorSlots};
use crate::pivot::{PivotAuditEntry, PivotSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::error;

/// Current record schema version.
pub const RECORD_VERSION: u32 = 1;

/// Errors from record storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Identifier of a character's namespaced record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(String);

impl CharacterId {
    /// Create a character ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CharacterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The complete per-character analytics document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    /// Schema version for compatibility checking.
    pub version: u32,

    /// Rolling suggestion history, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,

    /// Both anchor slots.
    #[serde(default)]
    pub anchors: AnchorSlots,

    /// Pivot state.
    #[serde(default)]
    pub pivot: PivotSnapshot,

    /// Cached aggregate metrics for the downstream ranker.
    #[serde(default)]
    pub metrics: Option<AggregateMetrics>,

    /// Anchor audit trail (diagnostic, unbounded).
    #[serde(default)]
    pub anchor_log: Vec<AnchorAuditEntry>,

    /// Pivot audit ring (bounded).
    #[serde(default)]
    pub pivot_log: Vec<PivotAuditEntry>,
}

impl CharacterRecord {
    /// A fresh record at the current schema version.
    pub fn new() -> Self {
        Self {
            version: RECORD_VERSION,
            history: Vec::new(),
            anchors: AnchorSlots::default(),
            pivot: PivotSnapshot::default(),
            metrics: None,
            anchor_log: Vec::new(),
            pivot_log: Vec::new(),
        }
    }

    /// Normalize a loaded record to the current schema.
    ///
    /// Records written by a newer build are rejected rather than silently
    /// reinterpreted; older or hand-edited shapes are clamped back to the
    /// documented bounds (history window, pivot ring).
    pub fn migrate(mut self) -> Result<Self, StoreError> {
        if self.version > RECORD_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: RECORD_VERSION,
                found: self.version,
            });
        }
        self.version = RECORD_VERSION;

        while self.history.len() > config::HISTORY_CAP {
            self.history.remove(0);
        }
        while self.pivot_log.len() > config::PIVOT_LOG_CAP {
            self.pivot_log.remove(0);
        }

        Ok(self)
    }
}

impl Default for CharacterRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Namespaced per-character document storage.
///
/// Semantics the rest of the crate relies on: `load` is a full-document
/// read (`Ok(None)` when the character has no record yet), `save` is a
/// full-document overwrite that must report failure as `Err` rather than
/// dropping the write silently.
pub trait RecordStore: Send + Sync {
    /// Load a character's record, `None` when absent.
    fn load(&self, character: &CharacterId) -> Result<Option<CharacterRecord>, StoreError>;

    /// Overwrite a character's record.
    fn save(&self, character: &CharacterId, record: &CharacterRecord) -> Result<(), StoreError>;
}

/// Load a character's record, migrating it, defaulting when absent.
pub fn load_record(
    store: &dyn RecordStore,
    character: &CharacterId,
) -> Result<CharacterRecord, StoreError> {
    match store.load(character)? {
        Some(record) => record.migrate(),
        None => Ok(CharacterRecord::new()),
    }
}

/// The shared mutation path: read fresh, apply, write through.
///
/// Returns whatever the closure returns. A failed write is logged and
/// propagated — dropping it silently would desynchronize callers from
/// durable state.
pub fn update_record<T>(
    store: &dyn RecordStore,
    character: &CharacterId,
    apply: impl FnOnce(&mut CharacterRecord) -> T,
) -> Result<T, StoreError> {
    let mut record = load_record(store, character)?;
    let value = apply(&mut record);
    if let Err(err) = store.save(character, &record) {
        error!("record write failed for {}: {}", character, err);
        return Err(err);
    }
    Ok(value)
}

/// In-memory record store for tests and single-process tools.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<CharacterId, CharacterRecord>>,
}

impl MemoryRecordStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of characters with a record.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no character has a record.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CharacterId, CharacterRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self, character: &CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        Ok(self.lock().get(character).cloned())
    }

    fn save(&self, character: &CharacterId, record: &CharacterRecord) -> Result<(), StoreError> {
        self.lock().insert(character.clone(), record.clone());
        Ok(())
    }
}

/// JSON-file record store: one pretty-printed document per character.
pub struct JsonFileRecordStore {
    dir: PathBuf,
}

impl JsonFileRecordStore {
    /// Create a store rooted at the given directory, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of a character's record file.
    pub fn record_path(&self, character: &CharacterId) -> PathBuf {
        let sanitized = character
            .as_str()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect::<String>();
        self.dir.join(format!("{sanitized}.json"))
    }
}

impl RecordStore for JsonFileRecordStore {
    fn load(&self, character: &CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        let path = self.record_path(character);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: CharacterRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    fn save(&self, character: &CharacterId, record: &CharacterRecord) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(self.record_path(character), content)?;
        Ok(())
    }
}
