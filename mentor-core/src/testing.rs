//! Testing utilities for the analytics core.
//!
//! Deterministic fixtures for history-driven tests, and a store wrapper
//! whose reads/writes can be failed on demand to exercise the fail-open
//! and propagate-on-write paths without real storage faults.

use crate::history::{
    HistoryEntry, Suggestion, SuggestionCategory, SuggestionContext, SuggestionOutcome,
    SuggestionTrigger,
};
use crate::store::{CharacterId, CharacterRecord, MemoryRecordStore, RecordStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};

/// A resolved history entry with the given theme and shown level.
fn entry(theme: &str, level: u32, outcome: Option<SuggestionOutcome>) -> HistoryEntry {
    let suggestion = Suggestion::new(
        format!("itm-{theme}"),
        format!("Test {theme}"),
        SuggestionCategory::Equipment,
        theme,
    );
    let mut entry = HistoryEntry::new(
        suggestion,
        0.6,
        SuggestionContext::new(SuggestionTrigger::LevelUp, level),
    );
    if let Some(outcome) = outcome {
        entry.outcome = Some(outcome);
        entry.outcome_at = Some(entry.shown_at);
    }
    entry
}

/// An accepted entry.
pub fn accepted(theme: &str, level: u32) -> HistoryEntry {
    entry(theme, level, Some(SuggestionOutcome::Accepted))
}

/// An explicitly ignored entry.
pub fn explicitly_ignored(theme: &str, level: u32) -> HistoryEntry {
    entry(theme, level, Some(SuggestionOutcome::ExplicitlyIgnored))
}

/// A passively ignored entry.
pub fn passive_ignored(theme: &str, level: u32) -> HistoryEntry {
    entry(theme, level, Some(SuggestionOutcome::PassiveIgnored))
}

/// An entry still awaiting resolution.
pub fn unresolved(theme: &str, level: u32) -> HistoryEntry {
    entry(theme, level, None)
}

/// A record store whose reads and writes can be failed on demand.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryRecordStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    /// Create a healthy store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent loads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl RecordStore for FlakyStore {
    fn load(&self, character: &CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scripted read failure".into()));
        }
        self.inner.load(character)
    }

    fn save(&self, character: &CharacterId, record: &CharacterRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scripted write failure".into()));
        }
        self.inner.save(character, record)
    }
}
