//! Suggestion history: raw facts behind every downstream inference.
//!
//! The recorder appends an entry when a suggestion is shown and mutates it
//! once when the player resolves it. The window is bounded to the most
//! recent entries; everything the analytics and both state machines compute
//! must be reconstructible from what is currently in the window.

use crate::config::{DetectionConfig, Theme};
use crate::store::{load_record, CharacterId, RecordStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Unique identifier for a recorded suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionId(Uuid);

impl SuggestionId {
    /// Create a new unique suggestion ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SuggestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// How the player resolved a shown suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionOutcome {
    /// The player took the suggestion.
    Accepted,
    /// The player dismissed it deliberately.
    ExplicitlyIgnored,
    /// The dialog lapsed without a decision.
    PassiveIgnored,
}

impl SuggestionOutcome {
    /// Display name for this outcome.
    pub fn name(&self) -> &'static str {
        match self {
            SuggestionOutcome::Accepted => "Accepted",
            SuggestionOutcome::ExplicitlyIgnored => "Explicitly Ignored",
            SuggestionOutcome::PassiveIgnored => "Passively Ignored",
        }
    }

    /// Whether this outcome came from a deliberate player action.
    pub fn is_explicit(&self) -> bool {
        !matches!(self, SuggestionOutcome::PassiveIgnored)
    }
}

/// Banded view of a suggestion's confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Band a raw confidence score.
    pub fn from_score(score: f32) -> Self {
        if score >= 0.7 {
            ConfidenceLevel::High
        } else if score >= 0.4 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    /// Display name for this band.
    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::High => "High",
        }
    }
}

/// What kind of item a suggestion proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionCategory {
    Equipment,
    Skill,
    Tactic,
    Droid,
    Vehicle,
}

impl SuggestionCategory {
    /// Display name for this category.
    pub fn name(&self) -> &'static str {
        match self {
            SuggestionCategory::Equipment => "Equipment",
            SuggestionCategory::Skill => "Skill",
            SuggestionCategory::Tactic => "Tactic",
            SuggestionCategory::Droid => "Droid",
            SuggestionCategory::Vehicle => "Vehicle",
        }
    }
}

/// What prompted the suggestion dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionTrigger {
    LevelUp,
    Periodic,
    Manual,
}

/// Snapshot of the situation when a suggestion was shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionContext {
    /// What prompted the dialog.
    pub trigger: SuggestionTrigger,
    /// Character level at the time.
    pub character_level: u32,
    /// Optional free-form annotation from the presentation layer.
    pub note: Option<String>,
}

impl SuggestionContext {
    /// Create a context snapshot.
    pub fn new(trigger: SuggestionTrigger, character_level: u32) -> Self {
        Self {
            trigger,
            character_level,
            note: None,
        }
    }

    /// Attach an annotation.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A suggestion as handed over by the (out-of-scope) ranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Stable identifier of the suggested item.
    pub item_id: String,
    /// Player-facing item name.
    pub item_name: String,
    /// Item category.
    pub category: SuggestionCategory,
    /// Theme tag driving pattern detection.
    pub theme: Theme,
}

impl Suggestion {
    /// Describe a suggested item.
    pub fn new(
        item_id: impl Into<String>,
        item_name: impl Into<String>,
        category: SuggestionCategory,
        theme: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            item_name: item_name.into(),
            category,
            theme: Theme::new(theme),
        }
    }
}

/// One shown suggestion and its eventual outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique identifier.
    pub id: SuggestionId,
    /// Stable identifier of the suggested item.
    pub item_id: String,
    /// Player-facing item name.
    pub item_name: String,
    /// Item category.
    pub category: SuggestionCategory,
    /// Theme tag.
    pub theme: Theme,
    /// Character level when shown.
    pub level_at_shown: u32,
    /// Epoch seconds when shown.
    pub shown_at: u64,
    /// Resolution, if any yet.
    pub outcome: Option<SuggestionOutcome>,
    /// Epoch seconds when resolved.
    pub outcome_at: Option<u64>,
    /// Ranker confidence at show time.
    pub confidence: f32,
    /// Banded confidence.
    pub confidence_level: ConfidenceLevel,
    /// Situation snapshot.
    pub context: SuggestionContext,
}

impl HistoryEntry {
    /// Create an unresolved entry for a just-shown suggestion.
    pub fn new(suggestion: Suggestion, confidence: f32, context: SuggestionContext) -> Self {
        Self {
            id: SuggestionId::new(),
            item_id: suggestion.item_id,
            item_name: suggestion.item_name,
            category: suggestion.category,
            theme: suggestion.theme,
            level_at_shown: context.character_level,
            shown_at: now_secs(),
            outcome: None,
            outcome_at: None,
            confidence,
            confidence_level: ConfidenceLevel::from_score(confidence),
            context,
        }
    }

    /// Apply an outcome, honoring the explicit-over-passive ranking.
    ///
    /// Unresolved entries take any outcome. A passive ignore may later be
    /// replaced by an explicit action; an explicit outcome is final, and a
    /// passive ignore never overwrites anything.
    pub fn resolve(&mut self, outcome: SuggestionOutcome, at: u64) -> bool {
        match self.outcome {
            None => {
                self.outcome = Some(outcome);
                self.outcome_at = Some(at);
                true
            }
            Some(SuggestionOutcome::PassiveIgnored) if outcome.is_explicit() => {
                self.outcome = Some(outcome);
                self.outcome_at = Some(at);
                true
            }
            Some(_) => false,
        }
    }

    /// Whether an outcome has been recorded.
    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    /// Whether the player accepted this suggestion.
    pub fn is_accepted(&self) -> bool {
        self.outcome == Some(SuggestionOutcome::Accepted)
    }

    /// Age of this entry in character levels.
    pub fn level_age(&self, current_level: u32) -> u32 {
        current_level.saturating_sub(self.level_at_shown)
    }
}

/// Records suggestion facts into the bounded rolling history.
///
/// Recording is on the suggestion-dialog path, so failures to read the
/// store degrade to a logged warning rather than an error; a failed write
/// is the one failure that propagates.
pub struct SelectionRecorder {
    store: Arc<dyn RecordStore>,
    config: DetectionConfig,
}

impl SelectionRecorder {
    /// Create a recorder over the given store with default tuning.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_config(store, DetectionConfig::default())
    }

    /// Create a recorder with explicit tuning.
    pub fn with_config(store: Arc<dyn RecordStore>, config: DetectionConfig) -> Self {
        Self { store, config }
    }

    /// Record that a suggestion was shown; returns its ID.
    ///
    /// Evicts the oldest entry once the window exceeds its cap. Fails open
    /// (warns, returns `None`) when the store cannot be read, so a storage
    /// hiccup never blocks the suggestion flow.
    pub fn record_suggestion_shown(
        &self,
        character: &CharacterId,
        suggestion: Suggestion,
        confidence: f32,
        context: SuggestionContext,
    ) -> Result<Option<SuggestionId>, StoreError> {
        let entry = HistoryEntry::new(suggestion, confidence, context);
        let id = entry.id;

        let mut record = match load_record(self.store.as_ref(), character) {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    "record_suggestion_shown failing open for {}: {}",
                    character, err
                );
                return Ok(None);
            }
        };

        record.history.push(entry);
        while record.history.len() > self.config.history_cap {
            record.history.remove(0);
        }

        match self.store.save(character, &record) {
            Ok(()) => Ok(Some(id)),
            Err(err) => {
                error!(
                    "record_suggestion_shown write failed for {}: {}",
                    character, err
                );
                Err(err)
            }
        }
    }

    /// Record that the player accepted a suggestion.
    pub fn record_suggestion_accepted(
        &self,
        character: &CharacterId,
        id: SuggestionId,
    ) -> Result<bool, StoreError> {
        self.resolve_outcome(character, id, SuggestionOutcome::Accepted)
    }

    /// Record that the player deliberately dismissed a suggestion.
    pub fn record_suggestion_ignored(
        &self,
        character: &CharacterId,
        id: SuggestionId,
    ) -> Result<bool, StoreError> {
        self.resolve_outcome(character, id, SuggestionOutcome::ExplicitlyIgnored)
    }

    /// Record that a suggestion dialog lapsed without a decision.
    pub fn record_suggestion_passive_ignored(
        &self,
        character: &CharacterId,
        id: SuggestionId,
    ) -> Result<bool, StoreError> {
        self.resolve_outcome(character, id, SuggestionOutcome::PassiveIgnored)
    }

    /// The current history window, oldest first. Empty on read failure.
    pub fn history(&self, character: &CharacterId) -> Vec<HistoryEntry> {
        match load_record(self.store.as_ref(), character) {
            Ok(record) => record.history,
            Err(err) => {
                warn!("history read failed for {}: {}", character, err);
                Vec::new()
            }
        }
    }

    fn resolve_outcome(
        &self,
        character: &CharacterId,
        id: SuggestionId,
        outcome: SuggestionOutcome,
    ) -> Result<bool, StoreError> {
        let mut record = match load_record(self.store.as_ref(), character) {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    "resolve {} failing open for {} ({}): {}",
                    outcome.name(),
                    character,
                    id,
                    err
                );
                return Ok(false);
            }
        };

        let Some(entry) = record.history.iter_mut().find(|e| e.id == id) else {
            // Evicted before resolution, or never recorded. Safe no-op.
            warn!(
                "resolve {} for {}: entry {} not in window",
                outcome.name(),
                character,
                id
            );
            return Ok(false);
        };

        if !entry.resolve(outcome, now_secs()) {
            debug!(
                "resolve {} for {}: entry {} already resolved, keeping {}",
                outcome.name(),
                character,
                id,
                entry.outcome.map(|o| o.name()).unwrap_or("none")
            );
            return Ok(false);
        }

        match self.store.save(character, &record) {
            Ok(()) => Ok(true),
            Err(err) => {
                error!(
                    "resolve {} write failed for {} ({}): {}",
                    outcome.name(),
                    character,
                    id,
                    err
                );
                Err(err)
            }
        }
    }
}

/// Current wall-clock time as epoch seconds.
pub(crate) fn now_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
