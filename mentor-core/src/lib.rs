//! Behavioral analytics core for the build mentor.
//!
//! This crate provides:
//! - A bounded rolling history of shown suggestions and their outcomes
//! - Time-decayed acceptance/ignore aggregates with small-sample safeguards
//! - The anchor lifecycle: detecting and committing an emergent build
//!   archetype, with player confirmation gating the lock
//! - Pivot detection: noticing when a player moves away from a locked
//!   identity, and relaxing what the ranker may surface while they do
//!
//! The core records facts, computes aggregates, classifies archetype, and
//! emits state transitions; choosing, wording, and rendering suggestions
//! belong to the layers above it.
//!
//! # Quick Start
//!
//! ```
//! use mentor_core::{
//!     CharacterId, MemoryRecordStore, ProgressionTracker, Suggestion, SuggestionCategory,
//!     SuggestionContext, SuggestionTrigger,
//! };
//! use std::sync::Arc;
//!
//! let tracker = ProgressionTracker::new(Arc::new(MemoryRecordStore::new()));
//! let character = CharacterId::new("kael-voss");
//!
//! let id = tracker
//!     .recorder()
//!     .record_suggestion_shown(
//!         &character,
//!         Suggestion::new("itm-77", "Shadow Cloak", SuggestionCategory::Equipment, "stealth"),
//!         0.6,
//!         SuggestionContext::new(SuggestionTrigger::LevelUp, 4),
//!     )
//!     .expect("store is in-memory")
//!     .expect("store is initialized");
//! tracker.recorder().record_suggestion_accepted(&character, id).unwrap();
//!
//! let report = tracker.evaluate(&character, 4).unwrap();
//! println!("anchor: {}", report.anchor.state.name());
//! ```

pub mod analytics;
pub mod config;
pub mod history;
pub mod identity;
pub mod pivot;
pub mod store;
pub mod testing;
pub mod tracker;

// Primary public API
pub use analytics::{AggregateMetrics, PlayerAnalytics};
pub use config::{Archetype, ArchetypeTable, DecayBands, DetectionConfig, Theme};
pub use history::{
    ConfidenceLevel, HistoryEntry, SelectionRecorder, Suggestion, SuggestionCategory,
    SuggestionContext, SuggestionId, SuggestionOutcome, SuggestionTrigger,
};
pub use identity::{
    Anchor, AnchorAuditEntry, AnchorCandidate, AnchorDecision, AnchorEvidence, AnchorPosition,
    AnchorRepository, AnchorSlots, AnchorState, BuildIdentityDetector,
};
pub use pivot::{
    PivotAuditEntry, PivotDecision, PivotLogic, PivotPhase, PivotSnapshot, PivotStateManager,
};
pub use store::{
    CharacterId, CharacterRecord, JsonFileRecordStore, MemoryRecordStore, RecordStore, StoreError,
};
pub use tracker::{EvaluationReport, ProgressionTracker};
