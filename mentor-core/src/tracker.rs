//! The progression tracker: glue for the level-up evaluation pipeline.
//!
//! One facade the progression tool holds per store: the presentation layer
//! records suggestion facts through it, and the level-up/periodic trigger
//! calls `evaluate`, which runs analytics, the anchor lifecycle, and the
//! pivot detector in order and persists each result. The pivot evaluation
//! deliberately sees the anchor as just committed, not as it was when the
//! trigger fired.

use crate::analytics::{AggregateMetrics, PlayerAnalytics};
use crate::config::{ArchetypeTable, DetectionConfig};
use crate::history::SelectionRecorder;
use crate::identity::{Anchor, AnchorPosition, AnchorRepository, AnchorState, BuildIdentityDetector};
use crate::pivot::{PivotLogic, PivotPhase, PivotSnapshot, PivotStateManager};
use crate::store::{load_record, update_record, CharacterId, RecordStore, StoreError};
use std::sync::Arc;

/// What one evaluation pass computed and committed.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// Level the evaluation ran at.
    pub level: u32,
    /// Freshly computed metrics (also cached in the record).
    pub metrics: AggregateMetrics,
    /// The committed primary anchor.
    pub anchor: Anchor,
    /// Anchor state change, if one happened.
    pub anchor_transition: Option<(AnchorState, AnchorState)>,
    /// The committed pivot snapshot.
    pub pivot: PivotSnapshot,
    /// Pivot phase change, if one happened.
    pub pivot_transition: Option<(PivotPhase, PivotPhase)>,
}

/// Facade wiring recorder, analytics, and both state machines.
pub struct ProgressionTracker {
    store: Arc<dyn RecordStore>,
    recorder: SelectionRecorder,
    analytics: PlayerAnalytics,
    detector: BuildIdentityDetector,
    anchors: AnchorRepository,
    pivot_logic: PivotLogic,
    pivots: PivotStateManager,
}

impl ProgressionTracker {
    /// Create a tracker with default tuning and the builtin archetypes.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_config(store, DetectionConfig::default(), ArchetypeTable::builtin())
    }

    /// Create a tracker with explicit tuning and mapping.
    pub fn with_config(
        store: Arc<dyn RecordStore>,
        config: DetectionConfig,
        archetypes: ArchetypeTable,
    ) -> Self {
        Self {
            recorder: SelectionRecorder::with_config(store.clone(), config.clone()),
            analytics: PlayerAnalytics::with_config(config.clone()),
            detector: BuildIdentityDetector::with_config(config.clone(), archetypes.clone()),
            anchors: AnchorRepository::new(store.clone()),
            pivot_logic: PivotLogic::with_config(config.clone(), archetypes),
            pivots: PivotStateManager::with_config(store.clone(), config),
            store,
        }
    }

    /// Create the per-character skeleton. Idempotent.
    pub fn initialize(&self, character: &CharacterId) -> Result<(), StoreError> {
        self.anchors.initialize_storage(character)?;
        self.pivots.initialize_storage(character)
    }

    /// The suggestion recorder, for the presentation layer.
    pub fn recorder(&self) -> &SelectionRecorder {
        &self.recorder
    }

    /// The anchor repository, for confirm/reject player actions and reads.
    pub fn anchors(&self) -> &AnchorRepository {
        &self.anchors
    }

    /// The pivot state manager, for reads and resets.
    pub fn pivots(&self) -> &PivotStateManager {
        &self.pivots
    }

    /// The pivot evaluator, for confidence-floor adjustment.
    pub fn pivot_logic(&self) -> &PivotLogic {
        &self.pivot_logic
    }

    /// The metrics calculator.
    pub fn analytics(&self) -> &PlayerAnalytics {
        &self.analytics
    }

    /// The anchor detector.
    pub fn detector(&self) -> &BuildIdentityDetector {
        &self.detector
    }

    /// The cached metrics from the last evaluation, if any.
    pub fn metrics(&self, character: &CharacterId) -> Option<AggregateMetrics> {
        load_record(self.store.as_ref(), character)
            .ok()
            .and_then(|record| record.metrics)
    }

    /// Run one evaluation pass for a character at the given level.
    ///
    /// Recomputes aggregates, steps the anchor lifecycle for the primary
    /// slot, commits it, then steps the pivot detector against the
    /// just-committed anchor and commits that. Storage failures propagate;
    /// nothing is half-applied beyond the step that failed.
    pub fn evaluate(
        &self,
        character: &CharacterId,
        current_level: u32,
    ) -> Result<EvaluationReport, StoreError> {
        let record = load_record(self.store.as_ref(), character)?;
        let history = record.history;

        let metrics = self.analytics.calculate_metrics(&history, current_level);
        update_record(self.store.as_ref(), character, |r| {
            r.metrics = Some(metrics.clone());
        })?;

        let decision =
            self.detector
                .determine_next_state(&record.anchors.primary, &history, current_level);
        let anchor = self.anchors.apply_decision(
            character,
            AnchorPosition::Primary,
            &decision,
            current_level,
        )?;

        let pivot_decision =
            self.pivot_logic
                .calculate_pivot_state(Some(&anchor), &record.pivot, &history);
        let pivot = self
            .pivots
            .update_pivot_state(character, &pivot_decision, current_level)?;

        Ok(EvaluationReport {
            level: current_level,
            metrics,
            anchor_transition: decision
                .transitioned
                .then_some((decision.previous_state, decision.new_state)),
            anchor,
            pivot_transition: pivot_decision
                .transitioned
                .then_some((pivot_decision.previous, pivot_decision.next)),
            pivot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Suggestion, SuggestionCategory, SuggestionContext, SuggestionTrigger};
    use crate::store::MemoryRecordStore;

    fn tracker() -> ProgressionTracker {
        ProgressionTracker::new(Arc::new(MemoryRecordStore::new()))
    }

    fn show_and_accept(tracker: &ProgressionTracker, character: &CharacterId, theme: &str, level: u32) {
        let id = tracker
            .recorder()
            .record_suggestion_shown(
                character,
                Suggestion::new("itm", "Item", SuggestionCategory::Skill, theme),
                0.6,
                SuggestionContext::new(SuggestionTrigger::LevelUp, level),
            )
            .unwrap()
            .unwrap();
        tracker
            .recorder()
            .record_suggestion_accepted(character, id)
            .unwrap();
    }

    #[test]
    fn test_evaluate_on_empty_history() {
        let tracker = tracker();
        let character = CharacterId::new("c1");
        tracker.initialize(&character).unwrap();

        let report = tracker.evaluate(&character, 1).unwrap();
        assert_eq!(report.anchor.state, AnchorState::None);
        assert!(report.anchor_transition.is_none());
        // No anchor yet, so the pivot detector forces exploration.
        assert_eq!(report.pivot.state, PivotPhase::Exploratory);
        assert_eq!(
            report.pivot_transition,
            Some((PivotPhase::Stable, PivotPhase::Exploratory))
        );
        assert!(report.metrics.acceptance_rate_by_theme.is_empty());
    }

    #[test]
    fn test_evaluate_proposes_then_confirm_stabilizes() {
        let tracker = tracker();
        let character = CharacterId::new("c1");
        tracker.initialize(&character).unwrap();

        for _ in 0..5 {
            show_and_accept(&tracker, &character, "stealth", 4);
        }

        let report = tracker.evaluate(&character, 5).unwrap();
        assert_eq!(
            report.anchor_transition,
            Some((AnchorState::None, AnchorState::Proposed))
        );
        // A proposed anchor is still not locked: exploration continues.
        assert_eq!(report.pivot.state, PivotPhase::Exploratory);

        tracker
            .anchors()
            .confirm_anchor(&character, AnchorPosition::Primary, "player", 5)
            .unwrap();

        let after_confirm = tracker.evaluate(&character, 5).unwrap();
        assert_eq!(after_confirm.anchor.state, AnchorState::Locked);
        assert_eq!(
            after_confirm.pivot_transition,
            Some((PivotPhase::Exploratory, PivotPhase::Stable))
        );
    }

    #[test]
    fn test_metrics_cached_for_ranker() {
        let tracker = tracker();
        let character = CharacterId::new("c1");
        for _ in 0..3 {
            show_and_accept(&tracker, &character, "melee", 2);
        }

        assert!(tracker.metrics(&character).is_none());
        tracker.evaluate(&character, 3).unwrap();

        let metrics = tracker.metrics(&character).expect("metrics cached");
        assert_eq!(metrics.last_updated_at_level, 3);
        assert_eq!(
            metrics.acceptance_rate_by_theme[&crate::config::Theme::new("melee")],
            1.0
        );
    }
}
