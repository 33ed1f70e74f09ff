//! QA tests for suggestion recording and aggregate metrics.
//!
//! These tests drive the public recorder/analytics surface end to end
//! against an in-memory store.

use mentor_core::{
    CharacterId, MemoryRecordStore, PlayerAnalytics, ProgressionTracker, SelectionRecorder,
    Suggestion, SuggestionCategory, SuggestionContext, SuggestionId, SuggestionOutcome,
    SuggestionTrigger, Theme,
};
use mentor_core::config::HISTORY_CAP;
use mentor_core::testing::FlakyStore;
use std::sync::Arc;

fn show(
    recorder: &SelectionRecorder,
    character: &CharacterId,
    theme: &str,
    level: u32,
) -> SuggestionId {
    recorder
        .record_suggestion_shown(
            character,
            Suggestion::new(
                format!("itm-{theme}-{level}"),
                format!("Item {theme}"),
                SuggestionCategory::Equipment,
                theme,
            ),
            0.55,
            SuggestionContext::new(SuggestionTrigger::Periodic, level),
        )
        .expect("write should succeed")
        .expect("id should be returned")
}

// =============================================================================
// TEST 1: FIFO window invariant
// =============================================================================

#[test]
fn test_history_never_exceeds_window() {
    let recorder = SelectionRecorder::new(Arc::new(MemoryRecordStore::new()));
    let character = CharacterId::new("fifo");

    let mut ids = Vec::new();
    for i in 0..HISTORY_CAP * 3 {
        ids.push(show(&recorder, &character, "stealth", i as u32));
        assert!(recorder.history(&character).len() <= HISTORY_CAP);
    }

    let history = recorder.history(&character);
    assert_eq!(history.len(), HISTORY_CAP);

    // Only the most recent IDs survive, in show order.
    let surviving: Vec<_> = history.iter().map(|e| e.id).collect();
    assert_eq!(surviving, ids[ids.len() - HISTORY_CAP..]);
}

// =============================================================================
// TEST 2: Outcome resolution rules
// =============================================================================

#[test]
fn test_outcome_rules_across_the_window() {
    let recorder = SelectionRecorder::new(Arc::new(MemoryRecordStore::new()));
    let character = CharacterId::new("outcomes");

    let a = show(&recorder, &character, "stealth", 1);
    let b = show(&recorder, &character, "stealth", 1);
    let c = show(&recorder, &character, "melee", 1);

    assert!(recorder.record_suggestion_accepted(&character, a).unwrap());
    assert!(recorder.record_suggestion_passive_ignored(&character, b).unwrap());
    assert!(recorder.record_suggestion_ignored(&character, c).unwrap());

    // Passive decay never downgrades an explicit outcome.
    assert!(!recorder.record_suggestion_passive_ignored(&character, a).unwrap());
    assert!(!recorder.record_suggestion_passive_ignored(&character, c).unwrap());

    // A late explicit action upgrades a passive ignore.
    assert!(recorder.record_suggestion_accepted(&character, b).unwrap());

    let history = recorder.history(&character);
    let outcomes: Vec<_> = history.iter().map(|e| e.outcome.unwrap()).collect();
    assert_eq!(
        outcomes,
        vec![
            SuggestionOutcome::Accepted,
            SuggestionOutcome::Accepted,
            SuggestionOutcome::ExplicitlyIgnored,
        ]
    );
}

#[test]
fn test_evicted_id_resolution_is_noop() {
    let recorder = SelectionRecorder::new(Arc::new(MemoryRecordStore::new()));
    let character = CharacterId::new("evicted");

    let first = show(&recorder, &character, "stealth", 1);
    for i in 0..HISTORY_CAP {
        show(&recorder, &character, "melee", 2 + i as u32);
    }

    // The first suggestion rolled off before the player answered.
    assert!(!recorder.record_suggestion_accepted(&character, first).unwrap());
    assert_eq!(recorder.history(&character).len(), HISTORY_CAP);
}

// =============================================================================
// TEST 3: Storage failure behavior
// =============================================================================

#[test]
fn test_recorder_fails_open_on_read_failure() {
    let store = Arc::new(FlakyStore::new());
    let recorder = SelectionRecorder::new(store.clone());
    let character = CharacterId::new("flaky");

    store.fail_reads(true);
    let id = recorder
        .record_suggestion_shown(
            &character,
            Suggestion::new("itm", "Item", SuggestionCategory::Skill, "tech"),
            0.5,
            SuggestionContext::new(SuggestionTrigger::LevelUp, 2),
        )
        .expect("fail-open path returns Ok");
    assert!(id.is_none());
    assert!(!recorder
        .record_suggestion_accepted(&character, SuggestionId::new())
        .unwrap());
}

#[test]
fn test_recorder_propagates_write_failure() {
    let store = Arc::new(FlakyStore::new());
    let recorder = SelectionRecorder::new(store.clone());
    let character = CharacterId::new("flaky");

    store.fail_writes(true);
    let result = recorder.record_suggestion_shown(
        &character,
        Suggestion::new("itm", "Item", SuggestionCategory::Skill, "tech"),
        0.5,
        SuggestionContext::new(SuggestionTrigger::LevelUp, 2),
    );
    assert!(result.is_err());
}

// =============================================================================
// TEST 4: Metrics through the full pipeline
// =============================================================================

#[test]
fn test_ignore_weight_scenario_end_to_end() {
    // 2 explicit ignores of "stealth" and 3 total shows at the current
    // level must land at exactly -0.04.
    let tracker = ProgressionTracker::new(Arc::new(MemoryRecordStore::new()));
    let character = CharacterId::new("weights");
    let recorder = tracker.recorder();

    let a = show(recorder, &character, "stealth", 6);
    let b = show(recorder, &character, "stealth", 6);
    show(recorder, &character, "stealth", 6);

    recorder.record_suggestion_ignored(&character, a).unwrap();
    recorder.record_suggestion_ignored(&character, b).unwrap();

    let report = tracker.evaluate(&character, 6).unwrap();
    let weight = report.metrics.ignored_theme_weights[&Theme::new("stealth")];
    assert!((weight + 0.04).abs() < 1e-6);

    // Cached copy matches what the evaluation returned.
    assert_eq!(tracker.metrics(&character).unwrap(), report.metrics);
}

#[test]
fn test_rates_follow_sample_count_convention() {
    let store = Arc::new(MemoryRecordStore::new());
    let recorder = SelectionRecorder::new(store.clone());
    let analytics = PlayerAnalytics::new();
    let character = CharacterId::new("rates");

    // Theme with three deliberate resolutions: real ratio.
    for outcome_accept in [true, true, false] {
        let id = show(&recorder, &character, "melee", 3);
        if outcome_accept {
            recorder.record_suggestion_accepted(&character, id).unwrap();
        } else {
            recorder.record_suggestion_ignored(&character, id).unwrap();
        }
    }
    // Theme with one deliberate resolution: neutral prior.
    let id = show(&recorder, &character, "piloting", 3);
    recorder.record_suggestion_accepted(&character, id).unwrap();
    // Theme with only passive signal: omitted.
    let id = show(&recorder, &character, "tech", 3);
    recorder
        .record_suggestion_passive_ignored(&character, id)
        .unwrap();

    let metrics = analytics.calculate_metrics(&recorder.history(&character), 3);
    let melee = metrics.acceptance_rate_by_theme[&Theme::new("melee")];
    assert!((melee - 2.0 / 3.0).abs() < 1e-6);
    assert_eq!(metrics.acceptance_rate_by_theme[&Theme::new("piloting")], 0.5);
    assert!(!metrics
        .acceptance_rate_by_theme
        .contains_key(&Theme::new("tech")));

    for rate in metrics.acceptance_rate_by_theme.values() {
        assert!((0.0..=1.0).contains(rate));
    }
}
