//! Anchor detection and the anchor lifecycle state machine.
//!
//! Everything here is a pure function of (anchor, history, level): the
//! detector never touches storage and returns copy-on-write candidates for
//! the repository to commit. Acceptance is the strongest signal, so only
//! accepted entries feed archetype detection.

use super::anchor::{Anchor, AnchorEvidence, AnchorState};
use crate::config::{Archetype, ArchetypeTable, DetectionConfig, Theme};
use crate::history::HistoryEntry;
use std::collections::HashMap;

/// A derived archetype hypothesis, before any lifecycle decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorCandidate {
    /// Canonical archetype of the dominant theme, if mapped.
    pub archetype: Option<Archetype>,
    /// The dominant accepted theme, if any entries were accepted.
    pub dominant_theme: Option<Theme>,
    /// Fraction of accepted entries carrying the dominant theme.
    pub consistency: f32,
    /// Detection confidence.
    pub confidence: f32,
    /// Accepted entries in the window.
    pub accepted_count: usize,
    /// Accepted-entry counts per theme.
    pub theme_counts: HashMap<Theme, usize>,
}

impl AnchorCandidate {
    fn empty() -> Self {
        Self {
            archetype: None,
            dominant_theme: None,
            consistency: 0.0,
            confidence: 0.0,
            accepted_count: 0,
            theme_counts: HashMap::new(),
        }
    }

    fn evidence(&self) -> Option<AnchorEvidence> {
        let dominant_theme = self.dominant_theme.clone()?;
        let dominant_count = self.theme_counts.get(&dominant_theme).copied()?;
        Some(AnchorEvidence {
            accepted_count: self.accepted_count,
            dominant_count,
            dominant_theme,
            theme_counts: self.theme_counts.clone(),
        })
    }
}

/// Outcome of one lifecycle evaluation; the repository commits it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorDecision {
    /// Whether the state actually changed.
    pub transitioned: bool,
    /// State going in.
    pub previous_state: AnchorState,
    /// State coming out.
    pub new_state: AnchorState,
    /// The merged anchor candidate to persist.
    pub anchor: Anchor,
}

/// Pure evaluator for archetype detection and the anchor lifecycle.
pub struct BuildIdentityDetector {
    config: DetectionConfig,
    archetypes: ArchetypeTable,
}

impl BuildIdentityDetector {
    /// Create a detector with default tuning and the builtin table.
    pub fn new() -> Self {
        Self::with_config(DetectionConfig::default(), ArchetypeTable::builtin())
    }

    /// Create a detector with explicit tuning and mapping.
    pub fn with_config(config: DetectionConfig, archetypes: ArchetypeTable) -> Self {
        Self { config, archetypes }
    }

    /// Derive the current archetype hypothesis from accepted entries.
    ///
    /// Consistency is the dominant theme's share of accepted entries; the
    /// candidate archetype is the dominant theme's canonical mapping, and
    /// confidence is consistency plus a fixed bonus, capped at 1.0. A
    /// window with no accepted entries, or a dominant theme with no
    /// mapping, yields no archetype.
    pub fn detect_anchor(&self, history: &[HistoryEntry]) -> AnchorCandidate {
        let mut theme_counts: HashMap<Theme, usize> = HashMap::new();
        let mut accepted_count = 0usize;
        for entry in history {
            if entry.is_accepted() {
                accepted_count += 1;
                *theme_counts.entry(entry.theme.clone()).or_insert(0) += 1;
            }
        }

        if accepted_count == 0 {
            return AnchorCandidate::empty();
        }

        // Ties break by name so the candidate is a pure function of input.
        let (dominant_theme, dominant_count) = theme_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(theme, count)| (theme.clone(), *count))
            .unwrap_or_else(|| (Theme::new(""), 0));

        let consistency = dominant_count as f32 / accepted_count as f32;
        AnchorCandidate {
            archetype: self.archetypes.canonical(&dominant_theme).cloned(),
            dominant_theme: Some(dominant_theme),
            consistency,
            confidence: (consistency + self.config.confidence_bonus).min(1.0),
            accepted_count,
            theme_counts,
        }
    }

    /// Fraction of accepted entries whose theme maps to the archetype.
    pub fn consistency_against(&self, history: &[HistoryEntry], archetype: &Archetype) -> f32 {
        let mut accepted = 0usize;
        let mut matching = 0usize;
        for entry in history {
            if entry.is_accepted() {
                accepted += 1;
                if self.archetypes.maps_to(&entry.theme, archetype) {
                    matching += 1;
                }
            }
        }

        if accepted == 0 {
            0.0
        } else {
            matching as f32 / accepted as f32
        }
    }

    /// Evaluate the anchor lifecycle; pure and copy-on-write.
    ///
    /// While un-anchored (None/Proposed) consistency tracks the dominant
    /// theme; once committed (Locked/Weakening) it tracks the anchored
    /// archetype. Promotion from Proposed to Locked never happens here —
    /// that edge belongs exclusively to the player's explicit confirm.
    pub fn determine_next_state(
        &self,
        current: &Anchor,
        history: &[HistoryEntry],
        current_level: u32,
    ) -> AnchorDecision {
        let previous_state = current.state;
        let mut next = current.clone();

        match current.state {
            AnchorState::None => {
                let candidate = self.detect_anchor(history);
                if candidate.consistency >= self.config.propose_threshold {
                    if let Some(archetype) = candidate.archetype.clone() {
                        next = Anchor {
                            state: AnchorState::Proposed,
                            archetype: Some(archetype),
                            consistency: candidate.consistency,
                            confidence: candidate.confidence,
                            evidence: candidate.evidence(),
                            detected_at: Some(current_level),
                            ..Anchor::default()
                        };
                    }
                }
            }
            AnchorState::Proposed => {
                let candidate = self.detect_anchor(history);
                if candidate.consistency < self.config.demote_threshold {
                    next.reset();
                } else {
                    next.consistency = candidate.consistency;
                    next.confidence = candidate.confidence;
                    if candidate.archetype.is_some() {
                        next.archetype = candidate.archetype.clone();
                        next.evidence = candidate.evidence();
                    }
                }
            }
            AnchorState::Locked => {
                let consistency = self.anchored_consistency(current, history);
                next.consistency = consistency;
                if consistency < self.config.weaken_threshold {
                    next.state = AnchorState::Weakening;
                    next.weakening_start_level = Some(current_level);
                }
            }
            AnchorState::Weakening => {
                let consistency = self.anchored_consistency(current, history);
                next.consistency = consistency;
                if consistency >= self.config.reanchor_threshold {
                    next.state = AnchorState::Locked;
                    next.weakening_start_level = None;
                } else {
                    let weakened_for = current_level
                        .saturating_sub(next.weakening_start_level.unwrap_or(current_level));
                    if weakened_for >= self.config.release_sustain_levels
                        && consistency < self.config.release_threshold
                    {
                        next.state = AnchorState::Released;
                        next.released_at = Some(current_level);
                    }
                }
            }
            AnchorState::Released => {
                // Transient terminal state: one tick, then back to None.
                next.reset();
            }
        }

        AnchorDecision {
            transitioned: next.state != previous_state,
            previous_state,
            new_state: next.state,
            anchor: next,
        }
    }

    fn anchored_consistency(&self, current: &Anchor, history: &[HistoryEntry]) -> f32 {
        current
            .archetype
            .as_ref()
            .map(|archetype| self.consistency_against(history, archetype))
            .unwrap_or(0.0)
    }
}

impl Default for BuildIdentityDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{accepted, explicitly_ignored};

    fn accepted_history(themes: &[&str]) -> Vec<HistoryEntry> {
        themes.iter().map(|t| accepted(t, 5)).collect()
    }

    fn locked(archetype: &str, consistency: f32) -> Anchor {
        Anchor {
            state: AnchorState::Locked,
            archetype: Some(Archetype::new(archetype)),
            consistency,
            confidence: 1.0,
            confirmed_at: Some(4),
            confirmed_by: Some("player".into()),
            ..Anchor::default()
        }
    }

    #[test]
    fn test_detect_dominant_theme() {
        // 5 accepted entries, themes [A, A, A, B, A].
        let detector = BuildIdentityDetector::new();
        let history =
            accepted_history(&["stealth", "stealth", "stealth", "melee", "stealth"]);

        let candidate = detector.detect_anchor(&history);
        assert_eq!(candidate.dominant_theme, Some(Theme::new("stealth")));
        assert_eq!(candidate.archetype, Some(Archetype::new("Infiltrator")));
        assert!((candidate.consistency - 0.8).abs() < 1e-6);
        assert_eq!(candidate.confidence, 1.0);
        assert_eq!(candidate.accepted_count, 5);
    }

    #[test]
    fn test_detect_ignores_non_accepted() {
        let detector = BuildIdentityDetector::new();
        let mut history = accepted_history(&["melee"]);
        history.push(explicitly_ignored("stealth", 5));
        history.push(explicitly_ignored("stealth", 5));

        let candidate = detector.detect_anchor(&history);
        assert_eq!(candidate.dominant_theme, Some(Theme::new("melee")));
        assert_eq!(candidate.accepted_count, 1);
        assert_eq!(candidate.consistency, 1.0);
    }

    #[test]
    fn test_detect_empty_without_accepts() {
        let detector = BuildIdentityDetector::new();
        let history = vec![explicitly_ignored("melee", 5)];

        let candidate = detector.detect_anchor(&history);
        assert!(candidate.archetype.is_none());
        assert!(candidate.dominant_theme.is_none());
        assert_eq!(candidate.consistency, 0.0);
    }

    #[test]
    fn test_detect_unmapped_dominant_has_no_archetype() {
        let detector = BuildIdentityDetector::new();
        let history = accepted_history(&["gardening", "gardening", "gardening"]);

        let candidate = detector.detect_anchor(&history);
        assert!(candidate.archetype.is_none());
        assert_eq!(candidate.dominant_theme, Some(Theme::new("gardening")));
        assert_eq!(candidate.consistency, 1.0);
    }

    #[test]
    fn test_none_to_proposed_captures_evidence() {
        let detector = BuildIdentityDetector::new();
        let history =
            accepted_history(&["stealth", "stealth", "stealth", "melee", "stealth"]);

        let decision = detector.determine_next_state(&Anchor::none(), &history, 6);
        assert!(decision.transitioned);
        assert_eq!(decision.new_state, AnchorState::Proposed);
        assert_eq!(decision.anchor.detected_at, Some(6));

        let evidence = decision.anchor.evidence.expect("evidence captured");
        assert_eq!(evidence.accepted_count, 5);
        assert_eq!(evidence.dominant_count, 4);
        assert_eq!(evidence.dominant_theme, Theme::new("stealth"));
    }

    #[test]
    fn test_none_stays_below_propose_threshold() {
        let detector = BuildIdentityDetector::new();
        // Dominant share 0.5: below the 0.60 propose threshold.
        let history = accepted_history(&["stealth", "stealth", "melee", "tech"]);

        let decision = detector.determine_next_state(&Anchor::none(), &history, 6);
        assert!(!decision.transitioned);
        assert_eq!(decision.new_state, AnchorState::None);
    }

    #[test]
    fn test_none_stays_when_dominant_is_unmapped() {
        let detector = BuildIdentityDetector::new();
        let history = accepted_history(&["gardening", "gardening", "gardening"]);

        let decision = detector.determine_next_state(&Anchor::none(), &history, 6);
        assert_eq!(decision.new_state, AnchorState::None);
    }

    #[test]
    fn test_proposed_never_promotes_automatically() {
        let detector = BuildIdentityDetector::new();
        let history = accepted_history(&["stealth"; 10]);
        let mut anchor = Anchor::none();

        // Propose, then keep evaluating perfect consistency for a while.
        anchor = detector.determine_next_state(&anchor, &history, 6).anchor;
        assert_eq!(anchor.state, AnchorState::Proposed);
        for level in 7..20 {
            let decision = detector.determine_next_state(&anchor, &history, level);
            assert_eq!(decision.new_state, AnchorState::Proposed);
            anchor = decision.anchor;
        }
    }

    #[test]
    fn test_proposed_demotes_below_threshold() {
        let detector = BuildIdentityDetector::new();
        let proposed = detector
            .determine_next_state(&Anchor::none(), &accepted_history(&["stealth"; 5]), 6)
            .anchor;

        // Dominant share drops to 0.4.
        let drifted = accepted_history(&["stealth", "stealth", "melee", "tech", "piloting"]);
        let decision = detector.determine_next_state(&proposed, &drifted, 8);

        assert!(decision.transitioned);
        assert_eq!(decision.new_state, AnchorState::None);
        assert!(decision.anchor.archetype.is_none());
    }

    #[test]
    fn test_proposed_refreshes_consistency() {
        let detector = BuildIdentityDetector::new();
        let proposed = detector
            .determine_next_state(&Anchor::none(), &accepted_history(&["stealth"; 5]), 6)
            .anchor;
        assert_eq!(proposed.consistency, 1.0);

        let softened =
            accepted_history(&["stealth", "stealth", "stealth", "melee", "tech"]);
        let decision = detector.determine_next_state(&proposed, &softened, 7);

        assert!(!decision.transitioned);
        assert!((decision.anchor.consistency - 0.6).abs() < 1e-6);
        assert_eq!(decision.anchor.detected_at, Some(6));
    }

    #[test]
    fn test_locked_weakens_below_threshold() {
        let detector = BuildIdentityDetector::new();
        let anchor = locked("Infiltrator", 0.8);

        // 3/10 accepted entries map to Infiltrator (stealth, survival do).
        let mut themes = vec!["stealth", "survival", "stealth"];
        themes.extend(vec!["melee"; 7]);
        let decision = detector.determine_next_state(&anchor, &accepted_history(&themes), 9);

        assert!(decision.transitioned);
        assert_eq!(decision.new_state, AnchorState::Weakening);
        assert_eq!(decision.anchor.weakening_start_level, Some(9));
        assert!((decision.anchor.consistency - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_locked_holds_at_threshold() {
        let detector = BuildIdentityDetector::new();
        let anchor = locked("Infiltrator", 0.8);

        // Exactly 0.4: not below the weaken threshold.
        let mut themes = vec!["stealth", "stealth"];
        themes.extend(vec!["melee"; 3]);
        let decision = detector.determine_next_state(&anchor, &accepted_history(&themes), 9);

        assert!(!decision.transitioned);
        assert_eq!(decision.new_state, AnchorState::Locked);
    }

    #[test]
    fn test_weakening_relocks_on_recovery() {
        let detector = BuildIdentityDetector::new();
        let mut anchor = locked("Infiltrator", 0.3);
        anchor.state = AnchorState::Weakening;
        anchor.weakening_start_level = Some(9);

        let decision =
            detector.determine_next_state(&anchor, &accepted_history(&["stealth"; 5]), 10);

        assert!(decision.transitioned);
        assert_eq!(decision.new_state, AnchorState::Locked);
        assert!(decision.anchor.weakening_start_level.is_none());
    }

    #[test]
    fn test_weakening_releases_only_after_sustain() {
        let detector = BuildIdentityDetector::new();
        let mut anchor = locked("Infiltrator", 0.2);
        anchor.state = AnchorState::Weakening;
        anchor.weakening_start_level = Some(9);

        let off_build = accepted_history(&["melee"; 8]);

        // Two levels in: too early even at zero consistency.
        let early = detector.determine_next_state(&anchor, &off_build, 11);
        assert_eq!(early.new_state, AnchorState::Weakening);

        // Three levels in with consistency below the release threshold.
        let released = detector.determine_next_state(&anchor, &off_build, 12);
        assert!(released.transitioned);
        assert_eq!(released.new_state, AnchorState::Released);
        assert_eq!(released.anchor.released_at, Some(12));
    }

    #[test]
    fn test_weakening_holds_when_consistency_not_low_enough() {
        let detector = BuildIdentityDetector::new();
        let mut anchor = locked("Infiltrator", 0.35);
        anchor.state = AnchorState::Weakening;
        anchor.weakening_start_level = Some(5);

        // Consistency 0.35: weak, but above the 0.30 release threshold.
        let mut themes = vec!["stealth"; 7];
        themes.extend(vec!["melee"; 13]);
        let history = accepted_history(&themes);
        let decision = detector.determine_next_state(&anchor, &history, 20);

        assert_eq!(decision.new_state, AnchorState::Weakening);
    }

    #[test]
    fn test_released_resets_to_none() {
        let detector = BuildIdentityDetector::new();
        let mut anchor = locked("Infiltrator", 0.1);
        anchor.state = AnchorState::Released;
        anchor.released_at = Some(12);

        let decision = detector.determine_next_state(&anchor, &[], 13);
        assert!(decision.transitioned);
        assert_eq!(decision.new_state, AnchorState::None);
        assert_eq!(decision.anchor, Anchor::none());
    }

    #[test]
    fn test_determine_next_state_is_pure() {
        let detector = BuildIdentityDetector::new();
        let history =
            accepted_history(&["stealth", "stealth", "stealth", "melee", "stealth"]);
        let anchor = locked("Infiltrator", 0.8);

        let first = detector.determine_next_state(&anchor, &history, 9);
        let second = detector.determine_next_state(&anchor, &history, 9);
        assert_eq!(first, second);
    }
}
