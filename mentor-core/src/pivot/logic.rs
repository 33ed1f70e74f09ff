//! Pivot detection: divergence of recent behavior from the locked anchor.

use crate::config::{ArchetypeTable, DetectionConfig, Theme};
use crate::history::HistoryEntry;
use crate::identity::Anchor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stability state of a character's build direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotPhase {
    /// Recent behavior agrees with the locked identity.
    #[default]
    Stable,
    /// The player is sampling outside the identity, or none is locked.
    Exploratory,
    /// Sustained movement toward a different theme.
    Pivoting,
}

impl PivotPhase {
    /// Display name for this phase.
    pub fn name(&self) -> &'static str {
        match self {
            PivotPhase::Stable => "Stable",
            PivotPhase::Exploratory => "Exploratory",
            PivotPhase::Pivoting => "Pivoting",
        }
    }
}

/// Persisted pivot state for one character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotSnapshot {
    /// Current phase.
    pub state: PivotPhase,
    /// Most recent divergence score.
    pub divergence_score: f32,
    /// Dominant off-theme theme; `Some` only in Exploratory/Pivoting.
    pub emerging_theme: Option<Theme>,
    /// Level of the last phase change.
    pub changed_at: Option<u32>,
    /// Phase before the last change.
    pub previous_state: Option<PivotPhase>,
}

/// One line of the pivot audit ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotAuditEntry {
    /// Character level at the transition.
    pub at_level: u32,
    /// Phase before.
    pub from_state: PivotPhase,
    /// Phase after.
    pub to_state: PivotPhase,
    /// Divergence at the transition.
    pub divergence: f32,
    /// Emerging theme at the transition, if any.
    pub emerging_theme: Option<Theme>,
    /// Epoch seconds when written.
    pub recorded_at: u64,
}

/// Outcome of one pivot evaluation; the manager commits it.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotDecision {
    /// Phase going in.
    pub previous: PivotPhase,
    /// Phase coming out.
    pub next: PivotPhase,
    /// Divergence over the recency window.
    pub divergence: f32,
    /// Dominant off-theme theme for the next phase, if it keeps one.
    pub emerging_theme: Option<Theme>,
    /// Whether the phase actually changed.
    pub transitioned: bool,
}

/// Pure evaluator for the pivot state machine.
///
/// Takes explicit snapshots and returns a decision; nothing here touches
/// storage, so concurrent evaluations for different characters never
/// interfere.
pub struct PivotLogic {
    config: DetectionConfig,
    archetypes: ArchetypeTable,
}

impl PivotLogic {
    /// Create an evaluator with default tuning and the builtin table.
    pub fn new() -> Self {
        Self::with_config(DetectionConfig::default(), ArchetypeTable::builtin())
    }

    /// Create an evaluator with explicit tuning and mapping.
    pub fn with_config(config: DetectionConfig, archetypes: ArchetypeTable) -> Self {
        Self { config, archetypes }
    }

    /// Evaluate the pivot state machine for one character.
    ///
    /// Without a locked anchor there is no identity to diverge from, so the
    /// phase is forced to Exploratory (transitioning only if not already
    /// there). Otherwise divergence is computed over the most recent
    /// entries — a tighter window than the global history cap, so pivot
    /// reacts faster — and the phase steps at most one hop per evaluation:
    /// Pivoting is reachable only from Exploratory, never straight from
    /// Stable.
    pub fn calculate_pivot_state(
        &self,
        primary_anchor: Option<&Anchor>,
        current: &PivotSnapshot,
        history: &[HistoryEntry],
    ) -> PivotDecision {
        let anchored = primary_anchor.filter(|a| a.is_locked());

        let Some(anchor) = anchored else {
            // Undefined identity implies exploration.
            return PivotDecision {
                previous: current.state,
                next: PivotPhase::Exploratory,
                divergence: 0.0,
                emerging_theme: None,
                transitioned: current.state != PivotPhase::Exploratory,
            };
        };

        let (divergence, emerging) = self.divergence(anchor, history);

        let next = match current.state {
            PivotPhase::Stable => {
                if divergence >= self.config.explore_enter {
                    PivotPhase::Exploratory
                } else {
                    PivotPhase::Stable
                }
            }
            PivotPhase::Exploratory => {
                if divergence < self.config.explore_exit {
                    PivotPhase::Stable
                } else if divergence > self.config.pivot_enter && emerging.is_some() {
                    PivotPhase::Pivoting
                } else {
                    PivotPhase::Exploratory
                }
            }
            PivotPhase::Pivoting => {
                if divergence < self.config.explore_exit {
                    PivotPhase::Stable
                } else if divergence < self.config.pivot_exit {
                    PivotPhase::Exploratory
                } else {
                    PivotPhase::Pivoting
                }
            }
        };

        PivotDecision {
            previous: current.state,
            next,
            divergence,
            emerging_theme: match next {
                PivotPhase::Stable => None,
                _ => emerging,
            },
            transitioned: next != current.state,
        }
    }

    /// Divergence of the recency window from the anchored archetype.
    ///
    /// An entry is off-theme when the anchor's archetype is not among the
    /// archetypes its theme maps to; unmapped themes are always off-theme.
    /// Returns the off-theme fraction and the single most frequent
    /// off-theme theme (ties broken by name for determinism).
    pub fn divergence(
        &self,
        anchor: &Anchor,
        history: &[HistoryEntry],
    ) -> (f32, Option<Theme>) {
        let Some(archetype) = anchor.archetype.as_ref() else {
            return (0.0, None);
        };

        let window_start = history.len().saturating_sub(self.config.pivot_window);
        let window = &history[window_start..];
        if window.is_empty() {
            return (0.0, None);
        }

        let mut off_theme = 0usize;
        let mut off_counts: HashMap<&Theme, usize> = HashMap::new();
        for entry in window {
            if !self.archetypes.maps_to(&entry.theme, archetype) {
                off_theme += 1;
                *off_counts.entry(&entry.theme).or_insert(0) += 1;
            }
        }

        let divergence = off_theme as f32 / window.len() as f32;
        let emerging = off_counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(theme, _)| theme.clone());

        (divergence, emerging)
    }

    /// Confidence floor the ranker should apply in the given phase.
    ///
    /// Stable leaves the floor untouched. Exploratory raises a floor below
    /// 0.1 up to 0.1 and never lowers an already-higher value; Pivoting
    /// relaxes the raise target further, to 0.05, letting lower-confidence
    /// suggestions surface while the player changes direction.
    pub fn adjusted_confidence_floor(&self, state: PivotPhase, base_floor: f32) -> f32 {
        match state {
            PivotPhase::Stable => base_floor,
            PivotPhase::Exploratory => base_floor.max(self.config.exploratory_floor),
            PivotPhase::Pivoting => base_floor.max(self.config.pivoting_floor),
        }
    }

    /// Retain the scored suggestions that clear the phase-adjusted floor.
    ///
    /// This only shapes what the out-of-scope ranker may surface; it never
    /// feeds back into classification.
    pub fn filter_suggestions_by_state<T>(
        &self,
        state: PivotPhase,
        base_floor: f32,
        suggestions: Vec<(T, f32)>,
    ) -> Vec<(T, f32)> {
        let floor = self.adjusted_confidence_floor(state, base_floor);
        suggestions
            .into_iter()
            .filter(|(_, confidence)| *confidence >= floor)
            .collect()
    }
}

impl Default for PivotLogic {
    fn default() -> Self {
        Self::new()
    }
}
