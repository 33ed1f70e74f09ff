//! Aggregate metrics over the suggestion history.
//!
//! Pure calculators only: every function takes an explicit history
//! snapshot and the current level, and every output key is reconstructible
//! from entries currently in the window. Small samples fall back to a
//! neutral prior instead of over-fitting two data points.

use crate::config::{DetectionConfig, Theme};
use crate::history::{HistoryEntry, SuggestionOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Derived per-character metrics cached for the downstream ranker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    /// Acceptance rate per theme; themes without signal are absent.
    pub acceptance_rate_by_theme: HashMap<Theme, f32>,
    /// Negative ranking weights for repeatedly ignored themes.
    pub ignored_theme_weights: HashMap<Theme, f32>,
    /// Level at which these metrics were computed.
    pub last_updated_at_level: u32,
}

#[derive(Default)]
struct ThemeTally {
    shown: usize,
    accepted: usize,
    explicitly_ignored: usize,
    decayed_ignores: f32,
}

/// Pure calculator turning history into aggregate metrics.
pub struct PlayerAnalytics {
    config: DetectionConfig,
}

impl PlayerAnalytics {
    /// Create a calculator with default tuning.
    pub fn new() -> Self {
        Self::with_config(DetectionConfig::default())
    }

    /// Create a calculator with explicit tuning.
    pub fn with_config(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Compute all metrics for the given history window.
    ///
    /// Acceptance rates count only deliberate resolutions (accepted or
    /// explicitly ignored); passive ignores are too weak a signal for the
    /// denominator. A theme needs at least `min_rate_samples` deliberate
    /// resolutions before its real rate is used, gets the neutral prior
    /// with one or two, and is omitted with none.
    ///
    /// Ignore weights exist only for themes the player explicitly ignored
    /// at least `min_explicit_ignores` times. Each ignore contributes its
    /// level-age decay factor; the decayed sum is divided by the shown
    /// count (floored so a theme shown twice cannot look maximally
    /// rejected), scaled, capped, and stored negative.
    pub fn calculate_metrics(
        &self,
        history: &[HistoryEntry],
        current_level: u32,
    ) -> AggregateMetrics {
        let tallies = self.tally(history, current_level);

        let mut acceptance_rate_by_theme = HashMap::new();
        let mut ignored_theme_weights = HashMap::new();

        for (theme, tally) in tallies {
            let deliberate = tally.accepted + tally.explicitly_ignored;
            if deliberate >= self.config.min_rate_samples {
                acceptance_rate_by_theme
                    .insert(theme.clone(), tally.accepted as f32 / deliberate as f32);
            } else if deliberate > 0 {
                acceptance_rate_by_theme.insert(theme.clone(), self.config.neutral_rate);
            }

            if tally.explicitly_ignored >= self.config.min_explicit_ignores {
                let divisor = tally.shown.max(self.config.ignore_weight_floor_shown) as f32;
                let weight = (self.config.ignore_weight_scale * tally.decayed_ignores / divisor)
                    .min(self.config.ignore_weight_cap);
                ignored_theme_weights.insert(theme, -weight);
            }
        }

        AggregateMetrics {
            acceptance_rate_by_theme,
            ignored_theme_weights,
            last_updated_at_level: current_level,
        }
    }

    /// Acceptance rate across all themes, neutral below the sample floor.
    pub fn overall_acceptance_rate(&self, history: &[HistoryEntry]) -> f32 {
        let mut accepted = 0usize;
        let mut deliberate = 0usize;
        for entry in history {
            match entry.outcome {
                Some(SuggestionOutcome::Accepted) => {
                    accepted += 1;
                    deliberate += 1;
                }
                Some(SuggestionOutcome::ExplicitlyIgnored) => deliberate += 1,
                _ => {}
            }
        }

        if deliberate >= self.config.min_rate_samples {
            accepted as f32 / deliberate as f32
        } else {
            self.config.neutral_rate
        }
    }

    /// Share of shown entries per theme.
    ///
    /// Empty below the sample floor — two shown suggestions say nothing
    /// about a player's thematic spread.
    pub fn theme_distribution(&self, history: &[HistoryEntry]) -> HashMap<Theme, f32> {
        if history.len() < self.config.min_rate_samples {
            return HashMap::new();
        }

        let total = history.len() as f32;
        let mut counts: HashMap<Theme, usize> = HashMap::new();
        for entry in history {
            *counts.entry(entry.theme.clone()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(theme, count)| (theme, count as f32 / total))
            .collect()
    }

    fn tally(&self, history: &[HistoryEntry], current_level: u32) -> HashMap<Theme, ThemeTally> {
        let mut tallies: HashMap<Theme, ThemeTally> = HashMap::new();
        for entry in history {
            let tally = tallies.entry(entry.theme.clone()).or_default();
            tally.shown += 1;
            match entry.outcome {
                Some(SuggestionOutcome::Accepted) => tally.accepted += 1,
                Some(SuggestionOutcome::ExplicitlyIgnored) => {
                    tally.explicitly_ignored += 1;
                    tally.decayed_ignores +=
                        self.config.decay.factor_for(entry.level_age(current_level));
                }
                _ => {}
            }
        }
        tallies
    }
}

impl Default for PlayerAnalytics {
    fn default() -> Self {
        Self::new()
    }
}
