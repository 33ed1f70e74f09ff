//! Tuning configuration and the theme/archetype vocabulary.
//!
//! Every threshold that drives the anchor and pivot state machines lives
//! here as a named, documented value so tuning never touches state-machine
//! code. The theme-to-archetype lookup is injected configuration: both
//! state machines receive it explicitly and stay independently testable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Maximum entries kept in the rolling suggestion history.
pub const HISTORY_CAP: usize = 15;

/// Entries considered by the pivot detector (tighter than the history cap
/// so pivot reacts faster than the global window).
pub const PIVOT_WINDOW: usize = 10;

/// Minimum accepted+ignored samples before a real acceptance rate is used.
pub const MIN_RATE_SAMPLES: usize = 3;

/// Neutral prior used when a theme has 1-2 samples.
pub const NEUTRAL_RATE: f32 = 0.5;

/// Explicit ignores required before a theme earns an ignore weight.
pub const MIN_EXPLICIT_IGNORES: usize = 2;

/// Scale applied to the decayed ignore ratio.
pub const IGNORE_WEIGHT_SCALE: f32 = 0.1;

/// Floor for the shown-count divisor in the ignore weight.
pub const IGNORE_WEIGHT_FLOOR_SHOWN: usize = 5;

/// Maximum magnitude of an ignore weight.
pub const IGNORE_WEIGHT_CAP: f32 = 0.3;

/// Bonus added to consistency when deriving anchor confidence.
pub const CONFIDENCE_BONUS: f32 = 0.2;

/// Consistency needed for None -> Proposed.
pub const PROPOSE_THRESHOLD: f32 = 0.60;

/// Consistency below which a Proposed anchor falls back to None.
pub const DEMOTE_THRESHOLD: f32 = 0.50;

/// Consistency below which a Locked anchor starts Weakening.
pub const WEAKEN_THRESHOLD: f32 = 0.40;

/// Consistency at which a Weakening anchor re-locks.
pub const REANCHOR_THRESHOLD: f32 = 0.60;

/// Consistency below which a sustained Weakening anchor releases.
pub const RELEASE_THRESHOLD: f32 = 0.30;

/// Levels of sustained weakening required before release.
pub const RELEASE_SUSTAIN_LEVELS: u32 = 3;

/// Divergence at which Stable enters Exploratory.
pub const EXPLORE_ENTER: f32 = 0.30;

/// Divergence below which Exploratory (or Pivoting) returns to Stable.
pub const EXPLORE_EXIT: f32 = 0.20;

/// Divergence above which Exploratory enters Pivoting.
pub const PIVOT_ENTER: f32 = 0.60;

/// Divergence below which Pivoting drops back to Exploratory.
pub const PIVOT_EXIT: f32 = 0.40;

/// Minimum confidence floor enforced while Exploratory.
pub const EXPLORATORY_FLOOR: f32 = 0.1;

/// Minimum confidence floor enforced while Pivoting.
pub const PIVOTING_FLOOR: f32 = 0.05;

/// Entries retained in the pivot audit ring buffer.
pub const PIVOT_LOG_CAP: usize = 20;

/// Level-age bands for recency decay of ignore signal.
///
/// An entry's age is `current_level - level_at_shown`; the band it falls in
/// scales its contribution to the decayed ignore count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayBands {
    /// Inclusive upper bound of the full-strength band.
    pub recent_max_age: u32,
    /// Inclusive upper bound of the half-strength band.
    pub mid_max_age: u32,
    /// Factor for ages within the recent band.
    pub recent_factor: f32,
    /// Factor for ages within the mid band.
    pub mid_factor: f32,
    /// Factor for ages past the mid band.
    pub stale_factor: f32,
}

impl DecayBands {
    /// Decay factor for a signal aged the given number of levels.
    pub fn factor_for(&self, age: u32) -> f32 {
        if age <= self.recent_max_age {
            self.recent_factor
        } else if age <= self.mid_max_age {
            self.mid_factor
        } else {
            self.stale_factor
        }
    }
}

impl Default for DecayBands {
    fn default() -> Self {
        Self {
            recent_max_age: 3,
            mid_max_age: 6,
            recent_factor: 1.0,
            mid_factor: 0.5,
            stale_factor: 0.25,
        }
    }
}

/// All tunable thresholds for history, analytics, and both state machines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Rolling history window size (FIFO eviction beyond this).
    pub history_cap: usize,
    /// Recency window used by the pivot detector.
    pub pivot_window: usize,
    /// Samples required before a computed acceptance rate is trusted.
    pub min_rate_samples: usize,
    /// Neutral prior returned below the sample threshold.
    pub neutral_rate: f32,
    /// Explicit ignores required before a theme earns an ignore weight.
    pub min_explicit_ignores: usize,
    /// Recency decay bands for the ignore signal.
    pub decay: DecayBands,
    /// Scale applied to the decayed ignore ratio.
    pub ignore_weight_scale: f32,
    /// Floor for the shown-count divisor in the ignore weight.
    pub ignore_weight_floor_shown: usize,
    /// Maximum magnitude of an ignore weight.
    pub ignore_weight_cap: f32,
    /// Bonus added to consistency when deriving anchor confidence.
    pub confidence_bonus: f32,
    /// Consistency needed for None -> Proposed.
    pub propose_threshold: f32,
    /// Consistency below which a Proposed anchor falls back to None.
    pub demote_threshold: f32,
    /// Consistency below which a Locked anchor starts Weakening.
    pub weaken_threshold: f32,
    /// Consistency at which a Weakening anchor re-locks.
    pub reanchor_threshold: f32,
    /// Consistency below which a sustained Weakening anchor releases.
    pub release_threshold: f32,
    /// Levels of sustained weakening required before release.
    pub release_sustain_levels: u32,
    /// Divergence at which Stable enters Exploratory.
    pub explore_enter: f32,
    /// Divergence below which Exploratory or Pivoting returns to Stable.
    pub explore_exit: f32,
    /// Divergence above which Exploratory enters Pivoting.
    pub pivot_enter: f32,
    /// Divergence below which Pivoting drops back to Exploratory.
    pub pivot_exit: f32,
    /// Minimum confidence floor enforced while Exploratory.
    pub exploratory_floor: f32,
    /// Minimum confidence floor enforced while Pivoting.
    pub pivoting_floor: f32,
    /// Entries retained in the pivot audit ring buffer.
    pub pivot_log_cap: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            history_cap: HISTORY_CAP,
            pivot_window: PIVOT_WINDOW,
            min_rate_samples: MIN_RATE_SAMPLES,
            neutral_rate: NEUTRAL_RATE,
            min_explicit_ignores: MIN_EXPLICIT_IGNORES,
            decay: DecayBands::default(),
            ignore_weight_scale: IGNORE_WEIGHT_SCALE,
            ignore_weight_floor_shown: IGNORE_WEIGHT_FLOOR_SHOWN,
            ignore_weight_cap: IGNORE_WEIGHT_CAP,
            confidence_bonus: CONFIDENCE_BONUS,
            propose_threshold: PROPOSE_THRESHOLD,
            demote_threshold: DEMOTE_THRESHOLD,
            weaken_threshold: WEAKEN_THRESHOLD,
            reanchor_threshold: REANCHOR_THRESHOLD,
            release_threshold: RELEASE_THRESHOLD,
            release_sustain_levels: RELEASE_SUSTAIN_LEVELS,
            explore_enter: EXPLORE_ENTER,
            explore_exit: EXPLORE_EXIT,
            pivot_enter: PIVOT_ENTER,
            pivot_exit: PIVOT_EXIT,
            exploratory_floor: EXPLORATORY_FLOOR,
            pivoting_floor: PIVOTING_FLOOR,
            pivot_log_cap: PIVOT_LOG_CAP,
        }
    }
}

/// Categorical tag on a suggested item; the unit of pattern detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Theme(String);

impl Theme {
    /// Create a theme tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The theme name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Theme {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A canonical named build identity inferred from thematic patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Archetype(String);

impl Archetype {
    /// Create an archetype label.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The archetype name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Archetype {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Immutable theme-to-archetype lookup.
///
/// A theme maps to one or more archetypes; the first is the canonical one
/// used when detecting an anchor. Unmapped themes contribute no archetype
/// and count as off-theme for divergence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeTable {
    map: HashMap<Theme, Vec<Archetype>>,
}

impl ArchetypeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a theme with its archetypes (first is canonical).
    pub fn with_mapping(
        mut self,
        theme: impl Into<String>,
        archetypes: &[&str],
    ) -> Self {
        self.map.insert(
            Theme::new(theme),
            archetypes.iter().map(|a| Archetype::new(*a)).collect(),
        );
        self
    }

    /// The canonical archetype for a theme, if mapped.
    pub fn canonical(&self, theme: &Theme) -> Option<&Archetype> {
        self.map.get(theme).and_then(|a| a.first())
    }

    /// All archetypes a theme maps to (empty when unmapped).
    pub fn archetypes_for(&self, theme: &Theme) -> &[Archetype] {
        self.map.get(theme).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the theme maps to the given archetype.
    pub fn maps_to(&self, theme: &Theme, archetype: &Archetype) -> bool {
        self.archetypes_for(theme).contains(archetype)
    }

    /// Number of mapped themes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the table has no mappings.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The builtin mapping shipped with the tool.
    pub fn builtin() -> Self {
        BUILTIN_ARCHETYPES.clone()
    }
}

lazy_static::lazy_static! {
    static ref BUILTIN_ARCHETYPES: ArchetypeTable = ArchetypeTable::new()
        .with_mapping("stealth", &["Infiltrator", "Saboteur"])
        .with_mapping("marksmanship", &["Sharpshooter"])
        .with_mapping("melee", &["Duelist"])
        .with_mapping("demolitions", &["Saboteur"])
        .with_mapping("tech", &["Engineer", "Saboteur"])
        .with_mapping("droid-engineering", &["Engineer"])
        .with_mapping("piloting", &["Ace"])
        .with_mapping("medicine", &["Field Medic"])
        .with_mapping("leadership", &["Commander"])
        .with_mapping("survival", &["Pathfinder", "Infiltrator"]);
}
