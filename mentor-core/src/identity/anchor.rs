//! Anchor records: the persisted best-guess of a committed build identity.

use crate::config::{Archetype, Theme};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of an anchor.
///
/// `None -> Proposed -> Locked <-> Weakening -> Released -> None`; the
/// Proposed -> Locked edge exists only through an explicit player confirm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorState {
    /// No working hypothesis.
    #[default]
    None,
    /// A hypothesis strong enough to surface, awaiting player confirmation.
    Proposed,
    /// Confirmed by the player; recommendations may lean on it.
    Locked,
    /// A locked identity the recent history no longer supports.
    Weakening,
    /// Released after sustained weakening; transient for one evaluation.
    Released,
}

impl AnchorState {
    /// Display name for this state.
    pub fn name(&self) -> &'static str {
        match self {
            AnchorState::None => "None",
            AnchorState::Proposed => "Proposed",
            AnchorState::Locked => "Locked",
            AnchorState::Weakening => "Weakening",
            AnchorState::Released => "Released",
        }
    }

    /// Whether the anchor currently carries an identity hypothesis.
    pub fn has_identity(&self) -> bool {
        !matches!(self, AnchorState::None)
    }

    /// Whether the anchor is player-confirmed (locked or weakening).
    pub fn is_committed(&self) -> bool {
        matches!(self, AnchorState::Locked | AnchorState::Weakening)
    }
}

/// Which anchor slot a record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorPosition {
    Primary,
    Secondary,
}

impl AnchorPosition {
    /// Display name for this position.
    pub fn name(&self) -> &'static str {
        match self {
            AnchorPosition::Primary => "Primary",
            AnchorPosition::Secondary => "Secondary",
        }
    }
}

/// The history snapshot that justified a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorEvidence {
    /// Accepted entries in the window at detection time.
    pub accepted_count: usize,
    /// How many of them carried the dominant theme.
    pub dominant_count: usize,
    /// The dominant theme itself.
    pub dominant_theme: Theme,
    /// Accepted-entry counts per theme.
    pub theme_counts: HashMap<Theme, usize>,
}

/// One anchor slot: identity hypothesis plus lifecycle bookkeeping.
///
/// All lifecycle stamps are character levels; the level is the subsystem's
/// recency clock, and level stamps keep the detector a pure function of its
/// inputs. Invariant: `archetype` is `Some` exactly when `state` carries an
/// identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Lifecycle state.
    pub state: AnchorState,
    /// Inferred archetype; `None` only in the `None` state.
    pub archetype: Option<Archetype>,
    /// Fraction of relevant history matching the dominant/anchored theme.
    pub consistency: f32,
    /// Detection confidence.
    pub confidence: f32,
    /// Snapshot that justified the detection.
    pub evidence: Option<AnchorEvidence>,
    /// Level at which the hypothesis was first proposed.
    pub detected_at: Option<u32>,
    /// Level at which the player confirmed it.
    pub confirmed_at: Option<u32>,
    /// Who confirmed it (player action source).
    pub confirmed_by: Option<String>,
    /// Level at which weakening began.
    pub weakening_start_level: Option<u32>,
    /// Level at which the anchor was released.
    pub released_at: Option<u32>,
}

impl Anchor {
    /// An empty anchor in the `None` state.
    pub fn none() -> Self {
        Self::default()
    }

    /// Reset this anchor back to the `None` state, dropping the hypothesis.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether recommendations may currently lean on this anchor.
    pub fn is_locked(&self) -> bool {
        self.state == AnchorState::Locked
    }
}

/// Both anchor slots for one character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorSlots {
    #[serde(default)]
    pub primary: Anchor,
    #[serde(default)]
    pub secondary: Anchor,
}

impl AnchorSlots {
    /// The anchor in the given position.
    pub fn get(&self, position: AnchorPosition) -> &Anchor {
        match position {
            AnchorPosition::Primary => &self.primary,
            AnchorPosition::Secondary => &self.secondary,
        }
    }

    /// Mutable access to the anchor in the given position.
    pub fn get_mut(&mut self, position: AnchorPosition) -> &mut Anchor {
        match position {
            AnchorPosition::Primary => &mut self.primary,
            AnchorPosition::Secondary => &mut self.secondary,
        }
    }
}

/// One line of the anchor audit trail.
///
/// The trail is diagnostic input only and deliberately unbounded; nothing
/// in the state machines reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorAuditEntry {
    /// Character level at the transition.
    pub at_level: u32,
    /// Which slot changed.
    pub position: AnchorPosition,
    /// State before.
    pub from_state: AnchorState,
    /// State after.
    pub to_state: AnchorState,
    /// Archetype after the transition, if any.
    pub archetype: Option<Archetype>,
    /// Consistency at the transition.
    pub consistency: f32,
    /// Optional annotation (confirm source, reject reason).
    pub note: Option<String>,
    /// Epoch seconds when written.
    pub recorded_at: u64,
}
