//! Persistence adapter for anchor records.
//!
//! Owns the canonical anchor slots and delegates every lifecycle decision
//! to the detector. All writes go through the shared read-fresh,
//! write-through mutation path; reads degrade to defaults so a storage
//! hiccup costs a suggestion bias, never a crash.

use super::anchor::{Anchor, AnchorAuditEntry, AnchorPosition, AnchorState};
use super::detector::AnchorDecision;
use crate::history::now_secs;
use crate::store::{load_record, update_record, CharacterId, RecordStore, StoreError};
use std::sync::Arc;
use tracing::warn;

/// Persistence adapter owning the canonical anchor records.
pub struct AnchorRepository {
    store: Arc<dyn RecordStore>,
}

impl AnchorRepository {
    /// Create a repository over the given store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create the two-position skeleton if absent. Idempotent.
    pub fn initialize_storage(&self, character: &CharacterId) -> Result<(), StoreError> {
        update_record(self.store.as_ref(), character, |_record| ())
    }

    /// The anchor in the given position; `None` when nothing is stored or
    /// the store cannot be read.
    pub fn anchor(&self, character: &CharacterId, position: AnchorPosition) -> Option<Anchor> {
        let record = match self.store.load(character) {
            Ok(Some(record)) => match record.migrate() {
                Ok(record) => record,
                Err(err) => {
                    warn!("anchor read for {} ignoring bad record: {}", character, err);
                    return None;
                }
            },
            Ok(None) => return None,
            Err(err) => {
                warn!("anchor read failed for {}: {}", character, err);
                return None;
            }
        };
        Some(record.anchors.get(position).clone())
    }

    /// The primary anchor, if stored.
    pub fn primary_anchor(&self, character: &CharacterId) -> Option<Anchor> {
        self.anchor(character, AnchorPosition::Primary)
    }

    /// The secondary anchor, if stored.
    pub fn secondary_anchor(&self, character: &CharacterId) -> Option<Anchor> {
        self.anchor(character, AnchorPosition::Secondary)
    }

    /// Overwrite an anchor slot through the shared mutation path.
    pub fn update_anchor(
        &self,
        character: &CharacterId,
        position: AnchorPosition,
        anchor: Anchor,
    ) -> Result<Anchor, StoreError> {
        update_record(self.store.as_ref(), character, |record| {
            *record.anchors.get_mut(position) = anchor.clone();
            anchor.clone()
        })
    }

    /// Commit a detector decision, auditing the transition if any.
    pub fn apply_decision(
        &self,
        character: &CharacterId,
        position: AnchorPosition,
        decision: &AnchorDecision,
        current_level: u32,
    ) -> Result<Anchor, StoreError> {
        update_record(self.store.as_ref(), character, |record| {
            *record.anchors.get_mut(position) = decision.anchor.clone();
            if decision.transitioned {
                record.anchor_log.push(AnchorAuditEntry {
                    at_level: current_level,
                    position,
                    from_state: decision.previous_state,
                    to_state: decision.new_state,
                    archetype: decision.anchor.archetype.clone(),
                    consistency: decision.anchor.consistency,
                    note: None,
                    recorded_at: now_secs(),
                });
            }
            decision.anchor.clone()
        })
    }

    /// Lock in a proposed anchor; the only Proposed -> Locked path.
    ///
    /// A confirm against any other state is refused (logged, anchor
    /// returned unchanged): the player can only commit to a hypothesis the
    /// detector actually proposed.
    pub fn confirm_anchor(
        &self,
        character: &CharacterId,
        position: AnchorPosition,
        confirmed_by: impl Into<String>,
        current_level: u32,
    ) -> Result<Anchor, StoreError> {
        let confirmed_by = confirmed_by.into();
        update_record(self.store.as_ref(), character, |record| {
            let anchor = record.anchors.get_mut(position);
            if anchor.state != AnchorState::Proposed {
                warn!(
                    "confirm_anchor for {} refused: {} slot is {}",
                    character,
                    position.name(),
                    anchor.state.name()
                );
                return anchor.clone();
            }

            anchor.state = AnchorState::Locked;
            anchor.confirmed_at = Some(current_level);
            anchor.confirmed_by = Some(confirmed_by.clone());
            let committed = anchor.clone();

            record.anchor_log.push(AnchorAuditEntry {
                at_level: current_level,
                position,
                from_state: AnchorState::Proposed,
                to_state: AnchorState::Locked,
                archetype: committed.archetype.clone(),
                consistency: committed.consistency,
                note: Some(format!("confirmed by {confirmed_by}")),
                recorded_at: now_secs(),
            });
            committed
        })
    }

    /// Reset an anchor slot to None after a "not me" player action.
    pub fn reject_anchor(
        &self,
        character: &CharacterId,
        position: AnchorPosition,
        current_level: u32,
    ) -> Result<Anchor, StoreError> {
        update_record(self.store.as_ref(), character, |record| {
            let anchor = record.anchors.get_mut(position);
            let from_state = anchor.state;
            let archetype = anchor.archetype.clone();
            let consistency = anchor.consistency;
            anchor.reset();

            if from_state != AnchorState::None {
                record.anchor_log.push(AnchorAuditEntry {
                    at_level: current_level,
                    position,
                    from_state,
                    to_state: AnchorState::None,
                    archetype,
                    consistency,
                    note: Some("rejected by player".to_string()),
                    recorded_at: now_secs(),
                });
            }
            anchor.clone()
        })
    }

    /// Append a diagnostic entry to the anchor audit trail.
    ///
    /// The trail is unbounded by design: it is diagnostic output, never an
    /// algorithmic input.
    pub fn record_anchor_history(
        &self,
        character: &CharacterId,
        entry: AnchorAuditEntry,
    ) -> Result<(), StoreError> {
        update_record(self.store.as_ref(), character, |record| {
            record.anchor_log.push(entry);
        })
    }

    /// The anchor audit trail, oldest first. Empty on read failure.
    pub fn anchor_history(&self, character: &CharacterId) -> Vec<AnchorAuditEntry> {
        match load_record(self.store.as_ref(), character) {
            Ok(record) => record.anchor_log,
            Err(err) => {
                warn!("anchor history read failed for {}: {}", character, err);
                Vec::new()
            }
        }
    }
}
