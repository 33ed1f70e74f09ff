//! Persistence adapter for pivot state.

use super::logic::{PivotAuditEntry, PivotDecision, PivotPhase, PivotSnapshot};
use crate::config::DetectionConfig;
use crate::history::now_secs;
use crate::store::{load_record, update_record, CharacterId, RecordStore, StoreError};
use std::sync::Arc;
use tracing::warn;

/// Persistence adapter owning the canonical pivot state.
pub struct PivotStateManager {
    store: Arc<dyn RecordStore>,
    config: DetectionConfig,
}

impl PivotStateManager {
    /// Create a manager over the given store with default tuning.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_config(store, DetectionConfig::default())
    }

    /// Create a manager with explicit tuning.
    pub fn with_config(store: Arc<dyn RecordStore>, config: DetectionConfig) -> Self {
        Self { store, config }
    }

    /// Create the pivot skeleton if absent. Idempotent.
    pub fn initialize_storage(&self, character: &CharacterId) -> Result<(), StoreError> {
        update_record(self.store.as_ref(), character, |_record| ())
    }

    /// The current pivot state; Stable when nothing is stored or the store
    /// cannot be read.
    pub fn pivot_state(&self, character: &CharacterId) -> PivotSnapshot {
        match load_record(self.store.as_ref(), character) {
            Ok(record) => record.pivot,
            Err(err) => {
                warn!("pivot read failed for {}: {}", character, err);
                PivotSnapshot::default()
            }
        }
    }

    /// Commit a pivot decision through the shared mutation path.
    ///
    /// Divergence and emerging theme are refreshed on every call;
    /// `changed_at` and `previous_state` are stamped, and an audit line
    /// written, only on an actual transition.
    pub fn update_pivot_state(
        &self,
        character: &CharacterId,
        decision: &PivotDecision,
        current_level: u32,
    ) -> Result<PivotSnapshot, StoreError> {
        let cap = self.config.pivot_log_cap;
        update_record(self.store.as_ref(), character, |record| {
            record.pivot.state = decision.next;
            record.pivot.divergence_score = decision.divergence;
            record.pivot.emerging_theme = decision.emerging_theme.clone();

            if decision.transitioned {
                record.pivot.previous_state = Some(decision.previous);
                record.pivot.changed_at = Some(current_level);
                record.pivot_log.push(PivotAuditEntry {
                    at_level: current_level,
                    from_state: decision.previous,
                    to_state: decision.next,
                    divergence: decision.divergence,
                    emerging_theme: decision.emerging_theme.clone(),
                    recorded_at: now_secs(),
                });
                while record.pivot_log.len() > cap {
                    record.pivot_log.remove(0);
                }
            }

            record.pivot.clone()
        })
    }

    /// Force the pivot state back to Stable.
    pub fn reset_to_stable(
        &self,
        character: &CharacterId,
        current_level: u32,
    ) -> Result<PivotSnapshot, StoreError> {
        let current = self.pivot_state(character);
        let decision = PivotDecision {
            previous: current.state,
            next: PivotPhase::Stable,
            divergence: 0.0,
            emerging_theme: None,
            transitioned: current.state != PivotPhase::Stable,
        };
        self.update_pivot_state(character, &decision, current_level)
    }

    /// The pivot audit ring, oldest first. Empty on read failure.
    pub fn pivot_log(&self, character: &CharacterId) -> Vec<PivotAuditEntry> {
        match load_record(self.store.as_ref(), character) {
            Ok(record) => record.pivot_log,
            Err(err) => {
                warn!("pivot log read failed for {}: {}", character, err);
                Vec::new()
            }
        }
    }
}
