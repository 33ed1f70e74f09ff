//! Pivot detection: divergence scoring and stability-state persistence.

mod logic;
mod manager;

pub use logic::{PivotAuditEntry, PivotDecision, PivotLogic, PivotPhase, PivotSnapshot};
pub use manager::PivotStateManager;
