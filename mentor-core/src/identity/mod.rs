//! Build identity: anchor records, detection, and persistence.
//!
//! The detector is a pure evaluator over history snapshots; the repository
//! owns the canonical records and commits the detector's decisions.

mod anchor;
mod detector;
mod repository;

pub use anchor::{
    Anchor, AnchorAuditEntry, AnchorEvidence, AnchorPosition, AnchorSlots, AnchorState,
};
pub use detector::{AnchorCandidate, AnchorDecision, BuildIdentityDetector};
pub use repository::AnchorRepository;
