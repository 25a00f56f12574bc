//! Lot-Resident Reconciliation
//!
//! A subdivision is organised as Phase → Block → Lot. Residents are registered
//! separately, and each lot may point at its occupant through
//! `assigned_resident_id`. Older records predate that link and only carry a
//! free-text lot label on the resident (`"Lot 2"`).
//!
//! # Resolution
//!
//! The assignment link is **authoritative**. The legacy label is consulted
//! only for lots with no assignment at all:
//!
//! ```text
//! assigned_resident_id present  → resident found?  Assigned : Ghost
//! assigned_resident_id absent   → one label match? Legacy   : Vacant
//!                                  several matches? Ambiguous
//! ```
//!
//! A **ghost** is a lot pointing at a resident that no longer exists. It is a
//! data-integrity problem, never an empty lot, and it blocks the label
//! fallback.
//!
//! # Mutation Safety
//!
//! [`MutationGuard`] decides whether a structural change may proceed, needs
//! the operator's confirmation, or must be refused. Deleting a lot with a real
//! occupant needs confirmation; deleting a ghost-assigned lot does not.
//! Creating lots never overwrites existing numbers.
//!
//! Everything here is pure and synchronous. Callers fetch snapshots of lots
//! and residents and hand them in.

mod error;
mod guard;
mod identity;
pub mod label;
mod model;
mod ordering;
mod range;
mod reconcile;
mod scope;
mod search;
mod warning;

pub use error::{Error, Result};
pub use guard::{ConfirmReason, Decision, Mutation, MutationGuard, RejectReason};
pub use identity::IdentityIndex;
pub use model::{
    Block, BlockId, Lot, LotId, LotNo, OccupancyStatus, Phase, PhaseId, ResidencyType, Resident,
    ResidentId, Scope, MAX_LOT_NO,
};
pub use ordering::{duplicate_lot_numbers, sort_lots};
pub use range::{plan_lot_range, LotRange, RangePlan};
pub use reconcile::{reconcile, Occupancy, ReconciledLot, Reconciler, Reconciliation};
pub use scope::{ViewScope, DEFAULT_BLOCK, DEFAULT_PHASE};
pub use search::ResidentQuery;
pub use warning::Warning;
