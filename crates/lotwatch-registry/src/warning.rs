//! Data-integrity findings.
//!
//! None of these stop reconciliation. They are reported alongside the
//! result so an operator can repair the underlying records.

use crate::model::{LotId, LotNo, ResidentId, Scope};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Two resident records share an id; the later one is indexed.
    DuplicateResidentId { resident_id: ResidentId },
    /// Two or more lots in one scope share a lot number.
    DuplicateLotNo { scope: Scope, lot_no: LotNo, count: usize },
    /// A lot references a resident that does not exist.
    GhostAssignment { lot_id: LotId, resident_id: ResidentId },
    /// Several residents carry the same legacy lot label.
    AmbiguousFallback { lot_id: LotId, candidates: Vec<ResidentId> },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DuplicateResidentId { resident_id } => {
                write!(f, "duplicate resident id {}", resident_id)
            }
            Warning::DuplicateLotNo { scope, lot_no, count } => {
                write!(f, "lot number {} appears {} times in {}", lot_no, count, scope)
            }
            Warning::GhostAssignment { lot_id, resident_id } => {
                write!(f, "lot {} is assigned to missing resident {}", lot_id, resident_id)
            }
            Warning::AmbiguousFallback { lot_id, candidates } => {
                let ids: Vec<&str> = candidates.iter().map(|c| c.as_str()).collect();
                write!(
                    f,
                    "lot {} matches several residents by label: {}",
                    lot_id,
                    ids.join(", ")
                )
            }
        }
    }
}
