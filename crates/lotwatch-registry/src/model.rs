//! Registry records: residents, lots and the phase/block hierarchy.
//!
//! Field names serialize in camelCase so stored documents keep the shape the
//! admin dashboard already writes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest lot number accepted anywhere in the registry.
pub const MAX_LOT_NO: u32 = 9999;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Opaque resident identifier.
    ResidentId
);
string_id!(
    /// Lot identifier, unique across the whole registry.
    LotId
);
string_id!(
    /// Phase identifier.
    PhaseId
);
string_id!(
    /// Block identifier, unique within its phase.
    BlockId
);

/// A lot number, always in `1..=MAX_LOT_NO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct LotNo(u32);

impl LotNo {
    /// Validate a lot number.
    pub fn new(n: u32) -> Result<Self> {
        if n == 0 || n > MAX_LOT_NO {
            return Err(Error::InvalidLotNo(n as i64));
        }
        Ok(Self(n))
    }

    /// Accept raw operator input: non-positive is rejected, large values clamp
    /// to [`MAX_LOT_NO`].
    pub fn from_input(n: i64) -> Result<Self> {
        if n <= 0 {
            return Err(Error::InvalidLotNo(n));
        }
        Ok(Self(n.min(MAX_LOT_NO as i64) as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Display label, e.g. `Lot 7`.
    pub fn label(self) -> String {
        format!("Lot {}", self.0)
    }
}

impl TryFrom<u32> for LotNo {
    type Error = Error;

    fn try_from(n: u32) -> Result<Self> {
        Self::new(n)
    }
}

impl From<LotNo> for u32 {
    fn from(n: LotNo) -> u32 {
        n.0
    }
}

impl fmt::Display for LotNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResidencyType {
    Owner,
    Renter,
}

/// Occupancy as recorded on a lot or declared by a resident.
///
/// Informational only; reconciliation never trusts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccupancyStatus {
    Occupied,
    Vacant,
}

/// A registered resident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: ResidentId,

    pub first_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,

    pub last_name: String,

    /// Legacy free-text lot label such as `Lot 2`. Only used for fallback
    /// matching of lots without an assignment.
    pub lot: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residency_type: Option<ResidencyType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy_type: Option<OccupancyStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Phase name the resident registered under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Block name the resident registered under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
}

impl Resident {
    /// Create a resident with the required fields.
    pub fn new(
        id: impl Into<ResidentId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        lot: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            middle_name: None,
            last_name: last_name.into(),
            lot: lot.into(),
            residency_type: None,
            occupancy_type: None,
            contact_number: None,
            email: None,
            phase: None,
            block: None,
        }
    }

    /// Place the resident in a phase/block by name.
    pub fn in_scope(mut self, phase: impl Into<String>, block: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self.block = Some(block.into());
        self
    }

    /// `First Middle Last`, skipping an absent middle name.
    pub fn full_name(&self) -> String {
        match self.middle_name.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(middle) => format!("{} {} {}", self.first_name, middle, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// A (phase, block) pair bounding a set of lots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub phase_id: PhaseId,
    pub block_id: BlockId,
}

impl Scope {
    pub fn new(phase_id: impl Into<PhaseId>, block_id: impl Into<BlockId>) -> Self {
        Self {
            phase_id: phase_id.into(),
            block_id: block_id.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.phase_id, self.block_id)
    }
}

/// A physical lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: LotId,

    pub phase_id: PhaseId,

    pub block_id: BlockId,

    pub lot_no: LotNo,

    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OccupancyStatus>,

    /// Authoritative occupancy link. May dangle.
    #[serde(default)]
    pub assigned_resident_id: Option<ResidentId>,

    /// Milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

impl Lot {
    /// A vacant, unassigned lot with a generated id.
    pub fn new(scope: &Scope, lot_no: LotNo) -> Self {
        Self {
            id: crate::label::lot_id(scope, lot_no),
            phase_id: scope.phase_id.clone(),
            block_id: scope.block_id.clone(),
            lot_no,
            label: lot_no.label(),
            status: Some(OccupancyStatus::Vacant),
            assigned_resident_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn assigned_to(mut self, resident: impl Into<ResidentId>) -> Self {
        self.assigned_resident_id = Some(resident.into());
        self.status = Some(OccupancyStatus::Occupied);
        self
    }

    pub fn scope(&self) -> Scope {
        Scope {
            phase_id: self.phase_id.clone(),
            block_id: self.block_id.clone(),
        }
    }

    pub fn in_scope(&self, scope: &Scope) -> bool {
        self.phase_id == scope.phase_id && self.block_id == scope.block_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
}

/// A phase and the blocks it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Phase {
    pub fn new(id: impl Into<PhaseId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            blocks: Vec::new(),
        }
    }

    pub fn with_block(mut self, id: impl Into<BlockId>, name: impl Into<String>) -> Self {
        self.blocks.push(Block {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    pub fn block_by_name(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lot_no_bounds() {
        assert!(LotNo::new(0).is_err());
        assert!(LotNo::new(MAX_LOT_NO + 1).is_err());
        assert_eq!(LotNo::new(1).unwrap().get(), 1);
        assert_eq!(LotNo::from_input(20_000).unwrap().get(), MAX_LOT_NO);
        assert_eq!(LotNo::from_input(-3), Err(Error::InvalidLotNo(-3)));
    }

    #[test]
    fn new_lot_is_vacant() {
        let scope = Scope::new("phase-1", "block-1");
        let lot = Lot::new(&scope, LotNo::new(4).unwrap());
        assert_eq!(lot.id.as_str(), "phase-1:block-1:lot-4");
        assert_eq!(lot.label, "Lot 4");
        assert_eq!(lot.status, Some(OccupancyStatus::Vacant));
        assert!(lot.assigned_resident_id.is_none());
        assert!(lot.in_scope(&scope));
    }

    #[test]
    fn lot_document_shape() {
        let scope = Scope::new("phase-1", "block-1");
        let lot = Lot::new(&scope, LotNo::new(2).unwrap()).assigned_to("r2");
        let json = serde_json::to_value(&lot).unwrap();
        assert_eq!(json["lotNo"], 2);
        assert_eq!(json["assignedResidentId"], "r2");
        assert_eq!(json["status"], "Occupied");

        let parsed: Lot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, lot);
    }

    #[test]
    fn zero_lot_no_rejected_on_decode() {
        let raw = r#"{"id":"x","phaseId":"p","blockId":"b","lotNo":0,"label":"Lot 0"}"#;
        assert!(serde_json::from_str::<Lot>(raw).is_err());
    }

    #[test]
    fn full_name_skips_blank_middle() {
        let mut r = Resident::new("r1", "Ana", "Reyes", "Lot 1");
        assert_eq!(r.full_name(), "Ana Reyes");
        r.middle_name = Some("Cruz".into());
        assert_eq!(r.full_name(), "Ana Cruz Reyes");
    }
}
