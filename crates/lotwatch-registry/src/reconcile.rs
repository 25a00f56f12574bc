//! Lot-resident reconciliation.
//!
//! Decides which resident occupies each lot. Resolution order:
//!
//! 1. `assigned_resident_id` is authoritative. If it resolves, that resident
//!    occupies the lot. If it does not, the lot is a **ghost**: it names a
//!    resident that no longer exists, and no fallback is attempted.
//! 2. Only when the lot has no assignment, a resident whose legacy `lot`
//!    label carries the same number is taken as the occupant. A label shared
//!    by several residents is reported as ambiguous and left unresolved.
//! 3. Otherwise the lot is vacant.
//!
//! Reconciliation is pure: it reads snapshots of lots and residents and
//! never mutates either.

use crate::identity::IdentityIndex;
use crate::label::lot_number;
use crate::model::{Lot, LotId, LotNo, Resident, ResidentId};
use crate::ordering::{duplicate_warnings, sort_lots};
use crate::search::ResidentQuery;
use crate::warning::Warning;
use serde::Serialize;
use std::collections::HashMap;

/// How a lot's occupant was determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Occupancy {
    /// Resolved through `assigned_resident_id`
    Assigned,
    /// Resolved through a resident's legacy lot label
    Legacy,
    /// `assigned_resident_id` names a missing resident
    Ghost,
    /// Several residents claim the lot by legacy label
    Ambiguous { candidates: Vec<ResidentId> },
    /// No occupant
    Vacant,
}

/// One reconciled lot row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledLot<'a> {
    pub lot: &'a Lot,
    pub resident: Option<&'a Resident>,
    pub ghost_assigned: bool,
    pub assigned_resident_id: Option<&'a ResidentId>,
    pub occupancy: Occupancy,
}

impl ReconciledLot<'_> {
    /// True when the lot holds an assignment to a resident that exists.
    pub fn has_valid_assignment(&self) -> bool {
        self.occupancy == Occupancy::Assigned
    }

    pub fn is_vacant(&self) -> bool {
        self.occupancy == Occupancy::Vacant
    }

    /// Ghost and ambiguous rows need an operator.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self.occupancy,
            Occupancy::Ghost | Occupancy::Ambiguous { .. }
        )
    }
}

/// Reconciled rows in lot order, plus the integrity warnings found on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation<'a> {
    pub lots: Vec<ReconciledLot<'a>>,
    pub warnings: Vec<Warning>,
}

impl<'a> Reconciliation<'a> {
    pub fn find(&self, lot_id: &LotId) -> Option<&ReconciledLot<'a>> {
        self.lots.iter().find(|r| &r.lot.id == lot_id)
    }

    pub fn ghosts(&self) -> impl Iterator<Item = &ReconciledLot<'a>> {
        self.lots.iter().filter(|r| r.ghost_assigned)
    }

    pub fn occupied(&self) -> usize {
        self.lots.iter().filter(|r| r.resident.is_some()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }
}

/// Reconcile lots against residents using every resident as a fallback candidate.
pub fn reconcile<'a>(lots: &'a [Lot], residents: &'a [Resident]) -> Reconciliation<'a> {
    Reconciler::new(residents).reconcile(lots)
}

/// Reconciliation with a restricted legacy fallback pool.
///
/// Restrictions only narrow which residents may match by legacy label. The
/// authoritative lookup always sees the whole resident collection.
pub struct Reconciler<'a> {
    residents: &'a [Resident],
    index: IdentityIndex<'a>,
    fallback: ResidentQuery,
}

impl<'a> Reconciler<'a> {
    pub fn new(residents: &'a [Resident]) -> Self {
        Self {
            residents,
            index: IdentityIndex::build(residents),
            fallback: ResidentQuery::default(),
        }
    }

    /// Only residents registered under this phase/block name may match by label.
    pub fn with_fallback_scope(mut self, phase: impl Into<String>, block: impl Into<String>) -> Self {
        self.fallback.phase = Some(phase.into());
        self.fallback.block = Some(block.into());
        self
    }

    /// Only residents matching the search text may match by label.
    pub fn with_query(mut self, query: &ResidentQuery) -> Self {
        self.fallback.text = query.text.clone();
        if query.phase.is_some() {
            self.fallback.phase = query.phase.clone();
        }
        if query.block.is_some() {
            self.fallback.block = query.block.clone();
        }
        self
    }

    pub fn index(&self) -> &IdentityIndex<'a> {
        &self.index
    }

    /// Produce one row per lot, sorted by lot number.
    pub fn reconcile<'l>(&self, lots: &'l [Lot]) -> Reconciliation<'l>
    where
        'a: 'l,
    {
        let by_label = self.fallback_candidates();

        let mut warnings: Vec<Warning> = self.index.warnings().collect();
        warnings.extend(duplicate_warnings(lots));

        let rows: Vec<ReconciledLot<'l>> = sort_lots(lots)
            .into_iter()
            .map(|lot| {
                let row = self.resolve(lot, &by_label);
                match &row.occupancy {
                    Occupancy::Ghost => {
                        tracing::warn!(
                            "Lot {} assigned to missing resident {}",
                            lot.id,
                            row.assigned_resident_id.map(|id| id.as_str()).unwrap_or("")
                        );
                        if let Some(id) = row.assigned_resident_id {
                            warnings.push(Warning::GhostAssignment {
                                lot_id: lot.id.clone(),
                                resident_id: id.clone(),
                            });
                        }
                    }
                    Occupancy::Ambiguous { candidates } => {
                        tracing::warn!(
                            "Lot {} claimed by {} residents through legacy labels",
                            lot.id,
                            candidates.len()
                        );
                        warnings.push(Warning::AmbiguousFallback {
                            lot_id: lot.id.clone(),
                            candidates: candidates.clone(),
                        });
                    }
                    _ => {}
                }
                row
            })
            .collect();

        Reconciliation {
            lots: rows,
            warnings,
        }
    }

    fn resolve<'l>(
        &self,
        lot: &'l Lot,
        by_label: &HashMap<LotNo, Vec<&'a Resident>>,
    ) -> ReconciledLot<'l>
    where
        'a: 'l,
    {
        if let Some(assigned) = lot.assigned_resident_id.as_ref() {
            let (resident, occupancy) = match self.index.get(assigned) {
                Some(resident) => (Some(resident), Occupancy::Assigned),
                None => (None, Occupancy::Ghost),
            };
            return ReconciledLot {
                lot,
                resident,
                ghost_assigned: resident.is_none(),
                assigned_resident_id: Some(assigned),
                occupancy,
            };
        }

        let (resident, occupancy) = match by_label.get(&lot.lot_no).map(Vec::as_slice) {
            Some([only]) => (Some(*only), Occupancy::Legacy),
            Some(candidates) if candidates.len() > 1 => (
                None,
                Occupancy::Ambiguous {
                    candidates: candidates.iter().map(|r| r.id.clone()).collect(),
                },
            ),
            _ => (None, Occupancy::Vacant),
        };

        ReconciledLot {
            lot,
            resident,
            ghost_assigned: false,
            assigned_resident_id: None,
            occupancy,
        }
    }

    fn fallback_candidates(&self) -> HashMap<LotNo, Vec<&'a Resident>> {
        let mut by_label: HashMap<LotNo, Vec<&'a Resident>> = HashMap::new();
        for resident in self.residents {
            // Records replaced by a later duplicate id never match.
            let current = self
                .index
                .get(&resident.id)
                .is_some_and(|r| std::ptr::eq(r, resident));
            if !current || !self.fallback.matches(resident) {
                continue;
            }
            if let Some(n) = lot_number(&resident.lot) {
                let candidates = by_label.entry(n).or_default();
                if !candidates.iter().any(|c| c.id == resident.id) {
                    candidates.push(resident);
                }
            }
        }
        by_label
    }
}
