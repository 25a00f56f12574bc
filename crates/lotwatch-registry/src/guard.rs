//! Safety policy for structural mutations.
//!
//! The guard only decides. Performing the mutation, and asking the operator
//! when confirmation is required, is the caller's job.
//!
//! | Mutation | Outcome |
//! |----------|---------|
//! | delete lot | confirm if validly assigned, else proceed |
//! | clear assignment | proceed (repairs ghosts) |
//! | delete block | confirm if it has any lots |
//! | delete phase | confirm if any of its blocks has lots |
//! | add lot / range | reject numbers that already exist |

use crate::identity::IdentityIndex;
use crate::label::normalize_label;
use crate::model::{Lot, LotId, LotNo, Phase, PhaseId, Resident, ResidentId, Scope};
use crate::range::{plan_lot_range, LotRange, RangePlan};
use serde::Serialize;
use std::fmt;

/// A structural change an operator wants to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    AddPhase { name: String },
    AddBlock { phase_id: PhaseId, name: String },
    DeletePhase { phase_id: PhaseId },
    DeleteBlock { scope: Scope },
    AddLot { scope: Scope, lot_no: LotNo },
    AddLotRange { scope: Scope, range: LotRange },
    AssignResident { lot_id: LotId, resident_id: ResidentId },
    ClearAssignment { lot_id: LotId },
    DeleteLot { lot_id: LotId },
}

/// Why a mutation needs explicit confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ConfirmReason {
    /// The lot is assigned to a resident that exists
    LotOccupied { lot_id: LotId, label: String, resident_id: ResidentId },
    /// Deleting the block deletes its lots
    BlockHasLots { scope: Scope, lots: usize },
    /// Deleting the phase deletes all its blocks and lots
    PhaseHasLots { phase_id: PhaseId, lots: usize },
    /// The lot is already held by another resident
    Reassign { lot_id: LotId, current: ResidentId },
}

impl fmt::Display for ConfirmReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmReason::LotOccupied { label, .. } => {
                write!(f, "{} is assigned to a resident. Delete anyway?", label)
            }
            ConfirmReason::BlockHasLots { lots, .. } => write!(
                f,
                "This block has {} lot(s). Deleting it will delete ALL its lots. Continue?",
                lots
            ),
            ConfirmReason::PhaseHasLots { lots, .. } => write!(
                f,
                "This phase has {} lot(s). Deleting it will also delete ALL its blocks and lots. Continue?",
                lots
            ),
            ConfirmReason::Reassign { lot_id, current } => write!(
                f,
                "Lot {} is assigned to resident {}. Reassign?",
                lot_id, current
            ),
        }
    }
}

/// Why a mutation is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    UnknownLot { lot_id: LotId },
    UnknownResident { resident_id: ResidentId },
    UnknownBlock { scope: Scope },
    UnknownPhase { phase_id: PhaseId },
    LotExists { scope: Scope, lot_no: LotNo },
    RangeFullyOccupied { scope: Scope, range: LotRange },
    EmptyName,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownLot { lot_id } => write!(f, "no lot {}", lot_id),
            RejectReason::UnknownResident { resident_id } => {
                write!(f, "no resident {}", resident_id)
            }
            RejectReason::UnknownBlock { scope } => write!(f, "no block {}", scope),
            RejectReason::UnknownPhase { phase_id } => write!(f, "no phase {}", phase_id),
            RejectReason::LotExists { scope, lot_no } => {
                write!(f, "lot {} already exists in {}", lot_no, scope)
            }
            RejectReason::RangeFullyOccupied { scope, range } => write!(
                f,
                "lots {}..={} already exist in {}",
                range.start(),
                range.end(),
                scope
            ),
            RejectReason::EmptyName => write!(f, "name is empty"),
        }
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum Decision {
    Proceed,
    ProceedWithConfirmation(ConfirmReason),
    Reject(RejectReason),
}

impl Decision {
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Decision::ProceedWithConfirmation(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Reject(_))
    }
}

/// Evaluates mutations against a snapshot of the hierarchy, lots and residents.
///
/// `lots` must cover every scope the mutation touches; for a phase deletion
/// that is every lot of the phase.
pub struct MutationGuard<'a> {
    phases: &'a [Phase],
    lots: &'a [Lot],
    index: IdentityIndex<'a>,
}

impl<'a> MutationGuard<'a> {
    pub fn new(phases: &'a [Phase], lots: &'a [Lot], residents: &'a [Resident]) -> Self {
        Self {
            phases,
            lots,
            index: IdentityIndex::build(residents),
        }
    }

    pub fn check(&self, mutation: &Mutation) -> Decision {
        let decision = match mutation {
            Mutation::AddPhase { name } => self.check_name(name),
            Mutation::AddBlock { phase_id, name } => match self.phase(phase_id) {
                None => Decision::Reject(RejectReason::UnknownPhase {
                    phase_id: phase_id.clone(),
                }),
                Some(_) => self.check_name(name),
            },
            Mutation::DeletePhase { phase_id } => self.check_delete_phase(phase_id),
            Mutation::DeleteBlock { scope } => self.check_delete_block(scope),
            Mutation::AddLot { scope, lot_no } => {
                if self.scope_lots(scope).any(|l| l.lot_no == *lot_no) {
                    Decision::Reject(RejectReason::LotExists {
                        scope: scope.clone(),
                        lot_no: *lot_no,
                    })
                } else {
                    Decision::Proceed
                }
            }
            Mutation::AddLotRange { scope, range } => {
                if self.plan_range(scope, *range).is_noop() {
                    Decision::Reject(RejectReason::RangeFullyOccupied {
                        scope: scope.clone(),
                        range: *range,
                    })
                } else {
                    Decision::Proceed
                }
            }
            Mutation::AssignResident {
                lot_id,
                resident_id,
            } => self.check_assign(lot_id, resident_id),
            Mutation::ClearAssignment { lot_id } => match self.lot(lot_id) {
                Some(_) => Decision::Proceed,
                None => Decision::Reject(RejectReason::UnknownLot {
                    lot_id: lot_id.clone(),
                }),
            },
            Mutation::DeleteLot { lot_id } => self.check_delete_lot(lot_id),
        };

        tracing::debug!("Guard {:?} -> {:?}", mutation, decision);
        decision
    }

    /// Lot numbers of a range that can be created in a scope.
    pub fn plan_range(&self, scope: &Scope, range: LotRange) -> RangePlan {
        plan_lot_range(self.scope_lots(scope).map(|l| l.lot_no), range)
    }

    fn check_name(&self, name: &str) -> Decision {
        if normalize_label(name).is_empty() {
            Decision::Reject(RejectReason::EmptyName)
        } else {
            Decision::Proceed
        }
    }

    fn check_delete_phase(&self, phase_id: &PhaseId) -> Decision {
        let Some(phase) = self.phase(phase_id) else {
            return Decision::Reject(RejectReason::UnknownPhase {
                phase_id: phase_id.clone(),
            });
        };

        // Every lot under the phase, including blocks the phase no longer lists.
        let lots = self.lots.iter().filter(|l| l.phase_id == phase.id).count();

        if lots > 0 {
            Decision::ProceedWithConfirmation(ConfirmReason::PhaseHasLots {
                phase_id: phase_id.clone(),
                lots,
            })
        } else {
            Decision::Proceed
        }
    }

    fn check_delete_block(&self, scope: &Scope) -> Decision {
        let known = self
            .phase(&scope.phase_id)
            .and_then(|p| p.block(&scope.block_id))
            .is_some();
        if !known {
            return Decision::Reject(RejectReason::UnknownBlock {
                scope: scope.clone(),
            });
        }

        let lots = self.scope_lots(scope).count();
        if lots > 0 {
            Decision::ProceedWithConfirmation(ConfirmReason::BlockHasLots {
                scope: scope.clone(),
                lots,
            })
        } else {
            Decision::Proceed
        }
    }

    fn check_delete_lot(&self, lot_id: &LotId) -> Decision {
        let Some(lot) = self.lot(lot_id) else {
            return Decision::Reject(RejectReason::UnknownLot {
                lot_id: lot_id.clone(),
            });
        };

        match self.valid_assignment(lot) {
            Some(resident_id) => Decision::ProceedWithConfirmation(ConfirmReason::LotOccupied {
                lot_id: lot.id.clone(),
                label: lot.label.clone(),
                resident_id: resident_id.clone(),
            }),
            // Ghost or absent assignments affect no real occupant.
            None => Decision::Proceed,
        }
    }

    fn check_assign(&self, lot_id: &LotId, resident_id: &ResidentId) -> Decision {
        let Some(lot) = self.lot(lot_id) else {
            return Decision::Reject(RejectReason::UnknownLot {
                lot_id: lot_id.clone(),
            });
        };
        if !self.index.contains(resident_id) {
            return Decision::Reject(RejectReason::UnknownResident {
                resident_id: resident_id.clone(),
            });
        }

        match self.valid_assignment(lot) {
            Some(current) if current != resident_id => {
                Decision::ProceedWithConfirmation(ConfirmReason::Reassign {
                    lot_id: lot.id.clone(),
                    current: current.clone(),
                })
            }
            _ => Decision::Proceed,
        }
    }

    fn valid_assignment<'l>(&self, lot: &'l Lot) -> Option<&'l ResidentId> {
        lot.assigned_resident_id
            .as_ref()
            .filter(|id| self.index.contains(id))
    }

    fn phase(&self, id: &PhaseId) -> Option<&'a Phase> {
        self.phases.iter().find(|p| &p.id == id)
    }

    fn lot(&self, id: &LotId) -> Option<&'a Lot> {
        self.lots.iter().find(|l| &l.id == id)
    }

    fn scope_lots<'s>(&'s self, scope: &'s Scope) -> impl Iterator<Item = &'a Lot> + 's {
        self.lots.iter().filter(move |l| l.in_scope(scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(block: &str) -> Scope {
        Scope::new("phase-1", block)
    }

    fn lot(block: &str, n: u32) -> Lot {
        Lot::new(&scope(block), LotNo::new(n).unwrap())
    }

    fn phases() -> Vec<Phase> {
        vec![
            Phase::new("phase-1", "Phase 1")
                .with_block("block-1", "Block 1")
                .with_block("block-2", "Block 2"),
            Phase::new("phase-2", "Phase 2").with_block("block-1", "Block 1"),
        ]
    }

    fn residents() -> Vec<Resident> {
        vec![
            Resident::new("r1", "Ana", "Reyes", "Lot 1"),
            Resident::new("r2", "Ben", "Cruz", "Lot 2"),
        ]
    }

    #[test]
    fn delete_validly_assigned_lot_needs_confirmation() {
        let (phases, residents) = (phases(), residents());
        let lots = vec![lot("block-1", 1).assigned_to("r1")];
        let guard = MutationGuard::new(&phases, &lots, &residents);

        let decision = guard.check(&Mutation::DeleteLot {
            lot_id: lots[0].id.clone(),
        });
        assert!(decision.requires_confirmation());
        assert_eq!(
            decision.to_string_reason(),
            "Lot 1 is assigned to a resident. Delete anyway?"
        );
    }

    #[test]
    fn delete_ghost_lot_proceeds() {
        let (phases, residents) = (phases(), residents());
        let lots = vec![lot("block-1", 5).assigned_to("r99"), lot("block-1", 3)];
        let guard = MutationGuard::new(&phases, &lots, &residents);

        for l in &lots {
            let decision = guard.check(&Mutation::DeleteLot {
                lot_id: l.id.clone(),
            });
            assert_eq!(decision, Decision::Proceed);
        }
    }

    #[test]
    fn delete_unknown_lot_rejected() {
        let (phases, residents) = (phases(), residents());
        let guard = MutationGuard::new(&phases, &[], &residents);
        let decision = guard.check(&Mutation::DeleteLot {
            lot_id: "nope".into(),
        });
        assert!(decision.is_rejected());
    }

    #[test]
    fn clear_assignment_always_allowed() {
        let (phases, residents) = (phases(), residents());
        let lots = vec![
            lot("block-1", 1).assigned_to("r1"),
            lot("block-1", 2).assigned_to("r99"),
        ];
        let guard = MutationGuard::new(&phases, &lots, &residents);

        for l in &lots {
            let decision = guard.check(&Mutation::ClearAssignment {
                lot_id: l.id.clone(),
            });
            assert_eq!(decision, Decision::Proceed);
        }
    }

    #[test]
    fn delete_block_with_lots_needs_confirmation() {
        let (phases, residents) = (phases(), residents());
        let lots = vec![lot("block-1", 1), lot("block-1", 2)];
        let guard = MutationGuard::new(&phases, &lots, &residents);

        assert_eq!(
            guard.check(&Mutation::DeleteBlock {
                scope: scope("block-1")
            }),
            Decision::ProceedWithConfirmation(ConfirmReason::BlockHasLots {
                scope: scope("block-1"),
                lots: 2,
            })
        );
        assert_eq!(
            guard.check(&Mutation::DeleteBlock {
                scope: scope("block-2")
            }),
            Decision::Proceed
        );
        assert!(guard
            .check(&Mutation::DeleteBlock {
                scope: scope("block-9")
            })
            .is_rejected());
    }

    #[test]
    fn delete_phase_checks_blocks_transitively() {
        let (phases, residents) = (phases(), residents());
        let lots = vec![lot("block-2", 4)];
        let guard = MutationGuard::new(&phases, &lots, &residents);

        assert_eq!(
            guard.check(&Mutation::DeletePhase {
                phase_id: "phase-1".into()
            }),
            Decision::ProceedWithConfirmation(ConfirmReason::PhaseHasLots {
                phase_id: "phase-1".into(),
                lots: 1,
            })
        );
        assert_eq!(
            guard.check(&Mutation::DeletePhase {
                phase_id: "phase-2".into()
            }),
            Decision::Proceed
        );
        assert!(guard
            .check(&Mutation::DeletePhase {
                phase_id: "phase-9".into()
            })
            .is_rejected());
    }

    #[test]
    fn delete_phase_counts_lots_of_unlisted_blocks() {
        let (phases, residents) = (phases(), residents());
        let lots = vec![lot("block-legacy", 7).assigned_to("r1")];
        let guard = MutationGuard::new(&phases, &lots, &residents);

        assert_eq!(
            guard.check(&Mutation::DeletePhase {
                phase_id: "phase-1".into()
            }),
            Decision::ProceedWithConfirmation(ConfirmReason::PhaseHasLots {
                phase_id: "phase-1".into(),
                lots: 1,
            })
        );
    }

    #[test]
    fn add_existing_lot_rejected() {
        let (phases, residents) = (phases(), residents());
        let lots = vec![lot("block-1", 1)];
        let guard = MutationGuard::new(&phases, &lots, &residents);

        assert!(guard
            .check(&Mutation::AddLot {
                scope: scope("block-1"),
                lot_no: LotNo::new(1).unwrap(),
            })
            .is_rejected());
        // Same number in another block is fine.
        assert_eq!(
            guard.check(&Mutation::AddLot {
                scope: scope("block-2"),
                lot_no: LotNo::new(1).unwrap(),
            }),
            Decision::Proceed
        );
    }

    #[test]
    fn bulk_add_never_overwrites() {
        let (phases, residents) = (phases(), residents());
        let lots = vec![lot("block-1", 1), lot("block-1", 2), lot("block-1", 5)];
        let guard = MutationGuard::new(&phases, &lots, &residents);

        let range = LotRange::normalize(1, 5).unwrap();
        let mutation = Mutation::AddLotRange {
            scope: scope("block-1"),
            range,
        };
        assert_eq!(guard.check(&mutation), Decision::Proceed);

        let plan = guard.plan_range(&scope("block-1"), range);
        let created: Vec<u32> = plan.create.iter().map(|n| n.get()).collect();
        assert_eq!(created, vec![3, 4]);

        let full = LotRange::normalize(1, 2).unwrap();
        assert!(guard
            .check(&Mutation::AddLotRange {
                scope: scope("block-1"),
                range: full,
            })
            .is_rejected());
    }

    #[test]
    fn assign_rules() {
        let (phases, residents) = (phases(), residents());
        let lots = vec![lot("block-1", 1).assigned_to("r1"), lot("block-1", 2)];
        let guard = MutationGuard::new(&phases, &lots, &residents);

        let assign = |lot: &Lot, resident: &str| {
            guard.check(&Mutation::AssignResident {
                lot_id: lot.id.clone(),
                resident_id: resident.into(),
            })
        };

        assert_eq!(assign(&lots[1], "r2"), Decision::Proceed);
        assert_eq!(assign(&lots[0], "r1"), Decision::Proceed);
        assert!(assign(&lots[0], "r2").requires_confirmation());
        assert_eq!(
            assign(&lots[1], "r99"),
            Decision::Reject(RejectReason::UnknownResident {
                resident_id: "r99".into()
            })
        );
    }

    #[test]
    fn names_must_survive_normalization() {
        let (phases, residents) = (phases(), residents());
        let guard = MutationGuard::new(&phases, &[], &residents);

        assert_eq!(
            guard.check(&Mutation::AddPhase { name: " ?! ".into() }),
            Decision::Reject(RejectReason::EmptyName)
        );
        assert_eq!(
            guard.check(&Mutation::AddPhase {
                name: "Phase 3".into()
            }),
            Decision::Proceed
        );
        assert!(guard
            .check(&Mutation::AddBlock {
                phase_id: "phase-9".into(),
                name: "Block 1".into(),
            })
            .is_rejected());
    }

    impl Decision {
        fn to_string_reason(&self) -> String {
            match self {
                Decision::ProceedWithConfirmation(reason) => reason.to_string(),
                Decision::Reject(reason) => reason.to_string(),
                Decision::Proceed => String::new(),
            }
        }
    }
}
