//! Scope controller: the owner of all selection state.
//!
//! Loads race against selection changes. Each load is stamped with a
//! generation from a monotonically increasing counter, and only the most
//! recently issued load whose scope still matches the selection may commit.
//! Anything else is discarded on completion.
//!
//! ```text
//! select(A) ──begin(g=1)──────── fetch A ─────────── commit(g=1)  → stale
//! select(B) ────────begin(g=2)── fetch B ── commit(g=2)            → committed
//! ```

use crate::error::{Error, Result};
use crate::repository::{LotRepository, PreferenceStore};
use lotwatch_registry::{
    ConfirmReason, Decision, Lot, LotId, LotNo, LotRange, Mutation, MutationGuard, Phase, PhaseId,
    Reconciler, Reconciliation, RejectReason, Resident, ResidentId, ResidentQuery, Scope,
    ViewScope,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Proof that a load was issued. Presented back on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    scope: Scope,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

/// What happened to a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Result stored as the current lot list
    Committed { lots: usize },
    /// A newer load was issued or the selection moved; result dropped
    Stale,
}

/// Result of applying a guarded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { message: String },
    NeedsConfirmation(ConfirmReason),
    Rejected(RejectReason),
}

/// Owned copy of the controller state, for reconciliation outside the lock.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub view: ViewScope,
    pub scope: Option<Scope>,
    pub phases: Vec<Phase>,
    pub lots: Vec<Lot>,
    pub residents: Vec<Resident>,
}

impl Snapshot {
    /// Reconcile the cached lots of the selected scope.
    ///
    /// Legacy label matches are limited to residents registered under the
    /// selected phase and block, narrowed further by `query`.
    pub fn reconcile(&self, query: &ResidentQuery) -> Reconciliation<'_> {
        Reconciler::new(&self.residents)
            .with_fallback_scope(self.view.phase.clone(), self.view.block.clone())
            .with_query(query)
            .reconcile(&self.lots)
    }
}

#[derive(Debug, Default)]
struct Selection {
    view: ViewScope,
    scope: Option<Scope>,
    phases: Vec<Phase>,
    lots: Vec<Lot>,
    residents: Vec<Resident>,
    loading: bool,
}

/// Holds the operator's selection and cached data for one repository.
pub struct ScopeController<R> {
    repo: Arc<R>,
    generation: AtomicU64,
    hierarchy_generation: AtomicU64,
    state: RwLock<Selection>,
}

impl<R> ScopeController<R>
where
    R: LotRepository + PreferenceStore + 'static,
{
    /// Create a controller starting from the remembered view.
    pub fn new(repo: Arc<R>) -> Result<Self> {
        let view = repo.load_view_scope()?;
        Ok(Self {
            repo,
            generation: AtomicU64::new(0),
            hierarchy_generation: AtomicU64::new(0),
            state: RwLock::new(Selection {
                view,
                ..Selection::default()
            }),
        })
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Latest issued generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Reload phases and residents, snap the selection onto the hierarchy and
    /// load its lots.
    ///
    /// Hierarchy fetches are stamped like lot loads: a fetch overtaken by a
    /// later refresh is dropped.
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        let stamp = self.hierarchy_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (phases, residents) = self
            .blocking(|repo| Ok((repo.list_phases()?, repo.fetch_residents()?)))
            .await?;

        let scope = {
            let mut state = self.state.write().await;
            if stamp != self.hierarchy_generation.load(Ordering::SeqCst) {
                tracing::debug!("Discarding stale hierarchy fetch h={}", stamp);
                return Ok(LoadOutcome::Stale);
            }
            state.view = state.view.resolve(&phases);
            state.scope = state.view.to_scope(&phases);
            state.phases = phases;
            state.residents = residents;
            if state.scope.is_none() {
                state.lots.clear();
                state.loading = false;
            }
            state.scope.clone()
        };
        self.persist_view().await?;

        match scope {
            Some(scope) => self.load(scope).await,
            None => Ok(LoadOutcome::Committed { lots: 0 }),
        }
    }

    /// Select a phase (and optionally a block) by name, then load its lots.
    ///
    /// Without a block, the phase's first block is selected.
    pub async fn select(&self, phase: &str, block: Option<&str>) -> Result<LoadOutcome> {
        let scope = {
            let mut state = self.state.write().await;
            let phases = state.phases.clone();
            state.view.select_phase(&phases, phase);
            if let Some(block) = block {
                state.view.select_block(block);
            }
            state.view = state.view.resolve(&phases);
            state.scope = state.view.to_scope(&phases);
            if state.scope.is_none() {
                state.lots.clear();
                state.loading = false;
            }
            state.scope.clone()
        };
        self.persist_view().await?;

        match scope {
            Some(scope) => self.load(scope).await,
            None => Ok(LoadOutcome::Committed { lots: 0 }),
        }
    }

    /// Remember (or forget) the expanded lot row of the current selection.
    pub async fn set_expanded(&self, lot: Option<LotNo>) -> Result<()> {
        self.state.write().await.view.set_expanded(lot);
        self.persist_view().await
    }

    /// Issue a load for `scope`, superseding every earlier one.
    pub async fn begin(&self, scope: Scope) -> LoadTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().await.loading = true;
        LoadTicket { generation, scope }
    }

    /// Store a finished load if it is still the one that matters.
    pub async fn commit(&self, ticket: LoadTicket, lots: Vec<Lot>) -> LoadOutcome {
        let mut state = self.state.write().await;
        let latest = ticket.generation == self.generation.load(Ordering::SeqCst);

        if !latest || state.scope.as_ref() != Some(&ticket.scope) {
            if latest {
                state.loading = false;
            }
            tracing::debug!(
                "Discarding stale load g={} for {}",
                ticket.generation,
                ticket.scope
            );
            return LoadOutcome::Stale;
        }

        let count = lots.len();
        state.lots = lots;
        state.loading = false;
        LoadOutcome::Committed { lots: count }
    }

    /// Fetch the lots of `scope` and commit them unless superseded.
    pub async fn load(&self, scope: Scope) -> Result<LoadOutcome> {
        let ticket = self.begin(scope.clone()).await;
        match self.blocking(move |repo| repo.fetch_lots(&scope)).await {
            Ok(lots) => Ok(self.commit(ticket, lots).await),
            Err(e) => {
                let mut state = self.state.write().await;
                if ticket.generation == self.generation.load(Ordering::SeqCst) {
                    state.loading = false;
                }
                Err(e)
            }
        }
    }

    /// Reload the current selection, if any.
    pub async fn reload(&self) -> Result<LoadOutcome> {
        let scope = self.state.read().await.scope.clone();
        match scope {
            Some(scope) => self.load(scope).await,
            None => Ok(LoadOutcome::Committed { lots: 0 }),
        }
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn view(&self) -> ViewScope {
        self.state.read().await.view.clone()
    }

    pub async fn scope(&self) -> Option<Scope> {
        self.state.read().await.scope.clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        Snapshot {
            view: state.view.clone(),
            scope: state.scope.clone(),
            phases: state.phases.clone(),
            lots: state.lots.clone(),
            residents: state.residents.clone(),
        }
    }

    /// Check a mutation against fresh data, and perform it if allowed.
    ///
    /// Lot-level mutations act on the selected scope. A mutation that needs
    /// confirmation runs only when `confirmed` is set.
    pub async fn apply(&self, mutation: Mutation, confirmed: bool) -> Result<ApplyOutcome> {
        let selected = self.scope().await;

        let outcome = self
            .blocking(move |repo| apply_blocking(repo, selected, mutation, confirmed))
            .await?;

        if let ApplyOutcome::Applied { message } = &outcome {
            tracing::info!("{}", message);
            self.refresh().await?;
        }
        Ok(outcome)
    }

    async fn persist_view(&self) -> Result<()> {
        let view = self.view().await;
        self.blocking(move |repo| repo.save_view_scope(&view)).await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> Result<T> + Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        tokio::task::spawn_blocking(move || f(&repo)).await?
    }
}

fn apply_blocking<R: LotRepository>(
    repo: &R,
    selected: Option<Scope>,
    mutation: Mutation,
    confirmed: bool,
) -> Result<ApplyOutcome> {
    let phases = repo.list_phases()?;
    let residents = repo.fetch_residents()?;
    let lots = match &mutation {
        Mutation::DeletePhase { phase_id } => repo.fetch_phase_lots(phase_id)?,
        Mutation::DeleteBlock { scope }
        | Mutation::AddLot { scope, .. }
        | Mutation::AddLotRange { scope, .. } => repo.fetch_lots(scope)?,
        Mutation::AssignResident { .. }
        | Mutation::ClearAssignment { .. }
        | Mutation::DeleteLot { .. } => match &selected {
            Some(scope) => repo.fetch_lots(scope)?,
            None => Vec::new(),
        },
        Mutation::AddPhase { .. } | Mutation::AddBlock { .. } => Vec::new(),
    };

    let guard = MutationGuard::new(&phases, &lots, &residents);
    match guard.check(&mutation) {
        Decision::Reject(reason) => return Ok(ApplyOutcome::Rejected(reason)),
        Decision::ProceedWithConfirmation(reason) if !confirmed => {
            return Ok(ApplyOutcome::NeedsConfirmation(reason))
        }
        _ => {}
    }

    let message = match mutation {
        Mutation::AddPhase { name } => match repo.add_phase(&name)? {
            Some(phase) => format!("Added phase {} ({})", phase.name, phase.id),
            None => return Ok(ApplyOutcome::Rejected(RejectReason::EmptyName)),
        },
        Mutation::AddBlock { phase_id, name } => match repo.add_block(&phase_id, &name)? {
            Some(block) => format!("Added block {} ({}) to {}", block.name, block.id, phase_id),
            None => return Ok(ApplyOutcome::Rejected(RejectReason::EmptyName)),
        },
        Mutation::DeletePhase { phase_id } => {
            let lots = repo.delete_phase(&phase_id)?;
            format!("Deleted phase {} and {} lot(s)", phase_id, lots)
        }
        Mutation::DeleteBlock { scope } => {
            let lots = repo.delete_block(&scope)?;
            format!("Deleted block {} and {} lot(s)", scope, lots)
        }
        Mutation::AddLot { scope, lot_no } => match repo.add_lot(&scope, lot_no)? {
            Some(lot) => format!("Added {} to {}", lot.label, scope),
            None => return Ok(ApplyOutcome::Rejected(RejectReason::LotExists { scope, lot_no })),
        },
        Mutation::AddLotRange { scope, range } => {
            let plan = repo.add_lot_range(&scope, range)?;
            format!(
                "Added {} lot(s) to {}, skipped {} existing",
                plan.create.len(),
                scope,
                plan.skipped.len()
            )
        }
        Mutation::AssignResident {
            lot_id,
            resident_id,
        } => {
            let scope = require_scope(selected)?;
            let lot = repo.set_lot_assignment(&scope, &lot_id, Some(&resident_id))?;
            format!("Assigned {} to resident {}", lot.label, resident_id)
        }
        Mutation::ClearAssignment { lot_id } => {
            let scope = require_scope(selected)?;
            let lot = repo.set_lot_assignment(&scope, &lot_id, None)?;
            format!("Cleared assignment of {}", lot.label)
        }
        Mutation::DeleteLot { lot_id } => {
            let scope = require_scope(selected)?;
            if !repo.delete_lot(&scope, &lot_id)? {
                return Ok(ApplyOutcome::Rejected(RejectReason::UnknownLot { lot_id }));
            }
            format!("Deleted lot {}", lot_id)
        }
    };

    Ok(ApplyOutcome::Applied { message })
}

fn require_scope(selected: Option<Scope>) -> Result<Scope> {
    selected.ok_or_else(|| Error::NotFound("no phase/block selected".to_string()))
}

/// Build a lot mutation from raw operator input.
pub fn add_lot_mutation(scope: Scope, lot_no: i64) -> Result<Mutation> {
    Ok(Mutation::AddLot {
        scope,
        lot_no: LotNo::from_input(lot_no)?,
    })
}

/// Build a bulk lot mutation from raw operator input.
pub fn add_range_mutation(scope: Scope, from: i64, to: i64) -> Result<Mutation> {
    Ok(Mutation::AddLotRange {
        scope,
        range: LotRange::normalize(from, to)?,
    })
}

/// Mutations addressed by lot id act on the selected scope.
pub fn lot_mutation(kind: LotAction, lot_id: impl Into<LotId>) -> Mutation {
    let lot_id = lot_id.into();
    match kind {
        LotAction::Clear => Mutation::ClearAssignment { lot_id },
        LotAction::Delete => Mutation::DeleteLot { lot_id },
        LotAction::Assign(resident_id) => Mutation::AssignResident {
            lot_id,
            resident_id,
        },
    }
}

/// Lot-level actions on the selected scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LotAction {
    Assign(ResidentId),
    Clear,
    Delete,
}

/// Phase deletion by id.
pub fn delete_phase_mutation(phase_id: impl Into<PhaseId>) -> Mutation {
    Mutation::DeletePhase {
        phase_id: phase_id.into(),
    }
}
