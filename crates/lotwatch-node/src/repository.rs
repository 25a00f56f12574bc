//! Persistence interfaces.
//!
//! The registry engine only ever sees [`Lot`], [`Resident`] and [`Phase`]
//! values. Where they come from is behind these traits.

use crate::error::Result;
use lotwatch_registry::{
    Block, Lot, LotId, LotNo, LotRange, Phase, PhaseId, RangePlan, Resident, ResidentId, Scope,
    ViewScope,
};

/// Lot, hierarchy and resident persistence.
///
/// Every lot returned by a scoped fetch carries that scope's phase and block
/// ids. Creation never overwrites an existing lot number.
pub trait LotRepository: Send + Sync {
    fn list_phases(&self) -> Result<Vec<Phase>>;

    /// Create a phase from an operator-entered name. `None` if the name is
    /// empty once normalized.
    fn add_phase(&self, name: &str) -> Result<Option<Phase>>;

    fn add_block(&self, phase_id: &PhaseId, name: &str) -> Result<Option<Block>>;

    /// Delete a phase with all its blocks and lots. Returns lots removed.
    fn delete_phase(&self, phase_id: &PhaseId) -> Result<usize>;

    /// Delete a block with all its lots. Returns lots removed.
    fn delete_block(&self, scope: &Scope) -> Result<usize>;

    /// Lots of one scope, ascending by lot number.
    fn fetch_lots(&self, scope: &Scope) -> Result<Vec<Lot>>;

    /// Lots of every block in a phase.
    fn fetch_phase_lots(&self, phase_id: &PhaseId) -> Result<Vec<Lot>>;

    /// Create one lot. `None` if the number is taken.
    fn add_lot(&self, scope: &Scope, lot_no: LotNo) -> Result<Option<Lot>>;

    /// Create every free number of a range.
    fn add_lot_range(&self, scope: &Scope, range: LotRange) -> Result<RangePlan>;

    /// Set or clear a lot's resident.
    fn set_lot_assignment(
        &self,
        scope: &Scope,
        lot_id: &LotId,
        resident: Option<&ResidentId>,
    ) -> Result<Lot>;

    /// Returns false if the lot did not exist.
    fn delete_lot(&self, scope: &Scope, lot_id: &LotId) -> Result<bool>;

    fn fetch_residents(&self) -> Result<Vec<Resident>>;

    fn put_resident(&self, resident: &Resident) -> Result<()>;
}

/// Key-value store for the operator's remembered view.
pub trait PreferenceStore: Send + Sync {
    /// Stored view, or the default when nothing was saved.
    fn load_view_scope(&self) -> Result<ViewScope>;

    fn save_view_scope(&self, view: &ViewScope) -> Result<()>;
}
