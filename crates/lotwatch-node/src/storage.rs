//! Persistent storage using RocksDB.
//!
//! Key layout:
//!
//! ```text
//! phase:{phase_id}                    Phase (with its blocks)
//! lot:{phase_id}|{block_id}|{lot_id}  Lot
//! resident:{resident_id}              Resident
//! pref:view_scope                     ViewScope
//! ```

use crate::error::{Error, Result};
use crate::repository::{LotRepository, PreferenceStore};
use lotwatch_registry::label::{normalize_label, slug_id};
use lotwatch_registry::{
    plan_lot_range, Block, Lot, LotId, LotNo, LotRange, OccupancyStatus, Phase, PhaseId,
    RangePlan, Resident, ResidentId, Scope, ViewScope,
};
use rocksdb::{Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

const VIEW_SCOPE_KEY: &[u8] = b"pref:view_scope";

/// Storage backend for Lotwatch data.
pub struct Storage {
    db: DB,
    /// Serializes lot read-check-write sequences.
    lot_writes: Mutex<()>,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            lot_writes: Mutex::new(()),
        })
    }

    fn lock_lots(&self) -> Result<MutexGuard<'_, ()>> {
        self.lot_writes
            .lock()
            .map_err(|_| Error::Storage("lot write lock poisoned".to_string()))
    }

    // --- Phases ---

    /// Get a phase by ID.
    pub fn get_phase(&self, id: &PhaseId) -> Result<Option<Phase>> {
        let key = format!("phase:{}", id);
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Store a phase.
    pub fn put_phase(&self, phase: &Phase) -> Result<()> {
        let key = format!("phase:{}", phase.id);
        let value = serde_json::to_vec(phase)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    // --- Lots ---

    /// Get a lot by scope and ID.
    pub fn get_lot(&self, scope: &Scope, lot_id: &LotId) -> Result<Option<Lot>> {
        match self.db.get(lot_key(scope, lot_id).as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Store a lot as-is, under its own scope.
    ///
    /// Bypasses the lot-number check; meant for imports and repairs.
    pub fn put_lot(&self, lot: &Lot) -> Result<()> {
        let value = serde_json::to_vec(lot)?;
        self.db
            .put(lot_key(&lot.scope(), &lot.id).as_bytes(), value)?;
        Ok(())
    }

    // --- Residents ---

    /// Get a resident by ID.
    pub fn get_resident(&self, id: &ResidentId) -> Result<Option<Resident>> {
        let key = format!("resident:{}", id);
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Delete a resident. Lots assigned to it are left dangling.
    pub fn delete_resident(&self, id: &ResidentId) -> Result<()> {
        let key = format!("resident:{}", id);
        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    // --- Helpers ---

    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let prefix = prefix.as_bytes();
        let mut items = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                items.push(serde_json::from_slice(&value)?);
            } else {
                break;
            }
        }

        Ok(items)
    }

    /// Queue deletion of every key under a prefix. Returns keys queued.
    fn delete_prefix(&self, batch: &mut WriteBatch, prefix: &str) -> Result<usize> {
        let prefix = prefix.as_bytes();
        let mut deleted = 0;

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, _) = item?;
            if key.starts_with(prefix) {
                batch.delete(&key);
                deleted += 1;
            } else {
                break;
            }
        }

        Ok(deleted)
    }

    fn write_lot(&self, batch: &mut WriteBatch, lot: &Lot) -> Result<()> {
        let value = serde_json::to_vec(lot)?;
        batch.put(lot_key(&lot.scope(), &lot.id).as_bytes(), value);
        Ok(())
    }
}

impl LotRepository for Storage {
    fn list_phases(&self) -> Result<Vec<Phase>> {
        self.scan("phase:")
    }

    fn add_phase(&self, name: &str) -> Result<Option<Phase>> {
        let phases = self.list_phases()?;
        let Some(id) = slug_id(name, phases.iter().map(|p| p.id.as_str())) else {
            return Ok(None);
        };

        let phase = Phase::new(id, normalize_label(name));
        self.put_phase(&phase)?;
        tracing::info!("Added phase {} ({})", phase.name, phase.id);
        Ok(Some(phase))
    }

    fn add_block(&self, phase_id: &PhaseId, name: &str) -> Result<Option<Block>> {
        let mut phase = self
            .get_phase(phase_id)?
            .ok_or_else(|| Error::NotFound(format!("phase {}", phase_id)))?;
        let Some(id) = slug_id(name, phase.blocks.iter().map(|b| b.id.as_str())) else {
            return Ok(None);
        };

        let block = Block {
            id: id.into(),
            name: normalize_label(name),
        };
        phase.blocks.push(block.clone());
        self.put_phase(&phase)?;
        tracing::info!("Added block {} to phase {}", block.id, phase.id);
        Ok(Some(block))
    }

    fn delete_phase(&self, phase_id: &PhaseId) -> Result<usize> {
        let mut batch = WriteBatch::default();
        batch.delete(format!("phase:{}", phase_id).as_bytes());
        let lots = self.delete_prefix(&mut batch, &format!("lot:{}|", phase_id))?;
        self.db.write(batch)?;

        tracing::info!("Deleted phase {} with {} lot(s)", phase_id, lots);
        Ok(lots)
    }

    fn delete_block(&self, scope: &Scope) -> Result<usize> {
        let mut batch = WriteBatch::default();
        if let Some(mut phase) = self.get_phase(&scope.phase_id)? {
            phase.blocks.retain(|b| b.id != scope.block_id);
            batch.put(
                format!("phase:{}", phase.id).as_bytes(),
                serde_json::to_vec(&phase)?,
            );
        }
        let lots = self.delete_prefix(&mut batch, &scope_prefix(scope))?;
        self.db.write(batch)?;

        tracing::info!("Deleted block {} with {} lot(s)", scope, lots);
        Ok(lots)
    }

    fn fetch_lots(&self, scope: &Scope) -> Result<Vec<Lot>> {
        let mut lots: Vec<Lot> = self.scan(&scope_prefix(scope))?;
        lots.sort_by_key(|l| l.lot_no);
        Ok(lots)
    }

    fn fetch_phase_lots(&self, phase_id: &PhaseId) -> Result<Vec<Lot>> {
        self.scan(&format!("lot:{}|", phase_id))
    }

    fn add_lot(&self, scope: &Scope, lot_no: LotNo) -> Result<Option<Lot>> {
        let _guard = self.lock_lots()?;
        if self.fetch_lots(scope)?.iter().any(|l| l.lot_no == lot_no) {
            return Ok(None);
        }

        let lot = stamped(Lot::new(scope, lot_no));
        self.put_lot(&lot)?;
        Ok(Some(lot))
    }

    fn add_lot_range(&self, scope: &Scope, range: LotRange) -> Result<RangePlan> {
        let _guard = self.lock_lots()?;
        let existing = self.fetch_lots(scope)?;
        let plan = plan_lot_range(existing.iter().map(|l| l.lot_no), range);

        let mut batch = WriteBatch::default();
        for n in &plan.create {
            self.write_lot(&mut batch, &stamped(Lot::new(scope, *n)))?;
        }
        self.db.write(batch)?;

        tracing::info!(
            "Added {} lot(s) to {}, skipped {} existing",
            plan.create.len(),
            scope,
            plan.skipped.len()
        );
        Ok(plan)
    }

    fn set_lot_assignment(
        &self,
        scope: &Scope,
        lot_id: &LotId,
        resident: Option<&ResidentId>,
    ) -> Result<Lot> {
        let _guard = self.lock_lots()?;
        let mut lot = self
            .get_lot(scope, lot_id)?
            .ok_or_else(|| Error::NotFound(format!("lot {}", lot_id)))?;

        lot.assigned_resident_id = resident.cloned();
        lot.status = match resident {
            Some(_) => Some(OccupancyStatus::Occupied),
            None => lot.status.or(Some(OccupancyStatus::Vacant)),
        };
        lot.updated_at = Some(now_millis());

        self.put_lot(&lot)?;
        Ok(lot)
    }

    fn delete_lot(&self, scope: &Scope, lot_id: &LotId) -> Result<bool> {
        let _guard = self.lock_lots()?;
        let key = lot_key(scope, lot_id);
        if self.db.get(key.as_bytes())?.is_none() {
            return Ok(false);
        }
        self.db.delete(key.as_bytes())?;
        Ok(true)
    }

    fn fetch_residents(&self) -> Result<Vec<Resident>> {
        self.scan("resident:")
    }

    fn put_resident(&self, resident: &Resident) -> Result<()> {
        let key = format!("resident:{}", resident.id);
        let value = serde_json::to_vec(resident)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }
}

impl PreferenceStore for Storage {
    fn load_view_scope(&self) -> Result<ViewScope> {
        match self.db.get(VIEW_SCOPE_KEY)? {
            Some(data) => Ok(serde_json::from_slice(&data)?),
            None => Ok(ViewScope::default()),
        }
    }

    fn save_view_scope(&self, view: &ViewScope) -> Result<()> {
        self.db.put(VIEW_SCOPE_KEY, serde_json::to_vec(view)?)?;
        Ok(())
    }
}

fn scope_prefix(scope: &Scope) -> String {
    format!("lot:{}|{}|", scope.phase_id, scope.block_id)
}

fn lot_key(scope: &Scope, lot_id: &LotId) -> String {
    format!("{}{}", scope_prefix(scope), lot_id)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn stamped(mut lot: Lot) -> Lot {
    let now = now_millis();
    lot.created_at = Some(now);
    lot.updated_at = Some(now);
    lot
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lot_no(n: u32) -> LotNo {
        LotNo::new(n).unwrap()
    }

    fn open() -> (tempfile::TempDir, Storage) {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        (dir, storage)
    }

    #[test]
    fn phase_ids_are_unique_slugs() {
        let (_dir, storage) = open();

        let a = storage.add_phase("Phase 1").unwrap().unwrap();
        let b = storage.add_phase("  Phase   1 ").unwrap().unwrap();
        assert_eq!(a.id.as_str(), "phase-1");
        assert_eq!(b.id.as_str(), "phase-1-2");
        assert_eq!(b.name, "Phase 1");
        assert!(storage.add_phase("!!").unwrap().is_none());
        assert_eq!(storage.list_phases().unwrap().len(), 2);
    }

    #[test]
    fn add_block_to_missing_phase_fails() {
        let (_dir, storage) = open();
        let err = storage.add_block(&"nope".into(), "Block 1").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn lots_are_scoped_and_sorted() {
        let (_dir, storage) = open();
        let b1 = Scope::new("phase-1", "block-1");
        let b2 = Scope::new("phase-1", "block-2");

        for n in [3, 1, 2] {
            storage.add_lot(&b1, lot_no(n)).unwrap();
        }
        storage.add_lot(&b2, lot_no(1)).unwrap();

        let lots = storage.fetch_lots(&b1).unwrap();
        let nos: Vec<u32> = lots.iter().map(|l| l.lot_no.get()).collect();
        assert_eq!(nos, vec![1, 2, 3]);
        assert!(lots.iter().all(|l| l.in_scope(&b1)));
        assert!(lots.iter().all(|l| l.created_at.is_some()));
        assert_eq!(storage.fetch_phase_lots(&"phase-1".into()).unwrap().len(), 4);
    }

    #[test]
    fn add_existing_lot_is_noop() {
        let (_dir, storage) = open();
        let scope = Scope::new("phase-1", "block-1");

        let first = storage.add_lot(&scope, lot_no(1)).unwrap().unwrap();
        storage
            .set_lot_assignment(&scope, &first.id, Some(&"r1".into()))
            .unwrap();

        assert!(storage.add_lot(&scope, lot_no(1)).unwrap().is_none());
        let lots = storage.fetch_lots(&scope).unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].assigned_resident_id, Some("r1".into()));
    }

    #[test]
    fn bulk_add_keeps_existing_lots() {
        let (_dir, storage) = open();
        let scope = Scope::new("phase-1", "block-1");
        for n in [1, 2, 5] {
            storage.add_lot(&scope, lot_no(n)).unwrap();
        }
        let lot_two = storage.fetch_lots(&scope).unwrap()[1].clone();
        storage
            .set_lot_assignment(&scope, &lot_two.id, Some(&"r2".into()))
            .unwrap();

        let plan = storage
            .add_lot_range(&scope, LotRange::normalize(5, 1).unwrap())
            .unwrap();
        let created: Vec<u32> = plan.create.iter().map(|n| n.get()).collect();
        assert_eq!(created, vec![3, 4]);

        let lots = storage.fetch_lots(&scope).unwrap();
        assert_eq!(lots.len(), 5);
        assert_eq!(lots[1].assigned_resident_id, Some("r2".into()));
    }

    #[test]
    fn concurrent_range_adds_create_each_number_once() {
        let (_dir, storage) = open();
        let scope = Scope::new("phase-1", "block-1");
        let range = LotRange::normalize(1, 50).unwrap();

        let created: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| storage.add_lot_range(&scope, range).unwrap().create.len()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(created, 50);
        assert_eq!(storage.fetch_lots(&scope).unwrap().len(), 50);
    }

    #[test]
    fn assignment_updates_status() {
        let (_dir, storage) = open();
        let scope = Scope::new("phase-1", "block-1");
        let lot = storage.add_lot(&scope, lot_no(4)).unwrap().unwrap();

        let assigned = storage
            .set_lot_assignment(&scope, &lot.id, Some(&"r4".into()))
            .unwrap();
        assert_eq!(assigned.status, Some(OccupancyStatus::Occupied));

        let cleared = storage.set_lot_assignment(&scope, &lot.id, None).unwrap();
        assert!(cleared.assigned_resident_id.is_none());
        // Clearing keeps the previous status.
        assert_eq!(cleared.status, Some(OccupancyStatus::Occupied));

        assert!(storage
            .set_lot_assignment(&scope, &"missing".into(), None)
            .is_err());
    }

    #[test]
    fn delete_block_cascades() {
        let (_dir, storage) = open();
        let phase = storage.add_phase("Phase 1").unwrap().unwrap();
        let b1 = storage.add_block(&phase.id, "Block 1").unwrap().unwrap();
        let b2 = storage.add_block(&phase.id, "Block 2").unwrap().unwrap();
        let s1 = Scope::new(phase.id.clone(), b1.id.clone());
        let s2 = Scope::new(phase.id.clone(), b2.id.clone());

        storage.add_lot_range(&s1, LotRange::normalize(1, 3).unwrap()).unwrap();
        storage.add_lot(&s2, lot_no(1)).unwrap();

        assert_eq!(storage.delete_block(&s1).unwrap(), 3);
        assert!(storage.fetch_lots(&s1).unwrap().is_empty());
        assert_eq!(storage.fetch_lots(&s2).unwrap().len(), 1);

        let phase = storage.get_phase(&phase.id).unwrap().unwrap();
        assert_eq!(phase.blocks.len(), 1);
        assert_eq!(phase.blocks[0].id, b2.id);
    }

    #[test]
    fn delete_phase_cascades_without_touching_siblings() {
        let (_dir, storage) = open();
        let p1 = storage.add_phase("Phase 1").unwrap().unwrap();
        let p10 = storage.add_phase("Phase 10").unwrap().unwrap();
        let b = storage.add_block(&p1.id, "Block 1").unwrap().unwrap();
        let b10 = storage.add_block(&p10.id, "Block 1").unwrap().unwrap();

        storage
            .add_lot_range(&Scope::new(p1.id.clone(), b.id), LotRange::normalize(1, 2).unwrap())
            .unwrap();
        storage
            .add_lot(&Scope::new(p10.id.clone(), b10.id), lot_no(1))
            .unwrap();

        assert_eq!(storage.delete_phase(&p1.id).unwrap(), 2);
        assert!(storage.get_phase(&p1.id).unwrap().is_none());
        assert_eq!(storage.fetch_phase_lots(&p10.id).unwrap().len(), 1);
    }

    #[test]
    fn delete_lot_reports_missing() {
        let (_dir, storage) = open();
        let scope = Scope::new("phase-1", "block-1");
        let lot = storage.add_lot(&scope, lot_no(1)).unwrap().unwrap();

        assert!(storage.delete_lot(&scope, &lot.id).unwrap());
        assert!(!storage.delete_lot(&scope, &lot.id).unwrap());
    }

    #[test]
    fn residents_roundtrip() {
        let (_dir, storage) = open();
        let resident = Resident::new("r1", "Ana", "Reyes", "Lot 1").in_scope("Phase 1", "Block 1");

        storage.put_resident(&resident).unwrap();
        assert_eq!(storage.get_resident(&"r1".into()).unwrap(), Some(resident));
        assert_eq!(storage.fetch_residents().unwrap().len(), 1);

        storage.delete_resident(&"r1".into()).unwrap();
        assert!(storage.fetch_residents().unwrap().is_empty());
    }

    #[test]
    fn view_scope_defaults_then_persists() {
        let (_dir, storage) = open();
        assert_eq!(storage.load_view_scope().unwrap(), ViewScope::default());

        let mut view = ViewScope::new("Phase 2", "Block 3");
        view.set_expanded(Some(lot_no(7)));
        storage.save_view_scope(&view).unwrap();
        assert_eq!(storage.load_view_scope().unwrap(), view);
    }
}
