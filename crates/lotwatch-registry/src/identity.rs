//! Resident lookup by id.

use crate::model::{Resident, ResidentId};
use crate::warning::Warning;
use std::collections::{HashMap, HashSet};

/// Lookup table from resident id to resident record.
///
/// Built once per snapshot of the resident collection. Duplicate ids keep the
/// last record seen and are remembered for reporting.
#[derive(Debug, Default)]
pub struct IdentityIndex<'a> {
    by_id: HashMap<&'a ResidentId, &'a Resident>,
    ids: HashSet<&'a ResidentId>,
    duplicates: Vec<ResidentId>,
}

impl<'a> IdentityIndex<'a> {
    /// Index a resident collection.
    pub fn build(residents: &'a [Resident]) -> Self {
        let mut by_id = HashMap::with_capacity(residents.len());
        let mut ids = HashSet::with_capacity(residents.len());
        let mut duplicates = Vec::new();

        for resident in residents {
            ids.insert(&resident.id);
            if by_id.insert(&resident.id, resident).is_some() {
                tracing::debug!("Duplicate resident id {}", resident.id);
                if !duplicates.contains(&resident.id) {
                    duplicates.push(resident.id.clone());
                }
            }
        }

        Self {
            by_id,
            ids,
            duplicates,
        }
    }

    pub fn get(&self, id: &ResidentId) -> Option<&'a Resident> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, id: &ResidentId) -> bool {
        self.ids.contains(id)
    }

    /// Set of every indexed resident id.
    pub fn ids(&self) -> &HashSet<&'a ResidentId> {
        &self.ids
    }

    /// Ids that appeared more than once, in first-repeat order.
    pub fn duplicates(&self) -> &[ResidentId] {
        &self.duplicates
    }

    pub fn warnings(&self) -> impl Iterator<Item = Warning> + '_ {
        self.duplicates
            .iter()
            .map(|id| Warning::DuplicateResidentId {
                resident_id: id.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        let index = IdentityIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.ids().is_empty());
        assert!(index.duplicates().is_empty());
    }

    #[test]
    fn lookup_by_id() {
        let residents = vec![
            Resident::new("r1", "Ana", "Reyes", "Lot 1"),
            Resident::new("r2", "Ben", "Cruz", "Lot 2"),
        ];
        let index = IdentityIndex::build(&residents);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&"r2".into()).unwrap().first_name, "Ben");
        assert!(index.contains(&"r1".into()));
        assert!(!index.contains(&"r3".into()));
        assert!(index.get(&"r3".into()).is_none());
    }

    #[test]
    fn duplicate_ids_last_write_wins() {
        let residents = vec![
            Resident::new("r1", "Old", "Record", "Lot 1"),
            Resident::new("r2", "Ben", "Cruz", "Lot 2"),
            Resident::new("r1", "New", "Record", "Lot 3"),
            Resident::new("r1", "Newest", "Record", "Lot 4"),
        ];
        let index = IdentityIndex::build(&residents);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&"r1".into()).unwrap().first_name, "Newest");
        assert_eq!(index.duplicates(), &[ResidentId::from("r1")]);
        assert_eq!(index.warnings().count(), 1);
    }
}
