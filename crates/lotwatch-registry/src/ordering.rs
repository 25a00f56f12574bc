//! Deterministic lot ordering.

use crate::model::{Lot, LotNo, Scope};
use crate::warning::Warning;
use std::collections::BTreeMap;

/// Sort lots ascending by lot number.
///
/// Stable: lots sharing a number keep their input order. Duplicates pass
/// through untouched.
pub fn sort_lots(lots: &[Lot]) -> Vec<&Lot> {
    let mut sorted: Vec<&Lot> = lots.iter().collect();
    sorted.sort_by_key(|l| l.lot_no);
    sorted
}

/// Every (scope, lot number) pair held by more than one lot, with its count.
pub fn duplicate_lot_numbers(lots: &[Lot]) -> Vec<(Scope, LotNo, usize)> {
    let mut counts: BTreeMap<(Scope, LotNo), usize> = BTreeMap::new();
    for lot in lots {
        *counts.entry((lot.scope(), lot.lot_no)).or_default() += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((scope, lot_no), count)| (scope, lot_no, count))
        .collect()
}

pub(crate) fn duplicate_warnings(lots: &[Lot]) -> Vec<Warning> {
    duplicate_lot_numbers(lots)
        .into_iter()
        .map(|(scope, lot_no, count)| {
            tracing::warn!("Lot number {} appears {} times in {}", lot_no, count, scope);
            Warning::DuplicateLotNo {
                scope,
                lot_no,
                count,
            }
        })
        .collect()
}
