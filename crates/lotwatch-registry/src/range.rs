//! Bulk lot ranges.

use crate::error::{Error, Result};
use crate::model::{LotNo, MAX_LOT_NO};
use serde::Serialize;
use std::collections::BTreeSet;

/// An inclusive, ascending range of lot numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LotRange {
    start: LotNo,
    end: LotNo,
}

impl LotRange {
    /// Normalize operator input into a range.
    ///
    /// Negative bounds are rejected. Remaining bounds clamp to
    /// `1..=MAX_LOT_NO` and are swapped into ascending order.
    pub fn normalize(from: i64, to: i64) -> Result<Self> {
        if from < 0 || to < 0 {
            return Err(Error::InvalidRange { from, to });
        }

        let clamp = |n: i64| n.clamp(1, MAX_LOT_NO as i64) as u32;
        let (a, b) = (clamp(from), clamp(to));
        Ok(Self {
            start: LotNo::new(a.min(b))?,
            end: LotNo::new(a.max(b))?,
        })
    }

    pub fn single(n: LotNo) -> Self {
        Self { start: n, end: n }
    }

    pub fn start(&self) -> LotNo {
        self.start
    }

    pub fn end(&self) -> LotNo {
        self.end
    }

    /// Number of lot numbers covered. Never zero.
    pub fn count(&self) -> usize {
        (self.end.get() - self.start.get()) as usize + 1
    }

    pub fn contains(&self, n: LotNo) -> bool {
        self.start <= n && n <= self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = LotNo> {
        // Both bounds are valid lot numbers, so every value between them is too.
        (self.start.get()..=self.end.get()).filter_map(|n| LotNo::new(n).ok())
    }
}

/// Which numbers of a range will be created and which already exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RangePlan {
    pub create: Vec<LotNo>,
    pub skipped: Vec<LotNo>,
}

impl RangePlan {
    pub fn is_noop(&self) -> bool {
        self.create.is_empty()
    }
}

/// Split a range against the lot numbers already present in a scope.
///
/// Existing numbers are never recreated or overwritten.
pub fn plan_lot_range<I>(existing: I, range: LotRange) -> RangePlan
where
    I: IntoIterator<Item = LotNo>,
{
    let existing: BTreeSet<LotNo> = existing.into_iter().collect();
    let (skipped, create): (Vec<LotNo>, Vec<LotNo>) = range.iter().partition(|n| existing.contains(n));
    RangePlan { create, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nos(v: &[LotNo]) -> Vec<u32> {
        v.iter().map(|n| n.get()).collect()
    }

    fn lot_nos(v: &[u32]) -> Vec<LotNo> {
        v.iter().map(|n| LotNo::new(*n).unwrap()).collect()
    }

    #[test]
    fn normalize_swaps_and_clamps() {
        let r = LotRange::normalize(10, 3).unwrap();
        assert_eq!((r.start().get(), r.end().get()), (3, 10));

        let r = LotRange::normalize(0, 20_000).unwrap();
        assert_eq!((r.start().get(), r.end().get()), (1, MAX_LOT_NO));
        assert_eq!(r.count(), MAX_LOT_NO as usize);
    }

    #[test]
    fn negative_bounds_rejected() {
        assert_eq!(
            LotRange::normalize(-1, 5),
            Err(Error::InvalidRange { from: -1, to: 5 })
        );
        assert!(LotRange::normalize(5, -1).is_err());
    }

    #[test]
    fn bulk_add_skips_existing() {
        let range = LotRange::normalize(1, 5).unwrap();
        let plan = plan_lot_range(lot_nos(&[1, 2, 5]), range);
        assert_eq!(nos(&plan.create), vec![3, 4]);
        assert_eq!(nos(&plan.skipped), vec![1, 2, 5]);
    }

    #[test]
    fn fully_occupied_range_is_noop() {
        let range = LotRange::normalize(2, 3).unwrap();
        let plan = plan_lot_range(lot_nos(&[1, 2, 3]), range);
        assert!(plan.is_noop());
    }

    #[test]
    fn single_range() {
        let n = LotNo::new(7).unwrap();
        let r = LotRange::single(n);
        assert_eq!(r.count(), 1);
        assert!(r.contains(n));
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![n]);
    }
}
