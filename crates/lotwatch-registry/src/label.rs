//! Label normalization and identifier generation.

use crate::model::{LotId, LotNo, Scope};

/// Clean an operator-entered phase or block name.
///
/// Keeps word characters, whitespace and `-`, then trims and collapses runs
/// of whitespace to a single space.
pub fn normalize_label(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive a unique slug id from a label.
///
/// `Phase 3` becomes `phase-3`; if that is taken, `phase-3-2`, `phase-3-3`, ...
/// Returns `None` when the label normalizes to nothing.
pub fn slug_id<'a, I>(label: &str, taken: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let clean = normalize_label(label);
    if clean.is_empty() {
        return None;
    }

    let base = clean.to_lowercase().replace(' ', "-");
    let taken: Vec<&str> = taken.into_iter().collect();

    let mut id = base.clone();
    let mut i = 2;
    while taken.contains(&id.as_str()) {
        id = format!("{}-{}", base, i);
        i += 1;
    }
    Some(id)
}

/// Identifier for a generated lot: `{phase}:{block}:lot-{n}`.
pub fn lot_id(scope: &Scope, lot_no: LotNo) -> LotId {
    LotId(format!("{}:{}:lot-{}", scope.phase_id, scope.block_id, lot_no))
}

/// Lot number named by a legacy resident label.
///
/// Reads the trailing run of digits: `Lot 2` is 2, `Lot #12` is 12.
/// Labels without a numeric suffix, or naming lot zero, yield `None`.
pub fn lot_number(label: &str) -> Option<LotNo> {
    let label = label.trim_end();
    let digits_start = label
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;

    let n: u32 = label[digits_start..].parse().ok()?;
    LotNo::new(n).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_spacing() {
        assert_eq!(normalize_label("  Phase   2 "), "Phase 2");
        assert_eq!(normalize_label("Block #4!"), "Block 4");
        assert_eq!(normalize_label("North - East"), "North - East");
        assert_eq!(normalize_label("A & B"), "A B");
        assert_eq!(normalize_label("!!!"), "");
    }

    #[test]
    fn slug_is_unique() {
        assert_eq!(slug_id("Phase 3", Vec::<&str>::new()).as_deref(), Some("phase-3"));
        assert_eq!(
            slug_id("Phase 3", ["phase-3", "phase-3-2"]).as_deref(),
            Some("phase-3-3")
        );
        assert_eq!(slug_id("   ", Vec::<&str>::new()), None);
    }

    #[test]
    fn legacy_label_numbers() {
        assert_eq!(lot_number("Lot 2").map(LotNo::get), Some(2));
        assert_eq!(lot_number("Lot #12 ").map(LotNo::get), Some(12));
        assert_eq!(lot_number("7").map(LotNo::get), Some(7));
        assert_eq!(lot_number("Lot 2A"), None);
        assert_eq!(lot_number("Lot"), None);
        assert_eq!(lot_number(""), None);
        assert_eq!(lot_number("Lot 0"), None);
        assert_eq!(lot_number("Lot 99999999999999"), None);
    }

    #[test]
    fn generated_lot_id() {
        let scope = Scope::new("phase-2", "block-1");
        let id = lot_id(&scope, LotNo::new(4).unwrap());
        assert_eq!(id.as_str(), "phase-2:block-1:lot-4");
    }
}
