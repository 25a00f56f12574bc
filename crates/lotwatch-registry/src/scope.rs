//! Remembered view selection.

use crate::model::{LotNo, Phase, Scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_PHASE: &str = "Phase 1";
pub const DEFAULT_BLOCK: &str = "Block 1";

/// The phase/block an operator is looking at, by display name, plus which lot
/// row was expanded in each scope.
///
/// This is a plain value. Persisting it across sessions belongs to the
/// preference store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewScope {
    pub phase: String,
    pub block: String,
    #[serde(default)]
    expanded: BTreeMap<String, LotNo>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new(DEFAULT_PHASE, DEFAULT_BLOCK)
    }
}

impl ViewScope {
    pub fn new(phase: impl Into<String>, block: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            block: block.into(),
            expanded: BTreeMap::new(),
        }
    }

    /// Snap the selection onto the current hierarchy.
    ///
    /// A remembered phase that no longer exists falls back to the first phase.
    /// A remembered block missing from the chosen phase falls back to the
    /// alphabetically first block name. Expanded rows are kept.
    pub fn resolve(&self, phases: &[Phase]) -> Self {
        let phase = phases
            .iter()
            .find(|p| p.name == self.phase)
            .or_else(|| phases.first());

        let Some(phase) = phase else {
            return Self {
                phase: DEFAULT_PHASE.to_string(),
                block: DEFAULT_BLOCK.to_string(),
                expanded: self.expanded.clone(),
            };
        };

        let block = if phase.block_by_name(&self.block).is_some() {
            self.block.clone()
        } else {
            first_block_name(phase).unwrap_or_else(|| DEFAULT_BLOCK.to_string())
        };

        Self {
            phase: phase.name.clone(),
            block,
            expanded: self.expanded.clone(),
        }
    }

    /// Ids for the selection, if both names exist in the hierarchy.
    pub fn to_scope(&self, phases: &[Phase]) -> Option<Scope> {
        let phase = phases.iter().find(|p| p.name == self.phase)?;
        let block = phase.block_by_name(&self.block)?;
        Some(Scope::new(phase.id.clone(), block.id.clone()))
    }

    /// Switch phase, landing on that phase's first block.
    pub fn select_phase(&mut self, phases: &[Phase], phase: &str) {
        self.phase = phase.to_string();
        self.block = phases
            .iter()
            .find(|p| p.name == phase)
            .and_then(first_block_name)
            .unwrap_or_else(|| DEFAULT_BLOCK.to_string());
    }

    pub fn select_block(&mut self, block: &str) {
        self.block = block.to_string();
    }

    /// Expanded lot row for the current selection.
    pub fn expanded(&self) -> Option<LotNo> {
        self.expanded.get(&self.expanded_key()).copied()
    }

    pub fn set_expanded(&mut self, lot: Option<LotNo>) {
        let key = self.expanded_key();
        match lot {
            Some(n) => {
                self.expanded.insert(key, n);
            }
            None => {
                self.expanded.remove(&key);
            }
        }
    }

    fn expanded_key(&self) -> String {
        format!("{}:{}", self.phase, self.block)
    }
}

fn first_block_name(phase: &Phase) -> Option<String> {
    phase.blocks.iter().map(|b| b.name.clone()).min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phases() -> Vec<Phase> {
        vec![
            Phase::new("phase-1", "Phase 1")
                .with_block("block-2", "Block 2")
                .with_block("block-1", "Block 1"),
            Phase::new("phase-2", "Phase 2").with_block("block-3", "Block 3"),
        ]
    }

    #[test]
    fn valid_selection_kept() {
        let view = ViewScope::new("Phase 1", "Block 2");
        assert_eq!(view.resolve(&phases()), view);
    }

    #[test]
    fn missing_phase_falls_back_to_first() {
        let view = ViewScope::new("Phase 9", "Block 3").resolve(&phases());
        assert_eq!(view.phase, "Phase 1");
        assert_eq!(view.block, "Block 1");
    }

    #[test]
    fn missing_block_falls_back_to_first_name() {
        let view = ViewScope::new("Phase 2", "Block 1").resolve(&phases());
        assert_eq!(view.phase, "Phase 2");
        assert_eq!(view.block, "Block 3");
    }

    #[test]
    fn empty_hierarchy_uses_defaults() {
        let view = ViewScope::new("Phase 4", "Block 4").resolve(&[]);
        assert_eq!(view, ViewScope::default());
    }

    #[test]
    fn scope_ids() {
        let scope = ViewScope::new("Phase 1", "Block 2").to_scope(&phases());
        assert_eq!(scope, Some(Scope::new("phase-1", "block-2")));
        assert_eq!(ViewScope::new("Phase 1", "Block 3").to_scope(&phases()), None);
    }

    #[test]
    fn expanded_row_remembered_per_scope() {
        let phases = phases();
        let mut view = ViewScope::new("Phase 1", "Block 1");
        view.set_expanded(Some(LotNo::new(3).unwrap()));

        view.select_phase(&phases, "Phase 2");
        assert_eq!(view.block, "Block 3");
        assert_eq!(view.expanded(), None);

        view.select_phase(&phases, "Phase 1");
        assert_eq!(view.expanded().map(LotNo::get), Some(3));

        view.set_expanded(None);
        assert_eq!(view.expanded(), None);
    }

    #[test]
    fn serde_roundtrip_keeps_expanded() {
        let mut view = ViewScope::new("Phase 1", "Block 1");
        view.set_expanded(Some(LotNo::new(2).unwrap()));
        let json = serde_json::to_string(&view).unwrap();
        let parsed: ViewScope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, view);
    }
}
