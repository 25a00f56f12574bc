//! Resident search.

use crate::model::Resident;
use serde::{Deserialize, Serialize};

/// Filter over the resident collection.
///
/// `phase` and `block` restrict by the names the resident registered under.
/// `text` is a case-insensitive substring match over names, contact details
/// and the legacy lot label. Blank text matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentQuery {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl ResidentQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn in_scope(mut self, phase: impl Into<String>, block: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self.block = Some(block.into());
        self
    }

    pub fn matches(&self, resident: &Resident) -> bool {
        if let Some(phase) = &self.phase {
            if resident.phase.as_deref() != Some(phase.as_str()) {
                return false;
            }
        }
        if let Some(block) = &self.block {
            if resident.block.as_deref() != Some(block.as_str()) {
                return false;
            }
        }

        let needle = self.text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let haystack = [
            resident.first_name.as_str(),
            resident.middle_name.as_deref().unwrap_or(""),
            resident.last_name.as_str(),
            resident.email.as_deref().unwrap_or(""),
            resident.contact_number.as_deref().unwrap_or(""),
            resident.lot.as_str(),
        ]
        .join(" ")
        .to_lowercase();

        haystack.contains(&needle)
    }

    /// Residents matching the query, in input order.
    pub fn filter<'a>(&self, residents: &'a [Resident]) -> Vec<&'a Resident> {
        residents.iter().filter(|r| self.matches(r)).collect()
    }
}
