use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog;

/// Where each canonical field comes from in an uploaded file.
///
/// `None` means unmapped. The struct round-trips as JSON so a guessed
/// mapping can be reviewed, hand-corrected, and fed back to an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldMapping {
    pub id: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<String>,
    pub updated_at: Option<String>,
    pub member: Option<String>,
    pub producer: Option<String>,
    pub region: Option<String>,
    pub polish_ratio: Option<String>,
    pub note: Option<String>,
    pub meeting_no: Option<String>,
    pub meeting_at: Option<String>,
}

impl FieldMapping {
    /// Raw column mapped to `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        let slot = match field {
            "id" => &self.id,
            "name" => &self.name,
            "category" => &self.category,
            "quantity" => &self.quantity,
            "updated_at" => &self.updated_at,
            "member" => &self.member,
            "producer" => &self.producer,
            "region" => &self.region,
            "polish_ratio" => &self.polish_ratio,
            "note" => &self.note,
            "meeting_no" => &self.meeting_no,
            "meeting_at" => &self.meeting_at,
            _ => return None,
        };
        slot.as_deref()
    }

    /// Maps `field` to `column`. Returns false for a non-canonical field.
    pub fn set(&mut self, field: &str, column: impl Into<String>) -> bool {
        let slot = match field {
            "id" => &mut self.id,
            "name" => &mut self.name,
            "category" => &mut self.category,
            "quantity" => &mut self.quantity,
            "updated_at" => &mut self.updated_at,
            "member" => &mut self.member,
            "producer" => &mut self.producer,
            "region" => &mut self.region,
            "polish_ratio" => &mut self.polish_ratio,
            "note" => &mut self.note,
            "meeting_no" => &mut self.meeting_no,
            "meeting_at" => &mut self.meeting_at,
            _ => return false,
        };
        *slot = Some(column.into());
        true
    }

    /// Mapping a file already in canonical shape needs: every field maps
    /// to the column of the same name.
    pub fn identity() -> Self {
        let mut mapping = Self::default();
        for field in catalog::canonical_fields() {
            mapping.set(field, field);
        }
        mapping
    }

    pub fn is_empty(&self) -> bool {
        catalog::canonical_fields().all(|f| self.get(f).is_none())
    }

    /// `(field, raw column)` pairs for every mapped field, in canonical order.
    pub fn mapped(&self) -> Vec<(&'static str, &str)> {
        catalog::canonical_fields()
            .filter_map(|f| self.get(f).map(|c| (f, c)))
            .collect()
    }

    /// Required fields the mapping leaves unmapped. Normalization fills
    /// these with defaults, so callers only warn.
    pub fn missing_required(&self) -> Vec<&'static str> {
        catalog::REQUIRED_FIELDS
            .into_iter()
            .filter(|f| self.get(f).is_none())
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapping file: {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse mapping JSON")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize mapping")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write mapping file: {}", path.display()))?;
        Ok(())
    }
}

/// Guesses which raw column feeds each canonical field.
///
/// Per field, raw columns are scanned in their original order and the first
/// column containing any of the field's keywords (case-insensitive) wins.
/// Several fields may legitimately claim the same column. Unmatched fields
/// stay unmapped; empty input yields an empty mapping.
pub fn guess<S: AsRef<str>>(raw_columns: &[S]) -> FieldMapping {
    let mut mapping = FieldMapping::default();
    for (field, keywords) in &catalog::MAPPING_KEYWORDS {
        for col in raw_columns {
            let lowered = col.as_ref().to_lowercase();
            if keywords.iter().any(|k| lowered.contains(k)) {
                mapping.set(field, col.as_ref());
                break;
            }
        }
    }
    mapping
}
