//! Keyword index: flattening categories into a keyword -> color lookup
//!
//! Keywords are normalized (trimmed, lowercased) so matching is
//! case-insensitive. When the same keyword appears in several categories
//! the later category wins, matching the order the host persists them in.

use crate::engine::category::{is_valid_color, Category};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// =============================================================================
// Types
// =============================================================================

/// A non-fatal problem noticed while processing a batch. The rest of the
/// batch proceeds; notes surface in the apply report for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipNote {
    pub stage: String,
    pub detail: String,
}

impl SkipNote {
    pub fn new(stage: &str, detail: String) -> Self {
        Self {
            stage: stage.to_string(),
            detail,
        }
    }
}

/// Normalized keyword -> background color lookup
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    map: HashMap<String, String>,
}

// =============================================================================
// KeywordIndex
// =============================================================================

impl KeywordIndex {
    /// Flatten a category batch into the index.
    ///
    /// Malformed entries never abort the batch: a duplicate category id or
    /// an invalid color skips that category, an empty keyword skips just
    /// that keyword. Skips are reported alongside the index.
    pub fn build(categories: &[Category]) -> (KeywordIndex, Vec<SkipNote>) {
        let mut map: HashMap<String, String> = HashMap::new();
        let mut notes: Vec<SkipNote> = Vec::new();
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for category in categories {
            if !seen_ids.insert(category.id.as_str()) {
                notes.push(SkipNote::new(
                    "category",
                    format!("duplicate category id {:?} skipped", category.id),
                ));
                continue;
            }
            if !is_valid_color(&category.color) {
                notes.push(SkipNote::new(
                    "category",
                    format!(
                        "category {:?} has invalid color {:?}",
                        category.id, category.color
                    ),
                ));
                continue;
            }

            for keyword in &category.keywords {
                let normalized = keyword.trim().to_lowercase();
                if normalized.is_empty() {
                    continue;
                }
                // Later categories override earlier ones for shared keywords
                map.insert(normalized, category.color.clone());
            }
        }

        (KeywordIndex { map }, notes)
    }

    /// Background color for a normalized keyword.
    pub fn color_for(&self, keyword: &str) -> Option<&str> {
        self.map.get(keyword).map(|c| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Keyword/color pairs ordered longest keyword first.
    ///
    /// The order is deterministic so automaton pattern ids are stable for
    /// a given index.
    pub fn patterns(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        pairs
    }
}

// =============================================================================
// Tests
// =============================================================================
