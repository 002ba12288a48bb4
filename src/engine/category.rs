//! Category model and settings helpers
//!
//! A category pairs one display color with the keyword list it highlights.
//! The struct mirrors the JSON payload the host persists in extension
//! storage, so missing fields deserialize to empty values instead of
//! failing the whole batch.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Background color seeded for the starter category
pub const DEFAULT_COLOR: &str = "#ffff00";

/// Name seeded for the starter category on first run
pub const DEFAULT_CATEGORY_NAME: &str = "Important Terms";

/// Rotation of suggested colors for newly created categories
pub const COLOR_PALETTE: [&str; 7] = [
    "#ffff00", "#00ff00", "#ff00ff", "#00ffff", "#ff8000", "#8000ff", "#ff0080",
];

static COLOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").unwrap());

// =============================================================================
// Types
// =============================================================================

/// One keyword category as persisted by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    #[error("invalid color {color:?} for category {id:?}")]
    InvalidColor { id: String, color: String },
    #[error("category {id:?} has an empty keyword")]
    EmptyKeyword { id: String },
}

impl Category {
    /// Check the category against the shape the engine can render.
    pub fn validate(&self) -> Result<(), CategoryError> {
        if !is_valid_color(&self.color) {
            return Err(CategoryError::InvalidColor {
                id: self.id.clone(),
                color: self.color.clone(),
            });
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(CategoryError::EmptyKeyword {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// True if the string is a `#rgb` or `#rrggbb` hex color.
pub fn is_valid_color(color: &str) -> bool {
    COLOR_PATTERN.is_match(color)
}

/// Split a comma-separated keyword line into trimmed, non-empty keywords.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| k.to_string())
        .collect()
}

/// Starter category set seeded on first run. The keyword list starts
/// empty; the user fills it in from the settings surface.
pub fn default_categories() -> Vec<Category> {
    vec![Category {
        id: generated_id(),
        name: DEFAULT_CATEGORY_NAME.to_string(),
        color: DEFAULT_COLOR.to_string(),
        keywords: Vec::new(),
    }]
}

/// Suggest a palette color for the next category, rotating through the palette.
pub fn suggest_color(existing: usize) -> &'static str {
    COLOR_PALETTE[existing % COLOR_PALETTE.len()]
}

/// Millisecond-timestamp id for a newly created category.
pub fn generated_id() -> String {
    Utc::now().timestamp_millis().to_string()
}

// =============================================================================
// Tests
// =============================================================================
