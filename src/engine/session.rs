//! Page session: command handling and the auto-highlight loop
//!
//! One `PageSession` per loaded document. It owns the highlighter and the
//! change observer, decodes host commands, and drives the debounced
//! re-apply cycle through `pump`. Hosts call `pump` after mutations and
//! whenever `pending_delay` says a deadline is due; the session does the
//! rest.

use crate::engine::category::Category;
use crate::engine::dom::Dom;
use crate::engine::highlighter::{ApplyReport, Highlighter};
use crate::engine::index::SkipNote;
use crate::engine::observer::{ChangeObserver, DEFAULT_QUIET_PERIOD_MS};
use crate::engine::store::CategoryStore;
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Engine tuning, deserialized from host-provided JSON. Missing fields
/// fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period before a mutation-triggered re-apply, in milliseconds
    pub quiet_period_ms: u64,
    /// When false, mutations and bootstrap never apply on their own;
    /// only explicit commands touch the page
    pub auto_apply: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            auto_apply: true,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Host-to-engine message, tagged by `action` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Apply this category set now
    Highlight { categories: Vec<Category> },
    /// Restore the page
    Clear,
    /// The persisted set changed; stage it and, in auto mode, apply
    CategoriesUpdated { categories: Vec<Category> },
}

/// Acknowledgement returned for every handled command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandAck {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn fail(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }
}

// =============================================================================
// PageSession
// =============================================================================

pub struct PageSession {
    highlighter: Highlighter,
    observer: ChangeObserver,
    auto_apply: bool,
    last_report: Option<ApplyReport>,
}

impl Default for PageSession {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl PageSession {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            highlighter: Highlighter::new(),
            observer: ChangeObserver::new(Duration::from_millis(config.quiet_period_ms)),
            auto_apply: config.auto_apply,
            last_report: None,
        }
    }

    /// Load categories from the store and, in auto mode, highlight the
    /// page. A failing store degrades to an empty set with a skip note;
    /// there is no retry.
    pub async fn bootstrap(&mut self, dom: &mut Dom, store: &dyn CategoryStore) -> ApplyReport {
        match store.get().await {
            Ok(categories) => {
                if self.auto_apply {
                    self.apply(dom, &categories)
                } else {
                    self.highlighter.replace_snapshot(&categories);
                    ApplyReport::default()
                }
            }
            Err(err) => {
                let mut report = ApplyReport::default();
                report
                    .skipped
                    .push(SkipNote::new("store", err.to_string()));
                self.last_report = Some(report.clone());
                report
            }
        }
    }

    pub fn apply(&mut self, dom: &mut Dom, categories: &[Category]) -> ApplyReport {
        let report = self.highlighter.apply(dom, categories);
        self.last_report = Some(report.clone());
        report
    }

    pub fn clear(&mut self, dom: &mut Dom) -> usize {
        self.highlighter.clear(dom)
    }

    pub fn handle_command(&mut self, dom: &mut Dom, command: Command) -> CommandAck {
        match command {
            Command::Highlight { categories } => {
                self.apply(dom, &categories);
            }
            Command::Clear => {
                self.clear(dom);
            }
            Command::CategoriesUpdated { categories } => {
                self.categories_changed(dom, &categories);
            }
        }
        CommandAck::ok()
    }

    /// The persisted category set changed. In auto mode a non-empty set is
    /// applied on the spot; an empty set is only staged, leaving whatever
    /// marks are showing alone until an explicit clear.
    pub fn categories_changed(&mut self, dom: &mut Dom, categories: &[Category]) {
        if self.auto_apply && !categories.is_empty() {
            self.apply(dom, categories);
        } else {
            self.highlighter.replace_snapshot(categories);
        }
    }

    /// Drain the mutation journal and run the debounce cycle. Returns the
    /// apply report when the quiet period elapsed and a re-apply ran.
    pub fn pump(&mut self, dom: &mut Dom, now: Instant) -> Option<ApplyReport> {
        let records = dom.take_mutations();
        if !records.is_empty() {
            self.observer.ingest(dom, &records, now);
        }
        if !self.observer.poll(now) {
            return None;
        }
        if !self.auto_apply {
            return None;
        }
        let categories = self.highlighter.categories().to_vec();
        if categories.is_empty() {
            return None;
        }
        Some(self.apply(dom, &categories))
    }

    /// The host swapped the document out. Records pointed into the old
    /// tree, so they are forgotten rather than restored.
    pub fn document_loaded(&mut self) {
        self.highlighter.forget_marks();
        self.observer.cancel();
    }

    pub fn pending_delay(&self, now: Instant) -> Option<Duration> {
        self.observer.pending_delay(now)
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighter.is_highlighted()
    }

    pub fn categories(&self) -> &[Category] {
        self.highlighter.categories()
    }

    pub fn mark_count(&self) -> usize {
        self.highlighter.mark_count()
    }

    pub fn observer(&self) -> &ChangeObserver {
        &self.observer
    }

    pub fn last_report(&self) -> Option<&ApplyReport> {
        self.last_report.as_ref()
    }
}

// =============================================================================
// Tests
// =============================================================================
