//! Highlight lifecycle: applying marks and restoring the page
//!
//! The highlighter owns the only pieces of state that matter for undo:
//! which wrapper nodes it created and the exact text each one replaced.
//! `apply` always clears first, so repeated calls converge on the latest
//! category set instead of stacking wrappers inside wrappers.

use crate::engine::category::Category;
use crate::engine::dom::{Dom, DomError, NodeId};
use crate::engine::index::{KeywordIndex, SkipNote};
use crate::engine::matcher::{self, KeywordMatcher, MatchSpan, Segment};
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Class on each mark span wrapping one matched keyword
pub const MARK_CLASS: &str = "keyword-highlight";

/// Class on the container span that replaces a marked text unit
pub const WRAPPER_CLASS: &str = "keyword-highlight-container";

/// Inline style for one mark span.
fn mark_style(color: &str, contrast: &str) -> String {
    format!(
        "background-color: {}; color: {}; padding: 1px 2px; border-radius: 2px",
        color, contrast
    )
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No wrappers in the page, nothing to restore
    Cleared,
    /// Wrappers present, records know how to undo them
    Highlighted,
}

/// What one wrapped text unit looked like before marking
#[derive(Debug, Clone)]
struct HighlightRecord {
    wrapper: NodeId,
    original: String,
}

/// Outcome of one apply pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Text units enumerated
    pub units_scanned: usize,
    /// Text units replaced by a wrapper
    pub units_marked: usize,
    /// Keyword occurrences wrapped
    pub matches: usize,
    /// Wrappers restored by the leading clear
    pub cleared: usize,
    /// Non-fatal problems noticed along the way
    pub skipped: Vec<SkipNote>,
}

// =============================================================================
// Highlighter
// =============================================================================

pub struct Highlighter {
    state: State,
    records: Vec<HighlightRecord>,
    snapshot: Vec<Category>,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    pub fn new() -> Self {
        Self {
            state: State::Cleared,
            records: Vec::new(),
            snapshot: Vec::new(),
        }
    }

    pub fn is_highlighted(&self) -> bool {
        self.state == State::Highlighted
    }

    /// Category set from the most recent apply (or staging).
    pub fn categories(&self) -> &[Category] {
        &self.snapshot
    }

    /// Live wrapper count.
    pub fn mark_count(&self) -> usize {
        self.records.len()
    }

    /// Stage a category set without touching the page.
    pub(crate) fn replace_snapshot(&mut self, categories: &[Category]) {
        self.snapshot = categories.to_vec();
    }

    /// Drop all records without restoring. Only valid when the document
    /// they pointed into has been thrown away.
    pub(crate) fn forget_marks(&mut self) {
        self.records.clear();
        self.state = State::Cleared;
    }

    /// Clear existing marks, then wrap every whole-word keyword occurrence
    /// from `categories` in the document.
    ///
    /// Malformed categories and vanished nodes degrade to skip notes in
    /// the report; the pass never aborts half-way.
    pub fn apply(&mut self, dom: &mut Dom, categories: &[Category]) -> ApplyReport {
        let mut report = ApplyReport {
            cleared: self.clear_marks(dom),
            ..ApplyReport::default()
        };
        self.snapshot = categories.to_vec();

        let (index, skipped) = KeywordIndex::build(categories);
        report.skipped = skipped;
        if index.is_empty() {
            // Valid no-op: nothing to look for
            self.state = State::Cleared;
            return report;
        }

        let matcher = match KeywordMatcher::from_index(&index) {
            Ok(matcher) => matcher,
            Err(detail) => {
                report.skipped.push(SkipNote::new("matcher", detail));
                self.state = State::Cleared;
                return report;
            }
        };

        // Enumerate first, mutate after: replacing a unit must not disturb
        // the walk that found it.
        let units: Vec<NodeId> = dom.text_units().collect();
        for unit in units {
            report.units_scanned += 1;
            let text = match dom.text(unit) {
                Some(text) => text.to_string(),
                None => {
                    report.skipped.push(SkipNote::new(
                        "unit",
                        format!("text unit {:?} vanished before marking", unit),
                    ));
                    continue;
                }
            };

            let spans = matcher.scan(&text);
            if spans.is_empty() {
                continue; // unit stays untouched
            }

            match self.mark_unit(dom, unit, &text, &spans) {
                Ok(()) => {
                    report.units_marked += 1;
                    report.matches += spans.len();
                }
                Err(err) => {
                    report
                        .skipped
                        .push(SkipNote::new("mark", err.to_string()));
                }
            }
        }

        self.state = State::Highlighted;
        report
    }

    /// Restore every recorded wrapper to its original text node.
    /// Idempotent: a second clear finds no records and does nothing.
    pub fn clear(&mut self, dom: &mut Dom) -> usize {
        let restored = self.clear_marks(dom);
        self.state = State::Cleared;
        restored
    }

    fn clear_marks(&mut self, dom: &mut Dom) -> usize {
        let mut restored = 0;
        dom.begin_engine_edit();
        for record in std::mem::take(&mut self.records) {
            if !dom.is_alive(record.wrapper) {
                continue; // host already removed it, treat as cleared
            }
            let text = dom.create_text(&record.original);
            if dom.replace_node(record.wrapper, text).is_ok() {
                restored += 1;
            } else {
                let _ = dom.remove_node(text);
            }
        }
        dom.end_engine_edit();
        restored
    }

    fn mark_unit(
        &mut self,
        dom: &mut Dom,
        unit: NodeId,
        text: &str,
        spans: &[MatchSpan],
    ) -> Result<(), DomError> {
        dom.begin_engine_edit();
        let result = self.mark_unit_inner(dom, unit, text, spans);
        dom.end_engine_edit();
        result
    }

    fn mark_unit_inner(
        &mut self,
        dom: &mut Dom,
        unit: NodeId,
        text: &str,
        spans: &[MatchSpan],
    ) -> Result<(), DomError> {
        let wrapper = dom.create_element("span");
        dom.add_class(wrapper, WRAPPER_CLASS)?;

        for segment in matcher::segment(text, spans) {
            match segment {
                Segment::Plain(plain) => {
                    let node = dom.create_text(&plain);
                    dom.append_child(wrapper, node)?;
                }
                Segment::Mark {
                    text: matched,
                    color,
                    contrast,
                } => {
                    let mark = dom.create_element("span");
                    dom.add_class(mark, MARK_CLASS)?;
                    dom.set_style(mark, &mark_style(&color, contrast))?;
                    let node = dom.create_text(&matched);
                    dom.append_child(mark, node)?;
                    dom.append_child(wrapper, mark)?;
                }
            }
        }

        if let Err(err) = dom.replace_node(unit, wrapper) {
            let _ = dom.remove_node(wrapper);
            return Err(err);
        }

        self.records.push(HighlightRecord {
            wrapper,
            original: text.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dom::DomLiteral;

    fn load(json: &str) -> Dom {
        let literal: DomLiteral = serde_json::from_str(json).unwrap();
        Dom::from_literal(&literal)
    }

    fn page() -> Dom {
        load(
            r#"{"kind": "element", "tag": "body", "children": [
                {"kind": "element", "tag": "p", "children": [
                    {"kind": "text", "content": "This is urgent business."}
                ]},
                {"kind": "element", "tag": "p", "children": [
                    {"kind": "text", "content": "Nothing to see here."}
                ]},
                {"kind": "element", "tag": "script", "children": [
                    {"kind": "text", "content": "urgent();"}
                ]}
            ]}"#,
        )
    }

    fn category(id: &str, color: &str, keywords: &[&str]) -> Category {
        Category {
            id: id.to_string(),
            name: format!("Category {}", id),
            color: color.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    // -------------------------------------------------------------------------
    // Requirement 1: Apply wraps matched units in the container structure
    // -------------------------------------------------------------------------
    #[test]
    fn test_apply_wraps_matches() {
        let mut dom = page();
        let mut highlighter = Highlighter::new();

        let report = highlighter.apply(&mut dom, &[category("a", "#ffff00", &["urgent"])]);

        assert_eq!(report.units_scanned, 2);
        assert_eq!(report.units_marked, 1);
        assert_eq!(report.matches, 1);
        assert!(report.skipped.is_empty());
        assert!(highlighter.is_highlighted());

        let wrappers = dom.find_by_class(WRAPPER_CLASS);
        assert_eq!(wrappers.len(), 1);
        let marks = dom.find_by_class(MARK_CLASS);
        assert_eq!(marks.len(), 1);
        assert_eq!(dom.text_content(marks[0]), "urgent");
        assert_eq!(
            dom.style(marks[0]),
            Some("background-color: #ffff00; color: #000000; padding: 1px 2px; border-radius: 2px")
        );
        // Wrapper preserves the full unit text around the mark
        assert_eq!(dom.text_content(wrappers[0]), "This is urgent business.");
    }

    // -------------------------------------------------------------------------
    // Requirement 2: Clear restores the page byte for byte
    // -------------------------------------------------------------------------
    #[test]
    fn test_clear_round_trip() {
        let mut dom = page();
        let pristine = dom.to_literal();
        let mut highlighter = Highlighter::new();

        highlighter.apply(&mut dom, &[category("a", "#ffff00", &["urgent", "business"])]);
        assert_ne!(dom.to_literal(), pristine);

        let restored = highlighter.clear(&mut dom);
        assert_eq!(restored, 1);
        assert!(!highlighter.is_highlighted());
        assert_eq!(dom.to_literal(), pristine);
        assert!(dom.find_by_class(WRAPPER_CLASS).is_empty());
    }

    // -------------------------------------------------------------------------
    // Requirement 3: Clear is idempotent
    // -------------------------------------------------------------------------
    #[test]
    fn test_clear_twice() {
        let mut dom = page();
        let mut highlighter = Highlighter::new();

        highlighter.apply(&mut dom, &[category("a", "#ffff00", &["urgent"])]);
        assert_eq!(highlighter.clear(&mut dom), 1);
        assert_eq!(highlighter.clear(&mut dom), 0);
        assert_eq!(highlighter.mark_count(), 0);
    }

    // -------------------------------------------------------------------------
    // Requirement 4: Re-apply never stacks wrappers
    // -------------------------------------------------------------------------
    #[test]
    fn test_apply_idempotent() {
        let mut dom = page();
        let mut highlighter = Highlighter::new();
        let categories = [category("a", "#ffff00", &["urgent"])];

        highlighter.apply(&mut dom, &categories);
        let first_pass = dom.to_literal();

        let report = highlighter.apply(&mut dom, &categories);
        assert_eq!(report.cleared, 1);
        assert_eq!(report.units_marked, 1);
        assert_eq!(dom.find_by_class(WRAPPER_CLASS).len(), 1);
        assert_eq!(dom.find_by_class(MARK_CLASS).len(), 1);
        assert_eq!(dom.to_literal(), first_pass);
        assert_eq!(
            dom.text_content(dom.root()),
            "This is urgent business.Nothing to see here.urgent();"
        );
    }

    // -------------------------------------------------------------------------
    // Requirement 5: Re-apply reflects the newest category set
    // -------------------------------------------------------------------------
    #[test]
    fn test_apply_latest_set_wins() {
        let mut dom = page();
        let mut highlighter = Highlighter::new();

        highlighter.apply(&mut dom, &[category("a", "#ffff00", &["urgent"])]);
        highlighter.apply(&mut dom, &[category("b", "#00ff00", &["business"])]);

        let marks = dom.find_by_class(MARK_CLASS);
        assert_eq!(marks.len(), 1);
        assert_eq!(dom.text_content(marks[0]), "business");
        assert_eq!(highlighter.categories().len(), 1);
        assert_eq!(highlighter.categories()[0].id, "b");
    }

    // -------------------------------------------------------------------------
    // Requirement 6: Empty category set from a clean slate is a no-op
    // -------------------------------------------------------------------------
    #[test]
    fn test_empty_categories_no_op() {
        let mut dom = page();
        let pristine = dom.to_literal();
        let mut highlighter = Highlighter::new();

        let report = highlighter.apply(&mut dom, &[]);
        assert_eq!(report.units_scanned, 0);
        assert_eq!(report.cleared, 0);
        assert!(!highlighter.is_highlighted());
        assert_eq!(dom.to_literal(), pristine);
        assert!(dom.take_mutations().is_empty());
    }

    // -------------------------------------------------------------------------
    // Requirement 7: Empty set over existing marks still clears them
    // -------------------------------------------------------------------------
    #[test]
    fn test_empty_categories_clears_existing() {
        let mut dom = page();
        let pristine = dom.to_literal();
        let mut highlighter = Highlighter::new();

        highlighter.apply(&mut dom, &[category("a", "#ffff00", &["urgent"])]);
        let report = highlighter.apply(&mut dom, &[]);

        assert_eq!(report.cleared, 1);
        assert!(!highlighter.is_highlighted());
        assert_eq!(dom.to_literal(), pristine);
    }

    // -------------------------------------------------------------------------
    // Requirement 8: Units without matches keep their identity
    // -------------------------------------------------------------------------
    #[test]
    fn test_unmatched_units_untouched() {
        let mut dom = page();
        let quiet = dom.children(dom.children(dom.root())[1])[0];
        assert_eq!(dom.text(quiet), Some("Nothing to see here."));

        let mut highlighter = Highlighter::new();
        highlighter.apply(&mut dom, &[category("a", "#ffff00", &["urgent"])]);

        assert!(dom.is_alive(quiet));
        assert_eq!(dom.text(quiet), Some("Nothing to see here."));
    }

    // -------------------------------------------------------------------------
    // Requirement 9: Script content is never wrapped
    // -------------------------------------------------------------------------
    #[test]
    fn test_script_never_wrapped() {
        let mut dom = page();
        let mut highlighter = Highlighter::new();

        highlighter.apply(&mut dom, &[category("a", "#ffff00", &["urgent"])]);

        let script = dom.children(dom.root())[2];
        assert_eq!(dom.tag(script), Some("script"));
        assert_eq!(dom.text_content(script), "urgent();");
        assert!(dom.render_node(script).contains("urgent();"));
    }

    // -------------------------------------------------------------------------
    // Requirement 10: Malformed categories skip, the rest proceed
    // -------------------------------------------------------------------------
    #[test]
    fn test_malformed_category_degrades() {
        let mut dom = page();
        let mut highlighter = Highlighter::new();

        let report = highlighter.apply(
            &mut dom,
            &[
                category("bad", "not-a-color", &["business"]),
                category("good", "#00ff00", &["urgent"]),
            ],
        );

        assert_eq!(report.units_marked, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].stage, "category");

        let marks = dom.find_by_class(MARK_CLASS);
        assert_eq!(marks.len(), 1);
        assert_eq!(dom.text_content(marks[0]), "urgent");
    }

    // -------------------------------------------------------------------------
    // Requirement 11: Shared keyword takes the later category's color
    // -------------------------------------------------------------------------
    #[test]
    fn test_duplicate_keyword_last_color() {
        let mut dom = load(
            r#"{"kind": "element", "tag": "body", "children": [
                {"kind": "text", "content": "hello world"}
            ]}"#,
        );
        let mut highlighter = Highlighter::new();

        highlighter.apply(
            &mut dom,
            &[
                category("a", "#ffff00", &["hello"]),
                category("b", "#222222", &["hello"]),
            ],
        );

        let marks = dom.find_by_class(MARK_CLASS);
        assert_eq!(marks.len(), 1);
        let style = dom.style(marks[0]).unwrap_or("");
        assert!(style.contains("background-color: #222222"));
        assert!(style.contains("color: #ffffff"), "dark background needs white text, got {:?}", style);
    }

    // -------------------------------------------------------------------------
    // Requirement 12: A wrapper removed by the host is skipped on clear
    // -------------------------------------------------------------------------
    #[test]
    fn test_clear_skips_vanished_wrapper() {
        let mut dom = page();
        let mut highlighter = Highlighter::new();

        highlighter.apply(
            &mut dom,
            &[category("a", "#ffff00", &["urgent", "nothing"])],
        );
        assert_eq!(highlighter.mark_count(), 2);

        let wrappers = dom.find_by_class(WRAPPER_CLASS);
        dom.remove_node(wrappers[0]).unwrap();

        // Only the surviving wrapper gets restored; no panic, no error
        assert_eq!(highlighter.clear(&mut dom), 1);
        assert_eq!(dom.find_by_class(WRAPPER_CLASS).len(), 0);
    }

    // -------------------------------------------------------------------------
    // Requirement 13: Multiple matches in one unit share a single wrapper
    // -------------------------------------------------------------------------
    #[test]
    fn test_multiple_matches_one_wrapper() {
        let mut dom = load(
            r#"{"kind": "element", "tag": "body", "children": [
                {"kind": "text", "content": "urgent note, urgent reply"}
            ]}"#,
        );
        let mut highlighter = Highlighter::new();

        let report = highlighter.apply(&mut dom, &[category("a", "#ffff00", &["urgent"])]);

        assert_eq!(report.units_marked, 1);
        assert_eq!(report.matches, 2);
        assert_eq!(dom.find_by_class(WRAPPER_CLASS).len(), 1);
        assert_eq!(dom.find_by_class(MARK_CLASS).len(), 2);
        assert_eq!(dom.text_content(dom.root()), "urgent note, urgent reply");
    }

    // -------------------------------------------------------------------------
    // Requirement 14: Engine rewrites are flagged in the journal
    // -------------------------------------------------------------------------
    #[test]
    fn test_apply_journals_as_engine_authored() {
        let mut dom = page();
        let mut highlighter = Highlighter::new();
        dom.take_mutations();

        highlighter.apply(&mut dom, &[category("a", "#ffff00", &["urgent"])]);
        let records = dom.take_mutations();
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.engine_authored));

        highlighter.clear(&mut dom);
        let records = dom.take_mutations();
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.engine_authored));
    }
}
