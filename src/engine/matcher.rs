//! Keyword matching over a single text unit
//!
//! Uses Aho-Corasick for O(n) detection of every keyword in one pass.
//! Candidates are collected overlapping, filtered down to whole-word hits,
//! then resolved to a non-overlapping set: longer keywords claim their
//! region first, equal lengths fall to the earlier occurrence. The
//! overlapping collection matters: a long keyword that fails its word
//! boundary must not shadow a shorter keyword nested inside it.
//!
//! Case folding is ASCII-only. Keywords are stored lowercase and the
//! automaton folds A-Z, so a keyword with a non-ASCII letter matches only
//! occurrences spelled with the same form of that letter.

use crate::engine::color::{contrast_color, BLACK};
use crate::engine::index::KeywordIndex;
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// One keyword occurrence inside a text unit, in byte offsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    /// Normalized keyword that matched
    pub keyword: String,
    /// Background color of the owning category
    pub color: String,
}

/// A piece of the replacement plan for a matched text unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text outside any match, emitted verbatim
    Plain(String),
    /// A matched keyword to wrap in a mark, original casing preserved
    Mark {
        text: String,
        color: String,
        contrast: &'static str,
    },
}

/// Per-pattern metadata, indexed by automaton pattern id
#[derive(Debug, Clone)]
struct PatternMeta {
    keyword: String,
    color: String,
}

// =============================================================================
// KeywordMatcher
// =============================================================================

/// Whole-word keyword matcher built from a keyword index
pub struct KeywordMatcher {
    automaton: Option<AhoCorasick>,
    meta: Vec<PatternMeta>,
}

impl KeywordMatcher {
    /// Build the automaton from an index. An empty index builds a matcher
    /// that never matches.
    pub fn from_index(index: &KeywordIndex) -> Result<KeywordMatcher, String> {
        let patterns = index.patterns();
        if patterns.is_empty() {
            return Ok(KeywordMatcher {
                automaton: None,
                meta: Vec::new(),
            });
        }

        let meta: Vec<PatternMeta> = patterns
            .iter()
            .map(|(keyword, color)| PatternMeta {
                keyword: keyword.clone(),
                color: color.clone(),
            })
            .collect();

        // Standard match kind is required for overlapping iteration. The
        // longest-wins policy is applied after the boundary filter instead
        // of by the automaton, so boundary-failed candidates cannot hide
        // shorter valid ones.
        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .ascii_case_insensitive(true)
            .build(patterns.iter().map(|(keyword, _)| keyword))
            .map_err(|e| format!("Failed to build automaton: {}", e))?;

        Ok(KeywordMatcher {
            automaton: Some(automaton),
            meta,
        })
    }

    /// Number of keywords in the automaton
    pub fn pattern_count(&self) -> usize {
        self.meta.len()
    }

    /// Find every whole-word keyword occurrence in `text`.
    ///
    /// Returned spans are sorted by start and non-overlapping. Longer
    /// keywords take precedence over shorter ones wherever they overlap.
    pub fn scan(&self, text: &str) -> Vec<MatchSpan> {
        let automaton = match &self.automaton {
            Some(a) => a,
            None => return vec![],
        };
        if text.is_empty() {
            return vec![];
        }

        let mut candidates: Vec<MatchSpan> = Vec::new();
        for mat in automaton.find_overlapping_iter(text) {
            if !on_word_boundary(text, mat.start(), mat.end()) {
                continue;
            }
            if let Some(meta) = self.meta.get(mat.pattern().as_usize()) {
                candidates.push(MatchSpan {
                    start: mat.start(),
                    end: mat.end(),
                    keyword: meta.keyword.clone(),
                    color: meta.color.clone(),
                });
            }
        }

        resolve_overlaps(candidates)
    }
}

// =============================================================================
// Word boundaries
// =============================================================================

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True if the span neither starts nor ends inside a word.
fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before_ok = match text[..start].chars().next_back() {
        Some(c) => !is_word_char(c),
        None => true,
    };
    let after_ok = match text[end..].chars().next() {
        Some(c) => !is_word_char(c),
        None => true,
    };
    before_ok && after_ok
}

/// Drop overlapping spans. Candidates claim their region in order of
/// descending keyword length, earlier occurrence first among equals, and a
/// claimed region is closed to every later candidate.
fn resolve_overlaps(mut spans: Vec<MatchSpan>) -> Vec<MatchSpan> {
    if spans.len() <= 1 {
        return spans;
    }

    spans.sort_by(|a, b| {
        (b.end - b.start)
            .cmp(&(a.end - a.start))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut result: Vec<MatchSpan> = Vec::new();
    for span in spans {
        let taken = result
            .iter()
            .any(|kept| span.start < kept.end && kept.start < span.end);
        if !taken {
            result.push(span);
        }
    }

    result.sort_by_key(|span| span.start);
    result
}

// =============================================================================
// Segmentation
// =============================================================================

/// Carve a text unit into plain and marked segments.
///
/// `spans` must be sorted and non-overlapping, as `scan` returns them.
/// Concatenating the segment texts reproduces `text` byte for byte.
pub fn segment(text: &str, spans: &[MatchSpan]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut cursor = 0;

    for span in spans {
        if span.start > cursor {
            segments.push(Segment::Plain(text[cursor..span.start].to_string()));
        }
        segments.push(Segment::Mark {
            text: text[span.start..span.end].to_string(),
            color: span.color.clone(),
            contrast: contrast_color(&span.color).unwrap_or(BLACK),
        });
        cursor = span.end;
    }

    if cursor < text.len() {
        segments.push(Segment::Plain(text[cursor..].to_string()));
    }

    segments
}

// =============================================================================
// Tests
// =============================================================================
