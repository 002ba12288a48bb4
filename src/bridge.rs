//! WASM boundary for the highlight engine
//!
//! `HighlightAgent` owns one document and its session. The host mirrors
//! the page into `loadDocument`, routes extension messages through
//! `handleMessage`, and after mutations schedules `pump` using
//! `pendingDelayMs`. All payloads cross the boundary as plain JS values.

use crate::engine::category::{self, Category};
use crate::engine::dom::{Dom, DomLiteral};
use crate::engine::session::{Command, CommandAck, EngineConfig, PageSession};
use instant::Instant;
use wasm_bindgen::prelude::*;
use web_sys::console;

#[wasm_bindgen]
pub struct HighlightAgent {
    dom: Dom,
    session: PageSession,
}

#[wasm_bindgen]
impl HighlightAgent {
    /// Create an agent. `config` may be null/undefined for defaults, or
    /// `{ quiet_period_ms, auto_apply }`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<HighlightAgent, JsValue> {
        let config: EngineConfig = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Failed to parse config: {}", e)))?
        };
        Ok(HighlightAgent {
            dom: Dom::new(),
            session: PageSession::new(&config),
        })
    }

    /// Replace the document with a literal tree. Records from the old
    /// document are forgotten, not restored.
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&mut self, tree: JsValue) -> Result<(), JsValue> {
        let literal: DomLiteral = serde_wasm_bindgen::from_value(tree)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse document tree: {}", e)))?;
        self.dom = Dom::from_literal(&literal);
        self.session.document_loaded();
        console::log_1(
            &format!(
                "[HighlightAgent] Document loaded: {} nodes",
                self.dom.live_count()
            )
            .into(),
        );
        Ok(())
    }

    /// Literal form of the current document.
    #[wasm_bindgen(js_name = snapshot)]
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.dom.to_literal())
            .map_err(|e| JsValue::from_str(&format!("Failed to serialize document: {}", e)))
    }

    /// Render the current document as HTML-ish markup (debugging aid).
    #[wasm_bindgen(js_name = renderHtml)]
    pub fn render_html(&self) -> String {
        self.dom.render_html()
    }

    /// Handle an extension message: `{ action, ... }`. Always returns an
    /// ack; unparseable messages fail the ack instead of throwing.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, message: JsValue) -> JsValue {
        let command: Command = match serde_wasm_bindgen::from_value(message) {
            Ok(command) => command,
            Err(e) => {
                console::error_1(
                    &format!("[HighlightAgent] Unrecognized message: {}", e).into(),
                );
                let ack = CommandAck::fail(format!("Unrecognized message: {}", e));
                return serde_wasm_bindgen::to_value(&ack).unwrap_or(JsValue::NULL);
            }
        };
        let ack = self.session.handle_command(&mut self.dom, command);
        serde_wasm_bindgen::to_value(&ack).unwrap_or(JsValue::NULL)
    }

    /// Apply a category array directly, returning the apply report.
    #[wasm_bindgen(js_name = applyCategories)]
    pub fn apply_categories(&mut self, categories: JsValue) -> Result<JsValue, JsValue> {
        let categories: Vec<Category> = serde_wasm_bindgen::from_value(categories)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse categories: {}", e)))?;
        let start = js_sys::Date::now();
        let report = self.session.apply(&mut self.dom, &categories);
        console::log_1(
            &format!(
                "[HighlightAgent] Applied {} categories: {} marks in {:.1}ms",
                categories.len(),
                report.units_marked,
                js_sys::Date::now() - start
            )
            .into(),
        );
        serde_wasm_bindgen::to_value(&report)
            .map_err(|e| JsValue::from_str(&format!("Failed to serialize report: {}", e)))
    }

    /// Restore the page; returns how many wrappers were unwound.
    #[wasm_bindgen(js_name = clearHighlights)]
    pub fn clear_highlights(&mut self) -> usize {
        self.session.clear(&mut self.dom)
    }

    /// Drain page mutations and run the debounce cycle. Returns the apply
    /// report when a re-apply fired, otherwise null.
    #[wasm_bindgen(js_name = pump)]
    pub fn pump(&mut self) -> Result<JsValue, JsValue> {
        match self.session.pump(&mut self.dom, Instant::now()) {
            Some(report) => serde_wasm_bindgen::to_value(&report)
                .map_err(|e| JsValue::from_str(&format!("Failed to serialize report: {}", e))),
            None => Ok(JsValue::NULL),
        }
    }

    /// Milliseconds until the pending re-apply deadline, if one is armed.
    /// Hosts use this to schedule the next `pump` call.
    #[wasm_bindgen(js_name = pendingDelayMs)]
    pub fn pending_delay_ms(&self) -> Option<f64> {
        self.session
            .pending_delay(Instant::now())
            .map(|d| d.as_millis() as f64)
    }

    #[wasm_bindgen(js_name = isHighlighted)]
    pub fn is_highlighted(&self) -> bool {
        self.session.is_highlighted()
    }

    /// Engine status as a JSON string (debugging aid).
    #[wasm_bindgen(js_name = getStatus)]
    pub fn get_status(&self) -> JsValue {
        let observer = self.session.observer();
        let status = serde_json::json!({
            "highlighted": self.session.is_highlighted(),
            "categories": self.session.categories().len(),
            "marks": self.session.mark_count(),
            "live_nodes": self.dom.live_count(),
            "observer": {
                "seen": observer.seen_count(),
                "ignored": observer.ignored_count(),
                "fired": observer.fired_count(),
            },
        });
        JsValue::from_str(&status.to_string())
    }
}

// =============================================================================
// Settings helpers
// =============================================================================
// Free functions for the settings surface. The popup edits categories as
// plain objects and only needs validation and bookkeeping from the engine.

/// The category set a fresh install starts with.
#[wasm_bindgen(js_name = defaultCategories)]
pub fn starter_categories() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&category::default_categories())
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize categories: {}", e)))
}

/// Whether `color` is a 3- or 6-digit hex color.
#[wasm_bindgen(js_name = isValidColor)]
pub fn validate_color(color: &str) -> bool {
    category::is_valid_color(color)
}

/// Split a comma-separated keyword field into trimmed, non-empty keywords.
#[wasm_bindgen(js_name = parseKeywords)]
pub fn split_keywords(raw: &str) -> Vec<String> {
    category::parse_keywords(raw)
}

/// Pick a palette color for the next new category, given how many exist.
#[wasm_bindgen(js_name = suggestColor)]
pub fn palette_color(existing: usize) -> String {
    category::suggest_color(existing).to_string()
}

/// Fresh id for a category created in the settings surface.
#[wasm_bindgen(js_name = newCategoryId)]
pub fn new_category_id() -> String {
    category::generated_id()
}

/// Validate one category object. Returns null when it is well formed,
/// otherwise a message describing what is wrong.
#[wasm_bindgen(js_name = validateCategory)]
pub fn validate_category(value: JsValue) -> Result<JsValue, JsValue> {
    let category: Category = serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse category: {}", e)))?;
    match category.validate() {
        Ok(()) => Ok(JsValue::NULL),
        Err(e) => Ok(JsValue::from_str(&e.to_string())),
    }
}

// =============================================================================
// Tests
// =============================================================================
// Boundary smoke tests, run with `wasm-pack test --node`. The engine logic
// is covered natively; these only prove the JsValue conversions.

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use serde_json::json;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn page() -> JsValue {
        serde_wasm_bindgen::to_value(&json!({
            "kind": "element", "tag": "body", "children": [
                {"kind": "element", "tag": "p", "children": [
                    {"kind": "text", "content": "The deadline is Friday."}
                ]}
            ]
        }))
        .unwrap()
    }

    fn work_categories() -> JsValue {
        serde_wasm_bindgen::to_value(&json!([
            {"id": "w", "name": "Work", "color": "#ffff00", "keywords": ["deadline"]}
        ]))
        .unwrap()
    }

    #[wasm_bindgen_test]
    fn agent_marks_and_restores() {
        let mut agent = HighlightAgent::new(JsValue::NULL).unwrap();
        agent.load_document(page()).unwrap();

        agent.apply_categories(work_categories()).unwrap();
        assert!(agent.is_highlighted());
        assert!(agent.render_html().contains("keyword-highlight"));

        assert_eq!(agent.clear_highlights(), 1);
        assert!(!agent.is_highlighted());
        assert!(!agent.render_html().contains("keyword-highlight"));
    }

    #[wasm_bindgen_test]
    fn settings_helpers_cross_the_boundary() {
        assert!(validate_color("#ffff00"));
        assert!(!validate_color("yellow"));
        assert_eq!(split_keywords("a, b , ,c"), vec!["a", "b", "c"]);
        assert!(!starter_categories().unwrap().is_null());
    }
}
