//! GlowCore: Keyword Highlight Engine
//!
//! A Rust/WASM implementation of the content-side core of a keyword
//! highlighting extension: find configured keywords in a page, wrap them
//! in styled marks, restore the page on demand, and re-apply after the
//! page mutates.
//!
//! # Architecture
//!
//! ## Engine components
//! - `category.rs` - Category model, color validation, settings helpers
//! - `color.rs` - Luminance-based contrast color selection
//! - `index.rs` - KeywordIndex: categories flattened to keyword -> color
//! - `matcher.rs` - KeywordMatcher: whole-word matching via Aho-Corasick
//! - `dom.rs` - Arena document tree with a structural mutation journal
//! - `highlighter.rs` - Highlighter: apply/clear lifecycle with undo records
//! - `observer.rs` - ChangeObserver: trailing-debounce over page mutations
//! - `store.rs` - CategoryStore: async persistence boundary
//! - `session.rs` - PageSession: commands, bootstrap, and the pump loop
//!
//! ## Host boundary
//! - `bridge.rs` - HighlightAgent: the wasm-bindgen surface
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { HighlightAgent } from 'glowcore';
//!
//! await init();
//!
//! const agent = new HighlightAgent(null);
//! agent.loadDocument(pageTree);
//!
//! // Route extension messages straight through
//! const ack = agent.handleMessage({
//!   action: 'highlight',
//!   categories: [{ id: '1', name: 'Work', color: '#ffff00', keywords: ['urgent'] }]
//! });
//!
//! // After observed page mutations, schedule pump() for pendingDelayMs()
//! const report = agent.pump();
//! ```

pub mod bridge;
pub mod engine;

pub use bridge::*;
pub use engine::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("glowcore v{}", env!("CARGO_PKG_VERSION"))
}
