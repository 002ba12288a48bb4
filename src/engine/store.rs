//! Category persistence boundary
//!
//! The engine never talks to extension storage directly; hosts hand it a
//! `CategoryStore`. The trait is async because real backends sit behind
//! promise-based APIs, and `(?Send)` because the engine is single-threaded
//! on every target it runs on.

use crate::engine::category::{default_categories, Category};
use async_trait::async_trait;
use std::cell::RefCell;
use thiserror::Error;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("category storage unavailable: {0}")]
    Unavailable(String),
    #[error("malformed category payload: {0}")]
    Malformed(String),
}

/// Callback fired with the full new category list after a successful write
pub type ChangeListener = Box<dyn FnMut(&[Category])>;

#[async_trait(?Send)]
pub trait CategoryStore {
    /// Load the persisted category list. A backend with nothing stored
    /// yields an empty list, not an error.
    async fn get(&self) -> Result<Vec<Category>, StoreError>;

    /// Persist the full category list, then notify change listeners.
    async fn set(&self, categories: &[Category]) -> Result<(), StoreError>;

    /// Register a listener fired after every successful `set`.
    fn on_change(&self, listener: ChangeListener);
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store for tests and native embedding
#[derive(Default)]
pub struct MemoryStore {
    categories: RefCell<Vec<Category>>,
    listeners: RefCell<Vec<ChangeListener>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(categories: Vec<Category>) -> Self {
        Self {
            categories: RefCell::new(categories),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Store pre-loaded with the first-run starter category.
    pub fn seeded() -> Self {
        Self::with_categories(default_categories())
    }
}

#[async_trait(?Send)]
impl CategoryStore for MemoryStore {
    async fn get(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.categories.borrow().clone())
    }

    async fn set(&self, categories: &[Category]) -> Result<(), StoreError> {
        let snapshot = categories.to_vec();
        *self.categories.borrow_mut() = snapshot.clone();
        // Notify with the listener list released; a listener may re-enter
        // on_change on this same store.
        let mut active = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in active.iter_mut() {
            listener(&snapshot);
        }
        let mut listeners = self.listeners.borrow_mut();
        let registered_during_notify = std::mem::take(&mut *listeners);
        *listeners = active;
        listeners.extend(registered_during_notify);
        Ok(())
    }

    fn on_change(&self, listener: ChangeListener) {
        self.listeners.borrow_mut().push(listener);
    }
}

// =============================================================================
// Tests
// =============================================================================
