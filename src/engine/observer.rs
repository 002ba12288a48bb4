//! Debounced page change observation
//!
//! Watches the mutation journal for insertions the engine did not make
//! itself and arms a single trailing deadline. Each qualifying batch
//! pushes the deadline out again, so a burst of page activity costs one
//! re-apply after the page goes quiet, not one per mutation.
//!
//! Time is passed in explicitly. The observer never reads a clock, which
//! keeps it deterministic under test and lets the host drive scheduling.

use crate::engine::dom::{Dom, MutationRecord};
use instant::Instant;
use std::time::Duration;

/// Quiet period before a re-apply fires
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 500;

// =============================================================================
// ChangeObserver
// =============================================================================

pub struct ChangeObserver {
    quiet_period: Duration,
    /// The single pending deadline; a new qualifying batch replaces it
    deadline: Option<Instant>,
    seen: u64,
    ignored: u64,
    fired: u64,
}

impl Default for ChangeObserver {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_QUIET_PERIOD_MS))
    }
}

impl ChangeObserver {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            deadline: None,
            seen: 0,
            ignored: 0,
            fired: 0,
        }
    }

    /// Feed a drained journal batch. Arms (or re-arms) the deadline when
    /// at least one record qualifies; returns how many did.
    pub fn ingest(&mut self, dom: &Dom, records: &[MutationRecord], now: Instant) -> usize {
        let mut qualifying = 0;
        for record in records {
            if Self::qualifies(dom, record) {
                qualifying += 1;
            } else {
                self.ignored += 1;
            }
        }
        if qualifying > 0 {
            self.seen += qualifying as u64;
            self.deadline = Some(now + self.quiet_period);
        }
        qualifying
    }

    /// A record qualifies when the engine did not author it and the
    /// inserted node still holds renderable text.
    fn qualifies(dom: &Dom, record: &MutationRecord) -> bool {
        if record.engine_authored {
            return false;
        }
        if !dom.is_alive(record.node) {
            return false;
        }
        dom.text_units_under(record.node).next().is_some()
    }

    /// True exactly once per armed deadline, the first time `now` reaches
    /// it. Firing clears the slot.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.fired += 1;
                true
            }
            _ => false,
        }
    }

    /// Time left until the pending deadline, if one is armed.
    pub fn pending_delay(&self, now: Instant) -> Option<Duration> {
        let deadline = self.deadline?;
        if deadline > now {
            Some(deadline - now)
        } else {
            Some(Duration::ZERO)
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop any armed deadline, e.g. when the document is swapped out.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn seen_count(&self) -> u64 {
        self.seen
    }

    pub fn ignored_count(&self) -> u64 {
        self.ignored
    }

    pub fn fired_count(&self) -> u64 {
        self.fired
    }
}

// =============================================================================
// Tests
// =============================================================================
