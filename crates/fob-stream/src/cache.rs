//! Graph cache: entry identifier → engine graph handle.
//!
//! Repeated invocations for the same entry (watch-mode rebuilds) hand the
//! previous handle back to the engine so it can rebuild incrementally.
//!
//! # Concurrency
//!
//! Builds for the same identifier may overlap when the pipeline processes
//! several files at once. Every build draws a [`BuildTicket`] when it starts
//! and the latest-started build wins:
//!
//! - a completed build stores its handle unless a newer-started build has
//!   already stored one (the stale result is dropped and logged);
//! - a failed build clears the entry unless the entry belongs to a
//!   newer-started build.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::engine::SharedGraph;

static GLOBAL: Lazy<Arc<GraphCache>> = Lazy::new(|| Arc::new(GraphCache::new()));

#[derive(Default)]
struct Slot {
    handle: Option<SharedGraph>,
    /// Ticket of the build that stored `handle`.
    stored: u64,
    /// Last ticket handed out for this identifier.
    issued: u64,
}

/// Proof that a build for `key` was started, and in which order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTicket {
    key: String,
    seq: u64,
}

impl BuildTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What a starting build gets from the cache.
pub struct Checkout {
    pub ticket: BuildTicket,
    /// Previous handle for the same identifier, if any.
    pub cached: Option<SharedGraph>,
}

/// Keyed store of graph handles, one live handle per identifier.
#[derive(Default)]
pub struct GraphCache {
    slots: Mutex<FxHashMap<String, Slot>>,
}

impl std::fmt::Debug for GraphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared by transforms that were not given one.
    pub fn global() -> Arc<GraphCache> {
        Arc::clone(&GLOBAL)
    }

    pub fn get(&self, key: &str) -> Option<SharedGraph> {
        self.slots.lock().get(key).and_then(|slot| slot.handle.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Store `handle` unconditionally.
    pub fn set(&self, key: &str, handle: SharedGraph) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key.to_string()).or_default();
        slot.issued += 1;
        slot.stored = slot.issued;
        slot.handle = Some(handle);
    }

    /// Remove the handle stored under `key`.
    pub fn invalidate(&self, key: &str) {
        if let Some(slot) = self.slots.lock().get_mut(key) {
            slot.handle = None;
        }
    }

    /// Number of identifiers with a live handle.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.handle.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Start a build for `key`: issue a ticket and hand out the cached handle.
    pub fn checkout(&self, key: &str) -> Checkout {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key.to_string()).or_default();
        slot.issued += 1;
        Checkout {
            ticket: BuildTicket {
                key: key.to_string(),
                seq: slot.issued,
            },
            cached: slot.handle.clone(),
        }
    }

    /// Store the handle produced by the build holding `ticket`.
    ///
    /// Returns `false` when a newer-started build already stored its handle.
    pub fn store(&self, ticket: &BuildTicket, handle: SharedGraph) -> bool {
        let mut slots = self.slots.lock();
        let slot = slots.entry(ticket.key.clone()).or_default();
        if slot.handle.is_some() && slot.stored > ticket.seq {
            tracing::warn!(
                input = %ticket.key,
                ticket = ticket.seq,
                current = slot.stored,
                "dropping graph from an older overlapping build"
            );
            return false;
        }
        slot.stored = ticket.seq;
        slot.handle = Some(handle);
        true
    }

    /// Clear the entry after the build holding `ticket` failed.
    ///
    /// An entry stored by a newer-started build is left alone.
    pub fn invalidate_build(&self, ticket: &BuildTicket) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&ticket.key) {
            if slot.handle.is_some() && slot.stored > ticket.seq {
                return;
            }
            slot.handle = None;
        }
    }
}
