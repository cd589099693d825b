//! Process-wide counters of native handles acquired and released.
//!
//! The counters are diagnostics only; nothing in the crate reads them to make
//! decisions.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// The kind of resource a counter tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Messages,
    KeyIterators,
    Indices,
    Files,
}

impl Counter {
    fn slot(self) -> usize {
        match self {
            Counter::Messages => 0,
            Counter::KeyIterators => 1,
            Counter::Indices => 2,
            Counter::Files => 3,
        }
    }
}

static ACQUIRED: [AtomicU64; 4] = [
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
];

static RELEASED: [AtomicU64; 4] = [
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
];

pub(crate) fn record_acquired(counter: Counter) {
    ACQUIRED[counter.slot()].fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_released(counter: Counter) {
    RELEASED[counter.slot()].fetch_add(1, Ordering::Relaxed);
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandleStats {
    pub messages_created: u64,
    pub messages_released: u64,
    pub key_iterators_created: u64,
    pub key_iterators_released: u64,
    pub indices_created: u64,
    pub indices_released: u64,
    pub files_opened: u64,
    pub files_closed: u64,
}

impl HandleStats {
    /// Messages created but not yet released.
    pub fn live_messages(&self) -> u64 {
        self.messages_created.saturating_sub(self.messages_released)
    }

    pub fn live_indices(&self) -> u64 {
        self.indices_created.saturating_sub(self.indices_released)
    }
}

/// Read all counters.
pub fn snapshot() -> HandleStats {
    let get = |table: &[AtomicU64; 4], counter: Counter| table[counter.slot()].load(Ordering::Relaxed);
    HandleStats {
        messages_created: get(&ACQUIRED, Counter::Messages),
        messages_released: get(&RELEASED, Counter::Messages),
        key_iterators_created: get(&ACQUIRED, Counter::KeyIterators),
        key_iterators_released: get(&RELEASED, Counter::KeyIterators),
        indices_created: get(&ACQUIRED, Counter::Indices),
        indices_released: get(&RELEASED, Counter::Indices),
        files_opened: get(&ACQUIRED, Counter::Files),
        files_closed: get(&RELEASED, Counter::Files),
    }
}
