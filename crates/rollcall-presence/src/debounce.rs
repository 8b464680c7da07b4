//! Keyed debounce timers.
//!
//! At most one pending timer exists per key; scheduling again replaces it.
//! The owner polls [`Debouncer::next_deadline`] from its event loop and
//! drains expired entries with [`Debouncer::take_due`], so no timer task
//! outlives the owner.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct Pending<T> {
    deadline: Instant,
    value: T,
}

#[derive(Debug)]
pub struct Debouncer<K, T> {
    pending: HashMap<K, Pending<T>>,
}

impl<K: Eq + Hash + Copy, T> Debouncer<K, T> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Start a timer for `key`, replacing any pending one. Returns the deadline.
    pub fn schedule(&mut self, key: K, delay: Duration, now: Instant, value: T) -> Instant {
        let deadline = now + delay;
        self.pending.insert(key, Pending { deadline, value });
        deadline
    }

    /// Cancel the pending timer for `key`. Returns whether one was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Remove and return every entry whose deadline is at or before `now`,
    /// earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, T)> {
        let mut due: Vec<(K, Instant)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, p)| (*k, p.deadline))
            .collect();
        due.sort_by_key(|(_, deadline)| *deadline);

        due.into_iter()
            .filter_map(|(k, _)| self.pending.remove(&k).map(|p| (k, p.value)))
            .collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<K: Eq + Hash + Copy, T> Default for Debouncer<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
