//! Per-key trailing-edge debounce.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Keeps one deadline per key; triggering again pushes the deadline back.
#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    window: Duration,
    deadlines: HashMap<K, Instant>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone,
{
    /// Debouncer firing `window` after the last trigger of a key.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    /// Quiet period before a key fires.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// (Re)arms `key` to fire `window` after `now`.
    pub fn trigger(&mut self, key: K, now: Instant) {
        self.deadlines.insert(key, now + self.window);
    }

    /// Removes and returns every key whose deadline is at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let due: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &due {
            self.deadlines.remove(key);
        }
        due
    }

    /// Removes and returns every pending key regardless of deadline.
    pub fn drain(&mut self) -> Vec<K> {
        self.deadlines.drain().map(|(key, _)| key).collect()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Whether `key` has a pending deadline.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    /// Drops the pending deadline for `key`.
    pub fn cancel(&mut self, key: &K) {
        self.deadlines.remove(key);
    }

    /// Drops every pending deadline.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}
