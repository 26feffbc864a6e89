//! Route persistence collaborators.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Where encoded routes are read from and written to, e.g. the browser history.
pub trait RouteHistory: Send + Sync {
    /// The encoded route of the current location, if any.
    fn read(&self) -> Option<String>;
    /// Adds a new entry, discarding any forward entries.
    fn push(&self, location: String);
    fn replace(&self, location: String);
}

/// In-process history with back/forward navigation.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Mutex<Entries>,
}

#[derive(Debug)]
struct Entries {
    locations: Vec<Option<String>>,
    current: usize,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryHistory {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            entries: Mutex::new(Entries {
                locations: vec![initial],
                current: 0,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to the previous entry. Returns false at the first entry.
    pub fn back(&self) -> bool {
        let mut entries = self.entries();
        if entries.current == 0 {
            return false;
        }
        entries.current -= 1;
        true
    }

    /// Moves to the next entry. Returns false at the last entry.
    pub fn forward(&self) -> bool {
        let mut entries = self.entries();
        if entries.current + 1 >= entries.locations.len() {
            return false;
        }
        entries.current += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.entries().locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn locations(&self) -> Vec<Option<String>> {
        self.entries().locations.clone()
    }
}

impl RouteHistory for MemoryHistory {
    fn read(&self) -> Option<String> {
        let entries = self.entries();
        entries.locations[entries.current].clone()
    }

    fn push(&self, location: String) {
        let mut entries = self.entries();
        let next = entries.current + 1;
        entries.locations.truncate(next);
        entries.locations.push(Some(location));
        entries.current = next;
    }

    fn replace(&self, location: String) {
        let mut entries = self.entries();
        let current = entries.current;
        entries.locations[current] = Some(location);
    }
}
