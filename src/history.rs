//! Fixed-capacity, most-recent-first command history.

use std::collections::VecDeque;
use std::fmt;

/// Ring of the most recently entered command lines, newest at index 0.
///
/// Recording a line shifts every other entry down one slot; once the ring is
/// full the oldest entry is discarded. The ring lives for the process
/// lifetime and is never persisted.
#[derive(Debug)]
pub struct HistoryRing {
    entries: VecDeque<String>,
    capacity: usize,
}

impl HistoryRing {
    pub fn with_capacity(capacity: usize) -> HistoryRing {
        HistoryRing {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Inserts `line` at index 0, dropping the oldest entry beyond capacity.
    pub fn record<T: AsRef<str>>(&mut self, line: T) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(line.as_ref().to_owned());
        self.entries.truncate(self.capacity);
    }

    /// Returns the stored line at `index`, 0 being the most recent.
    pub fn at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// Iterates over populated entries, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for HistoryRing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, line) in self.entries.iter().enumerate() {
            writeln!(f, "{}. {}", index, line)?;
        }
        Ok(())
    }
}
