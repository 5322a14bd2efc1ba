//! In-memory dead-letter queue
//!
//! Bounded and keyed by message control ID: re-adding the same control ID
//! updates the existing entry instead of duplicating it, and the oldest
//! entry is evicted when the queue is full. Durable archiving is the
//! caller's concern.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use hale_core::message::Message;
use tracing::warn;

/// Default queue capacity
pub const DEFAULT_MAX_DEAD_LETTERS: usize = 1000;

/// A message that could not be processed
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub message: Message,
    pub reason: String,
    /// Refreshed whenever the same control ID is re-added
    pub timestamp: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: String,
}

/// Bounded dead-letter queue keyed by control ID
pub struct DeadLetterQueue {
    entries: Mutex<VecDeque<DeadLetterEntry>>,
    max_size: usize,
}

impl DeadLetterQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_size,
        }
    }

    /// Add a failed message, or bump the existing entry for its control ID
    pub fn add(&self, message: Message, reason: &str, error: &str) {
        let control_id = message.control_id().to_string();
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(entry) = entries
            .iter_mut()
            .find(|e| e.message.control_id() == control_id)
        {
            entry.attempts += 1;
            entry.last_error = error.to_string();
            entry.timestamp = Utc::now();
            return;
        }

        if entries.len() >= self.max_size {
            if let Some(evicted) = entries.pop_front() {
                warn!(
                    control_id = evicted.message.control_id(),
                    "dead-letter queue full, evicting oldest entry"
                );
            }
        }

        entries.push_back(DeadLetterEntry {
            message,
            reason: reason.to_string(),
            timestamp: Utc::now(),
            attempts: 1,
            last_error: error.to_string(),
        });
    }

    /// Look up an entry by control ID
    pub fn get(&self, control_id: &str) -> Option<DeadLetterEntry> {
        let entries = self.entries.lock().ok()?;
        entries
            .iter()
            .find(|e| e.message.control_id() == control_id)
            .cloned()
    }

    /// Remove and return an entry by control ID
    pub fn remove(&self, control_id: &str) -> Option<DeadLetterEntry> {
        let mut entries = self.entries.lock().ok()?;
        let index = entries
            .iter()
            .position(|e| e.message.control_id() == control_id)?;
        entries.remove(index)
    }

    /// Snapshot of all entries, oldest first
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries
    pub fn purge(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
