//! Tracks the bot replies sent for recent user messages, for cascade deletion.

use std::collections::BTreeMap;

/// Number of trigger messages remembered.
pub const CORRELATION_CAPACITY: usize = 5;

/// A bot reply that can be deleted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentReply {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Bounded map from a triggering message id to the replies sent for it.
///
/// When a new trigger would exceed the capacity, the smallest (oldest)
/// message id is evicted. Discord snowflakes grow with time.
#[derive(Debug, Default)]
pub struct ReplyCorrelation {
    entries: BTreeMap<u64, Vec<SentReply>>,
}

impl ReplyCorrelation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reply sent for `trigger_id`.
    pub fn record(&mut self, trigger_id: u64, reply: SentReply) {
        self.entries.entry(trigger_id).or_default().push(reply);

        while self.entries.len() > CORRELATION_CAPACITY {
            if let Some((evicted, _)) = self.entries.pop_first() {
                tracing::trace!(trigger_id = evicted, "evicted reply correlation");
            }
        }
    }

    /// Remove and return the replies recorded for `trigger_id`.
    pub fn take(&mut self, trigger_id: u64) -> Option<Vec<SentReply>> {
        self.entries.remove(&trigger_id)
    }

    #[cfg(test)]
    pub fn contains(&self, trigger_id: u64) -> bool {
        self.entries.contains_key(&trigger_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
