//! Job-wide property id set.

use dashmap::DashSet;

/// First-admit-wins identity set shared by every worker of one job.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: DashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `property_id` if absent. Returns `true` only for the first caller.
    pub fn try_admit(&self, property_id: &str) -> bool {
        if self.seen.contains(property_id) {
            return false;
        }
        self.seen.insert(property_id.to_string())
    }

    /// Number of distinct ids admitted so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
