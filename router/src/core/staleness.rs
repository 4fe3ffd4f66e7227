use std::collections::HashMap;

use common::constants::DEFAULT_STALE_TOLERANCE;

use crate::core::server::server_key;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Freshness {
    update_timestamp: i64,
    stale_refresh_count: u32,
}

/// Turns heartbeat timestamps observed on successive refresh cycles into an
/// availability verdict.
///
/// A server whose timestamp stops moving stays available while its stale count
/// is within `tolerance`, and is excluded after that. Any new timestamp brings it
/// back immediately.
#[derive(Debug)]
pub struct StalenessTracker {
    records: HashMap<String, Freshness>,
    tolerance: u32,
}

impl Default for StalenessTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TOLERANCE)
    }
}

impl StalenessTracker {
    pub fn new(tolerance: u32) -> Self {
        Self {
            records: HashMap::new(),
            tolerance,
        }
    }

    /// Records one refresh observation and returns the server's verdict.
    pub fn observe(&mut self, cluster_id: &str, server_id: &str, update_timestamp: i64) -> bool {
        let key = server_key(cluster_id, server_id);

        let Some(record) = self.records.get_mut(&key) else {
            self.records.insert(
                key,
                Freshness {
                    update_timestamp,
                    stale_refresh_count: 0,
                },
            );
            return true;
        };

        if record.update_timestamp != update_timestamp {
            record.update_timestamp = update_timestamp;
            record.stale_refresh_count = 0;
            return true;
        }

        let available = record.stale_refresh_count <= self.tolerance;
        record.stale_refresh_count = record.stale_refresh_count.saturating_add(1);
        available
    }

    pub fn stale_count(&self, cluster_id: &str, server_id: &str) -> Option<u32> {
        self.records
            .get(&server_key(cluster_id, server_id))
            .map(|r| r.stale_refresh_count)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
