//! Versioning and tombstone policy for the index coordinator.

use std::time::Duration;

/// Default tombstone retention: one day.
pub const DEFAULT_TOMBSTONE_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Policy points of the index coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPolicy {
    /// How long tombstones are kept to absorb late out-of-order events.
    pub tombstone_retention: Duration,
    /// Write a tombstone even when deleting an entity that was never indexed.
    ///
    /// Off by default: deleting an unknown entity is a plain no-op. Turning
    /// it on also absorbs a create that arrives after its delete.
    pub record_unknown_deletes: bool,
}

impl Default for IndexPolicy {
    fn default() -> Self {
        Self {
            tombstone_retention: DEFAULT_TOMBSTONE_RETENTION,
            record_unknown_deletes: false,
        }
    }
}

impl IndexPolicy {
    /// Create a policy with a custom retention window.
    pub fn with_retention(tombstone_retention: Duration) -> Self {
        Self {
            tombstone_retention,
            ..Self::default()
        }
    }
}
