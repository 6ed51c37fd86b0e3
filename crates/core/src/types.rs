use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Process-wide counter backing [`UnitId::next`].
static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one compiled script unit.
///
/// Allocated once per compilation. Two units compiled from the same
/// source text still get different ids; clones of the same unit share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnitId(u64);

impl UnitId {
    /// Allocate a fresh, never before returned id.
    pub fn next() -> Self {
        Self(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}
