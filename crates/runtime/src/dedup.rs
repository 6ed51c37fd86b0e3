//! Identity-keyed set of pending units.
//!
//! A unit is pending from admission until its execution ends. The set's
//! atomic insert is the only gate: of any number of concurrent
//! [`DedupQueue::try_admit`] calls for one unit, exactly one wins.

use std::sync::Arc;

use dashmap::DashSet;
use pvscript_core::types::UnitId;

#[derive(Debug, Default)]
pub struct DedupQueue {
    pending: Arc<DashSet<UnitId>>,
}

/// Pending entry for one admitted unit; removes it when dropped.
#[derive(Debug)]
pub struct PendingGuard {
    pending: Arc<DashSet<UnitId>>,
    unit: UnitId,
}

impl DedupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `unit` pending unless it already is.
    ///
    /// `None` means another execution of the unit is still pending.
    pub fn try_admit(&self, unit: UnitId) -> Option<PendingGuard> {
        self.pending.insert(unit).then(|| PendingGuard {
            pending: Arc::clone(&self.pending),
            unit,
        })
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.pending.contains(&unit)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl PendingGuard {
    pub fn unit(&self) -> UnitId {
        self.unit
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.unit);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
