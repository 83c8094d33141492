//! Cross-thread hand-off of the current flight list.
//!
//! The producer publishes a whole new [`Snapshot`] per cycle; readers take a
//! cheap clone of the current one under the lock and release it before doing
//! anything slow. A published snapshot is never mutated, so a reader can
//! never see records from two different cycles.

use std::sync::{Arc, Mutex, PoisonError};

use crate::types::FlightRecord;

/// Immutable, ordered result of one producer cycle.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Arc<[FlightRecord]>,
    cycle: u64,
}

impl Snapshot {
    pub fn new(records: Vec<FlightRecord>, cycle: u64) -> Self {
        Snapshot {
            records: records.into(),
            cycle,
        }
    }

    pub fn records(&self) -> &[FlightRecord] {
        &self.records
    }

    /// Producer cycle that built this snapshot (0 before the first publish).
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::new(Vec::new(), 0)
    }
}

/// Shared slot holding the latest snapshot. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    current: Arc<Mutex<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        SnapshotStore::default()
    }

    /// Replace the current snapshot wholesale.
    pub fn publish(&self, snapshot: Snapshot) {
        // A poisoned slot still holds a whole snapshot; keep going.
        let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = snapshot;
    }

    /// Copy of the current snapshot. The lock is released on return.
    pub fn read(&self) -> Snapshot {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn tagged(cycle: u64, n: usize) -> Snapshot {
        let records = (0..n)
            .map(|i| FlightRecord {
                callsign: Some(format!("S{cycle}")),
                ..FlightRecord::new(format!("{i:06x}"))
            })
            .collect();
        Snapshot::new(records, cycle)
    }

    #[test]
    fn test_starts_empty() {
        let store = SnapshotStore::new();
        let snap = store.read();
        assert!(snap.is_empty());
        assert_eq!(snap.cycle(), 0);
    }

    #[test]
    fn test_publish_replaces() {
        let store = SnapshotStore::new();
        store.publish(tagged(1, 3));
        let first = store.read();
        store.publish(tagged(2, 1));

        // Earlier copy is untouched by the later publish
        assert_eq!(first.len(), 3);
        assert_eq!(first.cycle(), 1);
        assert_eq!(store.read().len(), 1);
        assert_eq!(store.read().cycle(), 2);
    }

    #[test]
    fn test_clones_share_slot() {
        let store = SnapshotStore::new();
        let viewer = store.clone();
        store.publish(tagged(7, 2));
        assert_eq!(viewer.read().cycle(), 7);
    }

    #[test]
    fn test_reader_never_sees_mixed_cycles() {
        let store = SnapshotStore::new();
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = store.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                for cycle in 1..=300u64 {
                    store.publish(tagged(cycle, 1 + (cycle as usize % 7)));
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let mut reads = 0u64;
        let mut last_cycle = 0u64;
        while !done.load(Ordering::SeqCst) || reads == 0 {
            let snap = store.read();
            let expected = format!("S{}", snap.cycle());
            assert!(snap
                .records()
                .iter()
                .all(|r| r.callsign.as_deref() == Some(expected.as_str())));
            assert!(snap.cycle() >= last_cycle, "snapshots went backwards");
            last_cycle = snap.cycle();
            reads += 1;
        }

        writer.join().unwrap();
        assert_eq!(store.read().cycle(), 300);
    }
}
