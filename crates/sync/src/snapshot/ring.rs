use super::types::Snapshot;

pub const DEFAULT_RING_CAPACITY: usize = 20;

/// Fixed-capacity circular store of timestamped snapshots, owned by exactly
/// one interpolator. Slots are reused on wrap; nothing is freed individually.
#[derive(Debug)]
pub struct SnapshotRing {
    slots: Vec<Option<Snapshot>>,
    capacity: usize,
    last_received: usize,
    next_free: usize,
    used: usize,
}

impl SnapshotRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            capacity,
            last_received: 0,
            next_free: 0,
            used: 0,
        }
    }

    /// Stores a snapshot unless its timestamp is older than the newest
    /// accepted one. Out-of-order arrivals are dropped, never inserted out of
    /// position. Returns whether the snapshot was stored.
    pub fn push(&mut self, snapshot: Snapshot) -> bool {
        if let Some(latest) = self.latest() {
            if snapshot.timestamp_ms < latest.timestamp_ms {
                log::trace!(
                    "dropping out-of-order snapshot ({} < {})",
                    snapshot.timestamp_ms,
                    latest.timestamp_ms
                );
                return false;
            }
        }

        self.slots[self.next_free] = Some(snapshot);
        self.last_received = self.next_free;
        self.next_free = (self.next_free + 1) % self.capacity;
        self.used = (self.used + 1).min(self.capacity);
        true
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        if self.used == 0 {
            None
        } else {
            self.slots[self.last_received].as_ref()
        }
    }

    /// Walks slots newest to oldest and returns the first pair `(lhs, rhs)`
    /// with `lhs.timestamp_ms <= target_ms`, falling back to the oldest slot.
    /// `rhs` is the slot immediately newer than `lhs`, or `lhs` itself when
    /// `lhs` is already the newest (the hold-latest case).
    pub fn find_bracket(&self, target_ms: f64) -> Option<(&Snapshot, &Snapshot)> {
        if self.used == 0 {
            return None;
        }

        let mut idx = self.last_received;
        let mut newer = self.last_received;
        for step in 0..self.used {
            let snapshot = self.slots[idx].as_ref().unwrap();
            if snapshot.timestamp_ms <= target_ms || step == self.used - 1 {
                let rhs = self.slots[newer].as_ref().unwrap();
                return Some((snapshot, rhs));
            }
            newer = idx;
            idx = (idx + self.capacity - 1) % self.capacity;
        }

        unreachable!("loop returns on the last used slot");
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.last_received = 0;
        self.next_free = 0;
        self.used = 0;
    }

    /// Snapshots oldest to newest, at most `len()` entries.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        let oldest = (self.next_free + self.capacity - self.used) % self.capacity;
        (0..self.used).filter_map(move |i| self.slots[(oldest + i) % self.capacity].as_ref())
    }
}
