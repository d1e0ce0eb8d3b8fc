mod ring;
mod types;

pub use ring::{SnapshotRing, DEFAULT_RING_CAPACITY};
pub use types::{ApplyMode, EntityRef, FieldPolicies, Snapshot, SyncedFields};
