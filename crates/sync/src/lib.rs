pub mod interp;
pub mod net;
pub mod snapshot;

pub use interp::{
    playback_delay_ms, AlwaysChanged, AppliedState, ChangeGate, Interpolator, InterpolatorConfig,
    ParentUpdate, ResolveReference, SnapshotComparator, ToleranceComparator,
};
pub use net::{
    apply_update, LinkConditions, LinkSimulator, ParentField, PublishError, PublisherConfig,
    Reliability, SnapshotPublisher, StateUpdate, Transport, WireError, MAX_UPDATE_SIZE,
};
pub use snapshot::{
    ApplyMode, EntityRef, FieldPolicies, Snapshot, SnapshotRing, SyncedFields,
    DEFAULT_RING_CAPACITY,
};
