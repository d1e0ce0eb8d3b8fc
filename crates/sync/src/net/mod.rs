mod publisher;
mod simulator;
mod transport;
mod wire;

pub use publisher::{apply_update, PublishError, PublisherConfig, SnapshotPublisher};
pub use simulator::{LinkConditions, LinkSimulator};
pub use transport::{Reliability, Transport};
pub use wire::{ParentField, StateUpdate, WireError, MAX_UPDATE_SIZE};
