mod delay;
mod engine;
mod gate;

pub use delay::playback_delay_ms;
pub use engine::{
    AppliedState, Interpolator, InterpolatorConfig, ParentUpdate, ResolveReference,
};
pub use gate::{AlwaysChanged, ChangeGate, SnapshotComparator, ToleranceComparator};
