use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

bitflags! {
    /// Which state fields a replicated object transmits and applies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SyncedFields: u8 {
        const PARENT = 1 << 0;
        const POSITION = 1 << 1;
        const ROTATION = 1 << 2;
        const SCALE = 1 << 3;
        const LINEAR_VELOCITY = 1 << 4;
        const ANGULAR_VELOCITY = 1 << 5;
    }
}

impl SyncedFields {
    pub fn transform() -> Self {
        Self::POSITION | Self::ROTATION | Self::SCALE
    }

    pub fn rigid_body() -> Self {
        Self::LINEAR_VELOCITY | Self::ANGULAR_VELOCITY
    }
}

/// Identifies a hierarchy attachment target on the remote side independent of
/// live object identity: a stable numeric handle plus an optional relative
/// path below it. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub handle: u32,
    pub path: String,
}

impl EntityRef {
    pub fn new(handle: u32, path: impl Into<String>) -> Self {
        Self {
            handle,
            path: path.into(),
        }
    }

    /// Reference to the handle's own root, no relative path.
    pub fn root(handle: u32) -> Self {
        Self {
            handle,
            path: String::new(),
        }
    }
}

/// One timestamped observation of an entity's synchronized state.
/// `parent: None` means unparented.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestamp_ms: f64,
    pub parent: Option<EntityRef>,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Snapshot {
    pub fn at(timestamp_ms: f64) -> Self {
        Self {
            timestamp_ms,
            parent: None,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

/// How one field of a buffered snapshot is carried over to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApplyMode {
    /// Field is not synced; output left untouched.
    None,
    /// Assign the older bracket value directly, no blend.
    Set,
    /// Linear blend; rotations use shortest-arc spherical blend.
    #[default]
    Lerp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPolicies {
    pub position: ApplyMode,
    pub rotation: ApplyMode,
    pub scale: ApplyMode,
    pub linear_velocity: ApplyMode,
    pub angular_velocity: ApplyMode,
}

impl Default for FieldPolicies {
    fn default() -> Self {
        Self {
            position: ApplyMode::Lerp,
            rotation: ApplyMode::Lerp,
            scale: ApplyMode::Set,
            linear_velocity: ApplyMode::Lerp,
            angular_velocity: ApplyMode::Lerp,
        }
    }
}

impl FieldPolicies {
    /// Policies for fields absent from `fields` collapse to `None`.
    pub fn masked(mut self, fields: SyncedFields) -> Self {
        if !fields.contains(SyncedFields::POSITION) {
            self.position = ApplyMode::None;
        }
        if !fields.contains(SyncedFields::ROTATION) {
            self.rotation = ApplyMode::None;
        }
        if !fields.contains(SyncedFields::SCALE) {
            self.scale = ApplyMode::None;
        }
        if !fields.contains(SyncedFields::LINEAR_VELOCITY) {
            self.linear_velocity = ApplyMode::None;
        }
        if !fields.contains(SyncedFields::ANGULAR_VELOCITY) {
            self.angular_velocity = ApplyMode::None;
        }
        self
    }
}
