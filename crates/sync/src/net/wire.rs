use glam::{Quat, Vec3};
use rkyv::{rancor, Archive, Deserialize, Serialize};

use crate::snapshot::{EntityRef, Snapshot, SyncedFields};

/// Hard ceiling for one encoded update; anything larger would fragment at
/// the transport layer.
pub const MAX_UPDATE_SIZE: usize = 1200;

const ROTATION_SCALE: f32 = 32767.0;
const VELOCITY_SCALE: f32 = 100.0;
pub const MAX_VELOCITY: f32 = 327.67;

/// Hierarchy attachment on the wire. `attached == false` is an explicit
/// detach, distinct from the field being absent entirely.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ParentField {
    pub handle: u32,
    pub path: String,
    pub attached: bool,
}

/// One replication update. Fields present are exactly those the sender's
/// synced-field set enables.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct StateUpdate {
    pub timestamp_ms: f64,
    pub parent: Option<ParentField>,
    pub position: Option<[f32; 3]>,
    pub rotation: Option<[i16; 4]>,
    pub scale: Option<[f32; 3]>,
    pub linear_velocity: Option<[i16; 3]>,
    pub angular_velocity: Option<[i16; 3]>,
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("encoding failed: {0}")]
    Encode(rancor::Error),
    #[error("decoding failed: {0}")]
    Decode(rancor::Error),
    #[error("update exceeds {MAX_UPDATE_SIZE} bytes ({0})")]
    Oversize(usize),
}

impl StateUpdate {
    pub fn from_snapshot(snapshot: &Snapshot, fields: SyncedFields) -> Self {
        Self {
            timestamp_ms: snapshot.timestamp_ms,
            parent: fields
                .contains(SyncedFields::PARENT)
                .then(|| match &snapshot.parent {
                    Some(reference) => ParentField {
                        handle: reference.handle,
                        path: reference.path.clone(),
                        attached: true,
                    },
                    None => ParentField {
                        handle: 0,
                        path: String::new(),
                        attached: false,
                    },
                }),
            position: fields
                .contains(SyncedFields::POSITION)
                .then(|| snapshot.position.to_array()),
            rotation: fields
                .contains(SyncedFields::ROTATION)
                .then(|| encode_rotation(snapshot.rotation)),
            scale: fields
                .contains(SyncedFields::SCALE)
                .then(|| snapshot.scale.to_array()),
            linear_velocity: fields
                .contains(SyncedFields::LINEAR_VELOCITY)
                .then(|| encode_velocity(snapshot.linear_velocity)),
            angular_velocity: fields
                .contains(SyncedFields::ANGULAR_VELOCITY)
                .then(|| encode_velocity(snapshot.angular_velocity)),
        }
    }

    /// Absent fields fall back to identity values; the receiver's field
    /// policies decide what actually gets applied.
    pub fn to_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::at(self.timestamp_ms);
        if let Some(parent) = &self.parent {
            snapshot.parent = parent
                .attached
                .then(|| EntityRef::new(parent.handle, parent.path.clone()));
        }
        if let Some(position) = self.position {
            snapshot.position = Vec3::from(position);
        }
        if let Some(rotation) = self.rotation {
            snapshot.rotation = decode_rotation(rotation);
        }
        if let Some(scale) = self.scale {
            snapshot.scale = Vec3::from(scale);
        }
        if let Some(velocity) = self.linear_velocity {
            snapshot.linear_velocity = decode_velocity(velocity);
        }
        if let Some(velocity) = self.angular_velocity {
            snapshot.angular_velocity = decode_velocity(velocity);
        }
        snapshot
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let bytes = rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(WireError::Encode)?;
        if bytes.len() > MAX_UPDATE_SIZE {
            return Err(WireError::Oversize(bytes.len()));
        }
        Ok(bytes)
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(WireError::Decode)
    }
}

pub fn encode_rotation(rotation: Quat) -> [i16; 4] {
    let q = rotation.to_array();
    [
        (q[0].clamp(-1.0, 1.0) * ROTATION_SCALE) as i16,
        (q[1].clamp(-1.0, 1.0) * ROTATION_SCALE) as i16,
        (q[2].clamp(-1.0, 1.0) * ROTATION_SCALE) as i16,
        (q[3].clamp(-1.0, 1.0) * ROTATION_SCALE) as i16,
    ]
}

pub fn decode_rotation(raw: [i16; 4]) -> Quat {
    Quat::from_xyzw(
        raw[0] as f32 / ROTATION_SCALE,
        raw[1] as f32 / ROTATION_SCALE,
        raw[2] as f32 / ROTATION_SCALE,
        raw[3] as f32 / ROTATION_SCALE,
    )
    .normalize()
}

pub fn encode_velocity(velocity: Vec3) -> [i16; 3] {
    [
        (velocity.x.clamp(-MAX_VELOCITY, MAX_VELOCITY) * VELOCITY_SCALE) as i16,
        (velocity.y.clamp(-MAX_VELOCITY, MAX_VELOCITY) * VELOCITY_SCALE) as i16,
        (velocity.z.clamp(-MAX_VELOCITY, MAX_VELOCITY) * VELOCITY_SCALE) as i16,
    ]
}

pub fn decode_velocity(raw: [i16; 3]) -> Vec3 {
    Vec3::new(
        raw[0] as f32 / VELOCITY_SCALE,
        raw[1] as f32 / VELOCITY_SCALE,
        raw[2] as f32 / VELOCITY_SCALE,
    )
}
