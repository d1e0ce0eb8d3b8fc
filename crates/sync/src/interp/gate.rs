use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// Decides whether freshly sampled local state differs enough from the last
/// transmitted snapshot to be worth sending.
pub trait SnapshotComparator {
    fn changed(&self, last_sent: &Snapshot, current: &Snapshot) -> bool;
}

/// Reports every snapshot as changed, so the gate always transmits.
///
/// This is the default on purpose: suppression thresholds that are wrong for
/// a rig produce frozen remotes, which is worse than the extra bandwidth.
// TODO: switch the default to ToleranceComparator once per-field thresholds
// have been tuned against recorded headset traces.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysChanged;

impl SnapshotComparator for AlwaysChanged {
    fn changed(&self, _last_sent: &Snapshot, _current: &Snapshot) -> bool {
        true
    }
}

/// Epsilon-threshold comparator. A snapshot counts as changed when any field
/// moved past its tolerance or the parent reference differs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToleranceComparator {
    pub position_epsilon: f32,
    /// Radians between the two rotations.
    pub rotation_epsilon: f32,
    pub scale_epsilon: f32,
    pub velocity_epsilon: f32,
}

impl Default for ToleranceComparator {
    fn default() -> Self {
        Self {
            position_epsilon: 1e-3,
            rotation_epsilon: 1e-3,
            scale_epsilon: 1e-3,
            velocity_epsilon: 1e-2,
        }
    }
}

impl SnapshotComparator for ToleranceComparator {
    fn changed(&self, last_sent: &Snapshot, current: &Snapshot) -> bool {
        if last_sent.parent != current.parent {
            return true;
        }

        let moved = |a: glam::Vec3, b: glam::Vec3, epsilon: f32| {
            (b - a).length_squared() > epsilon * epsilon
        };

        moved(last_sent.position, current.position, self.position_epsilon)
            || last_sent.rotation.angle_between(current.rotation) > self.rotation_epsilon
            || moved(last_sent.scale, current.scale, self.scale_epsilon)
            || moved(
                last_sent.linear_velocity,
                current.linear_velocity,
                self.velocity_epsilon,
            )
            || moved(
                last_sent.angular_velocity,
                current.angular_velocity,
                self.velocity_epsilon,
            )
    }
}

/// Sender-side gate in front of the wire encoder.
///
/// With `send_on_change_only` disabled the gate passes everything through.
/// Enabled, it asks the comparator whether the snapshot differs from the
/// last one that was actually sent.
#[derive(Debug)]
pub struct ChangeGate<C = AlwaysChanged> {
    send_on_change_only: bool,
    comparator: C,
    last_sent: Option<Snapshot>,
}

impl ChangeGate<AlwaysChanged> {
    pub fn new(send_on_change_only: bool) -> Self {
        Self::with_comparator(send_on_change_only, AlwaysChanged)
    }
}

impl<C: SnapshotComparator> ChangeGate<C> {
    pub fn with_comparator(send_on_change_only: bool, comparator: C) -> Self {
        Self {
            send_on_change_only,
            comparator,
            last_sent: None,
        }
    }

    /// Returns true when the snapshot should be transmitted, recording it as
    /// the new reference point.
    pub fn should_send(&mut self, snapshot: &Snapshot) -> bool {
        if !self.send_on_change_only {
            self.last_sent = Some(snapshot.clone());
            return true;
        }

        let send = match &self.last_sent {
            None => true,
            Some(last_sent) => self.comparator.changed(last_sent, snapshot),
        };
        if send {
            self.last_sent = Some(snapshot.clone());
        }
        send
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
