use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::delay::playback_delay_ms;
use crate::snapshot::{
    ApplyMode, EntityRef, FieldPolicies, Snapshot, SnapshotRing, DEFAULT_RING_CAPACITY,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpolatorConfig {
    pub capacity: usize,
    /// When false, every tick holds the latest snapshot instead of blending.
    pub interpolate: bool,
    pub sync_parent: bool,
    pub policies: FieldPolicies,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RING_CAPACITY,
            interpolate: true,
            sync_parent: true,
            policies: FieldPolicies::default(),
        }
    }
}

/// Host-side lookup that turns a logical reference into a live scene object.
pub trait ResolveReference {
    type Target;

    fn resolve(&self, reference: &EntityRef) -> Option<Self::Target>;
}

impl<T, F> ResolveReference for F
where
    F: Fn(&EntityRef) -> Option<T>,
{
    type Target = T;

    fn resolve(&self, reference: &EntityRef) -> Option<T> {
        self(reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentUpdate<T> {
    Unchanged,
    Attach(T),
    Detach,
}

/// Output of one playback tick. Fields the policies leave unsynced are
/// `None` and must not be written by the host.
#[derive(Debug, Clone)]
pub struct AppliedState<T> {
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
    pub linear_velocity: Option<Vec3>,
    pub angular_velocity: Option<Vec3>,
    pub parent: ParentUpdate<T>,
    /// True when no bracket was available and the latest snapshot was held.
    pub extrapolated: bool,
}

/// Replays buffered remote snapshots at a delayed playback point.
///
/// One interpolator owns one ring and serves one tracked attribute-set; an
/// object observed through several independent components (transform state
/// and rigid-body state, say) gets one instance per set, each with its own
/// field policies. Single-threaded by design: `push` and `tick` are driven
/// by the host's receive dispatch and frame tick. Hosts that receive on a
/// separate thread wrap the instance in their own lock.
#[derive(Debug)]
pub struct Interpolator {
    config: InterpolatorConfig,
    ring: SnapshotRing,
    applied_parent: Option<EntityRef>,
    parent_known: bool,
}

impl Interpolator {
    pub fn new(config: InterpolatorConfig) -> Self {
        let capacity = config.capacity;
        Self {
            config,
            ring: SnapshotRing::new(capacity),
            applied_parent: None,
            parent_known: false,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(InterpolatorConfig::default())
    }

    /// Buffers a received snapshot. Out-of-order arrivals are dropped.
    pub fn push(&mut self, snapshot: Snapshot) -> bool {
        self.ring.push(snapshot)
    }

    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    pub fn ring(&self) -> &SnapshotRing {
        &self.ring
    }

    pub fn reset(&mut self) {
        self.ring.clear();
        self.applied_parent = None;
        self.parent_known = false;
    }

    /// Produces the state to apply for this tick, or `None` when nothing has
    /// been received yet.
    ///
    /// The playback point is `now_ms` minus the bucketed delay for the
    /// current ping. When even the newest sample is older than that point,
    /// or interpolation is disabled, the latest snapshot is held verbatim.
    /// Velocities are carried but never integrated into the position here.
    pub fn tick<R: ResolveReference>(
        &mut self,
        now_ms: f64,
        ping_ms: f64,
        resolver: &R,
    ) -> Option<AppliedState<R::Target>> {
        let latest_ms = self.ring.latest()?.timestamp_ms;
        let target_ms = now_ms - playback_delay_ms(ping_ms);

        if !self.config.interpolate || latest_ms <= target_ms {
            let latest = self.ring.latest()?.clone();
            return Some(self.apply(&latest, None, 0.0, true, resolver));
        }

        let (lhs, rhs) = self.ring.find_bracket(target_ms)?;
        let span = rhs.timestamp_ms - lhs.timestamp_ms;
        let t = if span > 0.0 {
            (((target_ms - lhs.timestamp_ms) / span) as f32).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let lhs = lhs.clone();
        let rhs = rhs.clone();
        Some(self.apply(&lhs, Some(&rhs), t, false, resolver))
    }

    fn apply<R: ResolveReference>(
        &mut self,
        lhs: &Snapshot,
        rhs: Option<&Snapshot>,
        t: f32,
        extrapolated: bool,
        resolver: &R,
    ) -> AppliedState<R::Target> {
        let parent = if self.config.sync_parent {
            self.parent_update(lhs, resolver)
        } else {
            ParentUpdate::Unchanged
        };

        let p = self.config.policies;
        AppliedState {
            position: blend_vec(p.position, lhs.position, rhs.map(|r| r.position), t),
            rotation: blend_quat(p.rotation, lhs.rotation, rhs.map(|r| r.rotation), t),
            scale: blend_vec(p.scale, lhs.scale, rhs.map(|r| r.scale), t),
            linear_velocity: blend_vec(
                p.linear_velocity,
                lhs.linear_velocity,
                rhs.map(|r| r.linear_velocity),
                t,
            ),
            angular_velocity: blend_vec(
                p.angular_velocity,
                lhs.angular_velocity,
                rhs.map(|r| r.angular_velocity),
                t,
            ),
            parent,
            extrapolated,
        }
    }

    /// Hierarchy changes follow the older bracket snapshot, not a blend.
    /// A reference that fails to resolve detaches the entity; playback
    /// continues with fresh data next tick.
    fn parent_update<R: ResolveReference>(
        &mut self,
        lhs: &Snapshot,
        resolver: &R,
    ) -> ParentUpdate<R::Target> {
        if self.parent_known && self.applied_parent == lhs.parent {
            return ParentUpdate::Unchanged;
        }

        self.parent_known = true;
        self.applied_parent = lhs.parent.clone();

        match &lhs.parent {
            None => ParentUpdate::Detach,
            Some(reference) => match resolver.resolve(reference) {
                Some(target) => ParentUpdate::Attach(target),
                None => {
                    log::warn!(
                        "parent handle {} path {:?} did not resolve, detaching",
                        reference.handle,
                        reference.path
                    );
                    ParentUpdate::Detach
                }
            },
        }
    }
}

fn blend_vec(mode: ApplyMode, lhs: Vec3, rhs: Option<Vec3>, t: f32) -> Option<Vec3> {
    match mode {
        ApplyMode::None => None,
        ApplyMode::Set => Some(lhs),
        ApplyMode::Lerp => Some(match rhs {
            Some(rhs) => lhs.lerp(rhs, t),
            None => lhs,
        }),
    }
}

fn blend_quat(mode: ApplyMode, lhs: Quat, rhs: Option<Quat>, t: f32) -> Option<Quat> {
    match mode {
        ApplyMode::None => None,
        ApplyMode::Set => Some(lhs),
        ApplyMode::Lerp => Some(match rhs {
            Some(rhs) => {
                // Flip to the shortest arc before blending.
                if lhs.dot(rhs) < 0.0 {
                    lhs.slerp(-rhs, t)
                } else {
                    lhs.slerp(rhs, t)
                }
            }
            None => lhs,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;

    fn no_hierarchy(_: &EntityRef) -> Option<u32> {
        None
    }

    fn snap_at(timestamp_ms: f64, x: f32) -> Snapshot {
        let mut snapshot = Snapshot::at(timestamp_ms);
        snapshot.position = Vec3::new(x, 0.0, 0.0);
        snapshot
    }

    #[test]
    fn tick_with_empty_buffer_is_none() {
        let mut interp = Interpolator::with_defaults();
        assert!(interp.tick(1000.0, 20.0, &no_hierarchy).is_none());
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        assert_eq!(
            blend_vec(ApplyMode::Lerp, Vec3::ZERO, Some(Vec3::X * 10.0), 0.0),
            Some(Vec3::ZERO)
        );
        assert_eq!(
            blend_vec(ApplyMode::Lerp, Vec3::ZERO, Some(Vec3::X * 10.0), 1.0),
            Some(Vec3::X * 10.0)
        );
        assert_eq!(
            blend_vec(ApplyMode::Lerp, Vec3::ZERO, Some(Vec3::X * 10.0), 0.5),
            Some(Vec3::X * 5.0)
        );
    }

    #[test]
    fn slerp_shortest_arc_midpoint() {
        let from = Quat::IDENTITY;
        let to = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);

        let mid = blend_quat(ApplyMode::Lerp, from, Some(to), 0.5).unwrap();
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);

        assert!(mid.angle_between(expected) < 1e-4);
    }

    #[test]
    fn slerp_flips_sign_for_shortest_arc() {
        let from = Quat::from_rotation_y(0.1);
        let to = -Quat::from_rotation_y(0.3);

        let mid = blend_quat(ApplyMode::Lerp, from, Some(to), 0.5).unwrap();
        let expected = Quat::from_rotation_y(0.2);

        assert!(mid.angle_between(expected) < 1e-4);
    }

    #[test]
    fn interpolates_between_bracketing_snapshots() {
        let mut interp = Interpolator::with_defaults();
        interp.push(snap_at(1000.0, 0.0));
        interp.push(snap_at(1100.0, 10.0));

        // ping 20 -> delay 50; target = 1100 - 50 = 1050, halfway.
        let applied = interp.tick(1100.0, 20.0, &no_hierarchy).unwrap();

        assert!(!applied.extrapolated);
        let position = applied.position.unwrap();
        assert!((position.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn holds_latest_when_target_passes_newest() {
        let mut interp = Interpolator::with_defaults();
        interp.push(snap_at(1000.0, 0.0));
        interp.push(snap_at(1100.0, 10.0));

        let applied = interp.tick(2000.0, 20.0, &no_hierarchy).unwrap();

        assert!(applied.extrapolated);
        assert_eq!(applied.position.unwrap(), Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn holds_latest_when_interpolation_disabled() {
        let config = InterpolatorConfig {
            interpolate: false,
            ..InterpolatorConfig::default()
        };
        let mut interp = Interpolator::new(config);
        interp.push(snap_at(1000.0, 0.0));
        interp.push(snap_at(1100.0, 10.0));

        let applied = interp.tick(1100.0, 20.0, &no_hierarchy).unwrap();

        assert!(applied.extrapolated);
        assert_eq!(applied.position.unwrap(), Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn zero_length_interval_blends_at_zero() {
        let mut interp = Interpolator::with_defaults();
        interp.push(snap_at(1000.0, 3.0));
        interp.push(snap_at(1000.0, 7.0));

        // Target before both samples lands on the duplicate-timestamp pair.
        let applied = interp.tick(1040.0, 20.0, &no_hierarchy).unwrap();

        assert_eq!(applied.position.unwrap(), Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn set_policy_steps_to_older_value() {
        let config = InterpolatorConfig {
            policies: FieldPolicies {
                position: ApplyMode::Set,
                ..FieldPolicies::default()
            },
            ..InterpolatorConfig::default()
        };
        let mut interp = Interpolator::new(config);
        interp.push(snap_at(1000.0, 0.0));
        interp.push(snap_at(1100.0, 10.0));

        let applied = interp.tick(1100.0, 20.0, &no_hierarchy).unwrap();

        assert_eq!(applied.position.unwrap(), Vec3::ZERO);
    }

    #[test]
    fn unsynced_fields_stay_untouched() {
        let config = InterpolatorConfig {
            policies: FieldPolicies::default().masked(crate::snapshot::SyncedFields::POSITION),
            ..InterpolatorConfig::default()
        };
        let mut interp = Interpolator::new(config);
        interp.push(snap_at(1000.0, 0.0));
        interp.push(snap_at(1100.0, 10.0));

        let applied = interp.tick(1100.0, 20.0, &no_hierarchy).unwrap();

        assert!(applied.position.is_some());
        assert!(applied.rotation.is_none());
        assert!(applied.scale.is_none());
        assert!(applied.linear_velocity.is_none());
    }

    #[test]
    fn parent_attach_detach_and_failed_resolution() {
        let resolver = |reference: &EntityRef| {
            if reference.handle == 1 {
                Some(11u32)
            } else {
                None
            }
        };

        let mut interp = Interpolator::with_defaults();

        let mut first = snap_at(1000.0, 0.0);
        first.parent = Some(EntityRef::root(1));
        interp.push(first);

        let applied = interp.tick(1100.0, 20.0, &resolver).unwrap();
        assert_eq!(applied.parent, ParentUpdate::Attach(11));

        // Same parent again: no change.
        let mut second = snap_at(1200.0, 1.0);
        second.parent = Some(EntityRef::root(1));
        interp.push(second);
        let applied = interp.tick(1300.0, 20.0, &resolver).unwrap();
        assert_eq!(applied.parent, ParentUpdate::Unchanged);

        // Unknown handle: detach instead of failing.
        let mut third = snap_at(1400.0, 2.0);
        third.parent = Some(EntityRef::root(9));
        interp.push(third);
        let applied = interp.tick(1500.0, 20.0, &resolver).unwrap();
        assert_eq!(applied.parent, ParentUpdate::Detach);

        // Explicit unparent.
        interp.push(snap_at(1600.0, 3.0));
        let applied = interp.tick(1700.0, 20.0, &resolver).unwrap();
        assert_eq!(applied.parent, ParentUpdate::Detach);
    }

    #[test]
    fn initial_unparented_snapshot_reports_detach_once() {
        let mut interp = Interpolator::with_defaults();
        interp.push(snap_at(1000.0, 0.0));

        let applied = interp.tick(1100.0, 20.0, &no_hierarchy).unwrap();
        assert_eq!(applied.parent, ParentUpdate::Detach);

        interp.push(snap_at(1200.0, 1.0));
        let applied = interp.tick(1300.0, 20.0, &no_hierarchy).unwrap();
        assert_eq!(applied.parent, ParentUpdate::Unchanged);
    }
}
