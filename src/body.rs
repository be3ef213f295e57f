//! Rigid body frames referenced by joints.
//!
//! A [`BodyFrame`] carries a body's pose, its mass properties and the
//! velocity-level quantities the constraint system reads and writes. Joints
//! never own bodies: they hold [`BodyId`] handles into a [`BodySet`].
//!
//! Velocities, impulses and reactions are 6-vectors laid out as
//! `[linear (world); angular (world)]`.

use std::ops::{Index, IndexMut};

use nalgebra::{Isometry3, Matrix3, Point3, UnitQuaternion, Vector3, Vector6};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Handle of a body inside a [`BodySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub usize);

impl BodyId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Skew-symmetric matrix of `v`, so that `skew(v) * w == v × w`.
#[must_use]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Pose, mass properties and velocity state of one rigid body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyFrame {
    pose: Isometry3<f64>,
    mass: f64,
    /// Inertia tensor in body coordinates.
    inertia: Matrix3<f64>,
    fixed: bool,
    dof_offset: Option<usize>,
    velocity: Vector6<f64>,
    applied: Vector6<f64>,
    reaction: Vector6<f64>,
}

impl BodyFrame {
    /// A free body.
    pub fn new(pose: Isometry3<f64>, mass: f64, inertia: Matrix3<f64>) -> Self {
        Self {
            pose,
            mass,
            inertia,
            fixed: false,
            dof_offset: None,
            velocity: Vector6::zeros(),
            applied: Vector6::zeros(),
            reaction: Vector6::zeros(),
        }
    }

    /// A body fixed to the ground; it carries no degrees of freedom.
    pub fn fixed(pose: Isometry3<f64>) -> Self {
        Self {
            fixed: true,
            ..Self::new(pose, 0.0, Matrix3::zeros())
        }
    }

    pub fn pose(&self) -> &Isometry3<f64> {
        &self.pose
    }

    pub fn set_pose(&mut self, pose: Isometry3<f64>) {
        self.pose = pose;
    }

    pub fn position(&self) -> Point3<f64> {
        Point3::from(self.pose.translation.vector)
    }

    pub fn rotation(&self) -> &UnitQuaternion<f64> {
        &self.pose.rotation
    }

    /// Compose the pose with a transform expressed in body coordinates.
    pub fn apply_relative(&mut self, relative: &Isometry3<f64>) {
        self.pose = self.pose * relative;
    }

    /// Absolute pose of a frame given in body coordinates.
    pub fn to_absolute(&self, local: &Isometry3<f64>) -> Isometry3<f64> {
        self.pose * local
    }

    /// Body-coordinate pose of a frame given in absolute coordinates.
    pub fn to_local(&self, absolute: &Isometry3<f64>) -> Isometry3<f64> {
        self.pose.inv_mul(absolute)
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn inertia(&self) -> &Matrix3<f64> {
        &self.inertia
    }

    /// Inertia tensor rotated into world coordinates, `R J Rᵀ`.
    pub fn world_inertia(&self) -> Matrix3<f64> {
        let r = self.pose.rotation.to_rotation_matrix();
        r.matrix() * self.inertia * r.matrix().transpose()
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    /// Offset of this body's 6 velocity unknowns; `None` for fixed bodies
    /// or before [`BodySet::assign_offsets`].
    pub fn dof_offset(&self) -> Option<usize> {
        self.dof_offset
    }

    pub fn velocity(&self) -> &Vector6<f64> {
        &self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vector6<f64>) {
        self.velocity = velocity;
    }

    /// Impulse applied to the body over the step (force, torque).
    pub fn applied(&self) -> &Vector6<f64> {
        &self.applied
    }

    pub fn set_applied(&mut self, applied: Vector6<f64>) {
        self.applied = applied;
    }

    /// Accumulated constraint reaction (force, torque).
    pub fn reaction(&self) -> &Vector6<f64> {
        &self.reaction
    }

    pub fn add_reaction(&mut self, wrench: &Vector6<f64>) {
        self.reaction += wrench;
    }

    pub fn clear_reaction(&mut self) {
        self.reaction = Vector6::zeros();
    }

    /// `M v` with the world-frame mass matrix `diag(m I, R J Rᵀ)`.
    pub fn momentum(&self) -> Vector6<f64> {
        let linear = self.velocity.fixed_rows::<3>(0) * self.mass;
        let angular = self.world_inertia() * self.velocity.fixed_rows::<3>(3);
        Vector6::new(linear.x, linear.y, linear.z, angular.x, angular.y, angular.z)
    }
}

/// Registry of bodies addressed by [`BodyId`].
#[derive(Debug, Clone, Default)]
pub struct BodySet {
    bodies: Vec<BodyFrame>,
    dof_count: usize,
}

impl BodySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, body: BodyFrame) -> BodyId {
        self.bodies.push(body);
        BodyId(self.bodies.len() - 1)
    }

    pub fn get(&self, id: BodyId) -> Option<&BodyFrame> {
        self.bodies.get(id.0)
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut BodyFrame> {
        self.bodies.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &BodyFrame)> {
        self.bodies.iter().enumerate().map(|(i, b)| (BodyId(i), b))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut BodyFrame)> {
        self.bodies.iter_mut().enumerate().map(|(i, b)| (BodyId(i), b))
    }

    /// Give every free body a block of 6 consecutive velocity unknowns.
    /// Returns the total number of unknowns.
    pub fn assign_offsets(&mut self) -> usize {
        let mut offset = 0;
        for body in &mut self.bodies {
            if body.fixed {
                body.dof_offset = None;
            } else {
                body.dof_offset = Some(offset);
                offset += 6;
            }
        }
        self.dof_count = offset;
        offset
    }

    /// Velocity unknowns assigned by the last [`Self::assign_offsets`].
    pub fn dof_count(&self) -> usize {
        self.dof_count
    }
}

impl Index<BodyId> for BodySet {
    type Output = BodyFrame;

    fn index(&self, id: BodyId) -> &BodyFrame {
        &self.bodies[id.0]
    }
}

impl IndexMut<BodyId> for BodySet {
    fn index_mut(&mut self, id: BodyId) -> &mut BodyFrame {
        &mut self.bodies[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Translation3;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn skew_is_cross_product() {
        let v = Vector3::new(1.0, -2.0, 0.5);
        let w = Vector3::new(0.3, 4.0, -1.0);
        assert_abs_diff_eq!(skew(&v) * w, v.cross(&w), epsilon = 1e-14);
        assert_abs_diff_eq!(skew(&v).transpose(), -skew(&v), epsilon = 1e-14);
    }

    #[test]
    fn local_and_absolute_frames_round_trip() {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let body = BodyFrame::new(
            Isometry3::from_parts(Translation3::new(1.0, 0.0, 0.0), rot),
            1.0,
            Matrix3::identity(),
        );
        let abs = Isometry3::translation(1.0, 2.0, 0.0);
        let local = body.to_local(&abs);
        // World +Y is body +X after the quarter turn.
        assert_abs_diff_eq!(local.translation.vector, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
        let back = body.to_absolute(&local);
        assert_abs_diff_eq!(back.translation.vector, abs.translation.vector, epsilon = 1e-12);
    }

    #[test]
    fn apply_relative_moves_in_body_coordinates() {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let mut body = BodyFrame::new(Isometry3::from_parts(Translation3::identity(), rot), 1.0, Matrix3::identity());
        body.apply_relative(&Isometry3::translation(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(body.position().coords, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn world_inertia_rotates_principal_axes() {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let body = BodyFrame::new(
            Isometry3::from_parts(Translation3::identity(), rot),
            2.0,
            Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0)),
        );
        let j = body.world_inertia();
        assert_abs_diff_eq!(j[(0, 0)], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(j[(1, 1)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(j[(2, 2)], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn offsets_skip_fixed_bodies() {
        let mut set = BodySet::new();
        let a = set.add(BodyFrame::new(Isometry3::identity(), 1.0, Matrix3::identity()));
        let g = set.add(BodyFrame::fixed(Isometry3::identity()));
        let b = set.add(BodyFrame::new(Isometry3::identity(), 1.0, Matrix3::identity()));
        assert_eq!(set.assign_offsets(), 12);
        assert_eq!(set[a].dof_offset(), Some(0));
        assert_eq!(set[g].dof_offset(), None);
        assert_eq!(set[b].dof_offset(), Some(6));
        assert_eq!(set.dof_count(), 12);
    }

    #[test]
    fn reactions_accumulate() {
        let mut body = BodyFrame::new(Isometry3::identity(), 1.0, Matrix3::identity());
        let w = Vector6::new(1.0, 0.0, 0.0, 0.0, 0.0, 2.0);
        body.add_reaction(&w);
        body.add_reaction(&w);
        assert_eq!(body.reaction()[0], 2.0);
        assert_eq!(body.reaction()[5], 4.0);
        body.clear_reaction();
        assert_eq!(*body.reaction(), Vector6::zeros());
    }
}
