//! Universal (Cardan) joint.
//!
//! Four equations between a marker frame on each body: the marker origins
//! coincide (3 equations) and the X axis of marker 1 stays perpendicular to
//! the Y axis of marker 2 (1 equation). Together they model the cross of a
//! physical universal joint.

use nalgebra::{Isometry3, Matrix3, Vector3};

use super::frames::JointFrames;
use super::row::{jacobian_row, load_coincidence, ConstraintBlock};
use super::ConstraintElement;
use crate::body::{skew, BodyId, BodySet};

/// Number of equations of a universal joint.
pub const UNIVERSAL_CONSTRAINTS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct UniversalJoint {
    body1: BodyId,
    body2: BodyId,
    frames: JointFrames,
    frame1_abs: Isometry3<f64>,
    frame2_abs: Isometry3<f64>,
    u1_tilde: Matrix3<f64>,
    v2_tilde: Matrix3<f64>,
    /// `u1 × v2`, the direction of the torque carried by the dot equation.
    dot_axis: Vector3<f64>,
    block: ConstraintBlock,
    react_force: Vector3<f64>,
    react_torque: Vector3<f64>,
}

impl UniversalJoint {
    /// Join `body1` and `body2` at the absolute `frame`: both markers are
    /// placed on it at the current body poses.
    pub fn new(bodies: &BodySet, body1: BodyId, body2: BodyId, frame: &Isometry3<f64>) -> Self {
        let frames = JointFrames::from_absolute(bodies, body1, body2, frame);
        Self::from_frames(bodies, body1, body2, frames)
    }

    /// Join with separate markers, given in body coordinates when `local`
    /// and in absolute coordinates otherwise. The markers are not checked
    /// for consistency.
    pub fn with_frames(
        bodies: &BodySet,
        body1: BodyId,
        body2: BodyId,
        local: bool,
        frame1: &Isometry3<f64>,
        frame2: &Isometry3<f64>,
    ) -> Self {
        let frames = JointFrames::from_pair(bodies, body1, body2, local, frame1, frame2);
        Self::from_frames(bodies, body1, body2, frames)
    }

    fn from_frames(bodies: &BodySet, body1: BodyId, body2: BodyId, frames: JointFrames) -> Self {
        let mut joint = Self {
            body1,
            body2,
            frames,
            frame1_abs: Isometry3::identity(),
            frame2_abs: Isometry3::identity(),
            u1_tilde: Matrix3::zeros(),
            v2_tilde: Matrix3::zeros(),
            dot_axis: Vector3::zeros(),
            block: ConstraintBlock::new(body1, body2, UNIVERSAL_CONSTRAINTS),
            react_force: Vector3::zeros(),
            react_torque: Vector3::zeros(),
        };
        joint.update(0.0, bodies);
        joint
    }

    /// Marker on body 1, body coordinates.
    pub fn frame1_rel(&self) -> &Isometry3<f64> {
        &self.frames.frame1
    }

    /// Marker on body 2, body coordinates.
    pub fn frame2_rel(&self) -> &Isometry3<f64> {
        &self.frames.frame2
    }

    /// Marker on body 1 in absolute coordinates, as of the last update.
    pub fn frame1_abs(&self) -> &Isometry3<f64> {
        &self.frame1_abs
    }

    /// Marker on body 2 in absolute coordinates, as of the last update.
    pub fn frame2_abs(&self) -> &Isometry3<f64> {
        &self.frame2_abs
    }

    /// Link coordinate system, relative to body 2.
    pub fn link_relative_coords(&self) -> &Isometry3<f64> {
        &self.frames.frame2
    }

    /// Cross-product matrix of the X axis of marker 1.
    pub fn u1_tilde(&self) -> &Matrix3<f64> {
        &self.u1_tilde
    }

    /// Cross-product matrix of the Y axis of marker 2.
    pub fn v2_tilde(&self) -> &Matrix3<f64> {
        &self.v2_tilde
    }
}

impl ConstraintElement for UniversalJoint {
    fn bodies(&self) -> (BodyId, BodyId) {
        (self.body1, self.body2)
    }

    fn block(&self) -> &ConstraintBlock {
        &self.block
    }

    fn block_mut(&mut self) -> &mut ConstraintBlock {
        &mut self.block
    }

    fn update(&mut self, _time: f64, bodies: &BodySet) {
        let (b1, b2) = (&bodies[self.body1], &bodies[self.body2]);
        self.frame1_abs = b1.to_absolute(&self.frames.frame1);
        self.frame2_abs = b2.to_absolute(&self.frames.frame2);

        let p1 = self.frame1_abs.translation.vector;
        let p2 = self.frame2_abs.translation.vector;
        let u1 = self.frame1_abs.rotation * Vector3::x();
        let v2 = self.frame2_abs.rotation * Vector3::y();
        self.u1_tilde = skew(&u1);
        self.v2_tilde = skew(&v2);
        self.dot_axis = self.u1_tilde * v2;

        let d = p1 - p2;
        self.block.set_residual(&[d.x, d.y, d.z, u1.dot(&v2)]);

        let r1 = p1 - b1.position().coords;
        let r2 = p2 - b2.position().coords;
        let rows = self.block.rows_mut();
        load_coincidence(&mut rows[..3], &r1, &r2);

        // d(u1·v2)/dt = ω1·(u1 × v2) + ω2·(v2 × u1)
        let zero = Vector3::zeros();
        rows[3].set_jacobians(
            jacobian_row(&zero, &self.dot_axis),
            jacobian_row(&zero, &(self.v2_tilde * u1)),
        );
    }

    fn fetch_react(&mut self, factor: f64) {
        let l = self.block.rows();
        self.react_force = -factor * Vector3::new(l[0].l_i(), l[1].l_i(), l[2].l_i());
        self.react_torque = -factor * l[3].l_i() * self.dot_axis;
    }

    fn gather_reactions(&self, off_l: usize, l: &mut [f64]) {
        l[off_l] = -self.react_force.x;
        l[off_l + 1] = -self.react_force.y;
        l[off_l + 2] = -self.react_force.z;
        let n2 = self.dot_axis.norm_squared();
        l[off_l + 3] = if n2 > f64::EPSILON {
            -self.react_torque.dot(&self.dot_axis) / n2
        } else {
            0.0
        };
    }

    fn scatter_reactions(&mut self, off_l: usize, l: &[f64]) {
        self.react_force = -Vector3::new(l[off_l], l[off_l + 1], l[off_l + 2]);
        self.react_torque = -l[off_l + 3] * self.dot_axis;
    }

    fn reaction_force(&self) -> Vector3<f64> {
        self.react_force
    }

    fn reaction_torque(&self) -> Vector3<f64> {
        self.react_torque
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyFrame;
    use crate::constraint::{ConstraintList, JointId};
    use approx::assert_abs_diff_eq;
    use nalgebra::{Translation3, UnitQuaternion, Vector6};

    fn rotated(x: f64, y: f64, z: f64, axis: Vector3<f64>, angle: f64) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_axis_angle(&nalgebra::Unit::new_normalize(axis), angle),
        )
    }

    fn pair() -> (BodySet, BodyId, BodyId) {
        let mut bodies = BodySet::new();
        let a = bodies.add(BodyFrame::new(
            rotated(0.0, 0.0, 0.0, Vector3::new(1.0, 1.0, 0.0), 0.4),
            1.0,
            Matrix3::identity(),
        ));
        let b = bodies.add(BodyFrame::new(
            rotated(1.0, 0.5, -0.2, Vector3::new(0.0, 1.0, 2.0), -1.1),
            2.0,
            Matrix3::identity(),
        ));
        bodies.assign_offsets();
        (bodies, a, b)
    }

    fn joint_frame() -> Isometry3<f64> {
        rotated(0.5, 0.2, 0.1, Vector3::new(0.3, -1.0, 0.5), 0.7)
    }

    #[test]
    fn residual_vanishes_at_rest() {
        let (bodies, a, b) = pair();
        let joint = UniversalJoint::new(&bodies, a, b, &joint_frame());
        for &c in joint.residual() {
            assert_abs_diff_eq!(c, 0.0, epsilon = 1e-10);
        }
        assert_abs_diff_eq!(
            joint.frame1_abs().translation.vector,
            joint_frame().translation.vector,
            epsilon = 1e-12
        );
    }

    #[test]
    fn local_markers_match_absolute_construction() {
        let (bodies, a, b) = pair();
        let frame = joint_frame();
        let abs = UniversalJoint::new(&bodies, a, b, &frame);
        let local = UniversalJoint::with_frames(&bodies, a, b, true, abs.frame1_rel(), abs.frame2_rel());
        let global = UniversalJoint::with_frames(&bodies, a, b, false, &frame, &frame);
        for i in 0..UNIVERSAL_CONSTRAINTS {
            assert_abs_diff_eq!(local.residual()[i], abs.residual()[i], epsilon = 1e-12);
            assert_abs_diff_eq!(global.residual()[i], abs.residual()[i], epsilon = 1e-12);
        }
        assert_eq!(local.link_relative_coords(), abs.frame2_rel());
    }

    #[test]
    fn translating_body2_shifts_first_residual() {
        let (mut bodies, a, b) = pair();
        let mut joint = UniversalJoint::new(&bodies, a, b, &joint_frame());
        let d = 0.013;
        let pose = bodies[b].pose();
        let moved = Isometry3::from_parts(Translation3::new(d, 0.0, 0.0) * pose.translation, pose.rotation);
        bodies[b].set_pose(moved);
        joint.update(0.1, &bodies);

        let c = joint.residual();
        assert_abs_diff_eq!(c[0], -d, epsilon = 1e-12);
        assert_abs_diff_eq!(c[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[2], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[3], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_difference() {
        let (mut bodies, a, b) = pair();
        let mut joint = UniversalJoint::new(&bodies, a, b, &joint_frame());
        // Start away from the rest configuration.
        bodies[b].apply_relative(&rotated(0.05, -0.02, 0.03, Vector3::new(1.0, 0.0, 1.0), 0.2));
        joint.update(0.0, &bodies);
        let c0 = joint.residual().to_vec();

        let va = Vector6::new(0.3, -0.1, 0.2, 0.5, -0.7, 0.4);
        let vb = Vector6::new(-0.2, 0.4, 0.1, -0.3, 0.2, 0.9);
        let predicted: Vec<f64> = joint
            .constraints()
            .iter()
            .map(|row| row.cq_a().tr_dot(&va) + row.cq_b().tr_dot(&vb))
            .collect();

        let h = 1e-7;
        for (id, v) in [(a, va), (b, vb)] {
            let pose = *bodies[id].pose();
            let lin = v.fixed_rows::<3>(0).into_owned();
            let ang = v.fixed_rows::<3>(3).into_owned();
            let stepped = Isometry3::from_parts(
                Translation3::from(pose.translation.vector + lin * h),
                UnitQuaternion::from_scaled_axis(ang * h) * pose.rotation,
            );
            bodies[id].set_pose(stepped);
        }
        joint.update(h, &bodies);

        for i in 0..UNIVERSAL_CONSTRAINTS {
            let fd = (joint.residual()[i] - c0[i]) / h;
            assert_abs_diff_eq!(fd, predicted[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn reactions_follow_multipliers() {
        let (bodies, a, b) = pair();
        let mut joint = UniversalJoint::new(&bodies, a, b, &joint_frame());
        for (row, l) in joint.constraints_mut().iter_mut().zip([1.0, -2.0, 0.5, 3.0]) {
            row.set_l_i(l);
        }
        joint.fetch_react(2.0);
        assert_abs_diff_eq!(joint.reaction_force(), Vector3::new(-2.0, 4.0, -1.0), epsilon = 1e-14);
        // Marker axes are perpendicular at rest, so |u1 × v2| = 1.
        assert_abs_diff_eq!(joint.reaction_torque().norm(), 6.0, epsilon = 1e-12);

        let mut l = vec![0.0; 6];
        joint.gather_reactions(2, &mut l);
        assert_abs_diff_eq!(l[2], 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(l[5], 6.0, epsilon = 1e-12);

        let mut other = joint.clone();
        other.scatter_reactions(2, &l);
        assert_abs_diff_eq!(other.reaction_force(), joint.reaction_force(), epsilon = 1e-12);
        assert_abs_diff_eq!(other.reaction_torque(), joint.reaction_torque(), epsilon = 1e-12);
    }

    #[test]
    fn injection_protocol() {
        let (mut bodies, a, b) = pair();
        let mut joint = UniversalJoint::new(&bodies, a, b, &joint_frame());
        let mut list = ConstraintList::new();
        joint.inject_constraints(JointId(3), &mut list);
        assert_eq!(list.len(), UNIVERSAL_CONSTRAINTS);

        bodies[b].apply_relative(&Isometry3::translation(0.0, 0.0, 1.0));
        joint.update(0.0, &bodies);
        joint.bi_reset();
        joint.load_jacobians();
        joint.bi_load_c(10.0, 0.5, true);
        for (row, &c) in joint.constraints().iter().zip(joint.residual()) {
            assert_abs_diff_eq!(row.b_i(), (10.0 * c).clamp(-0.5, 0.5), epsilon = 1e-14);
        }

        joint.constraints_mut()[0].set_l_i(4.0);
        joint.li_fetch_suggested_speed_solution();
        joint.constraints_mut()[0].set_l_i(0.0);
        joint.li_load_suggested_speed_solution();
        assert_eq!(joint.constraints()[0].l_i(), 4.0);
    }
}
