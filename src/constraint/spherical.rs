//! Spherical (ball) joint: the two marker origins coincide.

use nalgebra::{Isometry3, Vector3};

use super::frames::JointFrames;
use super::row::{load_coincidence, ConstraintBlock};
use super::ConstraintElement;
use crate::body::{BodyId, BodySet};

pub const SPHERICAL_CONSTRAINTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SphericalJoint {
    body1: BodyId,
    body2: BodyId,
    frames: JointFrames,
    block: ConstraintBlock,
    react_force: Vector3<f64>,
}

impl SphericalJoint {
    pub fn new(bodies: &BodySet, body1: BodyId, body2: BodyId, frame: &Isometry3<f64>) -> Self {
        let frames = JointFrames::from_absolute(bodies, body1, body2, frame);
        Self::from_frames(bodies, body1, body2, frames)
    }

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
            block: ConstraintBlock::new(body1, body2, SPHERICAL_CONSTRAINTS),
            react_force: Vector3::zeros(),
        };
        joint.update(0.0, bodies);
        joint
    }

    pub fn frame1_rel(&self) -> &Isometry3<f64> {
        &self.frames.frame1
    }

    pub fn frame2_rel(&self) -> &Isometry3<f64> {
        &self.frames.frame2
    }
}

impl ConstraintElement for SphericalJoint {
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
        let p1 = self.frames.frame1_abs(bodies, self.body1).translation.vector;
        let p2 = self.frames.frame2_abs(bodies, self.body2).translation.vector;

        let d = p1 - p2;
        self.block.set_residual(&[d.x, d.y, d.z]);
        load_coincidence(
            self.block.rows_mut(),
            &(p1 - b1.position().coords),
            &(p2 - b2.position().coords),
        );
    }

    fn fetch_react(&mut self, factor: f64) {
        let l = self.block.rows();
        self.react_force = -factor * Vector3::new(l[0].l_i(), l[1].l_i(), l[2].l_i());
    }

    fn gather_reactions(&self, off_l: usize, l: &mut [f64]) {
        l[off_l] = -self.react_force.x;
        l[off_l + 1] = -self.react_force.y;
        l[off_l + 2] = -self.react_force.z;
    }

    fn scatter_reactions(&mut self, off_l: usize, l: &[f64]) {
        self.react_force = -Vector3::new(l[off_l], l[off_l + 1], l[off_l + 2]);
    }

    fn reaction_force(&self) -> Vector3<f64> {
        self.react_force
    }

    fn reaction_torque(&self) -> Vector3<f64> {
        Vector3::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyFrame;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Matrix3, UnitQuaternion};

    #[test]
    fn rotation_about_the_ball_keeps_residual_zero() {
        let mut bodies = BodySet::new();
        let a = bodies.add(BodyFrame::fixed(Isometry3::identity()));
        let b = bodies.add(BodyFrame::new(Isometry3::translation(0.0, -1.0, 0.0), 1.0, Matrix3::identity()));
        let mut joint = SphericalJoint::new(&bodies, a, b, &Isometry3::identity());

        // Swing body 2 about the joint at the origin.
        let swing = Isometry3::rotation(Vector3::new(0.0, 0.0, 0.6));
        let pose = swing * bodies[b].pose();
        bodies[b].set_pose(pose);
        joint.update(0.0, &bodies);
        for &c in joint.residual() {
            assert_abs_diff_eq!(c, 0.0, epsilon = 1e-12);
        }

        bodies[b].apply_relative(&Isometry3::from_parts(
            nalgebra::Translation3::new(0.0, 0.0, 0.25),
            UnitQuaternion::identity(),
        ));
        joint.update(0.0, &bodies);
        let gap: f64 = joint.residual().iter().map(|c| c * c).sum();
        assert_abs_diff_eq!(gap, 0.0625, epsilon = 1e-12);
    }

    #[test]
    fn reactions_round_trip() {
        let mut bodies = BodySet::new();
        let a = bodies.add(BodyFrame::fixed(Isometry3::identity()));
        let b = bodies.add(BodyFrame::new(Isometry3::identity(), 1.0, Matrix3::identity()));
        let mut joint = SphericalJoint::new(&bodies, a, b, &Isometry3::identity());
        joint.scatter_reactions(0, &[1.0, 2.0, 3.0]);
        assert_eq!(joint.reaction_force(), Vector3::new(-1.0, -2.0, -3.0));
        let mut l = [0.0; 3];
        joint.gather_reactions(0, &mut l);
        assert_eq!(l, [1.0, 2.0, 3.0]);
        assert_eq!(joint.reaction_torque(), Vector3::zeros());
    }
}
