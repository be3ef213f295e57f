//! Joint marker frames fixed in body coordinates.

use nalgebra::Isometry3;

use crate::body::{BodyId, BodySet};

/// One marker frame on each of the two connected bodies, in body coordinates.
///
/// Set once at joint construction; only the bodies' poses move them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointFrames {
    pub frame1: Isometry3<f64>,
    pub frame2: Isometry3<f64>,
}

impl JointFrames {
    /// Both markers coincide with the absolute `frame` at the current poses.
    pub fn from_absolute(bodies: &BodySet, body1: BodyId, body2: BodyId, frame: &Isometry3<f64>) -> Self {
        Self {
            frame1: bodies[body1].to_local(frame),
            frame2: bodies[body2].to_local(frame),
        }
    }

    /// Markers given separately, either in body coordinates (`local`) or in
    /// absolute coordinates.
    pub fn from_pair(
        bodies: &BodySet,
        body1: BodyId,
        body2: BodyId,
        local: bool,
        frame1: &Isometry3<f64>,
        frame2: &Isometry3<f64>,
    ) -> Self {
        if local {
            Self {
                frame1: *frame1,
                frame2: *frame2,
            }
        } else {
            Self {
                frame1: bodies[body1].to_local(frame1),
                frame2: bodies[body2].to_local(frame2),
            }
        }
    }

    pub fn frame1_abs(&self, bodies: &BodySet, body1: BodyId) -> Isometry3<f64> {
        bodies[body1].to_absolute(&self.frame1)
    }

    pub fn frame2_abs(&self, bodies: &BodySet, body2: BodyId) -> Isometry3<f64> {
        bodies[body2].to_absolute(&self.frame2)
    }
}
