//! Joint constraint elements.
//!
//! A joint turns the relative pose of two bodies into a fixed number of
//! scalar bilateral equations. Each equation is a [`ConstraintTwoBodies`]
//! row: a residual, one Jacobian block per body and a multiplier.
//!
//! Joints take part in two pathways. The matrix pathway reads residuals and
//! Jacobians to assemble a linear system (see [`crate::system`]). The
//! iterative pathway registers rows with a [`ConstraintRegistry`] and drives
//! them through the `bi_*`, `li_*` and `fetch_react` calls of
//! [`ConstraintElement`].

pub mod frames;
pub mod row;
pub mod spherical;
pub mod universal;

pub use frames::JointFrames;
pub use row::{ConstraintBlock, ConstraintTwoBodies};
pub use spherical::SphericalJoint;
pub use universal::UniversalJoint;

use nalgebra::Vector3;

use crate::body::{BodyId, BodySet};

/// Handle of a joint inside its owning system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub usize);

/// Address of one constraint row: joint and row index within the joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintRef {
    pub joint: JointId,
    pub row: usize,
}

/// Collects the constraint rows taking part in a solve.
pub trait ConstraintRegistry {
    fn insert_constraint(&mut self, constraint: ConstraintRef);

    /// Unregister every row of `joint`.
    fn remove_joint(&mut self, joint: JointId);
}

/// Ordered list of registered rows; the order is the multiplier order.
#[derive(Debug, Clone, Default)]
pub struct ConstraintList {
    refs: Vec<ConstraintRef>,
}

impl ConstraintList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }

    pub fn as_slice(&self) -> &[ConstraintRef] {
        &self.refs
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstraintRef> {
        self.refs.iter()
    }
}

impl ConstraintRegistry for ConstraintList {
    fn insert_constraint(&mut self, constraint: ConstraintRef) {
        self.refs.push(constraint);
    }

    fn remove_joint(&mut self, joint: JointId) {
        self.refs.retain(|c| c.joint != joint);
    }
}

/// Uniform interface of every joint type.
///
/// Implementors provide geometry ([`Self::update`]) and reactions; the row
/// protocol is shared through the joint's [`ConstraintBlock`].
pub trait ConstraintElement {
    /// The two connected bodies.
    fn bodies(&self) -> (BodyId, BodyId);

    fn block(&self) -> &ConstraintBlock;

    fn block_mut(&mut self) -> &mut ConstraintBlock;

    /// Recompute residuals and Jacobians from the current body poses.
    fn update(&mut self, time: f64, bodies: &BodySet);

    /// Store reactions from the rows' multipliers scaled by `factor`.
    fn fetch_react(&mut self, factor: f64);

    /// Write the stored reactions as multipliers into `l[off_l..]`.
    fn gather_reactions(&self, off_l: usize, l: &mut [f64]);

    /// Set the stored reactions from multipliers in `l[off_l..]`.
    fn scatter_reactions(&mut self, off_l: usize, l: &[f64]);

    /// Reaction force on the second body, world frame.
    fn reaction_force(&self) -> Vector3<f64>;

    /// Reaction torque on the second body, world frame.
    fn reaction_torque(&self) -> Vector3<f64>;

    fn constraint_count(&self) -> usize {
        self.block().len()
    }

    /// Current violation of each equation.
    fn residual(&self) -> &[f64] {
        self.block().residual()
    }

    fn constraints(&self) -> &[ConstraintTwoBodies] {
        self.block().rows()
    }

    fn constraints_mut(&mut self) -> &mut [ConstraintTwoBodies] {
        self.block_mut().rows_mut()
    }

    /// Register the active rows of this joint.
    fn inject_constraints(&self, joint: JointId, registry: &mut dyn ConstraintRegistry) {
        for (row, c) in self.constraints().iter().enumerate() {
            if c.is_active() {
                registry.insert_constraint(ConstraintRef { joint, row });
            }
        }
    }

    fn bi_reset(&mut self) {
        self.block_mut().bi_reset();
    }

    fn bi_load_c(&mut self, factor: f64, recovery_clamp: f64, do_clamp: bool) {
        self.block_mut().bi_load_c(factor, recovery_clamp, do_clamp);
    }

    /// Jacobians are refreshed by [`Self::update`]; nothing left to load.
    fn load_jacobians(&mut self) {}

    fn li_load_suggested_speed_solution(&mut self) {
        self.block_mut().li_load_suggested_speed_solution();
    }

    fn li_load_suggested_position_solution(&mut self) {
        self.block_mut().li_load_suggested_position_solution();
    }

    fn li_fetch_suggested_speed_solution(&mut self) {
        self.block_mut().li_fetch_suggested_speed_solution();
    }

    fn li_fetch_suggested_position_solution(&mut self) {
        self.block_mut().li_fetch_suggested_position_solution();
    }

    fn load_residual_cql(&self, off_l: usize, r: &mut [f64], l: &[f64], c: f64, bodies: &BodySet) {
        self.block().load_residual_cql(off_l, r, l, c, bodies);
    }

    fn load_constraint_c(&self, off_l: usize, qc: &mut [f64], c: f64, do_clamp: bool, recovery_clamp: f64) {
        self.block().load_constraint_c(off_l, qc, c, do_clamp, recovery_clamp);
    }

    fn to_lcp(&mut self, off_l: usize, l: &[f64], qc: &[f64]) {
        self.block_mut().to_lcp(off_l, l, qc);
    }

    fn from_lcp(&self, off_l: usize, l: &mut [f64]) {
        self.block().from_lcp(off_l, l);
    }
}

/// Closed set of joint types.
#[derive(Debug, Clone, PartialEq)]
pub enum JointElement {
    Universal(UniversalJoint),
    Spherical(SphericalJoint),
}

impl From<UniversalJoint> for JointElement {
    fn from(joint: UniversalJoint) -> Self {
        Self::Universal(joint)
    }
}

impl From<SphericalJoint> for JointElement {
    fn from(joint: SphericalJoint) -> Self {
        Self::Spherical(joint)
    }
}

macro_rules! dispatch {
    ($self:ident, $joint:ident => $body:expr) => {
        match $self {
            JointElement::Universal($joint) => $body,
            JointElement::Spherical($joint) => $body,
        }
    };
}

impl ConstraintElement for JointElement {
    fn bodies(&self) -> (BodyId, BodyId) {
        dispatch!(self, j => j.bodies())
    }

    fn block(&self) -> &ConstraintBlock {
        dispatch!(self, j => j.block())
    }

    fn block_mut(&mut self) -> &mut ConstraintBlock {
        dispatch!(self, j => j.block_mut())
    }

    fn update(&mut self, time: f64, bodies: &BodySet) {
        dispatch!(self, j => j.update(time, bodies))
    }

    fn fetch_react(&mut self, factor: f64) {
        dispatch!(self, j => j.fetch_react(factor))
    }

    fn gather_reactions(&self, off_l: usize, l: &mut [f64]) {
        dispatch!(self, j => j.gather_reactions(off_l, l))
    }

    fn scatter_reactions(&mut self, off_l: usize, l: &[f64]) {
        dispatch!(self, j => j.scatter_reactions(off_l, l))
    }

    fn reaction_force(&self) -> Vector3<f64> {
        dispatch!(self, j => j.reaction_force())
    }

    fn reaction_torque(&self) -> Vector3<f64> {
        dispatch!(self, j => j.reaction_torque())
    }
}
