//! Bodies and joints assembled as one velocity-level linear system.
//!
//! With `nv` velocity unknowns (6 per free body) and `nc` registered
//! constraint rows, the system is the saddle-point problem
//!
//! ```text
//! [ M   Cqᵀ ] [  v ]   [  f ]
//! [ Cq  −E  ] [ −λ ] = [ −b ]
//! ```
//!
//! where `M` is block-diagonal with `m I` and the world inertia per body,
//! `f = M v₀ + applied impulse`, `E` holds the rows' CFM terms and `b` the
//! known terms loaded by [`ConstraintSystem::setup`].

use nalgebra::Vector6;

use crate::body::{BodyFrame, BodyId, BodySet};
use crate::constraint::{
    ConstraintElement, ConstraintList, ConstraintRef, ConstraintTwoBodies, JointElement, JointId,
};
use crate::descriptor::SystemDescriptor;
use crate::error::{LinksolveError, Result};
use crate::sparse::AssembledMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stabilization parameters for loading constraint violations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SystemConfig {
    /// Largest correction a single row may request when clamping.
    pub recovery_clamp: f64,
    pub do_clamp: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            recovery_clamp: 0.1,
            do_clamp: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintSystem {
    bodies: BodySet,
    joints: Vec<JointElement>,
    registry: ConstraintList,
    config: SystemConfig,
}

impl ConstraintSystem {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn add_body(&mut self, body: BodyFrame) -> BodyId {
        self.bodies.add(body)
    }

    pub fn add_joint(&mut self, joint: impl Into<JointElement>) -> JointId {
        self.joints.push(joint.into());
        JointId(self.joints.len() - 1)
    }

    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut BodySet {
        &mut self.bodies
    }

    pub fn joint(&self, id: JointId) -> Option<&JointElement> {
        self.joints.get(id.0)
    }

    pub fn joint_mut(&mut self, id: JointId) -> Option<&mut JointElement> {
        self.joints.get_mut(id.0)
    }

    pub fn joints(&self) -> &[JointElement] {
        &self.joints
    }

    /// Registered rows, in multiplier order.
    pub fn registry(&self) -> &ConstraintList {
        &self.registry
    }

    /// Number of velocity unknowns from the last [`Self::setup`].
    pub fn velocity_count(&self) -> usize {
        self.bodies.dof_count()
    }

    /// Prepare a solve: number the body unknowns, update every joint at
    /// `time`, register the active rows and load `b = c_factor * C`.
    pub fn setup(&mut self, time: f64, c_factor: f64) {
        let nv = self.bodies.assign_offsets();
        self.registry.clear();
        for (k, joint) in self.joints.iter_mut().enumerate() {
            joint.update(time, &self.bodies);
            joint.inject_constraints(JointId(k), &mut self.registry);
            joint.bi_reset();
            joint.bi_load_c(c_factor, self.config.recovery_clamp, self.config.do_clamp);
            joint.load_jacobians();
        }
        tracing::debug!(
            bodies = self.bodies.len(),
            joints = self.joints.len(),
            nv,
            nc = self.registry.len(),
            "constraint system set up"
        );
    }

    /// Add the joints' reaction impulses `Cqᵀ λ` to the bodies.
    pub fn apply_reactions(&mut self) {
        for cref in self.registry.iter() {
            let row = self.joints[cref.joint.0].constraints()[cref.row];
            let (imp_a, imp_b) = row.impulses(row.l_i());
            self.bodies[row.body_a()].add_reaction(&imp_a);
            self.bodies[row.body_b()].add_reaction(&imp_b);
        }
    }

    fn row(&self, cref: &ConstraintRef) -> &ConstraintTwoBodies {
        &self.joints[cref.joint.0].constraints()[cref.row]
    }
}

impl SystemDescriptor for ConstraintSystem {
    fn count_unknowns(&self) -> usize {
        self.bodies.dof_count() + self.registry.len()
    }

    fn convert_to_matrix_form(&self, matrix: &mut AssembledMatrix, rhs: &mut [f64]) -> Result<()> {
        let nv = self.bodies.dof_count();
        if rhs.len() != nv + self.registry.len() {
            return Err(LinksolveError::Descriptor(format!(
                "rhs has {} entries, system has {} unknowns",
                rhs.len(),
                nv + self.registry.len()
            )));
        }

        for (_, body) in self.bodies.iter() {
            let Some(off) = body.dof_offset() else {
                continue;
            };
            for i in 0..3 {
                matrix.set_element(off + i, off + i, body.mass(), false);
            }
            matrix.paste_matrix(&body.world_inertia(), off + 3, off + 3, false, false);
            let f: Vector6<f64> = body.momentum() + body.applied();
            rhs[off..off + 6].copy_from_slice(f.as_slice());
        }

        for (k, cref) in self.registry.iter().enumerate() {
            let row = self.row(cref);
            let r = nv + k;
            for (body, cq) in [(row.body_a(), row.cq_a()), (row.body_b(), row.cq_b())] {
                if let Some(off) = self.bodies[body].dof_offset() {
                    matrix.paste_matrix(cq, r, off, false, false);
                    matrix.paste_matrix(cq, off, r, false, true);
                }
            }
            if row.cfm_i() != 0.0 {
                matrix.set_element(r, r, -row.cfm_i(), false);
            }
            rhs[r] = -row.b_i();
        }
        Ok(())
    }

    fn from_vector_to_unknowns(&mut self, solution: &[f64]) -> Result<()> {
        let nv = self.bodies.dof_count();
        if solution.len() != self.count_unknowns() {
            return Err(LinksolveError::Descriptor(format!(
                "solution has {} entries, system has {} unknowns",
                solution.len(),
                self.count_unknowns()
            )));
        }

        for (_, body) in self.bodies.iter_mut() {
            if let Some(off) = body.dof_offset() {
                body.set_velocity(Vector6::from_column_slice(&solution[off..off + 6]));
            }
        }
        for (k, cref) in self.registry.as_slice().iter().enumerate() {
            self.joints[cref.joint.0].constraints_mut()[cref.row].set_l_i(-solution[nv + k]);
        }
        for joint in &mut self.joints {
            joint.fetch_react(1.0);
        }
        Ok(())
    }
}
