//! Scalar bilateral constraint rows between two bodies.

use nalgebra::{RowVector6, Vector3, Vector6};

use crate::body::{skew, BodyId, BodySet};

/// Jacobian row block `[linear, angular]` against one body's 6 DOF.
pub fn jacobian_row(linear: &Vector3<f64>, angular: &Vector3<f64>) -> RowVector6<f64> {
    RowVector6::new(linear.x, linear.y, linear.z, angular.x, angular.y, angular.z)
}

/// One scalar equation `Cq_a v_a + Cq_b v_b + cfm λ = -b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintTwoBodies {
    body_a: BodyId,
    body_b: BodyId,
    cq_a: RowVector6<f64>,
    cq_b: RowVector6<f64>,
    b_i: f64,
    l_i: f64,
    cfm_i: f64,
    active: bool,
}

impl ConstraintTwoBodies {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            cq_a: RowVector6::zeros(),
            cq_b: RowVector6::zeros(),
            b_i: 0.0,
            l_i: 0.0,
            cfm_i: 0.0,
            active: true,
        }
    }

    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    pub fn cq_a(&self) -> &RowVector6<f64> {
        &self.cq_a
    }

    pub fn cq_b(&self) -> &RowVector6<f64> {
        &self.cq_b
    }

    pub fn set_jacobians(&mut self, cq_a: RowVector6<f64>, cq_b: RowVector6<f64>) {
        self.cq_a = cq_a;
        self.cq_b = cq_b;
    }

    /// Known term of the equation.
    pub fn b_i(&self) -> f64 {
        self.b_i
    }

    pub fn set_b_i(&mut self, b_i: f64) {
        self.b_i = b_i;
    }

    /// Multiplier.
    pub fn l_i(&self) -> f64 {
        self.l_i
    }

    pub fn set_l_i(&mut self, l_i: f64) {
        self.l_i = l_i;
    }

    /// Constraint force mixing (regularization) term.
    pub fn cfm_i(&self) -> f64 {
        self.cfm_i
    }

    pub fn set_cfm_i(&mut self, cfm_i: f64) {
        self.cfm_i = cfm_i;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// `Cq v` with the bodies' current velocities.
    pub fn compute_cq_v(&self, bodies: &BodySet) -> f64 {
        self.cq_a.tr_dot(bodies[self.body_a].velocity()) + self.cq_b.tr_dot(bodies[self.body_b].velocity())
    }

    /// Generalized impulses `(Cq_aᵀ λ, Cq_bᵀ λ)` of multiplier `l`.
    pub fn impulses(&self, l: f64) -> (Vector6<f64>, Vector6<f64>) {
        (self.cq_a.transpose() * l, self.cq_b.transpose() * l)
    }
}

/// Fill three rows with the coincidence equations `p_a − p_b = 0`, where
/// `r_a` and `r_b` are the joint point relative to each body's origin.
pub(crate) fn load_coincidence(rows: &mut [ConstraintTwoBodies], r_a: &Vector3<f64>, r_b: &Vector3<f64>) {
    // d(p_a)/dt = v_a + ω_a × r_a = v_a − [r_a]ω_a
    let skew_a = -skew(r_a);
    let skew_b = skew(r_b);
    for (i, row) in rows.iter_mut().take(3).enumerate() {
        let e = Vector3::ith(i, 1.0);
        let ang_a = skew_a.row(i).transpose();
        let ang_b = skew_b.row(i).transpose();
        row.set_jacobians(jacobian_row(&e, &ang_a), jacobian_row(&(-e), &ang_b));
    }
}

/// Fixed-size set of rows of one joint, with residuals and warm-start caches.
///
/// The row count is set at construction and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintBlock {
    rows: Vec<ConstraintTwoBodies>,
    c: Vec<f64>,
    cache_speed: Vec<f64>,
    cache_pos: Vec<f64>,
}

impl ConstraintBlock {
    pub fn new(body_a: BodyId, body_b: BodyId, count: usize) -> Self {
        Self {
            rows: vec![ConstraintTwoBodies::new(body_a, body_b); count],
            c: vec![0.0; count],
            cache_speed: vec![0.0; count],
            cache_pos: vec![0.0; count],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ConstraintTwoBodies] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [ConstraintTwoBodies] {
        &mut self.rows
    }

    /// Current constraint violations.
    pub fn residual(&self) -> &[f64] {
        &self.c
    }

    /// # Panics
    ///
    /// Panics if `c` does not hold one value per row.
    pub fn set_residual(&mut self, c: &[f64]) {
        self.c.copy_from_slice(c);
    }

    pub fn cache_speed(&self) -> &[f64] {
        &self.cache_speed
    }

    pub fn cache_pos(&self) -> &[f64] {
        &self.cache_pos
    }

    pub fn bi_reset(&mut self) {
        for row in &mut self.rows {
            row.set_b_i(0.0);
        }
    }

    /// Add `factor * C` to each known term, clamped to
    /// `[-recovery_clamp, recovery_clamp]` when `do_clamp`.
    pub fn bi_load_c(&mut self, factor: f64, recovery_clamp: f64, do_clamp: bool) {
        for (row, &c) in self.rows.iter_mut().zip(&self.c) {
            row.set_b_i(row.b_i() + clamp_correction(factor * c, recovery_clamp, do_clamp));
        }
    }

    pub fn li_load_suggested_speed_solution(&mut self) {
        for (row, &l) in self.rows.iter_mut().zip(&self.cache_speed) {
            row.set_l_i(l);
        }
    }

    pub fn li_load_suggested_position_solution(&mut self) {
        for (row, &l) in self.rows.iter_mut().zip(&self.cache_pos) {
            row.set_l_i(l);
        }
    }

    pub fn li_fetch_suggested_speed_solution(&mut self) {
        for (cache, row) in self.cache_speed.iter_mut().zip(&self.rows) {
            *cache = row.l_i();
        }
    }

    pub fn li_fetch_suggested_position_solution(&mut self) {
        for (cache, row) in self.cache_pos.iter_mut().zip(&self.rows) {
            *cache = row.l_i();
        }
    }

    /// `r += c * Cqᵀ L`, reading this block's multipliers at `l[off_l..]` and
    /// writing into the velocity slots of the free bodies.
    pub fn load_residual_cql(&self, off_l: usize, r: &mut [f64], l: &[f64], c: f64, bodies: &BodySet) {
        for (i, row) in self.rows.iter().enumerate() {
            let li = l[off_l + i];
            for (body, cq) in [(row.body_a, &row.cq_a), (row.body_b, &row.cq_b)] {
                if let Some(off) = bodies[body].dof_offset() {
                    for k in 0..6 {
                        r[off + k] += c * cq[k] * li;
                    }
                }
            }
        }
    }

    /// `qc += c * C`, optionally clamped.
    pub fn load_constraint_c(&self, off_l: usize, qc: &mut [f64], c: f64, do_clamp: bool, recovery_clamp: f64) {
        for (i, &ci) in self.c.iter().enumerate() {
            qc[off_l + i] += clamp_correction(c * ci, recovery_clamp, do_clamp);
        }
    }

    /// Copy multipliers and known terms from global vectors into the rows.
    pub fn to_lcp(&mut self, off_l: usize, l: &[f64], qc: &[f64]) {
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.set_l_i(l[off_l + i]);
            row.set_b_i(qc[off_l + i]);
        }
    }

    /// Copy the rows' multipliers into a global vector.
    pub fn from_lcp(&self, off_l: usize, l: &mut [f64]) {
        for (i, row) in self.rows.iter().enumerate() {
            l[off_l + i] = row.l_i();
        }
    }

    /// Multipliers of every row.
    pub fn multipliers(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(ConstraintTwoBodies::l_i)
    }
}

fn clamp_correction(value: f64, recovery_clamp: f64, do_clamp: bool) -> f64 {
    if do_clamp {
        value.clamp(-recovery_clamp, recovery_clamp)
    } else {
        value
    }
}
