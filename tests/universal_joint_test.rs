//! Joint systems solved end to end through the direct solver.

use approx::assert_abs_diff_eq;
use linksolve::constraint::ConstraintElement;
use linksolve::{
    BodyFrame, BodyId, ConstraintSystem, DirectSolver, JointId, SphericalJoint, SystemConfig, SystemDescriptor,
    UniversalJoint,
};
use nalgebra::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3, Vector6};

const DT: f64 = 0.01;
const G: f64 = 9.81;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn inertia() -> Matrix3<f64> {
    Matrix3::from_diagonal(&Vector3::new(0.2, 0.3, 0.4))
}

/// Ground plus one bob hanging from a universal joint placed at `joint`.
fn pendulum(bob_position: Vector3<f64>, joint: Vector3<f64>) -> (ConstraintSystem, BodyId, JointId) {
    let mut sys = ConstraintSystem::new(SystemConfig::default());
    let ground = sys.add_body(BodyFrame::fixed(Isometry3::identity()));
    let bob = sys.add_body(BodyFrame::new(
        Isometry3::from_parts(Translation3::from(bob_position), UnitQuaternion::identity()),
        2.0,
        inertia(),
    ));
    let frame = Isometry3::from_parts(Translation3::from(joint), UnitQuaternion::identity());
    let id = sys.add_joint(UniversalJoint::new(sys.bodies(), ground, bob, &frame));
    (sys, bob, id)
}

fn assert_rows_satisfied(sys: &ConstraintSystem) {
    for joint in sys.joints() {
        for row in joint.constraints() {
            assert_abs_diff_eq!(row.compute_cq_v(sys.bodies()), -row.b_i(), epsilon = 1e-10);
        }
    }
}

#[test]
fn test_joint_at_center_carries_gravity_impulse() {
    init_tracing();
    let (mut sys, bob, id) = pendulum(Vector3::new(0.0, -1.0, 0.0), Vector3::new(0.0, -1.0, 0.0));
    let mass = sys.bodies()[bob].mass();
    let f = Vector6::new(0.0, -mass * G * DT, 0.0, 0.0, 0.0, 0.0);
    sys.bodies_mut()[bob].set_applied(f);
    sys.setup(0.0, 1.0 / DT);
    assert_eq!(sys.count_unknowns(), 10);

    let mut solver = DirectSolver::default();
    let residual = solver.solve(&mut sys).expect("solve failed");
    assert!(residual < 1e-10, "residual {residual}");

    let v = sys.bodies()[bob].velocity();
    for i in 0..6 {
        assert_abs_diff_eq!(v[i], 0.0, epsilon = 1e-12);
    }
    let joint = sys.joint(id).expect("joint");
    let l: Vec<f64> = joint.constraints().iter().map(|r| r.l_i()).collect();
    assert_abs_diff_eq!(l[0], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(l[1], -mass * G * DT, epsilon = 1e-12);
    assert_abs_diff_eq!(l[2], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(l[3], 0.0, epsilon = 1e-12);

    // The joint holds the bob up.
    assert_abs_diff_eq!(joint.reaction_force(), Vector3::new(0.0, mass * G * DT, 0.0), epsilon = 1e-12);

    sys.apply_reactions();
    let reaction = sys.bodies()[bob].reaction();
    assert_abs_diff_eq!(reaction[1], mass * G * DT, epsilon = 1e-12);
}

#[test]
fn test_swinging_bob_keeps_joint_point_still() {
    init_tracing();
    let (mut sys, bob, _) = pendulum(Vector3::new(0.0, -1.0, 0.0), Vector3::zeros());
    sys.bodies_mut()[bob].set_applied(Vector6::new(0.3, -0.2, 0.1, 0.0, 0.05, 0.0));
    sys.setup(0.0, 1.0 / DT);

    let mut solver = DirectSolver::default();
    solver.solve(&mut sys).expect("solve failed");
    assert_rows_satisfied(&sys);

    // The Z impulse swings the bob about the ground marker's X axis.
    let v = sys.bodies()[bob].velocity();
    assert!(v[2].abs() > 1e-6);
    // Rotation about u1 × v2 = Z is locked.
    assert_abs_diff_eq!(v[5], 0.0, epsilon = 1e-12);

    // Momentum balance M v = f + Cqᵀ λ.
    sys.apply_reactions();
    let body = &sys.bodies()[bob];
    let balance = body.momentum() - body.applied() - body.reaction();
    for i in 0..6 {
        assert_abs_diff_eq!(balance[i], 0.0, epsilon = 1e-10);
    }
}

#[test]
fn test_violation_is_corrected_over_one_step() {
    init_tracing();
    // Bob hangs 1 below the joint but has drifted 0.01 along X.
    let (mut sys, bob, id) = pendulum(Vector3::new(0.0, -1.0, 0.0), Vector3::zeros());
    sys.bodies_mut()[bob].apply_relative(&Isometry3::translation(0.01, 0.0, 0.0));
    sys.setup(0.0, 1.0 / DT);
    let c0 = sys.joint(id).expect("joint").residual()[0];
    assert_abs_diff_eq!(c0, -0.01, epsilon = 1e-12);

    let mut solver = DirectSolver::default();
    solver.solve(&mut sys).expect("solve failed");
    assert_rows_satisfied(&sys);
}

#[test]
fn test_chain_with_spherical_joint() {
    init_tracing();
    let mut sys = ConstraintSystem::new(SystemConfig::default());
    let ground = sys.add_body(BodyFrame::fixed(Isometry3::identity()));
    let upper = sys.add_body(BodyFrame::new(Isometry3::translation(0.0, -0.5, 0.0), 1.0, inertia()));
    let lower = sys.add_body(BodyFrame::new(Isometry3::translation(0.0, -1.5, 0.0), 1.5, inertia()));
    let top = UniversalJoint::new(sys.bodies(), ground, upper, &Isometry3::identity());
    sys.add_joint(top);
    let knee = SphericalJoint::new(sys.bodies(), upper, lower, &Isometry3::translation(0.0, -1.0, 0.0));
    sys.add_joint(knee);

    sys.bodies_mut()[lower].set_applied(Vector6::new(0.5, -0.1, 0.2, 0.0, 0.0, 0.0));
    sys.setup(0.0, 1.0 / DT);
    assert_eq!(sys.count_unknowns(), 12 + 7);

    let mut solver = DirectSolver::default();
    let residual = solver.solve(&mut sys).expect("solve failed");
    assert!(residual < 1e-10, "residual {residual}");
    assert_rows_satisfied(&sys);
    assert_eq!(solver.stats().last_order, 19);
}
