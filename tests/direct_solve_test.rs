//! End-to-end tests of the direct solver adapter on small linear systems.

use approx::assert_abs_diff_eq;
use linksolve::solver::LinearSystemSolver;
use linksolve::{
    AssembledMatrix, AssemblyPolicy, DirectSolver, DirectSolverConfig, EngineConfig, EngineError, LinksolveError,
    Result, SystemDescriptor,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Triplet-defined test system.
struct Triplets {
    n: usize,
    entries: Vec<(usize, usize, f64)>,
    b: Vec<f64>,
    x: Vec<f64>,
}

impl Triplets {
    fn new(n: usize, entries: Vec<(usize, usize, f64)>, b: Vec<f64>) -> Self {
        Self {
            n,
            entries,
            b,
            x: vec![f64::NAN; n],
        }
    }
}

impl SystemDescriptor for Triplets {
    fn count_unknowns(&self) -> usize {
        self.n
    }

    fn convert_to_matrix_form(&self, matrix: &mut AssembledMatrix, rhs: &mut [f64]) -> Result<()> {
        for &(r, c, v) in &self.entries {
            matrix.set_element(r, c, v, false);
        }
        rhs.copy_from_slice(&self.b);
        Ok(())
    }

    fn from_vector_to_unknowns(&mut self, solution: &[f64]) -> Result<()> {
        self.x.copy_from_slice(solution);
        Ok(())
    }
}

// ── Round trips ───────────────────────────────────────────────────

#[test]
fn test_known_3x3_solution() {
    init_tracing();
    // [[4, 1, 0], [1, 3, 1], [0, 1, 2]] x = [6, 10, 8]  =>  x = [1, 2, 3]
    let mut sys = Triplets::new(
        3,
        vec![
            (0, 0, 4.0),
            (0, 1, 1.0),
            (1, 0, 1.0),
            (1, 1, 3.0),
            (1, 2, 1.0),
            (2, 1, 1.0),
            (2, 2, 2.0),
        ],
        vec![6.0, 10.0, 8.0],
    );
    let mut solver = DirectSolver::default();
    let residual = solver.solve(&mut sys).expect("solve failed");

    assert_abs_diff_eq!(sys.x[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(sys.x[1], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(sys.x[2], 3.0, epsilon = 1e-12);
    assert!(residual < 1e-12, "residual {residual}");
    assert_eq!(solver.last_residual_norm(), residual);
}

#[test]
fn test_split_contributions_are_summed() {
    init_tracing();
    // Diagonal 2 assembled as 1.5 + 0.5 under the default policy.
    let mut sys = Triplets::new(
        2,
        vec![(0, 0, 1.5), (0, 0, 0.5), (1, 1, 4.0), (0, 1, 1.0)],
        vec![3.0, 4.0],
    );
    let mut solver = DirectSolver::default();
    solver.solve(&mut sys).expect("solve failed");
    assert_abs_diff_eq!(sys.x[1], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(sys.x[0], 1.0, epsilon = 1e-12);
}

#[test]
fn test_unique_policy_gives_same_answer() {
    init_tracing();
    let config = DirectSolverConfig {
        assembly: AssemblyPolicy::unique(),
        ..DirectSolverConfig::default()
    };
    let mut sys = Triplets::new(
        2,
        vec![(0, 0, 1.5), (0, 0, 0.5), (1, 1, 4.0), (0, 1, 1.0)],
        vec![3.0, 4.0],
    );
    let mut solver = DirectSolver::new(config);
    solver.solve(&mut sys).expect("solve failed");
    assert_abs_diff_eq!(sys.x[0], 1.0, epsilon = 1e-12);
    // Accumulated in place: one triplet per cell.
    assert_eq!(solver.last_matrix().map(AssembledMatrix::len), Some(3));
}

#[test]
fn test_permuted_engine_config() {
    init_tracing();
    let config = DirectSolverConfig {
        engine: EngineConfig {
            permutation: Some(vec![1, 0]),
            ..EngineConfig::default()
        },
        ..DirectSolverConfig::default()
    };
    let mut sys = Triplets::new(2, vec![(0, 0, 2.0), (0, 1, 1.0), (1, 0, 5.0), (1, 1, 7.0)], vec![11.0, 13.0]);
    let mut solver = DirectSolver::new(config);
    solver.solve(&mut sys).expect("solve failed");
    assert_abs_diff_eq!(sys.x[0], 64.0 / 9.0, epsilon = 1e-10);
    assert_abs_diff_eq!(sys.x[1], -29.0 / 9.0, epsilon = 1e-10);
}

// ── Failures ──────────────────────────────────────────────────────

#[test]
fn test_singular_system_reports_and_keeps_unknowns() {
    init_tracing();
    // Rows 0 and 1 identical.
    let mut sys = Triplets::new(
        2,
        vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 1.0), (1, 1, 2.0)],
        vec![1.0, 1.0],
    );
    sys.x = vec![0.25, 0.75];
    let mut solver = DirectSolver::default();
    let err = solver.solve(&mut sys).unwrap_err();
    match err {
        LinksolveError::Engine(e) => assert!(e.is_singular(), "unexpected status {e}"),
        other => panic!("expected an engine error, got {other}"),
    }
    assert_eq!(sys.x, vec![0.25, 0.75]);
    assert_eq!(solver.solver_calls(), 1);
    assert_eq!(solver.stats().failed_calls, 1);
}

#[test]
fn test_missing_row_is_structurally_singular() {
    init_tracing();
    let mut sys = Triplets::new(3, vec![(0, 0, 1.0), (1, 1, 1.0), (1, 2, 1.0)], vec![1.0, 1.0, 1.0]);
    let err = DirectSolver::default().solve(&mut sys).unwrap_err();
    assert!(matches!(
        err,
        LinksolveError::Engine(EngineError::StructurallySingular { rank: 2 })
    ));
}

#[test]
fn test_solver_recovers_after_failure() {
    init_tracing();
    let mut solver = DirectSolver::default();
    let mut bad = Triplets::new(2, vec![(0, 0, 1.0)], vec![1.0, 1.0]);
    assert!(solver.solve(&mut bad).is_err());

    let mut good = Triplets::new(2, vec![(0, 0, 2.0), (1, 1, 4.0)], vec![1.0, 1.0]);
    solver.solve(&mut good).expect("solve failed");
    assert_abs_diff_eq!(good.x[0], 0.5, epsilon = 1e-14);
    assert_abs_diff_eq!(good.x[1], 0.25, epsilon = 1e-14);
    assert_eq!(LinearSystemSolver::solver_calls(&solver), 2);
}
