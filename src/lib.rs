//! Constraint layer of a rigid multibody engine.
//!
//! Joints between bodies become bilateral constraint rows; bodies and rows
//! are assembled into a triplet sparse matrix and solved with a direct
//! sparse LU engine driven by job codes.
//!
//! ```ignore
//! let mut sys = ConstraintSystem::new(SystemConfig::default());
//! let ground = sys.add_body(BodyFrame::fixed(Isometry3::identity()));
//! let bob = sys.add_body(BodyFrame::new(pose, mass, inertia));
//! sys.add_joint(UniversalJoint::new(sys.bodies(), ground, bob, &frame));
//! sys.setup(0.0, 1.0 / dt);
//! let residual = DirectSolver::default().solve(&mut sys)?;
//! ```

pub mod body;
pub mod constraint;
pub mod descriptor;
pub mod error;
pub mod solver;
pub mod sparse;
pub mod stats;
pub mod system;

pub use body::{BodyFrame, BodyId, BodySet};
pub use constraint::{ConstraintElement, JointElement, JointId, SphericalJoint, UniversalJoint};
pub use descriptor::SystemDescriptor;
pub use error::{LinksolveError, Result};
pub use solver::direct::{DirectSolver, DirectSolverConfig};
pub use solver::engine::{DirectEngine, EngineConfig, Verbosity};
pub use solver::runtime::{SingleProcessRuntime, SolverRuntime};
pub use solver::status::{EngineError, Info, Job};
pub use sparse::{AssembledMatrix, AssemblyPolicy};
pub use system::{ConstraintSystem, SystemConfig};
