//! Direct sparse solver engine.
//!
//! Wraps the sparse LU back end behind a job-code driven interface:
//! the problem (an assembled matrix and a right-hand side) is moved into the
//! engine with [`DirectEngine::set_problem`], one or more jobs are run with
//! [`DirectEngine::call`], and the buffers are handed back with
//! [`DirectEngine::take_problem`]. On a successful solve the right-hand side
//! buffer holds the solution.
//!
//! The matrix is centralized on the host rank of the runtime. Only the host
//! analyzes and factorizes; status and solution are broadcast to the other
//! ranks so that every rank returns the same status from `call`.

use faer::sparse::linalg::solvers::{Lu, SymbolicLu};

use super::runtime::SolverRuntime;
use super::sparse_direct::{self, detail};
use super::status::{code, EngineError, Info, Job};
use crate::sparse::AssembledMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which diagnostic streams the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Verbosity {
    /// Log failed jobs at error level.
    pub errors: bool,
    /// Log phase-level diagnostics and warnings.
    pub diagnostics: bool,
    /// Log a summary after every job.
    pub global_info: bool,
}

impl Default for Verbosity {
    fn default() -> Self {
        Self {
            errors: true,
            diagnostics: false,
            global_info: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    pub verbosity: Verbosity,
    /// Symmetric permutation applied before factorization: row/column `i`
    /// of the assembled matrix becomes row/column `permutation[i]`.
    pub permutation: Option<Vec<usize>>,
}

struct Problem {
    matrix: AssembledMatrix,
    rhs: Vec<f64>,
}

/// One instance of the direct solver bound to a runtime.
///
/// Created by [`DirectEngine::initialize`]; the instance is terminated when
/// dropped. The runtime must outlive the engine.
pub struct DirectEngine<'rt> {
    runtime: &'rt dyn SolverRuntime,
    config: EngineConfig,
    problem: Option<Problem>,
    n: usize,
    nz: usize,
    symbolic: Option<SymbolicLu<usize>>,
    analyzed_n: usize,
    lu: Option<Lu<usize, f64>>,
    terminated: bool,
    info: Info,
}

impl<'rt> DirectEngine<'rt> {
    /// Start an instance: general unsymmetric matrix, centralized on the host.
    pub fn initialize(runtime: &'rt dyn SolverRuntime, config: EngineConfig) -> Self {
        let mut engine = Self {
            runtime,
            config,
            problem: None,
            n: 0,
            nz: 0,
            symbolic: None,
            analyzed_n: 0,
            lu: None,
            terminated: false,
            info: Info::OK,
        };
        engine.call(Job::Initialize);
        engine
    }

    /// Move the problem into the engine.
    ///
    /// The matrix is trimmed and switched to one-based indexing; both
    /// buffers stay with the engine until [`Self::take_problem`].
    pub fn set_problem(&mut self, mut matrix: AssembledMatrix, rhs: Vec<f64>) {
        matrix.trim();
        self.n = matrix.nrows();
        self.nz = matrix.len();
        matrix.set_one_indexed(true);
        self.problem = Some(Problem { matrix, rhs });
    }

    /// Hand the matrix (still one-based) and the right-hand side buffer back.
    pub fn take_problem(&mut self) -> Option<(AssembledMatrix, Vec<f64>)> {
        self.problem.take().map(|p| (p.matrix, p.rhs))
    }

    /// Right-hand side buffer; the solution after a successful solve job.
    pub fn rhs(&self) -> Option<&[f64]> {
        self.problem.as_ref().map(|p| p.rhs.as_slice())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Order of the bound problem.
    pub fn order(&self) -> usize {
        self.n
    }

    /// Stored triplets of the bound problem.
    pub fn nonzeros(&self) -> usize {
        self.nz
    }

    pub fn is_analyzed(&self) -> bool {
        self.symbolic.is_some()
    }

    pub fn is_factorized(&self) -> bool {
        self.lu.is_some()
    }

    /// Status of the last job.
    pub fn info(&self) -> Info {
        self.info
    }

    pub fn check(&self) -> Result<(), EngineError> {
        self.info.check()
    }

    /// Run a job given by its raw code and return the global status code.
    pub fn call_code(&mut self, job_code: i32) -> i32 {
        match Job::from_code(job_code) {
            Some(job) => self.call(job),
            None => {
                let info = Info::new(code::WRONG_JOB, job_code);
                self.finish(None, info)
            }
        }
    }

    /// Run `job` and return the global status code (0 on success, negative
    /// on error, positive for warnings). Nothing is retried.
    pub fn call(&mut self, job: Job) -> i32 {
        let _span = tracing::debug_span!("engine_job", job = job.code()).entered();
        let info = if self.runtime.is_host() {
            match self.run_on_host(job) {
                Ok(info) => info,
                Err(e) => e.info(),
            }
        } else {
            Info::OK
        };
        match job {
            Job::Initialize | Job::Terminate => {
                self.terminated = job == Job::Terminate;
                self.runtime.barrier();
            }
            _ => {}
        }
        self.finish(Some(job), info)
    }

    fn finish(&mut self, job: Option<Job>, info: Info) -> i32 {
        let mut status = [info.code, info.detail, detail(self.n)];
        self.runtime.broadcast_ints(&mut status);
        self.info = Info::new(status[0], status[1]);

        if job.is_some_and(Job::solves) && !self.info.is_error() && self.runtime.num_ranks() > 1 {
            let n = usize::try_from(status[2]).unwrap_or(0);
            match self.problem.as_mut() {
                Some(p) => {
                    p.rhs.resize(n, 0.0);
                    self.runtime.broadcast_values(&mut p.rhs);
                }
                None => self.runtime.broadcast_values(&mut vec![0.0; n]),
            }
        }

        let verbosity = self.config.verbosity;
        if let Err(e) = self.info.check() {
            if verbosity.errors {
                tracing::error!(code = self.info.code, detail = self.info.detail, "{e}");
            }
        } else if self.info.is_warning() && verbosity.diagnostics {
            tracing::warn!(code = self.info.code, detail = self.info.detail, "direct engine warning");
        }
        if verbosity.global_info {
            tracing::info!(
                job = job.map_or(0, Job::code),
                n = self.n,
                nz = self.nz,
                code = self.info.code,
                "direct engine job finished"
            );
        }
        self.info.code
    }

    fn run_on_host(&mut self, job: Job) -> Result<Info, EngineError> {
        match job {
            Job::Initialize | Job::Terminate => {
                self.symbolic = None;
                self.lu = None;
                return Ok(Info::OK);
            }
            _ if self.terminated => return Err(EngineError::WrongJob { job: job.code() }),
            _ => {}
        }

        let n = self.n;
        let Some(problem) = self.problem.as_mut() else {
            return Err(EngineError::ArrayPointers { detail: 0 });
        };
        if n == 0 || i32::try_from(n).is_err() {
            return Err(EngineError::OrderOutOfRange { n: detail(n) });
        }
        if problem.matrix.ncols() != n {
            return Err(EngineError::OrderOutOfRange { n: detail(problem.matrix.ncols()) });
        }
        if self.nz == 0 || i32::try_from(self.nz).is_err() {
            return Err(EngineError::NonzerosOutOfRange { nz: detail(self.nz) });
        }
        if job.solves() && problem.rhs.len() != n {
            return Err(EngineError::ArrayPointers { detail: detail(problem.rhs.len()) });
        }

        let perm = self.config.permutation.as_deref();
        if let Some(p) = perm {
            sparse_direct::validate_permutation(p, n)?;
        }

        let mut status = Info::OK;
        if job.analyzes() || job.factorizes() {
            let entries = sparse_direct::collect_entries(&problem.matrix, n, perm)?;
            if entries.out_of_range > 0 {
                status = Info::new(code::WARN_OUT_OF_RANGE_ENTRIES, detail(entries.out_of_range));
            }

            if job.analyzes() {
                self.lu = None;
                self.symbolic = Some(sparse_direct::analyze(n, &entries.triplets)?);
                self.analyzed_n = n;
                if self.config.verbosity.diagnostics {
                    tracing::debug!(n, nz = entries.triplets.len(), "analysis done");
                }
            }

            if job.factorizes() {
                let symbolic = match &self.symbolic {
                    Some(s) if self.analyzed_n == n => s,
                    _ => return Err(EngineError::WrongJob { job: job.code() }),
                };
                self.lu = Some(sparse_direct::factorize(symbolic, n, &entries.triplets)?);
                if self.config.verbosity.diagnostics {
                    tracing::debug!(n, "factorization done");
                }
            }
        }

        if job.solves() {
            let Some(lu) = &self.lu else {
                return Err(EngineError::WrongJob { job: job.code() });
            };
            let x = match perm {
                Some(p) => {
                    let mut b = vec![0.0; n];
                    for (i, &pi) in p.iter().enumerate() {
                        b[pi] = problem.rhs[i];
                    }
                    let y = sparse_direct::solve(lu, &b)?;
                    p.iter().map(|&pi| y[pi]).collect()
                }
                None => sparse_direct::solve(lu, &problem.rhs)?,
            };
            problem.rhs.copy_from_slice(&x);
        }

        Ok(status)
    }

    /// Log the decoded status of the last job.
    pub fn report(&self) {
        match self.info.check() {
            Err(e) => tracing::error!(code = self.info.code, detail = self.info.detail, "{e}"),
            Ok(()) if self.info.is_warning() => tracing::warn!(
                code = self.info.code,
                detail = self.info.detail,
                "direct engine finished with warnings"
            ),
            Ok(()) => tracing::info!("direct engine successful"),
        }
    }
}

impl Drop for DirectEngine<'_> {
    fn drop(&mut self) {
        if !self.terminated {
            self.call(Job::Terminate);
        }
    }
}
