//! Job codes and status decoding for the direct engine.
//!
//! Status is reported as an integer pair `(code, detail)`: zero is success,
//! positive codes are warnings and negative codes are errors. The detail
//! carries the offending quantity (non-zero count, job code, rank, ...).

use thiserror::Error;

/// Phase selector for [`super::engine::DirectEngine::call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Job {
    /// Reset the instance and drop any analysis or factorization.
    Initialize,
    /// Release the factorization and the bound problem.
    Terminate,
    Analyze,
    Factorize,
    Solve,
    AnalyzeFactorize,
    FactorizeSolve,
    /// Analyze, factorize and solve in one call.
    #[default]
    All,
}

impl Job {
    pub fn code(self) -> i32 {
        match self {
            Self::Initialize => -1,
            Self::Terminate => -2,
            Self::Analyze => 1,
            Self::Factorize => 2,
            Self::Solve => 3,
            Self::AnalyzeFactorize => 4,
            Self::FactorizeSolve => 5,
            Self::All => 6,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Self::Initialize,
            -2 => Self::Terminate,
            1 => Self::Analyze,
            2 => Self::Factorize,
            3 => Self::Solve,
            4 => Self::AnalyzeFactorize,
            5 => Self::FactorizeSolve,
            6 => Self::All,
            _ => return None,
        })
    }

    pub fn analyzes(self) -> bool {
        matches!(self, Self::Analyze | Self::AnalyzeFactorize | Self::All)
    }

    pub fn factorizes(self) -> bool {
        matches!(
            self,
            Self::Factorize | Self::AnalyzeFactorize | Self::FactorizeSolve | Self::All
        )
    }

    pub fn solves(self) -> bool {
        matches!(self, Self::Solve | Self::FactorizeSolve | Self::All)
    }
}

/// Status codes.
pub mod code {
    pub const SUCCESS: i32 = 0;
    pub const WARN_OUT_OF_RANGE_ENTRIES: i32 = 1;
    pub const ERROR_ON_PROCESSOR: i32 = -1;
    pub const NZ_OUT_OF_RANGE: i32 = -2;
    pub const WRONG_JOB: i32 = -3;
    pub const BAD_PERMUTATION: i32 = -4;
    pub const REAL_WORKSPACE: i32 = -5;
    pub const STRUCTURALLY_SINGULAR: i32 = -6;
    pub const INTEGER_WORKSPACE: i32 = -7;
    pub const NUMERICALLY_SINGULAR: i32 = -10;
    pub const ORDER_OUT_OF_RANGE: i32 = -16;
    pub const SINGLE_PROCESSOR_HOST: i32 = -21;
    pub const ARRAY_POINTERS: i32 = -22;
}

/// Global status of the last job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Info {
    pub code: i32,
    pub detail: i32,
}

impl Info {
    pub const OK: Self = Self { code: 0, detail: 0 };

    pub fn new(code: i32, detail: i32) -> Self {
        Self { code, detail }
    }

    pub fn is_error(self) -> bool {
        self.code < 0
    }

    pub fn is_warning(self) -> bool {
        self.code > 0
    }

    /// Decode into an [`EngineError`]; `Ok` for success and warnings.
    pub fn check(self) -> Result<(), EngineError> {
        if self.is_error() {
            Err(EngineError::decode(self))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("error on processor {rank}")]
    ErrorOnProcessor { rank: i32 },

    #[error("number of nonzeros out of range NZ={nz}")]
    NonzerosOutOfRange { nz: i32 },

    #[error("called with wrong JOB={job}")]
    WrongJob { job: i32 },

    #[error("error in user-provided permutation at position {position}")]
    BadPermutation { position: i32 },

    #[error("problem of real workspace allocation of size {size}")]
    RealWorkspace { size: i32 },

    #[error("matrix is singular in structure, rank {rank}")]
    StructurallySingular { rank: i32 },

    #[error("problem of integer workspace allocation of size {size}")]
    IntegerWorkspace { size: i32 },

    #[error("matrix is numerically singular (pivot {pivot})")]
    NumericallySingular { pivot: i32 },

    #[error("N is out of range, N={n}")]
    OrderOutOfRange { n: i32 },

    #[error("host-working parallel mode not allowed with a single processor")]
    SingleProcessorHost,

    #[error("array pointers have problems, detail {detail}")]
    ArrayPointers { detail: i32 },

    #[error("status {code}, detail {detail}")]
    Other { code: i32, detail: i32 },
}

impl EngineError {
    pub fn decode(info: Info) -> Self {
        let d = info.detail;
        match info.code {
            code::ERROR_ON_PROCESSOR => Self::ErrorOnProcessor { rank: d },
            code::NZ_OUT_OF_RANGE => Self::NonzerosOutOfRange { nz: d },
            code::WRONG_JOB => Self::WrongJob { job: d },
            code::BAD_PERMUTATION => Self::BadPermutation { position: d },
            code::REAL_WORKSPACE => Self::RealWorkspace { size: d },
            code::STRUCTURALLY_SINGULAR => Self::StructurallySingular { rank: d },
            code::INTEGER_WORKSPACE => Self::IntegerWorkspace { size: d },
            code::NUMERICALLY_SINGULAR => Self::NumericallySingular { pivot: d },
            code::ORDER_OUT_OF_RANGE => Self::OrderOutOfRange { n: d },
            code::SINGLE_PROCESSOR_HOST => Self::SingleProcessorHost,
            code::ARRAY_POINTERS => Self::ArrayPointers { detail: d },
            code => Self::Other { code, detail: d },
        }
    }

    pub fn info(&self) -> Info {
        match *self {
            Self::ErrorOnProcessor { rank } => Info::new(code::ERROR_ON_PROCESSOR, rank),
            Self::NonzerosOutOfRange { nz } => Info::new(code::NZ_OUT_OF_RANGE, nz),
            Self::WrongJob { job } => Info::new(code::WRONG_JOB, job),
            Self::BadPermutation { position } => Info::new(code::BAD_PERMUTATION, position),
            Self::RealWorkspace { size } => Info::new(code::REAL_WORKSPACE, size),
            Self::StructurallySingular { rank } => Info::new(code::STRUCTURALLY_SINGULAR, rank),
            Self::IntegerWorkspace { size } => Info::new(code::INTEGER_WORKSPACE, size),
            Self::NumericallySingular { pivot } => Info::new(code::NUMERICALLY_SINGULAR, pivot),
            Self::OrderOutOfRange { n } => Info::new(code::ORDER_OUT_OF_RANGE, n),
            Self::SingleProcessorHost => Info::new(code::SINGLE_PROCESSOR_HOST, 0),
            Self::ArrayPointers { detail } => Info::new(code::ARRAY_POINTERS, detail),
            Self::Other { code, detail } => Info::new(code, detail),
        }
    }

    pub fn code(&self) -> i32 {
        self.info().code
    }

    pub fn detail(&self) -> i32 {
        self.info().detail
    }

    /// Either flavor of singular matrix.
    pub fn is_singular(&self) -> bool {
        matches!(
            self,
            Self::StructurallySingular { .. } | Self::NumericallySingular { .. }
        )
    }
}
