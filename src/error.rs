use thiserror::Error;

use crate::solver::status::EngineError;

#[derive(Debug, Error)]
pub enum LinksolveError {
    #[error("Assembly error: {0}")]
    Assembly(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Descriptor error: {0}")]
    Descriptor(String),
}

pub type Result<T> = std::result::Result<T, LinksolveError>;
