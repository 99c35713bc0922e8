//! Error kinds, grouped per the propagation rules in the error-handling
//! design: programmer/config and input errors halt the command; data-quality
//! errors are reported but let the caller continue with partial output;
//! bounds errors either return an empty result or halt, per call site.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LunaError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("evaluation error: {0}")]
    Eval(String),

    #[error("assignment shape mismatch: {0}")]
    Assignment(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("missing channel: {0}")]
    MissingChannel(String),

    #[error("incompatible sampling rates for channels: {0}")]
    IncompatibleRate(String),

    #[error("discontinuous recording where continuity is required: {0}")]
    Discontinuous(String),

    #[error("data quality: {0}")]
    DataQuality(String),

    #[error("out of range for {0}")]
    OutOfRange(String),
}

impl LunaError {
    /// Programmer/config and input errors are hard halts; data-quality
    /// errors are warnings that allow a command to return early with
    /// partial output instead of aborting the whole sequence.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LunaError::DataQuality(_))
    }
}

pub type Result<T> = std::result::Result<T, LunaError>;
