//! The core's error type.
//!
//! There is no in-protocol recovery: every error here is fatal to the run
//! that produced it. The core does not pull in a derive-macro error crate,
//! matching `timely::execute::execute` and `Configuration::try_build`, which
//! both just return `Result<_, String>`; this enum is the one step up from
//! that, giving callers something to match on without giving up on
//! simplicity.

use std::fmt;

use termination_adapter::SubstrateError;

/// Fatal errors produced by the termination core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationError {
    /// A symmetric allocation failed during `SymmetricState::new`.
    Allocation,
    /// The substrate reported an error on one of its primitives.
    Substrate(String),
    /// A debug assertion caught a protocol invariant violation (e.g. a
    /// second distinct writer to a single-writer slot). Only raised when
    /// `Config::debug` is set.
    InvariantViolation(String),
}

impl fmt::Display for TerminationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationError::Allocation => write!(f, "symmetric allocation failed"),
            TerminationError::Substrate(msg) => write!(f, "substrate error: {msg}"),
            TerminationError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for TerminationError {}

impl From<SubstrateError> for TerminationError {
    fn from(err: SubstrateError) -> Self {
        match err {
            SubstrateError::Allocation => TerminationError::Allocation,
            SubstrateError::Op(msg) => TerminationError::Substrate(msg),
        }
    }
}

/// The result type used throughout the core.
pub type Result<T> = std::result::Result<T, TerminationError>;
