//! Distributed global termination detection over a one-sided PGAS/RMA
//! substrate.
//!
//! Every PE publishes its own completion, a hierarchy of group owners fans
//! that signal in to a single root, the root fans a terminate signal back
//! out to every PE's gate, and an exit coordinator decides who tears down
//! symmetric memory last. [`engine::run`] is the single entry point; the
//! submodules below are its building blocks and can be driven directly by
//! callers that need finer control (e.g. a benchmark harness comparing
//! variants).

pub mod config;
pub mod dynamic;
pub mod engine;
pub mod error;
pub mod fanin;
pub mod fanout;
pub mod flags;
pub mod gate;
pub mod topology;

pub use config::{Config, ExitPolicy, Variant};
pub use engine::{run, RunResult};
pub use error::{Result, TerminationError};
pub use flags::{SymmetricState, DONE_SENTINEL};
pub use topology::Topology;
