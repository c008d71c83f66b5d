//! The External Adapter: the thin interface between the termination
//! detection core and a PGAS/RMA substrate.
//!
//! The core depends on exactly the primitives named in [`Substrate`], never
//! on a concrete transport. [`sim`] provides an in-process, thread-backed
//! substrate for tests and the bundled examples; a real deployment would
//! implement [`Substrate`] against OpenSHMEM, UPC++, or a vendor RMA library.

pub mod buzzer;
pub mod sim;

use std::fmt;

/// A comparison used by [`Substrate::wait_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// Block until the value equals the target.
    Eq,
    /// Block until the value is greater than or equal to the target.
    Ge,
}

impl Cmp {
    pub(crate) fn holds(self, observed: i64, target: i64) -> bool {
        match self {
            Cmp::Eq => observed == target,
            Cmp::Ge => observed >= target,
        }
    }
}

/// A symmetric `i64` slot: the same logical offset on every PE.
///
/// Slots are produced by collective allocation (every PE must allocate the
/// same slots in the same order; see `termination-core`'s `SymmetricState`)
/// and addressed together with a target PE id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotI64(pub usize);

/// A symmetric `f64` slot, analogous to [`SlotI64`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotF64(pub usize);

/// Fatal errors a substrate may report. Every error here is terminal: the
/// core never attempts to recover in-protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstrateError {
    /// A symmetric allocation failed on this PE.
    Allocation,
    /// The substrate reported an error from a primitive; the message is
    /// substrate-specific diagnostic text.
    Op(String),
}

impl fmt::Display for SubstrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstrateError::Allocation => write!(f, "symmetric allocation failed"),
            SubstrateError::Op(msg) => write!(f, "substrate error: {msg}"),
        }
    }
}

impl std::error::Error for SubstrateError {}

/// The PGAS/RMA primitives the termination core is built on.
///
/// Every method that addresses a `target_pe` performs a *remote* operation
/// except where documented otherwise; every method that does not take a
/// `target_pe` operates on `self`'s own memory.
pub trait Substrate {
    /// This PE's id, in `0..self.peers()`.
    fn index(&self) -> usize;
    /// The number of PEs participating in this run.
    fn peers(&self) -> usize;

    /// Collectively allocates one symmetric `i64` slot initialized to
    /// `init`. Must be called in the same order by every PE.
    fn alloc_i64(&self, init: i64) -> Result<SlotI64, SubstrateError>;
    /// Collectively allocates one symmetric `f64` slot initialized to
    /// `init`. Must be called in the same order by every PE.
    fn alloc_f64(&self, init: f64) -> Result<SlotF64, SubstrateError>;

    /// One-sided remote write. Not guaranteed visible at `target_pe` until
    /// this PE calls [`Substrate::quiet`].
    fn put_i64(&self, slot: SlotI64, val: i64, target_pe: usize);
    /// One-sided remote read; returns the value at `source_pe` immediately.
    fn get_i64(&self, slot: SlotI64, source_pe: usize) -> i64;
    /// One-sided remote write of an `f64` slot. See [`Substrate::put_i64`].
    fn put_f64(&self, slot: SlotF64, val: f64, target_pe: usize);
    /// One-sided remote read of an `f64` slot. See [`Substrate::get_i64`].
    fn get_f64(&self, slot: SlotF64, source_pe: usize) -> f64;

    /// Blocks until every prior put issued by this PE has completed at its
    /// target.
    fn quiet(&self);
    /// Blocks until the local memory at `slot` (hosted on this PE) satisfies
    /// `cmp` against `val`. Never call with a slot hosted on another PE.
    fn wait_until_i64(&self, slot: SlotI64, cmp: Cmp, val: i64);

    /// Atomic compare-and-swap at `target_pe`; returns the prior value.
    fn cas_i64(&self, slot: SlotI64, expected: i64, desired: i64, target_pe: usize) -> i64;
    /// Atomic fetch-and-increment at `target_pe`; returns the prior value.
    fn fetch_inc_i64(&self, slot: SlotI64, target_pe: usize) -> i64;

    /// A collective barrier over every PE.
    fn barrier_all(&self);
    /// Terminates the entire job with `status`. Never returns.
    fn global_exit(&self, status: i32) -> !;
}
