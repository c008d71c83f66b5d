//! The Termination Gate & Exit Coordinator.
//!
//! Every PE blocks on its own gate until it opens; what happens next is
//! governed by an [`ExitPolicy`] so that no PE issues a remote operation
//! against a target that has already torn down its symmetric memory.
//!
//! Variant B is grounded directly on `root_print_then_release_and_exit` in
//! the dynamic-leader source: the root prints its aggregate exactly once
//! (guarded by a compare-swap on `agg_printed`), publishes `root_go`, waits
//! for every non-root's acknowledgement via `exit_acks`, and only then
//! exits. Non-roots acknowledge and exit immediately on observing `root_go`.

use termination_adapter::{Cmp, Substrate};
use termination_logging::TerminationEvent;

use crate::config::ExitPolicy;
use crate::error::Result;
use crate::fanout::wait_gate;
use crate::flags::SymmetricState;

/// The root is always the owner of group 0 at the top level, and
/// `Topology::owner` is `group * span`, so the root is always PE 0
/// regardless of `N`, `G`, or `K`.
const ROOT_PE: usize = 0;

/// Aggregate elapsed-time statistics across every PE, reported in
/// milliseconds. Printing is a debug/observational aid, not parsed by
/// anything downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElapsedSummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

fn gather_elapsed_summary<S: Substrate>(state: &SymmetricState<S>) -> ElapsedSummary {
    let peers = state.substrate().peers();
    let me = state.me();
    let mut min_ms = f64::INFINITY;
    let mut max_ms = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for pe in 0..peers {
        let val = if pe == me { state.substrate().get_f64(state.elapsed_ms(), me) } else { state.substrate().get_f64(state.elapsed_ms(), pe) };
        min_ms = min_ms.min(val);
        max_ms = max_ms.max(val);
        sum += val;
    }
    ElapsedSummary { min_ms, avg_ms: sum / peers as f64, max_ms }
}

/// Runs the exit coordination protocol for this PE once it has observed its
/// gate. Returns the aggregate summary at the root when the chosen policy
/// computes one (Variant A always does, as a post-barrier courtesy; Variant
/// B only at the root; Variant C never returns, it calls `global_exit`
/// before this function could produce a value).
pub fn coordinate_exit<S: Substrate>(state: &SymmetricState<S>, policy: ExitPolicy, is_root: bool) -> Result<Option<ElapsedSummary>> {
    wait_gate(state);

    match policy {
        ExitPolicy::Barrier => {
            let summary = if is_root { Some(gather_elapsed_summary(state)) } else { None };
            state.substrate().barrier_all();
            Ok(summary)
        }
        ExitPolicy::RootLast => {
            if is_root {
                let old = state.substrate().cas_i64(state.agg_printed(), 0, 1, ROOT_PE);
                let summary = if old == 0 { Some(gather_elapsed_summary(state)) } else { None };

                state.substrate().put_i64(state.root_go(), 1, ROOT_PE);
                state.substrate().quiet();

                let expected = state.substrate().peers() as i64 - 1;
                state.substrate().wait_until_i64(state.exit_acks(), Cmp::Ge, expected);
                state.substrate().quiet();
                state.logger().log(TerminationEvent::ExitReleased);
                Ok(summary)
            } else {
                // `root_go` is hosted at the root; `wait_until_i64` only ever
                // observes memory local to this PE, so a remote value can't
                // be waited on directly. Poll the root's copy with a short
                // backoff instead, mirroring the source's `tiny_pause`
                // spin-wait used for exactly this remote-scalar check.
                while state.substrate().get_i64(state.root_go(), ROOT_PE) != 1 {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                state.substrate().fetch_inc_i64(state.exit_acks(), ROOT_PE);
                state.substrate().quiet();
                state.logger().log(TerminationEvent::ExitAck { pe: state.me() });
                Ok(None)
            }
        }
        ExitPolicy::RootProcessExit => {
            if is_root {
                let summary = gather_elapsed_summary(state);
                state.substrate().quiet();
                state.substrate().global_exit(0);
            } else {
                Ok(None)
            }
        }
    }
}
