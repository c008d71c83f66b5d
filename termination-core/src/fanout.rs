//! The Downward Fan-Out Engine: top-down propagation of the global
//! terminate signal from the root to every PE's own gate.

use termination_adapter::{Cmp, Substrate};
use termination_logging::TerminationEvent;

use crate::error::Result;
use crate::flags::{SymmetricState, DONE_SENTINEL};

/// Seeds the top-level broadcast token. Under the static variants this is
/// always called by the root itself; under the dynamic-leader variant the
/// caller is whichever PE's fetch-increment happened to complete the top
/// level, which need not be the root. Either way the token is written to the
/// canonical top-level owner's memory, since that is the only copy
/// `broadcast_terminate`'s owner-gated walk ever reads.
pub fn seed_broadcast<S: Substrate>(state: &SymmetricState<S>) -> Result<()> {
    let topology = state.topology();
    let top = topology.levels() - 1;
    let owner = topology.owner(top, 0);
    state.record_token_write(top, 0, state.me())?;
    state.substrate().put_i64(state.token_slot(top, 0), DONE_SENTINEL, owner);
    state.substrate().quiet();
    state.logger().log(TerminationEvent::BroadcastSeeded { pe: state.me() });
    Ok(())
}

/// Walks every level this PE owns a group at, top to bottom, waiting on that
/// group's token and forwarding it to child group owners (or, at level 0,
/// directly into each member's gate).
pub fn broadcast_terminate<S: Substrate>(state: &SymmetricState<S>) -> Result<()> {
    let me = state.me();
    let topology = state.topology();

    for level in (0..topology.levels()).rev() {
        let g_l = topology.group_of(level, me);
        let owner_l = topology.owner(level, g_l);
        if me != owner_l {
            continue;
        }

        state.substrate().wait_until_i64(state.token_slot(level, g_l), Cmp::Eq, DONE_SENTINEL);

        if level > 0 {
            let member_count = topology.member_count(level, g_l);
            for c in g_l * topology.branch_factor..g_l * topology.branch_factor + member_count {
                let child_owner = topology.owner(level - 1, c);
                state.record_token_write(level - 1, c, me)?;
                state.substrate().put_i64(state.token_slot(level - 1, c), DONE_SENTINEL, child_owner);
                state.logger().log(TerminationEvent::BroadcastForward { level, group: g_l, to_pe: child_owner });
            }
            state.substrate().quiet();
        } else {
            let member_count = topology.member_count(0, g_l);
            for p in owner_l..owner_l + member_count {
                state.record_gate_write(p, me)?;
                state.substrate().put_i64(state.gate(), DONE_SENTINEL, p);
                state.logger().log(TerminationEvent::BroadcastForward { level, group: g_l, to_pe: p });
            }
            state.substrate().quiet();
        }
    }

    Ok(())
}

/// Every PE, owner or not, blocks here until its gate opens.
pub fn wait_gate<S: Substrate>(state: &SymmetricState<S>) {
    state.substrate().wait_until_i64(state.gate(), Cmp::Eq, DONE_SENTINEL);
    state.logger().log(TerminationEvent::GateObserved { pe: state.me() });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanin::{drive_fan_in, publish_local_completion};
    use crate::topology::Topology;
    use termination_adapter::sim::run_pes;

    #[test]
    fn single_pe_opens_its_own_gate() {
        let outcome = run_pes(1, |substrate| {
            let topology = Topology::plan(1, 8, 8);
            let state = SymmetricState::new(substrate, topology, false).unwrap();
            publish_local_completion(&state).unwrap();
            drive_fan_in(&state).unwrap();
            seed_broadcast(&state).unwrap();
            broadcast_terminate(&state).unwrap();
            wait_gate(&state);
            state.substrate().get_i64(state.gate(), state.me())
        });
        assert_eq!(outcome.results[0], Some(DONE_SENTINEL));
    }

    #[test]
    fn perfect_hierarchy_opens_every_gate() {
        let outcome = run_pes(64, |substrate| {
            let topology = Topology::plan(64, 8, 8);
            let state = SymmetricState::new(substrate, topology, false).unwrap();
            publish_local_completion(&state).unwrap();
            drive_fan_in(&state).unwrap();
            if state.me() == 0 {
                seed_broadcast(&state).unwrap();
            }
            broadcast_terminate(&state).unwrap();
            wait_gate(&state);
            state.substrate().get_i64(state.gate(), state.me())
        });
        assert!(outcome.results.iter().all(|r| *r == Some(DONE_SENTINEL)));
    }

    #[test]
    fn non_divisible_hierarchy_opens_every_gate() {
        let outcome = run_pes(70, |substrate| {
            let topology = Topology::plan(70, 8, 8);
            let state = SymmetricState::new(substrate, topology, false).unwrap();
            publish_local_completion(&state).unwrap();
            drive_fan_in(&state).unwrap();
            if state.me() == 0 {
                seed_broadcast(&state).unwrap();
            }
            broadcast_terminate(&state).unwrap();
            wait_gate(&state);
            state.substrate().get_i64(state.gate(), state.me())
        });
        assert!(outcome.results.iter().all(|r| *r == Some(DONE_SENTINEL)));
    }
}
