//! The Upward Fan-In Engine: bottom-up propagation of per-PE completion
//! signals to the root group.
//!
//! Grounded directly on `run_hstar_termination` in the hierarchical source:
//! a PE publishes its own completion once, then walks every level it owns a
//! group at, waiting for that group's children before forwarding one level
//! up.

use termination_adapter::{Cmp, Substrate};
use termination_logging::TerminationEvent;

use crate::error::Result;
use crate::flags::{SymmetricState, DONE_SENTINEL};

/// Publishes this PE's completion into its leaf group's mailbox at the leaf
/// owner, then quiesces so the write is visible. Call at most once per PE
/// per run.
pub fn publish_local_completion<S: Substrate>(state: &SymmetricState<S>) -> Result<()> {
    let me = state.me();
    let topology = state.topology();
    let g0 = topology.group_of(0, me);
    let idx0 = me - topology.owner(0, g0);
    let owner0 = topology.owner(0, g0);

    state.record_elapsed_now();
    state.record_mailbox_write(0, g0, idx0, me)?;
    state.substrate().put_i64(state.mailbox_slot(0, g0, idx0), DONE_SENTINEL, owner0);
    state.substrate().quiet();
    state.logger().log(TerminationEvent::LocalDone { pe: me });
    Ok(())
}

/// Walks every level this PE owns a group at, waiting for that level's
/// children and forwarding completion to the parent owner. A PE that is not
/// an owner at a given level performs no work there.
///
/// Returns once this PE's own role in the fan-in is complete: either it owns
/// no group at all (impossible — every PE owns its own leaf slot's absence
/// does not apply, every PE at minimum is a leaf member) or it has forwarded
/// through every level it owns up to (but not including) the root, or it
/// *is* the root and has observed every child at the top level.
pub fn drive_fan_in<S: Substrate>(state: &SymmetricState<S>) -> Result<()> {
    let me = state.me();
    let topology = state.topology();

    for level in 0..topology.levels() {
        let g_l = topology.group_of(level, me);
        let owner_l = topology.owner(level, g_l);
        if me != owner_l {
            continue;
        }

        let member_count = topology.member_count(level, g_l);
        for i in 0..member_count {
            state.substrate().wait_until_i64(state.mailbox_slot(level, g_l, i), Cmp::Eq, DONE_SENTINEL);
        }
        state.logger().log(TerminationEvent::FanInComplete { level, group: g_l, owner: me });

        if !topology.is_top_level(level) {
            let parent_level = level + 1;
            let parent_group = topology.parent_group(level, g_l);
            let parent_owner = topology.owner(parent_level, parent_group);
            let my_idx = topology.index_in_parent(level, g_l);

            state.record_mailbox_write(parent_level, parent_group, my_idx, me)?;
            state.substrate().put_i64(state.mailbox_slot(parent_level, parent_group, my_idx), DONE_SENTINEL, parent_owner);
            state.substrate().quiet();
            state.logger().log(TerminationEvent::FanInForward {
                level,
                group: g_l,
                child_index: my_idx,
                to_pe: parent_owner,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::topology::Topology;
    use termination_adapter::sim::run_pes;

    #[test]
    fn single_pe_completes_without_forwarding() {
        let outcome = run_pes(1, |substrate| {
            let topology = Topology::plan(1, 8, 8);
            let state = SymmetricState::new(substrate, topology, false).unwrap();
            publish_local_completion(&state).unwrap();
            drive_fan_in(&state).unwrap();
            state.me()
        });
        assert_eq!(outcome.results[0], Some(0));
    }

    #[test]
    fn perfect_hierarchy_converges_at_the_root() {
        let config = Config::default();
        let outcome = run_pes(64, move |substrate| {
            let topology = Topology::plan(64, config.leaf_group_size, config.branch_factor);
            let state = SymmetricState::new(substrate, topology.clone(), false).unwrap();
            publish_local_completion(&state).unwrap();
            drive_fan_in(&state).unwrap();
            if state.me() == 0 {
                let top = topology.levels() - 1;
                Some(state.substrate().get_i64(state.mailbox_slot(top, 0, 0), 0))
            } else {
                None
            }
        });
        assert_eq!(outcome.results[0], Some(Some(DONE_SENTINEL)));
    }

    #[test]
    fn tail_group_owner_does_not_wait_on_phantom_children() {
        // N=70, G=8, K=8: the last leaf group has only 6 members.
        let outcome = run_pes(70, |substrate| {
            let topology = Topology::plan(70, 8, 8);
            let state = SymmetricState::new(substrate, topology, false).unwrap();
            publish_local_completion(&state).unwrap();
            drive_fan_in(&state).unwrap();
            state.me()
        });
        assert_eq!(outcome.results.len(), 70);
        assert!(outcome.results.iter().all(Option::is_some));
    }
}
