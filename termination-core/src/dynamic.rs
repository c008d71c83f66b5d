//! The Dynamic Leader Variant: leader election by remote atomic
//! fetch-increment rather than a statically designated owner driving the
//! critical path.
//!
//! Grounded on `try_mark_leaf_group_done` and
//! `complete_group_and_maybe_propagate` in the dynamic-leader source. Group
//! flags are still *hosted* at the canonical static owner for addressing —
//! topology arithmetic is unchanged — but the PE that observes the group's
//! completion and drives propagation upward is whichever PE's fetch-add
//! happens to return the group's final prior count, not the owner.

use termination_adapter::Substrate;
use termination_logging::TerminationEvent;

use crate::error::Result;
use crate::flags::{SymmetricState, DONE_SENTINEL};

/// The outcome of [`try_complete`]: whether this PE became the leader of at
/// least one group, and if the walk reached the top level, whether this PE
/// is the globally electing leader that should drive fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionOutcome {
    /// `true` if this PE became the dynamic leader of its leaf group.
    pub became_leaf_leader: bool,
    /// `true` if this PE's promotion walk reached the top level, making it
    /// the globally electing leader responsible for seeding the broadcast.
    pub became_global_leader: bool,
}

/// Increments this PE's leaf group counter at the leaf owner. If this PE's
/// prior value is the last one needed to complete the group, it becomes the
/// group's dynamic leader and walks the promotion chain upward.
pub fn try_complete<S: Substrate>(state: &SymmetricState<S>) -> Result<PromotionOutcome> {
    let me = state.me();
    let topology = state.topology();
    let g0 = topology.group_of(0, me);
    let owner0 = topology.owner(0, g0);
    let leaf_size = topology.member_count(0, g0);

    let prior = state.substrate().fetch_inc_i64(state.leaf_counter_slot(g0), owner0);
    if prior as usize != leaf_size - 1 {
        return Ok(PromotionOutcome { became_leaf_leader: false, became_global_leader: false });
    }

    let became_global_leader = complete_group_and_promote(state, 0, g0)?;
    Ok(PromotionOutcome { became_leaf_leader: true, became_global_leader })
}

/// Marks `(level, group)` done and its leader as this PE, then walks the
/// promotion chain: fetch-adds the parent's child-done counter and, if this
/// PE is again the last child, repeats one level up. Returns `true` if the
/// walk reached the top level.
fn complete_group_and_promote<S: Substrate>(state: &SymmetricState<S>, level: usize, group: usize) -> Result<bool> {
    let me = state.me();
    let topology = state.topology();
    let mut level = level;
    let mut group = group;

    loop {
        let host = topology.owner(level, group);
        state.record_group_done_write(level, group, me)?;
        state.substrate().cas_i64(state.group_done_slot(level, group), 0, 1, host);
        state.record_group_leader_write(level, group, me)?;
        state.substrate().put_i64(state.group_leader_slot(level, group), me as i64, host);
        state.substrate().quiet();
        state.logger().log(TerminationEvent::LeaderElected { level, group, pe: me });

        if topology.is_top_level(level) {
            return Ok(true);
        }

        let parent_level = level + 1;
        let parent_group = topology.parent_group(level, group);
        let parent_host = topology.owner(parent_level, parent_group);
        let expected_children = topology.member_count(parent_level, parent_group);

        let prior = state.substrate().fetch_inc_i64(state.child_done_count_slot(parent_level, parent_group), parent_host);
        if prior as usize + 1 != expected_children {
            return Ok(false);
        }

        level = parent_level;
        group = parent_group;
    }
}

/// Reads `group_leader` for the top-level group once `group_done` there has
/// been observed, for diagnostics or post-hoc verification. Not on the
/// critical path: the electing PE already knows it is the leader from
/// [`try_complete`]'s return value.
pub fn top_level_leader<S: Substrate>(state: &SymmetricState<S>) -> i64 {
    let topology = state.topology();
    let top = topology.levels() - 1;
    let host = topology.owner(top, 0);
    state.substrate().get_i64(state.group_leader_slot(top, 0), host)
}

/// This PE's own completion marker and fetch-add gate into the dynamic
/// election — the local-completion half of `publish_local_completion`
/// shared with the static variants.
pub fn mark_local_done<S: Substrate>(state: &SymmetricState<S>) {
    state.record_elapsed_now();
    state.substrate().put_i64(state.local_done(), DONE_SENTINEL, state.me());
    state.substrate().quiet();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;
    use termination_adapter::sim::run_pes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn exactly_one_pe_becomes_global_leader() {
        let leaders = Arc::new(AtomicUsize::new(0));
        let outcome = run_pes(64, {
            let leaders = Arc::clone(&leaders);
            move |substrate| {
                let topology = Topology::plan(64, 8, 8);
                let state = SymmetricState::new(substrate, topology, false).unwrap();
                mark_local_done(&state);
                let outcome = try_complete(&state).unwrap();
                if outcome.became_global_leader {
                    leaders.fetch_add(1, Ordering::SeqCst);
                }
                outcome
            }
        });
        assert_eq!(leaders.load(Ordering::SeqCst), 1);
        assert!(outcome.results.iter().all(Option::is_some));
    }

    #[test]
    fn single_pe_is_immediately_its_own_global_leader() {
        let outcome = run_pes(1, |substrate| {
            let topology = Topology::plan(1, 8, 8);
            let state = SymmetricState::new(substrate, topology, false).unwrap();
            mark_local_done(&state);
            try_complete(&state).unwrap()
        });
        assert_eq!(
            outcome.results[0],
            Some(PromotionOutcome { became_leaf_leader: true, became_global_leader: true })
        );
    }

    #[test]
    fn tail_group_leader_election_still_converges() {
        let leaders = Arc::new(AtomicUsize::new(0));
        let outcome = run_pes(70, {
            let leaders = Arc::clone(&leaders);
            move |substrate| {
                let topology = Topology::plan(70, 8, 8);
                let state = SymmetricState::new(substrate, topology, false).unwrap();
                mark_local_done(&state);
                let outcome = try_complete(&state).unwrap();
                if outcome.became_global_leader {
                    leaders.fetch_add(1, Ordering::SeqCst);
                }
                outcome
            }
        });
        assert_eq!(leaders.load(Ordering::SeqCst), 1);
        assert!(outcome.results.iter().all(Option::is_some));
    }
}
