//! Variant dispatch: a single `run` entry point selecting between the
//! static-owner (STAR/H-STAR) and dynamic-leader critical paths from
//! [`Config`], behind one shared capability set.
//!
//! STAR is simply H-STAR with the topology collapsed to one level
//! (`Topology::plan_star`); the two share every operation below
//! `drive_fan_in`/`broadcast_terminate` and differ only in how many levels
//! there are to walk.

use termination_adapter::Substrate;
use termination_logging::TerminationEvent;

use crate::config::{Config, Variant};
use crate::dynamic;
use crate::error::Result;
use crate::fanin::{drive_fan_in, publish_local_completion};
use crate::fanout::{broadcast_terminate, seed_broadcast};
use crate::flags::SymmetricState;
use crate::gate::{coordinate_exit, ElapsedSummary};
use crate::topology::Topology;

/// The result of running one PE's share of the protocol to completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunResult {
    /// Set only at the PE that printed the aggregate (the root under
    /// Variant A/B; the root also under Variant C, though it never returns
    /// there since it calls `global_exit` directly).
    pub summary: Option<ElapsedSummary>,
}

/// Plans the topology for `config` and `peers`, choosing the flat STAR
/// layout when the variant requests it and H-STAR/Dynamic otherwise.
pub fn plan_topology(config: &Config, peers: usize) -> Topology {
    match config.variant {
        Variant::Star => Topology::plan_star(peers, config.leaf_group_size),
        Variant::HStar | Variant::Dynamic => Topology::plan(peers, config.leaf_group_size, config.branch_factor),
    }
}

/// Runs the full termination protocol for this PE: local completion,
/// fan-in (static or dynamic per `config.variant`), fan-out, and exit
/// coordination per `config.exit_policy`.
pub fn run<S: Substrate>(substrate: S, config: Config) -> Result<RunResult> {
    let peers = substrate.peers();
    let topology = plan_topology(&config, peers);
    let state = SymmetricState::new(substrate, topology, config.debug)?;
    let is_root = {
        let topology = state.topology();
        let top = topology.levels() - 1;
        state.me() == topology.owner(top, 0)
    };

    if config.debug && is_root {
        let topology = state.topology();
        state.logger().log(TerminationEvent::PlannerSummary {
            peers,
            leaf_group_size: config.leaf_group_size,
            branch_factor: config.branch_factor,
            levels: topology.levels(),
            groups0: topology.groups_at(0),
        });
    }

    match config.variant {
        Variant::Star | Variant::HStar => {
            publish_local_completion(&state)?;
            drive_fan_in(&state)?;
            if is_root {
                seed_broadcast(&state)?;
            }
            broadcast_terminate(&state)?;
        }
        Variant::Dynamic => {
            dynamic::mark_local_done(&state);
            let outcome = dynamic::try_complete(&state)?;
            if outcome.became_global_leader {
                seed_broadcast(&state)?;
            }
            broadcast_terminate(&state)?;
        }
    }

    let summary = coordinate_exit(&state, config.exit_policy, is_root)?;
    // A real run logs only a handful of events per PE, far short of the
    // logger's batching capacity, so the debug stream must be flushed
    // explicitly here rather than relying on capacity-triggered flushes.
    state.logger().flush();
    Ok(RunResult { summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExitPolicy;
    use termination_adapter::sim::run_pes;

    #[test]
    fn star_variant_runs_to_completion() {
        let outcome = run_pes(5, |substrate| {
            let config = Config::default().with_variant(Variant::Star);
            run(substrate, config)
        });
        assert!(outcome.results.iter().all(|r| matches!(r, Some(Ok(_)))));
    }

    #[test]
    fn hstar_variant_runs_to_completion() {
        let outcome = run_pes(70, |substrate| {
            let config = Config::default().with_variant(Variant::HStar);
            run(substrate, config)
        });
        assert!(outcome.results.iter().all(|r| matches!(r, Some(Ok(_)))));
    }

    #[test]
    fn dynamic_variant_runs_to_completion() {
        let outcome = run_pes(64, |substrate| {
            let config = Config::default().with_variant(Variant::Dynamic);
            run(substrate, config)
        });
        assert!(outcome.results.iter().all(|r| matches!(r, Some(Ok(_)))));
    }

    #[test]
    fn debug_mode_logs_planner_summary_without_disrupting_the_run() {
        let outcome = run_pes(20, |substrate| {
            let config = Config { debug: true, ..Config::default() }.with_variant(Variant::HStar);
            run(substrate, config)
        });
        assert!(outcome.results.iter().all(|r| matches!(r, Some(Ok(_)))));
    }

    #[test]
    fn root_last_exit_policy_is_selectable() {
        let outcome = run_pes(16, |substrate| {
            let config = Config::default().with_variant(Variant::HStar).with_exit_policy(ExitPolicy::RootLast);
            run(substrate, config)
        });
        assert!(outcome.results.iter().all(|r| matches!(r, Some(Ok(_)))));
    }
}
