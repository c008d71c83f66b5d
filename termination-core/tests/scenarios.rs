//! End-to-end scenarios over the full protocol, run through the in-process
//! simulated substrate.

use termination_adapter::sim::run_pes;
use termination_adapter::Substrate;
use termination_core::config::{Config, ExitPolicy, Variant};
use termination_core::engine::run;

fn run_hstar(peers: usize, leaf_group_size: usize, branch_factor: usize) -> Vec<bool> {
    let outcome = run_pes(peers, move |substrate| {
        let config = Config::default()
            .with_variant(Variant::HStar)
            .with_exit_policy(ExitPolicy::Barrier);
        let config = Config { leaf_group_size, branch_factor, ..config };
        run(substrate, config).is_ok()
    });
    outcome.results.into_iter().map(|r| r.unwrap_or(false)).collect()
}

#[test]
fn trivial_single_pe() {
    let results = run_hstar(1, 8, 8);
    assert_eq!(results, vec![true]);
}

#[test]
fn single_leaf_group_partial_fill() {
    // N=5, G=8, K=8: one leaf group, five of its eight slots live.
    let results = run_hstar(5, 8, 8);
    assert_eq!(results, vec![true; 5]);
}

#[test]
fn perfect_hstar_64() {
    let results = run_hstar(64, 8, 8);
    assert_eq!(results, vec![true; 64]);
}

#[test]
fn non_divisible_hstar_70() {
    // N=70, G=8, K=8: groups[0]=9 with a six-member tail leaf group.
    let results = run_hstar(70, 8, 8);
    assert_eq!(results, vec![true; 70]);
}

#[test]
fn star_variant_with_multiple_leaf_groups_still_converges() {
    // N=20, G=8: three leaf groups under the Star variant must still fan
    // in through one flat root rather than opening gates independently
    // per leaf group.
    let outcome = run_pes(20, |substrate| {
        let config = Config { leaf_group_size: 8, ..Config::default() }.with_variant(Variant::Star);
        run(substrate, config).is_ok()
    });
    assert!(outcome.results.iter().all(|r| *r == Some(true)));
}

#[test]
fn dynamic_leader_staggered_completion() {
    let outcome = run_pes(64, |substrate| {
        // A small sleep proportional to the reverse of PE id approximates
        // completion arriving in descending order without depending on a
        // disallowed time source inside the protocol itself.
        let index = substrate.index();
        std::thread::sleep(std::time::Duration::from_micros((64 - index as u64) * 50));
        let config = Config::default().with_variant(Variant::Dynamic);
        run(substrate, config).is_ok()
    });
    assert!(outcome.results.iter().all(|r| *r == Some(true)));
}

#[test]
fn dynamic_leader_when_root_finishes_first() {
    // PE 0 sleeps the longest of all PEs, so it completes last under
    // `dynamic_leader_staggered_completion` but here it is made to complete
    // *first* instead, forcing some other PE to become the globally electing
    // leader. This must not deadlock: the leader still seeds the broadcast
    // token at the canonical top-level owner (PE 0), not at its own slot.
    let outcome = run_pes(32, |substrate| {
        let index = substrate.index() as u64;
        if index != 0 {
            std::thread::sleep(std::time::Duration::from_micros((index + 1) * 80));
        }
        let config = Config::default().with_variant(Variant::Dynamic);
        run(substrate, config).is_ok()
    });
    assert!(outcome.results.iter().all(|r| *r == Some(true)));
}

#[test]
fn jittered_completion_small_hstar() {
    let outcome = run_pes(8, |substrate| {
        let jitter_us = (substrate.index() as u64 * 137) % 10_000;
        std::thread::sleep(std::time::Duration::from_micros(jitter_us));
        let config = Config { leaf_group_size: 2, branch_factor: 2, ..Config::default() }.with_variant(Variant::HStar);
        run(substrate, config).is_ok()
    });
    assert!(outcome.results.iter().all(|r| *r == Some(true)));
}

#[test]
fn fuzz_completion_order_permutations() {
    // Exercises P1 (completeness) and P5 (no deadlock under staggered
    // completion) across many distinct completion orders and two group
    // shapes, one of which does not divide the PE count.
    for seed in 0..20u64 {
        for (peers, leaf_group_size, branch_factor) in [(16usize, 4usize, 2usize), (13usize, 3usize, 3usize)] {
            let outcome = run_pes(peers, move |substrate| {
                let index = substrate.index() as u64;
                // A cheap deterministic permutation-like stagger derived
                // from the seed and PE id, avoiding any disallowed time or
                // randomness source inside the protocol.
                let delay = ((index.wrapping_mul(2654435761).wrapping_add(seed)) % 37) as u64;
                std::thread::sleep(std::time::Duration::from_micros(delay));
                let config = Config { leaf_group_size, branch_factor, ..Config::default() }.with_variant(Variant::HStar);
                run(substrate, config).is_ok()
            });
            assert!(
                outcome.results.iter().all(|r| *r == Some(true)),
                "seed {seed} with N={peers} G={leaf_group_size} K={branch_factor} failed to terminate cleanly"
            );
        }
    }
}
