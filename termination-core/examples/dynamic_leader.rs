//! Runs the dynamic-leader variant over a handful of simulated PEs
//! completing in reverse PE-id order, to show leader election in action
//! with `GLOBAL_DONE_DEBUG=1` set.

use termination_adapter::sim::run_pes;
use termination_adapter::Substrate;
use termination_core::config::{Config, Variant};
use termination_core::engine::run;

fn main() {
    let peers: usize = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(64);
    let config = Config::from_env().with_variant(Variant::Dynamic);

    let outcome = run_pes(peers, move |substrate| {
        let index = substrate.index();
        std::thread::sleep(std::time::Duration::from_micros((peers - index) as u64 * 100));
        run(substrate, config)
    });

    let failures = outcome.results.iter().filter(|r| !matches!(r, Some(Ok(_)))).count();
    println!("{peers} PEs completed, {failures} failures");
}
