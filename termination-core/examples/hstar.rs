//! Runs the H-STAR termination protocol over a handful of simulated PEs and
//! prints the root's aggregate elapsed-time summary.

use termination_adapter::sim::run_pes;
use termination_core::config::Config;
use termination_core::engine::run;

fn main() {
    let peers = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(16);
    let config = Config::from_env();

    let outcome = run_pes(peers, move |substrate| run(substrate, config));

    for (pe, result) in outcome.results.iter().enumerate() {
        match result {
            Some(Ok(run_result)) => {
                if let Some(summary) = run_result.summary {
                    println!(
                        "PE {pe} (root): min={:.3}ms avg={:.3}ms max={:.3}ms",
                        summary.min_ms, summary.avg_ms, summary.max_ms
                    );
                }
            }
            Some(Err(err)) => eprintln!("PE {pe} failed: {err}"),
            None => eprintln!("PE {pe} did not return"),
        }
    }
}
