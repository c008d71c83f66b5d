//! Minimal demonstration of the simulated substrate's put/quiet/get cycle.

use termination_adapter::sim::run_pes;
use termination_adapter::Substrate;

fn main() {
    let outcome = run_pes(4, |substrate| {
        let slot = substrate.alloc_i64(0).unwrap();
        substrate.barrier_all();
        if substrate.index() == 0 {
            for target in 1..substrate.peers() {
                substrate.put_i64(slot, 99, target);
            }
            substrate.quiet();
            0
        } else {
            substrate.wait_until_i64(slot, termination_adapter::Cmp::Eq, 99);
            substrate.get_i64(slot, substrate.index())
        }
    });

    for (pe, value) in outcome.results.iter().enumerate() {
        println!("PE {pe}: {value:?}");
    }
}
