//! An in-process, thread-backed simulated PGAS substrate.
//!
//! One OS thread stands in for one PE, giving every peer its own thread
//! rather than its own OS process. Symmetric memory is modeled as one `Vec` per PE per
//! slot kind, guarded by a `Mutex`; `put`/`get` address a `(slot, target_pe)`
//! pair directly into the target's vector. Puts are deferred: a PE's own
//! outbox only applies its writes to the targets on [`Substrate::quiet`],
//! so that a missing `quiet()` call is an observable liveness bug in tests
//! rather than something that happens to work because everything is
//! actually synchronous.
//!
//! `global_exit` cannot kill another OS thread from here, so instead of
//! `std::process::exit` (which would take the whole test binary down with
//! it) it records the exit status, wakes every blocked peer, and unwinds
//! only the calling PE's own thread. [`run_pes`] turns that into a
//! `Result` the harness can inspect.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crate::buzzer::Buzzer;
use crate::{Cmp, SlotF64, SlotI64, Substrate, SubstrateError};

enum Op {
    PutI64(SlotI64, i64),
    PutF64(SlotF64, f64),
}

struct PeCell {
    i64_slots: Mutex<Vec<i64>>,
    f64_slots: Mutex<Vec<f64>>,
    woken: Mutex<()>,
    condvar: Condvar,
    buzzer: Mutex<Option<Buzzer>>,
}

impl PeCell {
    fn new() -> Self {
        PeCell {
            i64_slots: Mutex::new(Vec::new()),
            f64_slots: Mutex::new(Vec::new()),
            woken: Mutex::new(()),
            condvar: Condvar::new(),
            buzzer: Mutex::new(None),
        }
    }

    fn wake(&self) {
        let _guard = self.woken.lock().unwrap();
        self.condvar.notify_all();
        if let Some(buzzer) = self.buzzer.lock().unwrap().as_ref() {
            buzzer.buzz();
        }
    }
}

struct Barrier {
    generation: Mutex<usize>,
    arrived: Mutex<usize>,
    condvar: Condvar,
    peers: usize,
}

/// Shared state across every simulated PE in one run.
struct Shared {
    cells: Vec<PeCell>,
    barrier: Barrier,
    exit_status: AtomicI32,
    exited: AtomicBool,
    next_i64_len: AtomicUsize,
    next_f64_len: AtomicUsize,
}

/// A handle to the simulated substrate, one per PE.
///
/// Construct a full run with [`SimSubstrate::new_vector`]; drive it with
/// [`run_pes`].
pub struct SimSubstrate {
    index: usize,
    shared: Arc<Shared>,
    outbox: Mutex<Vec<(usize, Op)>>,
}

/// Raised by a PE's closure to unwind that thread after [`Substrate::global_exit`].
struct GlobalExit;

impl SimSubstrate {
    /// Builds `peers` connected substrate handles, one per simulated PE.
    pub fn new_vector(peers: usize) -> Vec<SimSubstrate> {
        let shared = Arc::new(Shared {
            cells: (0..peers).map(|_| PeCell::new()).collect(),
            barrier: Barrier {
                generation: Mutex::new(0),
                arrived: Mutex::new(0),
                condvar: Condvar::new(),
                peers,
            },
            exit_status: AtomicI32::new(0),
            exited: AtomicBool::new(false),
            next_i64_len: AtomicUsize::new(0),
            next_f64_len: AtomicUsize::new(0),
        });

        (0..peers)
            .map(|index| SimSubstrate { index, shared: Arc::clone(&shared), outbox: Mutex::new(Vec::new()) })
            .collect()
    }

    /// Registers the calling thread as the target for wake-ups aimed at this
    /// PE. Call once, from the PE's own thread, before the first
    /// `wait_until_i64`.
    pub fn register_current_thread(&self) {
        *self.shared.cells[self.index].buzzer.lock().unwrap() = Some(Buzzer::default());
    }

    fn cell(&self, pe: usize) -> &PeCell {
        &self.shared.cells[pe]
    }
}

impl Substrate for SimSubstrate {
    fn index(&self) -> usize {
        self.index
    }

    fn peers(&self) -> usize {
        self.shared.cells.len()
    }

    fn alloc_i64(&self, init: i64) -> Result<SlotI64, SubstrateError> {
        let mut slots = self.cell(self.index).i64_slots.lock().unwrap();
        slots.push(init);
        Ok(SlotI64(slots.len() - 1))
    }

    fn alloc_f64(&self, init: f64) -> Result<SlotF64, SubstrateError> {
        let mut slots = self.cell(self.index).f64_slots.lock().unwrap();
        slots.push(init);
        Ok(SlotF64(slots.len() - 1))
    }

    fn put_i64(&self, slot: SlotI64, val: i64, target_pe: usize) {
        self.outbox.lock().unwrap().push((target_pe, Op::PutI64(slot, val)));
    }

    fn get_i64(&self, slot: SlotI64, source_pe: usize) -> i64 {
        self.cell(source_pe).i64_slots.lock().unwrap()[slot.0]
    }

    fn put_f64(&self, slot: SlotF64, val: f64, target_pe: usize) {
        self.outbox.lock().unwrap().push((target_pe, Op::PutF64(slot, val)));
    }

    fn get_f64(&self, slot: SlotF64, source_pe: usize) -> f64 {
        self.cell(source_pe).f64_slots.lock().unwrap()[slot.0]
    }

    fn quiet(&self) {
        let ops = std::mem::take(&mut *self.outbox.lock().unwrap());
        for (target_pe, op) in ops {
            match op {
                Op::PutI64(slot, val) => {
                    self.cell(target_pe).i64_slots.lock().unwrap()[slot.0] = val;
                }
                Op::PutF64(slot, val) => {
                    self.cell(target_pe).f64_slots.lock().unwrap()[slot.0] = val;
                }
            }
            self.cell(target_pe).wake();
        }
    }

    fn wait_until_i64(&self, slot: SlotI64, cmp: Cmp, val: i64) {
        let cell = self.cell(self.index);
        loop {
            if cmp.holds(cell.i64_slots.lock().unwrap()[slot.0], val) {
                return;
            }
            let guard = cell.woken.lock().unwrap();
            if cmp.holds(cell.i64_slots.lock().unwrap()[slot.0], val) {
                return;
            }
            let _ = cell.condvar.wait_timeout(guard, std::time::Duration::from_millis(5)).unwrap();
        }
    }

    fn cas_i64(&self, slot: SlotI64, expected: i64, desired: i64, target_pe: usize) -> i64 {
        let mut slots = self.cell(target_pe).i64_slots.lock().unwrap();
        let prior = slots[slot.0];
        if prior == expected {
            slots[slot.0] = desired;
            drop(slots);
            self.cell(target_pe).wake();
        }
        prior
    }

    fn fetch_inc_i64(&self, slot: SlotI64, target_pe: usize) -> i64 {
        let mut slots = self.cell(target_pe).i64_slots.lock().unwrap();
        let prior = slots[slot.0];
        slots[slot.0] = prior + 1;
        drop(slots);
        self.cell(target_pe).wake();
        prior
    }

    fn barrier_all(&self) {
        let barrier = &self.shared.barrier;
        let mut arrived = barrier.arrived.lock().unwrap();
        let generation = *barrier.generation.lock().unwrap();
        *arrived += 1;
        if *arrived == barrier.peers {
            *arrived = 0;
            *barrier.generation.lock().unwrap() += 1;
            barrier.condvar.notify_all();
        } else {
            while *barrier.generation.lock().unwrap() == generation {
                arrived = barrier.condvar.wait(arrived).unwrap();
            }
        }
    }

    fn global_exit(&self, status: i32) -> ! {
        self.shared.exit_status.store(status, Ordering::SeqCst);
        self.shared.exited.store(true, Ordering::SeqCst);
        for cell in &self.shared.cells {
            cell.wake();
        }
        self.shared.barrier.condvar.notify_all();
        panic::resume_unwind(Box::new(GlobalExit));
    }
}

/// The outcome of running every simulated PE to completion.
pub struct RunOutcome<T> {
    /// Per-PE return values, in PE id order; `None` for a PE that unwound
    /// via [`Substrate::global_exit`] or panicked.
    pub results: Vec<Option<T>>,
    /// The status passed to the first observed `global_exit`, if any.
    pub exit_status: Option<i32>,
}

/// Spawns one thread per PE, runs `body` on each, and joins them all.
///
/// `body` receives the PE's own [`SimSubstrate`] handle; it is responsible
/// for calling [`SimSubstrate::register_current_thread`] itself if it will
/// block on `wait_until_i64`.
pub fn run_pes<T, F>(peers: usize, body: F) -> RunOutcome<T>
where
    T: Send + 'static,
    F: Fn(SimSubstrate) -> T + Send + Sync + 'static,
{
    let substrates = SimSubstrate::new_vector(peers);
    let body = Arc::new(body);
    let handles: Vec<_> = substrates
        .into_iter()
        .map(|substrate| {
            let body = Arc::clone(&body);
            let shared = Arc::clone(&substrate.shared);
            thread::Builder::new()
                .name(format!("pe-{}", substrate.index))
                .spawn(move || {
                    substrate.register_current_thread();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| (*body)(substrate)));
                    (result, shared)
                })
                .expect("failed to spawn simulated PE thread")
        })
        .collect();

    let mut results = Vec::with_capacity(peers);
    let mut exit_status = None;
    for handle in handles {
        let (result, shared) = handle.join().expect("simulated PE thread panicked without unwinding cleanly");
        if shared.exited.load(Ordering::SeqCst) && exit_status.is_none() {
            exit_status = Some(shared.exit_status.load(Ordering::SeqCst));
        }
        results.push(result.ok());
    }

    RunOutcome { results, exit_status }
}
