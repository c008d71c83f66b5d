//! Minimal event logging for the termination detection core.
//!
//! A [`Registry`] binds named destinations to actions invoked on batches of timestamped
//! events, and a [`Logger`] buffers events locally before handing a batch to
//! its bound action. There is no dependency on an external logging
//! framework; the core never needs more than "did this PE take this step,
//! and when".

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// One step of the termination protocol, worth recording for debugging and
/// for the fuzz/scenario tests that want to assert on ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationEvent {
    /// A PE published its own local completion.
    LocalDone { pe: usize },
    /// An owner observed all of its children done at (level, group).
    FanInComplete { level: usize, group: usize, owner: usize },
    /// An owner forwarded a child's completion to its parent.
    FanInForward { level: usize, group: usize, child_index: usize, to_pe: usize },
    /// The root seeded the top-level broadcast token.
    BroadcastSeeded { pe: usize },
    /// An owner forwarded the broadcast token to a child group / member PE.
    BroadcastForward { level: usize, group: usize, to_pe: usize },
    /// A PE observed its local gate set to `DONE_SENTINEL`.
    GateObserved { pe: usize },
    /// A PE became the dynamic leader of (level, group).
    LeaderElected { level: usize, group: usize, pe: usize },
    /// A non-root PE acknowledged the exit in the root-last exit policy.
    ExitAck { pe: usize },
    /// The root released every PE to exit.
    ExitReleased,
    /// The root's one-line planner summary: `N`, `G`, `K`, `L`, `groups[0]`.
    PlannerSummary { peers: usize, leaf_group_size: usize, branch_factor: usize, levels: usize, groups0: usize },
}

/// Binds string names to typed event actions.
///
/// A single `Registry` is created once per simulated PE and handed to every
/// protocol operation that wants to log; operations that have nothing
/// interesting to say simply never call `log`.
pub struct Registry {
    time: Instant,
    map: HashMap<String, Box<dyn std::any::Any>>,
}

impl Registry {
    /// Creates a new, empty registry anchored at `time`.
    pub fn new(time: Instant) -> Self {
        Registry { time, map: HashMap::new() }
    }

    /// Binds `name` to `action`, returning any previously bound action.
    ///
    /// The action observes a lower bound on the next event's timestamp and a
    /// batch of non-decreasing timestamped events. The end of a stream is
    /// signalled only by dropping the logger, never by a sentinel event.
    pub fn insert<T: 'static>(
        &mut self,
        name: &str,
        action: Box<dyn Fn(&Duration, &[(Duration, T)])>,
    ) -> Option<Box<dyn std::any::Any>> {
        let logger = Logger::<T>::new(self.time, action);
        self.map.insert(name.to_owned(), Box::new(logger))
    }

    /// Retrieves a previously bound logger, if any.
    pub fn get<T: 'static>(&self, name: &str) -> Option<Logger<T>> {
        self.map
            .get(name)
            .and_then(|entry| entry.downcast_ref::<Logger<T>>())
            .cloned()
    }

    /// Removes a binding, signalling end-of-stream to any clone holder once
    /// it is dropped.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn std::any::Any>> {
        self.map.remove(name)
    }
}

/// A cheaply-cloned, buffering logger for one event stream.
pub struct Logger<T> {
    time: Instant,
    action: Rc<dyn Fn(&Duration, &[(Duration, T)])>,
    buffer: Rc<RefCell<Vec<(Duration, T)>>>,
}

impl<T> Clone for Logger<T> {
    fn clone(&self) -> Self {
        Logger { time: self.time, action: Rc::clone(&self.action), buffer: Rc::clone(&self.buffer) }
    }
}

impl<T> Logger<T> {
    /// Creates a logger bound to `action`, anchored at `time`.
    pub fn new(time: Instant, action: Box<dyn Fn(&Duration, &[(Duration, T)])>) -> Self {
        Logger { time, action: Rc::from(action), buffer: Rc::new(RefCell::new(Vec::with_capacity(64))) }
    }

    /// Records `event` at the current offset from `time`, flushing the
    /// buffer if it has reached capacity.
    pub fn log(&self, event: T) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push((self.time.elapsed(), event));
        if buffer.len() == buffer.capacity() {
            (self.action)(&self.time.elapsed(), &buffer[..]);
            buffer.clear();
        }
    }

    /// Flushes any buffered events to the bound action.
    pub fn flush(&self) {
        let mut buffer = self.buffer.borrow_mut();
        if !buffer.is_empty() {
            (self.action)(&self.time.elapsed(), &buffer[..]);
            buffer.clear();
        }
    }
}

/// A logger that discards everything; used when debug logging is off.
pub fn silent() -> Logger<TerminationEvent> {
    Logger::new(Instant::now(), Box::new(|_, _| {}))
}

/// A logger that writes one line per event to stderr, prefixed by `pe`; used
/// when the debug config flag (`GLOBAL_DONE_DEBUG`) is set.
pub fn stderr_logger(pe: usize) -> Logger<TerminationEvent> {
    Logger::new(
        Instant::now(),
        Box::new(move |_, events| {
            for (at, event) in events {
                eprintln!("[DEBUG pe={pe} t={at:?}] {event:?}");
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_flushes_on_capacity() {
        let count = Rc::new(RefCell::new(0usize));
        let count2 = Rc::clone(&count);
        let logger = Logger::new(Instant::now(), Box::new(move |_, batch: &[(Duration, u32)]| {
            *count2.borrow_mut() += batch.len();
        }));
        for i in 0..64u32 {
            logger.log(i);
        }
        assert_eq!(*count.borrow(), 64);
    }

    #[test]
    fn registry_round_trips_a_binding() {
        let mut registry = Registry::new(Instant::now());
        registry.insert::<TerminationEvent>("termination", Box::new(|_, _| {}));
        let logger = registry.get::<TerminationEvent>("termination");
        assert!(logger.is_some());
        logger.unwrap().log(TerminationEvent::ExitReleased);
    }
}
