//! A type that can unpark a specific thread.

use std::thread::Thread;

/// Wakes a specific thread, no matter which thread calls [`Buzzer::buzz`].
///
/// Used by [`crate::sim::SimSubstrate`] as the wake side of its local
/// `wait_until`: a remote writer that just completed a [`crate::Substrate::quiet`]
/// buzzes every PE whose memory it touched, so that PE's blocked wait can
/// re-check its predicate instead of spinning.
#[derive(Clone)]
pub struct Buzzer {
    thread: Thread,
}

impl Default for Buzzer {
    fn default() -> Self {
        Self { thread: std::thread::current() }
    }
}

impl Buzzer {
    /// Unparks the target thread.
    pub fn buzz(&self) {
        self.thread.unpark();
    }
}
