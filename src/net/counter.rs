//! Open-connection accounting shared between a listener and its connections.
//!
//! # Responsibilities
//! - Count currently open connections
//! - Record that a drain was requested (monotonic)
//! - Settle the drain-complete signal exactly once
//!
//! # Design Decisions
//! - Plain atomics, no lock: every critical section is a single-field update
//! - The completion signal is a `watch` channel, which retains its value, so a
//!   waiter that subscribes after the settle still observes it
//! - Settling is gated by a compare-and-swap; only the winner publishes

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::watch;

/// Connection count, drain flag and one-shot completion signal.
#[derive(Debug)]
pub struct ConnectionCounter {
    /// Currently open connections.
    open: AtomicUsize,
    /// Set once when the owning listener starts draining.
    drain_requested: AtomicBool,
    /// Exactly-once gate in front of `complete_tx`.
    settled: AtomicBool,
    /// Number of settle calls that won the gate. Never exceeds one.
    settles: AtomicUsize,
    complete_tx: watch::Sender<bool>,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        let (complete_tx, _) = watch::channel(false);
        Self {
            open: AtomicUsize::new(0),
            drain_requested: AtomicBool::new(false),
            settled: AtomicBool::new(false),
            settles: AtomicUsize::new(0),
            complete_tx,
        }
    }

    /// Count a newly accepted connection.
    pub fn acquire(&self) -> usize {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("gateway_open_connections").set(open as f64);
        open
    }

    /// Uncount a connection that closed successfully.
    ///
    /// Callers must have acquired the slot first and release it at most once.
    /// Settles the completion signal when this was the last connection of a
    /// requested drain.
    pub fn release(&self) -> usize {
        let previous = self.open.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "released a connection that was never acquired");
        let open = previous - 1;
        metrics::gauge!("gateway_open_connections").set(open as f64);

        if open == 0 && self.drain_requested.load(Ordering::SeqCst) {
            self.settle();
        }
        open
    }

    /// Mark the drain as requested. Returns the open count observed afterwards.
    ///
    /// Settles immediately when nothing is open.
    pub fn request_drain(&self) -> usize {
        self.drain_requested.store(true, Ordering::SeqCst);
        let open = self.open.load(Ordering::SeqCst);
        if open == 0 {
            self.settle();
        }
        open
    }

    /// Settle the completion signal. Returns true only for the call that won.
    pub fn settle(&self) -> bool {
        if self
            .settled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.settles.fetch_add(1, Ordering::SeqCst);
        self.complete_tx.send_replace(true);
        true
    }

    /// Wait until the completion signal is settled.
    pub async fn drained(&self) {
        let mut rx = self.complete_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|settled| *settled).await;
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn drain_requested(&self) -> bool {
        self.drain_requested.load(Ordering::SeqCst)
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    /// How many times the completion signal was settled.
    pub fn settles(&self) -> usize {
        self.settles.load(Ordering::SeqCst)
    }
}

impl Default for ConnectionCounter {
    fn default() -> Self {
        Self::new()
    }
}
