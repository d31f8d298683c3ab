//! Background snapshot worker.
//!
//! One worker thread per activated store. It snapshots immediately, then
//! once per configured interval, until its shutdown channel is closed.
//! Shutdown is only observed between cycles, so joining the thread waits for
//! an in-flight snapshot to land.
//!
//! Failed cycles are logged and counted rather than propagated. Once the
//! configured number of consecutive failures is reached the store is marked
//! degraded; the next successful cycle clears the flag.

use crate::store::{StoreError, StoreShared};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Point-in-time view of the background snapshot cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistenceHealth {
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
    /// Background cycles that completed successfully.
    pub snapshots_written: u64,
    /// Set once `consecutive_failures` reaches the configured threshold.
    pub degraded: bool,
    /// Message of the most recent failure, if the last cycle failed.
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct HealthTracker {
    consecutive_failures: AtomicU32,
    snapshots_written: AtomicU64,
    degraded: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl HealthTracker {
    fn record_success(&self) {
        self.snapshots_written.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if self.degraded.swap(false, Ordering::Relaxed) {
            info!("store snapshots recovered");
        }
    }

    fn record_failure(&self, err: &StoreError, threshold: u32) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
        warn!(error = %err, failures, "store snapshot failed");

        if threshold > 0 && failures >= threshold && !self.degraded.swap(true, Ordering::Relaxed) {
            error!(failures, "store persistence degraded");
        }
    }

    pub(crate) fn report(&self) -> PersistenceHealth {
        PersistenceHealth {
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            snapshots_written: self.snapshots_written.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Handle to a running snapshot thread.
pub(crate) struct SnapshotWorker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl SnapshotWorker {
    pub(crate) fn spawn(shared: Arc<StoreShared>) -> std::io::Result<Self> {
        let (shutdown, signal) = crossbeam_channel::bounded(1);
        let interval = shared.config.snapshot_interval();
        let handle = thread::Builder::new()
            .name("carbuild-snapshot".to_string())
            .spawn(move || run(&shared, &signal, interval))?;
        Ok(Self { shutdown, handle })
    }

    /// Close the shutdown channel and wait for the thread to exit.
    pub(crate) fn stop(self) {
        drop(self.shutdown);
        if self.handle.join().is_err() {
            error!("snapshot worker panicked");
        }
    }
}

fn run(shared: &StoreShared, signal: &Receiver<()>, interval: Duration) {
    info!(interval_ms = interval.as_millis() as u64, "snapshot worker started");
    loop {
        snapshot_cycle(shared);
        match signal.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("snapshot worker stopped");
}

fn snapshot_cycle(shared: &StoreShared) {
    match shared.snapshot() {
        Ok(_) => shared.health.record_success(),
        Err(e) => shared
            .health
            .record_failure(&e, shared.config.failure_threshold),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
