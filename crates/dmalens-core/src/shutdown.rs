//! Cooperative shutdown signal shared between the device session, the
//! read worker, and the Ctrl-C handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A cancellation signal with interruptible waits.
///
/// The session checks this at every public entry point and fails fast with
/// [`Error::ShuttingDown`](crate::Error::ShuttingDown) once triggered.
/// Worker loops sleep with [`wait`](Self::wait) so a trigger wakes them
/// immediately instead of waiting out the poll interval.
pub struct ShutdownSignal {
    triggered: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    /// Trigger the signal, waking all waiting threads. Idempotent.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until the signal is triggered, whichever
    /// comes first. Returns `true` if shutdown was triggered.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_shutdown() {
            return true;
        }

        let guard = match self.mutex.lock() {
            Ok(guard) => guard,
            // Poisoned mutex: another thread panicked mid-wait. Treat as shutdown.
            Err(_) => return true,
        };
        match self
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_shutdown())
        {
            Ok((_, timeout)) => !timeout.timed_out(),
            Err(_) => true,
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
