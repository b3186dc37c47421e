//! Periodic background flush
//!
//! One named thread per store. It sleeps on a condvar for the configured
//! interval, then runs its tick (the store's "flush if needed"). Stopping
//! sets a flag and notifies the condvar, so a sleeping thread wakes at once
//! and exits without ticking again. A tick already running is allowed to
//! finish; there is never a partial flush.

use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error};

/// Name of the flush thread
pub const FLUSH_THREAD_NAME: &str = "keystash-flush";

struct Signal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Handle to a running flush thread; stops and joins it on drop
pub(crate) struct FlushTask {
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl FlushTask {
    /// Start a thread calling `tick` every `interval`
    pub(crate) fn spawn<F>(interval: Duration, tick: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let signal = Arc::new(Signal {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_signal = Arc::clone(&signal);
        let handle = std::thread::Builder::new()
            .name(FLUSH_THREAD_NAME.to_string())
            .spawn(move || flush_loop(&thread_signal, interval, tick))?;

        debug!(
            target: "keystash::background",
            interval_ms = interval.as_millis() as u64,
            "Started flush task"
        );
        Ok(FlushTask {
            signal,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit
    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        {
            // Notify under the lock so a thread between its flag check and
            // its wait cannot miss the wakeup
            let mut stopped = self.signal.stopped.lock();
            *stopped = true;
            self.signal.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(target: "keystash::background", "Flush thread panicked");
            }
            debug!(target: "keystash::background", "Stopped flush task");
        }
    }
}

impl Drop for FlushTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn flush_loop<F: Fn()>(signal: &Signal, interval: Duration, tick: F) {
    loop {
        {
            let mut stopped = signal.stopped.lock();
            if *stopped {
                return;
            }
            signal.wake.wait_for(&mut stopped, interval);
            if *stopped {
                return;
            }
        }

        // A panicking tick must not kill the thread
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(&tick)) {
            error!(
                target: "keystash::background",
                "flush tick panicked: {:?}",
                e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
            );
        }
    }
}
