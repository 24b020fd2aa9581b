//! Cooperative cancellation for the long-running loops.
//!
//! Loops poll a shared flag between ticks. [`Shutdown::listen_for_ctrl_c`]
//! sets the flag from a small signal thread so the blocking loops never
//! need an async runtime of their own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Longest uninterrupted nap inside [`Shutdown::sleep`].
const SLICE: Duration = Duration::from_millis(100);

/// Shared stop flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests every holder of this flag to stop.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless shutdown is requested first.
    ///
    /// # Returns
    ///
    /// `true` if the full duration elapsed, `false` if interrupted.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_triggered() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLICE.min(deadline - now));
        }
    }

    /// Triggers the flag on Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the signal thread or its runtime cannot
    /// be started.
    pub fn listen_for_ctrl_c(&self) -> std::io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let shutdown = self.clone();
        thread::Builder::new()
            .name("signal".to_string())
            .spawn(move || {
                match runtime.block_on(tokio::signal::ctrl_c()) {
                    Ok(()) => {
                        info!("interrupt received, shutting down");
                        shutdown.trigger();
                    }
                    Err(err) => warn!(?err, "failed to listen for Ctrl+C"),
                }
            })?;
        Ok(())
    }
}
