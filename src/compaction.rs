//! Background Compaction
//!
//! A dedicated thread that runs a compaction job on a fixed interval until
//! told to stop.
//!
//! ## Shutdown
//! - Dropping the shutdown sender wakes the thread between ticks
//! - The thread drops its `done` sender on exit
//! - `stop` waits on `done` for a bounded time, then detaches the thread

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::error::{BitcaskError, Result};

/// Handle on the running compaction thread
pub struct Compactor {
    /// Dropped to request shutdown
    shutdown_tx: Option<Sender<()>>,
    /// Disconnected once the thread has exited
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Compactor {
    /// Start a thread calling `job` every `interval`
    ///
    /// `job` returns the version it produced, or `None` when there was
    /// nothing to do. Failures are logged and retried on the next tick;
    /// `BitcaskError::Closed` ends the loop.
    pub fn spawn<F>(interval: Duration, job: F) -> Result<Self>
    where
        F: Fn() -> Result<Option<u64>> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let (done_tx, done_rx) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("bitcaskv-compactor".to_string())
            .spawn(move || {
                let _done = done_tx;
                let ticker = channel::tick(interval);
                debug!(?interval, "Compactor started");

                loop {
                    crossbeam::select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(ticker) -> _ => match job() {
                            Ok(Some(version)) => debug!(version, "Background compaction finished"),
                            Ok(None) => {}
                            Err(BitcaskError::Closed) => break,
                            Err(e) => warn!(error = %e, "Background compaction failed, retrying next tick"),
                        },
                    }
                }

                debug!("Compactor stopped");
            })?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            done_rx,
            handle: Some(handle),
        })
    }

    /// Ask the thread to stop and wait up to `timeout` for it
    ///
    /// Returns `false` if the thread was still busy and got detached.
    pub fn stop(mut self, timeout: Duration) -> bool {
        drop(self.shutdown_tx.take());

        match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "Compactor did not stop in time, detaching it");
                false
            }
            _ => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!("Compactor thread panicked");
                    }
                }
                info!("Compactor shut down");
                true
            }
        }
    }
}
