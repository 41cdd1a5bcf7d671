//! Background log compaction
//!
//! A [`LogCompactor`] is bound to one journal and periodically invokes
//! [`Journal::compact`] on it from a dedicated thread.

use crate::journal::Journal;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often the compaction thread re-checks the shutdown flag while idle
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Periodic compaction task for one journal
pub struct LogCompactor {
    journal: Arc<Journal>,
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LogCompactor {
    /// Create a compactor bound to `journal`; idle until [`start`](Self::start)
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Launch periodic compaction at the given interval
    pub fn start(&self, interval: Duration) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            warn!("compactor already running");
            return;
        }
        self.shutdown.store(false, Ordering::Relaxed);

        let journal = Arc::clone(&self.journal);
        let shutdown = Arc::clone(&self.shutdown);
        *handle = Some(thread::spawn(move || {
            debug!(dir = %journal.dir().display(), "compaction thread started");

            while !shutdown.load(Ordering::Relaxed) {
                let deadline = Instant::now() + interval;
                while Instant::now() < deadline {
                    if shutdown.load(Ordering::Relaxed) {
                        debug!("compaction thread stopped");
                        return;
                    }
                    thread::sleep(SHUTDOWN_POLL.min(deadline.saturating_duration_since(Instant::now())));
                }

                if let Err(e) = journal.compact() {
                    error!("background compaction failed: {}", e);
                }
            }

            debug!("compaction thread stopped");
        }));
        info!(interval_ms = interval.as_millis() as u64, "started log compactor");
    }

    /// Stop the compactor, waiting for any in-flight compaction to finish
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LogCompactor {
    fn drop(&mut self) {
        self.stop();
    }
}
