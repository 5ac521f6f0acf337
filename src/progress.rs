//! # Progress — Background Run Reporter
//!
//! Periodic progress reporting for a long-running summary-engine pass,
//! following the teacher's counter-plus-background-thread shape: atomics
//! updated from the hot loop with no locking, a `Mutex<String>` for the
//! current bucket label (updated far less often), and a detached reporter
//! thread that logs a snapshot every 30 seconds until told to stop. Emits
//! through `tracing::info!` rather than stderr printing, matching this
//! crate's ambient logging choice.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub struct Progress {
    n_evaluated: AtomicU64,
    rows_emitted: AtomicU64,
    current: Mutex<String>,
    started: Instant,
    stop: Arc<AtomicBool>,
}

impl Progress {
    pub fn new() -> Arc<Self> {
        Arc::new(Progress {
            n_evaluated: AtomicU64::new(0),
            rows_emitted: AtomicU64::new(0),
            current: Mutex::new(String::new()),
            started: Instant::now(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn record_n(&self, count: u64) {
        self.n_evaluated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_row(&self) {
        self.rows_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_current(&self, label: impl Into<String>) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = label.into();
        }
    }

    pub fn snapshot(&self) -> (u64, u64, String, Duration) {
        let label = self.current.lock().map(|g| g.clone()).unwrap_or_default();
        (
            self.n_evaluated.load(Ordering::Relaxed),
            self.rows_emitted.load(Ordering::Relaxed),
            label,
            self.started.elapsed(),
        )
    }

    fn log_status(&self) {
        let (n, rows, label, elapsed) = self.snapshot();
        let secs = elapsed.as_secs();
        tracing::info!(
            "progress: {}:{:02}:{:02} elapsed, n_evaluated={} rows_emitted={} current={}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            n,
            rows,
            label
        );
    }

    /// Spawn a background thread that logs a status line every `interval`
    /// until `stop_reporting` is called.
    pub fn spawn_reporter(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let me = Arc::clone(self);
        std::thread::spawn(move || {
            while !me.stop.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if me.stop.load(Ordering::Relaxed) {
                    break;
                }
                me.log_status();
            }
        })
    }

    pub fn stop_reporting(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
