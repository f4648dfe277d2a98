use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::capture::still::StillImage;
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::source::FrameSource;

/// Counters reported by [`Ticker::stop`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Snapshots handed to the sink.
    pub ticks: u64,
    /// Snapshots that failed and were skipped.
    pub failures: u64,
    /// Deadlines that passed while a snapshot was still running.
    pub missed: u64,
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    fn raise(&self) {
        *self.stopped.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.cv.notify_all();
    }

    /// Sleep until `deadline`; returns `true` when stopped.
    fn wait_until(&self, deadline: Instant) -> bool {
        let guard = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        let timeout = deadline.saturating_duration_since(Instant::now());
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// Fixed-rate sampler of a [`FrameSource`] on its own thread.
///
/// The first snapshot is taken as soon as the thread starts. Ticks whose deadline passed while a
/// snapshot was running are skipped, not replayed.
pub struct Ticker {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<TickStats>>,
}

impl Ticker {
    /// Start sampling `source` every `interval`, handing each still to `sink`.
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        interval: Duration,
        mut sink: impl FnMut(StillImage) + Send + 'static,
    ) -> CaptureResult<Self> {
        if interval.is_zero() {
            return Err(CaptureError::validation("tick interval must be > 0"));
        }
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let handle = std::thread::Builder::new()
            .name("framecast-ticker".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut next = started;
                let mut stats = TickStats::default();
                loop {
                    match source.snapshot(started.elapsed()) {
                        Ok(image) => {
                            sink(image);
                            stats.ticks += 1;
                        }
                        Err(e) => {
                            stats.failures += 1;
                            tracing::warn!(error = %e, "snapshot failed; tick skipped");
                        }
                    }

                    next += interval;
                    let now = Instant::now();
                    if next <= now {
                        let behind = (now - next).as_nanos();
                        let step = interval.as_nanos();
                        stats.missed += (behind / step) as u64 + 1;
                        let into_slot = u64::try_from(behind % step).unwrap_or(0);
                        next = now + interval - Duration::from_nanos(into_slot);
                    }
                    if thread_signal.wait_until(next) {
                        break;
                    }
                }
                stats
            })
            .context("spawn ticker thread")?;

        tracing::debug!(interval_ms = interval.as_secs_f64() * 1000.0, "ticker started");
        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Stop sampling. A snapshot already in flight completes and reaches the sink first.
    pub fn stop(mut self) -> TickStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> TickStats {
        self.signal.raise();
        let Some(handle) = self.handle.take() else {
            return TickStats::default();
        };
        match handle.join() {
            Ok(stats) => {
                tracing::debug!(
                    ticks = stats.ticks,
                    failures = stats.failures,
                    missed = stats.missed,
                    "ticker stopped"
                );
                stats
            }
            Err(_) => {
                tracing::error!("ticker thread panicked");
                TickStats::default()
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/ticker.rs"]
mod tests;
