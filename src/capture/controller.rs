use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context as _;

use crate::capture::queue::{FrameQueue, QueueStep};
use crate::capture::session::{
    CaptureState, Completion, CompletionSender, SessionStats, StartOptions,
};
use crate::capture::still::StillImage;
use crate::config::CaptureConfig;
use crate::encode::encoder::{DrainStatus, Encoder};
use crate::encode::ffmpeg::FfmpegWriterFactory;
use crate::encode::writer::WriterFactory;
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::source::FrameSource;
use crate::source::ticker::Ticker;

struct Slot {
    state: CaptureState,
    session_id: u64,
    queue: Option<Arc<FrameQueue>>,
    ticker: Option<Ticker>,
    worker: Option<JoinHandle<()>>,
    stats: SessionStats,
}

struct Inner {
    config: CaptureConfig,
    factory: Arc<dyn WriterFactory>,
    slot: Mutex<Slot>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, id: u64, f: impl FnOnce(&mut Slot)) {
        let mut slot = self.lock();
        if slot.session_id == id {
            f(&mut slot);
        }
    }

    /// Return the controller to `Idle` and hand back a ticker that is still running.
    fn end_session(&self, id: u64, queue: &FrameQueue) -> Option<Ticker> {
        let mut slot = self.lock();
        if slot.session_id != id {
            return None;
        }
        slot.state = CaptureState::Idle;
        slot.stats.frames_enqueued = queue.enqueued_total();
        slot.stats.render_ended = queue.is_producer_finished();
        slot.queue = None;
        slot.ticker.take()
    }
}

/// Owner of the capture state machine.
///
/// One session at a time: `start` arms capture, frames arrive through
/// [`CaptureController::submit_frame`] or a [`FrameSource`], and `stop` lets the encoder drain
/// what is queued before the stream is finalized. Each session is encoded on its own
/// `framecast-encoder` thread and reports through a [`Completion`].
///
/// Dropping the controller stops a running capture and waits for its drain to finish.
pub struct CaptureController {
    inner: Arc<Inner>,
}

impl CaptureController {
    /// Controller writing through `factory`.
    pub fn new(config: CaptureConfig, factory: Arc<dyn WriterFactory>) -> CaptureResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                factory,
                slot: Mutex::new(Slot {
                    state: CaptureState::Idle,
                    session_id: 0,
                    queue: None,
                    ticker: None,
                    worker: None,
                    stats: SessionStats::default(),
                }),
            }),
        })
    }

    /// Controller encoding H.264 MP4 files with the system `ffmpeg`.
    pub fn with_ffmpeg(config: CaptureConfig) -> CaptureResult<Self> {
        let factory = FfmpegWriterFactory::new(config.ffmpeg_opts());
        Self::new(config, Arc::new(factory))
    }

    /// Settings this controller was created with.
    pub fn config(&self) -> &CaptureConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CaptureState {
        self.inner.lock().state
    }

    /// Counters of the running session, or of the last one when idle.
    pub fn stats(&self) -> SessionStats {
        let slot = self.inner.lock();
        let mut stats = slot.stats.clone();
        if let Some(q) = &slot.queue {
            stats.frames_enqueued = q.enqueued_total();
            stats.render_ended = q.is_producer_finished();
        }
        stats
    }

    /// Arm capture. Frames are expected through [`CaptureController::submit_frame`].
    pub fn start(&self, opts: StartOptions) -> CaptureResult<Completion> {
        self.arm(opts, None)
    }

    /// Arm capture with a ticker sampling `source` every `interval`.
    pub fn start_with_source(
        &self,
        opts: StartOptions,
        source: Box<dyn FrameSource>,
        interval: Duration,
    ) -> CaptureResult<Completion> {
        if interval.is_zero() {
            return Err(CaptureError::validation("tick interval must be > 0"));
        }
        self.arm(opts, Some((source, interval)))
    }

    #[tracing::instrument(skip_all)]
    fn arm(
        &self,
        opts: StartOptions,
        source: Option<(Box<dyn FrameSource>, Duration)>,
    ) -> CaptureResult<Completion> {
        if let Some(size) = opts.target_size
            && size.is_empty()
        {
            return Err(CaptureError::validation("target size must be non-zero"));
        }

        let mut slot = self.inner.lock();
        if slot.state.is_busy() {
            return Err(CaptureError::CaptureAlreadyInProgress);
        }
        // The previous worker has already released the controller; only its send is left.
        if let Some(prev) = slot.worker.take()
            && prev.join().is_err()
        {
            tracing::error!("previous encoder thread panicked");
        }

        let id = slot.session_id + 1;
        let queue = Arc::new(FrameQueue::new(self.inner.config.warn_pending_frames));
        let (tx, completion) = Completion::channel();

        let ticker = match source {
            Some((source, interval)) => {
                let q = Arc::clone(&queue);
                Some(Ticker::spawn(source, interval, move |image| q.append(image))?)
            }
            None => None,
        };

        let worker = {
            let inner = Arc::clone(&self.inner);
            let queue = Arc::clone(&queue);
            std::thread::Builder::new()
                .name("framecast-encoder".to_string())
                .spawn(move || run_worker(&inner, &queue, opts, id, tx))
                .context("spawn encoder thread")
        };
        let worker = match worker {
            Ok(h) => h,
            Err(e) => {
                if let Some(t) = ticker {
                    t.stop();
                }
                return Err(e.into());
            }
        };

        *slot = Slot {
            state: CaptureState::Armed,
            session_id: id,
            queue: Some(queue),
            ticker,
            worker: Some(worker),
            stats: SessionStats::default(),
        };
        tracing::info!(session = id, "capture armed");
        Ok(completion)
    }

    /// Queue one still for the running session.
    ///
    /// Never waits for the encoder. Fails with [`CaptureError::NotArmed`] unless `Armed`.
    pub fn submit_frame(&self, image: StillImage) -> CaptureResult<()> {
        let slot = self.inner.lock();
        match (&slot.state, &slot.queue) {
            (CaptureState::Armed, Some(q)) => {
                q.append(image);
                Ok(())
            }
            _ => Err(CaptureError::NotArmed),
        }
    }

    /// Stop capturing and let the encoder drain the queue.
    ///
    /// Returns `false`, doing nothing, unless a session is `Armed`.
    pub fn stop(&self) -> bool {
        let (ticker, queue) = {
            let mut slot = self.inner.lock();
            if slot.state != CaptureState::Armed {
                return false;
            }
            slot.state = CaptureState::Draining;
            (slot.ticker.take(), slot.queue.clone())
        };
        if let Some(t) = ticker {
            t.stop();
        }
        if let Some(q) = queue {
            q.finish_producing();
            tracing::info!(pending = q.len(), "capture stopped; draining");
        }
        true
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.stop();
        let worker = self.inner.lock().worker.take();
        if let Some(h) = worker
            && h.join().is_err()
        {
            tracing::error!("encoder thread panicked");
        }
    }
}

fn run_worker(
    inner: &Inner,
    queue: &FrameQueue,
    opts: StartOptions,
    id: u64,
    tx: CompletionSender,
) {
    let res = run_session(inner, queue, opts, id);
    if let Some(ticker) = inner.end_session(id, queue) {
        ticker.stop();
    }
    match &res {
        Ok(path) => tracing::info!(session = id, out = %path.display(), "capture finished"),
        Err(e) => tracing::error!(session = id, kind = e.kind(), error = %e, "capture failed"),
    }
    // The receiver may be gone; the outcome is logged either way.
    let _ = tx.send(res);
}

fn run_session(
    inner: &Inner,
    queue: &FrameQueue,
    opts: StartOptions,
    id: u64,
) -> CaptureResult<PathBuf> {
    let poll = inner.config.readiness_poll();
    let first = loop {
        match queue.try_step() {
            QueueStep::Frame(image) => break image,
            QueueStep::Finished => return Err(CaptureError::NoFramesToRender),
            QueueStep::Idle => {
                queue.wait_for_work(poll);
            }
        }
    };

    let out_path = match opts.output_path {
        Some(p) => p,
        None => inner.config.new_output_path()?,
    };
    let mut enc = Encoder::open(
        &first,
        inner.factory.as_ref(),
        &out_path,
        opts.target_size,
        inner.config.encoder_opts(),
    )?;
    inner.update(id, |slot| slot.stats.output_path = Some(out_path.clone()));

    let res = match encode_all(inner, queue, &mut enc, first, id, poll) {
        Ok(()) => {
            inner.update(id, |slot| slot.state = CaptureState::Finished);
            enc.finish()
        }
        Err(e) => {
            enc.abort();
            Err(e)
        }
    };
    if res.is_err() && inner.config.remove_partial_on_failure {
        remove_partial(&out_path);
    }
    res
}

fn encode_all(
    inner: &Inner,
    queue: &FrameQueue,
    enc: &mut Encoder,
    first: StillImage,
    id: u64,
    poll: Duration,
) -> CaptureResult<()> {
    enc.append_image(first)?;
    loop {
        let status = enc.drain(queue)?;
        let (encoded, dropped) = (enc.frames_encoded(), enc.frames_dropped());
        inner.update(id, |slot| {
            slot.stats.frames_encoded = encoded;
            slot.stats.frames_dropped = dropped;
        });
        match status {
            DrainStatus::QueueEmpty => {
                queue.wait_for_work(poll);
            }
            DrainStatus::WriterBusy => enc.wait_writer_ready(poll),
            DrainStatus::Complete => return Ok(()),
        }
    }
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "partial output removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "partial output not removed"),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/controller.rs"]
mod tests;
