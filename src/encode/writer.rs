use std::cell::Cell;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;

use crate::encode::ffmpeg::ensure_parent_dir;
use crate::encode::pixel::{PixelBuffer, PixelFormat};
use crate::foundation::core::{Fps, PixelSize, Timestamp};
use crate::foundation::error::{CaptureError, CaptureResult};

/// Settings for one video-writing session.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    /// Pixel size of every appended buffer.
    pub input_size: PixelSize,
    /// Encoded frame size.
    pub output_size: PixelSize,
    /// Fixed frame rate of the stream.
    pub fps: Fps,
    /// Layout of appended buffers.
    pub format: PixelFormat,
    /// Output file.
    pub out_path: PathBuf,
}

impl WriterConfig {
    /// Check the settings every writer relies on.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.input_size.is_empty() || self.output_size.is_empty() {
            return Err(CaptureError::writer_construction(
                "writer width/height must be non-zero",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(CaptureError::writer_construction("fps must be non-zero"));
        }
        if self.out_path.as_os_str().is_empty() {
            return Err(CaptureError::writer_construction("output path is empty"));
        }
        Ok(())
    }
}

/// One video-writing session: started once, fed in presentation order, finished once.
///
/// Ordering contract: `append` is called with strictly increasing timestamps.
pub trait VideoWriter: Send {
    /// Open the output and begin the session at time zero.
    fn start_writing(&mut self) -> CaptureResult<()>;

    /// Whether the writer can take another frame right now.
    fn is_ready_for_more_media_data(&self) -> bool {
        true
    }

    /// Park the caller until the writer may be ready again, at most `timeout`.
    fn wait_until_ready(&mut self, timeout: Duration) {
        std::thread::sleep(timeout);
    }

    /// Append one frame at `pts`.
    fn append(&mut self, buf: &PixelBuffer, pts: Timestamp) -> CaptureResult<()>;

    /// Mark the input finished, flush, and close the container.
    fn finish_writing(&mut self) -> CaptureResult<()>;

    /// Abandon the session after a failure. The output may be left partial.
    fn cancel(&mut self) {}
}

/// Creates writers for new sessions.
pub trait WriterFactory: Send + Sync {
    /// Construct a writer for `cfg`; nothing is opened until `start_writing`.
    fn create(&self, cfg: &WriterConfig) -> CaptureResult<Box<dyn VideoWriter>>;
}

/// A frame captured by [`MemoryWriter`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RecordedFrame {
    /// Presentation time.
    pub pts: Timestamp,
    /// Raw bytes as appended.
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// Everything a [`MemoryWriter`] saw, shared with its factory.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Recording {
    /// Settings of the last created writer.
    #[serde(skip)]
    pub config: Option<WriterConfig>,
    /// Frames in append order.
    pub frames: Vec<RecordedFrame>,
    /// Whether `finish_writing` completed.
    pub finished: bool,
    /// Whether the writer was cancelled.
    pub cancelled: bool,
    /// Number of writers created.
    pub writers_created: u32,
}

/// How a [`MemoryWriterFactory`] should misbehave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemoryFault {
    /// Behave.
    #[default]
    None,
    /// Refuse to construct a writer.
    Construction,
    /// Report a start failure with an error.
    Start,
    /// Report a start failure without an error.
    StartWithoutError,
    /// Refuse the nth append (0-based).
    Append(u64),
}

/// Factory for [`MemoryWriter`]s, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriterFactory {
    recording: Arc<Mutex<Recording>>,
    fault: MemoryFault,
    stall_polls: u32,
}

impl MemoryWriterFactory {
    /// A factory whose writers record into a fresh, shared [`Recording`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure into every writer this factory creates.
    pub fn with_fault(mut self, fault: MemoryFault) -> Self {
        self.fault = fault;
        self
    }

    /// After every append, report "not ready" for the next `polls` readiness checks.
    pub fn with_stall_polls(mut self, polls: u32) -> Self {
        self.stall_polls = polls;
        self
    }

    /// Snapshot of what the writers recorded.
    pub fn recording(&self) -> Recording {
        self.recording
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl WriterFactory for MemoryWriterFactory {
    fn create(&self, cfg: &WriterConfig) -> CaptureResult<Box<dyn VideoWriter>> {
        cfg.validate()?;
        if self.fault == MemoryFault::Construction {
            return Err(CaptureError::writer_construction(
                "memory writer configured to refuse construction",
            ));
        }
        {
            let mut rec = self.recording.lock().unwrap_or_else(|e| e.into_inner());
            *rec = Recording {
                config: Some(cfg.clone()),
                writers_created: rec.writers_created + 1,
                ..Recording::default()
            };
        }
        Ok(Box::new(MemoryWriter {
            cfg: cfg.clone(),
            recording: Arc::clone(&self.recording),
            fault: self.fault,
            stall_polls: self.stall_polls,
            stalled: Cell::new(0),
            appended: 0,
            started: false,
        }))
    }
}

/// Writer that keeps frames in memory.
///
/// `start_writing` creates the output file like a real writer would; `finish_writing` stores a
/// JSON summary of the recorded timestamps in it.
#[derive(Debug)]
pub struct MemoryWriter {
    cfg: WriterConfig,
    recording: Arc<Mutex<Recording>>,
    fault: MemoryFault,
    stall_polls: u32,
    stalled: Cell<u32>,
    appended: u64,
    started: bool,
}

impl MemoryWriter {
    fn with_recording<R>(&self, f: impl FnOnce(&mut Recording) -> R) -> R {
        let mut rec = self.recording.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rec)
    }
}

impl VideoWriter for MemoryWriter {
    fn start_writing(&mut self) -> CaptureResult<()> {
        match self.fault {
            MemoryFault::Start => {
                return Err(CaptureError::writer_start(
                    "memory writer configured to fail on start",
                ));
            }
            MemoryFault::StartWithoutError => return Err(CaptureError::UnknownWriteStartFailure),
            _ => {}
        }
        ensure_parent_dir(&self.cfg.out_path)
            .and_then(|()| {
                std::fs::File::create(&self.cfg.out_path)
                    .with_context(|| format!("create '{}'", self.cfg.out_path.display()))?;
                Ok(())
            })
            .map_err(|e| CaptureError::writer_start(e.to_string()))?;
        self.started = true;
        Ok(())
    }

    fn is_ready_for_more_media_data(&self) -> bool {
        let left = self.stalled.get();
        if left > 0 {
            self.stalled.set(left - 1);
            return false;
        }
        true
    }

    fn wait_until_ready(&mut self, timeout: Duration) {
        std::thread::sleep(timeout.min(Duration::from_millis(1)));
    }

    fn append(&mut self, buf: &PixelBuffer, pts: Timestamp) -> CaptureResult<()> {
        if !self.started {
            return Err(CaptureError::append("memory writer not started"));
        }
        if buf.size() != self.cfg.input_size {
            return Err(CaptureError::append(format!(
                "buffer is {}, writer expects {}",
                buf.size(),
                self.cfg.input_size
            )));
        }
        if self.fault == MemoryFault::Append(self.appended) {
            return Err(CaptureError::append("memory writer configured to refuse append"));
        }
        let data = buf.data().to_vec();
        self.with_recording(|rec| rec.frames.push(RecordedFrame { pts, data }));
        self.appended += 1;
        self.stalled.set(self.stall_polls);
        Ok(())
    }

    fn finish_writing(&mut self) -> CaptureResult<()> {
        let summary = self.with_recording(|rec| {
            rec.finished = true;
            serde_json::to_vec_pretty(&*rec)
        });
        let summary = summary.map_err(|e| CaptureError::finalize(e.to_string()))?;
        std::fs::write(&self.cfg.out_path, summary).map_err(|e| {
            CaptureError::finalize(format!(
                "write summary '{}': {e}",
                self.cfg.out_path.display()
            ))
        })?;
        Ok(())
    }

    fn cancel(&mut self) {
        self.with_recording(|rec| rec.cancelled = true);
    }
}
