use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use crate::foundation::core::PixelSize;
use crate::foundation::error::{CaptureError, CaptureResult};

/// Lifecycle state of the capture controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CaptureState {
    /// No session; `start` is accepted.
    Idle,
    /// Frames are being captured and encoded as they arrive.
    Armed,
    /// Capture has stopped; queued frames are still being encoded.
    Draining,
    /// The stream is being finalized. Transient: the controller moves on to `Idle`.
    Finished,
}

impl CaptureState {
    /// Return `true` while a session owns the controller.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Armed | Self::Draining | Self::Finished)
    }
}

/// Per-session options given to `start`.
#[derive(Clone, Debug, Default)]
pub struct StartOptions {
    /// Encoded output size. Defaults to the first frame's pixel size.
    pub target_size: Option<PixelSize>,
    /// Exact output file. Defaults to `<output dir>/<uuid>.mp4`.
    pub output_path: Option<PathBuf>,
}

impl StartOptions {
    /// Options with an explicit encoded output size.
    pub fn with_target_size(mut self, size: PixelSize) -> Self {
        self.target_size = Some(size);
        self
    }

    /// Options with an explicit output file.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

/// Diagnostic counters of the current (or last) session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames appended to the writer.
    pub frames_encoded: u64,
    /// Frames submitted by the producer.
    pub frames_enqueued: u64,
    /// Frames skipped under `AllocFailurePolicy::DropFrame`.
    pub frames_dropped: u64,
    /// Producer finished flag.
    pub render_ended: bool,
    /// Output file, set once the writer has started.
    pub output_path: Option<PathBuf>,
}

/// One-shot outcome of a capture session.
///
/// Resolved exactly once with the finished file path or the error that ended the session.
#[derive(Debug)]
pub struct Completion {
    rx: mpsc::Receiver<CaptureResult<PathBuf>>,
}

pub(crate) type CompletionSender = mpsc::SyncSender<CaptureResult<PathBuf>>;

impl Completion {
    pub(crate) fn channel() -> (CompletionSender, Self) {
        let (tx, rx) = mpsc::sync_channel(1);
        (tx, Self { rx })
    }

    /// Block until the session ends.
    pub fn wait(self) -> CaptureResult<PathBuf> {
        self.rx.recv().unwrap_or_else(|_| Err(disconnected()))
    }

    /// Block up to `timeout`; `None` when the session is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CaptureResult<PathBuf>> {
        match self.rx.recv_timeout(timeout) {
            Ok(res) => Some(res),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(disconnected())),
        }
    }

    /// Non-blocking poll.
    pub fn try_result(&self) -> Option<CaptureResult<PathBuf>> {
        match self.rx.try_recv() {
            Ok(res) => Some(res),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(disconnected())),
        }
    }
}

fn disconnected() -> CaptureError {
    CaptureError::Other(anyhow::anyhow!(
        "capture session ended without reporting an outcome"
    ))
}
