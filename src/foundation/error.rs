use crate::foundation::core::PixelSize;

/// Convenience result type used across framecast.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Failure taxonomy of a capture session.
///
/// Every variant is terminal for the session that produced it and is reported exactly once.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// Stop was requested (or the first write attempted) with zero frames ever captured.
    #[error("no images to render")]
    NoFramesToRender,

    /// Start was requested while a prior session has not finished.
    #[error("capture already in progress")]
    CaptureAlreadyInProgress,

    /// A frame was submitted while no session is armed.
    #[error("capture is not armed")]
    NotArmed,

    /// The video writer could not be created (bad settings, codec unavailable).
    #[error("writer construction failed: {0}")]
    WriterConstructionFailed(String),

    /// The video writer could not begin a session (output not writable, spawn failure).
    #[error("writer start failed: {0}")]
    WriterStartFailed(String),

    /// The writer reported it did not start but gave no underlying error.
    #[error("unknown error while starting the writer")]
    UnknownWriteStartFailure,

    /// The pixel-buffer pool could not hand out a buffer for a frame.
    #[error("pixel buffer allocation failed for frame {frame}: {reason}")]
    PixelBufferAllocationFailed {
        /// Index the frame would have been encoded at.
        frame: u64,
        /// Pool diagnostics.
        reason: String,
    },

    /// A still image could not be drawn into a pixel buffer.
    #[error("draw failed: {0}")]
    DrawFailed(String),

    /// A frame's pixel size differs from the stream's and the policy rejects it.
    #[error("frame size mismatch: got {got}, stream is {expected}")]
    DimensionMismatch {
        /// Pixel size of the offending frame.
        got: PixelSize,
        /// Pixel size fixed by the first frame.
        expected: PixelSize,
    },

    /// The writer refused an encoded frame.
    #[error("append failed: {0}")]
    AppendFailed(String),

    /// The container could not be finalized.
    #[error("finalize failed: {0}")]
    FinalizeFailed(String),

    /// Invalid caller-provided data or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaptureError {
    /// Build a [`CaptureError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CaptureError::WriterConstructionFailed`] value.
    pub fn writer_construction(msg: impl Into<String>) -> Self {
        Self::WriterConstructionFailed(msg.into())
    }

    /// Build a [`CaptureError::WriterStartFailed`] value.
    pub fn writer_start(msg: impl Into<String>) -> Self {
        Self::WriterStartFailed(msg.into())
    }

    /// Build a [`CaptureError::DrawFailed`] value.
    pub fn draw(msg: impl Into<String>) -> Self {
        Self::DrawFailed(msg.into())
    }

    /// Build a [`CaptureError::AppendFailed`] value.
    pub fn append(msg: impl Into<String>) -> Self {
        Self::AppendFailed(msg.into())
    }

    /// Build a [`CaptureError::FinalizeFailed`] value.
    pub fn finalize(msg: impl Into<String>) -> Self {
        Self::FinalizeFailed(msg.into())
    }

    /// Short stable identifier of the error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoFramesToRender => "no_frames_to_render",
            Self::CaptureAlreadyInProgress => "capture_already_in_progress",
            Self::NotArmed => "not_armed",
            Self::WriterConstructionFailed(_) => "writer_construction_failed",
            Self::WriterStartFailed(_) => "writer_start_failed",
            Self::UnknownWriteStartFailure => "unknown_write_start_failure",
            Self::PixelBufferAllocationFailed { .. } => "pixel_buffer_allocation_failed",
            Self::DrawFailed(_) => "draw_failed",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::AppendFailed(_) => "append_failed",
            Self::FinalizeFailed(_) => "finalize_failed",
            Self::Validation(_) => "validation",
            Self::Other(_) => "other",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
