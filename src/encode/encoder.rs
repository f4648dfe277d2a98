use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::queue::{FrameQueue, QueueStep};
use crate::capture::still::StillImage;
use crate::encode::ffmpeg::encoded_size;
use crate::encode::pixel::{DimensionPolicy, DrawOptions, PixelFormat, draw_still};
use crate::encode::pool::{PixelBufferPool, PixelBufferPoolOpts};
use crate::encode::writer::{VideoWriter, WriterConfig, WriterFactory};
use crate::foundation::core::{Fps, FrameIndex, PixelSize};
use crate::foundation::error::{CaptureError, CaptureResult};

/// What to do when no pixel buffer can be obtained for a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocFailurePolicy {
    /// Fail the session with [`CaptureError::PixelBufferAllocationFailed`].
    #[default]
    Abort,
    /// Log, skip that frame, and keep encoding.
    DropFrame,
}

/// Per-session encoder settings.
#[derive(Clone, Copy, Debug)]
pub struct EncoderOpts {
    /// Fixed frame rate; frame N is presented at `N × frame duration`.
    pub fps: Fps,
    /// Background under transparent pixels and letterbox bars.
    pub bg_rgba: [u8; 4],
    /// Handling of frames whose size differs from the first frame's.
    pub dimension_policy: DimensionPolicy,
    /// Handling of pixel-buffer allocation failures.
    pub alloc_failure_policy: AllocFailurePolicy,
    /// Pixel-buffer pool limits.
    pub pool: PixelBufferPoolOpts,
}

impl Default for EncoderOpts {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            bg_rgba: [0, 0, 0, 255],
            dimension_policy: DimensionPolicy::default(),
            alloc_failure_policy: AllocFailurePolicy::default(),
            pool: PixelBufferPoolOpts::default(),
        }
    }
}

/// Result of one [`Encoder::drain`] invitation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainStatus {
    /// The queue is momentarily empty; wait for the producer.
    QueueEmpty,
    /// The writer cannot take more data right now; wait for it.
    WriterBusy,
    /// The producer has finished and every frame has been appended.
    Complete,
}

/// One encoded stream: a started writer plus the pixel-buffer pool feeding it.
pub struct Encoder {
    writer: Box<dyn VideoWriter>,
    pool: PixelBufferPool,
    draw: DrawOptions,
    opts: EncoderOpts,
    out_path: PathBuf,
    frames_encoded: u64,
    frames_dropped: u64,
}

impl Encoder {
    /// Create and start a writer sized for `first`.
    ///
    /// `first` only fixes the stream's dimensions; it still has to be appended.
    #[tracing::instrument(skip_all, fields(out = %out_path.display()))]
    pub fn open(
        first: &StillImage,
        factory: &dyn WriterFactory,
        out_path: &Path,
        target_size: Option<PixelSize>,
        opts: EncoderOpts,
    ) -> CaptureResult<Self> {
        let input_size = first.pixel_size();
        let format = PixelFormat::Rgba8Opaque;
        let cfg = WriterConfig {
            input_size,
            output_size: encoded_size(input_size, target_size),
            fps: opts.fps,
            format,
            out_path: out_path.to_path_buf(),
        };

        let mut writer = factory.create(&cfg)?;
        if let Err(e) = writer.start_writing() {
            writer.cancel();
            return Err(e);
        }

        tracing::info!(
            input = %cfg.input_size,
            output = %cfg.output_size,
            fps = opts.fps.as_f64(),
            "encoded stream opened"
        );

        Ok(Self {
            writer,
            pool: PixelBufferPool::new(input_size, format, opts.pool),
            draw: DrawOptions {
                bg_rgba: opts.bg_rgba,
                dimension_policy: opts.dimension_policy,
            },
            opts,
            out_path: cfg.out_path,
            frames_encoded: 0,
            frames_dropped: 0,
        })
    }

    /// Output file of this stream.
    pub fn out_path(&self) -> &Path {
        &self.out_path
    }

    /// Frames appended so far.
    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    /// Frames skipped under [`AllocFailurePolicy::DropFrame`].
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Convert `image` and append it at the next presentation timestamp.
    ///
    /// At most one pixel buffer is in flight: it is released before this returns.
    pub fn append_image(&mut self, image: StillImage) -> CaptureResult<()> {
        let idx = FrameIndex(self.frames_encoded);

        let mut buf = match self.pool.acquire() {
            Ok(buf) => buf,
            Err(e) => {
                let err = CaptureError::PixelBufferAllocationFailed {
                    frame: idx.0,
                    reason: e.to_string(),
                };
                return match self.opts.alloc_failure_policy {
                    AllocFailurePolicy::Abort => Err(err),
                    AllocFailurePolicy::DropFrame => {
                        self.frames_dropped += 1;
                        tracing::warn!(error = %err, "dropping frame");
                        Ok(())
                    }
                };
            }
        };

        let res = draw_still(&mut buf, &image, &self.draw).and_then(|()| {
            let pts = self.opts.fps.timestamp_of(idx);
            self.writer.append(&buf, pts)
        });
        self.pool.release(buf);
        res?;

        self.frames_encoded += 1;
        tracing::debug!(frame = idx.0, "frame appended");
        Ok(())
    }

    /// Append queued frames while the writer is ready.
    ///
    /// Returns when the queue is momentarily empty, the writer is busy, or the producer has
    /// finished and nothing is left.
    pub fn drain(&mut self, queue: &FrameQueue) -> CaptureResult<DrainStatus> {
        loop {
            if !self.writer.is_ready_for_more_media_data() {
                return Ok(DrainStatus::WriterBusy);
            }
            match queue.try_step() {
                QueueStep::Frame(image) => self.append_image(image)?,
                QueueStep::Idle => return Ok(DrainStatus::QueueEmpty),
                QueueStep::Finished => return Ok(DrainStatus::Complete),
            }
        }
    }

    /// Park until the writer may be ready again.
    pub fn wait_writer_ready(&mut self, timeout: Duration) {
        self.writer.wait_until_ready(timeout);
    }

    /// Finalize the stream and return its path once the writer confirms the file is complete.
    #[tracing::instrument(skip_all, fields(out = %self.out_path.display()))]
    pub fn finish(mut self) -> CaptureResult<PathBuf> {
        if self.frames_encoded == 0 {
            self.writer.cancel();
            return Err(CaptureError::NoFramesToRender);
        }
        self.writer.finish_writing()?;
        tracing::info!(
            frames = self.frames_encoded,
            dropped = self.frames_dropped,
            "encoded stream finalized"
        );
        Ok(self.out_path)
    }

    /// Abandon the stream after a failure.
    pub fn abort(mut self) {
        self.writer.cancel();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/encoder.rs"]
mod tests;
