use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::encode::encoder::{AllocFailurePolicy, EncoderOpts};
use crate::encode::ffmpeg::{CONTAINER_EXT, FfmpegWriterOpts};
use crate::encode::pixel::DimensionPolicy;
use crate::encode::pool::PixelBufferPoolOpts;
use crate::foundation::core::Fps;
use crate::foundation::error::{CaptureError, CaptureResult};

const QUALIFIER: &str = "dev";
const ORGANIZATION: &str = "framecast";
const APPLICATION: &str = "framecast";

/// Capture and encoding settings. Every field has a default, so `{}` is a valid config file.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Fixed frame rate of encoded streams.
    pub fps: Fps,
    /// Capture tick interval; defaults to one frame duration.
    pub sample_interval_ms: Option<u64>,
    /// Directory for captures; defaults to the user's data directory.
    pub output_dir: Option<PathBuf>,
    /// `ffmpeg` executable.
    pub ffmpeg_bin: PathBuf,
    /// Opaque background under transparent pixels.
    pub bg_rgba: [u8; 4],
    /// Pixel buffers that may be in flight at once.
    pub pool_capacity: usize,
    /// Largest pixel buffer the pool will allocate.
    pub max_buffer_bytes: usize,
    /// Handling of frames whose size differs from the first frame's.
    pub dimension_policy: DimensionPolicy,
    /// Handling of pixel-buffer allocation failures.
    pub alloc_failure_policy: AllocFailurePolicy,
    /// Pending-frame count above which a backlog warning is logged (0 disables it).
    pub warn_pending_frames: usize,
    /// Delete the partial output of a failed session.
    pub remove_partial_on_failure: bool,
    /// How long the encoder waits between readiness checks.
    pub readiness_poll_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let pool = PixelBufferPoolOpts::default();
        Self {
            fps: Fps::default(),
            sample_interval_ms: None,
            output_dir: None,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            bg_rgba: [0, 0, 0, 255],
            pool_capacity: pool.max_buffers,
            max_buffer_bytes: pool.max_buffer_bytes,
            dimension_policy: DimensionPolicy::default(),
            alloc_failure_policy: AllocFailurePolicy::default(),
            warn_pending_frames: 600,
            remove_partial_on_failure: true,
            readiness_poll_ms: 10,
        }
    }
}

impl CaptureConfig {
    /// Load a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> CaptureResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if self.sample_interval_ms == Some(0) {
            return Err(CaptureError::validation("sample_interval_ms must be > 0"));
        }
        if self.pool_capacity == 0 {
            return Err(CaptureError::validation("pool_capacity must be > 0"));
        }
        if self.max_buffer_bytes == 0 {
            return Err(CaptureError::validation("max_buffer_bytes must be > 0"));
        }
        if self.readiness_poll_ms == 0 {
            return Err(CaptureError::validation("readiness_poll_ms must be > 0"));
        }
        Ok(())
    }

    /// Interval between capture ticks.
    pub fn sample_interval(&self) -> Duration {
        match self.sample_interval_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs_f64(self.fps.frame_duration_secs()),
        }
    }

    /// Wait between writer readiness checks.
    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    /// Directory new captures are written to.
    pub fn resolve_output_dir(&self) -> CaptureResult<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        let dirs = directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or_else(|| {
                CaptureError::writer_construction("no user data directory for captures")
            })?;
        Ok(dirs.data_dir().join("captures"))
    }

    /// Fresh, unique output path inside [`CaptureConfig::resolve_output_dir`].
    pub fn new_output_path(&self) -> CaptureResult<PathBuf> {
        let name = format!("{}.{CONTAINER_EXT}", uuid::Uuid::new_v4());
        Ok(self.resolve_output_dir()?.join(name))
    }

    /// Encoder settings derived from this config.
    pub fn encoder_opts(&self) -> EncoderOpts {
        EncoderOpts {
            fps: self.fps,
            bg_rgba: self.bg_rgba,
            dimension_policy: self.dimension_policy,
            alloc_failure_policy: self.alloc_failure_policy,
            pool: PixelBufferPoolOpts {
                max_buffers: self.pool_capacity,
                max_buffer_bytes: self.max_buffer_bytes,
            },
        }
    }

    /// `ffmpeg` writer settings derived from this config.
    pub fn ffmpeg_opts(&self) -> FfmpegWriterOpts {
        FfmpegWriterOpts {
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            overwrite: true,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
