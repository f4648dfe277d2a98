use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::pixel::PixelBuffer;
use crate::encode::writer::{VideoWriter, WriterConfig, WriterFactory};
use crate::foundation::core::{Fps, PixelSize, Timestamp};
use crate::foundation::error::{CaptureError, CaptureResult};

/// Video codec used for every stream.
pub const VIDEO_CODEC: &str = "libx264";
/// Container extension of every stream.
pub const CONTAINER_EXT: &str = "mp4";

/// Options for [`FfmpegWriterFactory`].
#[derive(Clone, Debug)]
pub struct FfmpegWriterOpts {
    /// `ffmpeg` executable, looked up on `PATH` when relative.
    pub ffmpeg_bin: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
}

impl Default for FfmpegWriterOpts {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            overwrite: true,
        }
    }
}

/// Creates [`FfmpegWriter`]s that stream raw frames into the system `ffmpeg`.
#[derive(Clone, Debug, Default)]
pub struct FfmpegWriterFactory {
    opts: FfmpegWriterOpts,
}

impl FfmpegWriterFactory {
    /// Factory with explicit options.
    pub fn new(opts: FfmpegWriterOpts) -> Self {
        Self { opts }
    }
}

impl WriterFactory for FfmpegWriterFactory {
    fn create(&self, cfg: &WriterConfig) -> CaptureResult<Box<dyn VideoWriter>> {
        cfg.validate()?;
        let ext_ok = cfg
            .out_path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|e| e.eq_ignore_ascii_case(CONTAINER_EXT));
        if !ext_ok {
            return Err(CaptureError::writer_construction(format!(
                "output '{}' must have a .{CONTAINER_EXT} extension",
                cfg.out_path.display()
            )));
        }
        if !is_ffmpeg_available(&self.opts.ffmpeg_bin) {
            return Err(CaptureError::writer_construction(format!(
                "codec unavailable: '{}' could not be run",
                self.opts.ffmpeg_bin.display()
            )));
        }
        Ok(Box::new(FfmpegWriter::new(cfg.clone(), self.opts.clone())))
    }
}

/// Writer that spawns `ffmpeg` and pipes raw frames to its stdin.
///
/// ffmpeg assigns timestamps from the input rate, which matches the fixed `N × frame duration`
/// schedule; appended timestamps are checked against that schedule.
pub struct FfmpegWriter {
    cfg: WriterConfig,
    opts: FfmpegWriterOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    last_pts: Option<Timestamp>,
}

impl FfmpegWriter {
    fn new(cfg: WriterConfig, opts: FfmpegWriterOpts) -> Self {
        Self {
            cfg,
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            last_pts: None,
        }
    }

    fn build_command(&self) -> Command {
        let cfg = &self.cfg;
        let output = cfg.output_size.even_floor();

        let mut cmd = Command::new(&self.opts.ffmpeg_bin);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            cfg.format.ffmpeg_name(),
            "-s",
            &cfg.input_size.to_string(),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0", "-an"]);
        if output != cfg.input_size {
            cmd.args(["-vf", &format!("scale={}:{}", output.width, output.height)]);
        }
        cmd.args([
            "-c:v",
            VIDEO_CODEC,
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&cfg.out_path);
        cmd
    }

    /// Remove the empty file `prepare_output` created when ffmpeg never got to run.
    fn discard_output(&self) {
        if self.opts.overwrite {
            let _ = std::fs::remove_file(&self.cfg.out_path);
        }
    }

    fn collect_stderr(&mut self) -> String {
        let bytes = match self.stderr_drain.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => format!("ffmpeg stderr read failed: {e}").into_bytes(),
                Err(_) => b"ffmpeg stderr drain thread panicked".to_vec(),
            },
            None => Vec::new(),
        };
        String::from_utf8_lossy(&bytes).trim().to_string()
    }
}

impl VideoWriter for FfmpegWriter {
    fn start_writing(&mut self) -> CaptureResult<()> {
        if self.child.is_some() {
            return Err(CaptureError::writer_start("ffmpeg writer already started"));
        }
        let out_path = &self.cfg.out_path;
        prepare_output(out_path, self.opts.overwrite)?;

        let mut child = match self.build_command().spawn() {
            Ok(child) => child,
            Err(e) => {
                self.discard_output();
                return Err(CaptureError::writer_start(format!(
                    "failed to spawn '{}': {e}",
                    self.opts.ffmpeg_bin.display()
                )));
            }
        };

        let (Some(stdin), Some(mut stderr)) = (child.stdin.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            self.discard_output();
            return Err(CaptureError::UnknownWriteStartFailure);
        };
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(
            out = %out_path.display(),
            input = %self.cfg.input_size,
            output = %self.cfg.output_size.even_floor(),
            fps = self.cfg.fps.as_f64(),
            "ffmpeg writer started"
        );

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.last_pts = None;
        Ok(())
    }

    fn is_ready_for_more_media_data(&self) -> bool {
        self.stdin.is_some()
    }

    fn append(&mut self, buf: &PixelBuffer, pts: Timestamp) -> CaptureResult<()> {
        if buf.size() != self.cfg.input_size {
            return Err(CaptureError::append(format!(
                "frame size mismatch: got {}, expected {}",
                buf.size(),
                self.cfg.input_size
            )));
        }
        if buf.format() != self.cfg.format {
            return Err(CaptureError::append("pixel format mismatch"));
        }
        if pts.timescale != self.cfg.fps.num {
            return Err(CaptureError::append(format!(
                "timestamp timescale {} does not match stream rate {}",
                pts.timescale, self.cfg.fps.num
            )));
        }
        if let Some(last) = self.last_pts
            && pts.value <= last.value
        {
            return Err(CaptureError::append(
                "ffmpeg writer received out-of-order timestamp",
            ));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(CaptureError::append("ffmpeg writer is not accepting frames"));
        };

        use std::io::Write as _;
        if let Err(e) = stdin.write_all(buf.data()) {
            // A broken pipe means ffmpeg already exited; its stderr has the reason.
            drop(self.stdin.take());
            if let Some(child) = self.child.as_mut() {
                let _ = child.wait();
            }
            let stderr = self.collect_stderr();
            return Err(CaptureError::append(format!(
                "failed to write frame to ffmpeg stdin: {e}: {stderr}"
            )));
        }
        self.last_pts = Some(pts);
        Ok(())
    }

    fn finish_writing(&mut self) -> CaptureResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| CaptureError::finalize("ffmpeg writer not started"))?;

        let status = child.wait().map_err(|e| {
            CaptureError::finalize(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr = self.collect_stderr();

        if !status.success() {
            return Err(CaptureError::finalize(format!(
                "ffmpeg exited with status {status}: {stderr}"
            )));
        }
        Ok(())
    }

    fn cancel(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let stderr = self.collect_stderr();
        if !stderr.is_empty() {
            tracing::debug!(%stderr, "ffmpeg writer cancelled");
        }
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.cancel();
        }
    }
}

/// Make sure ffmpeg will be able to write `path`.
///
/// With `overwrite` the file is created (or truncated) up front. Without it the path must not
/// exist yet, and it is left absent so that ffmpeg's `-n` accepts it.
fn prepare_output(path: &Path, overwrite: bool) -> CaptureResult<()> {
    ensure_parent_dir(path).map_err(|e| CaptureError::writer_start(e.to_string()))?;
    let cannot_create = |e: std::io::Error| {
        CaptureError::writer_start(format!("cannot create '{}': {e}", path.display()))
    };
    if overwrite {
        std::fs::File::create(path).map_err(cannot_create)?;
        return Ok(());
    }
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => {
            drop(file);
            std::fs::remove_file(path).map_err(cannot_create)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(CaptureError::writer_start(
            format!("output file '{}' already exists", path.display()),
        )),
        Err(e) => Err(cannot_create(e)),
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, `-r` before `-i` sets the input frame rate.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> CaptureResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `bin -version` runs successfully.
pub fn is_ffmpeg_available(bin: &Path) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Even-sided output size for a stream whose frames are `input` pixels.
pub fn encoded_size(input: PixelSize, target: Option<PixelSize>) -> PixelSize {
    target.unwrap_or(input).even_floor()
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
