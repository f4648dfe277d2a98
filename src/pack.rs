use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::capture::controller::CaptureController;
use crate::capture::session::StartOptions;
use crate::capture::still::StillImage;
use crate::config::CaptureConfig;
use crate::encode::writer::WriterFactory;
use crate::foundation::error::{CaptureError, CaptureResult};

/// Encode an already complete sequence of stills into one video.
///
/// Runs a regular capture session: every image is submitted in order, then capture stops and the
/// encoder drains. An empty sequence fails with [`CaptureError::NoFramesToRender`].
#[tracing::instrument(skip_all)]
pub fn encode_image_pack(
    images: impl IntoIterator<Item = StillImage>,
    opts: StartOptions,
    config: CaptureConfig,
    factory: Arc<dyn WriterFactory>,
) -> CaptureResult<PathBuf> {
    let ctl = CaptureController::new(config, factory)?;
    let done = ctl.start(opts)?;
    let mut submitted = 0u64;
    for image in images {
        // A refused frame means the session already failed; its error arrives below.
        if ctl.submit_frame(image).is_err() {
            break;
        }
        submitted += 1;
    }
    ctl.stop();
    tracing::debug!(submitted, "image pack submitted");
    done.wait()
}

/// PNG files directly inside `dir`, sorted by file name.
pub fn sorted_png_paths(dir: &Path) -> CaptureResult<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read dir '{}'", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("read dir '{}'", dir.display()))?
            .path();
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if is_png && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Decode every PNG in `dir`, in file-name order.
pub fn load_png_dir(dir: &Path) -> CaptureResult<Vec<StillImage>> {
    let paths = sorted_png_paths(dir)?;
    if paths.is_empty() {
        return Err(CaptureError::NoFramesToRender);
    }
    paths.iter().map(|p| StillImage::open(p)).collect()
}

#[cfg(test)]
#[path = "../tests/unit/pack.rs"]
mod tests;
