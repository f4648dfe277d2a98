//! Frame producers: the [`FrameSource`] contract and the [`ticker::Ticker`] that drives it.

use std::time::Duration;

use crate::capture::still::StillImage;
use crate::foundation::error::CaptureResult;

/// Fixed-rate sampling thread.
pub mod ticker;

/// Something that can be sampled into a still image at a point in time.
///
/// `elapsed` is the time since capture started. Sources are sampled from the ticker thread, one
/// call at a time.
pub trait FrameSource: Send {
    /// Render the current appearance.
    fn snapshot(&mut self, elapsed: Duration) -> CaptureResult<StillImage>;
}

impl<F> FrameSource for F
where
    F: FnMut(Duration) -> CaptureResult<StillImage> + Send,
{
    fn snapshot(&mut self, elapsed: Duration) -> CaptureResult<StillImage> {
        self(elapsed)
    }
}
