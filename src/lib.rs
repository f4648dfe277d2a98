//! Framecast records a live, periodically sampled surface into an H.264 MP4 file.
//!
//! Capture and encoding are decoupled by a shared frame queue:
//!
//! - A [`CaptureController`] owns the session state machine (`Idle → Armed → Draining → Idle`)
//! - Stills arrive through [`CaptureController::submit_frame`] or a [`FrameSource`] driven by a
//!   [`Ticker`]
//! - An [`Encoder`] drains the queue on its own thread into a [`VideoWriter`] and the outcome is
//!   delivered once through a [`Completion`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Capture session, frame queue and still images.
pub mod capture;
/// Capture settings.
pub mod config;
/// Pixel conversion, buffer pooling and video writers.
pub mod encode;
/// Batch encoding of complete image sequences.
pub mod pack;
/// Built-in animated content.
pub mod scene;
/// Frame sources and the ticker that samples them.
pub mod source;

pub use crate::foundation::core::{Fps, FrameIndex, PixelSize, Timestamp};
pub use crate::foundation::error::{CaptureError, CaptureResult};

pub use crate::capture::controller::CaptureController;
pub use crate::capture::queue::{FrameQueue, QueueStep};
pub use crate::capture::session::{CaptureState, Completion, SessionStats, StartOptions};
pub use crate::capture::still::StillImage;
pub use crate::config::CaptureConfig;
pub use crate::encode::encoder::{AllocFailurePolicy, DrainStatus, Encoder, EncoderOpts};
pub use crate::encode::ffmpeg::{FfmpegWriter, FfmpegWriterFactory, FfmpegWriterOpts};
pub use crate::encode::pixel::{DimensionPolicy, PixelBuffer, PixelFormat};
pub use crate::encode::writer::{
    MemoryFault, MemoryWriterFactory, Recording, VideoWriter, WriterConfig, WriterFactory,
};
pub use crate::pack::{encode_image_pack, load_png_dir, sorted_png_paths};
pub use crate::scene::orbit::{OrbitScene, OrbitSceneOpts};
pub use crate::source::FrameSource;
pub use crate::source::ticker::{TickStats, Ticker};
