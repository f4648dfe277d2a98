//! Turning still images into an encoded video stream.
//!
//! Frames are rasterized into pooled fixed-format pixel buffers and handed to a
//! [`VideoWriter`](writer::VideoWriter) at fixed-rate presentation timestamps.

/// Per-session encoder and its drain loop.
pub mod encoder;
/// `ffmpeg`-based writer (MP4 output via system `ffmpeg`).
pub mod ffmpeg;
/// Pixel formats and still-image rasterization.
pub mod pixel;
/// Bounded pixel-buffer pool.
pub mod pool;
/// Writer trait and the in-memory writer.
pub mod writer;
