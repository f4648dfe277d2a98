//! Capture lifecycle: still images, the shared frame queue and the session controller.

/// Session state machine and encoder thread.
pub mod controller;
/// Producer/consumer frame queue.
pub mod queue;
/// Session states, options and the completion handle.
pub mod session;
/// Captured still images.
pub mod still;
