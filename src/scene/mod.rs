//! Built-in animated content for demos and smoke tests.

/// Balls orbiting the centre of a solid background.
pub mod orbit;
