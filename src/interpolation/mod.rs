//! Interpolation of gridded fields at arbitrary points.
//!
//! The functions here are pure: they work on a validated grid descriptor or
//! on points reported by the decoding library, plus a way to read values.

pub mod bilinear;
pub mod common;
pub mod nearest;

pub use nearest::{FourPoints, GridPoint};
