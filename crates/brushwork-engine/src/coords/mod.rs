//! Coordinate and geometry types shared by the render backends and the genome.
//!
//! Canonical CPU space:
//! - Canvas pixels
//! - Origin top-left
//! - +X right, +Y down
//!
//! A [`Canvas`] names a sub-region of that space. Render targets cover exactly one
//! canvas; backends subtract the canvas offset before converting to NDC.

mod bounds;
mod canvas;
mod color;
mod vec2;

pub use bounds::Bounds;
pub use canvas::{Canvas, Extent};
pub use color::ColorRgba;
pub use vec2::Vec2;
