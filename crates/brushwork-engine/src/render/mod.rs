//! Offscreen rendering subsystem.
//!
//! Backends turn a `scene::DrawList` into pixels inside an offscreen target and
//! read them back. The slot pool cycles a fixed number of those targets across
//! many evaluations, gated by fences.
//!
//! Convention:
//! - CPU geometry is in canvas pixels (top-left origin, +Y down).
//! - Vertex shader converts to NDC using a canvas uniform.
//! - Readback is tightly packed RGBA8.

mod backend;
mod brushes;
pub mod offscreen;
pub mod slots;
pub mod software;
mod strokes;

pub use backend::OffscreenBackend;
pub use brushes::{BrushAtlas, BrushSet, UvRect};
pub use offscreen::{WgpuBackend, WgpuTarget};
pub use slots::{SlotId, SlotPool, SlotState, MAX_FRAMES_IN_FLIGHT};
pub use software::SoftwareBackend;
pub use strokes::StrokeRenderer;
