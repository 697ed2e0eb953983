//! Scene (draw stream) types.
//!
//! Responsibilities:
//! - store renderer-agnostic stroke commands
//! - keep paint order deterministic (insertion order, back to front)

mod list;
mod stroke;

pub use list::DrawList;
pub use stroke::StrokeCmd;
