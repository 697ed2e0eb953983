//! Headless GPU device management and synchronization primitives.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - the crate-wide render error type
//! - CPU-side fences used to gate render slot reuse

mod error;
mod fence;
mod gpu;

pub use error::RenderError;
pub use fence::Fence;
pub use gpu::{Gpu, GpuInit};
