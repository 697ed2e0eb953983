//! Brushwork engine crate.
//!
//! This crate owns the headless GPU runtime used by the evolution layer: device
//! bootstrap, brush rendering backends and the render slot pool.

pub mod coords;
pub mod device;
pub mod logging;
pub mod render;
pub mod scene;
