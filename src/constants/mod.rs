//! Engine constants organized by domain.
//!
//! Centralizing magic numbers makes tuning easier and documents intent.
//! Most of these are defaults for [`crate::config::EngineConfig`] fields.

mod cache;
mod camera;
mod gesture;
mod render;

pub use cache::*;
pub use camera::*;
pub use gesture::*;
pub use render::*;
