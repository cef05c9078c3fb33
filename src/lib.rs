//! Viewport and image-cache engine for an unbounded, pan- and zoomable grid
//! of cells.
//!
//! The [`Engine`] owns a [`Camera`] with inertia, a [`GestureController`]
//! turning pointer, wheel and touch input into camera motion, an
//! [`ImageCache`] that fetches images in several resolutions off-thread, and
//! a [`ViewportRenderer`] that composes the visible cells onto any
//! [`Surface`].

pub mod cache;
pub mod camera;
pub mod color;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod grid;
pub mod render;
pub mod scheduler;

pub use cache::{FetchPool, FetchResponse, ImageCache, ImageFetcher};
pub use camera::Camera;
pub use color::Rgba;
pub use config::{EngineConfig, ViewportLimits};
pub use engine::{Engine, FrameReport, UiChrome};
pub use error::{ConfigError, FetchError};
pub use gesture::{GestureController, GestureState, InputEvent};
pub use grid::{GridCell, GridDataProvider};
pub use render::{DrawCommand, RasterSurface, RecordingSurface, Surface, ViewportRenderer};
pub use scheduler::{CacheJanitor, FrameScheduler};
