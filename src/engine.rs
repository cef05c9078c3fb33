//! The engine aggregate: camera, gestures, image cache, renderer and
//! scheduler behind one owner.
//!
//! Hosts forward input through [`Engine::handle_input`] and call
//! [`Engine::frame`] once per display refresh. Both take the current time,
//! so the engine can run headless and deterministically in tests.

use crate::cache::{CacheSettings, EvictionReport, FetchPool, ImageCache, ImageFetcher, PumpReport};
use crate::camera::Camera;
use crate::config::{EngineConfig, ViewportLimits};
use crate::error::ConfigError;
use crate::gesture::{GestureController, InputEvent};
use crate::grid::GridDataProvider;
use crate::render::{FrameStats, Surface, ViewportRenderer};
use crate::scheduler::{FrameScheduler, FrameTiming};
use glam::DVec2;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Nominal display refresh used for scheduling hints
const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Receives status updates for the surrounding UI
pub trait UiChrome {
    /// Integer cell under the viewport center, every frame
    fn report_cell(&mut self, x: i64, y: i64);
    /// Cache occupancy as `"<used>/<capacity>"`, every janitor tick
    fn report_cache(&mut self, occupancy: &str);
}

/// Chrome that ignores every report
impl UiChrome for () {
    fn report_cell(&mut self, _x: i64, _y: i64) {}
    fn report_cache(&mut self, _occupancy: &str) {}
}

/// What happened during one [`Engine::frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub timing: FrameTiming,
    pub pump: PumpReport,
    pub render: FrameStats,
    /// Set when the janitor ran this frame
    pub eviction: Option<EvictionReport>,
    pub cell: (i64, i64),
}

pub struct Engine {
    config: EngineConfig,
    limits: ViewportLimits,
    camera: Camera,
    gestures: GestureController,
    cache: ImageCache,
    renderer: ViewportRenderer,
    scheduler: FrameScheduler,
}

impl Engine {
    /// Build an engine for a `width` x `height` viewport with a threaded
    /// fetch pool sized by `config.fetch_workers`.
    pub fn new(
        config: EngineConfig,
        width: f64,
        height: f64,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Result<Self, ConfigError> {
        let pool = FetchPool::threaded(fetcher, &config.source_id_header, config.fetch_workers);
        Self::with_pool(config, width, height, pool)
    }

    /// Build an engine around an existing fetch pool
    pub fn with_pool(config: EngineConfig, width: f64, height: f64, pool: FetchPool) -> Result<Self, ConfigError> {
        config.validate()?;
        if !(width > 0.0 && height > 0.0) {
            return Err(ConfigError::Invalid(format!("viewport {width}x{height} is empty")));
        }

        let limits = ViewportLimits::derive(width, height, &config);
        let mut camera = Camera::new(width, height, limits.min_scale, limits.max_scale)
            .with_friction(config.friction)
            .with_zoom_factor(config.zoom_factor);
        camera.set_scale(limits.start_scale);

        let cache = ImageCache::new(pool, CacheSettings::from_config(&config, limits.cache_capacity));
        info!(
            "engine ready: {width}x{height}, scale {:.1} in [{:.1}, {:.1}], cache capacity {}",
            limits.start_scale, limits.min_scale, limits.max_scale, limits.cache_capacity
        );

        Ok(Self {
            gestures: GestureController::new(limits.tap_zoom_target),
            renderer: ViewportRenderer::new(limits.zoomed_out_scale, config.supports_hover),
            scheduler: FrameScheduler::new(FRAME_INTERVAL, config.janitor_interval),
            config,
            limits,
            camera,
            cache,
        })
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) {
        trace!("input {:?}", event);
        self.gestures.handle(event, &mut self.camera, now);
    }

    /// Advance and draw one frame.
    ///
    /// Applies finished fetches, advances gesture animations, steps inertia,
    /// composes the visible cells onto `surface`, then lets the janitor
    /// sweep if its interval has elapsed.
    pub fn frame(
        &mut self,
        now: Instant,
        surface: &mut dyn Surface,
        provider: &dyn GridDataProvider,
        chrome: &mut dyn UiChrome,
    ) -> FrameReport {
        puffin::profile_function!();

        let timing = self.scheduler.begin_frame(now);
        let pump = self.cache.pump(now);

        let size = surface.size();
        if size != self.camera.viewport() {
            self.camera.resize(size.x, size.y);
        }

        {
            puffin::profile_scope!("camera_step");
            self.gestures.tick(&mut self.camera, now);
            if !self.gestures.is_mouse_panning() {
                self.camera.apply_inertia_step(self.gestures.is_touch_panning());
            }
        }

        let render = self.renderer.render_frame(
            &self.camera,
            self.gestures.pointer(),
            provider,
            &mut self.cache,
            surface,
            now,
        );

        let eviction = self.janitor_tick(now, chrome);

        let cell = self.camera.cell_position();
        chrome.report_cell(cell.0, cell.1);

        trace!(
            "frame {}: {} cells, {} images, {} waiting",
            timing.index,
            render.cells,
            render.images_drawn,
            render.images_waiting
        );
        FrameReport {
            timing,
            pump,
            render,
            eviction,
            cell,
        }
    }

    /// Run the cache janitor if its interval has elapsed and report the
    /// occupancy when it does. [`Engine::frame`] calls this after composing;
    /// hosts that stop drawing while idle call it on
    /// [`FrameScheduler::next_wakeup`] deadlines instead.
    pub fn janitor_tick(&mut self, now: Instant, chrome: &mut dyn UiChrome) -> Option<EvictionReport> {
        let eviction = self.scheduler.janitor_mut().tick(&mut self.cache, now);
        if eviction.is_some() {
            chrome.report_cache(&self.cache.occupancy());
        }
        eviction
    }

    /// Track a new viewport size. Scale limits stay as derived at startup.
    pub fn resize(&mut self, width: f64, height: f64) {
        debug!("resize to {width}x{height}");
        self.camera.resize(width, height);
    }

    /// Jump to a cell entered by the user
    pub fn recenter(&mut self, x: i64, y: i64) {
        debug!("recenter on {x},{y}");
        self.camera.recenter(x as f64, y as f64);
    }

    pub fn pointer(&self) -> Option<DVec2> {
        self.gestures.pointer()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn gestures(&self) -> &GestureController {
        &self.gestures
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ImageCache {
        &mut self.cache
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn limits(&self) -> &ViewportLimits {
        &self.limits
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("camera", &self.camera)
            .field("gesture", self.gestures.state())
            .field("cache", &self.cache)
            .finish()
    }
}
