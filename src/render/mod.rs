//! Viewport composition: turns camera, grid data and cached images into draw
//! commands on a [`Surface`].

mod raster;
mod surface;
mod visible;

pub use raster::RasterSurface;
pub use surface::{BlendMode, DrawCommand, RecordingSurface, Rect, Surface, TextAlign, TextBaseline, TextStyle};
pub use visible::{cover_fit, hover_intensity, VisibleRange};

use crate::cache::ImageCache;
use crate::camera::Camera;
use crate::color::Rgba;
use crate::constants::*;
use crate::grid::{GridCell, GridDataProvider};
use glam::DVec2;
use std::time::Instant;

/// Counters for one composed frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub cells: usize,
    pub populated: usize,
    pub images_drawn: usize,
    /// Image cells whose image was not available yet
    pub images_waiting: usize,
}

/// Draws the visible part of the grid. Holds no per-frame state.
#[derive(Debug, Clone)]
pub struct ViewportRenderer {
    supports_hover: bool,
    zoomed_out_scale: f64,
}

/// Per-frame values shared by every cell
struct FrameContext {
    scale: f64,
    position: DVec2,
    half: DVec2,
    zoomed_out: bool,
    pointer: Option<DVec2>,
    requested_resolution: f64,
}

impl ViewportRenderer {
    pub fn new(zoomed_out_scale: f64, supports_hover: bool) -> Self {
        Self {
            supports_hover,
            zoomed_out_scale,
        }
    }

    pub fn supports_hover(&self) -> bool {
        self.supports_hover
    }

    pub fn is_zoomed_out(&self, scale: f64) -> bool {
        scale <= self.zoomed_out_scale
    }

    pub fn visible_range(&self, camera: &Camera, viewport: DVec2) -> VisibleRange {
        VisibleRange::compute(camera.position, camera.scale(), viewport, VISIBLE_MARGIN_CELLS)
    }

    /// Compose one frame. Images that are not cached yet are requested from
    /// `cache` and drawn on a later frame.
    pub fn render_frame(
        &self,
        camera: &Camera,
        pointer: Option<DVec2>,
        provider: &dyn GridDataProvider,
        cache: &mut ImageCache,
        surface: &mut dyn Surface,
        now: Instant,
    ) -> FrameStats {
        puffin::profile_function!();

        let viewport = surface.size();
        surface.draw(DrawCommand::Clear(BACKGROUND_COLOR));

        let scale = camera.scale();
        let pan_speed = camera.pan_velocity.length();
        let frame = FrameContext {
            scale,
            position: camera.position,
            half: viewport / 2.0,
            zoomed_out: self.is_zoomed_out(scale),
            pointer,
            requested_resolution: scale / (pan_speed * PAN_SPEED_RESOLUTION_DAMPING).max(1.0),
        };

        let range = self.visible_range(camera, viewport);
        let mut stats = FrameStats::default();
        {
            puffin::profile_scope!("compose_cells");
            for (x, y) in range.cells() {
                self.draw_cell(&frame, x, y, provider, cache, surface, now, &mut stats);
            }
        }
        stats
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_cell(
        &self,
        frame: &FrameContext,
        x: i64,
        y: i64,
        provider: &dyn GridDataProvider,
        cache: &mut ImageCache,
        surface: &mut dyn Surface,
        now: Instant,
        stats: &mut FrameStats,
    ) {
        stats.cells += 1;
        let s = frame.scale;
        let origin = (DVec2::new(x as f64, y as f64) + CELL_SPACING - frame.position) * s + frame.half;
        let size = s * (1.0 - 2.0 * CELL_SPACING);
        let resting = Rect::new(origin.x, origin.y, size, size);

        let (lift, hover_alpha, reach) = if frame.zoomed_out {
            (HOVER_LIFT.1, HOVER_ALPHA.1, 2.0)
        } else {
            (HOVER_LIFT.0, HOVER_ALPHA.0, 1.0)
        };
        let pointer = frame.pointer.filter(|_| self.supports_hover);
        let hover_k = hover_intensity(resting.center(), size, pointer, reach);
        let hovered = pointer.is_some_and(|p| resting.contains(p));

        let rect = Rect::new(origin.x, origin.y + hover_k * lift, size, size);
        let radius = CELL_RADIUS * s;

        surface.draw(DrawCommand::PushClip { rect, radius });
        surface.draw(DrawCommand::FillRoundedRect {
            rect,
            radius,
            color: PANEL_COLOR,
        });

        let inset = (CELL_SPACING + CELL_RADIUS) * s;
        surface.draw(DrawCommand::Text {
            text: format!("{x},{y}"),
            pos: DVec2::new(rect.x + size - inset, rect.y + size - inset),
            style: TextStyle {
                size: s / LABEL_FONT_DIVISOR,
                bold: false,
                color: LABEL_COLOR,
                align: TextAlign::Right,
                baseline: TextBaseline::Middle,
            },
        });

        if let Some(cell) = provider.get(x, y) {
            stats.populated += 1;
            self.draw_content(frame, &cell, rect, cache, surface, now, stats);
        }

        if hovered {
            surface.draw(DrawCommand::FillRect {
                rect,
                color: Rgba::WHITE.with_alpha(hover_k * hover_alpha),
                blend: BlendMode::Overlay,
            });
        }
        surface.draw(DrawCommand::PopClip);
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_content(
        &self,
        frame: &FrameContext,
        cell: &GridCell,
        rect: Rect,
        cache: &mut ImageCache,
        surface: &mut dyn Surface,
        now: Instant,
        stats: &mut FrameStats,
    ) {
        let s = frame.scale;

        if let Some(background) = cell.background {
            surface.draw(DrawCommand::FillRect {
                rect,
                color: background,
                blend: BlendMode::Normal,
            });
        }

        if let Some(url) = &cell.image {
            surface.draw(DrawCommand::FillRect {
                rect,
                color: IMAGE_PLACEHOLDER_COLOR,
                blend: BlendMode::Normal,
            });
            match cache.resolve(url, frame.requested_resolution, now) {
                Some(image) => {
                    stats.images_drawn += 1;
                    let dest = cover_fit(image.width(), image.height(), rect);
                    surface.draw(DrawCommand::Image { image, dest });
                }
                None => stats.images_waiting += 1,
            }
            if cell.has_text() {
                surface.draw(DrawCommand::LinearGradient {
                    rect,
                    top: Rgba::BLACK.with_alpha(0.0),
                    bottom: Rgba::BLACK.with_alpha(CAPTION_GRADIENT_ALPHA),
                });
            }
        }

        let color = cell.color.unwrap_or(Rgba::WHITE);
        let left = rect.x + CELL_SPACING * 2.0 * s;
        let bottom = rect.y + rect.h;

        if let Some(title) = &cell.title {
            let y = if cell.subtitle.is_some() {
                bottom - (CELL_SPACING * 4.0 + TITLE_OVER_SUBTITLE_CELLS) * s
            } else {
                bottom - CELL_SPACING * 2.0 * s
            };
            surface.draw(DrawCommand::Text {
                text: title.clone(),
                pos: DVec2::new(left, y),
                style: TextStyle {
                    size: s / TITLE_FONT_DIVISOR,
                    bold: true,
                    color,
                    align: TextAlign::Left,
                    baseline: TextBaseline::Middle,
                },
            });
        }

        if let Some(subtitle) = &cell.subtitle {
            surface.draw(DrawCommand::Text {
                text: subtitle.clone(),
                pos: DVec2::new(left, bottom - CELL_SPACING * 4.0 * s),
                style: TextStyle {
                    size: s / SUBTITLE_FONT_DIVISOR,
                    bold: false,
                    color,
                    align: TextAlign::Left,
                    baseline: TextBaseline::Middle,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, FetchPool, FetchResponse, ImageFetcher, SizeTier, TierSlot};
    use crate::config::EngineConfig;
    use crate::error::FetchError;
    use image::{ImageFormat, RgbaImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Arc;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::new(w, h)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn cache() -> ImageCache {
        let fetcher: Arc<dyn ImageFetcher> = Arc::new(|url: &str| -> Result<FetchResponse, FetchError> {
            if url.contains("broken") {
                return Err(FetchError::Status(500));
            }
            Ok(FetchResponse::new(png(4, 2)).with_header("Picsum-ID", "3"))
        });
        let config = EngineConfig::default();
        let pool = FetchPool::inline(fetcher, &config.source_id_header);
        ImageCache::new(pool, CacheSettings::from_config(&config, 100))
    }

    fn camera() -> Camera {
        let mut camera = Camera::new(800.0, 600.0, 50.0, 300.0);
        camera.set_scale(100.0);
        camera
    }

    fn count_clips(commands: &[DrawCommand]) -> (usize, usize) {
        commands.iter().fold((0, 0), |(push, pop), c| match c {
            DrawCommand::PushClip { .. } => (push + 1, pop),
            DrawCommand::PopClip => (push, pop + 1),
            _ => (push, pop),
        })
    }

    #[test]
    fn test_empty_grid_draws_labels_only() {
        let renderer = ViewportRenderer::new(50.0, true);
        let mut surface = RecordingSurface::new(800.0, 600.0);
        let provider: HashMap<(i64, i64), GridCell> = HashMap::new();
        let mut cache = cache();
        let t0 = Instant::now();

        let stats = renderer.render_frame(&camera(), None, &provider, &mut cache, &mut surface, t0);
        assert_eq!(stats.cells, 13 * 11);
        assert_eq!(stats.populated, 0);
        assert!(matches!(surface.commands[0], DrawCommand::Clear(c) if c == Rgba::BLACK));
        let (push, pop) = count_clips(&surface.commands);
        assert_eq!(push, stats.cells);
        assert_eq!(pop, stats.cells);
        let texts = surface.texts();
        assert_eq!(texts.len(), stats.cells);
        assert_eq!(texts[0], "-6,-5");
        assert!(texts.contains(&"0,0"));
    }

    #[test]
    fn test_cell_geometry_and_label() {
        let renderer = ViewportRenderer::new(50.0, false);
        let mut surface = RecordingSurface::new(800.0, 600.0);
        let provider: HashMap<(i64, i64), GridCell> = HashMap::new();
        let mut cache = cache();
        renderer.render_frame(&camera(), None, &provider, &mut cache, &mut surface, Instant::now());

        // Cell (0, 0) with the camera at (0.5, 0.5) sits centered in the viewport
        let clip = surface.commands.iter().find_map(|c| match c {
            DrawCommand::PushClip { rect, radius } if (rect.x - 352.5).abs() < 1e-9 && (rect.y - 252.5).abs() < 1e-9 => {
                Some((*rect, *radius))
            }
            _ => None,
        });
        let (rect, radius) = clip.unwrap();
        assert!((rect.w - 95.0).abs() < 1e-9);
        assert!((radius - 5.0).abs() < 1e-9);

        let label = surface.commands.iter().find_map(|c| match c {
            DrawCommand::Text { text, pos, style } if text == "0,0" => Some((*pos, style.clone())),
            _ => None,
        });
        let (pos, style) = label.unwrap();
        assert!((pos.x - (352.5 + 95.0 - 7.5)).abs() < 1e-9);
        assert_eq!(style.align, TextAlign::Right);
        assert_eq!(style.color, LABEL_COLOR);
        assert!((style.size - 100.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_image_cell_appears_after_fetch() {
        let renderer = ViewportRenderer::new(50.0, false);
        let mut surface = RecordingSurface::new(800.0, 600.0);
        let mut provider = HashMap::new();
        let mut cell = GridCell::new(0, 0);
        cell.image = Some("https://img.test/a".to_string());
        cell.title = Some("Title".to_string());
        cell.subtitle = Some("Sub".to_string());
        cell.color = Some(Rgba::rgb(255, 0, 0));
        provider.insert((0, 0), cell);
        let mut cache = cache();
        let t0 = Instant::now();

        let first = renderer.render_frame(&camera(), None, &provider, &mut cache, &mut surface, t0);
        assert_eq!(first.populated, 1);
        assert_eq!(first.images_waiting, 1);
        assert_eq!(surface.image_count(), 0);

        cache.pump(t0);
        surface.clear_commands();
        let second = renderer.render_frame(&camera(), None, &provider, &mut cache, &mut surface, t0);
        assert_eq!(second.images_drawn, 1);

        let dest = surface.commands.iter().find_map(|c| match c {
            DrawCommand::Image { dest, .. } => Some(*dest),
            _ => None,
        });
        // 4x2 image covering a 95px square: 190 wide, centered
        let dest = dest.unwrap();
        assert!((dest.w - 190.0).abs() < 1e-9);
        assert!((dest.h - 95.0).abs() < 1e-9);
        assert!((dest.x - 305.0).abs() < 1e-9);
        assert!(surface
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::LinearGradient { .. })));

        let title = surface.commands.iter().find_map(|c| match c {
            DrawCommand::Text { text, style, .. } if text == "Title" => Some(style.clone()),
            _ => None,
        });
        let title = title.unwrap();
        assert!(title.bold);
        assert_eq!(title.color, Rgba::rgb(255, 0, 0));
        assert!(surface.texts().contains(&"Sub"));
    }

    #[test]
    fn test_hover_lifts_and_highlights_cell() {
        let renderer = ViewportRenderer::new(50.0, true);
        let mut surface = RecordingSurface::new(800.0, 600.0);
        let provider: HashMap<(i64, i64), GridCell> = HashMap::new();
        let mut cache = cache();
        let pointer = Some(DVec2::new(400.0, 300.0));
        renderer.render_frame(&camera(), pointer, &provider, &mut cache, &mut surface, Instant::now());

        let overlays: Vec<_> = surface
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillRect {
                    rect,
                    color,
                    blend: BlendMode::Overlay,
                } => Some((*rect, *color)),
                _ => None,
            })
            .collect();
        assert_eq!(overlays.len(), 1);
        let (rect, color) = overlays[0];
        // Pointer sits on the panel center: full lift, full overlay alpha
        assert!((rect.y - (252.5 + 4.0)).abs() < 1e-9);
        assert_eq!(color, Rgba::WHITE.with_alpha(0.25));
    }

    #[test]
    fn test_touch_devices_never_hover() {
        let renderer = ViewportRenderer::new(50.0, false);
        let mut surface = RecordingSurface::new(800.0, 600.0);
        let provider: HashMap<(i64, i64), GridCell> = HashMap::new();
        let mut cache = cache();
        let pointer = Some(DVec2::new(400.0, 300.0));
        renderer.render_frame(&camera(), pointer, &provider, &mut cache, &mut surface, Instant::now());
        assert!(!surface.commands.iter().any(|c| matches!(
            c,
            DrawCommand::FillRect {
                blend: BlendMode::Overlay,
                ..
            }
        )));
    }

    #[test]
    fn test_fast_pan_requests_smaller_tier() {
        let renderer = ViewportRenderer::new(50.0, false);
        let mut surface = RecordingSurface::new(800.0, 600.0);
        let mut provider = HashMap::new();
        let mut cell = GridCell::new(0, 0);
        cell.image = Some("https://img.test/a".to_string());
        provider.insert((0, 0), cell);
        let mut cache = cache();
        let t0 = Instant::now();
        let mut camera = camera();
        camera.set_scale(150.0);

        renderer.render_frame(&camera, None, &provider, &mut cache, &mut surface, t0);
        cache.pump(t0);

        // 150 / (0.5 * 64) is under 48, so the Xs tier is wanted instead of M
        camera.pan_velocity = DVec2::new(0.5, 0.0);
        renderer.render_frame(&camera, None, &provider, &mut cache, &mut surface, t0);
        assert!(cache
            .tier_slot("https://img.test/a", SizeTier::Xs)
            .is_some_and(|slot| !matches!(slot, TierSlot::Absent)));
        assert!(cache
            .tier_slot("https://img.test/a", SizeTier::M)
            .is_some_and(|slot| matches!(slot, TierSlot::Absent)));
    }

    #[test]
    fn test_zoomed_out_threshold() {
        let renderer = ViewportRenderer::new(150.0, true);
        assert!(renderer.is_zoomed_out(150.0));
        assert!(!renderer.is_zoomed_out(150.5));
    }
}
