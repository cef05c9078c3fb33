//! Software surface backed by a `tiny_skia::Pixmap`.
//!
//! Shapes, gradients and images go through tiny-skia paths and paints; the
//! clip stack is a stack of masks. Text has no glyph source here, so text
//! commands are only counted.

use super::surface::{BlendMode, DrawCommand, Rect, Surface};
use crate::cache::DecodedImage;
use crate::color::Rgba;
use glam::DVec2;
use image::{ImageFormat, RgbaImage};
use std::path::Path;
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, GradientStop, LinearGradient, Mask, Paint, PathBuilder, Pixmap,
    PixmapPaint, Point, SpreadMode, Transform,
};

/// Control-point distance for a quarter circle drawn as one cubic
const CORNER_KAPPA: f32 = 0.552_284_8;

pub struct RasterSurface {
    pixmap: Pixmap,
    /// Active clips, each already intersected with the one below it
    clips: Vec<Mask>,
    text_commands: usize,
}

impl RasterSurface {
    /// `None` when either dimension is zero
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            pixmap: Pixmap::new(width, height)?,
            clips: Vec::new(),
            text_commands: 0,
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Copy of the canvas with straight (non-premultiplied) alpha
    pub fn to_image(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.pixmap.width(), self.pixmap.height());
        for (dst, src) in image.pixels_mut().zip(self.pixmap.pixels()) {
            let c = src.demultiply();
            dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
        }
        image
    }

    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.to_image().save_with_format(path, ImageFormat::Png)
    }

    /// Text commands received but not rasterized
    pub fn text_commands(&self) -> usize {
        self.text_commands
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        match self.pixmap.pixel(x, y) {
            Some(p) => {
                let c = p.demultiply();
                Rgba {
                    r: c.red(),
                    g: c.green(),
                    b: c.blue(),
                    a: c.alpha(),
                }
            }
            None => Rgba::TRANSPARENT,
        }
    }

    fn push_clip(&mut self, rect: Rect, radius: f64) {
        let path = rounded_rect_path(rect, radius);
        let clip = match (self.clips.last(), path) {
            (Some(outer), Some(path)) => {
                let mut mask = outer.clone();
                mask.intersect_path(&path, FillRule::Winding, true, Transform::identity());
                Some(mask)
            }
            (None, Some(path)) => Mask::new(self.pixmap.width(), self.pixmap.height()).map(|mut mask| {
                mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
                mask
            }),
            // Degenerate clip: nothing inside it is drawable
            (_, None) => Mask::new(self.pixmap.width(), self.pixmap.height()),
        };
        if let Some(mask) = clip {
            self.clips.push(mask);
        }
    }

    fn fill(&mut self, rect: Rect, radius: f64, paint: &Paint) {
        let Some(path) = rounded_rect_path(rect, radius) else {
            return;
        };
        let mask = self.clips.last();
        self.pixmap
            .fill_path(&path, paint, FillRule::Winding, Transform::identity(), mask);
    }

    fn draw_image(&mut self, image: &DecodedImage, dest: Rect) {
        let Some(source) = to_pixmap(image.pixels()) else {
            return;
        };
        if dest.w <= 0.0 || dest.h <= 0.0 {
            return;
        }
        let transform = Transform::from_row(
            (dest.w / f64::from(source.width())) as f32,
            0.0,
            0.0,
            (dest.h / f64::from(source.height())) as f32,
            dest.x as f32,
            dest.y as f32,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Nearest,
            ..PixmapPaint::default()
        };
        let mask = self.clips.last();
        self.pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, transform, mask);
    }
}

fn color(c: Rgba) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn solid(c: Rgba, blend: BlendMode) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color(c));
    paint.anti_alias = true;
    paint.blend_mode = match blend {
        BlendMode::Normal => tiny_skia::BlendMode::SourceOver,
        BlendMode::Overlay => tiny_skia::BlendMode::Overlay,
    };
    paint
}

/// Rect path with circular corners; corners are capped at half the shorter
/// side. `None` for an empty rect.
fn rounded_rect_path(rect: Rect, radius: f64) -> Option<tiny_skia::Path> {
    let (x, y, w, h) = (rect.x as f32, rect.y as f32, rect.w as f32, rect.h as f32);
    let r = (radius as f32).min(w / 2.0).min(h / 2.0);
    if r <= 0.0 {
        return tiny_skia::Rect::from_xywh(x, y, w, h).map(PathBuilder::from_rect);
    }

    let k = r * CORNER_KAPPA;
    let (right, bottom) = (x + w, y + h);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.cubic_to(right - r + k, y, right, y + r - k, right, y + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.cubic_to(x + r - k, bottom, x, bottom - r + k, x, bottom - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Premultiplied copy of a decoded image
fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

impl Surface for RasterSurface {
    fn size(&self) -> DVec2 {
        DVec2::new(f64::from(self.pixmap.width()), f64::from(self.pixmap.height()))
    }

    fn draw(&mut self, command: DrawCommand) {
        match command {
            DrawCommand::Clear(c) => self.pixmap.fill(color(c)),
            DrawCommand::PushClip { rect, radius } => self.push_clip(rect, radius),
            DrawCommand::PopClip => {
                self.clips.pop();
            }
            DrawCommand::FillRoundedRect { rect, radius, color } => {
                self.fill(rect, radius, &solid(color, BlendMode::Normal));
            }
            DrawCommand::FillRect { rect, color, blend } => {
                let Some(area) = tiny_skia::Rect::from_xywh(rect.x as f32, rect.y as f32, rect.w as f32, rect.h as f32)
                else {
                    return;
                };
                let paint = solid(color, blend);
                let mask = self.clips.last();
                self.pixmap.fill_rect(area, &paint, Transform::identity(), mask);
            }
            DrawCommand::Text { .. } => self.text_commands += 1,
            DrawCommand::Image { image, dest } => self.draw_image(&image, dest),
            DrawCommand::LinearGradient { rect, top, bottom } => {
                let shader = LinearGradient::new(
                    Point::from_xy(0.0, rect.y as f32),
                    Point::from_xy(0.0, (rect.y + rect.h) as f32),
                    vec![GradientStop::new(0.0, color(top)), GradientStop::new(1.0, color(bottom))],
                    SpreadMode::Pad,
                    Transform::identity(),
                );
                let Some(shader) = shader else {
                    return;
                };
                let paint = Paint {
                    shader,
                    anti_alias: true,
                    ..Paint::default()
                };
                self.fill(rect, 0.0, &paint);
            }
        }
    }
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("size", &(self.pixmap.width(), self.pixmap.height()))
            .field("clips", &self.clips.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{TextAlign, TextBaseline, TextStyle};
    use std::sync::Arc;

    const RED: Rgba = Rgba::rgb(255, 0, 0);
    const BLUE: Rgba = Rgba::rgb(0, 0, 255);

    fn solid_image(w: u32, h: u32, c: Rgba) -> Arc<DecodedImage> {
        let mut pixels = RgbaImage::new(w, h);
        for pixel in pixels.pixels_mut() {
            pixel.0 = [c.r, c.g, c.b, c.a];
        }
        Arc::new(DecodedImage::new(pixels))
    }

    #[test]
    fn test_zero_size_surface() {
        assert!(RasterSurface::new(0, 10).is_none());
    }

    #[test]
    fn test_rounded_fill_leaves_corners() {
        let mut surface = RasterSurface::new(20, 20).unwrap();
        surface.draw(DrawCommand::Clear(Rgba::BLACK));
        surface.draw(DrawCommand::FillRoundedRect {
            rect: Rect::new(0.0, 0.0, 20.0, 20.0),
            radius: 6.0,
            color: RED,
        });
        assert_eq!(surface.pixel(10, 10), RED);
        assert_eq!(surface.pixel(0, 0), Rgba::BLACK);
        assert_eq!(surface.pixel(19, 19), Rgba::BLACK);
        assert_eq!(surface.pixel(0, 10), RED);
    }

    #[test]
    fn test_clip_bounds_image_blit() {
        let mut surface = RasterSurface::new(20, 20).unwrap();
        surface.draw(DrawCommand::Clear(Rgba::BLACK));
        surface.draw(DrawCommand::PushClip {
            rect: Rect::new(5.0, 5.0, 10.0, 10.0),
            radius: 0.0,
        });
        surface.draw(DrawCommand::Image {
            image: solid_image(2, 2, BLUE),
            dest: Rect::new(0.0, 0.0, 20.0, 20.0),
        });
        surface.draw(DrawCommand::PopClip);

        assert_eq!(surface.pixel(10, 10), BLUE);
        assert_eq!(surface.pixel(2, 2), Rgba::BLACK);
        assert_eq!(surface.pixel(17, 10), Rgba::BLACK);
    }

    #[test]
    fn test_image_scales_to_destination() {
        let mut pixels = RgbaImage::new(2, 1);
        pixels.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        pixels.put_pixel(1, 0, image::Rgba([0, 0, 255, 255]));

        let mut surface = RasterSurface::new(20, 10).unwrap();
        surface.draw(DrawCommand::Clear(Rgba::BLACK));
        surface.draw(DrawCommand::Image {
            image: Arc::new(DecodedImage::new(pixels)),
            dest: Rect::new(0.0, 0.0, 20.0, 10.0),
        });
        assert_eq!(surface.pixel(4, 5), RED);
        assert_eq!(surface.pixel(15, 5), BLUE);
    }

    #[test]
    fn test_nested_clips_intersect() {
        let mut surface = RasterSurface::new(20, 20).unwrap();
        surface.draw(DrawCommand::Clear(Rgba::BLACK));
        surface.draw(DrawCommand::PushClip {
            rect: Rect::new(0.0, 0.0, 10.0, 20.0),
            radius: 0.0,
        });
        surface.draw(DrawCommand::PushClip {
            rect: Rect::new(0.0, 10.0, 20.0, 10.0),
            radius: 0.0,
        });
        surface.draw(DrawCommand::FillRect {
            rect: Rect::new(0.0, 0.0, 20.0, 20.0),
            color: RED,
            blend: BlendMode::Normal,
        });
        surface.draw(DrawCommand::PopClip);
        surface.draw(DrawCommand::PopClip);

        assert_eq!(surface.pixel(5, 15), RED);
        assert_eq!(surface.pixel(5, 5), Rgba::BLACK);
        assert_eq!(surface.pixel(15, 15), Rgba::BLACK);

        // Clips are gone after the pops
        surface.draw(DrawCommand::FillRect {
            rect: Rect::new(0.0, 0.0, 20.0, 20.0),
            color: BLUE,
            blend: BlendMode::Normal,
        });
        assert_eq!(surface.pixel(15, 5), BLUE);
    }

    #[test]
    fn test_rounded_clip_cuts_corners() {
        let mut surface = RasterSurface::new(20, 20).unwrap();
        surface.draw(DrawCommand::Clear(Rgba::BLACK));
        surface.draw(DrawCommand::PushClip {
            rect: Rect::new(0.0, 0.0, 20.0, 20.0),
            radius: 8.0,
        });
        surface.draw(DrawCommand::FillRect {
            rect: Rect::new(0.0, 0.0, 20.0, 20.0),
            color: RED,
            blend: BlendMode::Normal,
        });
        assert_eq!(surface.pixel(0, 0), Rgba::BLACK);
        assert_eq!(surface.pixel(10, 10), RED);
    }

    #[test]
    fn test_alpha_blend_and_gradient() {
        let mut surface = RasterSurface::new(10, 10).unwrap();
        surface.draw(DrawCommand::Clear(Rgba::WHITE));
        surface.draw(DrawCommand::FillRect {
            rect: Rect::new(0.0, 0.0, 10.0, 5.0),
            color: Rgba::BLACK.with_alpha(0.5),
            blend: BlendMode::Normal,
        });
        let half = surface.pixel(3, 2);
        assert!((125..=130).contains(&half.r));
        assert_eq!(half.a, 255);

        surface.draw(DrawCommand::LinearGradient {
            rect: Rect::new(0.0, 5.0, 10.0, 5.0),
            top: Rgba::BLACK.with_alpha(0.0),
            bottom: Rgba::BLACK.with_alpha(1.0),
        });
        assert!(surface.pixel(3, 5).r > surface.pixel(3, 9).r);
    }

    #[test]
    fn test_overlay_brightens_mid_tones() {
        let mut surface = RasterSurface::new(4, 4).unwrap();
        surface.draw(DrawCommand::Clear(Rgba::rgb(0x80, 0x80, 0x80)));
        surface.draw(DrawCommand::FillRect {
            rect: Rect::new(0.0, 0.0, 4.0, 4.0),
            color: Rgba::WHITE.with_alpha(0.5),
            blend: BlendMode::Overlay,
        });
        assert!(surface.pixel(1, 1).r > 0x80);
    }

    #[test]
    fn test_to_image_matches_pixels() {
        let mut surface = RasterSurface::new(3, 2).unwrap();
        surface.draw(DrawCommand::Clear(RED));
        let image = surface.to_image();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_text_is_counted() {
        let mut surface = RasterSurface::new(4, 4).unwrap();
        surface.draw(DrawCommand::Text {
            text: "0,0".to_string(),
            pos: DVec2::ZERO,
            style: TextStyle {
                size: 10.0,
                bold: false,
                color: Rgba::WHITE,
                align: TextAlign::Left,
                baseline: TextBaseline::Middle,
            },
        });
        assert_eq!(surface.text_commands(), 1);
    }
}
