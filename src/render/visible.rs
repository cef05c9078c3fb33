//! Visible cell range and per-cell geometry.

use super::surface::Rect;
use glam::DVec2;

/// Inclusive integer cell range covering the viewport plus a margin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl VisibleRange {
    /// Invert `pixel = (grid - position) * scale + viewport / 2` at the
    /// viewport edges and widen by `margin` cells on every side.
    pub fn compute(position: DVec2, scale: f64, viewport: DVec2, margin: i64) -> Self {
        let half = viewport / (2.0 * scale);
        Self {
            x_min: (position.x - half.x).floor() as i64 - margin,
            x_max: (position.x + half.x).floor() as i64 + margin,
            y_min: (position.y - half.y).floor() as i64 - margin,
            y_max: (position.y + half.y).floor() as i64 + margin,
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }

    pub fn width(&self) -> usize {
        (self.x_max - self.x_min + 1).max(0) as usize
    }

    pub fn height(&self) -> usize {
        (self.y_max - self.y_min + 1).max(0) as usize
    }

    pub fn len(&self) -> usize {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cells in composition order: column by column, top to bottom
    pub fn cells(&self) -> impl Iterator<Item = (i64, i64)> {
        let (y_min, y_max) = (self.y_min, self.y_max);
        (self.x_min..=self.x_max).flat_map(move |x| (y_min..=y_max).map(move |y| (x, y)))
    }
}

/// Destination rect that scales an image to cover `rect`, centered.
/// For a square `rect` this is the square crop-to-fill.
pub fn cover_fit(image_width: u32, image_height: u32, rect: Rect) -> Rect {
    let iw = f64::from(image_width.max(1));
    let ih = f64::from(image_height.max(1));
    let k = (rect.w / iw).max(rect.h / ih);
    let dw = iw * k;
    let dh = ih * k;
    Rect::new(rect.x + (rect.w - dw) / 2.0, rect.y + (rect.h - dh) / 2.0, dw, dh)
}

/// Pointer proximity in `[0, 1]`: 1 at the panel center, falling off
/// linearly to 0 at `reach` panel sizes away.
pub fn hover_intensity(panel_center: DVec2, panel_size: f64, pointer: Option<DVec2>, reach: f64) -> f64 {
    let Some(pointer) = pointer else {
        return 0.0;
    };
    let falloff = reach * panel_size;
    if falloff <= 0.0 {
        return 0.0;
    }
    1.0 - (panel_center.distance(pointer) / falloff).min(1.0)
}
