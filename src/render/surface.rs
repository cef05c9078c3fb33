//! Draw commands and the surface that receives them.

use crate::cache::DecodedImage;
use crate::color::Rgba;
use glam::DVec2;
use std::sync::Arc;

/// Axis-aligned rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn min(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn max(&self) -> DVec2 {
        DVec2::new(self.x + self.w, self.y + self.h)
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Strict containment, edges excluded
    pub fn contains(&self, p: DVec2) -> bool {
        self.x < p.x && p.x < self.x + self.w && self.y < p.y && p.y < self.y + self.h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBaseline {
    Middle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Font size in pixels
    pub size: f64,
    pub bold: bool,
    pub color: Rgba,
    pub align: TextAlign,
    pub baseline: TextBaseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Overlay,
}

/// One drawing primitive. Clips nest: every `PushClip` is matched by a
/// `PopClip` within the same cell.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    Clear(Rgba),
    PushClip {
        rect: Rect,
        radius: f64,
    },
    PopClip,
    FillRoundedRect {
        rect: Rect,
        radius: f64,
        color: Rgba,
    },
    FillRect {
        rect: Rect,
        color: Rgba,
        blend: BlendMode,
    },
    Text {
        text: String,
        pos: DVec2,
        style: TextStyle,
    },
    /// Blit scaled into `dest`; `dest` may overhang the clip
    Image {
        image: Arc<DecodedImage>,
        dest: Rect,
    },
    /// Vertical gradient from `top` to `bottom`
    LinearGradient {
        rect: Rect,
        top: Rgba,
        bottom: Rgba,
    },
}

/// Render target. The size is logical pixels, matching input coordinates.
pub trait Surface {
    fn size(&self) -> DVec2;
    fn draw(&mut self, command: DrawCommand);
}

/// Surface that records commands instead of drawing them
#[derive(Debug, Default)]
pub struct RecordingSurface {
    size: DVec2,
    pub commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: DVec2::new(width, height),
            commands: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.size = DVec2::new(width, height);
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// All text drawn, in order
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Image { .. }))
            .count()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> DVec2 {
        self.size
    }

    fn draw(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_contains_excludes_edges() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(DVec2::new(5.0, 5.0)));
        assert!(!rect.contains(DVec2::new(0.0, 5.0)));
    }
}
