//! Cell composition constants.
//!
//! Lengths ending in `_CELLS` are fractions of one grid cell.

use crate::color::Rgba;

pub const BACKGROUND_COLOR: Rgba = Rgba::BLACK;
pub const PANEL_COLOR: Rgba = Rgba::rgb(0x21, 0x21, 0x21);
pub const LABEL_COLOR: Rgba = Rgba::rgb(0x61, 0x61, 0x61);
/// Behind an image until it has loaded
pub const IMAGE_PLACEHOLDER_COLOR: Rgba = Rgba::rgb(0x42, 0x42, 0x42);

/// Cells drawn beyond each viewport edge
pub const VISIBLE_MARGIN_CELLS: i64 = 2;
/// Gap between a cell's panel and its bounds
pub const CELL_SPACING: f64 = 0.025;
/// Panel corner radius
pub const CELL_RADIUS: f64 = 0.05;
/// Zoomed out when scale <= wmin / divisor
pub const ZOOMED_OUT_DIVISOR: f64 = 4.0;
/// Pan speed multiplier damping the requested image resolution
pub const PAN_SPEED_RESOLUTION_DAMPING: f64 = 64.0;
/// Hover lift in pixels (normal, zoomed out)
pub const HOVER_LIFT: (f64, f64) = (4.0, 8.0);
/// Hover overlay alpha (normal, zoomed out)
pub const HOVER_ALPHA: (f64, f64) = (0.25, 0.5);
/// Label font size divisor (px = scale / divisor)
pub const LABEL_FONT_DIVISOR: f64 = 15.0;
/// Title font size divisor
pub const TITLE_FONT_DIVISOR: f64 = 12.0;
/// Subtitle font size divisor
pub const SUBTITLE_FONT_DIVISOR: f64 = 16.0;
/// Gradient overlay alpha at the bottom of a captioned image
pub const CAPTION_GRADIENT_ALPHA: f64 = 0.35;
/// Title baseline offset above the subtitle
pub const TITLE_OVER_SUBTITLE_CELLS: f64 = 0.1;
