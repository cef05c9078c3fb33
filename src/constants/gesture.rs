//! Gesture timing and momentum constants.

use std::time::Duration;

/// Window after a touch-end during which a second touch starts a tap-zoom
pub const TAP_ARM_WINDOW: Duration = Duration::from_millis(200);
/// Tap-zoom gestures shorter than this trigger the zoom ease on release
pub const TAP_ZOOM_QUICK_RELEASE: Duration = Duration::from_millis(200);
/// Pan momentum is suppressed for this long after the last pinch update
pub const PINCH_LOCK_WINDOW: Duration = Duration::from_millis(200);
/// Pinch release momentum multiplier on the last per-tick scale delta
pub const PINCH_MOMENTUM_SCALE: f64 = 10.0;
/// Tap-drag release momentum multiplier on the last vertical delta
pub const TAP_DRAG_MOMENTUM_SCALE: f64 = 0.05;
/// Number of steps in the tap-zoom ease
pub const ZOOM_EASE_STEPS: u32 = 24;
/// Delay between tap-zoom ease steps
pub const ZOOM_EASE_INTERVAL: Duration = Duration::from_millis(20);
/// Fraction of the remaining distance covered by each ease step
pub const ZOOM_EASE_DIVISOR: f64 = 3.0;
/// Tap-zoom target scale divisor (target = wmin / divisor)
pub const ZOOM_EASE_TARGET_DIVISOR: f64 = 2.5;
