//! Camera-related constants.

/// Initial camera position (grid units), so cell (0, 0) sits centered
pub const CAMERA_START_X: f64 = 0.5;
/// Initial camera position (grid units)
pub const CAMERA_START_Y: f64 = 0.5;
/// Upper bound on pixels per grid cell
pub const CAMERA_MAX_SCALE: f64 = 300.0;
/// Devices whose larger dimension is at most this are "small" (pixels)
pub const SMALL_DEVICE_MAX_DIMENSION: f64 = 800.0;
/// Minimum scale divisor on small devices (min_scale = wmin / divisor)
pub const SMALL_DEVICE_MIN_SCALE_DIVISOR: f64 = 4.0;
/// Minimum scale divisor on everything else
pub const MIN_SCALE_DIVISOR: f64 = 7.0;
/// Initial scale divisor on small devices (scale = wmin / divisor)
pub const SMALL_DEVICE_START_SCALE_DIVISOR: f64 = 2.5;
/// Initial scale divisor on everything else
pub const START_SCALE_DIVISOR: f64 = 3.0;
/// Per-frame velocity retention (lower = more friction)
pub const CAMERA_FRICTION: f64 = 0.95;
/// Velocity magnitude below which a component snaps to zero
pub const CAMERA_VELOCITY_EPSILON: f64 = 1e-4;
/// Scale multiplier per wheel zoom tick
pub const CAMERA_ZOOM_FACTOR: f64 = 1.02;
