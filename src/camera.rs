//! Camera: pan/zoom/velocity state and the grid-to-pixel transform.
//!
//! Grid coordinates are continuous; cell `(x, y)` covers `[x, x+1) × [y, y+1)`.
//! The camera position is the grid point shown at the viewport center.

use crate::constants::*;
use glam::DVec2;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: DVec2,
    scale: f64,
    pub pan_velocity: DVec2,
    pub scale_velocity: f64,
    pub friction: f64,
    min_scale: f64,
    max_scale: f64,
    zoom_factor: f64,
    viewport: DVec2,
}

impl Camera {
    pub fn new(viewport_width: f64, viewport_height: f64, min_scale: f64, max_scale: f64) -> Self {
        Self {
            position: DVec2::new(CAMERA_START_X, CAMERA_START_Y),
            scale: min_scale,
            pan_velocity: DVec2::ZERO,
            scale_velocity: 0.0,
            friction: CAMERA_FRICTION,
            min_scale,
            max_scale,
            zoom_factor: CAMERA_ZOOM_FACTOR,
            viewport: DVec2::new(viewport_width, viewport_height),
        }
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_zoom_factor(mut self, zoom_factor: f64) -> Self {
        self.zoom_factor = zoom_factor;
        self
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport = DVec2::new(width, height);
    }

    pub fn viewport(&self) -> DVec2 {
        self.viewport
    }

    pub fn viewport_center(&self) -> DVec2 {
        self.viewport * 0.5
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn scale_limits(&self) -> (f64, f64) {
        (self.min_scale, self.max_scale)
    }

    /// Set the scale, clamped into `[min_scale, max_scale]`.
    /// Every scale mutation goes through here.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = self.clamp_scale(scale);
    }

    pub fn clamp_scale(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.min_scale;
        }
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Apply one frame of inertia.
    ///
    /// While a touch pan is held the finger owns the position, so only the
    /// scale component moves.
    pub fn apply_inertia_step(&mut self, touch_panning: bool) {
        self.set_scale(self.scale + self.scale_velocity);
        if !touch_panning {
            self.position += self.pan_velocity;
            self.pan_velocity *= self.friction;
        }
        self.scale_velocity *= self.friction;

        if self.pan_velocity.x.abs() < CAMERA_VELOCITY_EPSILON {
            self.pan_velocity.x = 0.0;
        }
        if self.pan_velocity.y.abs() < CAMERA_VELOCITY_EPSILON {
            self.pan_velocity.y = 0.0;
        }
        if self.scale_velocity.abs() < CAMERA_VELOCITY_EPSILON {
            self.scale_velocity = 0.0;
        }
    }

    /// Direct drag: the camera moves opposite to the pointer, measured from
    /// where the drag started. `movement` is the last per-event pointer delta
    /// and becomes the release velocity.
    pub fn set_from_drag(&mut self, initial_position: DVec2, drag: DVec2, movement: DVec2) {
        self.position = initial_position - drag / self.scale;
        self.pan_velocity = -movement / self.scale;
        self.scale_velocity = 0.0;
    }

    /// Incremental pan by a pixel delta, recorded as velocity
    pub fn pan_by(&mut self, delta: DVec2) {
        self.pan_velocity = delta / self.scale;
        self.position += self.pan_velocity;
        self.scale_velocity = 0.0;
    }

    /// One zoom tick. The applied delta becomes the release velocity.
    pub fn set_from_zoom_delta(&mut self, zoom_in: bool) {
        let old_scale = self.scale;
        if zoom_in {
            self.set_scale(self.scale * self.zoom_factor);
        } else {
            self.set_scale(self.scale / self.zoom_factor);
        }
        self.scale_velocity = self.scale - old_scale;
        self.pan_velocity = DVec2::ZERO;
    }

    pub fn stop(&mut self) {
        self.pan_velocity = DVec2::ZERO;
        self.scale_velocity = 0.0;
    }

    /// Move to the center of a cell and stop all motion
    pub fn recenter(&mut self, x: f64, y: f64) {
        self.position = DVec2::new(x + 0.5, y + 0.5);
        self.stop();
    }

    pub fn is_at_rest(&self) -> bool {
        self.pan_velocity == DVec2::ZERO && self.scale_velocity == 0.0
    }

    pub fn grid_to_screen(&self, grid: DVec2) -> DVec2 {
        (grid - self.position) * self.scale + self.viewport_center()
    }

    pub fn screen_to_grid(&self, screen: DVec2) -> DVec2 {
        (screen - self.viewport_center()) / self.scale + self.position
    }

    /// Integer cell under the viewport center
    pub fn cell_position(&self) -> (i64, i64) {
        (self.position.x.floor() as i64, self.position.y.floor() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        let mut camera = Camera::new(800.0, 600.0, 50.0, 300.0);
        camera.set_scale(100.0);
        camera
    }

    #[test]
    fn test_scale_clamped_on_every_mutation() {
        let mut camera = camera();
        camera.set_scale(1e9);
        assert_eq!(camera.scale(), 300.0);
        camera.set_scale(-5.0);
        assert_eq!(camera.scale(), 50.0);
        camera.set_scale(f64::NAN);
        assert_eq!(camera.scale(), 50.0);

        for _ in 0..500 {
            camera.set_from_zoom_delta(true);
            assert!(camera.scale() <= 300.0);
        }
        for _ in 0..500 {
            camera.set_from_zoom_delta(false);
            assert!(camera.scale() >= 50.0);
        }

        camera.scale_velocity = 1_000.0;
        camera.apply_inertia_step(false);
        assert_eq!(camera.scale(), 300.0);
        camera.scale_velocity = -1_000.0;
        camera.apply_inertia_step(false);
        assert_eq!(camera.scale(), 50.0);
    }

    #[test]
    fn test_inertia_idempotent_at_rest() {
        let mut camera = camera();
        camera.position = DVec2::new(3.25, -7.5);
        let before = camera.clone();
        for _ in 0..10 {
            camera.apply_inertia_step(false);
        }
        assert_eq!(camera.position, before.position);
        assert_eq!(camera.scale(), before.scale());
        assert!(camera.is_at_rest());
    }

    #[test]
    fn test_inertia_decays_to_exact_zero() {
        let mut camera = camera();
        camera.pan_velocity = DVec2::new(0.5, -0.25);
        camera.scale_velocity = 2.0;
        let mut frames = 0;
        while !camera.is_at_rest() {
            camera.apply_inertia_step(false);
            frames += 1;
            assert!(frames < 1_000, "inertia never settled");
        }
        assert_eq!(camera.pan_velocity, DVec2::ZERO);
        assert_eq!(camera.scale_velocity, 0.0);
    }

    #[test]
    fn test_touch_panning_holds_position() {
        let mut camera = camera();
        camera.pan_velocity = DVec2::new(1.0, 0.0);
        camera.apply_inertia_step(true);
        assert_eq!(camera.position, DVec2::new(0.5, 0.5));
        assert_eq!(camera.pan_velocity, DVec2::new(1.0, 0.0));
    }

    #[test]
    fn test_drag_moves_opposite_to_pointer() {
        let mut camera = camera();
        let start = camera.position;
        camera.scale_velocity = 3.0;
        camera.set_from_drag(start, DVec2::new(200.0, -100.0), DVec2::new(10.0, 0.0));
        assert_eq!(camera.position, DVec2::new(-1.5, 1.5));
        assert_eq!(camera.pan_velocity, DVec2::new(-0.1, 0.0));
        assert_eq!(camera.scale_velocity, 0.0);
    }

    #[test]
    fn test_zoom_records_delta_as_velocity() {
        let mut camera = camera();
        camera.pan_velocity = DVec2::new(1.0, 1.0);
        camera.set_from_zoom_delta(true);
        assert!((camera.scale() - 102.0).abs() < 1e-9);
        assert!((camera.scale_velocity - 2.0).abs() < 1e-9);
        assert_eq!(camera.pan_velocity, DVec2::ZERO);
    }

    #[test]
    fn test_transform_round_trip_and_center() {
        let camera = camera();
        let center = camera.grid_to_screen(camera.position);
        assert_eq!(center, DVec2::new(400.0, 300.0));
        let p = camera.screen_to_grid(DVec2::new(0.0, 0.0));
        assert_eq!(p, DVec2::new(-3.5, -2.5));
    }

    #[test]
    fn test_cell_position_floors_negative() {
        let mut camera = camera();
        camera.position = DVec2::new(-0.25, 2.75);
        assert_eq!(camera.cell_position(), (-1, 2));
        camera.recenter(10.0, -4.0);
        assert_eq!(camera.cell_position(), (10, -4));
    }
}
