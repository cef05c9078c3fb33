//! Input state machine: mouse drag, wheel, touch pan, pinch, double-tap zoom
//! and trackpad gestures, all turned into camera mutations.
//!
//! Timers are deadlines checked against the `now` passed to every handler, so
//! the controller never reads the clock itself.

use crate::camera::Camera;
use crate::constants::*;
use glam::DVec2;
use std::time::Instant;
use tracing::trace;

/// Host input, in logical pixels
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { pos: DVec2 },
    PointerMove { pos: DVec2 },
    PointerUp,
    /// `modifier` is ctrl/cmd held; it turns the wheel into zoom
    Wheel { delta: DVec2, modifier: bool },
    /// `touches` lists every finger currently down
    TouchStart { touches: Vec<DVec2> },
    TouchMove { touches: Vec<DVec2> },
    /// `touches` lists the fingers still down after the release
    TouchEnd { touches: Vec<DVec2> },
    PlatformGestureStart,
    /// `scale` is the cumulative factor since the gesture started
    PlatformGestureChange { scale: f64 },
    PlatformGestureEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinchSource {
    /// Two fingers; `anchor` is the grid point under their initial center
    Touch { initial_distance: f64, anchor: DVec2 },
    Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    MousePanning {
        start: DVec2,
        initial_position: DVec2,
        last: DVec2,
    },
    TouchPanning {
        last: DVec2,
    },
    Pinching {
        source: PinchSource,
        initial_scale: f64,
        last_scale: f64,
        /// Scale change of the latest update
        last_delta: f64,
    },
    TapZooming {
        start_y: f64,
        initial_scale: f64,
        last_y: f64,
        /// Upward movement of the latest update, in pixels
        last_delta: f64,
        started_at: Instant,
    },
}

/// Stepwise ease toward the tap-zoom target
#[derive(Debug, Clone, Copy, PartialEq)]
struct ZoomEase {
    steps_left: u32,
    next_step_at: Instant,
    target: f64,
}

#[derive(Debug, Clone)]
pub struct GestureController {
    state: GestureState,
    /// A single-touch start before this deadline begins a tap-zoom
    tap_armed_until: Option<Instant>,
    /// Touch-pan release momentum is dropped before this deadline
    pinch_lock_until: Option<Instant>,
    ease: Option<ZoomEase>,
    tap_zoom_target: f64,
    pointer: Option<DVec2>,
}

impl GestureController {
    pub fn new(tap_zoom_target: f64) -> Self {
        Self {
            state: GestureState::Idle,
            tap_armed_until: None,
            pinch_lock_until: None,
            ease: None,
            tap_zoom_target,
            pointer: None,
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    /// Last known pointer position, `None` before the first pointer event
    pub fn pointer(&self) -> Option<DVec2> {
        self.pointer
    }

    pub fn is_mouse_panning(&self) -> bool {
        matches!(self.state, GestureState::MousePanning { .. })
    }

    pub fn is_touch_panning(&self) -> bool {
        matches!(self.state, GestureState::TouchPanning { .. })
    }

    pub fn is_easing(&self) -> bool {
        self.ease.is_some()
    }

    fn tap_armed(&self, now: Instant) -> bool {
        self.tap_armed_until.is_some_and(|deadline| now < deadline)
    }

    fn pinch_locked(&self, now: Instant) -> bool {
        self.pinch_lock_until.is_some_and(|deadline| now < deadline)
    }

    pub fn handle(&mut self, event: InputEvent, camera: &mut Camera, now: Instant) {
        match event {
            InputEvent::PointerDown { pos } => {
                self.pointer = Some(pos);
                self.ease = None;
                camera.stop();
                self.state = GestureState::MousePanning {
                    start: pos,
                    initial_position: camera.position,
                    last: pos,
                };
            }
            InputEvent::PointerMove { pos } => {
                self.pointer = Some(pos);
                if let GestureState::MousePanning {
                    start,
                    initial_position,
                    last,
                } = &mut self.state
                {
                    camera.set_from_drag(*initial_position, pos - *start, pos - *last);
                    *last = pos;
                }
            }
            InputEvent::PointerUp => {
                if self.is_mouse_panning() {
                    self.state = GestureState::Idle;
                }
            }
            InputEvent::Wheel { delta, modifier } => {
                self.ease = None;
                if modifier {
                    camera.set_from_zoom_delta(delta.y < 0.0);
                } else {
                    camera.pan_by(delta);
                }
            }
            InputEvent::TouchStart { touches } => self.touch_start(&touches, camera, now),
            InputEvent::TouchMove { touches } => self.touch_move(&touches, camera, now),
            InputEvent::TouchEnd { touches } => self.touch_end(&touches, camera, now),
            InputEvent::PlatformGestureStart => {
                self.ease = None;
                camera.pan_velocity = DVec2::ZERO;
                self.state = GestureState::Pinching {
                    source: PinchSource::Platform,
                    initial_scale: camera.scale(),
                    last_scale: camera.scale(),
                    last_delta: 0.0,
                };
            }
            InputEvent::PlatformGestureChange { scale: factor } => {
                if let GestureState::Pinching {
                    source: PinchSource::Platform,
                    initial_scale,
                    last_scale,
                    last_delta,
                } = &mut self.state
                {
                    camera.set_scale(*initial_scale * factor);
                    *last_delta = camera.scale() - *last_scale;
                    *last_scale = camera.scale();
                    self.pinch_lock_until = Some(now + PINCH_LOCK_WINDOW);
                }
            }
            InputEvent::PlatformGestureEnd => {
                if let GestureState::Pinching {
                    source: PinchSource::Platform,
                    last_delta,
                    ..
                } = self.state
                {
                    camera.scale_velocity = last_delta * PINCH_MOMENTUM_SCALE;
                    camera.pan_velocity = DVec2::ZERO;
                    self.state = GestureState::Idle;
                }
            }
        }
    }

    fn touch_start(&mut self, touches: &[DVec2], camera: &mut Camera, now: Instant) {
        let Some(&first) = touches.first() else {
            return;
        };
        self.pointer = Some(first);
        self.ease = None;

        if let [a, b, ..] = touches {
            let center = (*a + *b) / 2.0;
            camera.stop();
            self.state = GestureState::Pinching {
                source: PinchSource::Touch {
                    initial_distance: a.distance(*b),
                    anchor: camera.screen_to_grid(center),
                },
                initial_scale: camera.scale(),
                last_scale: camera.scale(),
                last_delta: 0.0,
            };
        } else if self.tap_armed(now) {
            self.tap_armed_until = None;
            camera.stop();
            self.state = GestureState::TapZooming {
                start_y: first.y,
                initial_scale: camera.scale(),
                last_y: first.y,
                last_delta: 0.0,
                started_at: now,
            };
        } else {
            camera.scale_velocity = 0.0;
            self.state = GestureState::TouchPanning { last: first };
        }
    }

    fn touch_move(&mut self, touches: &[DVec2], camera: &mut Camera, now: Instant) {
        let Some(&first) = touches.first() else {
            return;
        };
        self.pointer = Some(first);

        match &mut self.state {
            GestureState::TouchPanning { last } => {
                camera.pan_by(*last - first);
                *last = first;
            }
            GestureState::Pinching {
                source: PinchSource::Touch {
                    initial_distance,
                    anchor,
                },
                initial_scale,
                last_scale,
                last_delta,
            } => {
                let [a, b, ..] = touches else {
                    return;
                };
                if *initial_distance > 0.0 {
                    camera.set_scale(*initial_scale * a.distance(*b) / *initial_distance);
                }
                let center = (*a + *b) / 2.0;
                camera.position = *anchor - (center - camera.viewport_center()) / camera.scale();
                *last_delta = camera.scale() - *last_scale;
                *last_scale = camera.scale();
                self.pinch_lock_until = Some(now + PINCH_LOCK_WINDOW);
            }
            GestureState::TapZooming {
                start_y,
                initial_scale,
                last_y,
                last_delta,
                ..
            } => {
                camera.set_scale(*initial_scale - (first.y - *start_y));
                *last_delta = *last_y - first.y;
                *last_y = first.y;
            }
            _ => {}
        }
    }

    fn touch_end(&mut self, touches: &[DVec2], camera: &mut Camera, now: Instant) {
        let mut was_tap_zoom = false;
        match self.state {
            GestureState::Pinching {
                source: PinchSource::Touch { .. },
                last_delta,
                ..
            } => {
                if touches.len() >= 2 {
                    return;
                }
                camera.scale_velocity = last_delta * PINCH_MOMENTUM_SCALE;
                camera.pan_velocity = DVec2::ZERO;
                self.state = match touches.first() {
                    Some(&rest) => GestureState::TouchPanning { last: rest },
                    None => GestureState::Idle,
                };
            }
            GestureState::TouchPanning { .. } => {
                camera.scale_velocity = 0.0;
                if self.pinch_locked(now) {
                    camera.pan_velocity = DVec2::ZERO;
                }
                self.state = match touches.first() {
                    Some(&rest) => GestureState::TouchPanning { last: rest },
                    None => GestureState::Idle,
                };
            }
            GestureState::TapZooming {
                last_delta,
                started_at,
                ..
            } => {
                was_tap_zoom = true;
                camera.scale_velocity = last_delta * TAP_DRAG_MOMENTUM_SCALE;
                if now.saturating_duration_since(started_at) < TAP_ZOOM_QUICK_RELEASE {
                    self.start_ease(camera, now);
                }
                self.state = GestureState::Idle;
            }
            _ => {}
        }

        if !was_tap_zoom {
            self.tap_armed_until = Some(now + TAP_ARM_WINDOW);
        }
    }

    fn start_ease(&mut self, camera: &mut Camera, now: Instant) {
        trace!("tap-zoom ease toward {:.1}", self.tap_zoom_target);
        self.ease = Some(ZoomEase {
            steps_left: ZOOM_EASE_STEPS,
            next_step_at: now,
            target: camera.clamp_scale(self.tap_zoom_target),
        });
        self.tick(camera, now);
    }

    /// Advance timed animations. Runs every ease step due at `now`; returns
    /// whether an ease is still running.
    pub fn tick(&mut self, camera: &mut Camera, now: Instant) -> bool {
        while let Some(ease) = &mut self.ease {
            if ease.next_step_at > now {
                break;
            }
            camera.scale_velocity = 0.0;
            camera.set_scale(camera.scale() + (ease.target - camera.scale()) / ZOOM_EASE_DIVISOR);
            ease.steps_left -= 1;
            ease.next_step_at += ZOOM_EASE_INTERVAL;
            if ease.steps_left == 0 {
                self.ease = None;
            }
        }
        self.ease.is_some()
    }
}
