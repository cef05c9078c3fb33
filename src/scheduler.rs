//! Frame cadence and the periodic cache janitor.
//!
//! Nothing here sleeps or spawns timers. The host asks when the next frame or
//! janitor tick is due and calls back in with the current time.

use crate::cache::{EvictionReport, ImageCache};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Periodic eviction sweep, independent of the frame rate
#[derive(Debug, Clone)]
pub struct CacheJanitor {
    interval: Duration,
    next_due: Option<Instant>,
    ticks: u64,
}

impl CacheJanitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// When the next sweep is due; `None` until the janitor has been polled
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Whether a sweep is due at `now`. The first poll only starts the
    /// timer; missed intervals collapse into a single sweep.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            None => {
                self.next_due = Some(now + self.interval);
                false
            }
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                self.ticks += 1;
                true
            }
            Some(_) => false,
        }
    }

    /// Sweep `cache` if due
    pub fn tick(&mut self, cache: &mut ImageCache, now: Instant) -> Option<EvictionReport> {
        if !self.poll(now) {
            return None;
        }
        puffin::profile_function!();
        let report = cache.evict(now);
        if report.evicted > 0 {
            info!(
                "janitor evicted {} entries ({:?} pass), {} remain",
                report.evicted, report.pass, report.remaining
            );
        }
        Some(report)
    }
}

/// Timing of one frame handed out by [`FrameScheduler::begin_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub index: u64,
    /// Time since the previous frame, zero for the first
    pub dt: Duration,
}

/// Frame bookkeeping for hosts that drive their own loop
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    frame_interval: Duration,
    last_frame: Option<Instant>,
    frames: u64,
    janitor: CacheJanitor,
}

impl FrameScheduler {
    pub fn new(frame_interval: Duration, janitor_interval: Duration) -> Self {
        Self {
            frame_interval,
            last_frame: None,
            frames: 0,
            janitor: CacheJanitor::new(janitor_interval),
        }
    }

    pub fn begin_frame(&mut self, now: Instant) -> FrameTiming {
        let dt = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);
        let index = self.frames;
        self.frames += 1;
        if dt > self.frame_interval * 4 {
            debug!("slow frame {index}: {dt:?}");
        }
        FrameTiming { index, dt }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Earliest of the next frame and the next janitor sweep
    pub fn next_wakeup(&self, now: Instant) -> Instant {
        let next_frame = self.last_frame.map_or(now, |last| last + self.frame_interval);
        match self.janitor.next_due() {
            Some(due) => next_frame.min(due),
            None => next_frame,
        }
    }

    pub fn janitor(&self) -> &CacheJanitor {
        &self.janitor
    }

    pub fn janitor_mut(&mut self) -> &mut CacheJanitor {
        &mut self.janitor
    }
}
