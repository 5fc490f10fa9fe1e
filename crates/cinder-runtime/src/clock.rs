//! Wall-clock frame timer producing the variable frame delta

use std::time::{Duration, Instant};

/// Default upper bound on a single frame delta, in seconds
pub const DEFAULT_MAX_FRAME_DELTA: f64 = 0.25;

/// Measures the time between frames.
///
/// The accumulator is not kept here; the pipeline owns it so that stepping
/// stays a pure function of the delta this clock hands out.
pub struct FrameClock {
    /// Largest delta a single tick may report
    max_frame_delta: f64,
    /// Unclamped seconds since the first tick
    wall_time: f64,
    last_instant: Instant,
    first_tick: bool,
    frames: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_DELTA)
    }
}

impl FrameClock {
    pub fn new(max_frame_delta: f64) -> Self {
        Self {
            max_frame_delta,
            wall_time: 0.0,
            last_instant: Instant::now(),
            first_tick: true,
            frames: 0,
        }
    }

    /// Advance the clock and return the clamped frame delta. Call once per
    /// frame; the first call returns 0.
    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    /// Advance the clock to a given instant
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        self.frames += 1;

        if self.first_tick {
            self.first_tick = false;
            self.last_instant = now;
            return 0.0;
        }

        let elapsed = now.saturating_duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.wall_time += elapsed;

        if elapsed > self.max_frame_delta {
            log::debug!(
                "Frame took {:.1} ms, clamped to {:.1} ms",
                elapsed * 1000.0,
                self.max_frame_delta * 1000.0
            );
        }
        elapsed.min(self.max_frame_delta)
    }

    /// Time left until the next frame is due at `target_fps`, if any
    pub fn remaining_in_frame(&self, target_fps: f64) -> Option<Duration> {
        if target_fps <= 0.0 || self.first_tick {
            return None;
        }
        let budget = Duration::from_secs_f64(1.0 / target_fps);
        budget.checked_sub(self.last_instant.elapsed())
    }

    pub fn max_frame_delta(&self) -> f64 {
        self.max_frame_delta
    }

    pub fn wall_time(&self) -> f64 {
        self.wall_time
    }

    /// Number of ticks so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
