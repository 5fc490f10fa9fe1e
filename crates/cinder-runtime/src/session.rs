//! Session control: the pause flag and simulation speed the pipeline reads
//! once per frame.
//!
//! [`SimulationControl`] is a plain value so the accumulator step stays a pure
//! function of it. [`SessionControl`] is the shared handle systems receive as
//! a resource so input handling can pause mid-frame.

use cinder_core::{CinderError, Result};
use std::cell::Cell;
use std::rc::Rc;

/// Snapshot of the session state gating the fixed-step loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationControl {
    pub paused: bool,
    /// Multiplier applied to frame delta before it reaches the accumulator
    pub speed: f64,
}

impl SimulationControl {
    pub fn running() -> Self {
        Self {
            paused: false,
            speed: 1.0,
        }
    }

    pub fn paused() -> Self {
        Self {
            paused: true,
            speed: 1.0,
        }
    }

    /// Seconds of simulation time a frame of `delta` seconds contributes
    pub fn scaled_delta(&self, delta: f64) -> f64 {
        if self.paused {
            0.0
        } else {
            delta * self.speed
        }
    }
}

impl Default for SimulationControl {
    fn default() -> Self {
        Self::running()
    }
}

/// Shared, single-threaded handle to the live [`SimulationControl`]
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    inner: Rc<Cell<SimulationControl>>,
}

impl SessionControl {
    pub fn new(control: SimulationControl) -> Self {
        Self {
            inner: Rc::new(Cell::new(control)),
        }
    }

    /// Current state, copied out
    pub fn snapshot(&self) -> SimulationControl {
        self.inner.get()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.get().paused
    }

    pub fn set_paused(&self, paused: bool) {
        let mut control = self.inner.get();
        if control.paused != paused {
            log::info!("Session {}", if paused { "paused" } else { "resumed" });
        }
        control.paused = paused;
        self.inner.set(control);
    }

    /// Flip the pause flag, returning the new value
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.is_paused();
        self.set_paused(paused);
        paused
    }

    pub fn speed(&self) -> f64 {
        self.inner.get().speed
    }

    /// Set the simulation speed multiplier. Negative and non-finite values
    /// are rejected.
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed < 0.0 {
            log::warn!("Rejected simulation speed {}", speed);
            return Err(CinderError::InvalidSpeed(speed));
        }
        let mut control = self.inner.get();
        control.speed = speed;
        self.inner.set(control);
        log::debug!("Simulation speed set to {}", speed);
        Ok(())
    }
}
