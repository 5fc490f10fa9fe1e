//! Per-dispatch timing snapshot

/// Timing handed to every stage invocation.
///
/// Built fresh for each stage-group dispatch: fixed-rate stages see the fixed
/// step as `delta_time` and an alpha of 1, frame stages see the variable
/// frame delta and the current interpolation alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    delta_time: f64,
    alpha: f64,
    elapsed: f64,
}

impl Timing {
    pub fn new(delta_time: f64, alpha: f64, elapsed: f64) -> Self {
        Self {
            delta_time,
            alpha,
            elapsed,
        }
    }

    /// Seconds covered by this invocation
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Fraction between the last completed fixed step and the next one
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Monotonic accumulated frame time in seconds
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Linear blend between a previous and current value using `alpha`
    pub fn interpolate(&self, previous: f64, current: f64) -> f64 {
        previous + (current - previous) * self.alpha
    }
}
