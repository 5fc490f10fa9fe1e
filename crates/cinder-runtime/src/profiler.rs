//! Rolling per-system timing statistics
//!
//! Each profiled name owns a fixed-capacity ring of millisecond samples.
//! Buffers are allocated once when a name is first seen; recording and
//! querying never allocate afterwards.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Samples kept per profiled name
pub const HISTORY_CAPACITY: usize = 600;

/// Ring buffer of the most recent samples for one name
pub struct ProfilerHistory {
    samples: Box<[f64; HISTORY_CAPACITY]>,
    scratch: Box<[f64; HISTORY_CAPACITY]>,
    count: usize,
    index: usize,
}

impl ProfilerHistory {
    pub fn new() -> Self {
        Self {
            samples: Box::new([0.0; HISTORY_CAPACITY]),
            scratch: Box::new([0.0; HISTORY_CAPACITY]),
            count: 0,
            index: 0,
        }
    }

    /// Push a sample, evicting the oldest once full
    pub fn add(&mut self, value: f64) {
        self.samples[self.index] = value;
        self.index = (self.index + 1) % HISTORY_CAPACITY;
        if self.count < HISTORY_CAPACITY {
            self.count += 1;
        }
    }

    /// Number of valid samples
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Most recently recorded sample
    pub fn latest(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let last = (self.index + HISTORY_CAPACITY - 1) % HISTORY_CAPACITY;
        Some(self.samples[last])
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let sum: f64 = self.samples[..self.count].iter().sum();
        sum / self.count as f64
    }

    /// Sample at the given percentile, `percentile` in `[0, 1]`.
    ///
    /// Sorts a reusable scratch copy of the valid samples and selects by
    /// ceiling-rounded rank.
    pub fn percentile(&mut self, percentile: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }

        let valid = &mut self.scratch[..self.count];
        valid.copy_from_slice(&self.samples[..self.count]);
        valid.sort_unstable_by(f64::total_cmp);

        let rank = (percentile * self.count as f64).ceil() as isize - 1;
        let index = rank.clamp(0, self.count as isize - 1) as usize;
        valid[index]
    }
}

impl Default for ProfilerHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Records wall-clock duration of system invocations by name
pub struct Profiler {
    histories: HashMap<String, ProfilerHistory>,
    enabled: bool,
}

impl Profiler {
    pub fn new() -> Self {
        Self {
            histories: HashMap::new(),
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Time `f` and record its duration under `name`
    pub fn profile<R>(&mut self, name: &str, f: impl FnOnce() -> R) -> R {
        if !self.enabled {
            return f();
        }
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed());
        result
    }

    pub fn record(&mut self, name: &str, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        let ms = elapsed.as_secs_f64() * 1000.0;
        match self.histories.get_mut(name) {
            Some(history) => history.add(ms),
            None => {
                let mut history = ProfilerHistory::new();
                history.add(ms);
                self.histories.insert(name.to_string(), history);
            }
        }
    }

    /// Drop the history for `name`; it is recreated on next use
    pub fn remove(&mut self, name: &str) {
        self.histories.remove(name);
    }

    pub fn history(&self, name: &str) -> Option<&ProfilerHistory> {
        self.histories.get(name)
    }

    pub fn history_mut(&mut self, name: &str) -> Option<&mut ProfilerHistory> {
        self.histories.get_mut(name)
    }

    /// Names currently tracked, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.histories.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ProfilerHistory)> {
        self.histories.iter_mut().map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Smoothed frame rate and last frame time for diagnostics
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    fps: f64,
    frame_time_ms: f64,
}

impl FrameStats {
    const SMOOTHING: f64 = 0.95;

    pub fn record_frame(&mut self, delta: f64) {
        if delta > 0.000_001 {
            let current = 1.0 / delta;
            self.fps = self.fps * Self::SMOOTHING + current * (1.0 - Self::SMOOTHING);
        }
        self.frame_time_ms = delta * 1000.0;
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_time_ms(&self) -> f64 {
        self.frame_time_ms
    }
}
