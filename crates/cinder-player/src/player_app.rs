//! Headless player application
//!
//! Builds the engine from config, then runs the frame loop with a wall
//! clock until the frame budget is spent or exit is requested.

use crate::demo::{register_demo, DemoPhysics, DemoScript, Mover};
use crate::headless::{ConsoleInspector, HeadlessTarget};
use cinder_runtime::{
    Engine, EngineConfig, FrameClock, FramePipeline, RegistryBuilder, Result, SessionControl,
};

/// Run-time options that do not live in the config file
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// Stop after this many frames; `None` runs until exit is requested
    pub frames: Option<u64>,
    /// Target frame rate for pacing; 0 runs unthrottled
    pub target_fps: f64,
    pub script: DemoScript,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            frames: Some(600),
            target_fps: 60.0,
            script: DemoScript {
                pause_frames: 30,
                ..DemoScript::default()
            },
        }
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub crashed: bool,
    pub simulated_seconds: f64,
    /// Smoothed frame rate at the end of the run
    pub fps: f64,
    /// Duration of the last frame
    pub frame_time_ms: f64,
}

/// One line of the end-of-run profile
#[derive(Debug, Clone)]
pub struct ProfileRow {
    pub name: String,
    pub samples: usize,
    pub average_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

pub struct PlayerApp {
    engine: Engine,
    clock: FrameClock,
    target: HeadlessTarget,
    options: PlayerOptions,
    frames: u64,
}

impl PlayerApp {
    pub fn new(config: &EngineConfig, options: PlayerOptions) -> Result<Self> {
        config.validate()?;

        let session = SessionControl::new(config.session.control());
        let mut builder = RegistryBuilder::new();
        builder
            .with_profiler(config.profiler.enabled)
            .add_resource(session.clone())
            .add_resource(options.script.clone());
        register_demo(&mut builder);
        let registry = builder.initialize()?;

        let pipeline = FramePipeline::new(registry, session, config.timing.fixed_step())?
            .with_max_steps_per_frame(config.timing.max_steps_per_frame);
        let mut engine = Engine::new(pipeline)
            .with_hooks(DemoPhysics::default())
            .with_inspector(ConsoleInspector::default());
        engine.load_scene()?;

        Ok(Self {
            engine,
            clock: FrameClock::new(config.timing.max_frame_delta),
            target: HeadlessTarget::default(),
            options,
            frames: 0,
        })
    }

    /// Drive frames with the wall clock
    pub fn run(&mut self) -> Result<RunSummary> {
        log::info!(
            "Running {} at {} fps",
            match self.options.frames {
                Some(n) => format!("{} frames", n),
                None => "until exit".to_string(),
            },
            self.options.target_fps
        );

        while !self.finished() {
            let delta = self.clock.tick();
            self.step(delta)?;
            if let Some(wait) = self.clock.remaining_in_frame(self.options.target_fps) {
                std::thread::sleep(wait);
            }
        }
        Ok(self.summary())
    }

    /// Run one update and draw with a given delta
    pub fn step(&mut self, delta: f64) -> Result<()> {
        self.frames += 1;
        self.engine.update(delta)?;

        if let Ok(mover) = self.engine.registry().get_system::<Mover>() {
            if let Ok(mover) = mover.get() {
                self.target.set_camera(mover.position);
            }
        }
        self.target.begin_frame();
        self.engine.draw(delta, &mut self.target)
    }

    fn finished(&self) -> bool {
        self.engine.exit_requested() || self.options.frames.is_some_and(|n| self.frames >= n)
    }

    pub fn summary(&self) -> RunSummary {
        let pipeline = self.engine.pipeline();
        RunSummary {
            frames: self.frames,
            crashed: self.engine.is_crashed(),
            simulated_seconds: pipeline.elapsed(),
            fps: pipeline.stats().fps(),
            frame_time_ms: pipeline.stats().frame_time_ms(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn target(&self) -> &HeadlessTarget {
        &self.target
    }

    /// Timing summary for every profiled name, sorted by name
    pub fn profile_report(&mut self) -> Vec<ProfileRow> {
        let profiler = self.engine.registry_mut().profiler_mut();
        let mut rows: Vec<ProfileRow> = profiler
            .iter_mut()
            .map(|(name, history)| ProfileRow {
                name: name.to_string(),
                samples: history.len(),
                average_ms: history.average(),
                p90_ms: history.percentile(0.9),
                p99_ms: history.percentile(0.99),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }
}
