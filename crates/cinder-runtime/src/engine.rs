//! Engine facade and the failure boundary around each frame
//!
//! The first error to escape a frame moves the engine into a terminal
//! crashed state. From then on update and draw only drive the crash
//! inspector; an error from the inspector itself is returned to the caller.
//!
//! Only returned errors are captured. Panics are not caught: a panicking
//! system unwinds past the boundary and no crash report is produced.

use crate::pipeline::{FrameHooks, FramePipeline};
use crate::registry::SystemRegistry;
use crate::system::DrawTarget;
use cinder_core::{CinderError, Result};
use std::error::Error as _;
use std::fmt;

/// Which frame callback a crash happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Update,
    Draw,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePhase::Update => write!(f, "update"),
            FramePhase::Draw => write!(f, "draw"),
        }
    }
}

/// Snapshot of the fault that stopped the simulation
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub message: String,
    /// Messages of the error and each of its sources, outermost first
    pub chain: Vec<String>,
    /// Name of the system the fault was raised in, if any
    pub system: Option<String>,
    pub frame: u64,
    pub phase: FramePhase,
}

impl CrashReport {
    fn capture(error: &CinderError, frame: u64, phase: FramePhase) -> Self {
        let mut chain = vec![error.to_string()];
        let mut source = error.source();
        while let Some(inner) = source {
            chain.push(inner.to_string());
            source = inner.source();
        }

        let system = match error {
            CinderError::SystemFault { system, .. } => Some(system.clone()),
            _ => None,
        };

        Self {
            message: error.to_string(),
            chain,
            system,
            frame,
            phase,
        }
    }

    /// Innermost error message
    pub fn root_cause(&self) -> &str {
        self.chain.last().map(String::as_str).unwrap_or(&self.message)
    }
}

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Crash in {} of frame {}", self.phase, self.frame)?;
        for (depth, message) in self.chain.iter().enumerate() {
            writeln!(f, "  {}: {}", depth, message)?;
        }
        Ok(())
    }
}

/// Running / crashed state machine
#[derive(Debug, Clone, Default)]
pub enum FailureBoundary {
    #[default]
    Running,
    Crashed(CrashReport),
}

impl FailureBoundary {
    pub fn is_crashed(&self) -> bool {
        matches!(self, FailureBoundary::Crashed(_))
    }

    pub fn report(&self) -> Option<&CrashReport> {
        match self {
            FailureBoundary::Running => None,
            FailureBoundary::Crashed(report) => Some(report),
        }
    }

    /// Record a fault. Only the first one is kept.
    fn enter_crashed(&mut self, report: CrashReport) -> bool {
        if self.is_crashed() {
            return false;
        }
        log::error!("==== BEGIN FATAL CRASH ====");
        log::error!("{}", report);
        *self = FailureBoundary::Crashed(report);
        log::debug!("Entering crash inspector");
        true
    }
}

/// What the inspector wants the host loop to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorAction {
    Continue,
    Exit,
}

/// Logic that runs in place of the simulation after a crash
pub trait CrashInspector {
    /// Called once when the engine crashes
    fn activate(&mut self, _report: &CrashReport) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, report: &CrashReport, delta: f64) -> Result<InspectorAction>;

    fn draw(&mut self, _report: &CrashReport, _target: &mut dyn DrawTarget) -> Result<()> {
        Ok(())
    }
}

/// Inspector that asks the host to exit right away
#[derive(Debug, Default)]
pub struct ExitOnCrash;

impl CrashInspector for ExitOnCrash {
    fn update(&mut self, _report: &CrashReport, _delta: f64) -> Result<InspectorAction> {
        Ok(InspectorAction::Exit)
    }
}

/// Frame pipeline wrapped in the failure boundary
pub struct Engine {
    pipeline: FramePipeline,
    hooks: Box<dyn FrameHooks>,
    inspector: Box<dyn CrashInspector>,
    boundary: FailureBoundary,
    exit_requested: bool,
}

impl Engine {
    pub fn new(pipeline: FramePipeline) -> Self {
        Self {
            pipeline,
            hooks: Box::new(()),
            inspector: Box::new(ExitOnCrash),
            boundary: FailureBoundary::Running,
            exit_requested: false,
        }
    }

    pub fn with_hooks(mut self, hooks: impl FrameHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn with_inspector(mut self, inspector: impl CrashInspector + 'static) -> Self {
        self.inspector = Box::new(inspector);
        self
    }

    /// Advance one frame. Simulation faults are captured, so the only error
    /// this returns is an inspector failure after a crash.
    pub fn update(&mut self, delta: f64) -> Result<()> {
        if let FailureBoundary::Crashed(report) = &self.boundary {
            if self.inspector.update(report, delta)? == InspectorAction::Exit {
                self.exit_requested = true;
            }
            return Ok(());
        }

        let result = self.pipeline.update(delta, self.hooks.as_mut());
        if let Err(error) = result {
            self.crash(&error, FramePhase::Update)?;
        }
        Ok(())
    }

    /// Render one frame, or the inspector once crashed
    pub fn draw(&mut self, delta: f64, target: &mut dyn DrawTarget) -> Result<()> {
        if let FailureBoundary::Crashed(report) = &self.boundary {
            return self.inspector.draw(report, target);
        }

        if let Err(error) = self.pipeline.draw(delta, target) {
            self.crash(&error, FramePhase::Draw)?;
        }
        Ok(())
    }

    fn crash(&mut self, error: &CinderError, phase: FramePhase) -> Result<()> {
        let report = CrashReport::capture(error, self.pipeline.frame_index(), phase);
        if self.boundary.enter_crashed(report) {
            if let FailureBoundary::Crashed(report) = &self.boundary {
                self.inspector.activate(report)?;
            }
        }
        Ok(())
    }

    /// Notify systems of a fresh scene
    pub fn load_scene(&mut self) -> Result<()> {
        log::info!("Loading scene");
        self.pipeline.registry_mut().call_on_scene_load()
    }

    /// Tear down the current scene's resources and load the next
    pub fn switch_scene(&mut self) -> Result<()> {
        log::info!("Switching scene");
        let registry = self.pipeline.registry_mut();
        registry.call_on_scene_unload()?;
        registry.call_on_scene_load()
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn is_crashed(&self) -> bool {
        self.boundary.is_crashed()
    }

    pub fn boundary(&self) -> &FailureBoundary {
        &self.boundary
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut FramePipeline {
        &mut self.pipeline
    }

    pub fn registry(&self) -> &SystemRegistry {
        self.pipeline.registry()
    }

    pub fn registry_mut(&mut self) -> &mut SystemRegistry {
        self.pipeline.registry_mut()
    }
}
