//! Cinder Runtime - execution scheduler and frame pipeline
//!
//! Provides the building blocks for driving game logic:
//! - `SystemRegistry` - owns systems, wires their dependencies, runs stages
//! - `Stage` - fixed positions in the frame where systems execute
//! - `FramePipeline` - fixed-timestep accumulator with interpolated draw
//! - `Engine` - failure boundary and crash inspection around the pipeline
//! - `Profiler` - rolling per-system timing statistics

mod clock;
mod config;
mod dependency;
mod engine;
mod pipeline;
mod profiler;
mod registry;
mod session;
mod stage;
mod system;
mod timing;

pub use clock::{FrameClock, DEFAULT_MAX_FRAME_DELTA};
pub use config::{
    EngineConfig, LogConfig, ProfilerConfig, SessionConfig, TimingConfig, LOG_ENV_VAR,
};
pub use dependency::{Dep, Injector, Resources};
pub use engine::{
    CrashInspector, CrashReport, Engine, ExitOnCrash, FailureBoundary, FramePhase,
    InspectorAction,
};
pub use pipeline::{advance_accumulator, FixedSteps, FrameHooks, FramePipeline, PHYSICS_PROFILE_KEY};
pub use profiler::{FrameStats, Profiler, ProfilerHistory, HISTORY_CAPACITY};
pub use registry::{Deregistrar, RegistryBuilder, SystemHandle, SystemRegistry};
pub use session::{SessionControl, SimulationControl};
pub use stage::Stage;
pub use system::{DrawTarget, NullDrawTarget, System};
pub use timing::Timing;

pub use cinder_core::{CinderError, Result};
