//! Frame pipeline: fixed-timestep simulation with interpolated presentation
//!
//! One call to [`FramePipeline::update`] drives a whole frame:
//! frame start, transient systems, then either the paused branch or the
//! fixed-step loop followed by late update and frame end. Rendering happens
//! separately in [`FramePipeline::draw`] using the alpha left by the last
//! update.

use crate::profiler::FrameStats;
use crate::registry::SystemRegistry;
use crate::session::{SessionControl, SimulationControl};
use crate::system::DrawTarget;
use crate::timing::Timing;
use cinder_core::{CinderError, Result};
use std::time::Instant;

/// Profiler key for the external physics step
pub const PHYSICS_PROFILE_KEY: &str = "Physics: Simulation";

/// Outcome of feeding one frame's delta into the accumulator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSteps {
    /// Whole fixed steps to run this frame
    pub iterations: u64,
    /// Leftover time after those steps, always in `[0, step)`
    pub accumulator: f64,
    /// Whole steps discarded because of the per-frame cap
    pub dropped: u64,
}

impl FixedSteps {
    /// Interpolation factor between the last completed step and the next
    pub fn alpha(&self, step: f64) -> f64 {
        if step <= 0.0 {
            return 0.0;
        }
        (self.accumulator / step).clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// Advance the fixed-step accumulator by one frame.
///
/// Paused sessions contribute no time. Otherwise `delta * speed` is added
/// and every whole step in the total is counted, so the leftover matches
/// `(accumulator + delta * speed) mod step` across any delta sequence. With a
/// cap, steps beyond `max_steps` are discarded rather than carried over.
/// Counts saturate instead of overflowing at extreme speeds.
pub fn advance_accumulator(
    control: SimulationControl,
    delta: f64,
    accumulator: f64,
    step: f64,
    max_steps: Option<u32>,
) -> FixedSteps {
    if control.paused || step <= 0.0 {
        return FixedSteps {
            iterations: 0,
            accumulator,
            dropped: 0,
        };
    }

    let total = accumulator + control.scaled_delta(delta);
    let mut whole = (total / step).floor();
    let mut accumulator = total - whole * step;
    // Rounding can leave the remainder just outside [0, step)
    if accumulator < 0.0 && whole >= 1.0 {
        whole -= 1.0;
        accumulator += step;
    } else if accumulator >= step {
        whole += 1.0;
        accumulator -= step;
    }
    if !(0.0..step).contains(&accumulator) {
        accumulator = 0.0;
    }

    // Float to int casts saturate
    let whole = whole.max(0.0) as u64;
    let iterations = whole.min(max_steps.map_or(u64::MAX, u64::from));

    FixedSteps {
        iterations,
        accumulator,
        dropped: whole - iterations,
    }
}

/// Per-frame content outside the registry: the physics collaborator and
/// game-specific hooks. Every method defaults to doing nothing.
pub trait FrameHooks {
    /// Once per unpaused frame, before the accumulator is advanced
    fn pre_fixed_update(&mut self, _registry: &mut SystemRegistry, _timing: &Timing) -> Result<()> {
        Ok(())
    }

    /// Advance the external physics world by one fixed step
    fn step_simulation(&mut self, _registry: &mut SystemRegistry, _step: f64) -> Result<()> {
        Ok(())
    }

    /// End of each fixed step, after post-physics systems
    fn fixed_update(&mut self, _registry: &mut SystemRegistry, _timing: &Timing) -> Result<()> {
        Ok(())
    }

    /// After late update, before frame end
    fn post_fixed_update(&mut self, _registry: &mut SystemRegistry, _timing: &Timing) -> Result<()> {
        Ok(())
    }

    /// In place of the fixed-step loop while paused
    fn paused_update(&mut self, _registry: &mut SystemRegistry, _timing: &Timing) -> Result<()> {
        Ok(())
    }
}

impl FrameHooks for () {}

/// Drives the registry's stages for each frame
pub struct FramePipeline {
    registry: SystemRegistry,
    session: SessionControl,
    fixed_step: f64,
    max_steps_per_frame: Option<u32>,
    accumulator: f64,
    elapsed: f64,
    alpha: f64,
    frame: u64,
    stats: FrameStats,
}

impl FramePipeline {
    pub fn new(registry: SystemRegistry, session: SessionControl, fixed_step: f64) -> Result<Self> {
        if !fixed_step.is_finite() || fixed_step <= 0.0 {
            return Err(CinderError::Config(format!(
                "fixed step must be positive, got {}",
                fixed_step
            )));
        }
        Ok(Self {
            registry,
            session,
            fixed_step,
            max_steps_per_frame: None,
            accumulator: 0.0,
            elapsed: 0.0,
            alpha: 0.0,
            frame: 0,
            stats: FrameStats::default(),
        })
    }

    /// Cap the fixed steps run in a single frame
    pub fn with_max_steps_per_frame(mut self, max_steps: Option<u32>) -> Self {
        self.max_steps_per_frame = max_steps;
        self
    }

    /// Run one frame of simulation for `delta` seconds of wall time
    pub fn update(&mut self, delta: f64, hooks: &mut dyn FrameHooks) -> Result<()> {
        let delta = if delta.is_finite() && delta >= 0.0 {
            delta
        } else {
            log::warn!("Ignoring invalid frame delta {}", delta);
            0.0
        };

        self.frame += 1;
        self.elapsed += delta;
        self.stats.record_frame(delta);

        let frame_timing = Timing::new(delta, 0.0, self.elapsed);
        self.registry.run_frame_start(&frame_timing)?;
        self.registry.run_transient_update(&frame_timing)?;

        // Read after input so a pause requested this frame applies now
        let control = self.session.snapshot();
        if control.paused {
            self.registry.run_paused_update(&frame_timing)?;
            hooks.paused_update(&mut self.registry, &frame_timing)?;
            return Ok(());
        }

        hooks.pre_fixed_update(&mut self.registry, &frame_timing)?;

        let steps = advance_accumulator(
            control,
            delta,
            self.accumulator,
            self.fixed_step,
            self.max_steps_per_frame,
        );
        if steps.dropped > 0 {
            log::warn!(
                "Frame {} fell behind, dropped {} fixed steps",
                self.frame,
                steps.dropped
            );
        }

        let fixed_timing = Timing::new(self.fixed_step, 1.0, self.elapsed);
        for _ in 0..steps.iterations {
            self.run_fixed_step(&fixed_timing, hooks)?;
        }
        self.accumulator = steps.accumulator;
        self.alpha = steps.alpha(self.fixed_step);

        let tail_timing = Timing::new(delta, self.alpha, self.elapsed);
        self.registry.run_frame_late_update(&tail_timing)?;
        hooks.post_fixed_update(&mut self.registry, &tail_timing)?;
        self.registry.run_frame_end(&tail_timing)
    }

    fn run_fixed_step(&mut self, timing: &Timing, hooks: &mut dyn FrameHooks) -> Result<()> {
        self.registry.run_fixed_update_pre_physics(timing)?;

        let start = Instant::now();
        let physics = hooks.step_simulation(&mut self.registry, self.fixed_step);
        self.registry
            .profiler_mut()
            .record(PHYSICS_PROFILE_KEY, start.elapsed());
        physics?;

        self.registry.run_fixed_update_post_physics(timing)?;
        hooks.fixed_update(&mut self.registry, timing)
    }

    /// Render the current state, interpolated by the alpha of the last update
    pub fn draw(&mut self, delta: f64, target: &mut dyn DrawTarget) -> Result<()> {
        let timing = Timing::new(delta, self.alpha, self.elapsed);
        self.registry.run_draw(&timing, target)
    }

    pub fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SystemRegistry {
        &mut self.registry
    }

    pub fn session(&self) -> &SessionControl {
        &self.session
    }

    pub fn fixed_step(&self) -> f64 {
        self.fixed_step
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Accumulated frame time, including paused frames
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Frames started so far
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Injector;
    use crate::registry::RegistryBuilder;
    use crate::stage::Stage;
    use crate::system::{NullDrawTarget, System};
    use std::cell::RefCell;
    use std::rc::Rc;

    const STEP: f64 = 1.0 / 60.0;

    #[derive(Clone, Default)]
    struct Trace(Rc<RefCell<Vec<String>>>);

    impl Trace {
        fn push(&self, s: impl Into<String>) {
            self.0.borrow_mut().push(s.into());
        }
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.borrow_mut())
        }
        fn count(&self, s: &str) -> usize {
            self.0.borrow().iter().filter(|e| *e == s).count()
        }
    }

    /// Records its stage name and last timing each time it runs
    macro_rules! tracer {
        ($name:ident, $stage:expr) => {
            #[derive(Default)]
            struct $name {
                trace: Option<Trace>,
                last: Option<Timing>,
            }

            impl System for $name {
                fn stage() -> Stage {
                    $stage
                }

                fn wire(&mut self, injector: &mut Injector<'_>) -> Result<()> {
                    self.trace = Some(injector.resource::<Trace>()?);
                    Ok(())
                }

                fn update(&mut self, timing: &Timing) -> Result<()> {
                    self.last = Some(*timing);
                    if let Some(trace) = &self.trace {
                        trace.push(stringify!($name));
                    }
                    Ok(())
                }

                fn draw(&mut self, timing: &Timing, _target: &mut dyn DrawTarget) -> Result<()> {
                    self.last = Some(*timing);
                    if let Some(trace) = &self.trace {
                        trace.push(stringify!($name));
                    }
                    Ok(())
                }
            }
        };
    }

    tracer!(FirstSys, Stage::First);
    tracer!(InputSys, Stage::Input);
    tracer!(PreSys, Stage::PreUpdate);
    tracer!(UpdateSys, Stage::Update);
    tracer!(PostSys, Stage::PostPhysics);
    tracer!(LateSys, Stage::LateUpdate);
    tracer!(CleanupSys, Stage::Cleanup);
    tracer!(PreRenderSys, Stage::PreRender);
    tracer!(PausedSys, Stage::UpdatePaused);
    tracer!(TransientSys, Stage::Transient);
    tracer!(RenderSys, Stage::Render);

    struct RecordingHooks {
        trace: Trace,
    }

    impl FrameHooks for RecordingHooks {
        fn pre_fixed_update(&mut self, _registry: &mut SystemRegistry, _timing: &Timing) -> Result<()> {
            self.trace.push("hook:pre_fixed");
            Ok(())
        }

        fn step_simulation(&mut self, _registry: &mut SystemRegistry, step: f64) -> Result<()> {
            assert!((step - STEP).abs() < 1e-12);
            self.trace.push("hook:physics");
            Ok(())
        }

        fn fixed_update(&mut self, _registry: &mut SystemRegistry, _timing: &Timing) -> Result<()> {
            self.trace.push("hook:fixed");
            Ok(())
        }

        fn post_fixed_update(&mut self, _registry: &mut SystemRegistry, _timing: &Timing) -> Result<()> {
            self.trace.push("hook:post_fixed");
            Ok(())
        }

        fn paused_update(&mut self, _registry: &mut SystemRegistry, _timing: &Timing) -> Result<()> {
            self.trace.push("hook:paused");
            Ok(())
        }
    }

    fn pipeline(trace: &Trace, session: &SessionControl) -> FramePipeline {
        let mut builder = RegistryBuilder::new();
        builder
            .add_resource(trace.clone())
            .add_resource(session.clone())
            .register::<FirstSys>()
            .register::<InputSys>()
            .register::<PreSys>()
            .register::<UpdateSys>()
            .register::<PostSys>()
            .register::<LateSys>()
            .register::<CleanupSys>()
            .register::<PreRenderSys>()
            .register::<PausedSys>()
            .register::<TransientSys>()
            .register::<RenderSys>();
        let registry = builder.initialize().unwrap();
        FramePipeline::new(registry, session.clone(), STEP).unwrap()
    }

    #[test]
    fn accumulator_counts_whole_steps() {
        let steps = advance_accumulator(SimulationControl::running(), 2.5 * STEP, 0.0, STEP, None);
        assert_eq!(steps.iterations, 2);
        assert!((steps.accumulator - 0.5 * STEP).abs() < 1e-12);
        assert!((steps.alpha(STEP) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn accumulator_law_over_a_sequence() {
        let deltas = [0.003, 0.021, 0.0169, 0.25, 0.0, 0.0071, 0.0333, 0.011];
        let leftover0 = 0.004;
        let mut accumulator = leftover0;
        let mut total_iterations = 0u64;
        for &delta in &deltas {
            let steps = advance_accumulator(SimulationControl::running(), delta, accumulator, STEP, None);
            assert!(steps.accumulator >= 0.0 && steps.accumulator < STEP);
            let alpha = steps.alpha(STEP);
            assert!((0.0..1.0).contains(&alpha));
            total_iterations += steps.iterations;
            accumulator = steps.accumulator;
        }

        let sum: f64 = deltas.iter().sum::<f64>() + leftover0;
        assert_eq!(total_iterations, (sum / STEP).floor() as u64);
        assert!((accumulator - sum % STEP).abs() < 1e-9);
    }

    #[test]
    fn speed_scales_contribution() {
        let control = SimulationControl {
            paused: false,
            speed: 2.0,
        };
        let steps = advance_accumulator(control, STEP, 0.0, STEP, None);
        assert_eq!(steps.iterations, 2);

        let stopped = SimulationControl {
            paused: false,
            speed: 0.0,
        };
        let steps = advance_accumulator(stopped, 1.0, 0.25 * STEP, STEP, None);
        assert_eq!(steps.iterations, 0);
        assert!((steps.accumulator - 0.25 * STEP).abs() < 1e-12);
    }

    #[test]
    fn paused_contributes_nothing() {
        let steps = advance_accumulator(SimulationControl::paused(), 1.0, 0.005, STEP, None);
        assert_eq!(steps.iterations, 0);
        assert_eq!(steps.accumulator, 0.005);
    }

    #[test]
    fn step_cap_drops_excess() {
        let steps = advance_accumulator(SimulationControl::running(), 10.5 * STEP, 0.0, STEP, Some(4));
        assert_eq!(steps.iterations, 4);
        assert_eq!(steps.dropped, 6);
        assert!(steps.accumulator < STEP);
        assert!((steps.accumulator - 0.5 * STEP).abs() < 1e-9);
    }

    #[test]
    fn extreme_speed_saturates() {
        let control = SimulationControl {
            paused: false,
            speed: 1e12,
        };
        let steps = advance_accumulator(control, 0.25, 0.0, STEP, None);
        assert!(steps.iterations > u64::from(u32::MAX));
        assert_eq!(steps.dropped, 0);
        assert!((0.0..STEP).contains(&steps.accumulator));

        let capped = advance_accumulator(control, 0.25, 0.0, STEP, Some(8));
        assert_eq!(capped.iterations, 8);
        assert_eq!(capped.iterations + capped.dropped, steps.iterations);
        assert!((0.0..STEP).contains(&capped.accumulator));

        let control = SimulationControl {
            paused: false,
            speed: f64::MAX,
        };
        let steps = advance_accumulator(control, 0.25, 0.0, STEP, Some(8));
        assert_eq!(steps.iterations, 8);
        assert_eq!(steps.dropped, u64::MAX - 8);
    }

    #[test]
    fn full_frame_order() {
        let trace = Trace::default();
        let session = SessionControl::default();
        let mut pipeline = pipeline(&trace, &session);
        let mut hooks = RecordingHooks {
            trace: trace.clone(),
        };

        pipeline.update(2.5 * STEP, &mut hooks).unwrap();
        let fixed = [
            "PreSys",
            "UpdateSys",
            "hook:physics",
            "PostSys",
            "hook:fixed",
        ];
        let mut expected = vec!["FirstSys", "InputSys", "TransientSys", "hook:pre_fixed"];
        expected.extend(fixed);
        expected.extend(fixed);
        expected.extend(["LateSys", "hook:post_fixed", "CleanupSys", "PreRenderSys"]);
        assert_eq!(trace.take(), expected);
        assert!((pipeline.alpha() - 0.5).abs() < 1e-9);
        assert!(pipeline.registry().profiler().history(PHYSICS_PROFILE_KEY).is_some());

        let mut target = NullDrawTarget::default();
        pipeline.draw(2.5 * STEP, &mut target).unwrap();
        assert_eq!(trace.take(), vec!["RenderSys"]);
    }

    #[test]
    fn stage_timings() {
        let trace = Trace::default();
        let session = SessionControl::default();
        let mut pipeline = pipeline(&trace, &session);
        let delta = 1.5 * STEP;
        pipeline.update(delta, &mut ()).unwrap();

        let registry = pipeline.registry();
        let first = registry.get_system::<FirstSys>().unwrap();
        let first = first.get().unwrap().last.unwrap();
        assert_eq!(first.delta_time(), delta);
        assert_eq!(first.alpha(), 0.0);
        assert_eq!(first.elapsed(), delta);

        let update = registry.get_system::<UpdateSys>().unwrap();
        let update = update.get().unwrap().last.unwrap();
        assert_eq!(update.delta_time(), STEP);
        assert_eq!(update.alpha(), 1.0);

        let late = registry.get_system::<LateSys>().unwrap();
        let late = late.get().unwrap().last.unwrap();
        assert_eq!(late.delta_time(), delta);
        assert!((late.alpha() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn draw_sees_alpha_from_last_update() {
        let trace = Trace::default();
        let session = SessionControl::default();
        let mut pipeline = pipeline(&trace, &session);
        pipeline.update(0.25 * STEP, &mut ()).unwrap();

        let mut target = NullDrawTarget::default();
        pipeline.draw(0.01, &mut target).unwrap();
        let render = pipeline.registry().get_system::<RenderSys>().unwrap();
        let timing = render.get().unwrap().last.unwrap();
        assert!((timing.alpha() - 0.25).abs() < 1e-9);
        assert_eq!(timing.delta_time(), 0.01);
    }

    /// Pauses the session from inside the input stage
    #[derive(Default)]
    struct PauseOnInput {
        session: Option<SessionControl>,
    }

    impl System for PauseOnInput {
        fn stage() -> Stage {
            Stage::Input
        }

        fn wire(&mut self, injector: &mut Injector<'_>) -> Result<()> {
            self.session = Some(injector.resource::<SessionControl>()?);
            Ok(())
        }

        fn update(&mut self, _timing: &Timing) -> Result<()> {
            if let Some(session) = &self.session {
                session.set_paused(true);
            }
            Ok(())
        }
    }

    #[test]
    fn pause_mid_frame_skips_fixed_and_tail() {
        let trace = Trace::default();
        let session = SessionControl::default();
        let mut builder = RegistryBuilder::new();
        builder
            .add_resource(trace.clone())
            .add_resource(session.clone())
            .register::<PauseOnInput>()
            .register::<UpdateSys>()
            .register::<LateSys>()
            .register::<CleanupSys>()
            .register::<PreRenderSys>()
            .register::<PausedSys>()
            .register::<TransientSys>();
        let registry = builder.initialize().unwrap();
        let mut pipeline = FramePipeline::new(registry, session.clone(), STEP).unwrap();
        let mut hooks = RecordingHooks {
            trace: trace.clone(),
        };

        // Queue a removal; it must wait while paused
        let handle = pipeline.registry().handle_of::<UpdateSys>().unwrap();
        pipeline.registry().deregister_system(handle);

        pipeline.update(3.0 * STEP, &mut hooks).unwrap();
        assert!(session.is_paused());
        assert_eq!(
            trace.take(),
            vec!["TransientSys", "PausedSys", "hook:paused"]
        );
        assert_eq!(pipeline.accumulator(), 0.0);
        assert!(pipeline.registry().is_pending_removal(handle));
        assert!(pipeline.registry().contains::<UpdateSys>());
        assert!((pipeline.elapsed() - 3.0 * STEP).abs() < 1e-12);
    }

    #[test]
    fn deregistered_system_runs_until_cleanup() {
        let trace = Trace::default();
        let session = SessionControl::default();
        let mut pipeline = pipeline(&trace, &session);

        let handle = pipeline.registry().handle_of::<UpdateSys>().unwrap();
        pipeline.registry().deregister_system(handle);
        pipeline.registry().deregister_system(handle);

        pipeline.update(STEP, &mut ()).unwrap();
        assert_eq!(trace.count("UpdateSys"), 1);
        assert!(!pipeline.registry().contains::<UpdateSys>());
        trace.take();

        pipeline.update(STEP, &mut ()).unwrap();
        assert_eq!(trace.count("UpdateSys"), 0);
        assert_eq!(trace.count("PreSys"), 1);
    }

    #[test]
    fn rejects_non_positive_step() {
        let registry = RegistryBuilder::new().initialize().unwrap();
        assert!(FramePipeline::new(registry, SessionControl::default(), 0.0).is_err());
    }

    #[test]
    fn invalid_delta_counts_as_zero() {
        let trace = Trace::default();
        let session = SessionControl::default();
        let mut pipeline = pipeline(&trace, &session);
        pipeline.update(f64::NAN, &mut ()).unwrap();
        pipeline.update(-1.0, &mut ()).unwrap();
        assert_eq!(pipeline.elapsed(), 0.0);
        assert_eq!(trace.count("UpdateSys"), 0);
        assert_eq!(pipeline.frame_index(), 2);
    }
}
