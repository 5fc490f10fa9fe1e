//! Demo systems exercising every stage of the pipeline
//!
//! A single point is driven around a circle: the input sampler steers, the
//! mover sets velocity, the physics stand-in integrates, the follower trails
//! behind and the renderer draws both at the interpolated position.

use crate::headless::HeadlessTarget;
use cinder_runtime::{
    CinderError, Dep, Deregistrar, DrawTarget, FrameHooks, Injector, Result, SessionControl,
    Stage, System, SystemHandle, SystemRegistry, Timing,
};
use glam::Vec2;

/// Scripted events for a demo run, shared as a resource
#[derive(Debug, Clone, Default)]
pub struct DemoScript {
    /// Frame from which the mover raises a fault on its next step
    pub crash_at: Option<u64>,
    /// Frame on which the pause key is pressed
    pub pause_at: Option<u64>,
    /// Paused frames before resuming
    pub pause_frames: u64,
}

/// Counts frames and steers the mover. Toggles pause on cue.
#[derive(Default)]
pub struct InputSampler {
    session: SessionControl,
    script: DemoScript,
    frame: u64,
    heading: f32,
}

impl InputSampler {
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Desired direction of travel
    pub fn heading(&self) -> Vec2 {
        Vec2::from_angle(self.heading)
    }
}

impl System for InputSampler {
    fn stage() -> Stage {
        Stage::Input
    }

    fn wire(&mut self, injector: &mut Injector<'_>) -> Result<()> {
        self.session = injector.resource::<SessionControl>()?;
        self.script = injector.resource::<DemoScript>()?;
        Ok(())
    }

    fn update(&mut self, timing: &Timing) -> Result<()> {
        self.frame += 1;
        self.heading += timing.delta_time() as f32;
        if self.script.pause_at == Some(self.frame) {
            self.session.toggle_pause();
        }
        Ok(())
    }
}

/// Sets velocity from input; position is integrated by physics
#[derive(Default)]
pub struct Mover {
    input: Dep<InputSampler>,
    script: DemoScript,
    pub position: Vec2,
    pub previous: Vec2,
    pub velocity: Vec2,
    pub steps: u64,
}

impl Mover {
    const SPEED: f32 = 4.0;

    /// Position blended between the last two fixed steps
    pub fn interpolated(&self, timing: &Timing) -> Vec2 {
        Vec2::new(
            timing.interpolate(self.previous.x.into(), self.position.x.into()) as f32,
            timing.interpolate(self.previous.y.into(), self.position.y.into()) as f32,
        )
    }
}

impl System for Mover {
    fn wire(&mut self, injector: &mut Injector<'_>) -> Result<()> {
        self.input = injector.system::<InputSampler>()?;
        self.script = injector.resource::<DemoScript>()?;
        Ok(())
    }

    fn on_scene_load(&mut self) -> Result<()> {
        self.position = Vec2::ZERO;
        self.previous = Vec2::ZERO;
        self.velocity = Vec2::ZERO;
        Ok(())
    }

    fn update(&mut self, _timing: &Timing) -> Result<()> {
        let input = self.input.get()?;
        if self.script.crash_at.is_some_and(|at| input.frame() >= at) {
            return Err(CinderError::Runtime(format!(
                "scripted fault on frame {}",
                input.frame()
            )));
        }
        self.velocity = input.heading() * Self::SPEED;
        self.steps += 1;
        Ok(())
    }
}

/// Eases toward the mover once per frame
#[derive(Default)]
pub struct Follower {
    target: Dep<Mover>,
    pub position: Vec2,
}

impl Follower {
    const RATE: f32 = 2.0;
}

impl System for Follower {
    fn stage() -> Stage {
        Stage::LateUpdate
    }

    fn wire(&mut self, injector: &mut Injector<'_>) -> Result<()> {
        self.target = injector.system::<Mover>()?;
        Ok(())
    }

    fn update(&mut self, timing: &Timing) -> Result<()> {
        let goal = self.target.get()?.interpolated(timing);
        let t = (Self::RATE * timing.delta_time() as f32).min(1.0);
        self.position = self.position.lerp(goal, t);
        Ok(())
    }
}

/// Stand-in for the audio mixer's per-frame tick
#[derive(Default)]
pub struct AudioTick {
    pub ticks: u64,
}

impl System for AudioTick {
    fn stage() -> Stage {
        Stage::Audio
    }

    fn update(&mut self, _timing: &Timing) -> Result<()> {
        self.ticks += 1;
        Ok(())
    }
}

/// Draws the mover and follower into the headless target
#[derive(Default)]
pub struct Renderer {
    mover: Dep<Mover>,
    follower: Dep<Follower>,
}

impl System for Renderer {
    fn stage() -> Stage {
        Stage::Render
    }

    fn wire(&mut self, injector: &mut Injector<'_>) -> Result<()> {
        self.mover = injector.system::<Mover>()?;
        self.follower = injector.system::<Follower>()?;
        Ok(())
    }

    fn draw(&mut self, timing: &Timing, target: &mut dyn DrawTarget) -> Result<()> {
        let transform = target.transform();
        let mover = self.mover.get()?.interpolated(timing);
        let follower = self.follower.get()?.position;

        let Some(headless) = target.as_any_mut().downcast_mut::<HeadlessTarget>() else {
            return Ok(());
        };
        headless.draw_point(transform.transform_point3(mover.extend(0.0)));
        headless.draw_point(transform.transform_point3(follower.extend(0.0)));
        Ok(())
    }
}

/// Counts paused frames and resumes the session after the scripted pause
#[derive(Default)]
pub struct PauseWatcher {
    session: SessionControl,
    script: DemoScript,
    pub paused_frames: u64,
    waited: u64,
}

impl System for PauseWatcher {
    fn stage() -> Stage {
        Stage::UpdatePaused
    }

    fn wire(&mut self, injector: &mut Injector<'_>) -> Result<()> {
        self.session = injector.resource::<SessionControl>()?;
        self.script = injector.resource::<DemoScript>()?;
        Ok(())
    }

    fn update(&mut self, _timing: &Timing) -> Result<()> {
        self.paused_frames += 1;
        self.waited += 1;
        if self.waited >= self.script.pause_frames {
            self.waited = 0;
            self.session.set_paused(false);
        }
        Ok(())
    }
}

/// Logs a greeting on the first frame, then removes itself
#[derive(Default)]
pub struct Greeter {
    handle: Option<SystemHandle>,
    deregistrar: Deregistrar,
    pub greeted: u32,
}

impl System for Greeter {
    fn stage() -> Stage {
        Stage::Transient
    }

    fn wire(&mut self, injector: &mut Injector<'_>) -> Result<()> {
        self.handle = Some(injector.handle());
        self.deregistrar = injector.resource::<Deregistrar>()?;
        Ok(())
    }

    fn update(&mut self, _timing: &Timing) -> Result<()> {
        self.greeted += 1;
        log::info!("Demo scene running");
        if let Some(handle) = self.handle {
            self.deregistrar.deregister(handle);
        }
        Ok(())
    }
}

/// Physics collaborator stand-in: integrates the mover each fixed step
#[derive(Debug, Default)]
pub struct DemoPhysics {
    pub steps: u64,
}

impl FrameHooks for DemoPhysics {
    fn step_simulation(&mut self, registry: &mut SystemRegistry, step: f64) -> Result<()> {
        let mover = registry.get_system::<Mover>()?;
        let mut mover = mover.get_mut()?;
        mover.previous = mover.position;
        let velocity = mover.velocity;
        mover.position += velocity * step as f32;
        self.steps += 1;
        Ok(())
    }
}

/// Register every demo system
pub fn register_demo(builder: &mut cinder_runtime::RegistryBuilder) {
    builder
        .register::<InputSampler>()
        .register::<Mover>()
        .register::<Follower>()
        .register::<AudioTick>()
        .register::<Renderer>()
        .register::<PauseWatcher>()
        .register::<Greeter>();
}
