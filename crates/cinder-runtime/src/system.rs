//! System trait and render collaborator surface

use crate::dependency::Injector;
use crate::stage::Stage;
use crate::timing::Timing;
use cinder_core::Result;
use std::any::Any;

/// A stateful unit of game logic owned by the registry.
///
/// Construction is two-phase: the factory builds the system with unbound
/// [`Dep`](crate::Dep) slots, then [`wire`](System::wire) binds them once
/// every system exists. No hook runs before all systems are wired.
pub trait System: Any {
    /// Stage this system runs in. Read once at registration.
    fn stage() -> Stage
    where
        Self: Sized,
    {
        Stage::Update
    }

    /// Bind dependency slots from already-instantiated peers
    fn wire(&mut self, _injector: &mut Injector<'_>) -> Result<()> {
        Ok(())
    }

    /// Called once after every system has been wired.
    /// Scene-scoped setup belongs in `on_scene_load`.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Acquire scene-scoped resources
    fn on_scene_load(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release whatever `on_scene_load` acquired
    fn on_scene_unload(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called each time the system's stage runs
    fn update(&mut self, _timing: &Timing) -> Result<()> {
        Ok(())
    }

    /// Called for systems in [`Stage::Render`] during the draw callback
    fn draw(&mut self, _timing: &Timing, _target: &mut dyn DrawTarget) -> Result<()> {
        Ok(())
    }

    /// Human-readable name, also the profiler key
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// The render collaborator's per-frame surface handed to `draw`.
pub trait DrawTarget {
    /// World-to-screen transform for this frame
    fn transform(&self) -> glam::Mat4 {
        glam::Mat4::IDENTITY
    }

    /// Access the concrete renderer
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A draw target for headless runs and tests
#[derive(Debug, Default)]
pub struct NullDrawTarget {
    pub draw_calls: usize,
}

impl DrawTarget for NullDrawTarget {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Strip the module path (and generic arguments' paths) from a type name.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain;
    impl System for Plain {}

    struct Annotated;
    impl System for Annotated {
        fn stage() -> Stage {
            Stage::Render
        }
        fn name(&self) -> &str {
            "annotated"
        }
    }

    #[test]
    fn default_stage_is_update() {
        assert_eq!(Plain::stage(), Stage::Update);
        assert_eq!(Annotated::stage(), Stage::Render);
    }

    #[test]
    fn default_name_is_short_type_name() {
        assert_eq!(Plain.name(), "Plain");
        assert_eq!(Annotated.name(), "annotated");
    }

    #[test]
    fn short_names() {
        assert_eq!(short_type_name("a::b::Mover"), "Mover");
        assert_eq!(short_type_name("Mover"), "Mover");
        assert_eq!(short_type_name("a::Wrap<b::Inner>"), "Wrap<b::Inner>");
    }

    #[test]
    fn null_target_downcasts() {
        let mut target = NullDrawTarget::default();
        let any = target.as_any_mut();
        assert!(any.downcast_mut::<NullDrawTarget>().is_some());
        assert_eq!(target.transform(), glam::Mat4::IDENTITY);
    }
}
