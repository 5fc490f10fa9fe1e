//! System registry: registration, wiring, stage table and deferred removal
//!
//! Systems are registered explicitly on a [`RegistryBuilder`]. Calling
//! [`RegistryBuilder::initialize`] runs the three startup passes:
//! 1. instantiate every registration in order and file it under its stage
//! 2. wire every instance's dependency slots against the full set
//! 3. call each system's `initialize` hook in registration order
//!
//! Removal is deferred: [`SystemRegistry::deregister_system`] only queues a
//! handle, and [`SystemRegistry::process_deregistrations`] evicts queued
//! systems at the end of the frame's cleanup.

use crate::dependency::{Dep, Injector, Resources};
use crate::profiler::Profiler;
use crate::stage::Stage;
use crate::system::{short_type_name, DrawTarget, System};
use crate::timing::Timing;
use cinder_core::{CinderError, Result};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

/// Generation-tagged reference to a registered system.
///
/// Stays valid until the system is evicted; afterwards every lookup through
/// it fails instead of reaching another system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemHandle {
    index: u32,
    generation: u32,
}

impl SystemHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Pending-removal queue shared between the registry and systems.
///
/// Systems receive a clone as a resource while wiring, so they can queue
/// removals (their own included) from inside a stage.
#[derive(Debug, Clone, Default)]
pub struct Deregistrar {
    pending: Rc<RefCell<Vec<SystemHandle>>>,
}

impl Deregistrar {
    /// Queue `handle` for removal at the end of the frame. Returns false if
    /// it was already queued.
    pub fn deregister(&self, handle: SystemHandle) -> bool {
        let mut pending = self.pending.borrow_mut();
        if pending.contains(&handle) {
            return false;
        }
        pending.push(handle);
        true
    }

    pub fn is_pending(&self, handle: SystemHandle) -> bool {
        self.pending.borrow().contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    fn take(&self) -> Vec<SystemHandle> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }
}

type Factory = Box<dyn FnOnce() -> (Rc<RefCell<dyn System>>, Rc<dyn Any>)>;

struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    stage: Stage,
    factory: Factory,
}

struct SystemEntry {
    type_id: TypeId,
    name: String,
    stage: Stage,
    system: Rc<RefCell<dyn System>>,
    typed: Rc<dyn Any>,
    dependencies: Vec<String>,
}

impl SystemEntry {
    fn borrow_mut(&self) -> Result<std::cell::RefMut<'_, dyn System>> {
        self.system
            .try_borrow_mut()
            .map_err(|_| CinderError::SystemBusy(self.name.clone()))
    }
}

struct Slot {
    generation: u32,
    entry: Option<SystemEntry>,
}

/// Collects system registrations and shared resources before startup
pub struct RegistryBuilder {
    registrations: Vec<Registration>,
    resources: Resources,
    profiler_enabled: bool,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            resources: Resources::new(),
            profiler_enabled: true,
        }
    }

    /// Register a system built with `Default`
    pub fn register<T: System + Default>(&mut self) -> &mut Self {
        self.register_with(T::default)
    }

    /// Register a system built by `factory`. The factory runs during
    /// `initialize`, before any dependency is bound.
    pub fn register_with<T: System>(&mut self, factory: impl FnOnce() -> T + 'static) -> &mut Self {
        let factory: Factory = Box::new(move || {
            let typed = Rc::new(RefCell::new(factory()));
            let system: Rc<RefCell<dyn System>> = typed.clone();
            let any: Rc<dyn Any> = typed;
            (system, any)
        });
        self.registrations.push(Registration {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name(std::any::type_name::<T>()),
            stage: T::stage(),
            factory,
        });
        self
    }

    /// Make a shared handle available to `System::wire`
    pub fn add_resource<R: Clone + 'static>(&mut self, resource: R) -> &mut Self {
        self.resources.insert(resource);
        self
    }

    pub fn with_profiler(&mut self, enabled: bool) -> &mut Self {
        self.profiler_enabled = enabled;
        self
    }

    /// Number of registrations so far
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Instantiate, wire and initialize every registered system.
    ///
    /// A duplicate registration (by type or by name), an unresolvable
    /// dependency or a failing `initialize` hook aborts startup.
    pub fn initialize(self) -> Result<SystemRegistry> {
        let RegistryBuilder {
            registrations,
            mut resources,
            profiler_enabled,
        } = self;

        let deregistrar = Deregistrar::default();
        resources.insert(deregistrar.clone());

        // Instantiate
        let mut entries: Vec<SystemEntry> = Vec::with_capacity(registrations.len());
        for registration in registrations {
            if entries.iter().any(|e| e.type_id == registration.type_id) {
                return Err(CinderError::DuplicateSystem(
                    registration.type_name.to_string(),
                ));
            }
            let (system, typed) = (registration.factory)();
            let name = system.borrow().name().to_string();
            // Names key the profiler and fault reports
            if entries.iter().any(|e| e.name == name) {
                return Err(CinderError::DuplicateSystem(name));
            }
            log::debug!("Created system: {} in stage: {}", name, registration.stage);
            entries.push(SystemEntry {
                type_id: registration.type_id,
                name,
                stage: registration.stage,
                system,
                typed,
                dependencies: Vec::new(),
            });
        }

        // Wire
        let peers: HashMap<TypeId, Rc<dyn Any>> = entries
            .iter()
            .map(|e| (e.type_id, Rc::clone(&e.typed)))
            .collect();
        for (index, entry) in entries.iter_mut().enumerate() {
            let handle = SystemHandle::new(index as u32, 0);
            let mut injector =
                Injector::new(entry.type_id, &entry.name, handle, &peers, &resources);
            entry.system.borrow_mut().wire(&mut injector)?;
            entry.dependencies = injector.into_resolved();
        }

        // Initialize
        for entry in &entries {
            entry
                .borrow_mut()?
                .initialize()
                .map_err(|e| CinderError::in_system(&entry.name, e))?;
        }

        let mut profiler = Profiler::new();
        profiler.set_enabled(profiler_enabled);

        let mut registry = SystemRegistry {
            slots: Vec::with_capacity(entries.len()),
            by_type: HashMap::new(),
            order: Vec::with_capacity(entries.len()),
            stages: std::array::from_fn(|_| Vec::new()),
            deregistrar,
            resources,
            profiler,
        };
        for (index, entry) in entries.into_iter().enumerate() {
            let handle = SystemHandle::new(index as u32, 0);
            registry.by_type.insert(entry.type_id, handle);
            registry.stages[entry.stage.index()].push(handle);
            registry.order.push(handle);
            registry.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
        }

        log::info!("All systems initialized ({} systems)", registry.len());
        Ok(registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns every live system, grouped by stage
pub struct SystemRegistry {
    slots: Vec<Slot>,
    by_type: HashMap<TypeId, SystemHandle>,
    /// Live systems in registration order
    order: Vec<SystemHandle>,
    stages: [Vec<SystemHandle>; Stage::COUNT],
    deregistrar: Deregistrar,
    resources: Resources,
    profiler: Profiler,
}

impl SystemRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The unique live instance of `T`
    pub fn get_system<T: System>(&self) -> Result<Dep<T>> {
        let not_found = || CinderError::SystemNotFound(short_type_name(std::any::type_name::<T>()).to_string());
        let handle = self.by_type.get(&TypeId::of::<T>()).ok_or_else(not_found)?;
        let entry = self.entry(*handle).ok_or_else(not_found)?;
        let typed = Rc::clone(&entry.typed)
            .downcast::<RefCell<T>>()
            .map_err(|_| not_found())?;
        Ok(Dep::bound(typed))
    }

    pub fn handle_of<T: System>(&self) -> Result<SystemHandle> {
        self.by_type.get(&TypeId::of::<T>()).copied().ok_or_else(|| {
            CinderError::SystemNotFound(short_type_name(std::any::type_name::<T>()).to_string())
        })
    }

    pub fn contains<T: System>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Whether `handle` still refers to a live system
    pub fn is_live(&self, handle: SystemHandle) -> bool {
        self.entry(handle).is_some()
    }

    /// Queue a system for removal at the end of this frame. Idempotent; the
    /// system keeps running until the frame's cleanup.
    pub fn deregister_system(&self, handle: SystemHandle) {
        let Some(entry) = self.entry(handle) else {
            return;
        };
        if self.deregistrar.deregister(handle) {
            log::debug!("Queued {} for deregistration", entry.name);
        }
    }

    /// Queue the system of type `T` for removal
    pub fn deregister<T: System>(&self) -> Result<()> {
        let handle = self.handle_of::<T>()?;
        self.deregister_system(handle);
        Ok(())
    }

    pub fn is_pending_removal(&self, handle: SystemHandle) -> bool {
        self.deregistrar.is_pending(handle)
    }

    /// A clone of the shared removal queue
    pub fn deregistrar(&self) -> Deregistrar {
        self.deregistrar.clone()
    }

    /// Evict every queued system from the type lookup, the profiler and its
    /// stage list, then clear the queue.
    pub fn process_deregistrations(&mut self) {
        if self.deregistrar.is_empty() {
            return;
        }

        for handle in self.deregistrar.take() {
            let Some(entry) = self.take_entry(handle) else {
                continue;
            };

            self.by_type.remove(&entry.type_id);
            self.profiler.remove(&entry.name);
            self.order.retain(|h| *h != handle);

            // A system lives in exactly one stage
            let list = &mut self.stages[entry.stage.index()];
            if let Some(pos) = list.iter().position(|h| *h == handle) {
                list.remove(pos);
            }

            log::debug!("Deregistered {}", entry.name);
        }
    }

    pub fn call_on_scene_load(&mut self) -> Result<()> {
        log::trace!("Calling on_scene_load on all systems");
        for handle in &self.order {
            if let Some(entry) = slot_entry(&self.slots, *handle) {
                entry
                    .borrow_mut()?
                    .on_scene_load()
                    .map_err(|e| CinderError::in_system(&entry.name, e))?;
            }
        }
        Ok(())
    }

    pub fn call_on_scene_unload(&mut self) -> Result<()> {
        log::trace!("Calling on_scene_unload on all systems");
        for handle in &self.order {
            if let Some(entry) = slot_entry(&self.slots, *handle) {
                entry
                    .borrow_mut()?
                    .on_scene_unload()
                    .map_err(|e| CinderError::in_system(&entry.name, e))?;
            }
        }
        Ok(())
    }

    /// Run every system in `stage`, in registration order. The first error
    /// stops the stage and is returned with the failing system's name.
    pub fn run_bucket(&mut self, stage: Stage, timing: &Timing) -> Result<()> {
        log::trace!("Running stage {}", stage);
        let Self {
            slots,
            stages,
            profiler,
            ..
        } = self;

        for handle in &stages[stage.index()] {
            let Some(entry) = slot_entry(slots, *handle) else {
                continue;
            };
            let mut system = entry.borrow_mut()?;
            profiler
                .profile(&entry.name, || system.update(timing))
                .map_err(|e| CinderError::in_system(&entry.name, e))?;
        }
        Ok(())
    }

    pub fn run_frame_start(&mut self, timing: &Timing) -> Result<()> {
        self.run_bucket(Stage::First, timing)?;
        self.run_bucket(Stage::Input, timing)
    }

    pub fn run_fixed_update_pre_physics(&mut self, timing: &Timing) -> Result<()> {
        self.run_bucket(Stage::PreUpdate, timing)?;
        self.run_bucket(Stage::Update, timing)
    }

    pub fn run_fixed_update_post_physics(&mut self, timing: &Timing) -> Result<()> {
        self.run_bucket(Stage::PostPhysics, timing)
    }

    pub fn run_frame_late_update(&mut self, timing: &Timing) -> Result<()> {
        self.run_bucket(Stage::LateUpdate, timing)
    }

    /// Cleanup and pre-render, then evict queued systems
    pub fn run_frame_end(&mut self, timing: &Timing) -> Result<()> {
        self.run_bucket(Stage::Cleanup, timing)?;
        self.run_bucket(Stage::PreRender, timing)?;
        self.process_deregistrations();
        Ok(())
    }

    pub fn run_paused_update(&mut self, timing: &Timing) -> Result<()> {
        self.run_bucket(Stage::UpdatePaused, timing)
    }

    pub fn run_transient_update(&mut self, timing: &Timing) -> Result<()> {
        self.run_bucket(Stage::Transient, timing)
    }

    /// Audio stage as a whole, then each render system's `draw`
    pub fn run_draw(&mut self, timing: &Timing, target: &mut dyn DrawTarget) -> Result<()> {
        let start = Instant::now();
        let audio = self.run_bucket(Stage::Audio, timing);
        self.profiler.record("Bucket: Audio", start.elapsed());
        audio?;

        let Self {
            slots,
            stages,
            profiler,
            ..
        } = self;
        for handle in &stages[Stage::Render.index()] {
            let Some(entry) = slot_entry(slots, *handle) else {
                continue;
            };
            let mut system = entry.borrow_mut()?;
            profiler
                .profile(&entry.name, || system.draw(timing, &mut *target))
                .map_err(|e| CinderError::in_system(&entry.name, e))?;
        }
        Ok(())
    }

    /// Names of the systems in `stage`, in execution order
    pub fn systems_in(&self, stage: Stage) -> Vec<&str> {
        self.stages[stage.index()]
            .iter()
            .filter_map(|h| self.entry(*h))
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Names of the systems `T` had injected while wiring
    pub fn dependencies_of<T: System>(&self) -> Result<&[String]> {
        let handle = self.handle_of::<T>()?;
        self.entry(handle)
            .map(|e| e.dependencies.as_slice())
            .ok_or_else(|| {
                CinderError::SystemNotFound(short_type_name(std::any::type_name::<T>()).to_string())
            })
    }

    pub fn stage_of(&self, handle: SystemHandle) -> Option<Stage> {
        self.entry(handle).map(|e| e.stage)
    }

    pub fn name_of(&self, handle: SystemHandle) -> Option<&str> {
        self.entry(handle).map(|e| e.name.as_str())
    }

    /// Clone a shared resource given to the builder
    pub fn resource<R: Clone + 'static>(&self) -> Option<R> {
        self.resources.get::<R>()
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn profiler_mut(&mut self) -> &mut Profiler {
        &mut self.profiler
    }

    /// Number of live systems
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn entry(&self, handle: SystemHandle) -> Option<&SystemEntry> {
        slot_entry(&self.slots, handle)
    }

    fn take_entry(&mut self, handle: SystemHandle) -> Option<SystemEntry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        Some(entry)
    }
}

fn slot_entry(slots: &[Slot], handle: SystemHandle) -> Option<&SystemEntry> {
    slots
        .get(handle.index as usize)
        .filter(|slot| slot.generation == handle.generation)
        .and_then(|slot| slot.entry.as_ref())
}
