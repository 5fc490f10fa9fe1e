//! Dependency slots and the injector that binds them

use crate::registry::SystemHandle;
use crate::system::{short_type_name, System};
use cinder_core::{CinderError, Result};
use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

/// A typed reference from one system to another.
///
/// Starts unbound and is bound exactly once during wiring. Reading an unbound
/// slot is an error rather than a panic.
pub struct Dep<T> {
    slot: Option<Rc<RefCell<T>>>,
}

impl<T: 'static> Dep<T> {
    /// An empty slot, to be filled by [`Injector::system`]
    pub fn unbound() -> Self {
        Self { slot: None }
    }

    pub(crate) fn bound(inner: Rc<RefCell<T>>) -> Self {
        Self { slot: Some(inner) }
    }

    pub fn is_bound(&self) -> bool {
        self.slot.is_some()
    }

    /// Borrow the peer immutably
    pub fn get(&self) -> Result<Ref<'_, T>> {
        let cell = self.cell()?;
        cell.try_borrow()
            .map_err(|_| CinderError::SystemBusy(Self::type_label().to_string()))
    }

    /// Borrow the peer mutably
    pub fn get_mut(&self) -> Result<RefMut<'_, T>> {
        let cell = self.cell()?;
        cell.try_borrow_mut()
            .map_err(|_| CinderError::SystemBusy(Self::type_label().to_string()))
    }

    /// Whether both slots point at the same instance
    pub fn ptr_eq(&self, other: &Dep<T>) -> bool {
        match (&self.slot, &other.slot) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn cell(&self) -> Result<&Rc<RefCell<T>>> {
        self.slot
            .as_ref()
            .ok_or_else(|| CinderError::UnwiredDependency(Self::type_label().to_string()))
    }

    fn type_label() -> &'static str {
        short_type_name(std::any::type_name::<T>())
    }
}

impl<T: 'static> Default for Dep<T> {
    fn default() -> Self {
        Self::unbound()
    }
}

impl<T> Clone for Dep<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: 'static> std::fmt::Debug for Dep<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("type", &Self::type_label())
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Shared handles systems may request while wiring (session control,
/// deregistrar, collaborator handles). Stored by type, handed out as clones.
#[derive(Default)]
pub struct Resources {
    map: HashMap<TypeId, Box<dyn Any>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource
    pub fn insert<R: Clone + 'static>(&mut self, resource: R) {
        self.map.insert(TypeId::of::<R>(), Box::new(resource));
    }

    pub fn get<R: Clone + 'static>(&self) -> Option<R> {
        self.map
            .get(&TypeId::of::<R>())
            .and_then(|r| r.downcast_ref::<R>())
            .cloned()
    }

    pub fn contains<R: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<R>())
    }
}

/// Resolves dependency slots for one system during the wiring pass
pub struct Injector<'a> {
    requester: TypeId,
    requester_name: &'a str,
    handle: SystemHandle,
    peers: &'a HashMap<TypeId, Rc<dyn Any>>,
    resources: &'a Resources,
    resolved: Vec<String>,
}

impl<'a> Injector<'a> {
    pub(crate) fn new(
        requester: TypeId,
        requester_name: &'a str,
        handle: SystemHandle,
        peers: &'a HashMap<TypeId, Rc<dyn Any>>,
        resources: &'a Resources,
    ) -> Self {
        Self {
            requester,
            requester_name,
            handle,
            peers,
            resources,
            resolved: Vec::new(),
        }
    }

    /// Handle of the system being wired, e.g. to deregister itself later
    pub fn handle(&self) -> SystemHandle {
        self.handle
    }

    /// Look up the unique registered instance of `T`
    pub fn system<T: System>(&mut self) -> Result<Dep<T>> {
        let dependency = short_type_name(std::any::type_name::<T>());
        if TypeId::of::<T>() == self.requester {
            return Err(CinderError::SelfDependency(self.requester_name.to_string()));
        }

        let unresolved = || CinderError::UnresolvedDependency {
            dependency: dependency.to_string(),
            system: self.requester_name.to_string(),
        };

        let peer = self.peers.get(&TypeId::of::<T>()).ok_or_else(unresolved)?;
        let typed = Rc::clone(peer)
            .downcast::<RefCell<T>>()
            .map_err(|_| unresolved())?;

        log::debug!("Injected {} into {}", dependency, self.requester_name);
        self.resolved.push(dependency.to_string());
        Ok(Dep::bound(typed))
    }

    /// Clone a shared resource registered with the registry builder
    pub fn resource<R: Clone + 'static>(&self) -> Result<R> {
        self.resources.get::<R>().ok_or_else(|| {
            CinderError::ResourceNotFound(short_type_name(std::any::type_name::<R>()).to_string())
        })
    }

    pub(crate) fn into_resolved(self) -> Vec<String> {
        self.resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Target {
        value: i32,
    }
    impl System for Target {}

    #[derive(Default)]
    struct Requester;
    impl System for Requester {}

    fn peers_with_target(target: &Rc<RefCell<Target>>) -> HashMap<TypeId, Rc<dyn Any>> {
        let mut peers: HashMap<TypeId, Rc<dyn Any>> = HashMap::new();
        let any: Rc<dyn Any> = target.clone();
        peers.insert(TypeId::of::<Target>(), any);
        peers
    }

    #[test]
    fn unbound_slot_errors() {
        let dep: Dep<Target> = Dep::unbound();
        assert!(!dep.is_bound());
        assert!(matches!(dep.get(), Err(CinderError::UnwiredDependency(_))));
        assert!(matches!(
            dep.get_mut(),
            Err(CinderError::UnwiredDependency(_))
        ));
    }

    #[test]
    fn resolves_peer_instance() {
        let target = Rc::new(RefCell::new(Target { value: 7 }));
        let peers = peers_with_target(&target);
        let resources = Resources::new();
        let mut injector = Injector::new(
            TypeId::of::<Requester>(),
            "Requester",
            SystemHandle::new(1, 0),
            &peers,
            &resources,
        );

        let dep = injector.system::<Target>().unwrap();
        assert_eq!(dep.get().unwrap().value, 7);
        dep.get_mut().unwrap().value = 9;
        assert_eq!(target.borrow().value, 9);
        assert_eq!(injector.into_resolved(), vec!["Target".to_string()]);
    }

    #[test]
    fn missing_peer_is_unresolved() {
        let peers = HashMap::new();
        let resources = Resources::new();
        let mut injector = Injector::new(
            TypeId::of::<Requester>(),
            "Requester",
            SystemHandle::new(1, 0),
            &peers,
            &resources,
        );
        match injector.system::<Target>() {
            Err(CinderError::UnresolvedDependency { dependency, system }) => {
                assert_eq!(dependency, "Target");
                assert_eq!(system, "Requester");
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn self_reference_rejected() {
        let target = Rc::new(RefCell::new(Target::default()));
        let peers = peers_with_target(&target);
        let resources = Resources::new();
        let mut injector =
            Injector::new(
            TypeId::of::<Target>(),
            "Target",
            SystemHandle::new(0, 0),
            &peers,
            &resources,
        );
        assert!(matches!(
            injector.system::<Target>(),
            Err(CinderError::SelfDependency(_))
        ));
    }

    #[test]
    fn busy_peer_reports_error() {
        let target = Rc::new(RefCell::new(Target::default()));
        let dep = Dep::bound(target.clone());
        let _held = target.borrow_mut();
        assert!(matches!(dep.get(), Err(CinderError::SystemBusy(_))));
    }

    #[test]
    fn ptr_eq_compares_instances() {
        let a = Rc::new(RefCell::new(Target::default()));
        let b = Rc::new(RefCell::new(Target::default()));
        let dep_a = Dep::bound(a.clone());
        assert!(dep_a.ptr_eq(&Dep::bound(a)));
        assert!(!dep_a.ptr_eq(&Dep::bound(b)));
        assert!(!dep_a.ptr_eq(&Dep::unbound()));
    }

    #[test]
    fn resources_clone_out() {
        let mut resources = Resources::new();
        resources.insert(Rc::new(5u32));
        assert!(resources.contains::<Rc<u32>>());
        assert_eq!(*resources.get::<Rc<u32>>().unwrap(), 5);
        assert!(resources.get::<String>().is_none());
    }
}
