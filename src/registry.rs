//! Scope-aware instance registry: the get-or-create protocol.
//!
//! Singleton creation runs under one coarse re-entrant lock shared by all
//! singleton operations — creating `a` may recursively create `b` on the
//! same thread while holding it. This is deliberately not a per-name lock:
//! the set of currently-creating names must be observed consistently for
//! cycle detection, at the cost of serializing singleton creation globally.
//! Reads of a fully-created singleton never touch the creation lock.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use tracing::{debug, trace};

use crate::error::{ContainerError, ContainerResult};
use crate::internal::inflight;
use crate::traits::Scope;

/// A type-erased, shareable component instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Supplier of an early reference to a singleton mid-creation.
pub type EarlySupplier = Box<dyn Fn() -> Instance + Send>;

#[derive(Default)]
pub(crate) struct CreationState {
    /// Early references already handed out for names mid-creation.
    pub(crate) early: HashMap<String, Instance>,
    /// Registered early-reference suppliers, consumed into `early` on first
    /// use.
    pub(crate) suppliers: HashMap<String, EarlySupplier>,
    /// Names whose singleton creation is in flight.
    pub(crate) in_creation: HashSet<String>,
    /// Producer-output cache, guarded by the same lock as singleton creation.
    pub(crate) products: HashMap<String, Instance>,
}

/// The scope-aware creation protocol: singleton cache with early-reference
/// exposure, per-thread prototype tracking, pluggable custom scopes, and the
/// depends-on bookkeeping used for cycle detection.
///
/// Per name, singleton state moves `absent -> creating -> present`, or
/// `absent -> creating -> absent` on failure so that a later request may
/// retry. Once present, reads go through the committed map only.
pub struct InstanceRegistry {
    committed: RwLock<HashMap<String, Instance>>,
    creation: ReentrantMutex<RefCell<CreationState>>,
    /// name -> names that depend on it (declared via depends-on).
    dependents: Mutex<HashMap<String, HashSet<String>>>,
    scopes: RwLock<HashMap<String, Arc<dyn Scope>>>,
    destruction: Mutex<Vec<(String, Box<dyn FnOnce() + Send>)>>,
}

impl InstanceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        InstanceRegistry {
            committed: RwLock::new(HashMap::new()),
            creation: ReentrantMutex::new(RefCell::new(CreationState::default())),
            dependents: Mutex::new(HashMap::new()),
            scopes: RwLock::new(HashMap::new()),
            destruction: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn creation_guard(&self) -> ReentrantMutexGuard<'_, RefCell<CreationState>> {
        self.creation.lock()
    }

    /// Looks up a committed singleton, falling back to an early reference
    /// when `allow_early` is set and the name is mid-creation.
    pub fn get_singleton(&self, name: &str, allow_early: bool) -> Option<Instance> {
        if let Some(instance) = self.committed.read().get(name) {
            return Some(instance.clone());
        }
        let guard = self.creation.lock();
        if let Some(instance) = self.committed.read().get(name) {
            return Some(instance.clone());
        }
        let supplier = {
            let state = guard.borrow();
            if !state.in_creation.contains(name) {
                return None;
            }
            if let Some(early) = state.early.get(name) {
                return Some(early.clone());
            }
            if !allow_early {
                return None;
            }
            drop(state);
            guard.borrow_mut().suppliers.remove(name)
        };
        let supplier = supplier?;
        trace!(component = name, "exposing early reference");
        let early = supplier();
        guard
            .borrow_mut()
            .early
            .insert(name.to_string(), early.clone());
        Some(early)
    }

    /// The singleton get-or-create protocol.
    ///
    /// Exactly one invocation of `supplier` happens per name across threads.
    /// A re-entrant request for a name already creating on this call chain
    /// (with no early reference registered) is a circular-creation error.
    /// On failure the partially-constructed entry is purged so a later
    /// request may retry.
    pub fn get_or_create_singleton<F>(&self, name: &str, supplier: F) -> ContainerResult<Instance>
    where
        F: FnOnce() -> ContainerResult<Instance>,
    {
        if let Some(instance) = self.committed.read().get(name) {
            return Ok(instance.clone());
        }
        let guard = self.creation.lock();
        if let Some(instance) = self.committed.read().get(name) {
            return Ok(instance.clone());
        }
        {
            let mut state = guard.borrow_mut();
            if !state.in_creation.insert(name.to_string()) {
                return Err(ContainerError::CircularCreation {
                    name: name.to_string(),
                    path: vec![name.to_string(), name.to_string()],
                });
            }
        }
        debug!(component = name, "creating shared singleton instance");
        let result = supplier();
        let mut state = guard.borrow_mut();
        state.in_creation.remove(name);
        match result {
            Ok(instance) => {
                state.early.remove(name);
                state.suppliers.remove(name);
                drop(state);
                self.committed
                    .write()
                    .insert(name.to_string(), instance.clone());
                Ok(instance)
            }
            Err(err) => {
                state.early.remove(name);
                state.suppliers.remove(name);
                state.products.remove(name);
                debug!(component = name, error = %err, "singleton creation failed, entry purged");
                Err(err)
            }
        }
    }

    /// Registers a supplier producing an early reference for `name`, used to
    /// break reference cycles at the property-injection layer while `name`
    /// is mid-creation.
    pub fn register_early_supplier(&self, name: &str, supplier: EarlySupplier) {
        let guard = self.creation.lock();
        if self.committed.read().contains_key(name) {
            return;
        }
        let mut state = guard.borrow_mut();
        state.early.remove(name);
        state.suppliers.insert(name.to_string(), supplier);
    }

    /// Registers an externally built singleton instance.
    pub fn register_singleton(&self, name: &str, instance: Instance) -> ContainerResult<()> {
        let _guard = self.creation.lock();
        let mut committed = self.committed.write();
        if committed.contains_key(name) {
            return Err(ContainerError::configuration(
                name,
                "a singleton instance is already registered under this name",
            ));
        }
        committed.insert(name.to_string(), instance);
        Ok(())
    }

    /// Whether a committed singleton exists for `name`.
    pub fn contains_singleton(&self, name: &str) -> bool {
        self.committed.read().contains_key(name)
    }

    /// Names of all committed singletons.
    pub fn singleton_names(&self) -> Vec<String> {
        self.committed.read().keys().cloned().collect()
    }

    /// Whether the singleton for `name` is currently being created.
    pub fn is_singleton_in_creation(&self, name: &str) -> bool {
        let guard = self.creation.lock();
        let state = guard.borrow();
        state.in_creation.contains(name)
    }

    /// Whether `name` is currently being created in any scope — singleton
    /// (any thread) or prototype/custom (this call chain).
    pub fn is_in_creation(&self, name: &str) -> bool {
        inflight::contains(name) || self.is_singleton_in_creation(name)
    }

    pub(crate) fn mark_singleton_in_creation(&self, name: &str) -> bool {
        let guard = self.creation.lock();
        let mut state = guard.borrow_mut();
        state.in_creation.insert(name.to_string())
    }

    pub(crate) fn unmark_singleton_in_creation(&self, name: &str) {
        let guard = self.creation.lock();
        let mut state = guard.borrow_mut();
        state.in_creation.remove(name);
    }

    // ----- custom scopes -----

    /// Registers a scope strategy under `scope_name`.
    pub fn register_scope(&self, scope_name: &str, strategy: Arc<dyn Scope>) {
        self.scopes
            .write()
            .insert(scope_name.to_string(), strategy);
    }

    /// The strategy registered under `scope_name`, if any.
    pub fn scope(&self, scope_name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.read().get(scope_name).cloned()
    }

    /// Names of all registered scope strategies.
    pub fn scope_names(&self) -> Vec<String> {
        self.scopes.read().keys().cloned().collect()
    }

    // ----- depends-on tracking -----

    /// Records that `dependent` declared a depends-on edge to `name`.
    pub fn register_dependent(&self, name: &str, dependent: &str) {
        let mut dependents = self.dependents.lock();
        dependents
            .entry(name.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// Whether `dependent` transitively depends on `name`.
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let dependents = self.dependents.lock();
        let mut seen = HashSet::new();
        Self::is_dependent_inner(&dependents, name, dependent, &mut seen)
    }

    fn is_dependent_inner(
        map: &HashMap<String, HashSet<String>>,
        name: &str,
        dependent: &str,
        seen: &mut HashSet<String>,
    ) -> bool {
        if !seen.insert(name.to_string()) {
            return false;
        }
        let Some(direct) = map.get(name) else {
            return false;
        };
        if direct.contains(dependent) {
            return true;
        }
        direct
            .iter()
            .any(|d| Self::is_dependent_inner(map, d, dependent, seen))
    }

    // ----- destruction -----

    /// Registers a callback to run when the singletons are destroyed.
    /// Callbacks run in reverse registration order.
    pub fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send>) {
        self.destruction.lock().push((name.to_string(), callback));
    }

    /// Drops all committed singletons and runs destruction callbacks in
    /// reverse registration order.
    pub fn destroy_singletons(&self) {
        let callbacks = {
            let mut destruction = self.destruction.lock();
            std::mem::take(&mut *destruction)
        };
        for (name, callback) in callbacks.into_iter().rev() {
            trace!(component = %name, "running destruction callback");
            callback();
        }
        self.committed.write().clear();
        let guard = self.creation.lock();
        let mut state = guard.borrow_mut();
        state.early.clear();
        state.suppliers.clear();
        state.products.clear();
        drop(state);
        self.dependents.lock().clear();
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        InstanceRegistry::new()
    }
}
