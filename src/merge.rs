//! Merged-descriptor computation: inheritance flattening with staleness
//! invalidation.
//!
//! The merge engine owns the name-keyed cache of flattened descriptors. The
//! full merge algorithm runs under the cache lock — parent chains are
//! followed while holding it, so two threads can never interleave
//! inconsistent generations for the same name. Recomputation is idempotent,
//! and marking an entry stale forces recomputation on next access without
//! discarding already-materialized instances.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::container::Container;
use crate::descriptor::{ArgumentValues, ComponentDescriptor, ScopeKind};
use crate::error::{ContainerError, ContainerResult};
use crate::introspect::{ExecutableDescriptor, TypeRef};
use crate::registry::Instance;
use crate::resolver::PreparedArg;

/// Three-state argument cache attached to a flattened descriptor.
pub(crate) enum ArgumentCacheState {
    /// No construction plan has been cached yet.
    Unresolved,
    /// Fully static arguments, cached post-conversion for direct replay.
    Resolved {
        raw: Vec<Instance>,
        converted: Vec<Instance>,
    },
    /// At least one argument was dynamic (reference, expression, nested
    /// descriptor, or autowired lookup); the pre-conversion sources are kept
    /// so dynamic values are re-fetched fresh on every reuse.
    Prepared(Vec<PreparedArg>),
}

impl Default for ArgumentCacheState {
    fn default() -> Self {
        ArgumentCacheState::Unresolved
    }
}

/// Mutable cross-call caches carried by a flattened descriptor.
///
/// Guarded by one mutex so concurrent readers see either a fully-updated
/// cache or none of it.
#[derive(Default)]
pub(crate) struct ResolutionCache {
    pub(crate) resolved_type: Option<TypeRef>,
    pub(crate) is_producer: Option<bool>,
    pub(crate) executable: Option<ExecutableDescriptor>,
    pub(crate) arguments: ArgumentCacheState,
}

/// A descriptor with all parent-chain overrides applied, plus the mutable
/// resolution caches reused across requests.
///
/// Owned exclusively by the [`MergeEngine`]; at most one non-stale instance
/// exists per top-level component name.
pub struct MergedDescriptor {
    /// The component name this flattened descriptor belongs to.
    pub name: String,
    /// Declared type name after inheritance flattening.
    pub type_name: Option<String>,
    /// Concrete scope; descriptors without one default to singleton here.
    pub scope: ScopeKind,
    /// Merged declared arguments (parent values with child overrides).
    pub arguments: ArgumentValues,
    /// Factory owner component, when factory-built.
    pub factory_component: Option<String>,
    /// Factory method name, when factory-built.
    pub factory_method: Option<String>,
    /// Declared producer output type.
    pub produced_type_name: Option<String>,
    /// Abstract template flag; abstract components cannot be requested.
    pub is_abstract: bool,
    /// Lazy initialization flag.
    pub lazy_init: bool,
    /// Container-internal flag; disables producer post-processing.
    pub synthetic: bool,
    /// Names that must be fully created first.
    pub depends_on: Vec<String>,
    /// Initialization callback name for the layer above this core.
    pub init_method: Option<String>,
    /// Destruction callback name.
    pub destroy_method: Option<String>,
    /// Lenient vs strict executable resolution.
    pub lenient_binding: bool,
    /// Resolve unbound parameters by dependency lookup.
    pub autowire_args: bool,
    /// Descriptor provenance.
    pub origin: Option<String>,
    generation: u64,
    stale: AtomicBool,
    pub(crate) cache: Mutex<ResolutionCache>,
}

impl MergedDescriptor {
    fn from_raw(raw: &ComponentDescriptor, generation: u64) -> Self {
        MergedDescriptor {
            name: raw.name.clone(),
            type_name: raw.type_name.clone(),
            scope: raw.scope.clone().unwrap_or(ScopeKind::Singleton),
            arguments: raw.arguments.clone(),
            factory_component: raw.factory_component.clone(),
            factory_method: raw.factory_method.clone(),
            produced_type_name: raw.produced_type_name.clone(),
            is_abstract: raw.is_abstract,
            lazy_init: raw.lazy_init,
            synthetic: raw.synthetic,
            depends_on: raw.depends_on.clone(),
            init_method: raw.init_method.clone(),
            destroy_method: raw.destroy_method.clone(),
            lenient_binding: raw.lenient_binding,
            autowire_args: raw.autowire_args,
            origin: raw.origin.clone(),
            generation,
            stale: AtomicBool::new(false),
            cache: Mutex::new(ResolutionCache::default()),
        }
    }

    fn from_parent(parent: &MergedDescriptor, child: &ComponentDescriptor, generation: u64) -> Self {
        let mut arguments = parent.arguments.clone();
        arguments.apply_overrides(&child.arguments);
        MergedDescriptor {
            name: child.name.clone(),
            // Declared type wins when the child has one.
            type_name: child.type_name.clone().or_else(|| parent.type_name.clone()),
            // Scope, laziness, abstractness and depends-on come from the
            // child, never the parent.
            scope: child.scope.clone().unwrap_or(ScopeKind::Singleton),
            arguments,
            factory_component: child
                .factory_component
                .clone()
                .or_else(|| parent.factory_component.clone()),
            factory_method: child
                .factory_method
                .clone()
                .or_else(|| parent.factory_method.clone()),
            produced_type_name: child
                .produced_type_name
                .clone()
                .or_else(|| parent.produced_type_name.clone()),
            is_abstract: child.is_abstract,
            lazy_init: child.lazy_init,
            synthetic: child.synthetic,
            depends_on: child.depends_on.clone(),
            init_method: child
                .init_method
                .clone()
                .or_else(|| parent.init_method.clone()),
            destroy_method: child
                .destroy_method
                .clone()
                .or_else(|| parent.destroy_method.clone()),
            lenient_binding: child.lenient_binding,
            autowire_args: child.autowire_args,
            origin: child.origin.clone(),
            generation,
            stale: AtomicBool::new(false),
            cache: Mutex::new(ResolutionCache::default()),
        }
    }

    /// Merge generation stamp; changes whenever this name is recomputed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this cached entry has been marked stale.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub(crate) fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// True for singleton-scoped descriptors.
    pub fn is_singleton(&self) -> bool {
        self.scope == ScopeKind::Singleton
    }

    /// True for prototype-scoped descriptors.
    pub fn is_prototype(&self) -> bool {
        self.scope == ScopeKind::Prototype
    }

    /// True when this component is built by a factory method.
    pub fn is_factory_built(&self) -> bool {
        self.factory_method.is_some()
    }

    /// The cached resolved executable, when a construction plan has been
    /// computed for this descriptor.
    pub fn resolved_executable(&self) -> Option<ExecutableDescriptor> {
        self.cache.lock().executable.clone()
    }

    /// The cached resolved concrete type, if type discovery has run.
    pub fn resolved_type(&self) -> Option<TypeRef> {
        self.cache.lock().resolved_type
    }

    /// Whether the identity-bearing attributes match, making cross-resolution
    /// caches safe to carry forward across a recompute.
    fn same_resolution_identity(&self, other: &MergedDescriptor) -> bool {
        self.type_name == other.type_name
            && self.factory_component == other.factory_component
            && self.factory_method == other.factory_method
    }

    fn carry_caches_from(&self, previous: &MergedDescriptor) {
        let prev = previous.cache.lock();
        let mut cache = self.cache.lock();
        cache.resolved_type = prev.resolved_type;
        cache.is_producer = prev.is_producer;
        cache.executable = prev.executable.clone();
    }
}

/// Flattens descriptors through their parent chains and caches the results.
pub struct MergeEngine {
    merged: Mutex<HashMap<String, Arc<MergedDescriptor>>>,
    generation: AtomicU64,
    cache_enabled: AtomicBool,
}

impl MergeEngine {
    pub(crate) fn new(cache_enabled: bool) -> Self {
        MergeEngine {
            merged: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            cache_enabled: AtomicBool::new(cache_enabled),
        }
    }

    /// Returns the flattened descriptor for `name`, recomputing on cache miss
    /// or staleness.
    pub fn resolve(
        &self,
        container: &Container,
        name: &str,
    ) -> ContainerResult<Arc<MergedDescriptor>> {
        let mut map = self.merged.lock();
        let mut visiting = HashSet::new();
        self.resolve_locked(container, &mut map, name, &mut visiting)
    }

    fn resolve_locked(
        &self,
        container: &Container,
        map: &mut HashMap<String, Arc<MergedDescriptor>>,
        name: &str,
        visiting: &mut HashSet<String>,
    ) -> ContainerResult<Arc<MergedDescriptor>> {
        if let Some(existing) = map.get(name) {
            if !existing.is_stale() {
                return Ok(existing.clone());
            }
        }
        if !visiting.insert(name.to_string()) {
            return Err(ContainerError::configuration(
                name,
                "descriptor inheritance chain cycles back on itself",
            ));
        }
        let raw = container
            .local_descriptor(name)
            .ok_or_else(|| ContainerError::not_found(name))?;
        let previous = map.get(name).cloned();
        let merged = Arc::new(self.merge_descriptor(container, map, name, &raw, visiting)?);
        if let Some(previous) = previous {
            if merged.same_resolution_identity(&previous) {
                merged.carry_caches_from(&previous);
            }
        }
        debug!(
            component = name,
            generation = merged.generation(),
            "flattened descriptor computed"
        );
        if self.cache_enabled.load(Ordering::Acquire) {
            map.insert(name.to_string(), merged.clone());
        }
        Ok(merged)
    }

    fn merge_descriptor(
        &self,
        container: &Container,
        map: &mut HashMap<String, Arc<MergedDescriptor>>,
        name: &str,
        raw: &ComponentDescriptor,
        visiting: &mut HashSet<String>,
    ) -> ContainerResult<MergedDescriptor> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        match &raw.parent {
            None => Ok(MergedDescriptor::from_raw(raw, generation)),
            Some(parent_name) => {
                let parent = self.resolve_parent(container, map, name, parent_name, visiting)?;
                Ok(MergedDescriptor::from_parent(&parent, raw, generation))
            }
        }
    }

    fn resolve_parent(
        &self,
        container: &Container,
        map: &mut HashMap<String, Arc<MergedDescriptor>>,
        name: &str,
        parent_name: &str,
        visiting: &mut HashSet<String>,
    ) -> ContainerResult<Arc<MergedDescriptor>> {
        if parent_name == name {
            // A self-referential parent name can only be satisfied by an
            // ancestor container holding a descriptor under the same name.
            return match container.parent() {
                Some(ancestor) => ancestor.merged_descriptor(parent_name),
                None => Err(ContainerError::configuration(
                    name,
                    format!(
                        "parent name '{}' is equal to the component name, \
                         and no ancestor container is configured",
                        parent_name
                    ),
                )),
            };
        }
        if container.local_descriptor(parent_name).is_some() {
            return self.resolve_locked(container, map, parent_name, visiting);
        }
        match container.parent() {
            Some(ancestor) => ancestor.merged_descriptor(parent_name),
            None => Err(ContainerError::configuration(
                name,
                format!("parent descriptor '{}' could not be resolved", parent_name),
            )),
        }
    }

    /// Flattens a nested (inner) descriptor against its enclosing
    /// descriptor. Nested results are never cached, and a nested descriptor
    /// that would default to singleton inherits a non-singleton enclosing
    /// scope — an inner singleton cannot outlive a non-singleton outer.
    pub fn resolve_nested(
        &self,
        container: &Container,
        enclosing: &MergedDescriptor,
        inner: &ComponentDescriptor,
    ) -> ContainerResult<Arc<MergedDescriptor>> {
        let mut map = self.merged.lock();
        let mut visiting = HashSet::new();
        let mut merged =
            self.merge_descriptor(container, &mut map, &inner.name, inner, &mut visiting)?;
        if inner.scope.is_none() && enclosing.scope != ScopeKind::Singleton {
            merged.scope = enclosing.scope.clone();
        }
        Ok(Arc::new(merged))
    }

    /// Marks the cached entry for `name` stale, forcing recomputation on next
    /// access while leaving already-created instances untouched.
    pub fn mark_stale(&self, name: &str) {
        if let Some(existing) = self.merged.lock().get(name) {
            debug!(component = name, "flattened descriptor marked stale");
            existing.mark_stale();
        }
    }

    /// Whether `name` currently has a cached, non-stale flattened descriptor.
    pub fn is_cached(&self, name: &str) -> bool {
        self.merged
            .lock()
            .get(name)
            .map(|md| !md.is_stale())
            .unwrap_or(false)
    }

    /// Drops every cached flattened descriptor.
    pub fn clear(&self) {
        self.merged.lock().clear();
    }

    pub(crate) fn set_cache_enabled(&self, enabled: bool) {
        self.cache_enabled.store(enabled, Ordering::Release);
    }
}
