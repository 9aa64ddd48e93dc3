//! The container facade: scope-aware get-or-create over merged descriptors.

use std::sync::Arc;

use tracing::trace;

use crate::convert::SimpleTypeConverter;
use crate::descriptor::{ComponentDescriptor, ScopeKind};
use crate::error::{ContainerError, ContainerResult};
use crate::internal::inflight;
use crate::introspect::TypeRef;
use crate::merge::{MergeEngine, MergedDescriptor};
use crate::producer::{
    as_producer, canonical_name, is_producer_request, ProducerResolver, PRODUCER_PREFIX,
};
use crate::registry::{Instance, InstanceRegistry};
use crate::resolver::{CandidateSource, ExecutableResolver};
use crate::traits::{
    DependencyResolver, DescriptorStore, ExpressionEvaluator, InstantiationStrategy, NoAutowire,
    NoopPostProcessor, ProductPostProcessor, Scope, TypeConverter, TypeIntrospector,
};

/// In-process object registry: resolves component names to instances
/// according to their merged descriptors and declared scopes.
///
/// The container is a passive library invoked by caller threads. Reads of a
/// fully-created singleton are cheap and contention-free; singleton creation
/// serializes under one coarse lock (see [`InstanceRegistry`]).
///
/// Built via [`Container::builder`], wiring the collaborator seams defined
/// in [`traits`](crate::traits).
pub struct Container {
    store: Arc<dyn DescriptorStore>,
    parent: Option<Arc<Container>>,
    merge: MergeEngine,
    registry: InstanceRegistry,
    introspector: Arc<dyn TypeIntrospector>,
    strategy: Arc<dyn InstantiationStrategy>,
    converter: Arc<dyn TypeConverter>,
    dependency_resolver: Arc<dyn DependencyResolver>,
    expressions: Option<Arc<dyn ExpressionEvaluator>>,
    post_processor: Arc<dyn ProductPostProcessor>,
    allow_early_exposure: bool,
}

impl Container {
    /// Starts building a container.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    // ----- resolution -----

    /// Returns the instance registered under `name`, creating it according
    /// to its descriptor's scope if needed. Producer components are
    /// unwrapped to the object they produce unless `name` carries the
    /// [`PRODUCER_PREFIX`].
    pub fn get(&self, name: &str) -> ContainerResult<Instance> {
        self.do_get(name, None)
    }

    /// Like [`get`](Self::get), with explicit construction arguments that
    /// override the descriptor's declared arguments. Explicit arguments only
    /// matter when the request triggers creation; an already-created
    /// singleton wins, and nothing resolved from explicit arguments is
    /// written to the plan cache.
    pub fn get_with_args(&self, name: &str, args: &[Instance]) -> ContainerResult<Instance> {
        self.do_get(name, Some(args))
    }

    fn do_get(&self, requested: &str, explicit: Option<&[Instance]>) -> ContainerResult<Instance> {
        let name = canonical_name(requested);

        if explicit.is_none() {
            if let Some(shared) = self.registry.get_singleton(name, true) {
                return self.expose(requested, name, shared, None);
            }
        }

        // A prototype re-entering its own creation has no resolution path.
        if inflight::contains(name) {
            return Err(inflight::circular_error(name));
        }

        if !self.store.contains(name) {
            if let Some(parent) = &self.parent {
                return match explicit {
                    Some(args) => parent.get_with_args(requested, args),
                    None => parent.get(requested),
                };
            }
            return Err(ContainerError::not_found(name));
        }

        let md = self.merge.resolve(self, name)?;
        if md.is_abstract {
            return Err(ContainerError::configuration_at(
                name,
                md.origin.as_deref(),
                "abstract descriptors are templates and cannot be requested directly",
            ));
        }

        for dep in &md.depends_on {
            if self.registry.is_dependent(name, dep) {
                return Err(ContainerError::CircularCreation {
                    name: name.to_string(),
                    path: vec![name.to_string(), dep.clone(), name.to_string()],
                });
            }
            self.registry.register_dependent(dep, name);
            self.get(dep)?;
        }

        let instance = match &md.scope {
            ScopeKind::Singleton => self
                .registry
                .get_or_create_singleton(name, || self.create_instance(name, &md, explicit))?,
            ScopeKind::Prototype => {
                let _guard = inflight::CreationGuard::enter(name)?;
                self.create_instance(name, &md, explicit)?
            }
            ScopeKind::Named(scope_name) => {
                let strategy = self.registry.scope(scope_name).ok_or_else(|| {
                    ContainerError::configuration_at(
                        name,
                        md.origin.as_deref(),
                        format!("no scope registered under name '{}'", scope_name),
                    )
                })?;
                let mut supplier = || -> ContainerResult<Instance> {
                    let _guard = inflight::CreationGuard::enter(name)?;
                    self.create_instance(name, &md, explicit)
                };
                strategy.get(name, &mut supplier)?
            }
        };
        self.expose(requested, name, instance, Some(&md))
    }

    /// Unwraps producer components unless the producer itself was requested.
    fn expose(
        &self,
        requested: &str,
        name: &str,
        instance: Instance,
        md: Option<&MergedDescriptor>,
    ) -> ContainerResult<Instance> {
        if is_producer_request(requested) {
            if as_producer(&instance).is_none() {
                return Err(ContainerError::configuration(
                    name,
                    "component was requested with the indirection prefix but is not a producer",
                ));
            }
            return Ok(instance);
        }
        let Some(handle) = as_producer(&instance) else {
            return Ok(instance);
        };
        let post_process = match md {
            Some(m) => !m.synthetic,
            None => self
                .merged_descriptor(name)
                .map(|m| !m.synthetic)
                .unwrap_or(true),
        };
        let resolver = ProducerResolver::new(&self.registry, self.post_processor.as_ref());
        resolver.get_product(name, handle, post_process)
    }

    /// Resolves a construction plan and invokes the instantiation strategy.
    fn create_instance(
        &self,
        name: &str,
        md: &Arc<MergedDescriptor>,
        explicit: Option<&[Instance]>,
    ) -> ContainerResult<Instance> {
        let resolver = ExecutableResolver::new(self);
        let raw = if let Some(method) = md.factory_method.clone() {
            let (owner_type, owner_instance) = match &md.factory_component {
                Some(owner_name) => {
                    let owner = self.get(owner_name)?;
                    let owner_type =
                        self.introspector.type_of_value(&owner).ok_or_else(|| {
                            ContainerError::configuration(
                                name,
                                format!(
                                    "factory component '{}' has no introspectable type",
                                    owner_name
                                ),
                            )
                        })?;
                    (owner_type, Some(owner))
                }
                None => (self.resolved_type_of(name, md)?, None),
            };
            let plan = resolver.resolve(
                name,
                md,
                CandidateSource::Factory {
                    owner_type,
                    method: &method,
                },
                explicit,
            )?;
            self.strategy
                .instantiate_with_factory(
                    md,
                    name,
                    owner_instance.as_ref(),
                    &plan.executable,
                    &plan.converted_args,
                )
                .map_err(|source| ContainerError::Creation {
                    name: name.to_string(),
                    source,
                })?
        } else {
            let target_type = self.resolved_type_of(name, md)?;
            let plan = resolver.resolve(
                name,
                md,
                CandidateSource::Constructor(target_type),
                explicit,
            )?;
            self.strategy
                .instantiate(md, name, &plan.executable, &plan.converted_args)
                .map_err(|source| ContainerError::Creation {
                    name: name.to_string(),
                    source,
                })?
        };

        if md.is_singleton() && self.allow_early_exposure && self.registry.is_singleton_in_creation(name)
        {
            let early = raw.clone();
            self.registry
                .register_early_supplier(name, Box::new(move || early.clone()));
            trace!(component = name, "early reference supplier registered");
        }
        Ok(raw)
    }

    /// Materializes a nested (inner) descriptor on behalf of `enclosing`.
    pub(crate) fn create_nested(
        &self,
        enclosing: &MergedDescriptor,
        inner: &Arc<ComponentDescriptor>,
    ) -> ContainerResult<Instance> {
        let md = self.merge.resolve_nested(self, enclosing, inner)?;
        let instance = {
            let _guard = inflight::CreationGuard::enter(&inner.name)?;
            self.create_instance(&inner.name, &md, None)?
        };
        self.expose(&inner.name, &inner.name, instance, Some(&md))
    }

    pub(crate) fn evaluate_expression(
        &self,
        expression: &str,
        component: &str,
    ) -> ContainerResult<Instance> {
        match &self.expressions {
            Some(evaluator) => {
                evaluator
                    .evaluate(expression, self)
                    .map_err(|source| ContainerError::Creation {
                        name: component.to_string(),
                        source,
                    })
            }
            None => Err(ContainerError::configuration(
                component,
                "an argument uses an expression but no expression evaluator is configured",
            )),
        }
    }

    fn resolved_type_of(
        &self,
        name: &str,
        md: &MergedDescriptor,
    ) -> ContainerResult<TypeRef> {
        if let Some(t) = md.cache.lock().resolved_type {
            return Ok(t);
        }
        let type_name = md.type_name.as_deref().ok_or_else(|| {
            ContainerError::configuration_at(
                name,
                md.origin.as_deref(),
                "descriptor declares neither a type nor a resolvable factory",
            )
        })?;
        let t = self.introspector.resolve_name(type_name).ok_or_else(|| {
            ContainerError::configuration_at(
                name,
                md.origin.as_deref(),
                format!("declared type '{}' cannot be resolved", type_name),
            )
        })?;
        let mut cache = md.cache.lock();
        cache.resolved_type = Some(t);
        cache.is_producer = Some(self.introspector.is_producer_type(t));
        Ok(t)
    }

    fn descriptor_is_producer(&self, md: &MergedDescriptor) -> bool {
        if let Some(flag) = md.cache.lock().is_producer {
            return flag;
        }
        let flag = md
            .type_name
            .as_deref()
            .and_then(|tn| self.introspector.resolve_name(tn))
            .map(|t| self.introspector.is_producer_type(t))
            .unwrap_or(false);
        let mut cache = md.cache.lock();
        if cache.is_producer.is_none() {
            cache.is_producer = Some(flag);
        }
        flag
    }

    // ----- queries -----

    /// Whether a descriptor or registered singleton exists for `name`,
    /// walking the parent chain.
    pub fn contains(&self, name: &str) -> bool {
        let name = canonical_name(name);
        self.store.contains(name)
            || self.registry.contains_singleton(name)
            || self
                .parent
                .as_ref()
                .map(|p| p.contains(name))
                .unwrap_or(false)
    }

    /// Whether requests for `name` yield a shared instance.
    ///
    /// For a producer component the answer concerns the produced object, so
    /// the producer is instantiated to ask it; `&name` asks about the
    /// producer itself.
    pub fn is_singleton(&self, name: &str) -> ContainerResult<bool> {
        let canonical = canonical_name(name);
        if !self.store.contains(canonical) {
            if let Some(parent) = &self.parent {
                return parent.is_singleton(name);
            }
            return Err(ContainerError::not_found(canonical));
        }
        let md = self.merge.resolve(self, canonical)?;
        if is_producer_request(name) {
            return Ok(md.is_singleton());
        }
        if self.descriptor_is_producer(&md) {
            if !md.is_singleton() {
                return Ok(false);
            }
            let producer = self.get(&format!("{}{}", PRODUCER_PREFIX, canonical))?;
            let handle = as_producer(&producer).expect("producer request returned non-producer");
            return Ok(handle.0.is_singleton());
        }
        Ok(md.is_singleton())
    }

    /// Whether requests for `name` yield a fresh instance every time.
    pub fn is_prototype(&self, name: &str) -> ContainerResult<bool> {
        let canonical = canonical_name(name);
        if !self.store.contains(canonical) {
            if let Some(parent) = &self.parent {
                return parent.is_prototype(name);
            }
            return Err(ContainerError::not_found(canonical));
        }
        let md = self.merge.resolve(self, canonical)?;
        if is_producer_request(name) {
            return Ok(md.is_prototype());
        }
        if md.is_prototype() {
            return Ok(true);
        }
        if self.descriptor_is_producer(&md) {
            let producer = self.get(&format!("{}{}", PRODUCER_PREFIX, canonical))?;
            let handle = as_producer(&producer).expect("producer request returned non-producer");
            return Ok(!handle.0.is_singleton());
        }
        Ok(false)
    }

    /// Resolves the type a request for `name` would yield, without
    /// necessarily creating an instance.
    ///
    /// For producer components the declared output-type metadata is consulted
    /// first; the producer is only instantiated as a fallback when
    /// `allow_producer_init` permits it.
    pub fn resolve_type(
        &self,
        name: &str,
        allow_producer_init: bool,
    ) -> ContainerResult<Option<TypeRef>> {
        let canonical = canonical_name(name);
        if !self.store.contains(canonical) {
            if let Some(parent) = &self.parent {
                return parent.resolve_type(name, allow_producer_init);
            }
            return Err(ContainerError::not_found(canonical));
        }
        let md = self.merge.resolve(self, canonical)?;
        let declared = md
            .type_name
            .as_deref()
            .and_then(|tn| self.introspector.resolve_name(tn));
        let is_producer = declared
            .map(|t| self.introspector.is_producer_type(t))
            .unwrap_or(false);
        if is_producer_request(name) {
            return Ok(if is_producer { declared } else { None });
        }
        if !is_producer {
            return Ok(declared);
        }
        if let Some(produced) = &md.produced_type_name {
            return Ok(self.introspector.resolve_name(produced));
        }
        if allow_producer_init {
            let producer = self.get(&format!("{}{}", PRODUCER_PREFIX, canonical))?;
            if let Some(handle) = as_producer(&producer) {
                return Ok(handle.0.output_type());
            }
        }
        Ok(None)
    }

    /// The flattened descriptor for `name`, walking the parent chain.
    pub fn merged_descriptor(&self, name: &str) -> ContainerResult<Arc<MergedDescriptor>> {
        let canonical = canonical_name(name);
        if self.store.contains(canonical) {
            return self.merge.resolve(self, canonical);
        }
        match &self.parent {
            Some(parent) => parent.merged_descriptor(name),
            None => Err(ContainerError::not_found(canonical)),
        }
    }

    // ----- metadata cache control -----

    /// Marks the flattened descriptor for `name` stale, forcing
    /// recomputation on next access. Already-created instances are
    /// unaffected.
    pub fn mark_stale(&self, name: &str) {
        self.merge.mark_stale(canonical_name(name));
    }

    /// Whether `name` currently has a cached, non-stale flattened
    /// descriptor.
    pub fn is_eligible_for_caching(&self, name: &str) -> bool {
        self.merge.is_cached(canonical_name(name))
    }

    /// Drops all cached flattened descriptors.
    pub fn clear_metadata_cache(&self) {
        self.merge.clear();
    }

    // ----- lifecycle -----

    /// Eagerly materializes every non-lazy singleton descriptor. Producer
    /// components are instantiated as producers without triggering
    /// production.
    pub fn prewarm(&self) -> ContainerResult<()> {
        for name in self.store.descriptor_names() {
            let md = self.merge.resolve(self, &name)?;
            if md.is_abstract || !md.is_singleton() || md.lazy_init {
                continue;
            }
            if self.descriptor_is_producer(&md) {
                self.get(&format!("{}{}", PRODUCER_PREFIX, name))?;
            } else {
                self.get(&name)?;
            }
        }
        Ok(())
    }

    /// Registers a custom scope strategy under `scope_name`.
    pub fn register_scope(&self, scope_name: &str, strategy: Arc<dyn Scope>) {
        self.registry.register_scope(scope_name, strategy);
    }

    /// Names of all registered custom scopes.
    pub fn registered_scope_names(&self) -> Vec<String> {
        self.registry.scope_names()
    }

    /// Destroys all committed singletons and runs destruction callbacks in
    /// reverse registration order.
    pub fn destroy_singletons(&self) {
        self.registry.destroy_singletons();
    }

    // ----- accessors -----

    /// The instance registry backing this container.
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// The merge engine backing this container.
    pub fn merge_engine(&self) -> &MergeEngine {
        &self.merge
    }

    /// The ancestor container, when configured.
    pub fn parent(&self) -> Option<&Arc<Container>> {
        self.parent.as_ref()
    }

    pub(crate) fn local_descriptor(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        self.store.descriptor(name)
    }

    pub(crate) fn introspector(&self) -> &dyn TypeIntrospector {
        self.introspector.as_ref()
    }

    pub(crate) fn converter(&self) -> &dyn TypeConverter {
        self.converter.as_ref()
    }

    pub(crate) fn dependency_resolver(&self) -> &dyn DependencyResolver {
        self.dependency_resolver.as_ref()
    }
}

/// Builder wiring a [`Container`] out of its collaborators.
///
/// The descriptor store, type introspector, and instantiation strategy are
/// required; every other collaborator has a working default.
pub struct ContainerBuilder {
    store: Option<Arc<dyn DescriptorStore>>,
    parent: Option<Arc<Container>>,
    introspector: Option<Arc<dyn TypeIntrospector>>,
    strategy: Option<Arc<dyn InstantiationStrategy>>,
    converter: Arc<dyn TypeConverter>,
    dependency_resolver: Arc<dyn DependencyResolver>,
    expressions: Option<Arc<dyn ExpressionEvaluator>>,
    post_processor: Arc<dyn ProductPostProcessor>,
    allow_early_exposure: bool,
    cache_merged: bool,
}

impl ContainerBuilder {
    fn new() -> Self {
        ContainerBuilder {
            store: None,
            parent: None,
            introspector: None,
            strategy: None,
            converter: Arc::new(SimpleTypeConverter::new()),
            dependency_resolver: Arc::new(NoAutowire),
            expressions: None,
            post_processor: Arc::new(NoopPostProcessor),
            allow_early_exposure: true,
            cache_merged: true,
        }
    }

    /// Sets the descriptor store (required).
    pub fn store(mut self, store: Arc<dyn DescriptorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the ancestor container for parent-chain delegation.
    pub fn parent(mut self, parent: Arc<Container>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the type introspector (required).
    pub fn introspector(mut self, introspector: Arc<dyn TypeIntrospector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Sets the instantiation strategy (required).
    pub fn strategy(mut self, strategy: Arc<dyn InstantiationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Replaces the default type converter.
    pub fn converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Replaces the default (always-failing) dependency resolver.
    pub fn dependency_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.dependency_resolver = resolver;
        self
    }

    /// Configures an expression evaluator for expression argument values.
    pub fn expression_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.expressions = Some(evaluator);
        self
    }

    /// Replaces the default (no-op) producer post-processor.
    pub fn product_post_processor(mut self, post: Arc<dyn ProductPostProcessor>) -> Self {
        self.post_processor = post;
        self
    }

    /// Disables early-reference exposure for singletons mid-creation.
    pub fn disable_early_exposure(mut self) -> Self {
        self.allow_early_exposure = false;
        self
    }

    /// Disables the merged-descriptor cache; every request re-flattens.
    pub fn disable_merge_cache(mut self) -> Self {
        self.cache_merged = false;
        self
    }

    /// Builds the container.
    ///
    /// # Panics
    ///
    /// Panics when the descriptor store, introspector, or instantiation
    /// strategy is missing — a wiring bug, surfaced fail-fast.
    pub fn build(self) -> Container {
        Container {
            store: self.store.expect("ContainerBuilder requires a descriptor store"),
            parent: self.parent,
            merge: MergeEngine::new(self.cache_merged),
            registry: InstanceRegistry::new(),
            introspector: self
                .introspector
                .expect("ContainerBuilder requires a type introspector"),
            strategy: self
                .strategy
                .expect("ContainerBuilder requires an instantiation strategy"),
            converter: self.converter,
            dependency_resolver: self.dependency_resolver,
            expressions: self.expressions,
            post_processor: self.post_processor,
            allow_early_exposure: self.allow_early_exposure,
        }
    }
}
