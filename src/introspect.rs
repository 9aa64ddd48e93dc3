//! Type and executable introspection model.
//!
//! The resolution algorithm never touches a concrete reflection mechanism;
//! it depends only on the capabilities exposed here — opaque [`TypeRef`]
//! handles, [`ExecutableDescriptor`] signatures, and the
//! [`TypeIntrospector`](crate::traits::TypeIntrospector) collaborator that
//! answers assignability questions. [`TypeSpace`] is the in-crate
//! implementation: a programmatic type model that doubles as the default
//! instantiation strategy.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BoxError;
use crate::merge::MergedDescriptor;
use crate::registry::Instance;
use crate::traits::{InstantiationStrategy, TypeIntrospector};

/// Opaque handle to a type in the introspector's model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(pub(crate) u32);

/// Opaque handle to a registered executable (constructor or factory method).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutableId(pub(crate) u32);

/// Whether an executable is a constructor or a factory method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableKind {
    /// A constructor of the component's own type.
    Constructor,
    /// A method on a factory owner type (static or instance-bound).
    FactoryMethod,
}

/// Signature of one executable candidate.
///
/// This is the pluggable executable capability the resolver scores against:
/// parameter types, optional parameter names, accessibility, and the
/// declaring type. It carries no invocation logic — execution goes through
/// the [`InstantiationStrategy`](crate::traits::InstantiationStrategy).
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableDescriptor {
    /// Identity within the introspector that produced it.
    pub id: ExecutableId,
    /// Constructor or factory method.
    pub kind: ExecutableKind,
    /// The type declaring this executable.
    pub declaring_type: TypeRef,
    /// Method name for factory methods, `None` for constructors.
    pub method_name: Option<String>,
    /// Parameter types, in order.
    pub param_types: Vec<TypeRef>,
    /// Parameter names, when the introspector knows them.
    pub param_names: Option<Vec<String>>,
    /// Public executables sort ahead of non-public ones.
    pub public: bool,
}

impl ExecutableDescriptor {
    /// Number of parameters this executable accepts.
    pub fn param_count(&self) -> usize {
        self.param_types.len()
    }

    /// The name of parameter `index`, if known.
    pub fn param_name(&self, index: usize) -> Option<&str> {
        self.param_names
            .as_ref()
            .and_then(|names| names.get(index))
            .map(String::as_str)
    }
}

type CtorFn = Arc<dyn Fn(&[Instance]) -> Result<Instance, BoxError> + Send + Sync>;
type FactoryFn = Arc<dyn Fn(Option<&Instance>, &[Instance]) -> Result<Instance, BoxError> + Send + Sync>;
type EmptyFn = Arc<dyn Fn() -> Instance + Send + Sync>;

enum Invoker {
    Constructor(CtorFn),
    Factory(FactoryFn),
}

struct TypeRecord {
    name: String,
    supertypes: Vec<TypeRef>,
    interfaces: Vec<TypeRef>,
    empty_collection: Option<EmptyFn>,
    producer: bool,
    constructors: Vec<ExecutableDescriptor>,
    factory_methods: HashMap<String, Vec<ExecutableDescriptor>>,
}

/// Programmatic type model implementing both
/// [`TypeIntrospector`](crate::traits::TypeIntrospector) and
/// [`InstantiationStrategy`](crate::traits::InstantiationStrategy).
///
/// Types are registered with a display name and optionally linked to a Rust
/// type so that runtime instances (type-erased `Arc` values) can be mapped
/// back to the model. Supertype edges cost 2 per step and interface edges
/// cost 1, which is the distance metric the overload-resolution weights are
/// built on. Executables are registered with an invocation closure, erased
/// the same way the construction callbacks of a service registration are.
///
/// # Examples
///
/// ```rust
/// use crucible_di::TypeSpace;
/// use std::sync::Arc;
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// let mut space = TypeSpace::new();
/// let t_string = space.register_rust::<String>("String");
/// let t_greeter = space.register_rust::<Greeter>("Greeter");
/// space.add_constructor(t_greeter, &[t_string], true, |args| {
///     let greeting = args[0].downcast_ref::<String>().cloned().unwrap();
///     Ok(Arc::new(Greeter { greeting }))
/// });
/// ```
pub struct TypeSpace {
    types: Vec<TypeRecord>,
    by_name: HashMap<String, TypeRef>,
    by_rust: HashMap<TypeId, TypeRef>,
    invokers: Vec<Invoker>,
}

impl TypeSpace {
    /// Creates an empty type model.
    pub fn new() -> Self {
        TypeSpace {
            types: Vec::new(),
            by_name: HashMap::new(),
            by_rust: HashMap::new(),
            invokers: Vec::new(),
        }
    }

    /// Registers a type under `name` without linking it to a Rust type.
    pub fn register(&mut self, name: impl Into<String>) -> TypeRef {
        let name = name.into();
        let type_ref = TypeRef(self.types.len() as u32);
        self.by_name.insert(name.clone(), type_ref);
        self.types.push(TypeRecord {
            name,
            supertypes: Vec::new(),
            interfaces: Vec::new(),
            empty_collection: None,
            producer: false,
            constructors: Vec::new(),
            factory_methods: HashMap::new(),
        });
        type_ref
    }

    /// Registers a type under `name` and links it to the Rust type `T`, so
    /// instances of `T` map back to the returned handle.
    pub fn register_rust<T: 'static>(&mut self, name: impl Into<String>) -> TypeRef {
        let type_ref = self.register(name);
        self.by_rust.insert(TypeId::of::<T>(), type_ref);
        type_ref
    }

    /// Adds a supertype edge (`child` extends `parent`); costs 2 distance
    /// units per step.
    pub fn add_supertype(&mut self, child: TypeRef, parent: TypeRef) {
        self.types[child.0 as usize].supertypes.push(parent);
    }

    /// Adds an interface edge (`t` implements `interface`); costs 1 distance
    /// unit.
    pub fn add_interface(&mut self, t: TypeRef, interface: TypeRef) {
        self.types[t.0 as usize].interfaces.push(interface);
    }

    /// Marks `t` as a collection-shaped type with the given empty value.
    ///
    /// Collection-shaped parameters degrade to this empty value when a
    /// single-candidate autowired lookup finds no dependency.
    pub fn mark_collection<F>(&mut self, t: TypeRef, empty: F)
    where
        F: Fn() -> Instance + Send + Sync + 'static,
    {
        self.types[t.0 as usize].empty_collection = Some(Arc::new(empty));
    }

    /// Marks `t` as a producer (factory-indirection) type.
    pub fn mark_producer(&mut self, t: TypeRef) {
        self.types[t.0 as usize].producer = true;
    }

    /// Registers a constructor of `t` with its invocation closure.
    pub fn add_constructor<F>(
        &mut self,
        t: TypeRef,
        params: &[TypeRef],
        public: bool,
        invoke: F,
    ) -> ExecutableId
    where
        F: Fn(&[Instance]) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        self.add_constructor_inner(t, params, None, public, Arc::new(invoke))
    }

    /// Registers a constructor of `t` with named parameters.
    pub fn add_named_constructor<F>(
        &mut self,
        t: TypeRef,
        params: &[(&str, TypeRef)],
        public: bool,
        invoke: F,
    ) -> ExecutableId
    where
        F: Fn(&[Instance]) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        let types: Vec<TypeRef> = params.iter().map(|(_, t)| *t).collect();
        let names: Vec<String> = params.iter().map(|(n, _)| n.to_string()).collect();
        self.add_constructor_inner(t, &types, Some(names), public, Arc::new(invoke))
    }

    fn add_constructor_inner(
        &mut self,
        t: TypeRef,
        params: &[TypeRef],
        param_names: Option<Vec<String>>,
        public: bool,
        invoke: CtorFn,
    ) -> ExecutableId {
        let id = ExecutableId(self.invokers.len() as u32);
        self.invokers.push(Invoker::Constructor(invoke));
        let descriptor = ExecutableDescriptor {
            id,
            kind: ExecutableKind::Constructor,
            declaring_type: t,
            method_name: None,
            param_types: params.to_vec(),
            param_names,
            public,
        };
        self.types[t.0 as usize].constructors.push(descriptor);
        id
    }

    /// Registers a factory method named `method` on `owner`.
    ///
    /// The invocation closure receives the factory instance (`None` for
    /// static factory methods) and the bound arguments.
    pub fn add_factory_method<F>(
        &mut self,
        owner: TypeRef,
        method: impl Into<String>,
        params: &[TypeRef],
        public: bool,
        invoke: F,
    ) -> ExecutableId
    where
        F: Fn(Option<&Instance>, &[Instance]) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        let method = method.into();
        let id = ExecutableId(self.invokers.len() as u32);
        self.invokers.push(Invoker::Factory(Arc::new(invoke)));
        let descriptor = ExecutableDescriptor {
            id,
            kind: ExecutableKind::FactoryMethod,
            declaring_type: owner,
            method_name: Some(method.clone()),
            param_types: params.to_vec(),
            param_names: None,
            public,
        };
        self.types[owner.0 as usize]
            .factory_methods
            .entry(method)
            .or_default()
            .push(descriptor);
        id
    }

    fn record(&self, t: TypeRef) -> &TypeRecord {
        &self.types[t.0 as usize]
    }
}

impl Default for TypeSpace {
    fn default() -> Self {
        TypeSpace::new()
    }
}

impl TypeIntrospector for TypeSpace {
    fn resolve_name(&self, type_name: &str) -> Option<TypeRef> {
        self.by_name.get(type_name).copied()
    }

    fn type_name(&self, t: TypeRef) -> String {
        self.record(t).name.clone()
    }

    fn type_of_value(&self, value: &Instance) -> Option<TypeRef> {
        self.by_rust.get(&(**value).type_id()).copied()
    }

    fn constructors(&self, t: TypeRef) -> Vec<ExecutableDescriptor> {
        self.record(t).constructors.clone()
    }

    fn factory_methods(&self, owner: TypeRef, method_name: &str) -> Vec<ExecutableDescriptor> {
        self.record(owner)
            .factory_methods
            .get(method_name)
            .cloned()
            .unwrap_or_default()
    }

    fn assignment_distance(&self, from: TypeRef, to: TypeRef) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        // Cheapest widening path: supertype steps cost 2, interface edges 1.
        let mut best: Option<u32> = None;
        let mut pending = vec![(from, 0u32)];
        let mut seen: HashMap<TypeRef, u32> = HashMap::new();
        while let Some((current, cost)) = pending.pop() {
            if let Some(prev) = seen.get(&current) {
                if *prev <= cost {
                    continue;
                }
            }
            seen.insert(current, cost);
            if current == to {
                best = Some(best.map_or(cost, |b| b.min(cost)));
                continue;
            }
            let record = self.record(current);
            for parent in &record.supertypes {
                pending.push((*parent, cost + 2));
            }
            for interface in &record.interfaces {
                pending.push((*interface, cost + 1));
            }
        }
        best
    }

    fn is_collection_like(&self, t: TypeRef) -> bool {
        self.record(t).empty_collection.is_some()
    }

    fn empty_collection(&self, t: TypeRef) -> Option<Instance> {
        self.record(t).empty_collection.as_ref().map(|f| f())
    }

    fn is_producer_type(&self, t: TypeRef) -> bool {
        self.record(t).producer
    }
}

impl InstantiationStrategy for TypeSpace {
    fn instantiate(
        &self,
        _descriptor: &MergedDescriptor,
        name: &str,
        executable: &ExecutableDescriptor,
        args: &[Instance],
    ) -> Result<Instance, BoxError> {
        match self.invokers.get(executable.id.0 as usize) {
            Some(Invoker::Constructor(invoke)) => invoke(args),
            Some(Invoker::Factory(_)) => Err(format!(
                "executable for '{}' is a factory method, not a constructor",
                name
            )
            .into()),
            None => Err(format!("unknown executable for '{}'", name).into()),
        }
    }

    fn instantiate_with_factory(
        &self,
        _descriptor: &MergedDescriptor,
        name: &str,
        factory_instance: Option<&Instance>,
        executable: &ExecutableDescriptor,
        args: &[Instance],
    ) -> Result<Instance, BoxError> {
        match self.invokers.get(executable.id.0 as usize) {
            Some(Invoker::Factory(invoke)) => invoke(factory_instance, args),
            Some(Invoker::Constructor(_)) => Err(format!(
                "executable for '{}' is a constructor, not a factory method",
                name
            )
            .into()),
            None => Err(format!("unknown executable for '{}'", name).into()),
        }
    }
}
