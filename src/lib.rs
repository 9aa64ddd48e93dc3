//! # crucible-di
//!
//! Descriptor-driven object-graph construction and lifecycle container,
//! inspired by the Spring bean factory.
//!
//! ## Features
//!
//! - **Merged descriptors**: inheritance flattening with staleness
//!   invalidation and carried-forward resolution caches
//! - **Scope-aware creation**: lazily-created singletons with
//!   circular-reference-safe early exposure, prototypes with per-call-chain
//!   cycle detection, pluggable custom scopes
//! - **Overload resolution**: constructor/factory-method selection via
//!   weighted type-distance scoring with greedy ordering, explicit tie-break
//!   and fallback rules, and construction-plan caching
//! - **Factory indirection**: components that produce other components, with
//!   a dedicated product cache and double-hop type resolution
//! - **Narrow collaborator seams**: descriptor loading, property injection,
//!   proxying, and conversion plug in through object-safe traits
//!
//! ## Quick Start
//!
//! ```rust
//! use crucible_di::{ArgumentDef, ComponentDescriptor, Container, MemoryDescriptorStore, TypeSpace};
//! use std::sync::Arc;
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! // Describe the types and executables the container may use.
//! let mut space = TypeSpace::new();
//! let t_string = space.register_rust::<String>("String");
//! let t_greeter = space.register_rust::<Greeter>("Greeter");
//! space.add_constructor(t_greeter, &[t_string], true, |args| {
//!     let greeting = args[0].downcast_ref::<String>().cloned().unwrap();
//!     Ok(Arc::new(Greeter { greeting }))
//! });
//!
//! // Declare the component.
//! let store = MemoryDescriptorStore::new();
//! store.register(
//!     ComponentDescriptor::new("greeter")
//!         .with_type_name("Greeter")
//!         .with_indexed_arg(0, ArgumentDef::value(Arc::new("hello".to_string()))),
//! );
//!
//! // Wire and use the container.
//! let space = Arc::new(space);
//! let container = Container::builder()
//!     .store(Arc::new(store))
//!     .introspector(space.clone())
//!     .strategy(space)
//!     .build();
//!
//! let greeter = container.get("greeter").unwrap();
//! let greeter = greeter.downcast_ref::<Greeter>().unwrap();
//! assert_eq!(greeter.greeting, "hello");
//! ```
//!
//! ## Scopes
//!
//! Descriptors declare `singleton` (the default), `prototype`, or a named
//! custom scope backed by a registered [`Scope`] strategy. Singleton
//! creation is serialized under one coarse lock and supports early-reference
//! exposure for cycle resolution at the property-injection layer; prototype
//! cycles are always fatal and rejected before any instantiation side
//! effect.
//!
//! ## Producers
//!
//! A component implementing [`Producer`] is an indirection: requesting its
//! name yields the object it produces, while `&name` yields the producer
//! itself. Produced objects of singleton producers are cached per name under
//! the same lock as singleton creation.

// Module declarations
pub mod container;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod introspect;
pub mod merge;
pub mod producer;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod traits;

// Internal modules
mod internal;

// Re-export core types
pub use container::{Container, ContainerBuilder};
pub use convert::SimpleTypeConverter;
pub use descriptor::{ArgumentDef, ArgumentSource, ArgumentValues, ComponentDescriptor, ScopeKind};
pub use error::{BoxError, ContainerError, ContainerResult};
pub use introspect::{ExecutableDescriptor, ExecutableId, ExecutableKind, TypeRef, TypeSpace};
pub use merge::{MergeEngine, MergedDescriptor};
pub use producer::{
    as_producer, canonical_name, is_null_placeholder, is_producer_request, null_placeholder,
    NullPlaceholder, Producer, ProducerHandle, PRODUCER_PREFIX,
};
pub use registry::{EarlySupplier, Instance, InstanceRegistry};
pub use resolver::ConstructionPlan;
pub use store::MemoryDescriptorStore;
pub use traits::{
    DependencyError, DependencyResolver, DescriptorStore, ExpressionEvaluator,
    InstantiationStrategy, NoAutowire, NoopPostProcessor, ParameterSite, ProductPostProcessor,
    Scope, TypeConverter, TypeIntrospector,
};
