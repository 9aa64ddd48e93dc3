//! External collaborator contracts.
//!
//! The core has no wire or file format of its own; its boundary is this set
//! of in-process contracts. Descriptor parsing, property injection, proxying,
//! and the full type-conversion subsystem live behind these traits and are
//! not reimplemented here.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::container::Container;
use crate::descriptor::ComponentDescriptor;
use crate::error::{BoxError, ContainerResult};
use crate::introspect::{ExecutableDescriptor, TypeRef};
use crate::merge::MergedDescriptor;
use crate::registry::Instance;

/// Source of raw component descriptors, keyed by name.
pub trait DescriptorStore: Send + Sync {
    /// Looks up the raw descriptor registered under `name`.
    fn descriptor(&self, name: &str) -> Option<Arc<ComponentDescriptor>>;

    /// Whether a descriptor is registered under `name`.
    fn contains(&self, name: &str) -> bool;

    /// All registered descriptor names.
    fn descriptor_names(&self) -> Vec<String>;
}

/// Materializes raw instances from a chosen executable and bound arguments.
///
/// Any failure is wrapped by the container into a creation error carrying the
/// component name and descriptor provenance.
pub trait InstantiationStrategy: Send + Sync {
    /// Invokes a constructor with the given arguments.
    fn instantiate(
        &self,
        descriptor: &MergedDescriptor,
        name: &str,
        executable: &ExecutableDescriptor,
        args: &[Instance],
    ) -> Result<Instance, BoxError>;

    /// Invokes a factory method, instance-bound when `factory_instance` is
    /// present and static otherwise.
    fn instantiate_with_factory(
        &self,
        descriptor: &MergedDescriptor,
        name: &str,
        factory_instance: Option<&Instance>,
        executable: &ExecutableDescriptor,
        args: &[Instance],
    ) -> Result<Instance, BoxError>;
}

/// One parameter position of an executable, as seen by dependency lookup.
#[derive(Debug)]
pub struct ParameterSite<'a> {
    /// The executable the parameter belongs to.
    pub executable: &'a ExecutableDescriptor,
    /// Zero-based parameter position.
    pub index: usize,
    /// The required parameter type.
    pub param_type: TypeRef,
    /// The parameter name, when the introspector knows it.
    pub param_name: Option<&'a str>,
}

/// Dependency lookup failures.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// No candidate matched the parameter.
    #[error("no dependency candidate found for {0}")]
    NotFound(String),
    /// More than one equally-good candidate matched.
    #[error("multiple dependency candidates found for {0}")]
    NonUnique(String),
    /// The lookup itself failed.
    #[error("{0}")]
    Failed(#[source] BoxError),
}

/// Resolves an unbound executable parameter by dependency lookup.
///
/// Consulted only when a descriptor enables argument autowiring and no
/// declared value matched the parameter.
pub trait DependencyResolver: Send + Sync {
    /// Resolves a value for `site`, on behalf of component `requesting`.
    ///
    /// `tracking` accumulates the names of components touched by the lookup,
    /// when the caller wants them for dependency registration.
    fn resolve(
        &self,
        container: &Container,
        site: &ParameterSite<'_>,
        requesting: &str,
        tracking: Option<&mut HashSet<String>>,
        converter: &dyn TypeConverter,
    ) -> Result<Instance, DependencyError>;
}

/// Default dependency resolver: every lookup fails with `NotFound`.
pub struct NoAutowire;

impl DependencyResolver for NoAutowire {
    fn resolve(
        &self,
        _container: &Container,
        site: &ParameterSite<'_>,
        _requesting: &str,
        _tracking: Option<&mut HashSet<String>>,
        _converter: &dyn TypeConverter,
    ) -> Result<Instance, DependencyError> {
        Err(DependencyError::NotFound(format!(
            "parameter {} (no dependency resolver configured)",
            site.index
        )))
    }
}

/// Converts a raw value to a required target type.
pub trait TypeConverter: Send + Sync {
    /// Converts `value` to `target`, or fails with a type-mismatch error.
    fn convert(
        &self,
        value: &Instance,
        target: TypeRef,
        types: &dyn TypeIntrospector,
    ) -> ContainerResult<Instance>;
}

/// Answers type and executable questions for the resolution algorithm.
///
/// The resolver depends only on this capability, not on any specific
/// reflection mechanism; [`TypeSpace`](crate::introspect::TypeSpace) is the
/// in-crate implementation.
pub trait TypeIntrospector: Send + Sync {
    /// Resolves a declared type name to a type handle.
    fn resolve_name(&self, type_name: &str) -> Option<TypeRef>;

    /// Display name of a type.
    fn type_name(&self, t: TypeRef) -> String;

    /// Maps a runtime instance back to its type, when the model knows it.
    fn type_of_value(&self, value: &Instance) -> Option<TypeRef>;

    /// All visible constructors of `t`.
    fn constructors(&self, t: TypeRef) -> Vec<ExecutableDescriptor>;

    /// All methods named `method_name` on `owner`.
    fn factory_methods(&self, owner: TypeRef, method_name: &str) -> Vec<ExecutableDescriptor>;

    /// Widening distance from `from` to `to`; `None` when not assignable,
    /// `Some(0)` for an exact match. Lower is a better overload match.
    fn assignment_distance(&self, from: TypeRef, to: TypeRef) -> Option<u32>;

    /// Whether `t` has a collection/array/map shape.
    fn is_collection_like(&self, t: TypeRef) -> bool;

    /// An empty value of collection-shaped type `t`.
    fn empty_collection(&self, t: TypeRef) -> Option<Instance>;

    /// Whether instances of `t` are producers requiring indirection
    /// unwrapping.
    fn is_producer_type(&self, t: TypeRef) -> bool;

    /// Renders an executable signature for diagnostics.
    fn describe_executable(&self, executable: &ExecutableDescriptor) -> String {
        let params: Vec<String> = executable
            .param_types
            .iter()
            .map(|t| self.type_name(*t))
            .collect();
        match &executable.method_name {
            Some(method) => format!(
                "{}::{}({})",
                self.type_name(executable.declaring_type),
                method,
                params.join(", ")
            ),
            None => format!(
                "{}({})",
                self.type_name(executable.declaring_type),
                params.join(", ")
            ),
        }
    }
}

/// Evaluates declared argument expressions at bind time.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluates `expression` against the container.
    fn evaluate(&self, expression: &str, container: &Container) -> Result<Instance, BoxError>;
}

/// Hook applied to producer output before it is cached and exposed.
///
/// This stands in for the post-processing layer above this core; the default
/// implementation passes the product through unchanged.
pub trait ProductPostProcessor: Send + Sync {
    /// Post-processes the produced object for component `name`.
    fn post_process(&self, name: &str, product: Instance) -> Result<Instance, BoxError>;
}

/// Default post-processor: returns the product unchanged.
pub struct NoopPostProcessor;

impl ProductPostProcessor for NoopPostProcessor {
    fn post_process(&self, _name: &str, product: Instance) -> Result<Instance, BoxError> {
        Ok(product)
    }
}
