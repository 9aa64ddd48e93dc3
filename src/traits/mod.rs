//! Collaborator traits: the narrow seams this core consumes its external
//! collaborators through.

mod collaborators;
mod scope;

pub use collaborators::{
    DependencyError, DependencyResolver, DescriptorStore, ExpressionEvaluator,
    InstantiationStrategy, NoAutowire, NoopPostProcessor, ParameterSite, ProductPostProcessor,
    TypeConverter, TypeIntrospector,
};
pub use scope::Scope;
