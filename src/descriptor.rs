//! Component descriptors: the declarative unit of configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::registry::Instance;

/// Component scopes controlling instance caching behavior.
///
/// A descriptor that declares no scope defaults to [`ScopeKind::Singleton`]
/// at merge time (nested descriptors may instead inherit the enclosing
/// descriptor's scope, see [`MergeEngine::resolve_nested`]).
///
/// [`MergeEngine::resolve_nested`]: crate::merge::MergeEngine::resolve_nested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// One shared instance for the container's lifetime, created lazily on
    /// first request and cached forever.
    Singleton,
    /// A fresh instance on every request, never cached by the container.
    Prototype,
    /// Delegated to a registered [`Scope`](crate::traits::Scope) strategy
    /// looked up by this name.
    Named(String),
}

impl ScopeKind {
    /// The scope name as it appears in configuration.
    pub fn name(&self) -> &str {
        match self {
            ScopeKind::Singleton => "singleton",
            ScopeKind::Prototype => "prototype",
            ScopeKind::Named(name) => name,
        }
    }
}

/// Where a declared argument value comes from.
///
/// `Literal` values are static and may be cached post-conversion; the other
/// sources are dynamic — they are re-fetched on every resolution of a cached
/// construction plan rather than frozen at first resolution.
#[derive(Clone)]
pub enum ArgumentSource {
    /// An inline value, converted to the parameter type at bind time.
    Literal(Instance),
    /// A reference to another component, looked up by name at bind time.
    Reference(String),
    /// An expression handed to the configured
    /// [`ExpressionEvaluator`](crate::traits::ExpressionEvaluator).
    Expression(String),
    /// A nested descriptor materialized fresh at bind time; inherits the
    /// enclosing descriptor's scope when non-singleton.
    Inner(Arc<ComponentDescriptor>),
}

impl fmt::Debug for ArgumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentSource::Literal(_) => f.write_str("Literal(..)"),
            ArgumentSource::Reference(name) => write!(f, "Reference({:?})", name),
            ArgumentSource::Expression(expr) => write!(f, "Expression({:?})", expr),
            ArgumentSource::Inner(d) => write!(f, "Inner({:?})", d.name),
        }
    }
}

/// One declared constructor/factory-method argument.
#[derive(Debug, Clone)]
pub struct ArgumentDef {
    /// The value source.
    pub source: ArgumentSource,
    /// Optional declared type name; an indexed or generic value only binds to
    /// a parameter whose type carries this name.
    pub declared_type_name: Option<String>,
    /// Optional argument name, matched against parameter names.
    pub name: Option<String>,
}

impl ArgumentDef {
    /// An inline literal value.
    pub fn value(value: Instance) -> Self {
        ArgumentDef {
            source: ArgumentSource::Literal(value),
            declared_type_name: None,
            name: None,
        }
    }

    /// A by-name reference to another component.
    pub fn reference(component: impl Into<String>) -> Self {
        ArgumentDef {
            source: ArgumentSource::Reference(component.into()),
            declared_type_name: None,
            name: None,
        }
    }

    /// An expression evaluated at bind time.
    pub fn expression(expr: impl Into<String>) -> Self {
        ArgumentDef {
            source: ArgumentSource::Expression(expr.into()),
            declared_type_name: None,
            name: None,
        }
    }

    /// A nested component descriptor materialized at bind time.
    pub fn inner(descriptor: ComponentDescriptor) -> Self {
        ArgumentDef {
            source: ArgumentSource::Inner(Arc::new(descriptor)),
            declared_type_name: None,
            name: None,
        }
    }

    /// Constrains this argument to parameters of the given declared type name.
    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.declared_type_name = Some(type_name.into());
        self
    }

    /// Names this argument for name-based parameter matching.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether this argument must be re-fetched on every reuse of a cached
    /// construction plan.
    pub fn is_dynamic(&self) -> bool {
        !matches!(self.source, ArgumentSource::Literal(_))
    }
}

/// Declared constructor/factory-method arguments: positional-indexed plus
/// generic (unordered, matched by type/name or consumed in declaration order).
#[derive(Debug, Clone, Default)]
pub struct ArgumentValues {
    /// Arguments pinned to a parameter position.
    pub indexed: BTreeMap<usize, ArgumentDef>,
    /// Untargeted arguments, each consumable by at most one parameter.
    pub generic: Vec<ArgumentDef>,
}

impl ArgumentValues {
    /// Total number of declared arguments.
    pub fn len(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    /// True when no arguments are declared.
    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    /// Applies a child descriptor's arguments over these: indexed values are
    /// overridden per position, generic values are appended.
    pub(crate) fn apply_overrides(&mut self, child: &ArgumentValues) {
        for (index, def) in &child.indexed {
            self.indexed.insert(*index, def.clone());
        }
        self.generic.extend(child.generic.iter().cloned());
    }
}

/// Declarative configuration for one constructible component.
///
/// Descriptors are plain data: they declare *what* to build (type or
/// producer, scope, arguments) and are flattened through their parent chain
/// by the [`MergeEngine`](crate::merge::MergeEngine) before any resolution
/// decision is taken.
///
/// # Examples
///
/// ```rust
/// use crucible_di::{ArgumentDef, ComponentDescriptor, ScopeKind};
/// use std::sync::Arc;
///
/// let descriptor = ComponentDescriptor::new("greeter")
///     .with_type_name("Greeter")
///     .with_scope(ScopeKind::Prototype)
///     .with_indexed_arg(0, ArgumentDef::value(Arc::new("hello".to_string())));
///
/// assert_eq!(descriptor.name, "greeter");
/// assert_eq!(descriptor.arguments.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    /// The component name this descriptor is registered under.
    pub name: String,
    /// Declared type name, resolved through the type introspector. May be
    /// absent for factory-built or abstract template descriptors.
    pub type_name: Option<String>,
    /// Declared scope; `None` defaults to singleton at merge time.
    pub scope: Option<ScopeKind>,
    /// Parent descriptor name for inheritance flattening.
    pub parent: Option<String>,
    /// Declared constructor/factory-method arguments.
    pub arguments: ArgumentValues,
    /// Name of the component whose factory method produces this one. When
    /// absent but `factory_method` is set, the method is looked up statically
    /// on the declared type.
    pub factory_component: Option<String>,
    /// Factory method name on the factory component (or declared type).
    pub factory_method: Option<String>,
    /// Declared output type of a producer component, used to answer type
    /// queries without instantiating the producer.
    pub produced_type_name: Option<String>,
    /// Abstract descriptors are pure templates and cannot be requested.
    pub is_abstract: bool,
    /// Lazily initialized (not pre-instantiated by eager warm-up).
    pub lazy_init: bool,
    /// Synthetic descriptors are container-internal; producer post-processing
    /// is skipped for them.
    pub synthetic: bool,
    /// Names that must be fully created before this component.
    pub depends_on: Vec<String>,
    /// Initialization callback method name, invoked by the layer above this
    /// core.
    pub init_method: Option<String>,
    /// Destruction callback method name.
    pub destroy_method: Option<String>,
    /// Lenient (default) vs strict executable overload resolution.
    pub lenient_binding: bool,
    /// Resolve unbound parameters by dependency lookup.
    pub autowire_args: bool,
    /// Descriptor provenance (resource description) for diagnostics.
    pub origin: Option<String>,
}

impl ComponentDescriptor {
    /// Creates an empty descriptor registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        ComponentDescriptor {
            name: name.into(),
            type_name: None,
            scope: None,
            parent: None,
            arguments: ArgumentValues::default(),
            factory_component: None,
            factory_method: None,
            produced_type_name: None,
            is_abstract: false,
            lazy_init: false,
            synthetic: false,
            depends_on: Vec::new(),
            init_method: None,
            destroy_method: None,
            lenient_binding: true,
            autowire_args: false,
            origin: None,
        }
    }

    /// Sets the declared type name.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Sets the scope.
    pub fn with_scope(mut self, scope: ScopeKind) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Sets the parent descriptor name.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declares an argument pinned to parameter position `index`.
    pub fn with_indexed_arg(mut self, index: usize, def: ArgumentDef) -> Self {
        self.arguments.indexed.insert(index, def);
        self
    }

    /// Declares an untargeted argument.
    pub fn with_generic_arg(mut self, def: ArgumentDef) -> Self {
        self.arguments.generic.push(def);
        self
    }

    /// Declares this component as built by `method` on the named factory
    /// component.
    pub fn with_factory(
        mut self,
        component: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.factory_component = Some(component.into());
        self.factory_method = Some(method.into());
        self
    }

    /// Declares this component as built by a static factory method on its
    /// declared type.
    pub fn with_static_factory(mut self, method: impl Into<String>) -> Self {
        self.factory_method = Some(method.into());
        self
    }

    /// Declares the output type of a producer component.
    pub fn with_produced_type(mut self, type_name: impl Into<String>) -> Self {
        self.produced_type_name = Some(type_name.into());
        self
    }

    /// Marks this descriptor as an abstract template.
    pub fn abstract_template(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Marks this descriptor as lazily initialized.
    pub fn lazy(mut self) -> Self {
        self.lazy_init = true;
        self
    }

    /// Marks this descriptor as container-internal.
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    /// Adds a name that must be fully created before this component.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    /// Sets the initialization callback method name.
    pub fn with_init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    /// Sets the destruction callback method name.
    pub fn with_destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }

    /// Requires strict (fully-assignable, ambiguity-rejecting) overload
    /// resolution for this component.
    pub fn strict_binding(mut self) -> Self {
        self.lenient_binding = false;
        self
    }

    /// Resolves unbound constructor parameters by dependency lookup.
    pub fn with_autowiring(mut self) -> Self {
        self.autowire_args = true;
        self
    }

    /// Records where this descriptor was defined, for diagnostics.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}
