//! Factory indirection: components that produce other components.
//!
//! A producer component is not the end value itself; requests for its name
//! yield the object it produces, with a second resolution hop for both the
//! instance and its type. Prefixing the name with [`PRODUCER_PREFIX`]
//! requests the producer itself, bypassing unwrapping.

use std::sync::Arc;

use tracing::debug;

use crate::error::{BoxError, ContainerError, ContainerResult};
use crate::introspect::TypeRef;
use crate::registry::{Instance, InstanceRegistry};
use crate::traits::ProductPostProcessor;

/// Indirection marker: `&name` requests the producer registered under
/// `name` rather than the object it produces.
pub const PRODUCER_PREFIX: &str = "&";

/// Whether `name` requests the producer itself.
pub fn is_producer_request(name: &str) -> bool {
    name.starts_with(PRODUCER_PREFIX)
}

/// Strips any number of indirection markers off `name`.
pub fn canonical_name(name: &str) -> &str {
    name.trim_start_matches(PRODUCER_PREFIX)
}

/// A component that produces the object exposed under its name.
pub trait Producer: Send + Sync {
    /// Produces the exposed object. `Ok(None)` means the producer has no
    /// value: while the producer is mid-creation this is a retryable
    /// condition, otherwise it becomes the [`NullPlaceholder`] instance.
    fn produce(&self) -> Result<Option<Instance>, BoxError>;

    /// The type of the produced object, when the producer can tell without
    /// producing one.
    fn output_type(&self) -> Option<TypeRef> {
        None
    }

    /// Whether produced objects are shared (cached per name) or fresh per
    /// request.
    fn is_singleton(&self) -> bool {
        true
    }
}

/// Type-erased wrapper that marks an instance as a producer.
///
/// Instantiation strategies return producer components wrapped in this
/// handle; the container recognizes it when deciding whether to unwrap.
pub struct ProducerHandle(pub Arc<dyn Producer>);

impl ProducerHandle {
    /// Wraps `producer` into a registerable instance.
    pub fn instance(producer: impl Producer + 'static) -> Instance {
        Arc::new(ProducerHandle(Arc::new(producer)))
    }
}

/// Downcasts an instance to its producer handle, when it is one.
pub fn as_producer(instance: &Instance) -> Option<&ProducerHandle> {
    instance.downcast_ref::<ProducerHandle>()
}

/// Stand-in for "the producer legitimately produced no value".
///
/// Never exposed as a raw absence: downstream identity checks must be able
/// to distinguish "no value yet" (an error) from "produced nothing".
pub struct NullPlaceholder;

/// A fresh null-placeholder instance.
pub fn null_placeholder() -> Instance {
    Arc::new(NullPlaceholder)
}

/// Whether `instance` is the null placeholder.
pub fn is_null_placeholder(instance: &Instance) -> bool {
    instance.downcast_ref::<NullPlaceholder>().is_some()
}

/// Per-request resolver for the producer double hop.
pub(crate) struct ProducerResolver<'a> {
    registry: &'a InstanceRegistry,
    post: &'a dyn ProductPostProcessor,
}

impl<'a> ProducerResolver<'a> {
    pub(crate) fn new(registry: &'a InstanceRegistry, post: &'a dyn ProductPostProcessor) -> Self {
        ProducerResolver { registry, post }
    }

    /// Returns the object produced for `name`, consulting the producer-output
    /// cache for singleton producers.
    ///
    /// The cache lives under the same lock as singleton creation. After the
    /// producer runs, the cache is re-checked and an already-cached value
    /// wins — production may have re-entered the container and populated it
    /// (circular-reference processing). Post-processing is deferred while
    /// `name` is mid-creation: the unprocessed object is returned uncached so
    /// in-flight early references stay undisturbed.
    pub(crate) fn get_product(
        &self,
        name: &str,
        handle: &ProducerHandle,
        post_process: bool,
    ) -> ContainerResult<Instance> {
        if handle.0.is_singleton() && self.registry.contains_singleton(name) {
            let guard = self.registry.creation_guard();
            if let Some(existing) = guard.borrow().products.get(name).cloned() {
                return Ok(existing);
            }
            let produced = self.produce(name, handle)?;
            if let Some(existing) = guard.borrow().products.get(name).cloned() {
                return Ok(existing);
            }
            let object = if post_process {
                if self.registry.is_singleton_in_creation(name) {
                    return Ok(produced);
                }
                self.registry.mark_singleton_in_creation(name);
                let result = self.post.post_process(name, produced);
                self.registry.unmark_singleton_in_creation(name);
                result.map_err(|source| ContainerError::Producer {
                    name: name.to_string(),
                    source,
                })?
            } else {
                produced
            };
            if self.registry.contains_singleton(name) {
                guard
                    .borrow_mut()
                    .products
                    .insert(name.to_string(), object.clone());
            }
            Ok(object)
        } else {
            let produced = self.produce(name, handle)?;
            if post_process {
                self.post
                    .post_process(name, produced)
                    .map_err(|source| ContainerError::Producer {
                        name: name.to_string(),
                        source,
                    })
            } else {
                Ok(produced)
            }
        }
    }

    fn produce(&self, name: &str, handle: &ProducerHandle) -> ContainerResult<Instance> {
        debug!(component = name, "invoking producer");
        match handle.0.produce() {
            Ok(Some(value)) => Ok(value),
            Ok(None) => {
                if self.registry.is_singleton_in_creation(name) {
                    Err(ContainerError::ProducerNotReady {
                        name: name.to_string(),
                    })
                } else {
                    Ok(null_placeholder())
                }
            }
            Err(source) => Err(ContainerError::Producer {
                name: name.to_string(),
                source,
            }),
        }
    }
}
