//! Custom scope strategy contract.

use crate::error::ContainerResult;
use crate::registry::Instance;

/// An externally supplied scope strategy, registered under a scope name.
///
/// The container wraps `get` in the same before/after creation bookkeeping it
/// applies to prototypes — a scoped instance is a prototype with an external
/// eviction policy. Strategies own their storage and decide when `supplier`
/// runs.
///
/// # Examples
///
/// ```rust
/// use crucible_di::{ContainerResult, Instance, Scope};
/// use parking_lot::Mutex;
/// use std::collections::HashMap;
///
/// #[derive(Default)]
/// struct MapScope {
///     instances: Mutex<HashMap<String, Instance>>,
/// }
///
/// impl Scope for MapScope {
///     fn get(
///         &self,
///         name: &str,
///         supplier: &mut dyn FnMut() -> ContainerResult<Instance>,
///     ) -> ContainerResult<Instance> {
///         if let Some(existing) = self.instances.lock().get(name) {
///             return Ok(existing.clone());
///         }
///         let created = supplier()?;
///         self.instances
///             .lock()
///             .insert(name.to_string(), created.clone());
///         Ok(created)
///     }
///
///     fn remove(&self, name: &str) -> Option<Instance> {
///         self.instances.lock().remove(name)
///     }
///
///     fn register_destruction_callback(
///         &self,
///         _name: &str,
///         _callback: Box<dyn FnOnce() + Send>,
///     ) {
///     }
/// }
/// ```
pub trait Scope: Send + Sync {
    /// Returns the instance for `name` in this scope, invoking `supplier` to
    /// create it if the scope holds none.
    fn get(
        &self,
        name: &str,
        supplier: &mut dyn FnMut() -> ContainerResult<Instance>,
    ) -> ContainerResult<Instance>;

    /// Removes and returns the instance for `name`, if the scope holds one.
    fn remove(&self, name: &str) -> Option<Instance>;

    /// Registers a callback to run when `name` is evicted from this scope.
    fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send>);
}
