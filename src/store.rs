//! In-memory descriptor store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::descriptor::ComponentDescriptor;
use crate::traits::DescriptorStore;

/// Name-keyed in-memory [`DescriptorStore`].
///
/// Descriptor parsing and loading from external formats stay outside this
/// core; this store is the programmatic registration surface both tests and
/// embedding applications build on. Registration is allowed after the
/// container is built — the merge engine picks new descriptors up on their
/// first resolution.
///
/// # Examples
///
/// ```rust
/// use crucible_di::{ComponentDescriptor, MemoryDescriptorStore};
/// use crucible_di::traits::DescriptorStore;
///
/// let store = MemoryDescriptorStore::new();
/// store.register(ComponentDescriptor::new("greeter").with_type_name("Greeter"));
///
/// assert!(store.contains("greeter"));
/// assert!(!store.contains("unknown"));
/// ```
pub struct MemoryDescriptorStore {
    descriptors: RwLock<HashMap<String, Arc<ComponentDescriptor>>>,
}

impl MemoryDescriptorStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryDescriptorStore {
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `descriptor` under its own name, replacing any previous
    /// registration.
    pub fn register(&self, descriptor: ComponentDescriptor) {
        self.descriptors
            .write()
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    /// Removes the descriptor registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        self.descriptors.write().remove(name)
    }
}

impl Default for MemoryDescriptorStore {
    fn default() -> Self {
        MemoryDescriptorStore::new()
    }
}

impl DescriptorStore for MemoryDescriptorStore {
    fn descriptor(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        self.descriptors.read().get(name).cloned()
    }

    fn contains(&self, name: &str) -> bool {
        self.descriptors.read().contains_key(name)
    }

    fn descriptor_names(&self) -> Vec<String> {
        self.descriptors.read().keys().cloned().collect()
    }
}
