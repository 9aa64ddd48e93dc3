//! Thread-local tracking of prototype-scoped creations in progress.
//!
//! Prototype cycles are only meaningful within one call chain on one thread,
//! so the "currently creating" multiset lives in a thread local and needs no
//! cross-thread synchronization. The stack doubles as the diagnostic path
//! carried by circular-creation errors.

use std::cell::RefCell;

use crate::error::{ContainerError, ContainerResult};

thread_local! {
    static IN_CREATION: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

/// Whether `name` is being created somewhere up the current call chain.
pub(crate) fn contains(name: &str) -> bool {
    IN_CREATION.with(|stack| stack.borrow().iter().any(|n| n == name))
}

/// A circular-creation error for `name`, carrying the in-flight path.
pub(crate) fn circular_error(name: &str) -> ContainerError {
    let mut path = IN_CREATION.with(|stack| stack.borrow().clone());
    path.push(name.to_string());
    ContainerError::CircularCreation {
        name: name.to_string(),
        path,
    }
}

/// RAII entry in the in-creation multiset; popped on drop, including along
/// error paths.
pub(crate) struct CreationGuard {
    name: String,
}

impl CreationGuard {
    /// Pushes `name` onto the in-creation stack, failing fast when it is
    /// already there — a prototype cycle has no resolution path and must be
    /// rejected before any instantiation side effect.
    pub(crate) fn enter(name: &str) -> ContainerResult<Self> {
        IN_CREATION.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|n| n == name) {
                let mut path = stack.clone();
                path.push(name.to_string());
                return Err(ContainerError::CircularCreation {
                    name: name.to_string(),
                    path,
                });
            }
            stack.push(name.to_string());
            Ok(())
        })?;
        Ok(CreationGuard {
            name: name.to_string(),
        })
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        IN_CREATION.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|n| n == &self.name) {
                stack.remove(pos);
            }
        });
    }
}
