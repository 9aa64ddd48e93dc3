//! Error types for the container.

use thiserror::Error;

/// Boxed error type used at the collaborator seams.
///
/// Instantiation strategies, producers, and converters surface their failures
/// as plain boxed errors; the container wraps them into [`ContainerError`]
/// variants carrying the component name and descriptor provenance.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Container errors.
///
/// Represents the error conditions that can occur while merging descriptors,
/// resolving executables, or materializing component instances. Every fatal
/// variant identifies the component name so that misconfiguration is
/// diagnosable without knowledge of the resolution algorithm.
///
/// # Examples
///
/// ```rust
/// use crucible_di::ContainerError;
///
/// let err = ContainerError::CircularCreation {
///     name: "a".to_string(),
///     path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
/// };
/// assert_eq!(
///     err.to_string(),
///     "circular creation of component 'a': a -> b -> a"
/// );
/// ```
#[derive(Debug, Error)]
pub enum ContainerError {
    /// No descriptor registered under the requested name, anywhere in the
    /// container chain.
    #[error("no component descriptor found for '{name}'")]
    NotFound {
        /// The requested component name.
        name: String,
    },

    /// Fatal misconfiguration: unresolvable parent or type name, unknown
    /// scope, abstract component requested directly. Never retried.
    #[error("invalid configuration for component '{name}'{}: {reason}", origin_suffix(.origin))]
    Configuration {
        /// The offending component name.
        name: String,
        /// What is wrong with the configuration.
        reason: String,
        /// Descriptor origin, when the descriptor declared one.
        origin: Option<String>,
    },

    /// Two or more executable candidates scored the same type-distance weight
    /// under strict binding.
    #[error("ambiguous executable match for component '{name}': {}", .candidates.join(" | "))]
    Ambiguous {
        /// The component being resolved.
        name: String,
        /// Rendered signatures of the competing candidates.
        candidates: Vec<String>,
    },

    /// No candidate executable could bind all of its parameters. Carries the
    /// most specific underlying cause plus the suppressed sibling causes.
    #[error("could not resolve an executable for component '{name}': {reason}{}", suppressed_suffix(.suppressed))]
    Unsatisfied {
        /// The component being resolved.
        name: String,
        /// The most specific binding failure.
        reason: String,
        /// Binding failures from the other skipped candidates.
        suppressed: Vec<String>,
    },

    /// A creation request re-entered a name that is already being created on
    /// the current call chain (prototype or depends-on cycles, or a singleton
    /// constructor cycle with no early reference available).
    #[error("circular creation of component '{name}': {}", .path.join(" -> "))]
    CircularCreation {
        /// The name whose creation was re-entered.
        name: String,
        /// The in-flight creation path, ending at the repeated name.
        path: Vec<String>,
    },

    /// The instantiation strategy failed while materializing the component.
    #[error("error creating component '{name}': {source}")]
    Creation {
        /// The component being created.
        name: String,
        /// The underlying strategy failure.
        #[source]
        source: BoxError,
    },

    /// A producer that is itself mid-creation yielded no value. Retryable by
    /// the caller once the producer finishes initializing.
    #[error("producer for component '{name}' has not produced its object yet")]
    ProducerNotReady {
        /// The produced component name.
        name: String,
    },

    /// The producer raised while producing. Not retryable without fixing the
    /// producer.
    #[error("producer for component '{name}' failed: {source}")]
    Producer {
        /// The produced component name.
        name: String,
        /// The underlying producer failure.
        #[source]
        source: BoxError,
    },

    /// A value could not be converted to the required parameter type.
    #[error("cannot convert value of type '{actual}' to required type '{expected}'")]
    TypeMismatch {
        /// The required target type name.
        expected: String,
        /// The actual value type name, or `"<unknown>"`.
        actual: String,
    },
}

impl ContainerError {
    pub(crate) fn configuration(name: &str, reason: impl Into<String>) -> Self {
        ContainerError::Configuration {
            name: name.to_string(),
            reason: reason.into(),
            origin: None,
        }
    }

    pub(crate) fn configuration_at(
        name: &str,
        origin: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        ContainerError::Configuration {
            name: name.to_string(),
            reason: reason.into(),
            origin: origin.map(str::to_string),
        }
    }

    pub(crate) fn not_found(name: &str) -> Self {
        ContainerError::NotFound {
            name: name.to_string(),
        }
    }
}

fn origin_suffix(origin: &Option<String>) -> String {
    match origin {
        Some(o) => format!(" (defined in {})", o),
        None => String::new(),
    }
}

fn suppressed_suffix(suppressed: &[String]) -> String {
    if suppressed.is_empty() {
        String::new()
    } else {
        format!("; also tried: {}", suppressed.join("; "))
    }
}

/// Result type for container operations.
///
/// A convenience alias for `Result<T, ContainerError>` used throughout the
/// crate, following the common pattern of a crate-specific result type to
/// reduce signature boilerplate.
pub type ContainerResult<T> = Result<T, ContainerError>;
