//! Default type converter.

use std::collections::HashMap;

use crate::error::{BoxError, ContainerError, ContainerResult};
use crate::introspect::TypeRef;
use crate::producer::is_null_placeholder;
use crate::registry::Instance;
use crate::traits::{TypeConverter, TypeIntrospector};

type ConvertFn = Box<dyn Fn(&Instance) -> Result<Instance, BoxError> + Send + Sync>;

/// Conversion-function registry implementing [`TypeConverter`].
///
/// Values already assignable to the target type pass through unchanged;
/// otherwise a conversion registered for the `(from, to)` type pair is
/// applied; anything else is a type mismatch.
///
/// # Examples
///
/// ```rust
/// use crucible_di::{SimpleTypeConverter, TypeSpace};
/// use std::sync::Arc;
///
/// let mut space = TypeSpace::new();
/// let t_string = space.register_rust::<String>("String");
/// let t_int = space.register_rust::<i64>("i64");
///
/// let mut converter = SimpleTypeConverter::new();
/// converter.add(t_string, t_int, |value| {
///     let text = value.downcast_ref::<String>().unwrap();
///     let parsed: i64 = text.parse()?;
///     Ok(Arc::new(parsed))
/// });
/// ```
pub struct SimpleTypeConverter {
    conversions: HashMap<(TypeRef, TypeRef), ConvertFn>,
}

impl SimpleTypeConverter {
    /// Creates a converter with no registered conversions; only assignable
    /// values pass.
    pub fn new() -> Self {
        SimpleTypeConverter {
            conversions: HashMap::new(),
        }
    }

    /// Registers a conversion from `from` to `to`.
    pub fn add<F>(&mut self, from: TypeRef, to: TypeRef, convert: F)
    where
        F: Fn(&Instance) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        self.conversions.insert((from, to), Box::new(convert));
    }
}

impl Default for SimpleTypeConverter {
    fn default() -> Self {
        SimpleTypeConverter::new()
    }
}

impl TypeConverter for SimpleTypeConverter {
    fn convert(
        &self,
        value: &Instance,
        target: TypeRef,
        types: &dyn TypeIntrospector,
    ) -> ContainerResult<Instance> {
        if is_null_placeholder(value) {
            return Ok(value.clone());
        }
        let value_type = types.type_of_value(value);
        if let Some(from) = value_type {
            if types.assignment_distance(from, target).is_some() {
                return Ok(value.clone());
            }
            if let Some(convert) = self.conversions.get(&(from, target)) {
                return convert(value).map_err(|_| ContainerError::TypeMismatch {
                    expected: types.type_name(target),
                    actual: types.type_name(from),
                });
            }
        }
        Err(ContainerError::TypeMismatch {
            expected: types.type_name(target),
            actual: value_type
                .map(|t| types.type_name(t))
                .unwrap_or_else(|| "<unknown>".to_string()),
        })
    }
}
