use serde::Serialize;
use serde_json::Value;

use crate::errors::{EvalError, Result};
use crate::schema::Schema;

/// Reads a named property off a target.
///
/// `Ok(None)` means the property exists but holds no value; an unknown name is
/// [`EvalError::PropertyNotFound`].
pub trait PropertyResolver<T: ?Sized> {
    fn resolve(&self, target: &T, name: &str) -> Result<Option<Value>>;
}

/// JSON `null` counts as absent.
fn present(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}

impl<T> PropertyResolver<T> for Schema<T> {
    fn resolve(&self, target: &T, name: &str) -> Result<Option<Value>> {
        match self.read(target, name) {
            Some(Ok(value)) => Ok(present(value)),
            Some(Err(e)) => Err(EvalError::Unreadable {
                property: name.to_string(),
                reason: e.to_string(),
            }),
            None => Err(EvalError::PropertyNotFound(name.to_string())),
        }
    }
}

/// Resolves properties as fields of the target's serde representation.
///
/// Useful for plain data types that derive `Serialize` and need no schema of
/// their own for reading. The target must serialize to a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeResolver;

impl<T: Serialize + ?Sized> PropertyResolver<T> for SerdeResolver {
    fn resolve(&self, target: &T, name: &str) -> Result<Option<Value>> {
        let unreadable = |reason: String| EvalError::Unreadable {
            property: name.to_string(),
            reason,
        };
        match serde_json::to_value(target).map_err(|e| unreadable(e.to_string()))? {
            Value::Object(mut fields) => fields
                .remove(name)
                .map(present)
                .ok_or_else(|| EvalError::PropertyNotFound(name.to_string())),
            _ => Err(unreadable("target does not serialize to an object".into())),
        }
    }
}
