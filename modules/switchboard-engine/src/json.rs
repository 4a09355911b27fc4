//! JSON object contexts and lenient decoding of raw middleware returns.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::MediatorError;
use crate::middleware::MiddlewareOutcome;
use crate::traits::Context;

/// A JSON object context: string keys, arbitrary JSON values.
pub type JsonObject = serde_json::Map<String, Value>;

impl Context for JsonObject {
    type Patch = JsonObject;

    fn merge(&mut self, patch: JsonObject) {
        for (key, value) in patch {
            self.insert(key, value);
        }
    }
}

/// Unwrap a JSON value that must be an object.
pub fn into_object(value: Value) -> Result<JsonObject, MediatorError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MediatorError::NotAnObject(kind(&other))),
    }
}

/// Serialize a typed value into an object context.
pub fn to_object<T: Serialize>(value: &T) -> Result<JsonObject, MediatorError> {
    into_object(serde_json::to_value(value)?)
}

/// Deserialize an object context back into a typed value.
pub fn from_object<T: DeserializeOwned>(object: JsonObject) -> Result<T, MediatorError> {
    Ok(serde_json::from_value(Value::Object(object))?)
}

impl MiddlewareOutcome<JsonObject> {
    /// Interpret a raw JSON middleware return.
    ///
    /// - `null` and any non-object value: `Pass`.
    /// - `{"cancel": true, ..}`: `Cancel`.
    /// - any other object: a change object. Its `pendingChanges` replaces the
    ///   running value; absent or `null` clears it.
    ///
    /// A `pendingChanges` that is neither an object nor `null` is ignored.
    pub fn from_json(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(fields) => fields,
            Value::Null => return MiddlewareOutcome::Pass,
            other => {
                debug!(kind = kind(&other), "Ignoring non-object middleware return");
                return MiddlewareOutcome::Pass;
            }
        };

        if fields.get("cancel") == Some(&Value::Bool(true)) {
            return MiddlewareOutcome::Cancel;
        }

        match fields.remove("pendingChanges") {
            None | Some(Value::Null) => MiddlewareOutcome::Apply(None),
            Some(Value::Object(changes)) => MiddlewareOutcome::Apply(Some(changes)),
            Some(other) => {
                debug!(kind = kind(&other), "Ignoring malformed pendingChanges");
                MiddlewareOutcome::Pass
            }
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
