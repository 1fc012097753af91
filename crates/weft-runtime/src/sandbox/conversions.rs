//! JSON <-> JavaScript value conversions.
//!
//! Bidirectional conversion between `serde_json::Value` and Boa's `JsValue`,
//! used in two places: seeding the per-session `weft.session` namespace from
//! configuration, and carrying descriptor objects built by module code out
//! of the sandbox as JSON.
//!
//! Symbol keys are skipped when converting objects; symbols themselves
//! become JSON null.

use boa_engine::{
    js_string,
    object::{builtins::JsArray, JsObject},
    property::PropertyKey,
    value::JsValue,
    Context,
};
use serde_json::Value as JsonValue;
use weft_core::{Result, WeftError};

/// Converts `serde_json::Value` to a Boa `JsValue`, recursively.
///
/// # Errors
///
/// Returns [`WeftError::Execution`] if a number is out of range for
/// JavaScript's Number type or if object/array construction fails.
pub fn json_to_js_value(json: JsonValue, ctx: &mut Context) -> Result<JsValue> {
    match json {
        JsonValue::Null => Ok(JsValue::null()),
        JsonValue::Bool(b) => Ok(JsValue::new(b)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(JsValue::new)
            .or_else(|| n.as_i64().map(JsValue::new))
            .ok_or_else(|| WeftError::Execution("number out of range".into())),
        JsonValue::String(s) => Ok(JsValue::new(js_string!(s))),
        JsonValue::Array(arr) => {
            let js_array = JsArray::new(ctx);
            for (i, v) in arr.into_iter().enumerate() {
                let js_value = json_to_js_value(v, ctx)?;
                js_array.push(js_value, ctx).map_err(|e| {
                    WeftError::Execution(format!("failed to push array element {}: {}", i, e))
                })?;
            }
            Ok(js_array.into())
        }
        JsonValue::Object(obj) => {
            let js_obj = JsObject::with_object_proto(ctx.intrinsics());
            for (key, value) in obj {
                let js_value = json_to_js_value(value, ctx)?;
                js_obj
                    .create_data_property_or_throw(js_string!(key.clone()), js_value, ctx)
                    .map_err(|e| {
                        WeftError::Execution(format!("failed to set property '{}': {}", key, e))
                    })?;
            }
            Ok(js_obj.into())
        }
    }
}

/// Converts a Boa `JsValue` to `serde_json::Value`, recursively.
///
/// `undefined`, `null` and symbols all map to JSON null.
///
/// # Errors
///
/// Returns [`WeftError::Execution`] if a string fails UTF-16 conversion, a
/// float has no JSON representation, or property access fails.
pub fn js_value_to_json(value: JsValue, ctx: &mut Context) -> Result<JsonValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(JsonValue::Null);
    }

    if let Some(b) = value.as_boolean() {
        return Ok(JsonValue::Bool(b));
    }

    if let JsValue::Integer(i) = &value {
        return Ok(JsonValue::Number((*i).into()));
    }

    if let Some(n) = value.as_number() {
        return serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .ok_or_else(|| WeftError::Execution("float has no JSON representation".into()));
    }

    if let Some(s) = value.as_string() {
        return Ok(JsonValue::String(s.to_std_string().map_err(|e| {
            WeftError::Execution(format!("string conversion error: {:?}", e))
        })?));
    }

    if value.is_object() {
        let obj = value
            .as_object()
            .ok_or_else(|| WeftError::Execution("object value without object reference".into()))?;

        if obj.is_array() {
            let array = JsArray::from_object(obj.clone())
                .map_err(|e| WeftError::Execution(format!("not a valid array: {}", e)))?;

            let length = array
                .length(ctx)
                .map_err(|e| WeftError::Execution(format!("failed to get array length: {}", e)))?
                .try_into()
                .map_err(|_| WeftError::Execution("array length overflow".into()))?;

            let mut result = Vec::with_capacity(length);
            for i in 0..length {
                let elem = array.get(i, ctx).map_err(|e| {
                    WeftError::Execution(format!("failed to get array element {}: {}", i, e))
                })?;
                result.push(js_value_to_json(elem, ctx)?);
            }
            return Ok(JsonValue::Array(result));
        }

        let keys = obj
            .own_property_keys(ctx)
            .map_err(|e| WeftError::Execution(format!("failed to get object keys: {}", e)))?;

        let mut result = serde_json::Map::new();
        for key in keys {
            let key_str = match &key {
                PropertyKey::String(s) => s.to_std_string().map_err(|e| {
                    WeftError::Execution(format!("string conversion error: {:?}", e))
                })?,
                PropertyKey::Index(i) => i.get().to_string(),
                PropertyKey::Symbol(_) => continue,
            };

            let prop_value = obj.get(key.clone(), ctx).map_err(|e| {
                WeftError::Execution(format!("failed to get property '{}': {}", key_str, e))
            })?;
            result.insert(key_str, js_value_to_json(prop_value, ctx)?);
        }

        return Ok(JsonValue::Object(result));
    }

    Ok(JsonValue::Null)
}
