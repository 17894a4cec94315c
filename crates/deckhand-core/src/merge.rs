//! Deep merge of default resource documents with caller overrides.
//!
//! The merge is right-biased:
//! - Objects merge recursively, key by key.
//! - Arrays and scalars in the override replace the default wholesale.
//! - A `null` override leaves the default untouched.
//! - Keys only present in the override are added as-is.

use serde_json::{Map, Value};

/// Merge `overrides` on top of `base`, returning a new document.
///
/// Neither input is modified and the result shares nothing with them, so the
/// same defaults can be layered with several override sources.
pub fn merge(base: &Value, overrides: &Value) -> Value {
    let mut merged = base.clone();
    merge_into(&mut merged, overrides.clone());
    merged
}

/// Overlay `layer` onto `target` in place.
pub fn merge_into(target: &mut Value, layer: Value) {
    match layer {
        Value::Null => {}
        Value::Object(map) => merge_object(target, map),
        other => *target = other,
    }
}

fn merge_object(target: &mut Value, map: Map<String, Value>) {
    if map.is_empty() {
        return;
    }

    if target.is_null() {
        *target = Value::Object(map);
        return;
    }

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    let Some(target_map) = target.as_object_mut() else {
        return;
    };

    for (key, value) in map {
        match target_map.get_mut(&key) {
            Some(existing) => merge_into(existing, value),
            None => {
                target_map.insert(key, value);
            }
        }
    }
}
