//! Deep merge used by `ensure`.

use serde_json::Value;

/// Recursively merge `source` into `target`.
///
/// Objects merge key by key and arrays merge index by index; the source
/// wins on every other pairing, including `null`.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_obj), Value::Object(source_obj)) => {
            for (key, value) in source_obj {
                match target_obj.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_obj.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target_arr), Value::Array(source_arr)) => {
            for (index, value) in source_arr.into_iter().enumerate() {
                match target_arr.get_mut(index) {
                    Some(existing) => deep_merge(existing, value),
                    None => target_arr.push(value),
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Merge `source` over an optional base; an absent base takes `source` as-is.
pub fn merged(base: Option<Value>, source: Value) -> Value {
    match base {
        Some(mut base) => {
            deep_merge(&mut base, source);
            base
        }
        None => source,
    }
}
