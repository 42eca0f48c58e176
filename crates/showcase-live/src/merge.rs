use serde_json::{Map, Value};
use tracing::warn;

/// Shallow merge: top-level keys of `stored` override `defaults`; nested
/// values are replaced wholesale. A non-object `stored` value (including
/// null) leaves the defaults untouched.
pub fn shallow_merge(defaults: &Map<String, Value>, stored: &Value) -> Map<String, Value> {
    let mut merged = defaults.clone();
    match stored {
        Value::Object(fields) => {
            for (key, value) in fields {
                merged.insert(key.clone(), value.clone());
            }
        }
        Value::Null => {}
        other => warn!("ignoring non-object config value: {}", other),
    }
    merged
}
