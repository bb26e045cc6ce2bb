//! Small accessors over a node's raw JSON params map. Every node config key
//! in the node library is optional-with-a-default except where a node's
//! constructor explicitly calls `require_field`.

use serde_json::{Map, Value};
use std::collections::HashMap;

pub fn usize_or(params: &Map<String, Value>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}

pub fn f64_or(params: &Map<String, Value>, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

pub fn bool_or(params: &Map<String, Value>, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn string_or(params: &Map<String, Value>, key: &str, default: &str) -> String {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

pub fn string_opt(params: &Map<String, Value>, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(str::to_string)
}

pub fn string_vec_or(params: &Map<String, Value>, key: &str, default: Vec<String>) -> Vec<String> {
    params
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or(default)
}

pub fn f64_map_or(
    params: &Map<String, Value>,
    key: &str,
    default: HashMap<String, f64>,
) -> HashMap<String, f64> {
    params
        .get(key)
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                .collect()
        })
        .unwrap_or(default)
}

pub fn usize_map_or(
    params: &Map<String, Value>,
    key: &str,
    default: HashMap<String, usize>,
) -> HashMap<String, usize> {
    params
        .get(key)
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n as usize)))
                .collect()
        })
        .unwrap_or(default)
}
