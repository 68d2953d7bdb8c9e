use serde_json::Value;

/// Extracts an f64 from a JSON value that may be a native number or a
/// decimal string (spec §4.1: "tolerate numeric fields transmitted as
/// decimal strings").
pub fn num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

pub fn field_num(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(num)
}
