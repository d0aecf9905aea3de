//! Lenient numeric coercion for every input boundary.
//!
//! Setup fields, loose metrics objects and persisted snapshots all pass
//! through here. Anything that is not a finite, non-negative number ends up
//! as 0 instead of an error.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce a JSON value to a finite, non-negative f64.
pub fn number(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    non_negative(raw)
}

/// Coerce an optional JSON value (missing field) to a non-negative f64.
pub fn field(value: Option<&Value>) -> f64 {
    value.map(number).unwrap_or(0.0)
}

/// Clamp a raw float: NaN, infinities and negatives become 0.
pub fn non_negative(n: f64) -> f64 {
    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}

/// Truncating count coercion.
pub fn count(value: &Value) -> u32 {
    let n = number(value).trunc();
    if n >= u32::MAX as f64 {
        u32::MAX
    } else {
        n as u32
    }
}

/// Round and clamp a score into 0..=100.
pub fn score(n: f64) -> u32 {
    non_negative(n).round().min(100.0) as u32
}

pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value))
}

pub fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(count(&value))
}

pub fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = number(&value).trunc();
    Ok(if n >= u64::MAX as f64 { u64::MAX } else { n as u64 })
}

pub fn lenient_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(score(number(&value)))
}
