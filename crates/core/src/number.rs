//! Deserializers for plain numeric fields that pass through serde's
//! buffered paths (`flatten`, tagged and untagged enums).
//!
//! JSON numbers are kept at arbitrary precision, and a buffered number
//! reaches primitive fields as a private map rather than a number. Going
//! through [`serde_json::Value`] restores it.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Deserialize a required number.
pub fn required<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    from_number(value)
}

/// Deserialize an optional number; `null` and absence are `None`.
pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => from_number(value).map(Some),
    }
}

fn from_number<T, E>(value: Value) -> Result<T, E>
where
    T: DeserializeOwned,
    E: de::Error,
{
    if !value.is_number() {
        return Err(E::custom(format!("expected a number, got {value}")));
    }
    serde_json::from_value(value).map_err(E::custom)
}
