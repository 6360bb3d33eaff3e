//! Lenient field deserializers.
//!
//! Persisted documents have been written by many versions of the editor. A
//! single corrupt fragment must not make the whole document unreadable, so every
//! schema field goes through one of these helpers: values of the wrong shape
//! become the field's "absent" value instead of a deserialization error.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// An entry stored in an id-keyed mapping (`views`, `layers`, `displays`).
pub trait Entry: DeserializeOwned {
    const KIND: &'static str;
}

/// Strings only; anything else (including `""`) is absent.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) if !value.is_empty() => Some(value),
        _ => None,
    })
}

/// `None` when the value does not parse as `T`.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

/// `T::default()` when the value does not parse as `T`.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// `null` reads as `T::default()`; any other value must parse as `T`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Id-keyed mapping where each malformed entry is dropped on its own.
pub fn entries<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Entry,
{
    let value = Value::deserialize(deserializer)?;
    Ok(entries_from_value(value))
}

pub fn entries_from_value<T: Entry>(value: Value) -> BTreeMap<String, T> {
    let map = match value {
        Value::Object(map) => map,
        Value::Null => return BTreeMap::new(),
        other => {
            log::warn!(
                "expected a mapping of {} entries, found {}; treating as empty",
                T::KIND,
                json_kind(&other)
            );
            return BTreeMap::new();
        }
    };

    let mut out = BTreeMap::new();
    for (key, mut raw) in map {
        let Value::Object(fields) = &mut raw else {
            log::warn!("dropping {} entry {key}: not an object", T::KIND);
            continue;
        };
        match fields.get("id") {
            Some(Value::String(id)) if *id == key => {}
            Some(Value::String(id)) if !id.is_empty() => {
                log::debug!("{} entry {key} stored id {id}; using the key", T::KIND);
                fields.insert("id".to_string(), Value::String(key.clone()));
            }
            _ => {
                fields.insert("id".to_string(), Value::String(key.clone()));
            }
        }
        match serde_json::from_value::<T>(raw) {
            Ok(entry) => {
                out.insert(key, entry);
            }
            Err(err) => log::warn!("dropping {} entry {key}: {err}", T::KIND),
        }
    }
    out
}

#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
