//! Request content and its normalization.
//!
//! Params and bodies travel through the pipeline as [`Content`], a closed set of
//! shapes. Typed models are converted into the mapping shape up front through
//! [`Model`], so the serializer never has to guess what it was handed.
//!
//! # Structure
//!
//! - `json` - JSON encoding with the compact `", "` / `": "` layout

mod json;

use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Timelike};
use serde::Serialize;

pub use json::to_json_bytes;

/// A single field value inside a [`Fields`] mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Date-time without an offset, e.g. `2023-05-05T08:00:00`.
    DateTime(NaiveDateTime),
    /// Date-time carrying a UTC offset, e.g. `2023-05-05T08:00:00+02:00`.
    ZonedDateTime(DateTime<FixedOffset>),
    Duration(TimeDelta),
    /// Nested arrays and objects, kept as raw JSON.
    Json(serde_json::Value),
}

impl Value {
    /// Rewrites transport-unfriendly types into text or numbers.
    ///
    /// Date-times become ISO-8601 strings, durations become their total
    /// length in seconds, and booleans become `"True"` / `"False"`.
    pub fn normalize(self) -> Value {
        match self {
            Value::DateTime(dt) => Value::Text(iso8601(&dt)),
            Value::ZonedDateTime(dt) => {
                Value::Text(format!("{}{}", iso8601(&dt.naive_local()), dt.format("%:z")))
            }
            Value::Duration(delta) => Value::Float(total_seconds(delta)),
            Value::Bool(flag) => Value::Text(bool_text(flag).to_string()),
            other => other,
        }
    }

    /// The value as it appears in a query string or form body.
    /// Returns `None` for nulls, which are left out of the encoding.
    pub fn to_query_value(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Json(serde_json::Value::String(s)) => Some(s.clone()),
            Value::Json(serde_json::Value::Null) => None,
            Value::Json(v) => Some(v.to_string()),
            other => match other.clone().normalize() {
                Value::Text(s) => Some(s),
                Value::Integer(i) => Some(i.to_string()),
                Value::Float(f) => Some(serde_json::Value::from(f).to_string()),
                _ => None,
            },
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(flag) => serde_json::Value::Bool(*flag),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Json(v) => v.clone(),
            other => other.clone().normalize().to_json(),
        }
    }

    fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .unwrap_or(Value::Json(serde_json::Value::Number(n))),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}

fn iso8601(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() / 1_000 == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

fn total_seconds(delta: TimeDelta) -> f64 {
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
}

fn bool_text(flag: bool) -> &'static str {
    if flag { "True" } else { "False" }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::ZonedDateTime(dt)
    }
}

impl From<TimeDelta> for Value {
    fn from(delta: TimeDelta) -> Self {
        Value::Duration(delta)
    }
}

/// Durations beyond [`TimeDelta::MAX`] saturate to it.
impl From<std::time::Duration> for Value {
    fn from(duration: std::time::Duration) -> Self {
        Value::Duration(TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX))
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::from_json(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An ordered field mapping. Insertion order is the wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, replacing the value of an existing field with the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Converts a serializable struct or map into fields, keeping field order.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect()),
            other => bail!("Expected a JSON object, got {}", json_kind(&other)),
        }
    }

    fn normalize(self) -> Self {
        self.0.into_iter().map(|(k, v)| (k, v.normalize())).collect()
    }

    fn to_json(&self) -> serde_json::Value {
        let map = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// A typed model that can describe itself as an ordered field mapping.
///
/// Plain serde structs can delegate to [`Fields::from_serialize`]. Models
/// holding date-times or durations list their fields explicitly so the values
/// keep their types until normalization.
pub trait Model {
    fn to_fields(&self) -> Result<Fields>;
}

/// Params or body content of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Content {
    #[default]
    Absent,
    /// Already encoded payload, sent as-is.
    Bytes(Vec<u8>),
    Sequence(Vec<Content>),
    Mapping(Fields),
}

impl Content {
    pub fn bytes(payload: impl Into<Vec<u8>>) -> Self {
        Content::Bytes(payload.into())
    }

    /// Converts a typed model into the mapping variant.
    pub fn model<T: Model + ?Sized>(model: &T) -> Result<Self> {
        Ok(Content::Mapping(model.to_fields()?))
    }

    /// Converts a list of typed models into a sequence of mappings.
    pub fn models<'a, T, I>(models: I) -> Result<Self>
    where
        T: Model + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        models
            .into_iter()
            .map(Content::model)
            .collect::<Result<Vec<_>>>()
            .map(Content::Sequence)
    }

    /// Converts any serializable value: objects become mappings, arrays become
    /// sequences and null becomes [`Content::Absent`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Self::from_json(serde_json::to_value(value)?)
    }

    fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Content::Absent),
            serde_json::Value::Object(map) => Ok(Content::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            )),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Content::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Content::Sequence),
            other => bail!(
                "Cannot use a JSON {} as request content",
                json_kind(&other)
            ),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Content::Absent)
    }

    /// Normalizes content so the transport only sees strings and numbers.
    pub fn serialize(self) -> Content {
        match self {
            Content::Absent => Content::Absent,
            Content::Bytes(payload) => Content::Bytes(payload),
            Content::Sequence(items) => {
                Content::Sequence(items.into_iter().map(Content::serialize).collect())
            }
            Content::Mapping(fields) => Content::Mapping(fields.normalize()),
        }
    }

    /// JSON representation, or `None` for absent content and raw bytes.
    ///
    /// Fails when raw bytes are nested inside a sequence, since they have no
    /// JSON form.
    pub fn to_json(&self) -> Result<Option<serde_json::Value>> {
        match self {
            Content::Absent | Content::Bytes(_) => Ok(None),
            Content::Sequence(items) => items
                .iter()
                .map(|item| match item {
                    Content::Absent => Ok(serde_json::Value::Null),
                    Content::Bytes(_) => bail!("Cannot encode raw bytes inside a JSON sequence"),
                    other => Ok(other.to_json()?.unwrap_or(serde_json::Value::Null)),
                })
                .collect::<Result<Vec<_>>>()
                .map(|items| Some(serde_json::Value::Array(items))),
            Content::Mapping(fields) => Ok(Some(fields.to_json())),
        }
    }

    /// Flattens mappings into `(key, value)` pairs for query strings and form
    /// bodies. Sequences contribute the pairs of each element in order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        match self {
            Content::Absent | Content::Bytes(_) => Vec::new(),
            Content::Sequence(items) => items.iter().flat_map(Content::to_pairs).collect(),
            Content::Mapping(fields) => fields
                .iter()
                .filter_map(|(k, v)| v.to_query_value().map(|v| (k.to_string(), v)))
                .collect(),
        }
    }
}

impl From<Fields> for Content {
    fn from(fields: Fields) -> Self {
        Content::Mapping(fields)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
