//! Generated records.
//!
//! A [`Record`] keeps attributes in insertion order and distinguishes an
//! attribute that was evaluated but is absent (`None`) from one that is not
//! modeled at all (no entry).

use indexmap::IndexMap;
use std::fmt;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(value) => f.write_str(value),
            AttributeValue::Integer(value) => write!(f, "{value}"),
            // Debug keeps a trailing ".0" on integral floats
            AttributeValue::Float(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

/// An ordered mapping from attribute name to an optional value.
///
/// Equality is order-sensitive, like the serialized form.
#[derive(Debug, Clone, Default)]
pub struct Record {
    entries: IndexMap<String, Option<AttributeValue>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Set an attribute. An existing entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<AttributeValue>) {
        self.entries.insert(name.into(), value);
    }

    /// Value of a present attribute.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries.get(name).and_then(Option::as_ref)
    }

    /// Whether the attribute is modeled in this record (present or absent).
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether the attribute was evaluated but not present.
    pub fn is_absent(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(None))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&AttributeValue>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Serialize as `k=v` pairs joined by `", "`; absent values print `null`.
    ///
    /// This is the payload shared by the file sink and the stream publisher.
    /// Floats use the shortest form that round-trips, so very small or very
    /// large magnitudes print in exponent form (`1e-5`, `1e20`).
    pub fn to_kv_string(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Some(value) => write!(f, "{name}={value}")?,
                None => write!(f, "{name}=null")?,
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Option<AttributeValue>)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Option<AttributeValue>)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}
