//! The live object graph.
//!
//! A decoded save is an owned tree of [`Value`]s. Every edit made through the
//! tree overlay lands here, and this is what gets re-encoded on save. Because
//! the graph is owned (no shared references), a value can only be reached
//! through the chain of container slots that owns it; see [`Step`].
//!
//! # Example
//!
//! ```
//! use savequill::document::value::{MapKey, Record, Step, Value};
//! use indexmap::IndexMap;
//!
//! let mut gold = IndexMap::new();
//! gold.insert(MapKey::Text("gold".to_string()), Value::Int(120));
//!
//! let mut player = Record::new("Player");
//! player.fields.insert("wallet".to_string(), Value::Map(gold));
//! let root = Value::Record(player);
//!
//! let path = [
//!     Step::Field("wallet".to_string()),
//!     Step::Entry(MapKey::Text("gold".to_string())),
//! ];
//! assert_eq!(root.at_path(&path), Some(&Value::Int(120)));
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// An arbitrary-precision integer kept in canonical decimal form.
///
/// Saves only need to carry, compare and re-parse these, never do
/// arithmetic, so the canonical digit string is the whole representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BigInteger(String);

impl BigInteger {
    pub fn zero() -> Self {
        BigInteger("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.starts_with('-')
    }
}

impl FromStr for BigInteger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        if digits.is_empty() {
            return Err("no digits".to_string());
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_digit()) {
            return Err(format!("unexpected character '{}'", bad));
        }

        let significant = digits.trim_start_matches('0');
        if significant.is_empty() {
            return Ok(BigInteger::zero());
        }

        let canonical = if negative {
            format!("-{}", significant)
        } else {
            significant.to_string()
        };
        Ok(BigInteger(canonical))
    }
}

impl TryFrom<String> for BigInteger {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BigInteger> for String {
    fn from(value: BigInteger) -> Self {
        value.0
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key in a keyed map. Only hashable scalars can be keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Text(String),
    Enum(String),
}

impl MapKey {
    /// Converts a scalar value into a key, if that kind of value can be one.
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::UInt(u) => Some(MapKey::UInt(*u)),
            Value::Text(s) => Some(MapKey::Text(s.clone())),
            Value::Enum(s) => Some(MapKey::Enum(s.clone())),
            _ => None,
        }
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Self {
        match key {
            MapKey::Bool(b) => Value::Bool(b),
            MapKey::Int(i) => Value::Int(i),
            MapKey::UInt(u) => Value::UInt(u),
            MapKey::Text(s) => Value::Text(s),
            MapKey::Enum(s) => Value::Enum(s),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::UInt(u) => write!(f, "{}", u),
            MapKey::Text(s) | MapKey::Enum(s) => f.write_str(s),
        }
    }
}

/// An instance of a record (class or struct) type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Name of the record type in the save's type registry
    pub type_name: String,
    /// Member values by name, in declaration order
    pub fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

// Field order is part of a record's identity, matching how it serializes.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.fields.len() == other.fields.len()
            && self.fields.iter().zip(other.fields.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.hash(state);
        for (name, value) in &self.fields {
            name.hash(state);
            value.hash(state);
        }
    }
}

/// A value in the live object graph.
///
/// Sequences (fixed arrays and growable lists) share `Seq`; which of the two
/// a sequence is comes from its declared type, not from the value. `Set`
/// keeps its elements unique and in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Enum(String),
    BigInt(BigInteger),
    Seq(Vec<Value>),
    Map(#[serde(with = "map_entries")] IndexMap<MapKey, Value>),
    Set(Vec<Value>),
    Record(Record),
}

// Floats compare and hash by bit pattern so that `Value` is a lawful `Eq`
// and an unchanged NaN never reads as an edit.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::UInt(u) => u.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) | Value::Enum(s) => s.hash(state),
            Value::BigInt(b) => b.hash(state),
            Value::Seq(items) => items.hash(state),
            Value::Map(entries) => {
                entries.len().hash(state);
                for (k, v) in entries {
                    k.hash(state);
                    v.hash(state);
                }
            }
            Value::Set(items) => {
                // order-independent: XOR of element hashes
                let combined = items.iter().fold(0u64, |acc, item| acc ^ item.fingerprint());
                items.len().hash(state);
                combined.hash(state);
            }
            Value::Record(record) => record.hash(state),
        }
    }
}

/// One step from a container to one of its slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Position in a sequence
    Index(usize),
    /// Key in a map
    Entry(MapKey),
    /// Position of an element in a set
    Member(usize),
    /// Member of a record
    Field(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if a NaN or infinite float appears anywhere in the value.
    pub fn has_non_finite_float(&self) -> bool {
        match self {
            Value::Float(f) => !f.is_finite(),
            Value::Seq(items) | Value::Set(items) => items.iter().any(Value::has_non_finite_float),
            Value::Map(entries) => entries.values().any(Value::has_non_finite_float),
            Value::Record(record) => record.fields.values().any(Value::has_non_finite_float),
            _ => false,
        }
    }

    /// Stable structural hash, used as the identity surrogate of set elements.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Number of direct children (elements, entries or fields).
    pub fn len(&self) -> usize {
        match self {
            Value::Seq(items) | Value::Set(items) => items.len(),
            Value::Map(entries) => entries.len(),
            Value::Record(record) => record.fields.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value stored at one slot of this container.
    pub fn child(&self, step: &Step) -> Option<&Value> {
        match (self, step) {
            (Value::Seq(items), Step::Index(i)) => items.get(*i),
            (Value::Set(items), Step::Member(i)) => items.get(*i),
            (Value::Map(entries), Step::Entry(key)) => entries.get(key),
            (Value::Record(record), Step::Field(name)) => record.fields.get(name),
            _ => None,
        }
    }

    /// Mutable access to one slot of this container.
    pub fn child_mut(&mut self, step: &Step) -> Option<&mut Value> {
        match (self, step) {
            (Value::Seq(items), Step::Index(i)) => items.get_mut(*i),
            (Value::Set(items), Step::Member(i)) => items.get_mut(*i),
            (Value::Map(entries), Step::Entry(key)) => entries.get_mut(key),
            (Value::Record(record), Step::Field(name)) => record.fields.get_mut(name),
            _ => None,
        }
    }

    /// Follows a chain of steps from this value.
    pub fn at_path(&self, path: &[Step]) -> Option<&Value> {
        path.iter().try_fold(self, |current, step| current.child(step))
    }

    /// Follows a chain of steps from this value, mutably.
    ///
    /// Writes through the returned reference land in the owning slot, which is
    /// what makes value-type (struct) members editable in place.
    pub fn at_path_mut(&mut self, path: &[Step]) -> Option<&mut Value> {
        let mut current = self;
        for step in path {
            current = current.child_mut(step)?;
        }
        Some(current)
    }

    /// Short one-line rendering used in the value column.
    pub fn preview(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Enum(s) => s.clone(),
            Value::BigInt(b) => b.to_string(),
            Value::Seq(items) => format!("[ {} items ]", items.len()),
            Value::Set(items) => format!("{{ {} members }}", items.len()),
            Value::Map(entries) => format!("{{ {} entries }}", entries.len()),
            Value::Record(record) => record.type_name.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preview())
    }
}

/// Serializes map entries as a list of pairs so that non-string keys survive
/// formats (JSON, YAML) whose maps only allow string keys.
mod map_entries {
    use super::{MapKey, Value};
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(map: &IndexMap<MapKey, Value>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let pairs: Vec<(&MapKey, &Value)> = map.iter().collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<IndexMap<MapKey, Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs: Vec<(MapKey, Value)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
