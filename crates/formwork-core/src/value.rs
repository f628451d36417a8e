#![forbid(unsafe_code)]

//! Field values.
//!
//! Every field holds a [`FieldValue`], a closed union over the shapes a form
//! can produce: nothing yet, a single scalar, a selection set, or a keyed
//! mapping (one entry per selected key). Consumers match on it exhaustively.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Identifier of a field, unique within a schema.
pub type FieldName = String;

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// A single primitive value.
///
/// Numbers compare with [`f64::total_cmp`] and hash by bit pattern so scalars
/// can be members of sets and keys of mappings.
#[derive(Debug, Clone)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Scalar {
    /// Borrow the text, if this is a text scalar.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The number, if this is a numeric scalar.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Text(_) => 0,
            Self::Number(_) => 1,
            Self::Bool(_) => 2,
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Text(s) => s.hash(state),
            Self::Number(n) => n.to_bits().hash(state),
            Self::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            // Integral numbers print without a trailing ".0" so they work as slot names.
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

// ---------------------------------------------------------------------------
// ScalarSet
// ---------------------------------------------------------------------------

/// A duplicate-free set of scalars that remembers insertion order.
///
/// Insertion order is selection order; derived slots follow it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalarSet(IndexSet<Scalar>);

impl ScalarSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member. Returns `false` if it was already present.
    pub fn insert(&mut self, value: impl Into<Scalar>) -> bool {
        self.0.insert(value.into())
    }

    /// Remove a member, keeping the order of the rest.
    pub fn remove(&mut self, value: &Scalar) -> bool {
        self.0.shift_remove(value)
    }

    #[must_use]
    pub fn contains(&self, value: &Scalar) -> bool {
        self.0.contains(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scalar> {
        self.0.iter()
    }
}

impl<S: Into<Scalar>> FromIterator<S> for ScalarSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for ScalarSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for member in &self.0 {
            seq.serialize_element(member)?;
        }
        seq.end()
    }
}

// ---------------------------------------------------------------------------
// KeyedMapping
// ---------------------------------------------------------------------------

/// An insertion-ordered mapping from scalar keys to scalar values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedMapping(IndexMap<Scalar, Scalar>);

impl KeyedMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `key`, returning the previous one.
    pub fn insert(&mut self, key: impl Into<Scalar>, value: impl Into<Scalar>) -> Option<Scalar> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &Scalar) -> Option<&Scalar> {
        self.0.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Scalar> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Scalar, &Scalar)> {
        self.0.iter()
    }
}

impl<K: Into<Scalar>, V: Into<Scalar>> FromIterator<(K, V)> for KeyedMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Serialize for KeyedMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// The shape of a [`FieldValue`], for diagnostics and error parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Unset,
    Text,
    Number,
    Bool,
    Set,
    Mapping,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Text => "text",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Set => "set",
            Self::Mapping => "mapping",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value held by one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldValue {
    /// No value supplied yet.
    #[default]
    Unset,
    Scalar(Scalar),
    Set(ScalarSet),
    Mapping(KeyedMapping),
}

impl FieldValue {
    /// Convenience constructor for a text value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Text(value.into()))
    }

    /// Convenience constructor for a numeric value.
    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Scalar(Scalar::Number(value))
    }

    /// Build a set value from anything convertible to scalars.
    #[must_use]
    pub fn set<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self::Set(members.into_iter().collect())
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Unset => ValueKind::Unset,
            Self::Scalar(Scalar::Text(_)) => ValueKind::Text,
            Self::Scalar(Scalar::Number(_)) => ValueKind::Number,
            Self::Scalar(Scalar::Bool(_)) => ValueKind::Bool,
            Self::Set(_) => ValueKind::Set,
            Self::Mapping(_) => ValueKind::Mapping,
        }
    }

    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Unset, empty text, or an empty collection.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Unset => true,
            Self::Scalar(Scalar::Text(s)) => s.is_empty(),
            Self::Scalar(_) => false,
            Self::Set(set) => set.is_empty(),
            Self::Mapping(map) => map.is_empty(),
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_text)
    }

    #[must_use]
    pub fn as_set(&self) -> Option<&ScalarSet> {
        match self {
            Self::Set(set) => Some(set),
            _ => None,
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<ScalarSet> for FieldValue {
    fn from(value: ScalarSet) -> Self {
        Self::Set(value)
    }
}

impl From<KeyedMapping> for FieldValue {
    fn from(value: KeyedMapping) -> Self {
        Self::Mapping(value)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unset => serializer.serialize_none(),
            Self::Scalar(s) => s.serialize(serializer),
            Self::Set(set) => set.serialize(serializer),
            Self::Mapping(map) => map.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_numbers_are_totally_ordered() {
        assert_eq!(Scalar::Number(1.0), Scalar::Number(1.0));
        assert!(Scalar::Number(1.0) < Scalar::Number(2.0));
        assert_eq!(Scalar::Number(f64::NAN), Scalar::Number(f64::NAN));
    }

    #[test]
    fn scalar_kinds_never_compare_equal() {
        assert_ne!(Scalar::from("1"), Scalar::from(1i64));
        assert_ne!(Scalar::from(true), Scalar::from("true"));
    }

    #[test]
    fn scalar_display_drops_integral_fraction() {
        assert_eq!(Scalar::Number(42.0).to_string(), "42");
        assert_eq!(Scalar::Number(2.5).to_string(), "2.5");
        assert_eq!(Scalar::from("red").to_string(), "red");
    }

    #[test]
    fn set_keeps_insertion_order_and_dedups() {
        let set: ScalarSet = ["red", "blue", "red", "green"].into_iter().collect();
        let members: Vec<String> = set.iter().map(ToString::to_string).collect();
        assert_eq!(members, ["red", "blue", "green"]);
    }

    #[test]
    fn set_remove_preserves_order() {
        let mut set: ScalarSet = ["a", "b", "c"].into_iter().collect();
        assert!(set.remove(&Scalar::from("b")));
        assert!(!set.remove(&Scalar::from("b")));
        let members: Vec<String> = set.iter().map(ToString::to_string).collect();
        assert_eq!(members, ["a", "c"]);
    }

    #[test]
    fn emptiness() {
        assert!(FieldValue::Unset.is_empty());
        assert!(FieldValue::text("").is_empty());
        assert!(!FieldValue::text("x").is_empty());
        assert!(!FieldValue::number(0.0).is_empty());
        assert!(FieldValue::Set(ScalarSet::new()).is_empty());
        assert!(FieldValue::Mapping(KeyedMapping::new()).is_empty());
    }

    #[test]
    fn kind_reporting() {
        assert_eq!(FieldValue::Unset.kind(), ValueKind::Unset);
        assert_eq!(FieldValue::text("x").kind(), ValueKind::Text);
        assert_eq!(FieldValue::number(1.0).kind(), ValueKind::Number);
        assert_eq!(FieldValue::set(["a"]).kind(), ValueKind::Set);
    }

    #[test]
    fn serializes_to_plain_json() {
        let mut images = KeyedMapping::new();
        images.insert("red", "ref123");
        let json = serde_json::json!({
            "unset": FieldValue::Unset,
            "name": FieldValue::text("Shirt"),
            "price": FieldValue::number(9.5),
            "colors": FieldValue::set(["red", "blue"]),
            "images": FieldValue::Mapping(images),
        });
        assert_eq!(json["unset"], serde_json::Value::Null);
        assert_eq!(json["name"], "Shirt");
        assert_eq!(json["price"], 9.5);
        assert_eq!(json["colors"], serde_json::json!(["red", "blue"]));
        assert_eq!(json["images"], serde_json::json!({ "red": "ref123" }));
    }
}
