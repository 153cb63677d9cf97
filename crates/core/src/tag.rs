//! Generic persistence container.
//!
//! Save data is written as a tree of named [`Tag`] values rooted in a
//! [`Compound`]. Keys are kept in a `BTreeMap` so serialized output is ordered
//! and stable across runs. Typed getters return `None` on missing or mistyped
//! fields so readers can fall back to defaults field by field.

use crate::BlockPos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A single persisted value.
///
/// Floats are intentionally omitted; everything the registry stores is
/// integral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    /// Boolean value.
    Bool(bool),
    /// Unsigned byte.
    Byte(u8),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// UTF-8 string.
    String(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// Packed integers (block positions are stored as `[x, y, z]`).
    IntArray(Vec<i32>),
    /// 128-bit identifier.
    Uuid(Uuid),
    /// Ordered list of values.
    List(Vec<Tag>),
    /// Nested compound.
    Compound(Compound),
}

/// Ordered string-keyed map of tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Compound {
    entries: BTreeMap<String, Tag>,
}

impl Compound {
    /// Create an empty compound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: Tag) -> Option<Tag> {
        self.entries.insert(key.into(), value)
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.entries.get(key)
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<Tag> {
        self.entries.remove(key)
    }

    /// Returns true if `key` is present (with any type).
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tag)> {
        self.entries.iter()
    }

    /// Returns true if the compound has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Read a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Tag::Bool(v) => Some(*v),
            Tag::Byte(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Read a byte.
    pub fn get_byte(&self, key: &str) -> Option<u8> {
        match self.get(key)? {
            Tag::Byte(v) => Some(*v),
            _ => None,
        }
    }

    /// Read a 32-bit integer.
    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.get(key)? {
            Tag::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Read a 64-bit integer (32-bit values are widened).
    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Tag::Long(v) => Some(*v),
            Tag::Int(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Read a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            Tag::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Read an id. String-encoded ids are accepted as well.
    pub fn get_uuid(&self, key: &str) -> Option<Uuid> {
        match self.get(key)? {
            Tag::Uuid(v) => Some(*v),
            Tag::String(v) => Uuid::parse_str(v).ok(),
            _ => None,
        }
    }

    /// Read a block position stored as a three-element int array.
    pub fn get_pos(&self, key: &str) -> Option<BlockPos> {
        match self.get(key)? {
            Tag::IntArray(v) if v.len() == 3 => Some(BlockPos::new(v[0], v[1], v[2])),
            _ => None,
        }
    }

    /// Read a list.
    pub fn get_list(&self, key: &str) -> Option<&[Tag]> {
        match self.get(key)? {
            Tag::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Read a nested compound.
    pub fn get_compound(&self, key: &str) -> Option<&Compound> {
        match self.get(key)? {
            Tag::Compound(v) => Some(v),
            _ => None,
        }
    }

    /// Store a block position as a three-element int array.
    pub fn put_pos(&mut self, key: impl Into<String>, pos: BlockPos) {
        self.insert(key, Tag::IntArray(pos.to_array().to_vec()));
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Tag {
    /// Borrow the nested compound, if this tag is one.
    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(v) => Some(v),
            _ => None,
        }
    }

    /// Read an id from a bare tag.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Tag::Uuid(v) => Some(*v),
            Tag::String(v) => Uuid::parse_str(v).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_orders_keys() {
        let mut map = Compound::new();
        map.insert("b", Tag::Bool(true));
        map.insert("a", Tag::Bool(false));

        let keys: Vec<_> = map.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn typed_getters_reject_mismatched_types() {
        let mut map = Compound::new();
        map.insert("n", Tag::Int(7));
        map.insert("s", Tag::String("seven".into()));
        map.insert("p", Tag::IntArray(vec![1, 2]));

        assert_eq!(map.get_int("n"), Some(7));
        assert_eq!(map.get_long("n"), Some(7));
        assert_eq!(map.get_str("n"), None);
        assert_eq!(map.get_int("s"), None);
        assert_eq!(map.get_pos("p"), None);
        assert_eq!(map.get_int("missing"), None);
    }

    #[test]
    fn positions_and_ids_roundtrip() {
        let id = Uuid::new_v4();
        let mut map = Compound::new();
        map.put_pos("min", BlockPos::new(-4, 64, 12));
        map.insert("id", Tag::Uuid(id));
        map.insert("legacy_id", Tag::String(id.to_string()));

        assert_eq!(map.get_pos("min"), Some(BlockPos::new(-4, 64, 12)));
        assert_eq!(map.get_uuid("id"), Some(id));
        assert_eq!(map.get_uuid("legacy_id"), Some(id));
    }

    #[test]
    fn nested_compound_survives_bincode() {
        let mut inner = Compound::new();
        inner.insert("name", Tag::String("Alex".into()));
        let mut outer = Compound::new();
        outer.insert(
            "list",
            Tag::List(vec![Tag::Compound(inner.clone()), Tag::Long(-1)]),
        );

        let bytes = bincode::serialize(&outer).unwrap();
        let decoded: Compound = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, outer);
        assert_eq!(
            decoded.get_list("list").unwrap()[0].as_compound(),
            Some(&inner)
        );
    }
}
