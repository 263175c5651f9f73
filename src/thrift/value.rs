//! Generic Thrift value tree.
//!
//! Structs keep their fields in wire order and retain fields this crate has
//! no typed knowledge of, so a decoded record re-encodes to the same bytes.

use bytes::Bytes;
use std::convert::TryFrom;

use crate::common::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TType {
    Stop,
    Void,
    Bool,
    Byte,
    Double,
    I16,
    I32,
    I64,
    String,
    Struct,
    Map,
    Set,
    List,
}

impl TType {
    pub fn code(self) -> u8 {
        match self {
            TType::Stop => 0,
            TType::Void => 1,
            TType::Bool => 2,
            TType::Byte => 3,
            TType::Double => 4,
            TType::I16 => 6,
            TType::I32 => 8,
            TType::I64 => 10,
            TType::String => 11,
            TType::Struct => 12,
            TType::Map => 13,
            TType::Set => 14,
            TType::List => 15,
        }
    }
}

impl TryFrom<u8> for TType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        let ttype = match code {
            0 => TType::Stop,
            1 => TType::Void,
            2 => TType::Bool,
            3 => TType::Byte,
            4 => TType::Double,
            6 => TType::I16,
            8 => TType::I32,
            10 => TType::I64,
            11 => TType::String,
            12 => TType::Struct,
            13 => TType::Map,
            14 => TType::Set,
            15 => TType::List,
            other => return Err(Error::Protocol(format!("Unknown Thrift type {}", other))),
        };
        Ok(ttype)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Double(f64),
    I16(i16),
    I32(i32),
    I64(i64),
    Binary(Bytes),
    Struct(Struct),
    Map {
        key_type: TType,
        value_type: TType,
        entries: Vec<(Value, Value)>,
    },
    Set {
        elem_type: TType,
        items: Vec<Value>,
    },
    List {
        elem_type: TType,
        items: Vec<Value>,
    },
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Binary(Bytes::from(s.into()))
    }

    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List {
            elem_type: TType::String,
            items: items.into_iter().map(Value::string).collect(),
        }
    }

    pub fn string_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Value::Map {
            key_type: TType::String,
            value_type: TType::String,
            entries: entries
                .into_iter()
                .map(|(k, v)| (Value::string(k), Value::string(v)))
                .collect(),
        }
    }

    pub fn ttype(&self) -> TType {
        match self {
            Value::Bool(_) => TType::Bool,
            Value::Byte(_) => TType::Byte,
            Value::Double(_) => TType::Double,
            Value::I16(_) => TType::I16,
            Value::I32(_) => TType::I32,
            Value::I64(_) => TType::I64,
            Value::Binary(_) => TType::String,
            Value::Struct(_) => TType::Struct,
            Value::Map { .. } => TType::Map,
            Value::Set { .. } => TType::Set,
            Value::List { .. } => TType::List,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Binary(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List { items, .. } | Value::Set { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Strings of a list<string>; non-string items are rejected
    pub fn to_string_vec(&self) -> Result<Vec<String>> {
        let items = self
            .as_list()
            .ok_or_else(|| Error::Protocol(format!("Expected list, got {:?}", self.ttype())))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::Protocol("Expected UTF-8 string in list".to_string()))
            })
            .collect()
    }
}

/// A Thrift struct: (field id, value) pairs in wire order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    fields: Vec<(i16, Value)>,
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: i16, value: Value) -> Self {
        self.set(id, value);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &(i16, Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn push(&mut self, id: i16, value: Value) {
        self.fields.push((id, value));
    }

    pub fn get(&self, id: i16) -> Option<&Value> {
        self.fields.iter().find(|(fid, _)| *fid == id).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, id: i16) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(fid, _)| *fid == id)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, id: i16) -> Option<Value> {
        let pos = self.fields.iter().position(|(fid, _)| *fid == id)?;
        Some(self.fields.remove(pos).1)
    }

    /// Replace field `id` in place, or append it if absent
    pub fn set(&mut self, id: i16, value: Value) {
        match self.get_mut(id) {
            Some(slot) => *slot = value,
            None => self.fields.push((id, value)),
        }
    }

    pub fn get_str(&self, id: i16) -> Option<&str> {
        self.get(id).and_then(Value::as_str)
    }

    pub fn get_struct(&self, id: i16) -> Option<&Struct> {
        self.get(id).and_then(Value::as_struct)
    }

    pub fn get_struct_mut(&mut self, id: i16) -> Option<&mut Struct> {
        self.get_mut(id).and_then(Value::as_struct_mut)
    }

    /// Look up `key` in the map<string,string> field `id`
    pub fn map_get(&self, id: i16, key: &str) -> Option<&str> {
        match self.get(id)? {
            Value::Map { entries, .. } => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .and_then(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Entries of the map<string,string> field `id`, skipping non-string pairs
    pub fn map_entries(&self, id: i16) -> Vec<(String, String)> {
        match self.get(id) {
            Some(Value::Map { entries, .. }) => entries
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Insert or overwrite `key` in the map<string,string> field `id`.
    ///
    /// Creates the map when the field is absent. Existing entries keep their
    /// position so untouched keys re-encode unchanged.
    pub fn map_set(&mut self, id: i16, key: &str, value: &str) -> Result<()> {
        if self.get(id).is_none() {
            self.set(id, Value::string_map(Vec::<(String, String)>::new()));
        }
        match self.get_mut(id) {
            Some(Value::Map { entries, .. }) => {
                match entries.iter_mut().find(|(k, _)| k.as_str() == Some(key)) {
                    Some((_, v)) => *v = Value::string(value),
                    None => entries.push((Value::string(key), Value::string(value))),
                }
                Ok(())
            }
            Some(other) => Err(Error::Protocol(format!(
                "Field {} is {:?}, not a map",
                id,
                other.ttype()
            ))),
            None => Err(Error::Internal(format!("Field {} vanished", id))),
        }
    }
}
