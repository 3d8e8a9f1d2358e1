//! The typed, self-describing value system used to encode command parameters
//! and responses. Mirrors the closed-set discriminated union the wire
//! protocol actually carries -- not a general serialization framework.

use crate::error::{Error, Result};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// A parameter or response value on the wire.
///
/// `Null` is distinct from `Str(String::new())` -- an absent value and an
/// empty string are different things to callers such as `storage/list`
/// (empty directory) versus a not-yet-known path.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
    List(Vec<Value>),
    /// An ordered key -> value mapping. Order is preserved (it is not a hash
    /// map) since filter-result values must read back in pipeline order.
    Map(Vec<(String, Value)>),
}

impl Value {
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::Coercion {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s.as_str()),
            other => Err(Error::Coercion {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    /// A string parameter that is allowed to be absent (`Null`).
    pub fn as_opt_str(&self) -> Result<Option<&str>> {
        match self {
            Value::Null => Ok(None),
            Value::Str(s) => Ok(Some(s.as_str())),
            other => Err(Error::Coercion {
                expected: "string or null",
                found: other.type_name(),
            }),
        }
    }

    /// Accepts `Value::UInt` as well as `Value::Int`: `serde_json`'s
    /// `deserialize_any` calls `visit_u64` for every non-negative wire
    /// number, so a positive signed value (e.g. an `openWrite` `mtime`, the
    /// overwhelming majority of real Unix timestamps) decodes as `UInt`, not
    /// `Int`. Treating the two as interchangeable whenever the value fits in
    /// an `i64` keeps that distinction from being a client-visible footgun.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::UInt(u) => i64::try_from(*u).map_err(|_| Error::Coercion {
                expected: "i64",
                found: "uint (out of i64 range)",
            }),
            other => Err(Error::Coercion {
                expected: "i64",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        match self {
            Value::UInt(u) => Ok(*u),
            other => Err(Error::Coercion {
                expected: "u64",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(l) => Ok(l.as_slice()),
            other => Err(Error::Coercion {
                expected: "list",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_map(&self) -> Result<&[(String, Value)]> {
        match self {
            Value::Map(m) => Ok(m.as_slice()),
            other => Err(Error::Coercion {
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    /// Force-coerce a value to `u32`, checking for overflow, the same way the
    /// wire carries mode/uid/gid parameters that are logically 32-bit.
    pub fn force_u32(&self) -> Result<u32> {
        let v = self.as_u64()?;
        Ok(u32::try_from(v)?)
    }

    /// Force-coerce a value to `i32`, checking for overflow.
    pub fn force_i32(&self) -> Result<i32> {
        let v = self.as_i64()?;
        Ok(i32::try_from(v)?)
    }

    /// A boolean parameter that defaults when absent (`Null`).
    pub fn as_bool_or(&self, default: bool) -> Result<bool> {
        match self {
            Value::Null => Ok(default),
            _ => self.as_bool(),
        }
    }

    /// An optional `u32` parameter (`Null` -> `None`), force-coerced with
    /// overflow checking otherwise.
    pub fn as_opt_u32(&self) -> Result<Option<u32>> {
        match self {
            Value::Null => Ok(None),
            _ => Ok(Some(self.force_u32()?)),
        }
    }

    /// An optional `i64` parameter (`Null` -> `None`).
    pub fn as_opt_i64(&self) -> Result<Option<i64>> {
        match self {
            Value::Null => Ok(None),
            _ => Ok(Some(self.as_i64()?)),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

// Hand-rolled (de)serialization rather than `#[derive]`: the wire
// representation is a plain JSON scalar/array/object, not a
// `{"Variant": ...}` enum envelope.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::UInt(u) => serializer.serialize_u64(*u),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a null, bool, number, string, array, or object")
    }

    fn visit_unit<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::UInt(v))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::Str(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((k, v)) = map.next_entry()? {
            entries.push((k, v));
        }
        Ok(Value::Map(entries))
    }
}
