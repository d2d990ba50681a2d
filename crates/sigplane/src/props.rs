// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ordered key/value properties.
//!
//! Used for signal descriptor keywords, transport negotiation properties and
//! serialized messages. Lookups are linear; property lists are short.

use std::fmt;

/// Dynamically typed property value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Octet(u8),
    Short(i16),
    UShort(u16),
    Long(i32),
    ULong(u32),
    LongLong(i64),
    ULongLong(u64),
    Float(f32),
    Double(f64),
    String(String),
    Sequence(Vec<Value>),
    Properties(Properties),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of scalar values.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Value::Octet(v) => Some(f64::from(v)),
            Value::Short(v) => Some(f64::from(v)),
            Value::UShort(v) => Some(f64::from(v)),
            Value::Long(v) => Some(f64::from(v)),
            Value::ULong(v) => Some(f64::from(v)),
            Value::LongLong(v) => Some(v as f64),
            Value::ULongLong(v) => Some(v as f64),
            Value::Float(v) => Some(f64::from(v)),
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Octet(v) => Some(u64::from(v)),
            Value::UShort(v) => Some(u64::from(v)),
            Value::ULong(v) => Some(u64::from(v)),
            Value::ULongLong(v) => Some(v),
            Value::Short(v) => u64::try_from(v).ok(),
            Value::Long(v) => u64::try_from(v).ok(),
            Value::LongLong(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_properties(&self) -> Option<&Properties> {
        match self {
            Value::Properties(p) => Some(p),
            _ => None,
        }
    }

    /// Approximate marshaled size in bytes (type tag plus payload).
    pub fn encoded_len(&self) -> usize {
        let payload = match self {
            Value::Null => 0,
            Value::Bool(_) | Value::Octet(_) => 1,
            Value::Short(_) | Value::UShort(_) => 2,
            Value::Long(_) | Value::ULong(_) | Value::Float(_) => 4,
            Value::LongLong(_) | Value::ULongLong(_) | Value::Double(_) => 8,
            Value::String(s) => 4 + s.len(),
            Value::Sequence(items) => 4 + items.iter().map(Value::encoded_len).sum::<usize>(),
            Value::Properties(props) => props.encoded_len(),
        };
        4 + payload
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "(nil)"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Octet(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::UShort(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::ULong(v) => write!(f, "{}", v),
            Value::LongLong(v) => write!(f, "{}", v),
            Value::ULongLong(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Properties(props) => write!(f, "{}", props),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    u8 => Octet,
    i16 => Short,
    u16 => UShort,
    i32 => Long,
    u32 => ULong,
    i64 => LongLong,
    u64 => ULongLong,
    f32 => Float,
    f64 => Double,
    String => String,
    Properties => Properties,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// Named value.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: String,
    pub value: Value,
}

impl Property {
    pub fn new(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// Insertion-ordered property list. `set` keeps ids unique; `push` does not.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties {
    items: Vec<Property>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.items.iter().find(|p| p.id == id).map(|p| &p.value)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Insert or replace; replaced entries keep their position.
    pub fn set(&mut self, id: impl Into<String>, value: impl Into<Value>) {
        let id = id.into();
        let value = value.into();
        match self.items.iter_mut().find(|p| p.id == id) {
            Some(existing) => existing.value = value,
            None => self.items.push(Property { id, value }),
        }
    }

    /// Append without checking for an existing id.
    pub fn push(&mut self, property: Property) {
        self.items.push(property);
    }

    pub fn remove(&mut self, id: &str) -> Option<Value> {
        let index = self.items.iter().position(|p| p.id == id)?;
        Some(self.items.remove(index).value)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Property> {
        self.items.iter()
    }

    /// Approximate marshaled size in bytes.
    pub fn encoded_len(&self) -> usize {
        4 + self
            .items
            .iter()
            .map(|p| 4 + p.id.len() + p.value.encoded_len())
            .sum::<usize>()
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, prop) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", prop.id, prop.value)?;
        }
        write!(f, "}}")
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = &'a Property;
    type IntoIter = std::slice::Iter<'a, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Property> for Properties {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> Self {
        let mut props = Properties::new();
        for prop in iter {
            props.set(prop.id, prop.value);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut props = Properties::new();
        props.set("COL_RF", 101.5e6);
        props.set("CHAN_RF", 101.1e6);
        props.set("COL_RF", 99.9e6);
        assert_eq!(props.len(), 2);
        let ids: Vec<&str> = props.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["COL_RF", "CHAN_RF"]);
        assert_eq!(props.get("COL_RF").and_then(Value::as_f64), Some(99.9e6));
    }

    #[test]
    fn remove_and_lookup() {
        let mut props: Properties = vec![
            Property::new("a", 1i32),
            Property::new("b", "text"),
        ]
        .into_iter()
        .collect();
        assert_eq!(props.remove("a"), Some(Value::Long(1)));
        assert!(props.remove("a").is_none());
        assert_eq!(props.get("b").and_then(Value::as_str), Some("text"));
        assert!(!props.contains("a"));
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Short(-3).as_u64(), None);
        assert_eq!(Value::ULong(7).as_u64(), Some(7));
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::String("x".into()).as_f64(), None);
    }

    #[test]
    fn encoded_len_grows_with_content() {
        let mut props = Properties::new();
        let empty = props.encoded_len();
        props.set("payload", "x".repeat(100));
        assert!(props.encoded_len() >= empty + 100);
        assert_eq!(Value::Double(1.0).encoded_len(), 12);
    }

    #[test]
    fn display_nested() {
        let mut inner = Properties::new();
        inner.set("x", 1u8);
        let mut outer = Properties::new();
        outer.set("inner", inner);
        outer.set("seq", Value::Sequence(vec![Value::Long(1), Value::Null]));
        assert_eq!(outer.to_string(), "{inner={x=1}, seq=[1, (nil)]}");
    }
}
