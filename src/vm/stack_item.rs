//! Engine-agnostic view of NeoVM stack items used for inspection and reports.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

/// An interop iterator exposed on the stack, e.g. the result of a storage `find`.
pub trait StackIterator: Send + Sync {
    /// Drain up to `max` remaining items.
    ///
    /// Returns the items and whether more remained. Fails when the iterator is
    /// no longer usable, for example after its engine was disposed.
    fn drain(&self, max: usize) -> Result<(Vec<StackItem>, bool), String>;
}

/// A value on a NeoVM evaluation stack or slot.
#[derive(Clone)]
pub enum StackItem {
    Any,
    Boolean(bool),
    Integer(i128),
    ByteString(Vec<u8>),
    Buffer(Vec<u8>),
    Array(Vec<StackItem>),
    Struct(Vec<StackItem>),
    Map(Vec<(StackItem, StackItem)>),
    Pointer(u32),
    InteropInterface(String),
    Iterator(Arc<dyn StackIterator>),
}

impl StackItem {
    pub fn type_name(&self) -> &'static str {
        match self {
            StackItem::Any => "Any",
            StackItem::Boolean(_) => "Boolean",
            StackItem::Integer(_) => "Integer",
            StackItem::ByteString(_) => "ByteString",
            StackItem::Buffer(_) => "Buffer",
            StackItem::Array(_) => "Array",
            StackItem::Struct(_) => "Struct",
            StackItem::Map(_) => "Map",
            StackItem::Pointer(_) => "Pointer",
            StackItem::InteropInterface(_) | StackItem::Iterator(_) => "InteropInterface",
        }
    }

    /// NeoVM truthiness.
    pub fn to_bool(&self) -> bool {
        match self {
            StackItem::Any => false,
            StackItem::Boolean(b) => *b,
            StackItem::Integer(i) => *i != 0,
            StackItem::ByteString(bytes) | StackItem::Buffer(bytes) => bytes.iter().any(|b| *b != 0),
            _ => true,
        }
    }

    /// Integer interpretation, if the item has one.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            StackItem::Integer(i) => Some(*i),
            StackItem::Boolean(b) => Some(i128::from(*b)),
            StackItem::ByteString(bytes) | StackItem::Buffer(bytes) if bytes.len() <= 16 => {
                if bytes.is_empty() {
                    return Some(0);
                }
                let fill = if bytes[bytes.len() - 1] & 0x80 != 0 { 0xff } else { 0 };
                let mut raw = [fill; 16];
                raw[..bytes.len()].copy_from_slice(bytes);
                Some(i128::from_le_bytes(raw))
            }
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StackItem::ByteString(bytes) | StackItem::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Serialise in the JSON shape NeoVM RPC servers use.
    ///
    /// Iterators are drained up to `max_iterator_items`; a failing iterator fails
    /// the whole conversion so the caller can decide how to degrade.
    pub fn to_json(&self, max_iterator_items: usize) -> Result<JsonValue, String> {
        let value = match self {
            StackItem::Any => json!({ "type": "Any" }),
            StackItem::Boolean(b) => json!({ "type": "Boolean", "value": b }),
            StackItem::Integer(i) => json!({ "type": "Integer", "value": i.to_string() }),
            StackItem::ByteString(bytes) => {
                json!({ "type": "ByteString", "value": BASE64.encode(bytes) })
            }
            StackItem::Buffer(bytes) => json!({ "type": "Buffer", "value": BASE64.encode(bytes) }),
            StackItem::Array(items) => json!({
                "type": "Array",
                "value": items_to_json(items, max_iterator_items)?,
            }),
            StackItem::Struct(items) => json!({
                "type": "Struct",
                "value": items_to_json(items, max_iterator_items)?,
            }),
            StackItem::Map(entries) => {
                let mut value = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    value.push(json!({
                        "key": key.to_json(max_iterator_items)?,
                        "value": item.to_json(max_iterator_items)?,
                    }));
                }
                json!({ "type": "Map", "value": value })
            }
            StackItem::Pointer(position) => json!({ "type": "Pointer", "value": position }),
            StackItem::InteropInterface(name) => {
                json!({ "type": "InteropInterface", "interface": name })
            }
            StackItem::Iterator(iterator) => {
                let (items, truncated) = iterator.drain(max_iterator_items)?;
                json!({
                    "type": "InteropInterface",
                    "interface": "IIterator",
                    "iterator": items_to_json(&items, max_iterator_items)?,
                    "truncated": truncated,
                })
            }
        };
        Ok(value)
    }
}

fn items_to_json(items: &[StackItem], max_iterator_items: usize) -> Result<Vec<JsonValue>, String> {
    items
        .iter()
        .map(|item| item.to_json(max_iterator_items))
        .collect()
}

impl fmt::Debug for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackItem::Any => write!(f, "Any"),
            StackItem::Boolean(b) => write!(f, "Boolean({b})"),
            StackItem::Integer(i) => write!(f, "Integer({i})"),
            StackItem::ByteString(bytes) => write!(f, "ByteString(0x{})", hex::encode(bytes)),
            StackItem::Buffer(bytes) => write!(f, "Buffer(0x{})", hex::encode(bytes)),
            StackItem::Array(items) => f.debug_tuple("Array").field(items).finish(),
            StackItem::Struct(items) => f.debug_tuple("Struct").field(items).finish(),
            StackItem::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            StackItem::Pointer(position) => write!(f, "Pointer({position})"),
            StackItem::InteropInterface(name) => write!(f, "InteropInterface({name})"),
            StackItem::Iterator(_) => write!(f, "Iterator"),
        }
    }
}

impl PartialEq for StackItem {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StackItem::Any, StackItem::Any) => true,
            (StackItem::Boolean(a), StackItem::Boolean(b)) => a == b,
            (StackItem::Integer(a), StackItem::Integer(b)) => a == b,
            (StackItem::ByteString(a), StackItem::ByteString(b)) => a == b,
            (StackItem::Buffer(a), StackItem::Buffer(b)) => a == b,
            (StackItem::Array(a), StackItem::Array(b)) => a == b,
            (StackItem::Struct(a), StackItem::Struct(b)) => a == b,
            (StackItem::Map(a), StackItem::Map(b)) => a == b,
            (StackItem::Pointer(a), StackItem::Pointer(b)) => a == b,
            (StackItem::InteropInterface(a), StackItem::InteropInterface(b)) => a == b,
            (StackItem::Iterator(a), StackItem::Iterator(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
