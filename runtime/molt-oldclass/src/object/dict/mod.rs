//! Attribute storage for classes and instances.
//!
//! Two stores implement [`AttributeStore`]:
//! - [`FieldIdDict`]: symbol-keyed map behind one coarse lock, with a lazily
//!   created overflow map for non-string keys.
//! - [`InstanceDict`]: a [`CompactDict`] of permanently-claimed slots that
//!   falls back to a `FieldIdDict` once the slots run out.

mod compact;
mod field_id;
mod instance_dict;

pub use compact::{CompactDict, NotRepresentable};
pub use field_id::FieldIdDict;
pub use instance_dict::InstanceDict;

use std::sync::Arc;

use crate::error::{OldClassError, OpResult};
use crate::object::Value;
use crate::object::symbol::SymbolId;

/// Shared handle to any attribute store.
pub type DictRef = Arc<dyn AttributeStore>;

/// A key as reported by [`AttributeStore::keys`].
#[derive(Clone, Debug, PartialEq)]
pub enum AttrKey {
    Name(SymbolId),
    Object(Value),
}

impl AttrKey {
    pub fn to_value(&self) -> Value {
        match self {
            AttrKey::Name(id) => Value::Str(id.as_str()),
            AttrKey::Object(value) => value.clone(),
        }
    }
}

/// Mapping from attribute name to value.
///
/// Every operation is linearizable per store. Names are interned symbols;
/// arbitrary hashable keys go through the `*_object` methods, which only
/// stores with an overflow map accept.
pub trait AttributeStore: Send + Sync {
    fn get(&self, name: SymbolId) -> Option<Value>;

    fn set(&self, name: SymbolId, value: Value);

    /// Removes `name`, returning false when it was absent.
    fn delete(&self, name: SymbolId) -> bool;

    fn contains_key(&self, name: SymbolId) -> bool {
        self.get(name).is_some()
    }

    /// Snapshot of the current keys, in no particular order.
    fn keys(&self) -> Vec<AttrKey>;

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_object(&self, key: &ObjectKey) -> Option<Value>;

    fn set_object(&self, key: ObjectKey, original: Value, value: Value);

    fn delete_object(&self, key: &ObjectKey) -> bool;
}

/// Hashable form of a non-string key.
///
/// Numerically equal ints, bools, and integral floats collapse to the same
/// key, matching Python's `hash`/`==` contract.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKey {
    None,
    Int(i64),
    Float(u64),
    Str(Arc<str>),
    Tuple(Vec<ObjectKey>),
    Identity(usize),
}

impl ObjectKey {
    pub fn from_value(value: &Value) -> OpResult<Self> {
        Ok(match value {
            Value::None => ObjectKey::None,
            Value::Bool(b) => ObjectKey::Int(i64::from(*b)),
            Value::Int(i) => ObjectKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() && f.abs() < 9.0e15 {
                    ObjectKey::Int(*f as i64)
                } else {
                    ObjectKey::Float(f.to_bits())
                }
            }
            Value::Str(s) => ObjectKey::Str(Arc::clone(s)),
            Value::Tuple(items) => ObjectKey::Tuple(
                items
                    .iter()
                    .map(ObjectKey::from_value)
                    .collect::<OpResult<Vec<_>>>()?,
            ),
            Value::Dict(_) | Value::NotImplemented => {
                return Err(OldClassError::type_error(format!(
                    "unhashable type: '{}'",
                    value.type_name()
                )));
            }
            other => match other.identity() {
                Some(addr) => ObjectKey::Identity(addr),
                None => {
                    return Err(OldClassError::type_error(format!(
                        "unhashable type: '{}'",
                        other.type_name()
                    )));
                }
            },
        })
    }
}

/// `store[key]` for an arbitrary key value.
pub fn get_item(store: &dyn AttributeStore, key: &Value) -> OpResult<Option<Value>> {
    if let Value::Str(name) = key {
        return Ok(SymbolId::lookup(name).and_then(|id| store.get(id)));
    }
    Ok(store.get_object(&ObjectKey::from_value(key)?))
}

/// `store[key] = value` for an arbitrary key value.
pub fn set_item(store: &dyn AttributeStore, key: Value, value: Value) -> OpResult<()> {
    if let Value::Str(name) = &key {
        store.set(SymbolId::intern(name), value);
        return Ok(());
    }
    let hashed = ObjectKey::from_value(&key)?;
    store.set_object(hashed, key, value);
    Ok(())
}

/// `del store[key]`; false when the key was absent.
pub fn del_item(store: &dyn AttributeStore, key: &Value) -> OpResult<bool> {
    if let Value::Str(name) = key {
        return Ok(SymbolId::lookup(name).is_some_and(|id| store.delete(id)));
    }
    Ok(store.delete_object(&ObjectKey::from_value(key)?))
}
