use std::fmt;
use std::sync::OnceLock;

use super::{AttrKey, AttributeStore, CompactDict, FieldIdDict, ObjectKey};
use crate::object::Value;
use crate::object::symbol::SymbolId;

/// Default instance store: compact slots first, generic map after.
///
/// Instances of one class tend to converge on the same handful of names, so
/// those land in the compact slots. A name that finds no free slot goes to
/// the overflow map, and since slots are never released it stays there.
/// Callers observe the same results as with a plain [`FieldIdDict`].
#[derive(Default)]
pub struct InstanceDict {
    compact: CompactDict,
    overflow: OnceLock<FieldIdDict>,
}

impl InstanceDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any name has spilled past the compact slots.
    pub fn has_overflow(&self) -> bool {
        self.overflow.get().is_some()
    }

    fn overflow(&self) -> &FieldIdDict {
        self.overflow.get_or_init(|| {
            tracing::debug!(
                capacity = self.compact.capacity(),
                "instance dict spilled to generic store"
            );
            FieldIdDict::new()
        })
    }
}

impl AttributeStore for InstanceDict {
    fn get(&self, name: SymbolId) -> Option<Value> {
        if let Some(value) = self.compact.get(name) {
            return Some(value);
        }
        self.overflow.get()?.get(name)
    }

    fn set(&self, name: SymbolId, value: Value) {
        if self.compact.try_set(name, value.clone()).is_ok() {
            return;
        }
        self.overflow().set(name, value);
    }

    fn delete(&self, name: SymbolId) -> bool {
        if self.compact.delete(name) {
            return true;
        }
        self.overflow.get().is_some_and(|overflow| overflow.delete(name))
    }

    fn contains_key(&self, name: SymbolId) -> bool {
        self.compact.contains_key(name)
            || self
                .overflow
                .get()
                .is_some_and(|overflow| overflow.contains_key(name))
    }

    fn keys(&self) -> Vec<AttrKey> {
        let mut keys: Vec<AttrKey> = self.compact.keys().into_iter().map(AttrKey::Name).collect();
        if let Some(overflow) = self.overflow.get() {
            keys.extend(overflow.keys());
        }
        keys
    }

    fn len(&self) -> usize {
        self.compact.len() + self.overflow.get().map_or(0, AttributeStore::len)
    }

    fn get_object(&self, key: &ObjectKey) -> Option<Value> {
        self.overflow.get()?.get_object(key)
    }

    fn set_object(&self, key: ObjectKey, original: Value, value: Value) {
        self.overflow().set_object(key, original, value);
    }

    fn delete_object(&self, key: &ObjectKey) -> bool {
        self.overflow
            .get()
            .is_some_and(|overflow| overflow.delete_object(key))
    }
}

impl fmt::Debug for InstanceDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceDict")
            .field("compact", &self.compact)
            .field("overflow", &self.overflow.get())
            .finish()
    }
}
