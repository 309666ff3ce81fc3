use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

use super::{AttrKey, AttributeStore, ObjectKey};
use crate::object::Value;
use crate::object::symbol::SymbolId;

#[derive(Default, Clone)]
struct FieldIdData {
    symbols: HashMap<SymbolId, Value>,
    /// Non-string keys; created on first use. Maps the hashed key to the
    /// original key value and the stored value.
    object_keys: Option<HashMap<ObjectKey, (Value, Value)>>,
}

/// Generic attribute store keyed by symbol, behind a single lock.
///
/// Enumeration copies under the same lock, so callers never observe a torn
/// iteration.
#[derive(Default)]
pub struct FieldIdDict {
    data: Mutex<FieldIdData>,
}

impl FieldIdDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<SymbolId>,
    {
        let dict = Self::new();
        {
            let mut data = dict.data.lock();
            for (name, value) in pairs {
                data.symbols.insert(name.into(), value);
            }
        }
        dict
    }

    /// Copies every entry of `other`, object keys included.
    pub fn from_store(other: &dyn AttributeStore) -> Self {
        let dict = Self::new();
        for key in other.keys() {
            match key {
                AttrKey::Name(id) => {
                    if let Some(value) = other.get(id) {
                        dict.set(id, value);
                    }
                }
                AttrKey::Object(original) => {
                    let Ok(hashed) = ObjectKey::from_value(&original) else {
                        continue;
                    };
                    if let Some(value) = other.get_object(&hashed) {
                        dict.set_object(hashed, original, value);
                    }
                }
            }
        }
        dict
    }

    /// Snapshot of all `(name, value)` pairs with symbol keys.
    pub fn symbol_items(&self) -> Vec<(SymbolId, Value)> {
        let data = self.data.lock();
        data.symbols
            .iter()
            .map(|(id, value)| (*id, value.clone()))
            .collect()
    }

    pub fn clear(&self) {
        let mut data = self.data.lock();
        data.symbols.clear();
        data.object_keys = None;
    }
}

impl AttributeStore for FieldIdDict {
    fn get(&self, name: SymbolId) -> Option<Value> {
        self.data.lock().symbols.get(&name).cloned()
    }

    fn set(&self, name: SymbolId, value: Value) {
        self.data.lock().symbols.insert(name, value);
    }

    fn delete(&self, name: SymbolId) -> bool {
        self.data.lock().symbols.remove(&name).is_some()
    }

    fn contains_key(&self, name: SymbolId) -> bool {
        self.data.lock().symbols.contains_key(&name)
    }

    fn keys(&self) -> Vec<AttrKey> {
        let data = self.data.lock();
        let mut keys: Vec<AttrKey> = data.symbols.keys().map(|id| AttrKey::Name(*id)).collect();
        if let Some(objects) = &data.object_keys {
            keys.extend(objects.values().map(|(key, _)| AttrKey::Object(key.clone())));
        }
        keys
    }

    fn len(&self) -> usize {
        let data = self.data.lock();
        data.symbols.len() + data.object_keys.as_ref().map_or(0, HashMap::len)
    }

    fn get_object(&self, key: &ObjectKey) -> Option<Value> {
        let data = self.data.lock();
        data.object_keys
            .as_ref()
            .and_then(|objects| objects.get(key))
            .map(|(_, value)| value.clone())
    }

    fn set_object(&self, key: ObjectKey, original: Value, value: Value) {
        let mut data = self.data.lock();
        data.object_keys
            .get_or_insert_with(HashMap::new)
            .insert(key, (original, value));
    }

    fn delete_object(&self, key: &ObjectKey) -> bool {
        let mut data = self.data.lock();
        match data.object_keys.as_mut() {
            Some(objects) => objects.remove(key).is_some(),
            None => false,
        }
    }
}

impl fmt::Debug for FieldIdDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.lock();
        f.debug_struct("FieldIdDict")
            .field("symbols", &data.symbols)
            .field(
                "object_keys",
                &data.object_keys.as_ref().map_or(0, HashMap::len),
            )
            .finish()
    }
}
