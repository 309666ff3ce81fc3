use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::RwLock;

use crate::constants::COMPACT_CAPACITY;
use crate::object::Value;
use crate::object::symbol::SymbolId;

const EMPTY: i32 = SymbolId::INVALID.raw();
const CLAIMING: i32 = SymbolId::CLAIMING.raw();

/// The store has no slot left for a new name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotRepresentable;

/// Fixed-capacity store whose slots bind to a name permanently.
///
/// Each slot carries an atomic name id. A new name claims the first empty
/// slot by swapping in the `CLAIMING` sentinel, writes its value, then
/// publishes its real id. Concurrent claimants of the same slot spin while
/// the sentinel is visible. Deleting a name empties the value cell but keeps
/// the binding, so a slot never changes names.
pub struct CompactDict<const N: usize = COMPACT_CAPACITY> {
    ids: [AtomicI32; N],
    values: [RwLock<Option<Value>>; N],
}

impl<const N: usize> CompactDict<N> {
    pub fn new() -> Self {
        Self {
            ids: std::array::from_fn(|_| AtomicI32::new(EMPTY)),
            values: std::array::from_fn(|_| RwLock::new(None)),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Binds `name` to `value`, claiming a slot if `name` has none yet.
    pub fn try_set(&self, name: SymbolId, value: Value) -> Result<(), NotRepresentable> {
        debug_assert!(name.is_valid());
        let raw = name.raw();
        for idx in 0..N {
            let slot = &self.ids[idx];
            let current = slot.load(Ordering::Acquire);
            if current == raw {
                *self.values[idx].write() = Some(value);
                return Ok(());
            }
            if current >= 0 {
                continue;
            }
            loop {
                match slot.compare_exchange(EMPTY, CLAIMING, Ordering::AcqRel, Ordering::Acquire) {
                    Ok(_) => {
                        *self.values[idx].write() = Some(value);
                        slot.store(raw, Ordering::Release);
                        return Ok(());
                    }
                    Err(prev) if prev == raw => {
                        *self.values[idx].write() = Some(value);
                        return Ok(());
                    }
                    Err(CLAIMING) => std::hint::spin_loop(),
                    // Another name won the slot; try the next one.
                    Err(_) => break,
                }
            }
        }
        Err(NotRepresentable)
    }

    pub fn get(&self, name: SymbolId) -> Option<Value> {
        let idx = self.slot_of(name)?;
        self.values[idx].read().clone()
    }

    pub fn contains_key(&self, name: SymbolId) -> bool {
        self.slot_of(name)
            .is_some_and(|idx| self.values[idx].read().is_some())
    }

    /// Clears the value bound to `name`; the slot stays bound.
    pub fn delete(&self, name: SymbolId) -> bool {
        match self.slot_of(name) {
            Some(idx) => self.values[idx].write().take().is_some(),
            None => false,
        }
    }

    /// Names currently holding a value.
    pub fn keys(&self) -> Vec<SymbolId> {
        (0..N)
            .filter_map(|idx| {
                let raw = self.ids[idx].load(Ordering::Acquire);
                if raw < 0 || self.values[idx].read().is_none() {
                    return None;
                }
                Some(SymbolId::from_raw(raw))
            })
            .collect()
    }

    /// Names that own a slot, with or without a value.
    pub fn bound_names(&self) -> Vec<SymbolId> {
        self.ids
            .iter()
            .map(|id| id.load(Ordering::Acquire))
            .filter(|raw| *raw >= 0)
            .map(SymbolId::from_raw)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.ids.iter().all(|id| id.load(Ordering::Acquire) >= 0)
    }

    fn slot_of(&self, name: SymbolId) -> Option<usize> {
        let raw = name.raw();
        self.ids
            .iter()
            .position(|id| id.load(Ordering::Acquire) == raw)
    }
}

impl<const N: usize> Default for CompactDict<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for CompactDict<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactDict")
            .field("capacity", &N)
            .field("bound", &self.bound_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    fn names(prefix: &str, count: usize) -> Vec<SymbolId> {
        (0..count)
            .map(|i| SymbolId::intern(&format!("{prefix}_{i}")))
            .collect()
    }

    #[test]
    fn fills_then_refuses() {
        let dict: CompactDict<3> = CompactDict::new();
        let ids = names("compact_fill", 4);
        for (i, id) in ids.iter().take(3).enumerate() {
            assert_eq!(dict.try_set(*id, Value::Int(i as i64)), Ok(()));
        }
        assert!(dict.is_full());
        assert_eq!(dict.try_set(ids[3], Value::Int(3)), Err(NotRepresentable));
        // Existing names still update in place.
        assert_eq!(dict.try_set(ids[0], Value::Int(10)), Ok(()));
        assert_eq!(dict.get(ids[0]), Some(Value::Int(10)));
    }

    #[test]
    fn delete_keeps_binding() {
        let dict: CompactDict<1> = CompactDict::new();
        let ids = names("compact_delete", 2);
        dict.try_set(ids[0], Value::Int(1)).unwrap();
        assert!(dict.delete(ids[0]));
        assert!(!dict.delete(ids[0]));
        assert!(!dict.contains_key(ids[0]));
        assert_eq!(dict.bound_names(), vec![ids[0]]);
        // The slot is not reusable by another name.
        assert_eq!(dict.try_set(ids[1], Value::Int(2)), Err(NotRepresentable));
        assert_eq!(dict.try_set(ids[0], Value::Int(3)), Ok(()));
        assert_eq!(dict.keys(), vec![ids[0]]);
    }

    #[test]
    fn concurrent_claims_never_lose_bindings() {
        const THREADS: usize = 12;
        let dict: CompactDict = CompactDict::new();
        let ids = names("compact_race", THREADS);
        let barrier = Barrier::new(THREADS);
        let outcomes: Vec<Result<(), NotRepresentable>> = std::thread::scope(|scope| {
            let handles: Vec<_> = ids
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    let dict = &dict;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        dict.try_set(*id, Value::Int(i as i64))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let stored = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(stored, COMPACT_CAPACITY);
        for (i, (id, outcome)) in ids.iter().zip(&outcomes).enumerate() {
            match outcome {
                Ok(()) => assert_eq!(dict.get(*id), Some(Value::Int(i as i64))),
                Err(NotRepresentable) => assert_eq!(dict.get(*id), None),
            }
        }
    }

    #[test]
    fn same_name_from_many_threads_binds_once() {
        let dict: CompactDict = CompactDict::new();
        let id = SymbolId::intern("compact_same_name");
        std::thread::scope(|scope| {
            for i in 0..8 {
                let dict = &dict;
                scope.spawn(move || dict.try_set(id, Value::Int(i)).unwrap());
            }
        });
        assert_eq!(dict.bound_names(), vec![id]);
        assert!(dict.get(id).is_some());
    }
}
