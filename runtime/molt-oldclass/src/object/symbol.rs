//! Process-wide symbol interning for attribute names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::constants::WELL_KNOWN;

/// Interned attribute name. Negative ids are reserved sentinels.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolId(i32);

impl SymbolId {
    /// Never assigned to a name; marks an unclaimed compact slot.
    pub const INVALID: SymbolId = SymbolId(-1);
    /// Marks a compact slot whose claimant has not yet published its name.
    pub const CLAIMING: SymbolId = SymbolId(-2);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    pub fn intern(name: &str) -> Self {
        if let Some(id) = SYMBOLS.read().ids.get(name) {
            return *id;
        }
        let mut table = SYMBOLS.write();
        table.insert(name)
    }

    /// Looks a name up without interning it.
    pub fn lookup(name: &str) -> Option<Self> {
        SYMBOLS.read().ids.get(name).copied()
    }

    pub fn as_str(self) -> Arc<str> {
        let table = SYMBOLS.read();
        match usize::try_from(self.0).ok().and_then(|idx| table.names.get(idx)) {
            Some(name) => Arc::clone(name),
            None => Arc::from(format!("<symbol {}>", self.0)),
        }
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "SymbolId({})", self.as_str())
        } else {
            write!(f, "SymbolId(#{})", self.0)
        }
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<&str> for SymbolId {
    fn from(name: &str) -> Self {
        Self::intern(name)
    }
}

struct SymbolTable {
    ids: HashMap<Arc<str>, SymbolId>,
    names: Vec<Arc<str>>,
}

impl SymbolTable {
    fn new() -> Self {
        let mut table = Self {
            ids: HashMap::new(),
            names: Vec::new(),
        };
        for name in WELL_KNOWN {
            table.insert(name);
        }
        table
    }

    fn insert(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = SymbolId(self.names.len() as i32);
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        self.ids.insert(name, id);
        id
    }
}

static SYMBOLS: Lazy<RwLock<SymbolTable>> = Lazy::new(|| RwLock::new(SymbolTable::new()));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable() {
        let a = SymbolId::intern("spam_symbol_test");
        let b = SymbolId::intern("spam_symbol_test");
        assert_eq!(a, b);
        assert!(a.is_valid());
        assert_eq!(&*a.as_str(), "spam_symbol_test");
    }

    #[test]
    fn lookup_does_not_intern() {
        assert_eq!(SymbolId::lookup("never_interned_name_xyz"), None);
        let id = SymbolId::intern("now_interned_name_xyz");
        assert_eq!(SymbolId::lookup("now_interned_name_xyz"), Some(id));
    }

    #[test]
    fn sentinels_are_invalid() {
        assert!(!SymbolId::INVALID.is_valid());
        assert!(!SymbolId::CLAIMING.is_valid());
    }
}
