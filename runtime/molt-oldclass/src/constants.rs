//! Well-known attribute names and fixed sizes.
//!
//! The names below are interned into the global symbol table in this exact
//! order, so each constant's raw id equals its index in [`WELL_KNOWN`].

use crate::object::symbol::SymbolId;

/// Slots in a [`CompactDict`](crate::object::dict::CompactDict).
pub const COMPACT_CAPACITY: usize = 6;

/// Default ceiling on nested comparisons per call stack.
pub const DEFAULT_COMPARE_DEPTH: usize = 1000;

pub const DEL: SymbolId = SymbolId::from_raw(0);
pub const SETATTR: SymbolId = SymbolId::from_raw(1);
pub const GETATTR: SymbolId = SymbolId::from_raw(2);
pub const EQ: SymbolId = SymbolId::from_raw(3);
pub const NE: SymbolId = SymbolId::from_raw(4);
pub const CMP: SymbolId = SymbolId::from_raw(5);
pub const LT: SymbolId = SymbolId::from_raw(6);
pub const GT: SymbolId = SymbolId::from_raw(7);
pub const LE: SymbolId = SymbolId::from_raw(8);
pub const GE: SymbolId = SymbolId::from_raw(9);
pub const COERCE: SymbolId = SymbolId::from_raw(10);
pub const INIT: SymbolId = SymbolId::from_raw(11);
pub const DICT: SymbolId = SymbolId::from_raw(12);
pub const CLASS: SymbolId = SymbolId::from_raw(13);
pub const BASES: SymbolId = SymbolId::from_raw(14);
pub const NAME: SymbolId = SymbolId::from_raw(15);
pub const DOC: SymbolId = SymbolId::from_raw(16);
pub const MODULE: SymbolId = SymbolId::from_raw(17);
pub const STR: SymbolId = SymbolId::from_raw(18);
pub const REPR: SymbolId = SymbolId::from_raw(19);
pub const HASH: SymbolId = SymbolId::from_raw(20);
pub const LEN: SymbolId = SymbolId::from_raw(21);
pub const ADD: SymbolId = SymbolId::from_raw(22);
pub const RADD: SymbolId = SymbolId::from_raw(23);
pub const SUB: SymbolId = SymbolId::from_raw(24);
pub const RSUB: SymbolId = SymbolId::from_raw(25);
pub const MUL: SymbolId = SymbolId::from_raw(26);
pub const RMUL: SymbolId = SymbolId::from_raw(27);
pub const DIV: SymbolId = SymbolId::from_raw(28);
pub const RDIV: SymbolId = SymbolId::from_raw(29);
pub const MOD: SymbolId = SymbolId::from_raw(30);
pub const RMOD: SymbolId = SymbolId::from_raw(31);

pub(crate) const WELL_KNOWN: [&str; 32] = [
    "__del__",
    "__setattr__",
    "__getattr__",
    "__eq__",
    "__ne__",
    "__cmp__",
    "__lt__",
    "__gt__",
    "__le__",
    "__ge__",
    "__coerce__",
    "__init__",
    "__dict__",
    "__class__",
    "__bases__",
    "__name__",
    "__doc__",
    "__module__",
    "__str__",
    "__repr__",
    "__hash__",
    "__len__",
    "__add__",
    "__radd__",
    "__sub__",
    "__rsub__",
    "__mul__",
    "__rmul__",
    "__div__",
    "__rdiv__",
    "__mod__",
    "__rmod__",
];
