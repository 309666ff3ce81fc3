//! Dynamic value model shared by classes, instances, and protocol hooks.

pub mod dict;
pub mod ops;
pub mod symbol;
pub mod weakref;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::builtins::classes::OldClass;
use crate::builtins::instance::OldInstance;
use crate::call::host::HostObject;
use crate::call::{BoundMethod, Function};
use crate::object::dict::DictRef;

/// A dynamically typed value.
///
/// Reference variants compare by identity; the scalar variants, strings and
/// tuples compare structurally.
#[derive(Clone)]
pub enum Value {
    None,
    /// Returned by a hook that declines to handle its operands.
    NotImplemented,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Tuple(Arc<[Value]>),
    Class(OldClass),
    Instance(OldInstance),
    Function(Arc<Function>),
    BoundMethod(Arc<BoundMethod>),
    Dict(DictRef),
    Host(Arc<HostObject>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    /// Python-level type name, as shown in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".into(),
            Value::NotImplemented => "NotImplementedType".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Str(_) => "str".into(),
            Value::Tuple(_) => "tuple".into(),
            Value::Class(_) => "classobj".into(),
            Value::Instance(_) => "instance".into(),
            Value::Function(_) => "function".into(),
            Value::BoundMethod(_) => "instancemethod".into(),
            Value::Dict(_) => "dict".into(),
            Value::Host(host) => host.host_type().name().to_string(),
        }
    }

    /// Address of the referenced object, for identity-keyed bookkeeping.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Class(class) => Some(class.addr()),
            Value::Instance(inst) => Some(inst.addr()),
            Value::Function(func) => Some(Arc::as_ptr(func) as usize),
            Value::BoundMethod(method) => Some(Arc::as_ptr(method) as usize),
            Value::Dict(dict) => Some(Arc::as_ptr(dict) as *const () as usize),
            Value::Host(host) => Some(Arc::as_ptr(host) as usize),
            Value::Tuple(items) => Some(items.as_ptr() as usize),
            _ => None,
        }
    }

    /// Python `is`.
    pub fn is(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self == other,
            _ => false,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Value::NotImplemented)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&OldInstance> {
        match self {
            Value::Instance(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&OldClass> {
        match self {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Python truthiness for the native variants. Instances are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(dict) => !dict.is_empty(),
            _ => true,
        }
    }

    /// Equality between native values. `None` when either side needs the
    /// instance protocol.
    pub fn native_eq(&self, other: &Value) -> Option<bool> {
        if matches!(self, Value::Instance(_)) || matches!(other, Value::Instance(_)) {
            return None;
        }
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Some(a == b);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a == b),
            (Value::Tuple(a), Value::Tuple(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.native_eq(y)? {
                        return Some(false);
                    }
                }
                Some(true)
            }
            _ => Some(self.is(other)),
        }
    }

    /// Ordering between native values of compatible kinds.
    pub fn native_cmp(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.native_cmp(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::NotImplemented, Value::NotImplemented) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a.ptr_eq(b),
            (Value::Instance(a), Value::Instance(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => {
                Arc::ptr_eq(a.function(), b.function()) && a.receiver() == b.receiver()
            }
            (Value::Dict(a), Value::Dict(b)) => Arc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::NotImplemented => f.write_str("NotImplemented"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Tuple(items) => f.debug_tuple("").field(&items).finish(),
            Value::Class(class) => write!(f, "<class {}>", class.name()),
            Value::Instance(inst) => write!(f, "<{} instance>", inst.class().name()),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::BoundMethod(method) => {
                write!(f, "<bound method {}>", method.function().name())
            }
            Value::Dict(dict) => write!(f, "<dict len={}>", dict.len()),
            Value::Host(host) => write!(f, "<{} object>", host.host_type().name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<OldClass> for Value {
    fn from(class: OldClass) -> Self {
        Value::Class(class)
    }
}

impl From<OldInstance> for Value {
    fn from(inst: OldInstance) -> Self {
        Value::Instance(inst)
    }
}
