//! Entry points that work on any [`Value`], dispatching to the class,
//! instance, or host implementation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::builtins::compare::{self, OrderOp};
use crate::builtins::operator::{self, BinaryOp};
use crate::call::host::get_host_attr;
use crate::error::{OldClassError, OpResult};
use crate::object::Value;
use crate::object::dict::{AttrKey, ObjectKey};
use crate::object::symbol::SymbolId;
use crate::state::CallCx;

pub use crate::call::call;

pub fn try_get_attr(
    cx: &mut CallCx<'_>,
    obj: &Value,
    name: impl Into<SymbolId>,
) -> OpResult<Option<Value>> {
    let name = name.into();
    match obj {
        Value::Instance(inst) => inst.try_get_attr(cx, name),
        Value::Class(class) => class.try_get_attr(cx, name),
        Value::Host(host) => get_host_attr(cx, obj, host, name),
        _ => Ok(None),
    }
}

pub fn get_attr(cx: &mut CallCx<'_>, obj: &Value, name: impl Into<SymbolId>) -> OpResult<Value> {
    let name = name.into();
    match obj {
        Value::Instance(inst) => inst.get_attr(cx, name),
        Value::Class(class) => class.get_attr(cx, name),
        _ => try_get_attr(cx, obj, name)?.ok_or_else(|| OldClassError::AttributeNotFound {
            owner: format!("'{}' object", obj.type_name()),
            name: name.as_str().to_string(),
        }),
    }
}

pub fn set_attr(
    cx: &mut CallCx<'_>,
    obj: &Value,
    name: impl Into<SymbolId>,
    value: Value,
) -> OpResult<()> {
    match obj {
        Value::Instance(inst) => inst.set_attr(cx, name, value),
        Value::Class(class) => class.set_attr(cx, name, value),
        other => Err(OldClassError::type_error(format!(
            "'{}' object has only read-only attributes",
            other.type_name()
        ))),
    }
}

pub fn del_attr(obj: &Value, name: impl Into<SymbolId>) -> OpResult<()> {
    match obj {
        Value::Instance(inst) => inst.delete_attr(name),
        Value::Class(class) => class.delete_attr(name),
        other => Err(OldClassError::type_error(format!(
            "'{}' object has only read-only attributes",
            other.type_name()
        ))),
    }
}

/// Attribute names visible on `obj`.
pub fn dir(obj: &Value) -> Vec<Value> {
    match obj {
        Value::Instance(inst) => inst.attr_names(),
        Value::Class(class) => class.attr_names(),
        Value::Dict(dict) => dict.keys().iter().map(AttrKey::to_value).collect(),
        _ => Vec::new(),
    }
}

pub fn repr(cx: &mut CallCx<'_>, obj: &Value) -> OpResult<String> {
    match obj {
        Value::Instance(inst) => inst.repr(cx),
        Value::Class(class) => Ok(class.repr()),
        Value::Str(s) => Ok(format!("{s:?}")),
        other => Ok(format!("{other:?}")),
    }
}

pub fn str(cx: &mut CallCx<'_>, obj: &Value) -> OpResult<String> {
    match obj {
        Value::Instance(inst) => inst.str(cx),
        Value::Str(s) => Ok(s.to_string()),
        other => repr(cx, other),
    }
}

pub fn hash(cx: &mut CallCx<'_>, obj: &Value) -> OpResult<i64> {
    match obj {
        Value::Instance(inst) => inst.hash(cx),
        Value::Dict(_) => Err(OldClassError::type_error("unhashable type: 'dict'")),
        other => {
            let key = ObjectKey::from_value(other)?;
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            Ok(hasher.finish() as i64)
        }
    }
}

pub fn len(cx: &mut CallCx<'_>, obj: &Value) -> OpResult<usize> {
    match obj {
        Value::Instance(inst) => inst.len(cx),
        Value::Str(s) => Ok(s.chars().count()),
        Value::Tuple(items) => Ok(items.len()),
        Value::Dict(dict) => Ok(dict.len()),
        other => Err(OldClassError::type_error(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
    }
}

/// Three-way comparison.
pub fn compare(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<i64> {
    compare::compare(cx, lhs, rhs)
}

/// `lhs == rhs`. An inconclusive rich-equality protocol falls back to
/// identity.
pub fn eq(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<bool> {
    let decided = match (lhs, rhs) {
        (Value::Instance(inst), _) => settle(compare::rich_equals(cx, inst, rhs))?,
        _ => None,
    };
    let decided = match (decided, rhs) {
        (None, Value::Instance(inst)) => settle(compare::rich_equals(cx, inst, lhs))?,
        (decided, _) => decided,
    };
    Ok(match decided {
        Some(eq) => eq,
        None => lhs.native_eq(rhs).unwrap_or_else(|| lhs.is(rhs)),
    })
}

/// `lhs != rhs`. An inconclusive protocol falls back to non-identity.
pub fn ne(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<bool> {
    let decided = match (lhs, rhs) {
        (Value::Instance(inst), _) => settle(compare::rich_not_equals(cx, inst, rhs))?,
        _ => None,
    };
    let decided = match (decided, rhs) {
        (None, Value::Instance(inst)) => settle(compare::rich_not_equals(cx, inst, lhs))?,
        (decided, _) => decided,
    };
    Ok(match decided {
        Some(ne) => ne,
        None => !lhs.native_eq(rhs).unwrap_or_else(|| lhs.is(rhs)),
    })
}

fn settle(result: OpResult<bool>) -> OpResult<Option<bool>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(OldClassError::NotComparable { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

pub fn lt(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<bool> {
    compare::rich_order(cx, lhs, rhs, OrderOp::Lt)
}

pub fn le(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<bool> {
    compare::rich_order(cx, lhs, rhs, OrderOp::Le)
}

pub fn gt(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<bool> {
    compare::rich_order(cx, lhs, rhs, OrderOp::Gt)
}

pub fn ge(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<bool> {
    compare::rich_order(cx, lhs, rhs, OrderOp::Ge)
}

pub fn add(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<Value> {
    operator::binary_op(cx, BinaryOp::Add, lhs, rhs)
}

pub fn sub(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<Value> {
    operator::binary_op(cx, BinaryOp::Sub, lhs, rhs)
}

pub fn mul(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<Value> {
    operator::binary_op(cx, BinaryOp::Mul, lhs, rhs)
}

pub fn div(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<Value> {
    operator::binary_op(cx, BinaryOp::Div, lhs, rhs)
}

pub fn rem(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<Value> {
    operator::binary_op(cx, BinaryOp::Mod, lhs, rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::classes::OldClass;
    use crate::builtins::instance::OldInstance;
    use crate::state::Runtime;

    #[test]
    fn inconclusive_equality_falls_back_to_identity() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let class = OldClass::with_attrs("C", vec![], []).unwrap();
        let a = Value::Instance(OldInstance::new(&cx, &class));
        let b = Value::Instance(OldInstance::new(&cx, &class));
        assert!(eq(&mut cx, &a, &a).unwrap());
        assert!(!eq(&mut cx, &a, &b).unwrap());
        assert!(ne(&mut cx, &a, &b).unwrap());
        assert!(!ne(&mut cx, &a, &a).unwrap());
        assert!(!eq(&mut cx, &a, &Value::Int(1)).unwrap());
    }

    #[test]
    fn native_values_use_native_semantics() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        assert!(eq(&mut cx, &Value::Int(1), &Value::Float(1.0)).unwrap());
        assert!(lt(&mut cx, &Value::str("a"), &Value::str("b")).unwrap());
        assert_eq!(len(&mut cx, &Value::str("héllo")).unwrap(), 5);
        assert_eq!(
            hash(&mut cx, &Value::Int(1)).unwrap(),
            hash(&mut cx, &Value::Float(1.0)).unwrap()
        );
        assert_eq!(str(&mut cx, &Value::str("x")).unwrap(), "x");
        assert_eq!(repr(&mut cx, &Value::str("x")).unwrap(), "\"x\"");
    }

    #[test]
    fn attribute_writes_on_natives_fail() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        assert!(set_attr(&mut cx, &Value::Int(1), "x", Value::None).is_err());
        assert!(del_attr(&Value::Int(1), "x").is_err());
        assert!(matches!(
            get_attr(&mut cx, &Value::Int(1), "x"),
            Err(OldClassError::AttributeNotFound { .. })
        ));
    }
}
