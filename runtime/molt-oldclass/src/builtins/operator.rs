//! `__coerce__` and binary arithmetic dispatch.

use std::slice;

use crate::builtins::compare::try_hook;
use crate::builtins::instance::OldInstance;
use crate::constants::{ADD, COERCE, DIV, MOD, MUL, RADD, RDIV, RMOD, RMUL, RSUB, SUB};
use crate::error::{OldClassError, OpResult};
use crate::object::Value;
use crate::object::symbol::SymbolId;
use crate::state::CallCx;

/// Outcome of the coercion protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Pair(Value, Value),
    NotApplicable,
}

/// Calls `inst.__coerce__(other)`. `None`, `NotImplemented`, or a missing
/// hook mean the protocol does not apply.
pub fn coerce(cx: &mut CallCx<'_>, inst: &OldInstance, other: &Value) -> OpResult<Coerced> {
    let Some(result) = inst.call_hook(cx, COERCE, slice::from_ref(other))? else {
        return Ok(Coerced::NotApplicable);
    };
    match result {
        Value::None | Value::NotImplemented => Ok(Coerced::NotApplicable),
        Value::Tuple(items) if items.len() == 2 => {
            Ok(Coerced::Pair(items[0].clone(), items[1].clone()))
        }
        _ => Err(OldClassError::type_error(
            "coercion should return None or 2-tuple",
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }

    pub fn forward(self) -> SymbolId {
        match self {
            Self::Add => ADD,
            Self::Sub => SUB,
            Self::Mul => MUL,
            Self::Div => DIV,
            Self::Mod => MOD,
        }
    }

    pub fn reflected(self) -> SymbolId {
        match self {
            Self::Add => RADD,
            Self::Sub => RSUB,
            Self::Mul => RMUL,
            Self::Div => RDIV,
            Self::Mod => RMOD,
        }
    }
}

/// `lhs <op> rhs`.
///
/// A left instance is coerced against the right operand and then asked for
/// the forward hook; a right instance is coerced against the left operand
/// and asked for the reflected hook. Coercion results that are no longer
/// instances go straight to native arithmetic.
pub fn binary_op(cx: &mut CallCx<'_>, op: BinaryOp, lhs: &Value, rhs: &Value) -> OpResult<Value> {
    if let Value::Instance(inst) = lhs {
        let (left, right) = match coerce(cx, inst, rhs)? {
            Coerced::Pair(left, right) => (left, right),
            Coerced::NotApplicable => (lhs.clone(), rhs.clone()),
        };
        let result = if matches!(left, Value::Instance(_)) {
            try_hook(cx, &left, op.forward(), &right)?
        } else {
            native_binary(op, &left, &right)?
        };
        if let Some(result) = result {
            return Ok(result);
        }
    }
    if let Value::Instance(inst) = rhs {
        let (right, left) = match coerce(cx, inst, lhs)? {
            Coerced::Pair(right, left) => (right, left),
            Coerced::NotApplicable => (rhs.clone(), lhs.clone()),
        };
        let result = if matches!(right, Value::Instance(_)) {
            try_hook(cx, &right, op.reflected(), &left)?
        } else {
            native_binary(op, &left, &right)?
        };
        if let Some(result) = result {
            return Ok(result);
        }
    }
    if !matches!(lhs, Value::Instance(_)) && !matches!(rhs, Value::Instance(_)) {
        if let Some(result) = native_binary(op, lhs, rhs)? {
            return Ok(result);
        }
    }
    Err(OldClassError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        lhs.type_name(),
        rhs.type_name()
    )))
}

fn zero_division(what: &str) -> OldClassError {
    OldClassError::raised("ZeroDivisionError", what)
}

fn overflow() -> OldClassError {
    OldClassError::raised("OverflowError", "integer overflow")
}

/// `s * count`. Non-positive counts give the empty string.
fn repeat_str(s: &str, count: i64) -> OpResult<Value> {
    let count = usize::try_from(count).unwrap_or(0);
    if s.is_empty() || count == 0 {
        return Ok(Value::str(""));
    }
    let total = s
        .len()
        .checked_mul(count)
        .filter(|&total| isize::try_from(total).is_ok())
        .ok_or_else(|| OldClassError::raised("OverflowError", "repeated string is too long"))?;
    let mut out = String::new();
    out.try_reserve_exact(total)
        .map_err(|_| OldClassError::raised("MemoryError", "cannot allocate repeated string"))?;
    for _ in 0..count {
        out.push_str(s);
    }
    Ok(Value::str(out))
}

/// Arithmetic on native operands. `None` when the kinds do not support
/// `op`.
fn native_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> OpResult<Option<Value>> {
    if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
        return int_binary(op, a, b).map(|v| Some(Value::Int(v)));
    }
    if let (Some(a), Some(b)) = (as_float(lhs), as_float(rhs)) {
        return float_binary(op, a, b).map(|v| Some(Value::Float(v)));
    }
    Ok(match (op, lhs, rhs) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Some(Value::str(format!("{a}{b}"))),
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Some(Value::tuple(a.iter().chain(b.iter()).cloned()))
        }
        (BinaryOp::Mul, Value::Str(s), count) | (BinaryOp::Mul, count, Value::Str(s)) => {
            count.as_int().map(|n| repeat_str(s, n)).transpose()?
        }
        _ => None,
    })
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(*f),
        other => other.as_int().map(|i| i as f64),
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> OpResult<i64> {
    match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow),
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow),
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow),
        BinaryOp::Div => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            Ok(if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q })
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let r = a.checked_rem(b).unwrap_or(0);
            Ok(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
        }
    }
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> OpResult<f64> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            Ok(a / b)
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo"));
            }
            let r = a % b;
            Ok(if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r })
        }
    }
}
