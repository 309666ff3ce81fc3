//! Three-way comparison, rich equality, and ordering for old-style
//! instances.
//!
//! `compare` walks a fixed fallback sequence ([`CompareStep`]) under the
//! call context's comparison guard. Each step either settles the result or
//! hands over to the next one.

use std::cmp::Ordering;
use std::slice;

use tracing::trace;

use crate::builtins::instance::OldInstance;
use crate::builtins::operator::{Coerced, coerce};
use crate::call::call;
use crate::call::host::get_host_attr;
use crate::constants::{CMP, EQ, GE, GT, LE, LT, NE};
use crate::error::{OldClassError, OpResult};
use crate::object::Value;
use crate::object::symbol::SymbolId;
use crate::state::{CallCx, CompareMarker, CompareOp};

/// One stage of the comparison fallback sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareStep {
    /// `__cmp__` on the left, then reversed on the right. Both operands are
    /// instances.
    LegacyCmp,
    /// Equality in either direction.
    Equality,
    /// `lhs < rhs` or `rhs > lhs`.
    LessThan,
    /// `lhs > rhs` or `rhs < lhs`.
    GreaterThan,
    /// `__cmp__` once more, including the right operand's own comparator.
    /// Only when the right operand is not an instance.
    LastResortCmp,
    Exhausted,
}

impl CompareStep {
    pub fn first(rhs_is_instance: bool) -> Self {
        if rhs_is_instance {
            Self::LegacyCmp
        } else {
            Self::Equality
        }
    }

    pub fn next(self, rhs_is_instance: bool) -> Self {
        match self {
            Self::LegacyCmp => Self::Equality,
            Self::Equality => Self::LessThan,
            Self::LessThan => Self::GreaterThan,
            Self::GreaterThan if rhs_is_instance => Self::Exhausted,
            Self::GreaterThan => Self::LastResortCmp,
            Self::LastResortCmp | Self::Exhausted => Self::Exhausted,
        }
    }
}

/// Three-way comparison: negative, zero, or positive.
pub fn compare(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<i64> {
    match (lhs, rhs) {
        (Value::Instance(_), _) => {
            guarded(cx, CompareOp::Cmp, lhs, rhs, |cx| run_protocol(cx, lhs, rhs))
        }
        (_, Value::Instance(_)) => compare(cx, rhs, lhs).map(i64::saturating_neg),
        _ => native_compare(lhs, rhs),
    }
}

fn native_compare(lhs: &Value, rhs: &Value) -> OpResult<i64> {
    match lhs.native_cmp(rhs) {
        Some(Ordering::Less) => Ok(-1),
        Some(Ordering::Equal) => Ok(0),
        Some(Ordering::Greater) => Ok(1),
        None if lhs.is(rhs) => Ok(0),
        None => Err(not_comparable(lhs, rhs)),
    }
}

fn run_protocol(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<i64> {
    let rhs_is_instance = matches!(rhs, Value::Instance(_));
    let mut step = CompareStep::first(rhs_is_instance);
    loop {
        if cx.runtime().config().trace_compare {
            trace!(?step, lhs = %lhs.type_name(), rhs = %rhs.type_name(), "compare");
        }
        let settled = match step {
            CompareStep::LegacyCmp | CompareStep::LastResortCmp => legacy_cmp(cx, lhs, rhs)?,
            CompareStep::Equality => {
                if equal_either_way(cx, lhs, rhs)? {
                    Some(0)
                } else {
                    None
                }
            }
            CompareStep::LessThan => {
                if hook_true(cx, lhs, LT, rhs)? || hook_true(cx, rhs, GT, lhs)? {
                    Some(-1)
                } else {
                    None
                }
            }
            CompareStep::GreaterThan => {
                if hook_true(cx, lhs, GT, rhs)? || hook_true(cx, rhs, LT, lhs)? {
                    Some(1)
                } else {
                    None
                }
            }
            CompareStep::Exhausted => return Err(not_comparable(lhs, rhs)),
        };
        if let Some(result) = settled {
            if cx.runtime().config().trace_compare {
                trace!(?step, result, "compare settled");
            }
            return Ok(result);
        }
        step = step.next(rhs_is_instance);
    }
}

/// `__cmp__` on `lhs`, then on `rhs` with the result negated.
fn legacy_cmp(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<Option<i64>> {
    if let Some(result) = cmp_hook(cx, lhs, rhs)? {
        return Ok(Some(result));
    }
    Ok(cmp_hook(cx, rhs, lhs)?.map(i64::saturating_neg))
}

fn cmp_hook(cx: &mut CallCx<'_>, target: &Value, other: &Value) -> OpResult<Option<i64>> {
    match try_hook(cx, target, CMP, other)? {
        Some(result) => result
            .as_int()
            .map(Some)
            .ok_or_else(|| OldClassError::type_error("comparison did not return an int")),
        None => Ok(None),
    }
}

fn equal_either_way(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value) -> OpResult<bool> {
    if equality_from(cx, lhs, rhs)? == Some(true) {
        return Ok(true);
    }
    Ok(equality_from(cx, rhs, lhs)? == Some(true))
}

/// Equality as seen from `target`. `None` when `target` cannot decide.
fn equality_from(cx: &mut CallCx<'_>, target: &Value, other: &Value) -> OpResult<Option<bool>> {
    match target {
        Value::Instance(inst) => match rich_equals(cx, inst, other) {
            Ok(eq) => Ok(Some(eq)),
            Err(OldClassError::NotComparable { .. }) => Ok(None),
            Err(err) => Err(err),
        },
        Value::Host(_) => Ok(try_hook(cx, target, EQ, other)?.map(|v| v.is_truthy())),
        _ => Ok(None),
    }
}

fn hook_true(cx: &mut CallCx<'_>, target: &Value, name: SymbolId, other: &Value) -> OpResult<bool> {
    Ok(try_hook(cx, target, name, other)?.is_some_and(|v| v.is_truthy()))
}

/// Calls the protocol hook `name` on `target` with `other`. `None` when
/// `target` has no such hook or the hook returned `NotImplemented`.
pub(crate) fn try_hook(
    cx: &mut CallCx<'_>,
    target: &Value,
    name: SymbolId,
    other: &Value,
) -> OpResult<Option<Value>> {
    let result = match target {
        Value::Instance(inst) => inst.call_hook(cx, name, slice::from_ref(other))?,
        Value::Host(host) => match get_host_attr(cx, target, host, name)? {
            Some(hook) => Some(call(cx, &hook, slice::from_ref(other))?),
            None => None,
        },
        _ => None,
    };
    Ok(result.filter(|value| !value.is_not_implemented()))
}

/// Equality through `__eq__`, then `__cmp__` (zero means equal), then
/// coercion to native values.
pub fn rich_equals(cx: &mut CallCx<'_>, inst: &OldInstance, other: &Value) -> OpResult<bool> {
    let lhs = Value::Instance(inst.clone());
    guarded(cx, CompareOp::Eq, &lhs, other, |cx| {
        if let Some(result) = try_hook(cx, &lhs, EQ, other)? {
            return Ok(result.is_truthy());
        }
        if let Some(result) = cmp_hook(cx, &lhs, other)? {
            return Ok(result == 0);
        }
        if let Coerced::Pair(a, b) = coerce(cx, inst, other)? {
            if let Some(eq) = a.native_eq(&b) {
                return Ok(eq);
            }
        }
        Err(not_comparable(&lhs, other))
    })
}

/// `__ne__`, else the negation of [`rich_equals`].
pub fn rich_not_equals(cx: &mut CallCx<'_>, inst: &OldInstance, other: &Value) -> OpResult<bool> {
    let lhs = Value::Instance(inst.clone());
    guarded(cx, CompareOp::Ne, &lhs, other, |cx| {
        if let Some(result) = try_hook(cx, &lhs, NE, other)? {
            return Ok(result.is_truthy());
        }
        rich_equals(cx, inst, other).map(|eq| !eq)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl OrderOp {
    fn hook(self) -> SymbolId {
        match self {
            Self::Lt => LT,
            Self::Le => LE,
            Self::Gt => GT,
            Self::Ge => GE,
        }
    }

    /// The same relation seen from the other operand.
    fn flipped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    fn guard_op(self) -> CompareOp {
        match self {
            Self::Lt => CompareOp::Lt,
            Self::Le => CompareOp::Le,
            Self::Gt => CompareOp::Gt,
            Self::Ge => CompareOp::Ge,
        }
    }

    fn holds(self, cmp: i64) -> bool {
        match self {
            Self::Lt => cmp < 0,
            Self::Le => cmp <= 0,
            Self::Gt => cmp > 0,
            Self::Ge => cmp >= 0,
        }
    }
}

/// `lhs < rhs` and friends: the direct hook, the reflected hook on the
/// right operand, then three-way [`compare`].
///
/// Guarded like [`compare`]. When `lhs` has no identity the marker is taken
/// from the flipped relation, so `1 < x` and `x > 1` share one.
pub fn rich_order(cx: &mut CallCx<'_>, lhs: &Value, rhs: &Value, op: OrderOp) -> OpResult<bool> {
    let marker = CompareMarker::for_operands(op.guard_op(), lhs, rhs)
        .or_else(|| CompareMarker::for_operands(op.flipped().guard_op(), rhs, lhs));
    with_marker(cx, marker, |cx| {
        if let Some(result) = try_hook(cx, lhs, op.hook(), rhs)? {
            return Ok(result.is_truthy());
        }
        if let Some(result) = try_hook(cx, rhs, op.flipped().hook(), lhs)? {
            return Ok(result.is_truthy());
        }
        compare(cx, lhs, rhs).map(|cmp| op.holds(cmp))
    })
}

// Remaining stack below which a guarded comparison moves to a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

fn guarded<T>(
    cx: &mut CallCx<'_>,
    op: CompareOp,
    lhs: &Value,
    rhs: &Value,
    body: impl FnOnce(&mut CallCx<'_>) -> OpResult<T>,
) -> OpResult<T> {
    with_marker(cx, CompareMarker::for_operands(op, lhs, rhs), body)
}

/// Runs `body` with `marker` on the guard. Nesting is bounded by the guard
/// limit rather than by the thread's stack size.
fn with_marker<T>(
    cx: &mut CallCx<'_>,
    marker: Option<CompareMarker>,
    body: impl FnOnce(&mut CallCx<'_>) -> OpResult<T>,
) -> OpResult<T> {
    let Some(marker) = marker else {
        return body(cx);
    };
    cx.guard_mut().enter(marker)?;
    let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || body(cx));
    cx.guard_mut().exit(marker);
    result
}

fn not_comparable(lhs: &Value, rhs: &Value) -> OldClassError {
    OldClassError::NotComparable {
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::classes::OldClass;
    use crate::call::Function;
    use crate::state::Runtime;

    fn instance_of(cx: &CallCx<'_>, name: &str, attrs: Vec<(&str, Value)>) -> OldInstance {
        let class = OldClass::with_attrs(name, vec![], attrs).unwrap();
        OldInstance::new(cx, &class)
    }

    #[test]
    fn step_sequence_depends_on_rhs_kind() {
        let mut steps = vec![CompareStep::first(true)];
        while *steps.last().unwrap() != CompareStep::Exhausted {
            steps.push(steps.last().unwrap().next(true));
        }
        assert_eq!(
            steps,
            [
                CompareStep::LegacyCmp,
                CompareStep::Equality,
                CompareStep::LessThan,
                CompareStep::GreaterThan,
                CompareStep::Exhausted
            ]
        );
        assert_eq!(CompareStep::first(false), CompareStep::Equality);
        assert_eq!(CompareStep::GreaterThan.next(false), CompareStep::LastResortCmp);
    }

    #[test]
    fn cmp_on_the_right_is_negated() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let x = instance_of(&cx, "X", vec![]);
        let cmp = Function::method("__cmp__", |_cx, _args| Ok(Value::Int(5)));
        let y = instance_of(&cx, "Y", vec![("__cmp__", cmp)]);
        let (x, y) = (Value::Instance(x), Value::Instance(y));
        assert_eq!(compare(&mut cx, &x, &y).unwrap(), -5);
        assert_eq!(compare(&mut cx, &y, &x).unwrap(), 5);
        assert_eq!(cx.guard().depth(), 0);
    }

    #[test]
    fn non_int_cmp_result_is_a_type_error() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let cmp = Function::method("__cmp__", |_cx, _args| Ok(Value::str("no")));
        let x = Value::Instance(instance_of(&cx, "X", vec![("__cmp__", cmp)]));
        assert_eq!(
            compare(&mut cx, &x, &Value::Int(1)).unwrap_err(),
            OldClassError::type_error("comparison did not return an int")
        );
        assert_eq!(cx.guard().depth(), 0);
    }

    #[test]
    fn ordering_hooks_settle_comparison() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let lt = Function::method("__lt__", |_cx, _args| Ok(Value::Bool(true)));
        let x = Value::Instance(instance_of(&cx, "X", vec![("__lt__", lt)]));
        assert_eq!(compare(&mut cx, &x, &Value::Int(3)).unwrap(), -1);
        assert_eq!(compare(&mut cx, &Value::Int(3), &x).unwrap(), 1);
    }

    #[test]
    fn exhausted_protocol_is_not_comparable() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let x = Value::Instance(instance_of(&cx, "X", vec![]));
        let y = Value::Instance(instance_of(&cx, "Y", vec![]));
        assert!(matches!(
            compare(&mut cx, &x, &y),
            Err(OldClassError::NotComparable { .. })
        ));
        assert!(matches!(
            compare(&mut cx, &Value::str("a"), &Value::Int(1)),
            Err(OldClassError::NotComparable { .. })
        ));
    }

    #[test]
    fn rich_equals_falls_back_to_cmp_then_coercion() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let cmp = Function::method("__cmp__", |_cx, _args| Ok(Value::Int(0)));
        let by_cmp = instance_of(&cx, "ByCmp", vec![("__cmp__", cmp)]);
        assert!(rich_equals(&mut cx, &by_cmp, &Value::Int(9)).unwrap());

        let coerce_hook = Function::method("__coerce__", |_cx, args| {
            Ok(Value::tuple([Value::Int(4), args[1].clone()]))
        });
        let by_coerce = instance_of(&cx, "ByCoerce", vec![("__coerce__", coerce_hook)]);
        assert!(rich_equals(&mut cx, &by_coerce, &Value::Int(4)).unwrap());
        assert!(!rich_equals(&mut cx, &by_coerce, &Value::Int(5)).unwrap());

        let plain = instance_of(&cx, "Plain", vec![]);
        assert!(matches!(
            rich_equals(&mut cx, &plain, &Value::Int(4)),
            Err(OldClassError::NotComparable { .. })
        ));
    }

    #[test]
    fn rich_not_equals_prefers_ne_hook() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let eq = Function::method("__eq__", |_cx, _args| Ok(Value::Bool(true)));
        let ne = Function::method("__ne__", |_cx, _args| Ok(Value::Bool(true)));
        let both = instance_of(&cx, "Both", vec![("__eq__", eq.clone()), ("__ne__", ne)]);
        assert!(rich_not_equals(&mut cx, &both, &Value::None).unwrap());
        let eq_only = instance_of(&cx, "EqOnly", vec![("__eq__", eq)]);
        assert!(!rich_not_equals(&mut cx, &eq_only, &Value::None).unwrap());
    }

    #[test]
    fn self_referential_cmp_is_stopped() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let cmp = Function::method("__cmp__", |cx, args| {
            Ok(Value::Int(compare(cx, &args[0], &args[1])?))
        });
        let x = Value::Instance(instance_of(&cx, "X", vec![("__cmp__", cmp)]));
        assert_eq!(
            compare(&mut cx, &x, &x).unwrap_err(),
            OldClassError::RecursionExceeded
        );
        assert_eq!(cx.guard().depth(), 0);
    }

    #[test]
    fn rich_order_uses_reflected_hooks() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let gt = Function::method("__gt__", |_cx, _args| Ok(Value::Bool(true)));
        let y = Value::Instance(instance_of(&cx, "Y", vec![("__gt__", gt)]));
        assert!(rich_order(&mut cx, &Value::Int(1), &y, OrderOp::Lt).unwrap());
        assert!(rich_order(&mut cx, &Value::Int(1), &Value::Int(2), OrderOp::Le).unwrap());
        assert!(!rich_order(&mut cx, &Value::Int(1), &Value::Int(2), OrderOp::Ge).unwrap());
    }
}
