//! Native callables and call dispatch.

pub mod bind;
pub mod host;

use std::fmt;
use std::sync::Arc;

use crate::error::{OldClassError, OpResult};
use crate::object::Value;
use crate::state::CallCx;

/// Body of a native callable. Receives the bound receiver, if any, as the
/// first argument.
pub type NativeFn = dyn Fn(&mut CallCx<'_>, &[Value]) -> OpResult<Value> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Bound to the receiver when read through an instance.
    Method,
    /// Never bound.
    Static,
}

pub struct Function {
    name: Arc<str>,
    kind: FunctionKind,
    body: Box<NativeFn>,
}

impl Function {
    pub fn new<F>(name: &str, kind: FunctionKind, body: F) -> Self
    where
        F: Fn(&mut CallCx<'_>, &[Value]) -> OpResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            kind,
            body: Box::new(body),
        }
    }

    /// A bindable function value.
    pub fn method<F>(name: &str, body: F) -> Value
    where
        F: Fn(&mut CallCx<'_>, &[Value]) -> OpResult<Value> + Send + Sync + 'static,
    {
        Value::Function(Arc::new(Self::new(name, FunctionKind::Method, body)))
    }

    /// A function value that is returned as-is from attribute reads.
    pub fn plain<F>(name: &str, body: F) -> Value
    where
        F: Fn(&mut CallCx<'_>, &[Value]) -> OpResult<Value> + Send + Sync + 'static,
    {
        Value::Function(Arc::new(Self::new(name, FunctionKind::Static, body)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn is_bindable(&self) -> bool {
        self.kind == FunctionKind::Method
    }

    pub fn invoke(&self, cx: &mut CallCx<'_>, args: &[Value]) -> OpResult<Value> {
        (self.body)(cx, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A function paired with the receiver it was read through.
#[derive(Debug)]
pub struct BoundMethod {
    function: Arc<Function>,
    receiver: Value,
}

impl BoundMethod {
    pub fn new(function: Arc<Function>, receiver: Value) -> Self {
        Self { function, receiver }
    }

    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn receiver(&self) -> &Value {
        &self.receiver
    }
}

/// Calls any callable value.
pub fn call(cx: &mut CallCx<'_>, callable: &Value, args: &[Value]) -> OpResult<Value> {
    match callable {
        Value::Function(func) => func.invoke(cx, args),
        Value::BoundMethod(method) => {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(method.receiver.clone());
            full.extend_from_slice(args);
            method.function.invoke(cx, &full)
        }
        Value::Class(class) => class.call(cx, args).map(Value::Instance),
        other => Err(OldClassError::type_error(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}

/// Checks a native function's arity, Python style.
pub fn expect_args<'a>(name: &str, args: &'a [Value], count: usize) -> OpResult<&'a [Value]> {
    if args.len() == count {
        return Ok(args);
    }
    Err(OldClassError::type_error(format!(
        "{name}() takes exactly {count} arguments ({} given)",
        args.len()
    )))
}
