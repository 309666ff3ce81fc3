//! Descriptor binding: turning a class-level member into a receiver-bound
//! callable when it is read through an instance.

use std::sync::Arc;

use crate::builtins::classes::OldClass;
use crate::call::BoundMethod;
use crate::object::Value;

/// Produces the value an attribute read returns for a resolved member.
///
/// `receiver` is `None` for reads through the class itself.
pub trait MethodBinder: Send + Sync {
    fn bind(&self, member: &Value, receiver: Option<&Value>, owner: Option<&OldClass>) -> Value;
}

/// Binds [`FunctionKind::Method`](crate::call::FunctionKind::Method)
/// functions to the receiver and returns everything else unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBinder;

impl MethodBinder for DefaultBinder {
    fn bind(&self, member: &Value, receiver: Option<&Value>, _owner: Option<&OldClass>) -> Value {
        match (member, receiver) {
            (Value::Function(func), Some(receiver)) if func.is_bindable() => Value::BoundMethod(
                Arc::new(BoundMethod::new(Arc::clone(func), receiver.clone())),
            ),
            _ => member.clone(),
        }
    }
}
