//! Old-style class object model for Molt.
//!
//! Classes with multiple inheritance through a mutable base tuple, instances
//! with swappable class and attribute store, special-method protocols for
//! attribute access, comparison, coercion and arithmetic, and finalizers
//! that run after an instance becomes unreachable.
//!
//! Every operation that may run user code takes a [`CallCx`], obtained from
//! a shared [`Runtime`] once per logical call stack.

pub mod builtins;
pub mod call;
pub mod config;
pub mod constants;
pub mod error;
pub mod object;
pub mod state;

pub use builtins::classes::OldClass;
pub use builtins::compare::{CompareStep, OrderOp, compare, rich_equals, rich_not_equals};
pub use builtins::instance::OldInstance;
pub use builtins::operator::{BinaryOp, Coerced, binary_op, coerce};
pub use call::bind::{DefaultBinder, MethodBinder};
pub use call::host::{
    HostMember, HostMemberResolver, HostMemberTable, HostObject, HostType, MemberKind, ValueKind,
};
pub use call::{BoundMethod, Function, FunctionKind, call, expect_args};
pub use config::{InstanceDictKind, RuntimeConfig, global_config};
pub use error::{OldClassError, OpResult};
pub use object::Value;
pub use object::dict::{
    AttrKey, AttributeStore, CompactDict, DictRef, FieldIdDict, InstanceDict, NotRepresentable,
    ObjectKey,
};
pub use object::symbol::SymbolId;
pub use object::weakref::FinalizerRegistry;
pub use state::{CallCx, ComparisonGuard, Runtime};
