//! Host-type members, resolved by an embedder-supplied collaborator.
//!
//! Attribute reads on values that are not old-style classes or instances
//! end up here. The object model never inspects host types itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::OpResult;
use crate::object::Value;
use crate::object::symbol::SymbolId;
use crate::state::CallCx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property,
    Method,
    Event,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Object,
    Bool,
    Int,
    Float,
    Str,
    Callable,
    Void,
}

/// A resolved host member: its tag, declared value kind, and current value.
#[derive(Debug, Clone)]
pub struct HostMember {
    pub kind: MemberKind,
    pub value_kind: ValueKind,
    pub value: Value,
}

/// Opaque reference to a host type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostType {
    id: u64,
    name: Arc<str>,
}

impl HostType {
    pub fn new(name: &str) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A value owned by the host.
#[derive(Debug)]
pub struct HostObject {
    host_type: HostType,
}

impl HostObject {
    pub fn new(host_type: HostType) -> Value {
        Value::Host(Arc::new(Self { host_type }))
    }

    pub fn host_type(&self) -> &HostType {
        &self.host_type
    }
}

pub trait HostMemberResolver: Send + Sync {
    fn resolve(&self, host_type: &HostType, name: &str) -> Option<HostMember>;
}

/// Table-backed resolver for embedders with a fixed member set.
#[derive(Default)]
pub struct HostMemberTable {
    members: RwLock<HashMap<(u64, Arc<str>), HostMember>>,
}

impl HostMemberTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&self, host_type: &HostType, name: &str, member: HostMember) {
        self.members
            .write()
            .insert((host_type.id(), Arc::from(name)), member);
    }
}

impl HostMemberResolver for HostMemberTable {
    fn resolve(&self, host_type: &HostType, name: &str) -> Option<HostMember> {
        self.members
            .read()
            .get(&(host_type.id(), Arc::from(name)))
            .cloned()
    }
}

impl fmt::Debug for HostMemberTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMemberTable")
            .field("members", &self.members.read().len())
            .finish()
    }
}

/// Reads `name` from a host value through the runtime's resolver.
pub(crate) fn get_host_attr(
    cx: &mut CallCx<'_>,
    receiver: &Value,
    host: &HostObject,
    name: SymbolId,
) -> OpResult<Option<Value>> {
    let Some(resolver) = cx.runtime().host_resolver() else {
        return Ok(None);
    };
    let Some(member) = resolver.resolve(host.host_type(), &name.as_str()) else {
        return Ok(None);
    };
    Ok(match member.kind {
        MemberKind::None => None,
        MemberKind::Method => Some(cx.runtime().binder().bind(&member.value, Some(receiver), None)),
        _ => Some(member.value),
    })
}
