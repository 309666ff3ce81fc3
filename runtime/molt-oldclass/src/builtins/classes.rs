//! Old-style class objects.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

use parking_lot::{Mutex, RwLock};

use crate::builtins::instance::OldInstance;
use crate::call::call;
use crate::constants::{BASES, DEL, DICT, DOC, INIT, MODULE, NAME, SETATTR};
use crate::error::{OldClassError, OpResult};
use crate::object::Value;
use crate::object::dict::{AttrKey, DictRef, FieldIdDict};
use crate::object::symbol::SymbolId;
use crate::state::CallCx;

const HAS_FINALIZER: u32 = 0x01;
const HAS_SETATTR: u32 = 0x02;

/// Serializes `__bases__` assignments so two concurrent writers cannot
/// each pass the cycle check and then close a cycle together.
static BASES_WRITE: Mutex<()> = parking_lot::const_mutex(());

pub(crate) struct ClassInner {
    name: RwLock<Arc<str>>,
    bases: RwLock<Arc<[OldClass]>>,
    dict: RwLock<DictRef>,
    flags: AtomicU32,
}

/// Shared handle to an old-style class.
#[derive(Clone)]
pub struct OldClass(Arc<ClassInner>);

impl OldClass {
    /// Creates a class over `dict`. `__doc__` defaults to `None`.
    pub fn new(name: &str, bases: Vec<OldClass>, dict: DictRef) -> OpResult<Self> {
        if !dict.contains_key(DOC) {
            dict.set(DOC, Value::None);
        }
        let flags = flags_for(dict.as_ref());
        let class = Self(Arc::new(ClassInner {
            name: RwLock::new(Arc::from(name)),
            bases: RwLock::new(Arc::from(bases)),
            dict: RwLock::new(dict),
            flags: AtomicU32::new(flags),
        }));
        tracing::trace!(class = %class.full_name(), flags, "class created");
        Ok(class)
    }

    /// Creates a class whose namespace holds `attrs`.
    pub fn with_attrs<'a>(
        name: &str,
        bases: Vec<OldClass>,
        attrs: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> OpResult<Self> {
        let dict = FieldIdDict::from_pairs(attrs);
        Self::new(name, bases, Arc::new(dict))
    }

    /// Creates a class from script-level values: a tuple of bases and a
    /// dict, each validated like the corresponding attribute assignment.
    pub fn from_values(name: &Value, bases: &Value, dict: &Value) -> OpResult<Self> {
        let Value::Str(name) = name else {
            return Err(OldClassError::type_error("__name__ must be a string object"));
        };
        let bases = validate_bases(bases)?;
        let Value::Dict(dict) = dict else {
            return Err(OldClassError::type_error("__dict__ must be a dictionary object"));
        };
        Self::new(name, bases, Arc::clone(dict))
    }

    pub fn name(&self) -> Arc<str> {
        Arc::clone(&self.0.name.read())
    }

    /// `module.Name` when the namespace carries a string `__module__`.
    pub fn full_name(&self) -> String {
        let name = self.name();
        match self.dict().get(MODULE) {
            Some(Value::Str(module)) => format!("{module}.{name}"),
            _ => name.to_string(),
        }
    }

    pub fn bases(&self) -> Arc<[OldClass]> {
        Arc::clone(&self.0.bases.read())
    }

    pub fn dict(&self) -> DictRef {
        Arc::clone(&self.0.dict.read())
    }

    /// Depth-first, left-to-right search of this class and its ancestors.
    pub fn lookup(&self, name: impl Into<SymbolId>) -> Option<Value> {
        self.lookup_symbol(name.into())
    }

    fn lookup_symbol(&self, name: SymbolId) -> Option<Value> {
        if let Some(value) = self.dict().get(name) {
            return Some(value);
        }
        self.bases()
            .iter()
            .find_map(|base| base.lookup_symbol(name))
    }

    /// True when `other` is this class or one of its ancestors.
    pub fn is_subclass_of(&self, other: &OldClass) -> bool {
        self.ptr_eq(other) || self.bases().iter().any(|base| base.is_subclass_of(other))
    }

    /// True when this class or an ancestor defines `__del__`.
    pub fn has_finalizer(&self) -> bool {
        self.has_flag(HAS_FINALIZER) || self.bases().iter().any(OldClass::has_finalizer)
    }

    /// True when this class or an ancestor defines `__setattr__`.
    pub fn has_custom_setattr(&self) -> bool {
        self.has_flag(HAS_SETATTR) || self.bases().iter().any(OldClass::has_custom_setattr)
    }

    fn has_flag(&self, flag: u32) -> bool {
        self.0.flags.load(AtomicOrdering::Acquire) & flag != 0
    }

    fn update_flag(&self, flag: u32, on: bool) {
        let mut current = self.0.flags.load(AtomicOrdering::Acquire);
        loop {
            let next = if on { current | flag } else { current & !flag };
            if next == current {
                return;
            }
            match self.0.flags.compare_exchange_weak(
                current,
                next,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn recompute_flags(&self) {
        let dict = self.dict();
        self.update_flag(HAS_FINALIZER, dict.contains_key(DEL));
        self.update_flag(HAS_SETATTR, dict.contains_key(SETATTR));
    }

    /// Replaces the base list after the same checks a script-level
    /// `__bases__` assignment gets.
    pub fn set_bases(&self, bases: &Value) -> OpResult<()> {
        let bases = validate_bases(bases)?;
        self.replace_bases(bases)
    }

    pub fn replace_bases(&self, bases: Vec<OldClass>) -> OpResult<()> {
        let _write = BASES_WRITE.lock();
        if bases.iter().any(|base| base.is_subclass_of(self)) {
            return Err(OldClassError::InvalidBases(
                "a __bases__ item causes an inheritance cycle".into(),
            ));
        }
        *self.0.bases.write() = Arc::from(bases);
        tracing::debug!(class = %self.name(), "bases replaced");
        Ok(())
    }

    /// Reads an attribute through the class itself.
    pub fn get_attr(&self, cx: &mut CallCx<'_>, name: impl Into<SymbolId>) -> OpResult<Value> {
        let name = name.into();
        self.try_get_attr(cx, name)?
            .ok_or_else(|| OldClassError::AttributeNotFound {
                owner: format!("class {}", self.name()),
                name: name.as_str().to_string(),
            })
    }

    pub fn try_get_attr(
        &self,
        cx: &mut CallCx<'_>,
        name: impl Into<SymbolId>,
    ) -> OpResult<Option<Value>> {
        let name = name.into();
        match name {
            BASES => Ok(Some(Value::tuple(
                self.bases().iter().cloned().map(Value::Class),
            ))),
            NAME => Ok(Some(Value::Str(self.name()))),
            DICT => {
                // The caller may now add __setattr__ without passing
                // through set_attr.
                self.update_flag(HAS_SETATTR, true);
                Ok(Some(Value::Dict(self.dict())))
            }
            _ => Ok(self
                .lookup_symbol(name)
                .map(|value| cx.runtime().binder().bind(&value, None, Some(self)))),
        }
    }

    pub fn set_attr(
        &self,
        _cx: &mut CallCx<'_>,
        name: impl Into<SymbolId>,
        value: Value,
    ) -> OpResult<()> {
        let name = name.into();
        match name {
            BASES => self.set_bases(&value),
            NAME => {
                let Value::Str(new_name) = value else {
                    return Err(OldClassError::type_error("__name__ must be a string object"));
                };
                *self.0.name.write() = new_name;
                Ok(())
            }
            DICT => {
                let Value::Dict(dict) = value else {
                    return Err(OldClassError::type_error("__dict__ must be a dictionary object"));
                };
                *self.0.dict.write() = dict;
                self.recompute_flags();
                Ok(())
            }
            _ => {
                if name == DEL {
                    self.update_flag(HAS_FINALIZER, true);
                } else if name == SETATTR {
                    self.update_flag(HAS_SETATTR, true);
                }
                self.dict().set(name, value);
                Ok(())
            }
        }
    }

    pub fn delete_attr(&self, name: impl Into<SymbolId>) -> OpResult<()> {
        let name = name.into();
        if !self.dict().delete(name) {
            return Err(OldClassError::MissingAttribute(name.as_str().to_string()));
        }
        if name == DEL {
            self.update_flag(HAS_FINALIZER, false);
        } else if name == SETATTR {
            self.update_flag(HAS_SETATTR, false);
        }
        Ok(())
    }

    /// Names visible through the class: its own namespace, then each
    /// ancestor's, without duplicates.
    pub fn attr_names(&self) -> Vec<Value> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, out: &mut Vec<Value>) {
        for key in self.dict().keys() {
            let value = match key {
                AttrKey::Name(id) => Value::Str(id.as_str()),
                AttrKey::Object(value) => value,
            };
            if !out.contains(&value) {
                out.push(value);
            }
        }
        for base in self.bases().iter() {
            base.collect_names(out);
        }
    }

    /// Instantiates the class and runs `__init__`.
    pub fn call(&self, cx: &mut CallCx<'_>, args: &[Value]) -> OpResult<OldInstance> {
        let inst = OldInstance::new(cx, self);
        match self.lookup_symbol(INIT) {
            Some(init) => {
                let receiver = Value::Instance(inst.clone());
                let bound = cx.runtime().binder().bind(&init, Some(&receiver), Some(self));
                let result = call(cx, &bound, args)?;
                if !result.is_none() {
                    return Err(OldClassError::type_error("__init__() should return None"));
                }
            }
            None if !args.is_empty() => {
                return Err(OldClassError::type_error(
                    "this constructor takes no arguments",
                ));
            }
            None => {}
        }
        Ok(inst)
    }

    pub fn repr(&self) -> String {
        format!("<class {} at 0x{:x}>", self.full_name(), self.addr())
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &OldClass) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for OldClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OldClass")
            .field("name", &self.name())
            .field("bases", &self.bases().len())
            .finish()
    }
}

fn flags_for(dict: &dyn crate::object::dict::AttributeStore) -> u32 {
    let mut flags = 0;
    if dict.contains_key(DEL) {
        flags |= HAS_FINALIZER;
    }
    if dict.contains_key(SETATTR) {
        flags |= HAS_SETATTR;
    }
    flags
}

fn validate_bases(value: &Value) -> OpResult<Vec<OldClass>> {
    let Value::Tuple(items) = value else {
        return Err(OldClassError::InvalidBases(
            "__bases__ must be a tuple object".into(),
        ));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Class(class) => Ok(class.clone()),
            other => Err(OldClassError::InvalidBases(format!(
                "__bases__ items must be classes (got {})",
                other.type_name()
            ))),
        })
        .collect()
}
