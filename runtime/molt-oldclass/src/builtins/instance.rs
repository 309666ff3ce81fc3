//! Instances of old-style classes.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::builtins::classes::OldClass;
use crate::call::call;
use crate::constants::{CLASS, DEL, DICT, GETATTR, HASH, LEN, REPR, SETATTR, STR};
use crate::error::{OldClassError, OpResult};
use crate::object::Value;
use crate::object::dict::{AttrKey, DictRef};
use crate::object::symbol::SymbolId;
use crate::object::weakref::FinalizerRegistration;
use crate::state::CallCx;

pub(crate) struct InstanceInner {
    class: RwLock<OldClass>,
    dict: RwLock<DictRef>,
    /// Present while this instance has a finalizer to run. Held across
    /// every change that can add or remove one.
    finalizer: Mutex<Option<FinalizerRegistration>>,
}

impl Drop for InstanceInner {
    fn drop(&mut self) {
        if let Some(registration) = self.finalizer.get_mut().take() {
            let class = self.class.get_mut().clone();
            let dict = Arc::clone(self.dict.get_mut());
            tracing::trace!(id = registration.id(), class = %class.name(), "instance died with finalizer");
            registration.fire(class, dict);
        }
    }
}

/// Shared handle to an instance of an [`OldClass`].
#[derive(Clone)]
pub struct OldInstance(Arc<InstanceInner>);

impl OldInstance {
    /// Creates an instance with an empty store, registering a finalizer
    /// when the class chain defines `__del__`.
    pub fn new(cx: &CallCx<'_>, class: &OldClass) -> Self {
        Self::with_dict(cx, class, cx.runtime().new_instance_dict())
    }

    /// Creates an instance over an existing store.
    pub fn with_dict(cx: &CallCx<'_>, class: &OldClass, dict: DictRef) -> Self {
        let needs_finalizer = class.has_finalizer() || dict.contains_key(DEL);
        let inst = Self::resurrect(class.clone(), dict);
        if needs_finalizer {
            let registration = cx.runtime().finalizers().register(&inst);
            *inst.0.finalizer.lock() = Some(registration);
        }
        inst
    }

    /// Rebuilds an instance without registering a finalizer.
    pub(crate) fn resurrect(class: OldClass, dict: DictRef) -> Self {
        Self(Arc::new(InstanceInner {
            class: RwLock::new(class),
            dict: RwLock::new(dict),
            finalizer: Mutex::new(None),
        }))
    }

    pub fn class(&self) -> OldClass {
        self.0.class.read().clone()
    }

    pub fn dict(&self) -> DictRef {
        Arc::clone(&self.0.dict.read())
    }

    pub fn has_finalizer_registration(&self) -> bool {
        self.0.finalizer.lock().is_some()
    }

    /// Own store first, then the class chain with binding. No `__getattr__`.
    pub(crate) fn lookup_unhooked(&self, cx: &CallCx<'_>, name: SymbolId) -> Option<Value> {
        if let Some(value) = self.dict().get(name) {
            return Some(value);
        }
        let class = self.class();
        let member = class.lookup(name)?;
        let receiver = Value::Instance(self.clone());
        Some(cx.runtime().binder().bind(&member, Some(&receiver), Some(&class)))
    }

    pub fn get_attr(&self, cx: &mut CallCx<'_>, name: impl Into<SymbolId>) -> OpResult<Value> {
        let name = name.into();
        self.try_get_attr(cx, name)?
            .ok_or_else(|| OldClassError::AttributeNotFound {
                owner: format!("{} instance", self.class().name()),
                name: name.as_str().to_string(),
            })
    }

    /// Attribute read. An attribute-error from `__getattr__` reports a
    /// miss; any other error propagates.
    pub fn try_get_attr(
        &self,
        cx: &mut CallCx<'_>,
        name: impl Into<SymbolId>,
    ) -> OpResult<Option<Value>> {
        let name = name.into();
        if name == DICT {
            return Ok(Some(Value::Dict(self.dict())));
        }
        if name == CLASS {
            return Ok(Some(Value::Class(self.class())));
        }
        if let Some(value) = self.lookup_unhooked(cx, name) {
            return Ok(Some(value));
        }
        if name == GETATTR {
            return Ok(None);
        }
        let Some(hook) = self.lookup_unhooked(cx, GETATTR) else {
            return Ok(None);
        };
        match call(cx, &hook, &[Value::Str(name.as_str())]) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_attribute_error() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn set_attr(
        &self,
        cx: &mut CallCx<'_>,
        name: impl Into<SymbolId>,
        value: Value,
    ) -> OpResult<()> {
        let name = name.into();
        if name == CLASS {
            let Value::Class(class) = value else {
                return Err(OldClassError::type_error("__class__ must be set to class"));
            };
            self.replace_class(cx, class);
            return Ok(());
        }
        if name == DICT {
            let Value::Dict(dict) = value else {
                return Err(OldClassError::type_error("__dict__ must be set to a dictionary"));
            };
            self.replace_dict(cx, dict);
            return Ok(());
        }

        let class = self.class();
        if class.has_custom_setattr() {
            if let Some(hook) = class.lookup(SETATTR) {
                let receiver = Value::Instance(self.clone());
                let bound = cx.runtime().binder().bind(&hook, Some(&receiver), Some(&class));
                call(cx, &bound, &[Value::Str(name.as_str()), value])?;
                return Ok(());
            }
        }

        if name == DEL {
            let mut registration = self.0.finalizer.lock();
            if registration.is_none() {
                *registration = Some(cx.runtime().finalizers().register(self));
            }
            self.dict().set(name, value);
            return Ok(());
        }
        self.dict().set(name, value);
        Ok(())
    }

    pub fn delete_attr(&self, name: impl Into<SymbolId>) -> OpResult<()> {
        let name = name.into();
        if name == CLASS {
            return Err(OldClassError::type_error("__class__ must be set to class"));
        }
        if name == DICT {
            return Err(OldClassError::type_error("__dict__ must be set to a dictionary"));
        }
        if name == DEL {
            let mut registration = self.0.finalizer.lock();
            if !self.dict().delete(DEL) {
                return Err(OldClassError::MissingAttribute(name.as_str().to_string()));
            }
            if !self.class().has_finalizer() {
                if let Some(registration) = registration.take() {
                    registration.clear();
                }
            }
            return Ok(());
        }
        if !self.dict().delete(name) {
            return Err(OldClassError::MissingAttribute(name.as_str().to_string()));
        }
        Ok(())
    }

    fn replace_class(&self, cx: &CallCx<'_>, class: OldClass) {
        let mut registration = self.0.finalizer.lock();
        let needs_finalizer = class.has_finalizer() || self.dict().contains_key(DEL);
        reconcile(cx, self, &mut registration, needs_finalizer);
        *self.0.class.write() = class;
    }

    fn replace_dict(&self, cx: &CallCx<'_>, dict: DictRef) {
        let mut registration = self.0.finalizer.lock();
        let needs_finalizer = self.class().has_finalizer() || dict.contains_key(DEL);
        reconcile(cx, self, &mut registration, needs_finalizer);
        *self.0.dict.write() = dict;
    }

    /// Own keys followed by the names visible through the class chain.
    pub fn attr_names(&self) -> Vec<Value> {
        let mut names: Vec<Value> = self.dict().keys().iter().map(AttrKey::to_value).collect();
        for name in self.class().attr_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Looks `name` up with full attribute semantics and calls it.
    /// `None` when the instance has no such attribute.
    pub fn call_hook(
        &self,
        cx: &mut CallCx<'_>,
        name: SymbolId,
        args: &[Value],
    ) -> OpResult<Option<Value>> {
        match self.try_get_attr(cx, name)? {
            Some(hook) => call(cx, &hook, args).map(Some),
            None => Ok(None),
        }
    }

    pub fn repr(&self, cx: &mut CallCx<'_>) -> OpResult<String> {
        match self.call_hook(cx, REPR, &[])? {
            Some(Value::Str(s)) => Ok(s.to_string()),
            Some(other) => Err(OldClassError::type_error(format!(
                "__repr__ returned non-string (type {})",
                other.type_name()
            ))),
            None => Ok(format!(
                "<{} instance at 0x{:x}>",
                self.class().full_name(),
                self.addr()
            )),
        }
    }

    pub fn str(&self, cx: &mut CallCx<'_>) -> OpResult<String> {
        match self.call_hook(cx, STR, &[])? {
            Some(Value::Str(s)) => Ok(s.to_string()),
            Some(other) => Err(OldClassError::type_error(format!(
                "__str__ returned non-string (type {})",
                other.type_name()
            ))),
            None => self.repr(cx),
        }
    }

    pub fn hash(&self, cx: &mut CallCx<'_>) -> OpResult<i64> {
        match self.call_hook(cx, HASH, &[])? {
            Some(value) => value
                .as_int()
                .ok_or_else(|| OldClassError::type_error("an integer is required")),
            None => Ok(self.addr() as i64),
        }
    }

    pub fn len(&self, cx: &mut CallCx<'_>) -> OpResult<usize> {
        match self.call_hook(cx, LEN, &[])? {
            Some(value) => {
                let len = value
                    .as_int()
                    .ok_or_else(|| OldClassError::type_error("an integer is required"))?;
                usize::try_from(len)
                    .map_err(|_| OldClassError::raised("ValueError", "__len__() should return >= 0"))
            }
            None => Err(OldClassError::AttributeNotFound {
                owner: format!("{} instance", self.class().name()),
                name: "__len__".into(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<InstanceInner> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &OldInstance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Brings the registration in line with `needs_finalizer`. Called with the
/// finalizer lock held.
fn reconcile(
    cx: &CallCx<'_>,
    inst: &OldInstance,
    registration: &mut Option<FinalizerRegistration>,
    needs_finalizer: bool,
) {
    match (registration.is_some(), needs_finalizer) {
        (false, true) => *registration = Some(cx.runtime().finalizers().register(inst)),
        (true, false) => {
            if let Some(registration) = registration.take() {
                registration.clear();
            }
        }
        _ => {}
    }
}

impl fmt::Debug for OldInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OldInstance")
            .field("class", &self.class().name())
            .field("addr", &format_args!("0x{:x}", self.addr()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::Function;
    use crate::object::dict::FieldIdDict;
    use crate::state::Runtime;

    fn empty_class(name: &str) -> OldClass {
        OldClass::with_attrs(name, vec![], []).unwrap()
    }

    #[test]
    fn own_attributes_shadow_class_attributes() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let c = OldClass::with_attrs("C", vec![], [("x", Value::Int(1))]).unwrap();
        let inst = OldInstance::new(&cx, &c);
        assert_eq!(inst.get_attr(&mut cx, "x").unwrap(), Value::Int(1));
        inst.set_attr(&mut cx, "x", Value::Int(2)).unwrap();
        assert_eq!(inst.get_attr(&mut cx, "x").unwrap(), Value::Int(2));
        assert_eq!(c.lookup("x"), Some(Value::Int(1)));
    }

    #[test]
    fn getattr_hook_covers_misses() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let hook = Function::method("__getattr__", |_cx, args| match args[1].as_str() {
            Some("virtual") => Ok(Value::Int(42)),
            _ => Err(OldClassError::raised("AttributeError", "nope")),
        });
        let c = OldClass::with_attrs("C", vec![], [("__getattr__", hook)]).unwrap();
        let inst = OldInstance::new(&cx, &c);
        assert_eq!(inst.get_attr(&mut cx, "virtual").unwrap(), Value::Int(42));
        assert_eq!(inst.try_get_attr(&mut cx, "other").unwrap(), None);
        let err = inst.get_attr(&mut cx, "other").unwrap_err();
        assert_eq!(
            err,
            OldClassError::AttributeNotFound {
                owner: "C instance".into(),
                name: "other".into()
            }
        );
    }

    #[test]
    fn getattr_hook_errors_other_than_attribute_errors_propagate() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let hook = Function::method("__getattr__", |_cx, _args| {
            Err(OldClassError::raised("ValueError", "boom"))
        });
        let c = OldClass::with_attrs("C", vec![], [("__getattr__", hook)]).unwrap();
        let inst = OldInstance::new(&cx, &c);
        assert_eq!(
            inst.try_get_attr(&mut cx, "x").unwrap_err(),
            OldClassError::raised("ValueError", "boom")
        );
    }

    #[test]
    fn reserved_names_read_class_and_dict() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let c = empty_class("C");
        let inst = OldInstance::new(&cx, &c);
        assert_eq!(inst.get_attr(&mut cx, CLASS).unwrap(), Value::Class(c));
        assert_eq!(inst.get_attr(&mut cx, DICT).unwrap(), Value::Dict(inst.dict()));
    }

    #[test]
    fn reserved_names_reject_wrong_kinds() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let inst = OldInstance::new(&cx, &empty_class("C"));
        assert_eq!(
            inst.set_attr(&mut cx, CLASS, Value::Int(1)).unwrap_err(),
            OldClassError::type_error("__class__ must be set to class")
        );
        assert_eq!(
            inst.set_attr(&mut cx, DICT, Value::None).unwrap_err(),
            OldClassError::type_error("__dict__ must be set to a dictionary")
        );
        assert!(inst.delete_attr(CLASS).is_err());
        assert!(inst.delete_attr(DICT).is_err());
    }

    #[test]
    fn custom_setattr_intercepts_writes() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let hook = Function::method("__setattr__", |_cx, args| {
            let this = args[0].as_instance().cloned().ok_or_else(|| {
                OldClassError::type_error("unbound method __setattr__")
            })?;
            let name = SymbolId::intern(args[1].as_str().unwrap_or_default());
            this.dict().set(name, Value::tuple([Value::str("wrapped"), args[2].clone()]));
            Ok(Value::None)
        });
        let c = OldClass::with_attrs("C", vec![], [("__setattr__", hook)]).unwrap();
        let inst = OldInstance::new(&cx, &c);
        inst.set_attr(&mut cx, "x", Value::Int(1)).unwrap();
        assert_eq!(
            inst.get_attr(&mut cx, "x").unwrap(),
            Value::tuple([Value::str("wrapped"), Value::Int(1)])
        );
    }

    #[test]
    fn delete_missing_attribute() {
        let runtime = Runtime::default();
        let cx = runtime.enter();
        let inst = OldInstance::new(&cx, &empty_class("C"));
        assert_eq!(
            inst.delete_attr("nope").unwrap_err(),
            OldClassError::MissingAttribute("nope".into())
        );
    }

    #[test]
    fn finalizer_registration_follows_del() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let inst = OldInstance::new(&cx, &empty_class("C"));
        assert!(!inst.has_finalizer_registration());
        inst.set_attr(&mut cx, DEL, Value::None).unwrap();
        assert!(inst.has_finalizer_registration());
        inst.delete_attr(DEL).unwrap();
        assert!(!inst.has_finalizer_registration());
    }

    #[test]
    fn class_finalizer_survives_instance_del_removal() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let c = OldClass::with_attrs("C", vec![], [("__del__", Value::None)]).unwrap();
        let inst = OldInstance::new(&cx, &c);
        assert!(inst.has_finalizer_registration());
        inst.set_attr(&mut cx, DEL, Value::None).unwrap();
        inst.delete_attr(DEL).unwrap();
        assert!(inst.has_finalizer_registration());
    }

    #[test]
    fn replacing_dict_and_class_reconciles_finalizer() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let plain = empty_class("Plain");
        let finalizing = OldClass::with_attrs("Fin", vec![], [("__del__", Value::None)]).unwrap();
        let inst = OldInstance::new(&cx, &plain);

        let with_del = Arc::new(FieldIdDict::from_pairs([("__del__", Value::None)]));
        inst.set_attr(&mut cx, DICT, Value::Dict(with_del)).unwrap();
        assert!(inst.has_finalizer_registration());
        inst.set_attr(&mut cx, DICT, Value::Dict(Arc::new(FieldIdDict::new())))
            .unwrap();
        assert!(!inst.has_finalizer_registration());

        inst.set_attr(&mut cx, CLASS, Value::Class(finalizing)).unwrap();
        assert!(inst.has_finalizer_registration());
        inst.set_attr(&mut cx, CLASS, Value::Class(plain)).unwrap();
        assert!(!inst.has_finalizer_registration());
    }

    #[test]
    fn default_repr_and_hash() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let c = OldClass::with_attrs("C", vec![], [("__module__", Value::str("m"))]).unwrap();
        let inst = OldInstance::new(&cx, &c);
        let repr = inst.repr(&mut cx).unwrap();
        assert!(repr.starts_with("<m.C instance at 0x"), "{repr}");
        assert_eq!(inst.str(&mut cx).unwrap(), repr);
        assert_eq!(inst.hash(&mut cx).unwrap(), inst.addr() as i64);
        assert!(inst.len(&mut cx).is_err());
    }

    #[test]
    fn hooks_override_repr_hash_len() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let c = OldClass::with_attrs(
            "C",
            vec![],
            [
                ("__repr__", Function::method("__repr__", |_cx, _| Ok(Value::str("C()")))),
                ("__hash__", Function::method("__hash__", |_cx, _| Ok(Value::Int(7)))),
                ("__len__", Function::method("__len__", |_cx, _| Ok(Value::Int(3)))),
            ],
        )
        .unwrap();
        let inst = OldInstance::new(&cx, &c);
        assert_eq!(inst.repr(&mut cx).unwrap(), "C()");
        assert_eq!(inst.str(&mut cx).unwrap(), "C()");
        assert_eq!(inst.hash(&mut cx).unwrap(), 7);
        assert_eq!(inst.len(&mut cx).unwrap(), 3);
    }

    #[test]
    fn attr_names_merge_instance_and_class() {
        let runtime = Runtime::default();
        let mut cx = runtime.enter();
        let c = OldClass::with_attrs("C", vec![], [("shared", Value::Int(1))]).unwrap();
        let inst = OldInstance::new(&cx, &c);
        inst.set_attr(&mut cx, "own", Value::Int(2)).unwrap();
        inst.set_attr(&mut cx, "shared", Value::Int(3)).unwrap();
        let names = inst.attr_names();
        assert!(names.contains(&Value::str("own")));
        assert_eq!(names.iter().filter(|n| **n == Value::str("shared")).count(), 1);
    }
}
