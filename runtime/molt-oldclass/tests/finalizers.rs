use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use molt_oldclass::constants::{CLASS, DEL, DICT};
use molt_oldclass::{FieldIdDict, Function, OldClass, OldClassError, OldInstance, Runtime, Value};

fn counting_del(hits: &Arc<AtomicUsize>) -> Value {
    let hits = Arc::clone(hits);
    Function::method("__del__", move |_cx, _args| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(Value::None)
    })
}

#[test]
fn instance_level_del_registers_and_unregisters() {
    let runtime = Runtime::default();
    let mut cx = runtime.enter();
    let class = OldClass::with_attrs("Plain", vec![], []).unwrap();
    let inst = OldInstance::new(&cx, &class);
    assert!(!inst.has_finalizer_registration());
    assert_eq!(runtime.finalizers().live_count(), 0);

    inst.set_attr(&mut cx, DEL, Value::None).unwrap();
    assert!(inst.has_finalizer_registration());
    assert_eq!(runtime.finalizers().live_count(), 1);

    inst.delete_attr(DEL).unwrap();
    assert!(!inst.has_finalizer_registration());
    assert_eq!(runtime.finalizers().live_count(), 0);
}

#[test]
fn dropped_instance_runs_del_with_its_state() {
    let runtime = Runtime::default();
    let mut cx = runtime.enter();
    let seen = Arc::new(AtomicI64::new(0));
    let observed = Arc::clone(&seen);
    let del = Function::method("__del__", move |cx, args| {
        let this = args[0]
            .as_instance()
            .cloned()
            .ok_or_else(|| OldClassError::type_error("bad receiver"))?;
        let payload = this.get_attr(cx, "payload")?;
        observed.store(payload.as_int().unwrap_or(-1), Ordering::SeqCst);
        Ok(Value::None)
    });
    let class = OldClass::with_attrs("Resource", vec![], [("__del__", del)]).unwrap();
    let inst = OldInstance::new(&cx, &class);
    inst.set_attr(&mut cx, "payload", Value::Int(7)).unwrap();
    assert_eq!(runtime.finalizers().live_count(), 1);

    drop(inst);
    assert_eq!(runtime.finalizers().live_count(), 0);
    assert_eq!(runtime.finalizers().pending_count(), 1);
    assert_eq!(cx.run_pending_finalizers(), 1);
    assert_eq!(seen.load(Ordering::SeqCst), 7);
    assert_eq!(runtime.finalizers().pending_count(), 0);
}

#[test]
fn instances_without_del_leave_nothing_behind() {
    let runtime = Runtime::default();
    let mut cx = runtime.enter();
    let class = OldClass::with_attrs("Plain", vec![], []).unwrap();
    drop(OldInstance::new(&cx, &class));
    assert_eq!(runtime.finalizers().pending_count(), 0);
    assert_eq!(cx.run_pending_finalizers(), 0);
}

#[test]
fn inherited_del_counts() {
    let runtime = Runtime::default();
    let mut cx = runtime.enter();
    let hits = Arc::new(AtomicUsize::new(0));
    let base = OldClass::with_attrs("Base", vec![], [("__del__", counting_del(&hits))]).unwrap();
    let derived = OldClass::with_attrs("Derived", vec![base], []).unwrap();
    for _ in 0..3 {
        let inst = derived.call(&mut cx, &[]).unwrap();
        assert!(inst.has_finalizer_registration());
    }
    assert_eq!(cx.run_pending_finalizers(), 3);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[test]
fn errors_in_del_are_swallowed() {
    let runtime = Runtime::default();
    let mut cx = runtime.enter();
    let del = Function::method("__del__", |_cx, _args| {
        Err(OldClassError::raised("RuntimeError", "cleanup failed"))
    });
    let class = OldClass::with_attrs("Flaky", vec![], [("__del__", del)]).unwrap();
    drop(OldInstance::new(&cx, &class));
    assert_eq!(cx.run_pending_finalizers(), 0);
    assert_eq!(runtime.finalizers().pending_count(), 0);
}

#[test]
fn removed_registration_does_not_fire() {
    let runtime = Runtime::default();
    let mut cx = runtime.enter();
    let hits = Arc::new(AtomicUsize::new(0));
    let class = OldClass::with_attrs("Plain", vec![], []).unwrap();
    let inst = OldInstance::new(&cx, &class);
    inst.set_attr(&mut cx, DEL, counting_del(&hits)).unwrap();
    inst.delete_attr(DEL).unwrap();
    drop(inst);
    assert_eq!(cx.run_pending_finalizers(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn class_and_dict_reassignment_keep_the_invariant() {
    let runtime = Runtime::default();
    let mut cx = runtime.enter();
    let hits = Arc::new(AtomicUsize::new(0));
    let plain = OldClass::with_attrs("Plain", vec![], []).unwrap();
    let finalizing =
        OldClass::with_attrs("Finalizing", vec![], [("__del__", counting_del(&hits))]).unwrap();

    let inst = OldInstance::new(&cx, &plain);
    inst.set_attr(&mut cx, CLASS, Value::Class(finalizing.clone()))
        .unwrap();
    assert!(inst.has_finalizer_registration());

    // An instance-level __del__ keeps the registration alive across a
    // switch back to a class without one.
    let own = Arc::new(FieldIdDict::from_pairs([("__del__", counting_del(&hits))]));
    inst.set_attr(&mut cx, DICT, Value::Dict(own)).unwrap();
    inst.set_attr(&mut cx, CLASS, Value::Class(plain)).unwrap();
    assert!(inst.has_finalizer_registration());

    drop(inst);
    assert_eq!(cx.run_pending_finalizers(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
