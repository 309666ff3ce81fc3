#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use molt_oldclass::object::ops;
use molt_oldclass::{Function, OldClass, OldInstance, Runtime, Value};

#[derive(Arbitrary, Debug)]
enum Hook {
    Absent,
    Fixed(i64),
    Declines,
    Recurse,
}

#[derive(Arbitrary, Debug)]
struct Input {
    hooks: Vec<(Hook, Hook)>,
    pairs: Vec<(u8, u8)>,
}

fn cmp_hook(hook: &Hook) -> Option<Value> {
    match hook {
        Hook::Absent => None,
        Hook::Fixed(k) => {
            let k = *k;
            Some(Function::method("__cmp__", move |_cx, _args| Ok(Value::Int(k))))
        }
        Hook::Declines => Some(Function::method("__cmp__", |_cx, _args| {
            Ok(Value::NotImplemented)
        })),
        Hook::Recurse => Some(Function::method("__cmp__", |cx, args| {
            Ok(Value::Int(ops::compare(cx, &args[1], &args[0])?))
        })),
    }
}

fn eq_hook(hook: &Hook) -> Option<Value> {
    match hook {
        Hook::Absent => None,
        Hook::Fixed(k) => {
            let equal = *k == 0;
            Some(Function::method("__eq__", move |_cx, _args| Ok(Value::Bool(equal))))
        }
        Hook::Declines => Some(Function::method("__eq__", |_cx, _args| {
            Ok(Value::NotImplemented)
        })),
        Hook::Recurse => Some(Function::method("__eq__", |cx, args| {
            Ok(Value::Bool(ops::eq(cx, &args[1], &args[0])?))
        })),
    }
}

// Only a hook with a fixed result can report an ordering outside -1..=1.
fn input_has_fixed(hooks: &[(Hook, Hook)]) -> bool {
    hooks
        .iter()
        .take(8)
        .any(|(cmp, _)| matches!(cmp, Hook::Fixed(_)))
}

fuzz_target!(|input: Input| {
    let runtime = Runtime::default();
    let mut cx = runtime.enter();
    let mut values = vec![Value::Int(0), Value::str("s")];
    for (i, (cmp, eq)) in input.hooks.iter().take(8).enumerate() {
        let attrs: Vec<(&str, Value)> = [("__cmp__", cmp_hook(cmp)), ("__eq__", eq_hook(eq))]
            .into_iter()
            .filter_map(|(name, hook)| hook.map(|hook| (name, hook)))
            .collect();
        let Ok(class) = OldClass::with_attrs(&format!("F{i}"), vec![], attrs) else {
            return;
        };
        values.push(Value::Instance(OldInstance::new(&cx, &class)));
    }
    for &(l, r) in &input.pairs {
        let lhs = &values[l as usize % values.len()];
        let rhs = &values[r as usize % values.len()];
        if let Ok(ordering) = ops::compare(&mut cx, lhs, rhs) {
            assert!((-1..=1).contains(&ordering) || input_has_fixed(&input.hooks));
        }
        let _ = ops::eq(&mut cx, lhs, rhs);
        assert_eq!(cx.guard().depth(), 0);
    }
});
