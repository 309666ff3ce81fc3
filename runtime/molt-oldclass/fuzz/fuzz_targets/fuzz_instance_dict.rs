#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use molt_oldclass::{AttributeStore, FieldIdDict, InstanceDict, SymbolId, Value};

#[derive(Arbitrary, Debug)]
enum Op {
    Set(u8, i64),
    Delete(u8),
    Get(u8),
}

fuzz_target!(|ops: Vec<Op>| {
    let compact = InstanceDict::new();
    let generic = FieldIdDict::new();
    let name = |n: u8| SymbolId::intern(&format!("fuzz_{}", n % 32));
    for op in ops {
        match op {
            Op::Set(n, v) => {
                compact.set(name(n), Value::Int(v));
                generic.set(name(n), Value::Int(v));
            }
            Op::Delete(n) => assert_eq!(compact.delete(name(n)), generic.delete(name(n))),
            Op::Get(n) => assert_eq!(compact.get(name(n)), generic.get(name(n))),
        }
        assert_eq!(compact.len(), generic.len());
    }
});
