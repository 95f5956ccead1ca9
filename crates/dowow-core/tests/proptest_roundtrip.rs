use dowow_core::{Request, Value};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<Vec<u8>>().prop_map(Value::Undefined),
        any::<i64>().prop_map(Value::I64),
        any::<u64>().prop_map(Value::U64),
        any::<i32>().prop_map(Value::I32),
        any::<u32>().prop_map(Value::U32),
        any::<i16>().prop_map(Value::I16),
        any::<u16>().prop_map(Value::U16),
        any::<u8>().prop_map(Value::U8),
        any::<i8>().prop_map(Value::I8),
        any::<Vec<u8>>().prop_map(Value::Str),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Value::Arr)
    })
}

fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,16}"
}

proptest! {
    #[test]
    fn value_round_trip(v in arb_value()) {
        let mut buf = Vec::new();
        v.encode(&mut buf);
        let (decoded, used) = Value::decode(&buf).unwrap();
        prop_assert_eq!(used, buf.len());
        prop_assert_eq!(decoded, v);
    }

    #[test]
    fn request_round_trip(
        id in any::<u32>(),
        name in arb_name(),
        args in prop::collection::vec((arb_name(), arb_value()), 0..6),
    ) {
        let mut req = Request::new(name).with_id(id);
        for (n, v) in args {
            req = req.set(n, v);
        }
        let buf = req.encode();
        prop_assert_eq!(&buf[0..4], &(buf.len() as u32).to_le_bytes()[..]);
        let (decoded, used) = Request::decode(&buf).unwrap();
        prop_assert_eq!(used, buf.len());
        prop_assert_eq!(decoded, req);
    }
}
