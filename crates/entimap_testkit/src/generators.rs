//! Property-based test generators using proptest.

use entimap_codec::Value;
use entimap_core::predicate::{CompareOp, Predicate, PropertyRef};
use proptest::prelude::*;

/// Mapped `Customer` properties usable in predicates.
pub const CUSTOMER_PROPERTIES: [&str; 3] = ["Id", "Name", "Email"];

/// Strategy for comparison operators.
pub fn compare_op_strategy() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Lt),
        Just(CompareOp::Le),
        Just(CompareOp::Gt),
        Just(CompareOp::Ge),
    ]
}

/// Strategy for literal values, including `NULL`.
pub fn literal_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

/// Strategy for translatable leaf predicates over [`CUSTOMER_PROPERTIES`].
pub fn leaf_predicate_strategy() -> impl Strategy<Value = Predicate> {
    let property = proptest::sample::select(&CUSTOMER_PROPERTIES[..]);
    prop_oneof![
        (property.clone(), compare_op_strategy(), literal_strategy())
            .prop_map(|(p, op, v)| PropertyRef::from(p).compare(op, v)),
        (property.clone(), "[a-z]{1,6}").prop_map(|(p, s)| PropertyRef::from(p).contains(s)),
        (property.clone(), "[a-z]{1,6}").prop_map(|(p, s)| PropertyRef::from(p).starts_with(s)),
        (property, "[a-z]{1,6}").prop_map(|(p, s)| PropertyRef::from(p).ends_with(s)),
        any::<bool>().prop_map(Predicate::Literal),
    ]
}

/// Strategy for AND/OR trees of translatable predicates.
pub fn predicate_strategy() -> impl Strategy<Value = Predicate> {
    leaf_predicate_strategy().prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| l.and(r)),
            (inner.clone(), inner).prop_map(|(l, r)| l.or(r)),
        ]
    })
}
