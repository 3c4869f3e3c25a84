//! End-to-end coverage of the value adapters, formatting, randomness, and
//! calendar builtins through the public registration surface.

mod common;

use common::{call, call_with_kind, fixture};
use ember_runtime::{EvalKind, SharedRng, Value};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

#[test]
fn format_fixed_precision() {
    let (expr, mut ctx) = fixture();
    let result = call(
        &expr,
        &mut ctx,
        "str",
        vec![Value::string("pi=%.2f"), Value::Number(3.14159)],
    )
    .unwrap();
    assert_eq!(result, Value::string("pi=3.14"));
}

#[test]
fn format_list_argument_bundle() {
    let (expr, mut ctx) = fixture();
    let result = call(
        &expr,
        &mut ctx,
        "str",
        vec![
            Value::string("%s and %d"),
            Value::list(vec![Value::string("cats"), Value::Number(3.0)]),
        ],
    )
    .unwrap();
    assert_eq!(result, Value::string("cats and 3"));
}

#[test]
fn format_underflow_error_names_the_specifier() {
    let (expr, mut ctx) = fixture();
    let err = call(&expr, &mut ctx, "str", vec![Value::string("%d")]).unwrap_err();
    assert_eq!(err.to_string(), "Not enough arguments for %d");
}

#[rstest]
#[case("%05d", Value::Number(7.0), "00007")]
#[case("%x", Value::Number(255.0), "ff")]
#[case("%#X", Value::Number(255.0), "0XFF")]
#[case("%o", Value::Number(9.0), "11")]
#[case("%.1e", Value::Number(1234.0), "1.2e+03")]
#[case("%b", Value::Number(0.0), "false")]
#[case("%S", Value::string("quiet"), "QUIET")]
#[case("%,d", Value::Number(9876543.0), "9,876,543")]
fn format_conversions(#[case] format: &str, #[case] arg: Value, #[case] expected: &str) {
    let (expr, mut ctx) = fixture();
    let result = call(&expr, &mut ctx, "str", vec![Value::string(format), arg]).unwrap();
    assert_eq!(result, Value::string(expected));
}

#[test]
fn convert_date_epoch_parts() {
    let (expr, mut ctx) = fixture();
    let parts = call(&expr, &mut ctx, "convert_date", vec![Value::Number(0.0)]).unwrap();
    assert_eq!(
        parts,
        Value::list_of_nums([1970.0, 1.0, 1.0, 0.0, 0.0, 0.0, 4.0, 1.0, 1.0])
    );
}

#[test]
fn convert_date_reencodes_to_same_millis() {
    let (expr, mut ctx) = fixture();
    // Second-aligned so the truncation to parts loses nothing
    let millis = Value::Number(1_700_000_000_000.0);
    let parts = call(&expr, &mut ctx, "convert_date", vec![millis.clone()]).unwrap();
    let six: Vec<Value> = match &parts {
        Value::List(items) => items.iter().take(6).cloned().collect(),
        other => panic!("expected list, got {:?}", other),
    };
    let reencoded = call(&expr, &mut ctx, "convert_date", vec![Value::list(six)]).unwrap();
    assert_eq!(reencoded, millis);
}

#[test]
fn rand_seeded_list_pick_matches_generator() {
    let (expr, mut ctx) = fixture();
    let list = Value::list(vec![
        Value::Number(10.0),
        Value::Number(20.0),
        Value::Number(30.0),
    ]);
    let replay = SharedRng::seeded(7);
    let expected_index = replay.next_below(3);

    let picked = call(
        &expr,
        &mut ctx,
        "rand",
        vec![list.clone(), Value::Number(7.0)],
    )
    .unwrap();
    match &list {
        Value::List(items) => assert_eq!(picked, items[expected_index].clone()),
        _ => unreachable!(),
    }
}

#[test]
fn rand_in_boolean_context_is_binary() {
    let (expr, mut ctx) = fixture();
    for _ in 0..50 {
        let v = call_with_kind(
            &expr,
            &mut ctx,
            "rand",
            vec![Value::Number(4.0)],
            EvalKind::Boolean,
        )
        .unwrap();
        assert!(v == Value::TRUE || v == Value::FALSE);
    }
}

#[test]
fn noise_samplers_are_seed_deterministic() {
    let (expr, mut ctx) = fixture();
    let perlin_args = vec![
        Value::Number(0.7),
        Value::Number(1.9),
        Value::Number(2.3),
        Value::Number(5.0),
    ];
    let a = call(&expr, &mut ctx, "perlin", perlin_args.clone()).unwrap();
    let b = call(&expr, &mut ctx, "perlin", perlin_args).unwrap();
    assert_eq!(a, b);

    let simplex_args = vec![
        Value::Number(0.7),
        Value::Number(1.9),
        Value::Number(2.3),
        Value::Number(5.0),
    ];
    let a = call(&expr, &mut ctx, "simplex", simplex_args.clone()).unwrap();
    let b = call(&expr, &mut ctx, "simplex", simplex_args).unwrap();
    assert_eq!(a, b);
}

#[test]
fn copy_produces_structurally_equal_independent_value() {
    let (expr, mut ctx) = fixture();
    let original = Value::list(vec![
        Value::string("nested"),
        Value::list(vec![Value::Number(1.0), Value::Number(2.0)]),
    ]);
    let copy = call(&expr, &mut ctx, "copy", vec![original.clone()]).unwrap();
    assert_eq!(copy, original);
}

#[test]
fn hash_code_respects_equality() {
    let (expr, mut ctx) = fixture();
    let a = call(
        &expr,
        &mut ctx,
        "hash_code",
        vec![Value::list(vec![Value::Number(0.0)])],
    )
    .unwrap();
    let b = call(
        &expr,
        &mut ctx,
        "hash_code",
        vec![Value::list(vec![Value::Number(-0.0)])],
    )
    .unwrap();
    assert_eq!(a, b);
}

proptest! {
    #[test]
    fn prop_number_str_roundtrip(
        n in prop::num::f64::POSITIVE | prop::num::f64::NEGATIVE | prop::num::f64::NORMAL | prop::num::f64::ZERO
    ) {
        let (expr, mut ctx) = fixture();
        let rendered = call(
            &expr,
            &mut ctx,
            "str",
            vec![Value::string("%s"), Value::Number(n)],
        )
        .unwrap();
        let back = call(&expr, &mut ctx, "number", vec![rendered]).unwrap();
        prop_assert_eq!(back, Value::Number(n));
    }

    #[test]
    fn prop_bool_is_idempotent_on_strings(s in ".{0,12}") {
        let (expr, mut ctx) = fixture();
        let once = call(&expr, &mut ctx, "bool", vec![Value::string(s)]).unwrap();
        let twice = call(&expr, &mut ctx, "bool", vec![once.clone()]).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_copy_equals_original(items in proptest::collection::vec(-1000.0f64..1000.0, 0..8)) {
        let (expr, mut ctx) = fixture();
        let original = Value::list(items.into_iter().map(Value::Number).collect());
        let copy = call(&expr, &mut ctx, "copy", vec![original.clone()]).unwrap();
        prop_assert_eq!(copy, original);
    }
}
