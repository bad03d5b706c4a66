//! Integration tests: reference bodies loaded through the JIT and checked by
//! the verification driver.

use proptest::prelude::*;
use strum::IntoEnumIterator;
use tempo_abi::{
    Driver, Expectation, IntrinsicTable, InvocationCase, SignatureVariant, Verdict, GET_TWO_SYMBOL,
};
use tempo_codegen::{BodyKind, EntryBody, EntryLoader, LoadedEntry};

fn load(body: &EntryBody) -> LoadedEntry {
    let table = IntrinsicTable::standard();
    EntryLoader::new(&table).load(body).expect("load")
}

// ===========================================================================
// Driver over reference bodies
// ===========================================================================

#[test]
fn every_reference_body_conforms() {
    for variant in SignatureVariant::iter() {
        let loaded = load(&EntryBody::reference(variant));
        let mut driver = Driver::new(loaded.entry());
        let report = driver
            .run(&InvocationCase::defaults(variant))
            .expect("driver run");
        assert!(report.all_passed(), "{variant}: {report:?}");
        assert_eq!(report.variant, variant);
    }
}

#[test]
fn deterministic_cases_record_reference_outputs() {
    let loaded = load(&EntryBody::reference(SignatureVariant::IntToInt));
    let mut driver = Driver::new(loaded.entry()).with_repeat(3);
    let report = driver
        .run(&[InvocationCase::deterministic("double", 21i64)])
        .unwrap();
    assert_eq!(report.invocations, 4);
    assert_eq!(report.cases[0].observed, Some(42i64.into()));
}

#[test]
fn wrong_offset_is_a_mismatch() {
    let body = EntryBody::new(SignatureVariant::IntArithmetic, BodyKind::Offset(6)).unwrap();
    let loaded = load(&body);
    let mut driver = Driver::new(loaded.entry());
    let report = driver
        .run(&InvocationCase::defaults(SignatureVariant::IntArithmetic))
        .unwrap();
    assert_eq!(report.passed(), 0);
    assert!(matches!(
        report.cases[0].verdict,
        Verdict::Mismatch { .. }
    ));
}

#[test]
fn str_to_int_expectation_is_exact_with_the_standard_table() {
    let loaded = load(&EntryBody::reference(SignatureVariant::StrToInt));
    let mut driver = Driver::new(loaded.entry());
    let case = InvocationCase {
        label: "forty-two".into(),
        input: "ignored".into(),
        expected: Expectation::Exact(42i64.into()),
    };
    assert!(driver.run(&[case]).unwrap().all_passed());
}

#[test]
fn duplicate_is_idempotent_across_calls() {
    let loaded = load(&EntryBody::reference(SignatureVariant::StrToStr));
    let entry = loaded.entry();
    let first = entry.call_str_to_str("tempo").unwrap();
    let second = entry.call_str_to_str("tempo").unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_ne!(first.as_c_str().as_ptr(), second.as_c_str().as_ptr());
}

#[test]
fn custom_table_changes_intrinsic_results() {
    extern "C" fn ten() -> i64 {
        10
    }
    let mut table = IntrinsicTable::new();
    table.register(GET_TWO_SYMBOL, ten).unwrap();
    let body = EntryBody::new(
        SignatureVariant::StrToInt,
        BodyKind::LengthPlusIntrinsic {
            intrinsic: GET_TWO_SYMBOL.into(),
        },
    )
    .unwrap();
    let loaded = EntryLoader::new(&table).load(&body).unwrap();
    assert_eq!(loaded.entry().call_str_to_int("abcd"), Ok(14));
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #[test]
    fn arithmetic_adds_five(n in (i64::MIN)..(i64::MAX - 5)) {
        let loaded = load(&EntryBody::reference(SignatureVariant::IntArithmetic));
        prop_assert_eq!(loaded.entry().call_int(n), Ok(n + 5));
    }

    #[test]
    fn duplicate_copies_every_byte(s in "\\PC{0,64}") {
        let loaded = load(&EntryBody::reference(SignatureVariant::StrToStr));
        let out = loaded.entry().call_str_to_str(&s).unwrap();
        prop_assert_eq!(out.as_bytes(), s.as_bytes());
    }

    #[test]
    fn length_body_adds_two(s in "[a-z]{0,32}") {
        let body = EntryBody::new(
            SignatureVariant::StrToInt,
            BodyKind::LengthPlusIntrinsic { intrinsic: GET_TWO_SYMBOL.into() },
        ).unwrap();
        let loaded = load(&body);
        prop_assert_eq!(loaded.entry().call_str_to_int(&s), Ok(s.len() as i64 + 2));
    }

    #[test]
    fn calls_do_not_depend_on_order(a in any::<i64>(), b in any::<i64>()) {
        let loaded = load(&EntryBody::reference(SignatureVariant::IntToInt));
        let entry = loaded.entry();
        let alone = entry.call_int(a).unwrap();
        let _ = entry.call_int(b).unwrap();
        prop_assert_eq!(entry.call_int(a).unwrap(), alone);
    }
}
