//! Property tests for effect composition, run on the lab runtime.
//!
//! # Laws Tested
//!
//! - Left identity: `succeed(a).flat_map(f) ≃ f(a)`
//! - Right identity: `m.flat_map(succeed) ≃ m`
//! - Associativity of `flat_map`
//! - `fold_m` is total: it always succeeds when both branches do
//! - `map` over a failure leaves the cause untouched

mod common;

use common::{run, test_proptest_config};
use fibrous::{Effect, Exit};
use proptest::prelude::*;

fn arb_effect() -> impl Strategy<Value = (Effect<i64, String>, Exit<i64, String>)> {
    prop_oneof![
        any::<i64>().prop_map(|n| (Effect::succeed(n), Exit::succeed(n))),
        "[a-z]{1,8}".prop_map(|s| (Effect::fail(s.clone()), Exit::fail(s))),
        any::<i64>().prop_map(|n| (Effect::total(move || n), Exit::succeed(n))),
    ]
}

fn step(n: i64) -> Effect<i64, String> {
    if n % 3 == 0 {
        Effect::fail(format!("multiple of three: {n}"))
    } else {
        Effect::succeed(n.wrapping_mul(2))
    }
}

fn bump(n: i64) -> Effect<i64, String> {
    Effect::succeed(n.wrapping_add(1))
}

proptest! {
    #![proptest_config(test_proptest_config(64))]

    #[test]
    fn left_identity(n in any::<i64>()) {
        prop_assert_eq!(run(Effect::succeed(n).flat_map(step)), run(step(n)));
    }

    #[test]
    fn right_identity((m, expected) in arb_effect()) {
        prop_assert_eq!(run(m.flat_map(Effect::succeed)), expected);
    }

    #[test]
    fn flat_map_is_associative((m, _) in arb_effect()) {
        let nested_left = m.clone().flat_map(step).flat_map(bump);
        let nested_right = m.flat_map(|a| step(a).flat_map(bump));
        prop_assert_eq!(run(nested_left), run(nested_right));
    }

    #[test]
    fn fold_m_is_total((m, expected) in arb_effect()) {
        let folded = m.fold_m(
            |e: String| Effect::<Result<i64, String>, String>::succeed(Err(e)),
            |a| Effect::succeed(Ok(a)),
        );
        let exit = run(folded);
        prop_assert_eq!(exit, Exit::succeed(expected.into_result().map_err(|c| {
            c.failure().cloned().unwrap_or_default()
        })));
    }

    #[test]
    fn map_keeps_failure_cause(s in "[a-z]{1,8}") {
        let exit = run(Effect::<i64, String>::fail(s.clone()).map(|n| n + 1));
        prop_assert_eq!(exit, Exit::fail(s));
    }
}
