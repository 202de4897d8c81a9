//! Property-based tests for the interpreter's value layer
//!
//! These verify algebraic laws of the numeric abstraction, structural value
//! equality, and matcher totality across randomized inputs.

use num_traits::ToPrimitive;
use proptest::prelude::*;
use spectec_il::{Id, Num, NumError, Pattern, Typ};
use spectec_interp::{match_pattern, Ctx, SpecEnv, Value, ValueKind};
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

fn ctx() -> Ctx {
    Ctx::new(Arc::new(SpecEnv::default()))
}

fn nat_value(ctx: &mut Ctx, n: u64) -> Value {
    ctx.make(ValueKind::Num(Num::nat(n)), Typ::nat())
}

fn nat_list(ctx: &mut Ctx, ns: &[u64]) -> Value {
    let elems: Vec<_> = ns.iter().map(|&n| nat_value(ctx, n)).collect();
    ctx.make(ValueKind::List(elems), Typ::list(Typ::nat()))
}

// ============================================================================
// Numeric laws
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn prop_nat_add_commutes(a: u64, b: u64) {
        let x = Num::nat(a);
        let y = Num::nat(b);
        prop_assert_eq!(x.checked_add(&y).unwrap(), y.checked_add(&x).unwrap());
    }

    #[test]
    fn prop_nat_sub_underflows_iff_less(a: u64, b: u64) {
        let result = Num::nat(a).checked_sub(&Num::nat(b));
        if a < b {
            prop_assert_eq!(result, Err(NumError::Underflow));
        } else {
            prop_assert_eq!(result.unwrap(), Num::nat(a - b));
        }
    }

    #[test]
    fn prop_bits_results_stay_under_width(a: u64, b: u64, width in 1u32..=64u32) {
        let modulus = 1u128 << width;
        let x = Num::bits(width, a);
        let y = Num::bits(width, b);
        for result in [
            x.checked_add(&y).unwrap(),
            x.checked_sub(&y).unwrap(),
            x.checked_mul(&y).unwrap(),
        ] {
            let Num::Bits { value, .. } = result else {
                prop_assert!(false, "bit-vector op changed kind");
                unreachable!();
            };
            prop_assert!((value.to_u128().unwrap()) < modulus);
        }
    }

    #[test]
    fn prop_bits_add_wraps_exactly(a: u64, b: u64) {
        let modulus = 1u128 << 32;
        let expected = ((a as u128 % modulus) + (b as u128 % modulus)) % modulus;
        let sum = Num::bits(32, a).checked_add(&Num::bits(32, b)).unwrap();
        let Num::Bits { value, .. } = sum else { panic!("kind changed") };
        prop_assert_eq!(value.to_u128().unwrap(), expected);
    }

    #[test]
    fn prop_num_compare_is_total_order(a: u64, b: u64) {
        let x = Num::nat(a);
        let y = Num::nat(b);
        let fwd = x.compare(&y).unwrap();
        let rev = y.compare(&x).unwrap();
        prop_assert_eq!(fwd, rev.reverse());
    }

    #[test]
    fn prop_num_serde_roundtrips(n: u64, w in 1u32..=64u32) {
        for num in [Num::nat(n), Num::int(n as i64), Num::bits(w, n)] {
            let encoded = serde_json::to_string(&num).unwrap();
            let decoded: Num = serde_json::from_str(&encoded).unwrap();
            prop_assert_eq!(decoded, num);
        }
    }
}

// ============================================================================
// Value equality and matcher totality
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_equality_ignores_identity(ns in prop::collection::vec(any::<u64>(), 0..8)) {
        let mut ctx = ctx();
        let a = nat_list(&mut ctx, &ns);
        let b = nat_list(&mut ctx, &ns);
        prop_assert_ne!(a.vid(), b.vid());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_var_pattern_matches_anything(ns in prop::collection::vec(any::<u64>(), 0..8)) {
        let mut ctx = ctx();
        let v = nat_list(&mut ctx, &ns);
        let bindings = match_pattern(&mut ctx, &Pattern::VarP(Id::dummy("whole")), &v)
            .unwrap()
            .expect("variable binder is total");
        prop_assert_eq!(bindings.len(), 1);
        prop_assert_eq!(&bindings[0].1, &v);
    }

    #[test]
    fn prop_rest_binder_recovers_the_middle(ns in prop::collection::vec(any::<u64>(), 2..10)) {
        let mut ctx = ctx();
        let v = nat_list(&mut ctx, &ns);
        let pattern = Pattern::ListP {
            prefix: vec![Pattern::WildP],
            rest: Some(Id::dummy("mid")),
            suffix: vec![Pattern::WildP],
        };
        let bindings = match_pattern(&mut ctx, &pattern, &v).unwrap().unwrap();
        let mid = &bindings[0].1;
        let expected = nat_list(&mut ctx, &ns[1..ns.len() - 1]);
        prop_assert_eq!(mid, &expected);
    }

    #[test]
    fn prop_literal_pattern_matches_iff_equal(a: u64, b: u64) {
        let mut ctx = ctx();
        let v = nat_value(&mut ctx, a);
        let hit = match_pattern(&mut ctx, &Pattern::NumP(Num::nat(b)), &v)
            .unwrap()
            .is_some();
        prop_assert_eq!(hit, a == b);
    }
}
