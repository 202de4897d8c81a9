//! Builtin functions
//!
//! Builtins are called with the `$` prefix and live outside the loaded
//! specification. Only their external contract is fixed here; anything the
//! runtime does not know is an `Unbound` lookup miss. Results are linked in
//! the value graph to everything read to produce them.

use crate::ctx::Ctx;
use crate::error::{EvalError, EvalResult};
use crate::value::{Value, ValueKind};
use num_bigint::BigUint;
use num_traits::Zero;
use spectec_il::{Id, Num, NumKind, Region, Typ};

/// Dispatch a `$`-builtin call on already-evaluated arguments
pub fn call_builtin(
    ctx: &mut Ctx,
    id: &Id,
    args: &[Value],
    region: &Region,
) -> EvalResult<Value> {
    ctx.stats.builtin_calls += 1;
    let result = match id.name.as_str() {
        "$sum" => sum(ctx, id, args),
        "$min" => extremum(ctx, id, args, Extremum::Min),
        "$max" => extremum(ctx, id, args, Extremum::Max),
        _ => Err(EvalError::unbound(&id.name)),
    };
    result.map_err(|e| e.with_region(region))
}

/// The single list-of-naturals argument of an aggregate builtin
fn nat_list_arg<'a>(id: &Id, args: &'a [Value]) -> EvalResult<(&'a Value, Vec<&'a BigUint>)> {
    let [list] = args else {
        return Err(EvalError::builtin(format!(
            "{} expects one list argument, got {}",
            id.name,
            args.len()
        )));
    };
    let mut nats = Vec::new();
    for v in list.as_list()? {
        match v.as_num()? {
            Num::Nat(n) => nats.push(n),
            other => {
                return Err(EvalError::KindMismatch {
                    expected: "nat",
                    actual: match other.kind() {
                        NumKind::Int => "int",
                        NumKind::Bits(_) => "bits",
                        NumKind::Nat => unreachable!(),
                    },
                    region: None,
                })
            }
        }
    }
    Ok((list, nats))
}

fn sum(ctx: &mut Ctx, id: &Id, args: &[Value]) -> EvalResult<Value> {
    let (list, nats) = nat_list_arg(id, args)?;
    let mut total = BigUint::zero();
    for n in nats {
        total += n;
    }
    let reads = list.reachable_vids();
    Ok(ctx.make_with_deps(ValueKind::Num(Num::Nat(total)), Typ::nat(), reads))
}

enum Extremum {
    Min,
    Max,
}

fn extremum(ctx: &mut Ctx, id: &Id, args: &[Value], which: Extremum) -> EvalResult<Value> {
    let (list, nats) = nat_list_arg(id, args)?;
    let picked = match which {
        Extremum::Min => nats.iter().min(),
        Extremum::Max => nats.iter().max(),
    };
    let Some(picked) = picked else {
        let name = match which {
            Extremum::Min => "min",
            Extremum::Max => "max",
        };
        return Err(EvalError::builtin(format!("{name} of empty list")));
    };
    let value = (*picked).clone();
    let reads = list.reachable_vids();
    Ok(ctx.make_with_deps(ValueKind::Num(Num::Nat(value)), Typ::nat(), reads))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::SpecEnv;
    use std::sync::Arc;

    fn ctx() -> Ctx {
        Ctx::new(Arc::new(SpecEnv::default()))
    }

    fn nat_list(ctx: &mut Ctx, ns: &[u64]) -> Value {
        let elems: Vec<_> = ns
            .iter()
            .map(|&n| ctx.make(ValueKind::Num(Num::nat(n)), Typ::nat()))
            .collect();
        ctx.make(ValueKind::List(elems), Typ::list(Typ::nat()))
    }

    fn call(ctx: &mut Ctx, name: &str, args: &[Value]) -> EvalResult<Value> {
        call_builtin(ctx, &Id::dummy(name), args, &Region::dummy())
    }

    #[test]
    fn sum_of_one_two_three_is_six() {
        let mut ctx = ctx();
        let list = nat_list(&mut ctx, &[1, 2, 3]);
        let result = call(&mut ctx, "$sum", &[list]).unwrap();
        assert_eq!(result.as_num().unwrap(), &Num::nat(6));
    }

    #[test]
    fn sum_of_empty_is_zero() {
        let mut ctx = ctx();
        let list = nat_list(&mut ctx, &[]);
        let result = call(&mut ctx, "$sum", &[list]).unwrap();
        assert_eq!(result.as_num().unwrap(), &Num::nat(0));
    }

    #[test]
    fn min_of_empty_list_fails() {
        let mut ctx = ctx();
        let list = nat_list(&mut ctx, &[]);
        let err = call(&mut ctx, "$min", &[list]).unwrap_err();
        assert_eq!(err.kind(), "BuiltinError");
        assert_eq!(err.to_string(), "min of empty list");
    }

    #[test]
    fn min_and_max_pick_extremes() {
        let mut ctx = ctx();
        let list = nat_list(&mut ctx, &[4, 1, 9]);
        let min = call(&mut ctx, "$min", &[list.clone()]).unwrap();
        let max = call(&mut ctx, "$max", &[list]).unwrap();
        assert_eq!(min.as_num().unwrap(), &Num::nat(1));
        assert_eq!(max.as_num().unwrap(), &Num::nat(9));
    }

    #[test]
    fn unknown_builtin_is_unbound() {
        let mut ctx = ctx();
        let err = call(&mut ctx, "$frobnicate", &[]).unwrap_err();
        assert_eq!(err.kind(), "Unbound");
    }

    #[test]
    fn result_depends_on_the_list_read() {
        let mut ctx = ctx();
        let list = nat_list(&mut ctx, &[2, 5]);
        let list_vid = list.vid();
        let result = call(&mut ctx, "$sum", &[list]).unwrap();
        let deps = ctx.graph.deps(result.vid());
        assert!(deps.contains(&list_vid));
        assert!(ctx.graph.edges_point_backwards());
    }
}
