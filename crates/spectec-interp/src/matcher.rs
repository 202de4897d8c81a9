//! Structural matching of values against patterns
//!
//! The matcher is total: it never diverges and never fails on a shape it was
//! not written for; a value that does not fit a pattern is simply no match.
//! Regions never participate in the comparison.

use crate::ctx::Ctx;
use crate::error::{EvalError, EvalResult};
use crate::value::{Value, ValueKind};
use spectec_il::{Exp, ExpKind, Id, Pattern};

/// Bindings produced by a successful match, in binder order
pub type Bindings = Vec<(Id, Value)>;

/// Install bindings into the current scope
pub fn apply_bindings(ctx: &mut Ctx, bindings: Bindings) {
    for (id, value) in bindings {
        let typ = value.note.typ.clone();
        ctx.bind(&id, typ, value);
    }
}

/// Match a value against a pattern, producing bindings or `None`
pub fn match_pattern(
    ctx: &mut Ctx,
    pattern: &Pattern,
    value: &Value,
) -> EvalResult<Option<Bindings>> {
    let mut bindings = Bindings::new();
    if matches(ctx, pattern, value, &mut bindings)? {
        Ok(Some(bindings))
    } else {
        Ok(None)
    }
}

fn matches(
    ctx: &mut Ctx,
    pattern: &Pattern,
    value: &Value,
    bindings: &mut Bindings,
) -> EvalResult<bool> {
    match (pattern, &value.kind) {
        (Pattern::WildP, _) => Ok(true),
        (Pattern::VarP(id), _) => {
            bindings.push((id.clone(), value.clone()));
            Ok(true)
        }
        (Pattern::BoolP(b), ValueKind::Bool(v)) => Ok(b == v),
        (Pattern::NumP(n), ValueKind::Num(v)) => Ok(n == v),
        (Pattern::TextP(s), ValueKind::Text(v)) => Ok(s == v),
        (Pattern::CaseP(mixop, subps), ValueKind::Case(m, vs)) => {
            if mixop != m || subps.len() != vs.len() {
                return Ok(false);
            }
            all_match(ctx, subps, vs, bindings)
        }
        (Pattern::TupleP(subps), ValueKind::Tuple(vs)) => {
            if subps.len() != vs.len() {
                return Ok(false);
            }
            all_match(ctx, subps, vs, bindings)
        }
        (Pattern::OptP(None), ValueKind::Opt(None)) => Ok(true),
        (Pattern::OptP(Some(p)), ValueKind::Opt(Some(v))) => matches(ctx, p, v, bindings),
        (
            Pattern::ListP {
                prefix,
                rest,
                suffix,
            },
            ValueKind::List(xs),
        ) => {
            if xs.len() < prefix.len() + suffix.len() {
                return Ok(false);
            }
            let (front, back) = xs.split_at(prefix.len());
            let (middle, tail) = back.split_at(back.len() - suffix.len());
            if !all_match(ctx, prefix, front, bindings)? {
                return Ok(false);
            }
            if !all_match(ctx, suffix, tail, bindings)? {
                return Ok(false);
            }
            if let Some(id) = rest {
                let typ = value.note.typ.clone();
                let slice = ctx.make(ValueKind::List(middle.to_vec()), typ);
                bindings.push((id.clone(), slice));
            }
            Ok(true)
        }
        // a pattern aimed at a different dynamic tag is no match
        _ => Ok(false),
    }
}

fn all_match(
    ctx: &mut Ctx,
    patterns: &[Pattern],
    values: &[Value],
    bindings: &mut Bindings,
) -> EvalResult<bool> {
    debug_assert_eq!(patterns.len(), values.len());
    for (p, v) in patterns.iter().zip(values) {
        if !matches(ctx, p, v, bindings)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Reinterpret an expression as the pattern it spells
///
/// `LetI` left-hand sides and the output positions of a rule notation are
/// expressions in the tree but bind like patterns.
pub fn exp_to_pattern(exp: &Exp) -> EvalResult<Pattern> {
    let pattern = match &exp.kind {
        ExpKind::VarE(id) => Pattern::VarP(id.clone()),
        ExpKind::BoolE(b) => Pattern::BoolP(*b),
        ExpKind::NumE(n) => Pattern::NumP(n.clone()),
        ExpKind::TextE(s) => Pattern::TextP(s.clone()),
        ExpKind::TupleE(es) => Pattern::TupleP(exps_to_patterns(es)?),
        ExpKind::ListE(es) => Pattern::ListP {
            prefix: exps_to_patterns(es)?,
            rest: None,
            suffix: vec![],
        },
        ExpKind::OptE(None) => Pattern::OptP(None),
        ExpKind::OptE(Some(e)) => Pattern::OptP(Some(Box::new(exp_to_pattern(e)?))),
        ExpKind::CaseE(mixop, es) => Pattern::CaseP(mixop.clone(), exps_to_patterns(es)?),
        _ => {
            return Err(EvalError::internal(format!(
                "expression `{exp}` is not usable as a binding pattern"
            ))
            .with_region(&exp.region))
        }
    };
    Ok(pattern)
}

fn exps_to_patterns(exps: &[Exp]) -> EvalResult<Vec<Pattern>> {
    exps.iter().map(exp_to_pattern).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::SpecEnv;
    use spectec_il::{MixOp, Num, Typ};
    use std::sync::Arc;

    fn ctx() -> Ctx {
        Ctx::new(Arc::new(SpecEnv::default()))
    }

    fn nat(ctx: &mut Ctx, n: u64) -> Value {
        ctx.make(ValueKind::Num(Num::nat(n)), Typ::nat())
    }

    fn nat_list(ctx: &mut Ctx, ns: &[u64]) -> Value {
        let elems: Vec<_> = ns.iter().map(|&n| nat(ctx, n)).collect();
        ctx.make(ValueKind::List(elems), Typ::list(Typ::nat()))
    }

    #[test]
    fn wildcard_matches_without_binding() {
        let mut ctx = ctx();
        let v = nat(&mut ctx, 5);
        let bindings = match_pattern(&mut ctx, &Pattern::WildP, &v).unwrap().unwrap();
        assert!(bindings.is_empty());
    }

    #[test]
    fn var_binds_whole_value() {
        let mut ctx = ctx();
        let v = nat(&mut ctx, 5);
        let bindings = match_pattern(&mut ctx, &Pattern::VarP(Id::dummy("x")), &v)
            .unwrap()
            .unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].1, v);
    }

    #[test]
    fn constructor_requires_same_operator() {
        let mut ctx = ctx();
        let some = MixOp::prefix("Some", 1);
        let none = MixOp::prefix("None", 0);
        let inner = nat(&mut ctx, 1);
        let v = ctx.make(ValueKind::Case(some.clone(), vec![inner]), Typ::var("opt"));
        let hit = match_pattern(
            &mut ctx,
            &Pattern::CaseP(some, vec![Pattern::VarP(Id::dummy("x"))]),
            &v,
        )
        .unwrap();
        assert!(hit.is_some());
        let miss = match_pattern(&mut ctx, &Pattern::CaseP(none, vec![]), &v).unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn list_pattern_slices_prefix_rest_suffix() {
        let mut ctx = ctx();
        let v = nat_list(&mut ctx, &[1, 2, 3, 4]);
        let p = Pattern::ListP {
            prefix: vec![Pattern::VarP(Id::dummy("h"))],
            rest: Some(Id::dummy("mid")),
            suffix: vec![Pattern::VarP(Id::dummy("last"))],
        };
        let bindings = match_pattern(&mut ctx, &p, &v).unwrap().unwrap();
        let mid = &bindings.iter().find(|(id, _)| id.name == "mid").unwrap().1;
        let expected = nat_list(&mut ctx, &[2, 3]);
        assert_eq!(mid, &expected);

        let too_short = nat_list(&mut ctx, &[1]);
        assert!(match_pattern(&mut ctx, &p, &too_short).unwrap().is_none());
    }

    #[test]
    fn mismatched_tags_are_no_match_not_errors() {
        let mut ctx = ctx();
        let v = nat(&mut ctx, 3);
        assert!(match_pattern(&mut ctx, &Pattern::TupleP(vec![]), &v)
            .unwrap()
            .is_none());
        assert!(match_pattern(&mut ctx, &Pattern::BoolP(true), &v)
            .unwrap()
            .is_none());
    }
}
