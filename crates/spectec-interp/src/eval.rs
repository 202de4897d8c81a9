//! Expression evaluation
//!
//! `eval_exp` is deterministic and pure with respect to the variable scope;
//! it does grow the value graph, because every produced value is registered
//! with the context's factory. Evaluation order is left-to-right, outside-in,
//! matching the textual structure of the tree.

use crate::ctx::Ctx;
use crate::error::{EvalError, EvalResult};
use crate::matcher::{apply_bindings, match_pattern, Bindings};
use crate::value::{Value, ValueKind};
use crate::{builtins, interp};
use num_bigint::BigUint;
use spectec_il::{
    BinOp, CmpOp, Exp, ExpKind, Id, Iter, IterExp, Num, OpTyp, Region, Typ, UnOp,
};
use std::cmp::Ordering;

/// Evaluate a pure expression to a value
pub fn eval_exp(ctx: &mut Ctx, exp: &Exp) -> EvalResult<Value> {
    eval_kind(ctx, exp).map_err(|e| e.with_region(&exp.region))
}

fn eval_kind(ctx: &mut Ctx, exp: &Exp) -> EvalResult<Value> {
    match &exp.kind {
        ExpKind::BoolE(b) => Ok(ctx.make(ValueKind::Bool(*b), exp.typ.clone())),
        ExpKind::NumE(n) => Ok(ctx.make(ValueKind::Num(n.clone()), exp.typ.clone())),
        ExpKind::TextE(s) => Ok(ctx.make(ValueKind::Text(s.clone()), exp.typ.clone())),

        ExpKind::VarE(id) => ctx.lookup(id),
        ExpKind::FuncE(id) => Ok(ctx.make(ValueKind::Func(id.clone()), exp.typ.clone())),

        ExpKind::UnE(op, optyp, e) => eval_un(ctx, *op, *optyp, e, exp),
        ExpKind::BinE(op, optyp, l, r) => eval_bin(ctx, *op, *optyp, l, r, exp),
        ExpKind::CmpE(op, optyp, l, r) => eval_cmp(ctx, *op, *optyp, l, r, exp),

        ExpKind::TupleE(es) => {
            let vs = eval_all(ctx, es)?;
            Ok(ctx.make(ValueKind::Tuple(vs), exp.typ.clone()))
        }
        ExpKind::ListE(es) => {
            let vs = eval_all(ctx, es)?;
            Ok(ctx.make(ValueKind::List(vs), exp.typ.clone()))
        }
        ExpKind::OptE(None) => Ok(ctx.make(ValueKind::Opt(None), exp.typ.clone())),
        ExpKind::OptE(Some(e)) => {
            let v = eval_exp(ctx, e)?;
            Ok(ctx.make(ValueKind::Opt(Some(Box::new(v))), exp.typ.clone()))
        }
        ExpKind::CaseE(mixop, es) => {
            let vs = eval_all(ctx, es)?;
            Ok(ctx.make(ValueKind::Case(mixop.clone(), vs), exp.typ.clone()))
        }
        ExpKind::StrE(fields) => {
            let mut out = Vec::with_capacity(fields.len());
            for (atom, e) in fields {
                out.push((atom.clone(), eval_exp(ctx, e)?));
            }
            Ok(ctx.make(ValueKind::Struct(out), exp.typ.clone()))
        }

        ExpKind::DotE(e, atom) => {
            let v = eval_exp(ctx, e)?;
            Ok(v.as_struct(atom)?.clone())
        }
        ExpKind::ProjE(e, idx) => {
            let v = eval_exp(ctx, e)?;
            let vs = v.as_tuple()?;
            vs.get(*idx).cloned().ok_or_else(|| {
                EvalError::internal(format!(
                    "tuple projection .{idx} out of range for arity {}",
                    vs.len()
                ))
            })
        }
        ExpKind::HeadE(e) => {
            let v = eval_exp(ctx, e)?;
            let vs = v.as_list()?;
            vs.first()
                .cloned()
                .ok_or(EvalError::EmptyList { region: None })
        }
        ExpKind::TailE(e) => {
            let v = eval_exp(ctx, e)?;
            let vs = v.as_list()?;
            if vs.is_empty() {
                return Err(EvalError::EmptyList { region: None });
            }
            let rest = vs[1..].to_vec();
            Ok(ctx.make(ValueKind::List(rest), v.note.typ.clone()))
        }

        ExpKind::LenE(e) => {
            let v = eval_exp(ctx, e)?;
            let len = v.as_list()?.len();
            Ok(ctx.make(
                ValueKind::Num(Num::Nat(BigUint::from(len))),
                exp.typ.clone(),
            ))
        }
        ExpKind::MemE(e, list) => {
            let needle = eval_exp(ctx, e)?;
            let hay = eval_exp(ctx, list)?;
            let found = hay.as_list()?.contains(&needle);
            Ok(ctx.make(ValueKind::Bool(found), exp.typ.clone()))
        }
        ExpKind::CatE(l, r) => {
            let lv = eval_exp(ctx, l)?;
            let rv = eval_exp(ctx, r)?;
            match (&lv.kind, &rv.kind) {
                (ValueKind::List(a), ValueKind::List(b)) => {
                    let mut out = a.clone();
                    out.extend(b.iter().cloned());
                    Ok(ctx.make(ValueKind::List(out), exp.typ.clone()))
                }
                (ValueKind::Text(a), ValueKind::Text(b)) => {
                    let mut out = a.clone();
                    out.push_str(b);
                    Ok(ctx.make(ValueKind::Text(out), exp.typ.clone()))
                }
                _ => Err(EvalError::KindMismatch {
                    expected: "two lists or two texts",
                    actual: lv.type_name(),
                    region: None,
                }),
            }
        }

        ExpKind::IterE(body, iter, vars) => eval_iter(ctx, body, *iter, vars, exp),

        ExpKind::CallE(id, args) => {
            let values = eval_all(ctx, args)?;
            if id.name.starts_with('$') {
                builtins::call_builtin(ctx, id, &values, &exp.region)
            } else {
                interp::call_func(ctx, id, values, &exp.region)
            }
        }

        ExpKind::MatchE(scrut, arms) => {
            let v = eval_exp(ctx, scrut)?;
            for (pattern, arm) in arms {
                if let Some(bindings) = match_pattern(ctx, pattern, &v)? {
                    return ctx.in_scope(|ctx| {
                        apply_bindings(ctx, bindings);
                        eval_exp(ctx, arm)
                    });
                }
            }
            Err(EvalError::LetMismatch { region: None })
        }
    }
}

fn eval_all(ctx: &mut Ctx, exps: &[Exp]) -> EvalResult<Vec<Value>> {
    exps.iter().map(|e| eval_exp(ctx, e)).collect()
}

// ============================================================================
// Operators
// ============================================================================

fn eval_un(ctx: &mut Ctx, op: UnOp, optyp: OpTyp, e: &Exp, exp: &Exp) -> EvalResult<Value> {
    let v = eval_exp(ctx, e)?;
    match (op, optyp) {
        (UnOp::NotOp, OpTyp::BoolT) => {
            let b = v.as_bool()?;
            Ok(ctx.make(ValueKind::Bool(!b), exp.typ.clone()))
        }
        (UnOp::PlusOp, OpTyp::NumT(_)) => {
            v.as_num()?;
            Ok(v)
        }
        (UnOp::MinusOp, OpTyp::NumT(_)) => {
            let n = v.as_num()?.checked_neg().map_err(EvalError::from_num)?;
            Ok(ctx.make(ValueKind::Num(n), exp.typ.clone()))
        }
        _ => Err(EvalError::internal(format!(
            "unary operator {op} is not defined at this type"
        ))),
    }
}

fn eval_bin(
    ctx: &mut Ctx,
    op: BinOp,
    optyp: OpTyp,
    l: &Exp,
    r: &Exp,
    exp: &Exp,
) -> EvalResult<Value> {
    match optyp {
        OpTyp::BoolT => {
            let lv = eval_exp(ctx, l)?.as_bool()?;
            // the right side is not evaluated when the left decides
            let result = match op {
                BinOp::AndOp if !lv => false,
                BinOp::OrOp if lv => true,
                BinOp::ImplOp if !lv => true,
                BinOp::AndOp | BinOp::OrOp | BinOp::ImplOp => eval_exp(ctx, r)?.as_bool()?,
                BinOp::EquivOp => lv == eval_exp(ctx, r)?.as_bool()?,
                _ => {
                    return Err(EvalError::internal(format!(
                        "operator {op} is not a boolean operator"
                    )))
                }
            };
            Ok(ctx.make(ValueKind::Bool(result), exp.typ.clone()))
        }
        OpTyp::NumT(_) => {
            let lv = eval_exp(ctx, l)?;
            let rv = eval_exp(ctx, r)?;
            let (a, b) = (lv.as_num()?, rv.as_num()?);
            let result = match op {
                BinOp::AddOp => a.checked_add(b),
                BinOp::SubOp => a.checked_sub(b),
                BinOp::MulOp => a.checked_mul(b),
                BinOp::DivOp => a.checked_div(b),
                BinOp::ModOp => a.checked_rem(b),
                BinOp::PowOp => a.checked_pow(b),
                _ => {
                    return Err(EvalError::internal(format!(
                        "operator {op} is not a numeric operator"
                    )))
                }
            }
            .map_err(EvalError::from_num)?;
            Ok(ctx.make(ValueKind::Num(result), exp.typ.clone()))
        }
        OpTyp::TextT => Err(EvalError::internal(format!(
            "operator {op} is not defined on text"
        ))),
    }
}

fn eval_cmp(
    ctx: &mut Ctx,
    op: CmpOp,
    optyp: OpTyp,
    l: &Exp,
    r: &Exp,
    exp: &Exp,
) -> EvalResult<Value> {
    let lv = eval_exp(ctx, l)?;
    let rv = eval_exp(ctx, r)?;
    let result = compare_values(op, optyp, &lv, &rv)?;
    Ok(ctx.make(ValueKind::Bool(result), exp.typ.clone()))
}

/// Comparison semantics shared by `CmpE` and `CmpG`
pub(crate) fn compare_values(
    op: CmpOp,
    optyp: OpTyp,
    lv: &Value,
    rv: &Value,
) -> EvalResult<bool> {
    match op {
        // equality is structural at every type and ignores identities
        CmpOp::EqOp => Ok(lv == rv),
        CmpOp::NeOp => Ok(lv != rv),
        CmpOp::LtOp | CmpOp::GtOp | CmpOp::LeOp | CmpOp::GeOp => {
            let ordering = match optyp {
                OpTyp::TextT => lv.as_text()?.cmp(rv.as_text()?),
                _ => lv
                    .as_num()?
                    .compare(rv.as_num()?)
                    .map_err(EvalError::from_num)?,
            };
            Ok(match op {
                CmpOp::LtOp => ordering == Ordering::Less,
                CmpOp::GtOp => ordering == Ordering::Greater,
                CmpOp::LeOp => ordering != Ordering::Greater,
                CmpOp::GeOp => ordering != Ordering::Less,
                _ => unreachable!(),
            })
        }
    }
}

// ============================================================================
// Iteration
// ============================================================================

fn eval_iter(
    ctx: &mut Ctx,
    body: &Exp,
    iter: Iter,
    vars: &[Id],
    exp: &Exp,
) -> EvalResult<Value> {
    match iter {
        Iter::List => {
            let sources = list_sources(ctx, vars)?;
            let n = common_length(&sources)?;
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                let v = ctx.in_scope(|ctx| {
                    bind_list_iteration(ctx, &sources, i);
                    eval_exp(ctx, body)
                })?;
                out.push(v);
            }
            Ok(ctx.make(ValueKind::List(out), exp.typ.clone()))
        }
        Iter::Opt => match opt_sources(ctx, vars)? {
            None => Ok(ctx.make(ValueKind::Opt(None), exp.typ.clone())),
            Some(inners) => {
                let v = ctx.in_scope(|ctx| {
                    bind_opt_iteration(ctx, &inners);
                    eval_exp(ctx, body)
                })?;
                Ok(ctx.make(ValueKind::Opt(Some(Box::new(v))), exp.typ.clone()))
            }
        },
    }
}

/// The lifted list value of each binder, in binder order
pub(crate) fn list_sources(ctx: &Ctx, vars: &[Id]) -> EvalResult<Vec<(Id, Vec<Value>)>> {
    if vars.is_empty() {
        return Err(EvalError::internal("list iteration without binders"));
    }
    let mut out = Vec::with_capacity(vars.len());
    for id in vars {
        let v = ctx.lookup(id)?;
        let elems = v
            .as_list()
            .map_err(|e| e.with_region(&id.region))?
            .to_vec();
        out.push((id.clone(), elems));
    }
    Ok(out)
}

/// The common iteration count, or `IterLengthMismatch`
pub(crate) fn common_length(sources: &[(Id, Vec<Value>)]) -> EvalResult<usize> {
    let lengths: Vec<usize> = sources.iter().map(|(_, vs)| vs.len()).collect();
    let n = lengths[0];
    if lengths.iter().any(|&l| l != n) {
        return Err(EvalError::IterLengthMismatch {
            lengths,
            region: None,
        });
    }
    Ok(n)
}

pub(crate) fn bind_list_iteration(ctx: &mut Ctx, sources: &[(Id, Vec<Value>)], i: usize) {
    for (id, elems) in sources {
        let v = elems[i].clone();
        let typ = v.note.typ.clone();
        ctx.bind(id, typ, v);
    }
}

/// The inner values of an optional iteration: `Some` when every binder is
/// present, `None` when every binder is absent, otherwise a length mismatch
pub(crate) fn opt_sources(ctx: &Ctx, vars: &[Id]) -> EvalResult<Option<Vec<(Id, Value)>>> {
    if vars.is_empty() {
        return Err(EvalError::internal("optional iteration without binders"));
    }
    let mut inners = Vec::with_capacity(vars.len());
    let mut present = 0usize;
    for id in vars {
        let v = ctx.lookup(id)?;
        let inner = v.as_opt().map_err(|e| e.with_region(&id.region))?.cloned();
        if inner.is_some() {
            present += 1;
        }
        inners.push((id.clone(), inner));
    }
    if present == 0 {
        Ok(None)
    } else if present == vars.len() {
        Ok(Some(
            inners
                .into_iter()
                .map(|(id, v)| (id, v.expect("checked present")))
                .collect(),
        ))
    } else {
        Err(EvalError::IterLengthMismatch {
            lengths: vec![present, vars.len()],
            region: None,
        })
    }
}

pub(crate) fn bind_opt_iteration(ctx: &mut Ctx, inners: &[(Id, Value)]) {
    for (id, v) in inners {
        let typ = v.note.typ.clone();
        ctx.bind(id, typ, v.clone());
    }
}

/// Whether a condition holds across every iteration of its contexts
pub(crate) fn holds_for_iterations(
    ctx: &mut Ctx,
    iters: &[IterExp],
    region: &Region,
    cond: &mut dyn FnMut(&mut Ctx) -> EvalResult<bool>,
) -> EvalResult<bool> {
    let Some((first, rest)) = iters.split_first() else {
        return cond(ctx);
    };
    match first.iter {
        Iter::List => {
            let sources = list_sources(ctx, &first.vars)?;
            let n = common_length(&sources).map_err(|e| e.with_region(region))?;
            for i in 0..n {
                let holds = ctx.in_scope(|ctx| {
                    bind_list_iteration(ctx, &sources, i);
                    holds_for_iterations(ctx, rest, region, &mut *cond)
                })?;
                if !holds {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Iter::Opt => match opt_sources(ctx, &first.vars)? {
            None => Ok(true),
            Some(inners) => ctx.in_scope(|ctx| {
                bind_opt_iteration(ctx, &inners);
                holds_for_iterations(ctx, rest, region, &mut *cond)
            }),
        },
    }
}

/// Run a binding step under its iteration contexts and lift the bindings it
/// produces: per-iteration values become a list (or an optional) in order
pub(crate) fn bind_for_iterations(
    ctx: &mut Ctx,
    iters: &[IterExp],
    region: &Region,
    expected: &[(Id, Typ)],
    body: &mut dyn FnMut(&mut Ctx) -> EvalResult<Bindings>,
) -> EvalResult<Bindings> {
    let Some((first, rest)) = iters.split_first() else {
        return body(ctx);
    };
    match first.iter {
        Iter::List => {
            let sources = list_sources(ctx, &first.vars)?;
            let n = common_length(&sources).map_err(|e| e.with_region(region))?;
            let mut rounds: Vec<Bindings> = Vec::with_capacity(n);
            for i in 0..n {
                let round = ctx.in_scope(|ctx| {
                    bind_list_iteration(ctx, &sources, i);
                    bind_for_iterations(ctx, rest, region, expected, &mut *body)
                })?;
                rounds.push(round);
            }
            lift_rounds_list(ctx, expected, rounds)
        }
        Iter::Opt => match opt_sources(ctx, &first.vars)? {
            None => Ok(expected
                .iter()
                .map(|(id, typ)| {
                    let v = ctx.make(ValueKind::Opt(None), Typ::opt(typ.clone()));
                    (id.clone(), v)
                })
                .collect()),
            Some(inners) => {
                let round = ctx.in_scope(|ctx| {
                    bind_opt_iteration(ctx, &inners);
                    bind_for_iterations(ctx, rest, region, expected, &mut *body)
                })?;
                Ok(round
                    .into_iter()
                    .map(|(id, v)| {
                        let typ = Typ::opt(v.note.typ.clone());
                        let lifted = ctx.make(ValueKind::Opt(Some(Box::new(v))), typ);
                        (id, lifted)
                    })
                    .collect())
            }
        },
    }
}

fn lift_rounds_list(
    ctx: &mut Ctx,
    expected: &[(Id, Typ)],
    rounds: Vec<Bindings>,
) -> EvalResult<Bindings> {
    let mut lifted = Bindings::new();
    for (id, elem_typ) in expected {
        let mut column = Vec::with_capacity(rounds.len());
        for round in &rounds {
            let v = round
                .iter()
                .find(|(bid, _)| bid == id)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| {
                    EvalError::internal(format!("iteration did not bind `{id}` in every round"))
                })?;
            column.push(v);
        }
        let typ = Typ::list(
            column
                .first()
                .map(|v| v.note.typ.clone())
                .unwrap_or_else(|| elem_typ.clone()),
        );
        let value = ctx.make(ValueKind::List(column), typ);
        lifted.push((id.clone(), value));
    }
    Ok(lifted)
}

/// The variables an expression binds when read as a pattern, with their types
pub(crate) fn exp_binders(exp: &Exp) -> Vec<(Id, Typ)> {
    let mut out = Vec::new();
    collect_exp_binders(exp, &mut out);
    out
}

fn collect_exp_binders(exp: &Exp, out: &mut Vec<(Id, Typ)>) {
    match &exp.kind {
        ExpKind::VarE(id) => out.push((id.clone(), exp.typ.clone())),
        ExpKind::TupleE(es) | ExpKind::ListE(es) | ExpKind::CaseE(_, es) => {
            for e in es {
                collect_exp_binders(e, out);
            }
        }
        ExpKind::OptE(Some(e)) => collect_exp_binders(e, out),
        _ => {}
    }
}
