//! Instruction interpretation
//!
//! An instruction list runs in order; each instruction extends the scope,
//! records results, or terminates the list. Relations and functions both
//! execute through here: a relation succeeds when a `ResultI` fires and has
//! failed when its body falls through, a function must reach a `ReturnI`.

use crate::ctx::{Ctx, Rel};
use crate::error::{EvalError, EvalResult};
use crate::eval::{
    bind_for_iterations, compare_values, eval_exp, exp_binders, holds_for_iterations,
};
use crate::matcher::{apply_bindings, exp_to_pattern, match_pattern, Bindings};
use crate::track::PathEntry;
use crate::value::{Value, ValueKind};
use spectec_il::{DefTyp, Guard, Id, Instr, InstrKind, NotExp, Region, Typ};
use tracing::{debug, trace};

/// How an instruction list ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A `ResultI` or `ReturnI` fired with these values
    Completed(Vec<Value>),
    /// No terminating instruction fired; for a relation this is rule failure
    Fallthrough,
}

/// Execute an instruction list in order
pub fn run_instrs(ctx: &mut Ctx, instrs: &[Instr]) -> EvalResult<Outcome> {
    for instr in instrs {
        if let Some(values) = run_instr(ctx, instr)? {
            return Ok(Outcome::Completed(values));
        }
    }
    Ok(Outcome::Fallthrough)
}

/// Execute one instruction; `Some` means the enclosing list terminates
fn run_instr(ctx: &mut Ctx, instr: &Instr) -> EvalResult<Option<Vec<Value>>> {
    match &instr.kind {
        InstrKind::IfI {
            cond,
            iters,
            then,
            phantom,
        } => {
            ctx.check_deadline(&instr.region)?;
            let holds = holds_for_iterations(ctx, iters, &instr.region, &mut |ctx| {
                let v = eval_exp(ctx, cond)?;
                v.as_bool().map_err(|e| e.with_region(&cond.region))
            })?;
            if holds {
                let entry = PathEntry::Cond {
                    exp: cond.clone(),
                    iters: iters.clone(),
                };
                let outcome =
                    ctx.in_guard(entry, |ctx| ctx.in_scope(|ctx| run_instrs(ctx, then)))?;
                match outcome {
                    Outcome::Completed(values) => Ok(Some(values)),
                    Outcome::Fallthrough => Ok(None),
                }
            } else {
                if let Some(phantom) = phantom {
                    ctx.record_phantom(phantom);
                }
                Ok(None)
            }
        }

        InstrKind::CaseI {
            scrut,
            cases,
            phantom,
        } => {
            ctx.check_deadline(&instr.region)?;
            let scrut_value = eval_exp(ctx, scrut)?;
            for case in cases {
                // a trailing otherwise arm runs whenever nothing earlier did
                if let [Instr {
                    kind: InstrKind::OtherwiseI(inner),
                    ..
                }] = case.body.as_slice()
                {
                    let outcome = ctx.in_scope(|ctx| {
                        match run_instr(ctx, inner)? {
                            Some(values) => Ok(Outcome::Completed(values)),
                            None => Ok(Outcome::Fallthrough),
                        }
                    })?;
                    return match outcome {
                        Outcome::Completed(values) => Ok(Some(values)),
                        Outcome::Fallthrough => Ok(None),
                    };
                }
                let Some(bindings) = eval_guard(ctx, &scrut_value, &case.guard)
                    .map_err(|e| e.with_region(&instr.region))?
                else {
                    continue;
                };
                let entry = PathEntry::Guard {
                    scrut: scrut.clone(),
                    guard: case.guard.clone(),
                };
                let outcome = ctx.in_guard(entry, |ctx| {
                    ctx.in_scope(|ctx| {
                        apply_bindings(ctx, bindings);
                        run_instrs(ctx, &case.body)
                    })
                })?;
                return match outcome {
                    Outcome::Completed(values) => Ok(Some(values)),
                    Outcome::Fallthrough => Ok(None),
                };
            }
            // no case matched: the unentered branch is the phantom
            if let Some(phantom) = phantom {
                ctx.record_phantom(phantom);
            }
            Ok(None)
        }

        InstrKind::OtherwiseI(_) => Err(EvalError::internal(
            "otherwise arm outside a case analysis",
        )
        .with_region(&instr.region)),

        InstrKind::LetI { lhs, rhs, iters } => {
            let expected = exp_binders(lhs);
            let bindings = bind_for_iterations(
                ctx,
                iters,
                &instr.region,
                &expected,
                &mut |ctx| {
                    let value = eval_exp(ctx, rhs)?;
                    let pattern = exp_to_pattern(lhs)?;
                    match_pattern(ctx, &pattern, &value)?.ok_or(EvalError::LetMismatch {
                        region: Some(instr.region.clone()),
                    })
                },
            )?;
            apply_bindings(ctx, bindings);
            Ok(None)
        }

        InstrKind::RuleI {
            id,
            notation,
            iters,
        } => {
            ctx.check_deadline(&instr.region)?;
            let rel = ctx
                .env()
                .rel(&id.name)
                .cloned()
                .ok_or_else(|| EvalError::unbound(&id.name).with_region(&instr.region))?;
            let expected: Vec<_> = rel
                .output_indices()
                .into_iter()
                .flat_map(|i| exp_binders(&notation.args[i]))
                .collect();
            let bindings = bind_for_iterations(
                ctx,
                iters,
                &instr.region,
                &expected,
                &mut |ctx| invoke_rule(ctx, &rel, notation, &instr.region),
            )?;
            apply_bindings(ctx, bindings);
            Ok(None)
        }

        InstrKind::ResultI(exps) => {
            let mut values = Vec::with_capacity(exps.len());
            for exp in exps {
                values.push(eval_exp(ctx, exp)?);
            }
            Ok(Some(values))
        }

        InstrKind::ReturnI(exp) => {
            let value = eval_exp(ctx, exp)?;
            Ok(Some(vec![value]))
        }
    }
}

// ============================================================================
// Guards
// ============================================================================

/// Evaluate a case guard against the scrutinee; `Some` carries the bindings
/// the guard introduces into the case body
fn eval_guard(ctx: &mut Ctx, scrut: &Value, guard: &Guard) -> EvalResult<Option<Bindings>> {
    match guard {
        Guard::BoolG(expected) => {
            let b = scrut.as_bool()?;
            Ok((b == *expected).then(Bindings::new))
        }
        Guard::CmpG(op, optyp, exp) => {
            let other = eval_exp(ctx, exp)?;
            Ok(compare_values(*op, *optyp, scrut, &other)?.then(Bindings::new))
        }
        Guard::SubG(typ) => Ok(is_subtype(ctx, scrut, typ)?.then(Bindings::new)),
        Guard::MatchG(pattern) => match_pattern(ctx, pattern, scrut),
        Guard::MemG(exp) => {
            let list = eval_exp(ctx, exp)?;
            let found = list.as_list()?.contains(scrut);
            Ok(found.then(Bindings::new))
        }
    }
}

/// Whether a value's dynamic shape inhabits a type: nominal for variant
/// constructors, structural for records and containers
pub fn is_subtype(ctx: &Ctx, value: &Value, typ: &Typ) -> EvalResult<bool> {
    match typ {
        Typ::BoolT => Ok(matches!(value.kind, ValueKind::Bool(_))),
        Typ::TextT => Ok(matches!(value.kind, ValueKind::Text(_))),
        Typ::NumT(kind) => Ok(match &value.kind {
            ValueKind::Num(n) => n.kind() == *kind,
            _ => false,
        }),
        Typ::ListT(elem) => match &value.kind {
            ValueKind::List(vs) => all_subtype(ctx, vs, elem),
            _ => Ok(false),
        },
        Typ::TupleT(ts) => match &value.kind {
            ValueKind::Tuple(vs) if vs.len() == ts.len() => {
                for (v, t) in vs.iter().zip(ts) {
                    if !is_subtype(ctx, v, t)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        },
        Typ::OptT(elem) => match &value.kind {
            ValueKind::Opt(None) => Ok(true),
            ValueKind::Opt(Some(v)) => is_subtype(ctx, v, elem),
            _ => Ok(false),
        },
        Typ::IterT(elem, iter) => match iter {
            spectec_il::Iter::List => is_subtype(ctx, value, &Typ::ListT(elem.clone())),
            spectec_il::Iter::Opt => is_subtype(ctx, value, &Typ::OptT(elem.clone())),
        },
        Typ::VarT(id, _) => {
            let deftyp = ctx.env().typ(&id.name).ok_or_else(|| {
                EvalError::internal(format!("subtype test against undeclared type `{id}`"))
            })?;
            match deftyp {
                DefTyp::AliasT(t) => is_subtype(ctx, value, t),
                DefTyp::VariantT(cases) => Ok(match &value.kind {
                    ValueKind::Case(mixop, _) => cases.iter().any(|c| &c.mixop == mixop),
                    _ => false,
                }),
                DefTyp::StructT(fields) => match &value.kind {
                    ValueKind::Struct(actual) => {
                        for (atom, t) in fields {
                            let Some((_, v)) = actual.iter().find(|(a, _)| a == atom) else {
                                return Ok(false);
                            };
                            if !is_subtype(ctx, v, t)? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    _ => Ok(false),
                },
            }
        }
    }
}

fn all_subtype(ctx: &Ctx, values: &[Value], typ: &Typ) -> EvalResult<bool> {
    for v in values {
        if !is_subtype(ctx, v, typ)? {
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// Relations
// ============================================================================

/// One rule invocation: evaluate the input positions, run the relation,
/// pattern-bind the outputs back into the caller's notation
fn invoke_rule(
    ctx: &mut Ctx,
    rel: &Rel,
    notation: &NotExp,
    region: &Region,
) -> EvalResult<Bindings> {
    let mut inputs = Vec::with_capacity(rel.input_indices.len());
    for &idx in &rel.input_indices {
        let arg = notation.args.get(idx).ok_or_else(|| {
            EvalError::internal(format!("input index {idx} out of range in rule notation"))
        })?;
        inputs.push(eval_exp(ctx, arg)?);
    }

    let outputs = call_rel(ctx, rel, inputs, region)?;

    let output_indices = rel.output_indices();
    if outputs.len() != output_indices.len() {
        return Err(EvalError::internal(format!(
            "relation `{}` produced {} outputs for {} output positions",
            rel.id,
            outputs.len(),
            output_indices.len()
        ))
        .with_region(region));
    }

    let mut bindings = Bindings::new();
    for (idx, output) in output_indices.into_iter().zip(outputs) {
        let arg = &notation.args[idx];
        let pattern = exp_to_pattern(arg)?;
        match match_pattern(ctx, &pattern, &output)? {
            Some(bs) => bindings.extend(bs),
            None => {
                return Err(EvalError::LetMismatch {
                    region: Some(arg.region.clone()),
                })
            }
        }
    }
    Ok(bindings)
}

/// Run a relation on caller-supplied input values, producing its outputs
///
/// The body executes in a fresh scope that sees only the bindings made by
/// matching the input positions. Outputs are linked to the inputs in the
/// value graph.
pub fn call_rel(
    ctx: &mut Ctx,
    rel: &Rel,
    inputs: Vec<Value>,
    region: &Region,
) -> EvalResult<Vec<Value>> {
    ctx.stats.relation_calls += 1;
    debug!(relation = %rel.id, inputs = inputs.len(), "relation entry");
    let input_vids: Vec<_> = inputs.iter().map(|v| v.vid()).collect();

    let outcome = ctx.with_depth(region, |ctx| {
        ctx.in_call_scope(|ctx| {
            for (&idx, value) in rel.input_indices.iter().zip(&inputs) {
                let pattern = exp_to_pattern(&rel.args[idx])?;
                match match_pattern(ctx, &pattern, value)? {
                    Some(bindings) => apply_bindings(ctx, bindings),
                    // the rule's input shape does not cover this value
                    None => {
                        trace!(relation = %rel.id, "input pattern rejected value");
                        return Ok(Outcome::Fallthrough);
                    }
                }
            }
            run_instrs(ctx, &rel.body)
        })
    })?;

    match outcome {
        Outcome::Completed(outputs) => {
            debug!(relation = %rel.id, outputs = outputs.len(), "relation exit");
            for output in &outputs {
                ctx.graph
                    .add_deps(output.vid(), input_vids.iter().copied());
            }
            Ok(outputs)
        }
        Outcome::Fallthrough => Err(EvalError::RelFailed {
            relid: rel.id.name.clone(),
            region: Some(region.clone()),
        }),
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Call a deterministic function with already-evaluated arguments
pub fn call_func(ctx: &mut Ctx, id: &Id, args: Vec<Value>, region: &Region) -> EvalResult<Value> {
    let func = ctx
        .env()
        .func(&id.name)
        .cloned()
        .ok_or_else(|| EvalError::unbound(&id.name).with_region(&id.region))?;
    if func.params.len() != args.len() {
        return Err(EvalError::internal(format!(
            "function `{id}` expects {} arguments, got {}",
            func.params.len(),
            args.len()
        ))
        .with_region(region));
    }
    ctx.stats.function_calls += 1;

    let outcome = ctx.with_depth(region, |ctx| {
        ctx.in_call_scope(|ctx| {
            for (param, value) in func.params.iter().zip(args) {
                ctx.bind(&param.id, param.typ.clone(), value);
            }
            run_instrs(ctx, &func.body)
        })
    })?;

    match outcome {
        Outcome::Completed(mut values) if values.len() == 1 => {
            Ok(values.pop().expect("length checked"))
        }
        Outcome::Completed(values) => Err(EvalError::internal(format!(
            "function `{id}` returned {} values",
            values.len()
        ))
        .with_region(region)),
        Outcome::Fallthrough => Err(EvalError::internal(format!(
            "function `{id}` fell through without returning"
        ))
        .with_region(region)),
    }
}

// ============================================================================
// Driver entry points
// ============================================================================

/// Invoke a function by name (driver surface)
pub fn invoke_function(ctx: &mut Ctx, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    call_func(ctx, &Id::dummy(name), args, &Region::dummy())
}

/// Invoke a relation by name on input-position values (driver surface)
pub fn invoke_relation(ctx: &mut Ctx, name: &str, inputs: Vec<Value>) -> EvalResult<Vec<Value>> {
    let rel = ctx
        .env()
        .rel(name)
        .cloned()
        .ok_or_else(|| EvalError::unbound(name))?;
    if rel.input_indices.len() != inputs.len() {
        return Err(EvalError::internal(format!(
            "relation `{name}` takes {} inputs, got {}",
            rel.input_indices.len(),
            inputs.len()
        )));
    }
    call_rel(ctx, &rel, inputs, &Region::dummy())
}
