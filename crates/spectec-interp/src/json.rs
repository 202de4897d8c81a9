//! Machine-readable output: value codec and the run report
//!
//! The driver emits one report per evaluation, designed for the downstream
//! test-generation pipeline: status, result values, the phantom log with
//! rendered context paths, and counters. Consumers must tolerate partial
//! phantom logs; the log survives failed evaluations by design.

use crate::ctx::Ctx;
use crate::error::{EvalError, EvalResult};
use crate::value::{Value, ValueKind};
use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;
use serde::Serialize;
use serde_json::{json, Value as Json};
use spectec_il::{Atom, DefTyp, Num, NumKind, Typ};
use std::time::Duration;

/// Version of the report format
pub const OUTPUT_VERSION: &str = "1.0";

// ============================================================================
// Value codec
// ============================================================================

/// Encode a runtime value as JSON
pub fn value_to_json(value: &Value) -> Json {
    match &value.kind {
        ValueKind::Bool(b) => json!(b),
        ValueKind::Num(n) => num_to_json(n),
        ValueKind::Text(s) => json!(s),
        ValueKind::List(vs) => Json::Array(vs.iter().map(value_to_json).collect()),
        ValueKind::Tuple(vs) => {
            json!({ "tuple": vs.iter().map(value_to_json).collect::<Vec<_>>() })
        }
        ValueKind::Opt(None) => Json::Null,
        ValueKind::Opt(Some(v)) => json!({ "some": value_to_json(v) }),
        ValueKind::Case(mixop, vs) => json!({
            "case": mixop.to_string(),
            "args": vs.iter().map(value_to_json).collect::<Vec<_>>(),
        }),
        ValueKind::Struct(fields) => {
            let mut map = serde_json::Map::new();
            for (atom, v) in fields {
                map.insert(atom.as_str().to_string(), value_to_json(v));
            }
            json!({ "record": map })
        }
        ValueKind::Func(id) => json!({ "func": id.name }),
    }
}

fn num_to_json(num: &Num) -> Json {
    match num {
        Num::Nat(n) => match n.to_u64() {
            Some(small) => json!(small),
            None => json!(n.to_string()),
        },
        Num::Int(n) => match n.to_i64() {
            Some(small) => json!(small),
            None => json!(n.to_string()),
        },
        Num::Bits { width, value } => json!({
            "width": width,
            "value": match value.to_u64() {
                Some(small) => json!(small),
                None => json!(value.to_string()),
            },
        }),
    }
}

/// Decode a JSON value against a declared IL type
///
/// This is the driver's input surface: arguments for an invocation arrive as
/// JSON and are decoded against the parameter or input types the loaded
/// specification declares.
pub fn value_from_json(ctx: &mut Ctx, json: &Json, typ: &Typ) -> EvalResult<Value> {
    let decoded = match typ {
        Typ::BoolT => {
            let b = json
                .as_bool()
                .ok_or_else(|| decode_error("bool", json))?;
            ctx.make(ValueKind::Bool(b), typ.clone())
        }
        Typ::NumT(kind) => {
            let num = num_from_json(json, *kind)?;
            ctx.make(ValueKind::Num(num), typ.clone())
        }
        Typ::TextT => {
            let s = json
                .as_str()
                .ok_or_else(|| decode_error("text", json))?;
            ctx.make(ValueKind::Text(s.to_string()), typ.clone())
        }
        Typ::ListT(elem) => {
            let items = json
                .as_array()
                .ok_or_else(|| decode_error("list", json))?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_from_json(ctx, item, elem)?);
            }
            ctx.make(ValueKind::List(out), typ.clone())
        }
        Typ::TupleT(ts) => {
            let items = json
                .as_array()
                .ok_or_else(|| decode_error("tuple", json))?;
            if items.len() != ts.len() {
                return Err(decode_error("tuple of matching arity", json));
            }
            let mut out = Vec::with_capacity(items.len());
            for (item, t) in items.iter().zip(ts) {
                out.push(value_from_json(ctx, item, t)?);
            }
            ctx.make(ValueKind::Tuple(out), typ.clone())
        }
        Typ::OptT(elem) => {
            if json.is_null() {
                ctx.make(ValueKind::Opt(None), typ.clone())
            } else {
                let inner = json.get("some").unwrap_or(json);
                let v = value_from_json(ctx, inner, elem)?;
                ctx.make(ValueKind::Opt(Some(Box::new(v))), typ.clone())
            }
        }
        Typ::IterT(elem, iter) => {
            let shaped = match iter {
                spectec_il::Iter::List => Typ::ListT(elem.clone()),
                spectec_il::Iter::Opt => Typ::OptT(elem.clone()),
            };
            let v = value_from_json(ctx, json, &shaped)?;
            // keep the declared lifted type on the note
            Value {
                note: crate::value::ValueNote {
                    vid: v.note.vid,
                    typ: typ.clone(),
                },
                ..v
            }
        }
        Typ::VarT(id, _) => {
            let deftyp = ctx
                .env()
                .typ(&id.name)
                .cloned()
                .ok_or_else(|| EvalError::unbound(&id.name))?;
            match deftyp {
                DefTyp::AliasT(t) => value_from_json(ctx, json, &t)?,
                DefTyp::VariantT(cases) => {
                    let tag = json
                        .get("case")
                        .and_then(Json::as_str)
                        .ok_or_else(|| decode_error("constructor object", json))?;
                    let case = cases
                        .iter()
                        .find(|c| c.mixop.to_string() == tag || first_atom(&c.mixop) == Some(tag))
                        .ok_or_else(|| {
                            EvalError::builtin(format!(
                                "`{tag}` is not a constructor of `{id}`"
                            ))
                        })?;
                    let empty = Vec::new();
                    let args = match json.get("args") {
                        Some(Json::Array(items)) => items,
                        None => &empty,
                        Some(other) => return Err(decode_error("argument array", other)),
                    };
                    if args.len() != case.args.len() {
                        return Err(EvalError::builtin(format!(
                            "constructor `{tag}` takes {} arguments, got {}",
                            case.args.len(),
                            args.len()
                        )));
                    }
                    let mut out = Vec::with_capacity(args.len());
                    for (item, t) in args.iter().zip(&case.args) {
                        out.push(value_from_json(ctx, item, t)?);
                    }
                    ctx.make(ValueKind::Case(case.mixop.clone(), out), typ.clone())
                }
                DefTyp::StructT(decl_fields) => {
                    let obj = json
                        .get("record")
                        .unwrap_or(json)
                        .as_object()
                        .ok_or_else(|| decode_error("record object", json))?;
                    let mut out = Vec::with_capacity(decl_fields.len());
                    for (atom, t) in &decl_fields {
                        let field = obj.get(atom.as_str()).ok_or_else(|| {
                            EvalError::builtin(format!("missing record field `{atom}`"))
                        })?;
                        out.push((atom.clone(), value_from_json(ctx, field, t)?));
                    }
                    ctx.make(ValueKind::Struct(out), typ.clone())
                }
            }
        }
    };
    Ok(decoded)
}

fn first_atom(mixop: &spectec_il::MixOp) -> Option<&str> {
    mixop.0.first()?.first().map(Atom::as_str)
}

fn num_from_json(json: &Json, kind: NumKind) -> EvalResult<Num> {
    match kind {
        NumKind::Nat => {
            if let Some(n) = json.as_u64() {
                return Ok(Num::Nat(BigUint::from(n)));
            }
            let s = json.as_str().ok_or_else(|| decode_error("nat", json))?;
            let n: BigUint = s.parse().map_err(|_| decode_error("nat", json))?;
            Ok(Num::Nat(n))
        }
        NumKind::Int => {
            if let Some(n) = json.as_i64() {
                return Ok(Num::Int(BigInt::from(n)));
            }
            let s = json.as_str().ok_or_else(|| decode_error("int", json))?;
            let n: BigInt = s.parse().map_err(|_| decode_error("int", json))?;
            Ok(Num::Int(n))
        }
        NumKind::Bits(width) => {
            let raw = json.get("value").unwrap_or(json);
            if let Some(n) = raw.as_u64() {
                return Ok(Num::bits(width, n));
            }
            let s = raw.as_str().ok_or_else(|| decode_error("bits", json))?;
            let n: BigUint = s.parse().map_err(|_| decode_error("bits", json))?;
            Ok(Num::bits_wrapped(width, n))
        }
    }
}

fn decode_error(expected: &str, got: &Json) -> EvalError {
    EvalError::builtin(format!("cannot decode {got} as {expected}"))
}

// ============================================================================
// Run report
// ============================================================================

/// Complete machine-readable output of one evaluation
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Schema version
    pub version: String,
    /// Tool identifier
    pub tool: String,
    /// The invoked definition
    pub invoked: String,
    /// "ok" or "error"
    pub status: String,
    /// Result values (one per relation output; singleton for functions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Json>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Missed branches, in evaluation order
    pub phantoms: Vec<PhantomInfo>,
    pub statistics: StatisticsInfo,
}

/// The failure an evaluation ended with
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// One missed branch with its context path
#[derive(Debug, Clone, Serialize)]
pub struct PhantomInfo {
    pub pid: u32,
    /// Rendered conjunction of the guards entered up to the decision point
    pub path: Vec<String>,
}

/// Evaluation counters
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsInfo {
    pub values_registered: usize,
    pub relation_calls: u64,
    pub function_calls: u64,
    pub builtin_calls: u64,
    pub phantoms_recorded: usize,
    pub elapsed_ms: u64,
}

impl RunReport {
    fn base(ctx: &Ctx, invoked: &str, elapsed: Duration) -> Self {
        let phantoms = ctx
            .phantoms
            .hits()
            .iter()
            .map(|hit| PhantomInfo {
                pid: hit.pid,
                path: hit.path.iter().map(|entry| entry.to_string()).collect(),
            })
            .collect::<Vec<_>>();
        RunReport {
            version: OUTPUT_VERSION.to_string(),
            tool: "spectec".to_string(),
            invoked: invoked.to_string(),
            status: String::new(),
            result: None,
            error: None,
            phantoms,
            statistics: StatisticsInfo {
                values_registered: ctx.graph.len(),
                relation_calls: ctx.stats.relation_calls,
                function_calls: ctx.stats.function_calls,
                builtin_calls: ctx.stats.builtin_calls,
                phantoms_recorded: ctx.phantoms.len(),
                elapsed_ms: elapsed.as_millis() as u64,
            },
        }
    }

    /// A successful evaluation with its result values
    pub fn ok(ctx: &Ctx, invoked: &str, results: &[Value], elapsed: Duration) -> Self {
        let mut report = Self::base(ctx, invoked, elapsed);
        report.status = "ok".to_string();
        report.result = Some(results.iter().map(value_to_json).collect());
        report
    }

    /// A failed evaluation; the phantom log recorded so far is still emitted
    pub fn error(ctx: &Ctx, invoked: &str, error: &EvalError, elapsed: Duration) -> Self {
        let mut report = Self::base(ctx, invoked, elapsed);
        report.status = "error".to_string();
        report.error = Some(ErrorInfo {
            kind: error.kind().to_string(),
            message: error.to_string(),
            region: error.region().map(|r| r.to_string()),
        });
        report
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
