//! Evaluation context: scopes, globals, tracking, resource bounds
//!
//! A context is exclusively owned by one evaluation. The global definition
//! table is immutable after load and shared; everything else (scopes, value
//! graph, phantom log, depth, deadline) belongs to this evaluation alone.

use crate::error::{EvalError, EvalResult};
use crate::track::{PathEntry, PhantomLog, ValueGraph};
use crate::value::{Value, ValueKind, ValueNote, Vid};
use rustc_hash::FxHashMap;
use spectec_il::{Def, DefTyp, Exp, Id, Instr, MixOp, Param, Phantom, Region, Spec, Typ};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default recursion bound; the driver can override it
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// An inductive relation, as loaded
#[derive(Debug, Clone)]
pub struct Rel {
    pub id: Id,
    pub mixop: MixOp,
    pub input_indices: Vec<usize>,
    pub args: Vec<Exp>,
    pub body: Vec<Instr>,
    pub region: Region,
}

impl Rel {
    /// Argument positions not named as inputs, in order
    pub fn output_indices(&self) -> Vec<usize> {
        (0..self.args.len())
            .filter(|i| !self.input_indices.contains(i))
            .collect()
    }
}

/// A deterministic function, as loaded
#[derive(Debug, Clone)]
pub struct Func {
    pub id: Id,
    pub params: Vec<Param>,
    pub body: Vec<Instr>,
    pub region: Region,
}

/// The immutable global definition table
#[derive(Debug, Default)]
pub struct SpecEnv {
    types: FxHashMap<String, DefTyp>,
    rels: FxHashMap<String, Rel>,
    funcs: FxHashMap<String, Func>,
}

impl SpecEnv {
    pub fn new(spec: &Spec) -> Self {
        let mut env = SpecEnv::default();
        for def in &spec.defs {
            match def {
                Def::TypD { id, deftyp, .. } => {
                    env.types.insert(id.name.clone(), deftyp.clone());
                }
                Def::RelD {
                    id,
                    mixop,
                    input_indices,
                    args,
                    body,
                    region,
                } => {
                    env.rels.insert(
                        id.name.clone(),
                        Rel {
                            id: id.clone(),
                            mixop: mixop.clone(),
                            input_indices: input_indices.clone(),
                            args: args.clone(),
                            body: body.clone(),
                            region: region.clone(),
                        },
                    );
                }
                Def::DecD {
                    id,
                    params,
                    body,
                    region,
                    ..
                } => {
                    env.funcs.insert(
                        id.name.clone(),
                        Func {
                            id: id.clone(),
                            params: params.clone(),
                            body: body.clone(),
                            region: region.clone(),
                        },
                    );
                }
            }
        }
        env
    }

    pub fn typ(&self, name: &str) -> Option<&DefTyp> {
        self.types.get(name)
    }

    pub fn rel(&self, name: &str) -> Option<&Rel> {
        self.rels.get(name)
    }

    pub fn func(&self, name: &str) -> Option<&Func> {
        self.funcs.get(name)
    }
}

/// One lexical scope frame; a barrier frame hides everything beneath it
/// (function and relation bodies see only their own bindings)
#[derive(Debug, Default)]
struct Frame {
    vars: FxHashMap<String, (Typ, Value)>,
    barrier: bool,
}

/// Counters reported in the run report
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub relation_calls: u64,
    pub function_calls: u64,
    pub builtin_calls: u64,
}

/// The per-evaluation context
pub struct Ctx {
    env: Arc<SpecEnv>,
    frames: Vec<Frame>,
    pub graph: ValueGraph,
    pub phantoms: PhantomLog,
    guard_path: Vec<PathEntry>,
    depth: usize,
    max_depth: usize,
    deadline: Option<Instant>,
    pub stats: Stats,
}

impl Ctx {
    pub fn new(env: Arc<SpecEnv>) -> Self {
        Self {
            env,
            frames: vec![Frame {
                vars: FxHashMap::default(),
                barrier: true,
            }],
            graph: ValueGraph::new(),
            phantoms: PhantomLog::new(),
            guard_path: Vec::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            deadline: None,
            stats: Stats::default(),
        }
    }

    pub fn env(&self) -> &SpecEnv {
        &self.env
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// Install a cooperative deadline, checked at branch granularity
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    // ------------------------------------------------------------------
    // Value factory
    // ------------------------------------------------------------------

    /// The single constructor for runtime values: assigns the identity and
    /// registers the value in the value graph
    pub fn make(&mut self, kind: ValueKind, typ: Typ) -> Value {
        let vid = self.graph.next_vid();
        let value = Value {
            kind,
            note: ValueNote { vid, typ },
        };
        self.graph.register(value.clone());
        value
    }

    /// Construct a value and link it to the vids read to produce it
    pub fn make_with_deps(
        &mut self,
        kind: ValueKind,
        typ: Typ,
        reads: impl IntoIterator<Item = Vid>,
    ) -> Value {
        let value = self.make(kind, typ);
        self.graph.add_deps(value.note.vid, reads);
        value
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    pub fn bind(&mut self, id: &Id, typ: Typ, value: Value) {
        let frame = self
            .frames
            .last_mut()
            .expect("context always has a root frame");
        frame.vars.insert(id.name.clone(), (typ, value));
    }

    pub fn lookup(&self, id: &Id) -> EvalResult<Value> {
        self.lookup_typed(id).map(|(_, v)| v)
    }

    pub fn lookup_typed(&self, id: &Id) -> EvalResult<(Typ, Value)> {
        for frame in self.frames.iter().rev() {
            if let Some((typ, value)) = frame.vars.get(&id.name) {
                return Ok((typ.clone(), value.clone()));
            }
            if frame.barrier {
                break;
            }
        }
        Err(EvalError::unbound(&id.name).with_region(&id.region))
    }

    /// Run `f` in a fresh scope; the scope is released on all exit paths
    pub fn in_scope<R>(&mut self, f: impl FnOnce(&mut Ctx) -> EvalResult<R>) -> EvalResult<R> {
        self.frames.push(Frame::default());
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Run `f` in a fresh barrier scope that hides the caller's bindings
    pub fn in_call_scope<R>(&mut self, f: impl FnOnce(&mut Ctx) -> EvalResult<R>) -> EvalResult<R> {
        self.frames.push(Frame {
            vars: FxHashMap::default(),
            barrier: true,
        });
        let result = f(self);
        self.frames.pop();
        result
    }

    pub fn scope_depth(&self) -> usize {
        self.frames.len()
    }

    // ------------------------------------------------------------------
    // Resource bounds
    // ------------------------------------------------------------------

    /// Run `f` one recursion level deeper, enforcing the bound
    pub fn with_depth<R>(
        &mut self,
        region: &Region,
        f: impl FnOnce(&mut Ctx) -> EvalResult<R>,
    ) -> EvalResult<R> {
        if self.depth >= self.max_depth {
            return Err(EvalError::StackOverflow {
                depth: self.max_depth,
                region: Some(region.clone()),
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    pub fn check_deadline(&self, region: &Region) -> EvalResult<()> {
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                return Err(EvalError::Deadline {
                    region: Some(region.clone()),
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Guard path and phantoms
    // ------------------------------------------------------------------

    /// Run `f` with an additional conjunct on the context path
    pub fn in_guard<R>(
        &mut self,
        entry: PathEntry,
        f: impl FnOnce(&mut Ctx) -> EvalResult<R>,
    ) -> EvalResult<R> {
        self.guard_path.push(entry);
        let result = f(self);
        self.guard_path.pop();
        result
    }

    /// Log a missed branch together with the current context path
    pub fn record_phantom(&mut self, phantom: &Phantom) {
        debug!(pid = phantom.pid, depth = self.guard_path.len(), "phantom missed");
        self.phantoms.record(phantom.pid, self.guard_path.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectec_il::Num;

    fn ctx() -> Ctx {
        Ctx::new(Arc::new(SpecEnv::default()))
    }

    #[test]
    fn factory_assigns_increasing_vids() {
        let mut ctx = ctx();
        let a = ctx.make(ValueKind::Num(Num::nat(1)), Typ::nat());
        let b = ctx.make(ValueKind::Num(Num::nat(2)), Typ::nat());
        assert!(a.vid() < b.vid());
        assert_eq!(ctx.graph.get(a.vid()).unwrap(), &a);
    }

    #[test]
    fn scope_released_on_error() {
        let mut ctx = ctx();
        let depth = ctx.scope_depth();
        let result: EvalResult<()> = ctx.in_scope(|ctx| {
            let v = ctx.make(ValueKind::Bool(true), Typ::BoolT);
            ctx.bind(&Id::dummy("x"), Typ::BoolT, v);
            Err(EvalError::internal("boom"))
        });
        assert!(result.is_err());
        assert_eq!(ctx.scope_depth(), depth);
        assert!(ctx.lookup(&Id::dummy("x")).is_err());
    }

    #[test]
    fn barrier_hides_outer_bindings() {
        let mut ctx = ctx();
        let v = ctx.make(ValueKind::Bool(true), Typ::BoolT);
        ctx.bind(&Id::dummy("outer"), Typ::BoolT, v);
        ctx.in_call_scope(|ctx| {
            assert!(ctx.lookup(&Id::dummy("outer")).is_err());
            Ok(())
        })
        .unwrap();
        // plain scopes keep visibility
        ctx.in_scope(|ctx| {
            assert!(ctx.lookup(&Id::dummy("outer")).is_ok());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn depth_bound_reports_stack_overflow() {
        let mut ctx = ctx();
        ctx.set_max_depth(0);
        let err = ctx
            .with_depth(&Region::dummy(), |_| Ok(()))
            .unwrap_err();
        assert_eq!(err.kind(), "StackOverflow");
    }
}
