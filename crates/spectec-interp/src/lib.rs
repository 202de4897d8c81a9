//! spectec-interp - the IL interpreter
//!
//! This crate provides:
//! - **Runtime values**: structurally-compared payloads with stable
//!   identities ([`value`])
//! - **Evaluation context**: scopes, the immutable definition table, the
//!   value graph, the phantom log, resource bounds ([`ctx`])
//! - **Pattern matching**: total structural matching with bindings
//!   ([`matcher`])
//! - **Expression evaluation**: pure expressions, iteration, calls
//!   ([`eval`])
//! - **Instruction interpretation**: `if`/`case`/`let`/`rule` driving
//!   relations and functions ([`interp`])
//! - **Path-condition tracking**: missed branches and value provenance for
//!   downstream test generation ([`track`])
//! - **Builtins** ([`builtins`]) and the **run report** ([`json`])
//!
//! # Quick start
//!
//! ```rust
//! use spectec_il::{Def, Exp, ExpKind, Id, Instr, InstrKind, Num, Region, Spec, Typ};
//! use spectec_interp::{invoke_function, Ctx, SpecEnv};
//! use std::sync::Arc;
//!
//! let spec = Spec {
//!     defs: vec![Def::DecD {
//!         id: Id::dummy("answer"),
//!         tparams: vec![],
//!         params: vec![],
//!         body: vec![Instr::dummy(InstrKind::ReturnI(Exp::dummy(
//!             ExpKind::NumE(Num::nat(42)),
//!             Typ::nat(),
//!         )))],
//!         region: Region::dummy(),
//!     }],
//! };
//! let mut ctx = Ctx::new(Arc::new(SpecEnv::new(&spec)));
//! let v = invoke_function(&mut ctx, "answer", vec![]).unwrap();
//! assert_eq!(v.as_num().unwrap(), &Num::nat(42));
//! ```

pub mod builtins;
pub mod ctx;
pub mod error;
pub mod eval;
pub mod interp;
pub mod json;
pub mod matcher;
pub mod track;
pub mod value;

pub use builtins::call_builtin;
pub use ctx::{Ctx, Func, Rel, SpecEnv, Stats, DEFAULT_MAX_DEPTH};
pub use error::{EvalError, EvalResult};
pub use eval::eval_exp;
pub use interp::{call_func, call_rel, invoke_function, invoke_relation, is_subtype, run_instrs, Outcome};
pub use json::{
    value_from_json, value_to_json, ErrorInfo, PhantomInfo, RunReport, StatisticsInfo,
    OUTPUT_VERSION,
};
pub use matcher::{apply_bindings, exp_to_pattern, match_pattern, Bindings};
pub use track::{PathEntry, PhantomHit, PhantomLog, ValueGraph};
pub use value::{Value, ValueKind, ValueNote, Vid};
