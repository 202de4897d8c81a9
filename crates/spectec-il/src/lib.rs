//! spectec-il - the SL intermediate language
//!
//! This crate provides:
//! - **The IL tree**: definitions, instructions, expressions, patterns,
//!   guards, phantoms ([`ast`])
//! - **Tagged numbers**: arbitrary-precision naturals, integers and
//!   fixed-width bit-vectors ([`num`])
//! - **Source regions**: line/column regions into SL sources ([`region`])
//! - **Serialization**: the JSON exchange format with loading and emission
//!   ([`load`])
//! - **Validation**: structural well-formedness of loaded trees
//!   ([`validate`])
//!
//! The surface SL parser and elaborator are external; they produce this tree
//! and the interpreter in `spectec-interp` consumes it.

pub mod ast;
pub mod load;
pub mod num;
pub mod print;
pub mod region;
pub mod validate;

pub use ast::{
    Atom, BinOp, Case, CmpOp, Def, DefTyp, Exp, ExpKind, Guard, Id, Instr, InstrKind, Iter,
    IterExp, MixOp, NotExp, OpTyp, Param, PathCond, Pattern, Phantom, Pid, Spec, TypCase, Typ,
    UnOp,
};
pub use load::{emit_spec, load_spec, load_spec_str, LoadError};
pub use num::{Num, NumError, NumKind, MAX_BITS_WIDTH};
pub use region::{Pos, Region};
pub use validate::{validate, ValidateError};
