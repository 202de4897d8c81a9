//! Runtime values
//!
//! Values are immutable and compared structurally: the `{vid, typ}` note a
//! value carries is bookkeeping for the dependency tracker, never part of
//! equality or hashing. All construction goes through [`crate::ctx::Ctx`],
//! which assigns the identity and registers the value in the value graph.

use crate::error::{EvalError, EvalResult};
use spectec_il::{Atom, Id, MixOp, Num, Typ};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a registered value; monotonically increasing per evaluation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vid(pub u64);

impl fmt::Display for Vid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bookkeeping attached to every value: its identity and declared IL type
#[derive(Clone, Debug)]
pub struct ValueNote {
    pub vid: Vid,
    pub typ: Typ,
}

/// A runtime value: structurally compared payload plus its note
#[derive(Clone, Debug)]
pub struct Value {
    pub kind: ValueKind,
    pub note: ValueNote,
}

/// The payload of a value
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool(bool),
    Num(Num),
    Text(String),
    /// Ordered finite sequence
    List(Vec<Value>),
    /// Fixed-arity, heterogeneous
    Tuple(Vec<Value>),
    Opt(Option<Box<Value>>),
    /// Constructor application of a variant type
    Case(MixOp, Vec<Value>),
    /// Record with atom-keyed fields, insertion order preserved
    Struct(Vec<(Atom, Value)>),
    /// Reified function reference
    Func(Id),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl Value {
    /// The dynamic tag name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ValueKind::Bool(_) => "bool",
            ValueKind::Num(_) => "num",
            ValueKind::Text(_) => "text",
            ValueKind::List(_) => "list",
            ValueKind::Tuple(_) => "tuple",
            ValueKind::Opt(_) => "option",
            ValueKind::Case(_, _) => "constructor",
            ValueKind::Struct(_) => "record",
            ValueKind::Func(_) => "function",
        }
    }

    pub fn vid(&self) -> Vid {
        self.note.vid
    }

    /// The declared IL type the value was produced at
    pub fn typ(&self) -> &Typ {
        &self.note.typ
    }

    fn mismatch<T>(&self, expected: &'static str) -> EvalResult<T> {
        Err(EvalError::KindMismatch {
            expected,
            actual: self.type_name(),
            region: None,
        })
    }

    pub fn as_bool(&self) -> EvalResult<bool> {
        match &self.kind {
            ValueKind::Bool(b) => Ok(*b),
            _ => self.mismatch("bool"),
        }
    }

    pub fn as_num(&self) -> EvalResult<&Num> {
        match &self.kind {
            ValueKind::Num(n) => Ok(n),
            _ => self.mismatch("num"),
        }
    }

    pub fn as_text(&self) -> EvalResult<&str> {
        match &self.kind {
            ValueKind::Text(s) => Ok(s),
            _ => self.mismatch("text"),
        }
    }

    pub fn as_list(&self) -> EvalResult<&[Value]> {
        match &self.kind {
            ValueKind::List(vs) => Ok(vs),
            _ => self.mismatch("list"),
        }
    }

    pub fn as_tuple(&self) -> EvalResult<&[Value]> {
        match &self.kind {
            ValueKind::Tuple(vs) => Ok(vs),
            _ => self.mismatch("tuple"),
        }
    }

    pub fn as_opt(&self) -> EvalResult<Option<&Value>> {
        match &self.kind {
            ValueKind::Opt(v) => Ok(v.as_deref()),
            _ => self.mismatch("option"),
        }
    }

    /// The arguments of a constructor value, checked against the expected
    /// mixfix operator
    pub fn as_case(&self, expected: &MixOp) -> EvalResult<&[Value]> {
        match &self.kind {
            ValueKind::Case(mixop, vs) if mixop == expected => Ok(vs),
            ValueKind::Case(_, _) => self.mismatch("matching constructor"),
            _ => self.mismatch("constructor"),
        }
    }

    /// A record field, by atom
    pub fn as_struct(&self, field: &Atom) -> EvalResult<&Value> {
        match &self.kind {
            ValueKind::Struct(fields) => fields
                .iter()
                .find(|(a, _)| a == field)
                .map(|(_, v)| v)
                .ok_or_else(|| EvalError::KindMismatch {
                    expected: "record field",
                    actual: "record without it",
                    region: None,
                }),
            _ => self.mismatch("record"),
        }
    }

    pub fn as_func(&self) -> EvalResult<&Id> {
        match &self.kind {
            ValueKind::Func(id) => Ok(id),
            _ => self.mismatch("function"),
        }
    }

    /// All vids reachable from this value, this value's own first
    pub fn reachable_vids(&self) -> Vec<Vid> {
        let mut out = Vec::new();
        self.collect_vids(&mut out);
        out
    }

    fn collect_vids(&self, out: &mut Vec<Vid>) {
        out.push(self.note.vid);
        match &self.kind {
            ValueKind::Bool(_)
            | ValueKind::Num(_)
            | ValueKind::Text(_)
            | ValueKind::Func(_) => {}
            ValueKind::List(vs) | ValueKind::Tuple(vs) | ValueKind::Case(_, vs) => {
                for v in vs {
                    v.collect_vids(out);
                }
            }
            ValueKind::Opt(v) => {
                if let Some(v) = v {
                    v.collect_vids(out);
                }
            }
            ValueKind::Struct(fields) => {
                for (_, v) in fields {
                    v.collect_vids(out);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, vs: &[Value]) -> fmt::Result {
            for (i, v) in vs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v}")?;
            }
            Ok(())
        }
        match &self.kind {
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Num(n) => write!(f, "{n}"),
            ValueKind::Text(s) => write!(f, "{s:?}"),
            ValueKind::List(vs) => {
                write!(f, "[")?;
                list(f, vs)?;
                write!(f, "]")
            }
            ValueKind::Tuple(vs) => {
                write!(f, "(")?;
                list(f, vs)?;
                write!(f, ")")
            }
            ValueKind::Opt(None) => write!(f, "?()"),
            ValueKind::Opt(Some(v)) => write!(f, "?({v})"),
            ValueKind::Case(mixop, vs) => {
                write!(f, "{mixop}(")?;
                list(f, vs)?;
                write!(f, ")")
            }
            ValueKind::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (atom, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{atom} {v}")?;
                }
                write!(f, "}}")
            }
            ValueKind::Func(id) => write!(f, "func {id}"),
        }
    }
}
