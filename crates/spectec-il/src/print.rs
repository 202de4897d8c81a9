//! Compact rendering of IL fragments for diagnostics and the phantom log
//!
//! This is not a pretty-printer for round-tripping; the serialized tree is
//! the exchange format. Rendering exists so a logged path condition or a
//! failed guard reads like the SL notation it came from.

use crate::ast::{Case, Exp, ExpKind, Guard, Instr, InstrKind, IterExp, PathCond, Pattern};
use std::fmt;

fn comma<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn iters_suffix(f: &mut fmt::Formatter<'_>, iters: &[IterExp]) -> fmt::Result {
    for it in iters {
        write!(f, "{}", it)?;
    }
    Ok(())
}

impl fmt::Display for IterExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.iter)?;
        comma(f, &self.vars)?;
        write!(f, "}}")
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for ExpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpKind::BoolE(b) => write!(f, "{b}"),
            ExpKind::NumE(n) => write!(f, "{n}"),
            ExpKind::TextE(s) => write!(f, "{s:?}"),
            ExpKind::VarE(id) => write!(f, "{id}"),
            ExpKind::FuncE(id) => write!(f, "${id}"),
            ExpKind::UnE(op, _, e) => write!(f, "{op}{e}"),
            ExpKind::BinE(op, _, l, r) => write!(f, "({l} {op} {r})"),
            ExpKind::CmpE(op, _, l, r) => write!(f, "({l} {op} {r})"),
            ExpKind::TupleE(es) => {
                write!(f, "(")?;
                comma(f, es)?;
                write!(f, ")")
            }
            ExpKind::ListE(es) => {
                write!(f, "[")?;
                comma(f, es)?;
                write!(f, "]")
            }
            ExpKind::OptE(None) => write!(f, "?()"),
            ExpKind::OptE(Some(e)) => write!(f, "?({e})"),
            ExpKind::CaseE(mixop, es) => {
                write!(f, "{mixop}(")?;
                comma(f, es)?;
                write!(f, ")")
            }
            ExpKind::StrE(fields) => {
                write!(f, "{{")?;
                for (i, (atom, e)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{atom} {e}")?;
                }
                write!(f, "}}")
            }
            ExpKind::DotE(e, atom) => write!(f, "{e}.{atom}"),
            ExpKind::ProjE(e, i) => write!(f, "{e}.{i}"),
            ExpKind::HeadE(e) => write!(f, "hd({e})"),
            ExpKind::TailE(e) => write!(f, "tl({e})"),
            ExpKind::LenE(e) => write!(f, "|{e}|"),
            ExpKind::MemE(e, list) => write!(f, "({e} <- {list})"),
            ExpKind::CatE(l, r) => write!(f, "({l} ++ {r})"),
            ExpKind::IterE(e, iter, vars) => {
                write!(f, "({e}){iter}{{")?;
                comma(f, vars)?;
                write!(f, "}}")
            }
            ExpKind::CallE(id, args) => {
                write!(f, "{id}(")?;
                comma(f, args)?;
                write!(f, ")")
            }
            ExpKind::MatchE(scrut, arms) => {
                write!(f, "case {scrut} {{")?;
                for (i, (p, e)) in arms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{p} -> {e}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::WildP => write!(f, "_"),
            Pattern::VarP(id) => write!(f, "{id}"),
            Pattern::BoolP(b) => write!(f, "{b}"),
            Pattern::NumP(n) => write!(f, "{n}"),
            Pattern::TextP(s) => write!(f, "{s:?}"),
            Pattern::CaseP(mixop, ps) => {
                write!(f, "{mixop}(")?;
                comma(f, ps)?;
                write!(f, ")")
            }
            Pattern::TupleP(ps) => {
                write!(f, "(")?;
                comma(f, ps)?;
                write!(f, ")")
            }
            Pattern::OptP(None) => write!(f, "?()"),
            Pattern::OptP(Some(p)) => write!(f, "?({p})"),
            Pattern::ListP {
                prefix,
                rest,
                suffix,
            } => {
                write!(f, "[")?;
                comma(f, prefix)?;
                if let Some(id) = rest {
                    if !prefix.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "{id}*")?;
                }
                if !suffix.is_empty() {
                    write!(f, ", ")?;
                    comma(f, suffix)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::BoolG(b) => write!(f, "is {b}"),
            Guard::CmpG(op, _, e) => write!(f, "{op} {e}"),
            Guard::SubG(t) => write!(f, "<: {t}"),
            Guard::MatchG(p) => write!(f, "matches {p}"),
            Guard::MemG(e) => write!(f, "in {e}"),
        }
    }
}

impl fmt::Display for PathCond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathCond::ForallC(e, iters) => {
                write!(f, "forall {e}")?;
                iters_suffix(f, iters)
            }
            PathCond::ExistsC(e, iters) => {
                write!(f, "exists {e}")?;
                iters_suffix(f, iters)
            }
            PathCond::PlainC(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for InstrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrKind::IfI { cond, iters, .. } => {
                write!(f, "if {cond}")?;
                iters_suffix(f, iters)
            }
            InstrKind::CaseI { scrut, cases, .. } => {
                write!(f, "case {scrut} ({} cases)", cases.len())
            }
            InstrKind::OtherwiseI(inner) => write!(f, "otherwise {inner}"),
            InstrKind::LetI { lhs, rhs, iters } => {
                write!(f, "let {lhs} = {rhs}")?;
                iters_suffix(f, iters)
            }
            InstrKind::RuleI { id, notation, .. } => {
                write!(f, "rule {id}{}(", notation.mixop)?;
                comma(f, &notation.args)?;
                write!(f, ")")
            }
            InstrKind::ResultI(es) => {
                write!(f, "result ")?;
                comma(f, es)
            }
            InstrKind::ReturnI(e) => write!(f, "return {e}"),
        }
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ...", self.guard)
    }
}
