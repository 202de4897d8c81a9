//! Well-formedness checks over a loaded IL tree
//!
//! The elaborator that produced the tree is supposed to guarantee all of
//! this; validation catches corrupted or hand-built trees before they reach
//! the interpreter, where the same defects would surface as internal errors.

use crate::ast::{
    Def, DefTyp, Exp, ExpKind, Guard, Instr, InstrKind, MixOp, Pattern, Phantom, Pid, Spec, Typ,
};
use crate::num::{Num, NumKind, MAX_BITS_WIDTH};
use crate::region::Region;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// A positioned validation failure
#[derive(Debug, Clone, Error)]
#[error("{region}: {msg}")]
pub struct ValidateError {
    pub region: Region,
    pub msg: String,
}

impl ValidateError {
    fn new(region: &Region, msg: impl Into<String>) -> Self {
        Self {
            region: region.clone(),
            msg: msg.into(),
        }
    }
}

/// Check a specification for structural defects
pub fn validate(spec: &Spec) -> Result<(), Vec<ValidateError>> {
    let mut v = Validator::new(spec);
    v.run(spec);
    if v.errors.is_empty() {
        Ok(())
    } else {
        Err(v.errors)
    }
}

struct RelSig<'a> {
    mixop: &'a MixOp,
    input_indices: &'a [usize],
}

struct Validator<'a> {
    types: FxHashMap<&'a str, &'a DefTyp>,
    rels: FxHashMap<&'a str, RelSig<'a>>,
    decs: FxHashMap<&'a str, usize>,
    pids: FxHashSet<Pid>,
    errors: Vec<ValidateError>,
}

impl<'a> Validator<'a> {
    fn new(spec: &'a Spec) -> Self {
        let mut types = FxHashMap::default();
        let mut rels = FxHashMap::default();
        let mut decs = FxHashMap::default();
        let mut errors = Vec::new();

        for def in &spec.defs {
            let name = def.id().name.as_str();
            let dup = match def {
                Def::TypD { deftyp, .. } => types.insert(name, deftyp).is_some(),
                Def::RelD {
                    mixop,
                    input_indices,
                    ..
                } => rels
                    .insert(
                        name,
                        RelSig {
                            mixop,
                            input_indices,
                        },
                    )
                    .is_some(),
                Def::DecD { params, .. } => decs.insert(name, params.len()).is_some(),
            };
            if dup {
                errors.push(ValidateError::new(
                    def.region(),
                    format!("duplicate definition of `{name}`"),
                ));
            }
        }

        Self {
            types,
            rels,
            decs,
            pids: FxHashSet::default(),
            errors,
        }
    }

    fn error(&mut self, region: &Region, msg: impl Into<String>) {
        self.errors.push(ValidateError::new(region, msg));
    }

    fn run(&mut self, spec: &'a Spec) {
        for def in &spec.defs {
            match def {
                Def::TypD { deftyp, region, .. } => self.check_deftyp(deftyp, region),
                Def::RelD {
                    mixop,
                    input_indices,
                    args,
                    body,
                    region,
                    ..
                } => {
                    if mixop.arity() != args.len() {
                        self.error(
                            region,
                            format!(
                                "relation notation {mixop} has {} holes but {} arguments",
                                mixop.arity(),
                                args.len()
                            ),
                        );
                    }
                    let mut seen = FxHashSet::default();
                    for &idx in input_indices.iter() {
                        if idx >= args.len() {
                            self.error(region, format!("input index {idx} out of range"));
                        }
                        if !seen.insert(idx) {
                            self.error(region, format!("duplicate input index {idx}"));
                        }
                    }
                    for arg in args {
                        self.check_exp(arg);
                    }
                    self.check_instrs(body);
                }
                Def::DecD { body, params, .. } => {
                    for param in params {
                        self.check_typ(&param.typ, &param.id.region);
                    }
                    self.check_instrs(body);
                }
            }
        }
    }

    fn check_deftyp(&mut self, deftyp: &DefTyp, region: &Region) {
        match deftyp {
            DefTyp::AliasT(t) => self.check_typ(t, region),
            DefTyp::StructT(fields) => {
                let mut seen = FxHashSet::default();
                for (atom, t) in fields {
                    if !seen.insert(atom.as_str()) {
                        self.error(region, format!("duplicate record field `{atom}`"));
                    }
                    self.check_typ(t, region);
                }
            }
            DefTyp::VariantT(cases) => {
                let mut seen = FxHashSet::default();
                for case in cases {
                    if !seen.insert(&case.mixop) {
                        self.error(region, format!("duplicate constructor {}", case.mixop));
                    }
                    if case.mixop.arity() != case.args.len() {
                        self.error(
                            region,
                            format!(
                                "constructor {} declares {} holes but {} argument types",
                                case.mixop,
                                case.mixop.arity(),
                                case.args.len()
                            ),
                        );
                    }
                    for t in &case.args {
                        self.check_typ(t, region);
                    }
                }
            }
        }
    }

    fn check_typ(&mut self, typ: &Typ, region: &Region) {
        match typ {
            Typ::BoolT | Typ::TextT => {}
            Typ::NumT(NumKind::Bits(w)) => {
                if *w == 0 || *w > MAX_BITS_WIDTH {
                    self.error(region, format!("bit-vector width {w} out of range"));
                }
            }
            Typ::NumT(_) => {}
            Typ::ListT(t) | Typ::OptT(t) | Typ::IterT(t, _) => self.check_typ(t, region),
            Typ::TupleT(ts) => {
                for t in ts {
                    self.check_typ(t, region);
                }
            }
            Typ::VarT(id, targs) => {
                if !self.types.contains_key(id.name.as_str()) {
                    self.error(region, format!("reference to undeclared type `{id}`"));
                }
                for t in targs {
                    self.check_typ(t, region);
                }
            }
        }
    }

    /// The declared arity of a constructor, if its owning type is known
    fn case_arity(&self, typ: &Typ, mixop: &MixOp) -> Option<usize> {
        let Typ::VarT(id, _) = typ else {
            return None;
        };
        match self.types.get(id.name.as_str()) {
            Some(DefTyp::VariantT(cases)) => cases
                .iter()
                .find(|c| &c.mixop == mixop)
                .map(|c| c.args.len()),
            _ => None,
        }
    }

    fn check_exp(&mut self, exp: &Exp) {
        match &exp.kind {
            ExpKind::NumE(num) => self.check_num(num, &exp.region),
            ExpKind::BoolE(_) | ExpKind::TextE(_) | ExpKind::VarE(_) => {}
            ExpKind::FuncE(id) => {
                if !self.decs.contains_key(id.name.as_str()) && !id.name.starts_with('$') {
                    self.error(&exp.region, format!("reference to undeclared function `{id}`"));
                }
            }
            ExpKind::UnE(_, _, e)
            | ExpKind::HeadE(e)
            | ExpKind::TailE(e)
            | ExpKind::LenE(e)
            | ExpKind::DotE(e, _)
            | ExpKind::ProjE(e, _) => self.check_exp(e),
            ExpKind::BinE(_, _, l, r)
            | ExpKind::CmpE(_, _, l, r)
            | ExpKind::MemE(l, r)
            | ExpKind::CatE(l, r) => {
                self.check_exp(l);
                self.check_exp(r);
            }
            ExpKind::TupleE(es) | ExpKind::ListE(es) => {
                for e in es {
                    self.check_exp(e);
                }
            }
            ExpKind::OptE(e) => {
                if let Some(e) = e {
                    self.check_exp(e);
                }
            }
            ExpKind::CaseE(mixop, es) => {
                if let Some(arity) = self.case_arity(&exp.typ, mixop) {
                    if arity != es.len() {
                        self.error(
                            &exp.region,
                            format!(
                                "constructor {mixop} expects {arity} arguments, got {}",
                                es.len()
                            ),
                        );
                    }
                } else if mixop.arity() != es.len() {
                    self.error(
                        &exp.region,
                        format!(
                            "constructor {mixop} has {} holes but {} arguments",
                            mixop.arity(),
                            es.len()
                        ),
                    );
                }
                for e in es {
                    self.check_exp(e);
                }
            }
            ExpKind::StrE(fields) => {
                self.check_struct_fields(&exp.typ, fields.iter().map(|(a, _)| a), &exp.region);
                for (_, e) in fields {
                    self.check_exp(e);
                }
            }
            ExpKind::IterE(e, _, _) => self.check_exp(e),
            ExpKind::CallE(id, args) => {
                self.check_call(id, args.len(), &exp.region);
                for e in args {
                    self.check_exp(e);
                }
            }
            ExpKind::MatchE(scrut, arms) => {
                self.check_exp(scrut);
                for (p, e) in arms {
                    self.check_pattern(p, &exp.region);
                    self.check_exp(e);
                }
            }
        }
    }

    fn check_call(&mut self, id: &crate::ast::Id, argc: usize, region: &Region) {
        if id.name.starts_with('$') {
            return;
        }
        match self.decs.get(id.name.as_str()) {
            None => self.error(region, format!("call to undeclared function `{id}`")),
            Some(&params) if params != argc => self.error(
                region,
                format!("function `{id}` expects {params} arguments, got {argc}"),
            ),
            Some(_) => {}
        }
    }

    fn check_struct_fields<'f>(
        &mut self,
        typ: &Typ,
        atoms: impl Iterator<Item = &'f crate::ast::Atom>,
        region: &Region,
    ) {
        let atoms: Vec<_> = atoms.collect();
        let mut seen = FxHashSet::default();
        for atom in &atoms {
            if !seen.insert(atom.as_str()) {
                self.error(region, format!("duplicate record field `{atom}`"));
            }
        }
        if let Typ::VarT(id, _) = typ {
            let declared: Option<Vec<crate::ast::Atom>> = match self.types.get(id.name.as_str()) {
                Some(DefTyp::StructT(fields)) => {
                    Some(fields.iter().map(|(a, _)| a.clone()).collect())
                }
                _ => None,
            };
            if let Some(declared) = declared {
                for atom in &declared {
                    if !atoms.iter().any(|a| a.as_str() == atom.as_str()) {
                        self.error(region, format!("missing record field `{atom}`"));
                    }
                }
                for atom in &atoms {
                    if !declared.iter().any(|a| a.as_str() == atom.as_str()) {
                        self.error(region, format!("unknown record field `{atom}`"));
                    }
                }
            }
        }
    }

    fn check_num(&mut self, num: &Num, region: &Region) {
        if let Num::Bits { width, .. } = num {
            if *width == 0 || *width > MAX_BITS_WIDTH {
                self.error(region, format!("bit-vector width {width} out of range"));
            }
        }
    }

    fn check_pattern(&mut self, pattern: &Pattern, region: &Region) {
        // binder linearity
        let binders = pattern.binders();
        let mut seen = FxHashSet::default();
        for id in &binders {
            if !seen.insert(id.name.as_str()) {
                self.error(
                    region,
                    format!("binder `{id}` appears more than once in pattern"),
                );
            }
        }
        self.check_pattern_nums(pattern, region);
    }

    fn check_pattern_nums(&mut self, pattern: &Pattern, region: &Region) {
        match pattern {
            Pattern::NumP(num) => self.check_num(num, region),
            Pattern::CaseP(_, ps) | Pattern::TupleP(ps) => {
                for p in ps {
                    self.check_pattern_nums(p, region);
                }
            }
            Pattern::OptP(Some(p)) => self.check_pattern_nums(p, region),
            Pattern::ListP {
                prefix, suffix, ..
            } => {
                for p in prefix.iter().chain(suffix) {
                    self.check_pattern_nums(p, region);
                }
            }
            _ => {}
        }
    }

    fn check_phantom(&mut self, phantom: &Phantom, region: &Region) {
        if !self.pids.insert(phantom.pid) {
            self.error(region, format!("duplicate phantom id {}", phantom.pid));
        }
        for cond in &phantom.conds {
            match cond {
                crate::ast::PathCond::ForallC(e, _)
                | crate::ast::PathCond::ExistsC(e, _)
                | crate::ast::PathCond::PlainC(e) => self.check_exp(e),
            }
        }
    }

    fn check_instrs(&mut self, instrs: &[Instr]) {
        for instr in instrs {
            self.check_instr(instr);
        }
    }

    fn check_instr(&mut self, instr: &Instr) {
        match &instr.kind {
            InstrKind::IfI {
                cond,
                then,
                phantom,
                ..
            } => {
                self.check_exp(cond);
                self.check_instrs(then);
                if let Some(p) = phantom {
                    self.check_phantom(p, &instr.region);
                }
            }
            InstrKind::CaseI {
                scrut,
                cases,
                phantom,
            } => {
                self.check_exp(scrut);
                for (i, case) in cases.iter().enumerate() {
                    match &case.guard {
                        Guard::BoolG(_) => {}
                        Guard::CmpG(_, _, e) | Guard::MemG(e) => self.check_exp(e),
                        Guard::SubG(t) => self.check_typ(t, &instr.region),
                        Guard::MatchG(p) => self.check_pattern(p, &instr.region),
                    }
                    let is_otherwise = matches!(
                        case.body.as_slice(),
                        [Instr {
                            kind: InstrKind::OtherwiseI(_),
                            ..
                        }]
                    );
                    if is_otherwise && i + 1 != cases.len() {
                        self.error(&instr.region, "otherwise arm must be the last case");
                    }
                    self.check_instrs(&case.body);
                }
                if let Some(p) = phantom {
                    self.check_phantom(p, &instr.region);
                }
            }
            InstrKind::OtherwiseI(inner) => self.check_instr(inner),
            InstrKind::LetI { lhs, rhs, .. } => {
                self.check_exp(lhs);
                self.check_exp(rhs);
            }
            InstrKind::RuleI { id, notation, .. } => {
                let sig_mixop = self.rels.get(id.name.as_str()).map(|sig| sig.mixop.clone());
                match sig_mixop {
                    None => {
                        self.error(
                            &instr.region,
                            format!("rule invokes undeclared relation `{id}`"),
                        );
                    }
                    Some(mixop) => {
                        if mixop != notation.mixop {
                            self.error(
                                &instr.region,
                                format!(
                                    "rule notation {} does not match relation `{id}` ({mixop})",
                                    notation.mixop
                                ),
                            );
                        }
                        if notation.args.len() != mixop.arity() {
                            self.error(
                                &instr.region,
                                format!(
                                    "rule notation has {} arguments but {} holes",
                                    notation.args.len(),
                                    mixop.arity()
                                ),
                            );
                        }
                    }
                }
                for e in &notation.args {
                    self.check_exp(e);
                }
            }
            InstrKind::ResultI(es) => {
                for e in es {
                    self.check_exp(e);
                }
            }
            InstrKind::ReturnI(e) => self.check_exp(e),
        }
    }
}
