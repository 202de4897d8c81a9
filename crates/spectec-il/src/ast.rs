//! Abstract syntax of the SL intermediate language
//!
//! This is the elaborated form the engine consumes: the surface SL parser and
//! elaborator live elsewhere and exchange this tree in its serialized form.
//! The tree is designed to be:
//! - Complete: every construct the interpreter and the phantom tracker need
//! - Region-aware: every node points back into the SL sources
//! - Immutable: definitions never change after loading

use crate::num::{Num, NumKind};
use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

// ============================================================================
// Names
// ============================================================================

/// An identifier with the region it was written at
///
/// Equality, ordering and hashing are by name only; the region is diagnostic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Id {
    pub name: String,
    pub region: Region,
}

impl Id {
    pub fn new(name: impl Into<String>, region: Region) -> Self {
        Self {
            name: name.into(),
            region,
        }
    }

    /// An identifier with a dummy region, for generated nodes
    pub fn dummy(name: impl Into<String>) -> Self {
        Self::new(name, Region::dummy())
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A textual atom: a mixfix token or a record field key
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom(pub String);

impl Atom {
    pub fn new(text: impl Into<String>) -> Self {
        Atom(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mixfix operator: token phrases interleaved with argument holes
///
/// `n` phrases bracket `n - 1` holes, so `|- _ : _` is
/// `[["|-"], [":"], []]`. The operator identifies a constructor of a variant
/// type; two constructors are the same iff their phrases are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MixOp(pub Vec<Vec<Atom>>);

impl MixOp {
    /// A prefix constructor: one leading token, all holes trailing
    pub fn prefix(name: impl Into<String>, arity: usize) -> Self {
        let mut phrases = vec![vec![Atom::new(name)]];
        phrases.extend(std::iter::repeat_with(Vec::new).take(arity));
        MixOp(phrases)
    }

    /// Number of argument holes
    pub fn arity(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

impl fmt::Display for MixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`")?;
        for (i, phrase) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "%")?;
            }
            for atom in phrase {
                write!(f, "{atom}")?;
            }
        }
        write!(f, "`")
    }
}

// ============================================================================
// Types
// ============================================================================

/// Iterator kinds for lifted types and iterated constructs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Iter {
    /// Runs zero or one time; lifts to an optional
    Opt,
    /// Runs once per element; lifts to a list
    List,
}

impl fmt::Display for Iter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Iter::Opt => write!(f, "?"),
            Iter::List => write!(f, "*"),
        }
    }
}

/// IL types; structural except for `VarT` references to declared types
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Typ {
    BoolT,
    NumT(NumKind),
    TextT,
    ListT(Box<Typ>),
    TupleT(Vec<Typ>),
    OptT(Box<Typ>),
    /// Reference to a `TypD`, with type arguments
    VarT(Id, Vec<Typ>),
    /// Iterator lift of an element type
    IterT(Box<Typ>, Iter),
}

impl Typ {
    pub fn nat() -> Typ {
        Typ::NumT(NumKind::Nat)
    }

    pub fn list(elem: Typ) -> Typ {
        Typ::ListT(Box::new(elem))
    }

    pub fn opt(elem: Typ) -> Typ {
        Typ::OptT(Box::new(elem))
    }

    pub fn var(name: &str) -> Typ {
        Typ::VarT(Id::dummy(name), Vec::new())
    }
}

impl fmt::Display for Typ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Typ::BoolT => write!(f, "bool"),
            Typ::NumT(k) => write!(f, "{k}"),
            Typ::TextT => write!(f, "text"),
            Typ::ListT(t) => write!(f, "{t}*"),
            Typ::TupleT(ts) => {
                write!(f, "(")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Typ::OptT(t) => write!(f, "{t}?"),
            Typ::VarT(id, args) => {
                write!(f, "{id}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, t) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{t}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Typ::IterT(t, iter) => write!(f, "{t}{iter}"),
        }
    }
}

/// Body of a type declaration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefTyp {
    /// Transparent alias
    AliasT(Typ),
    /// Record with atom-keyed fields; field order is declaration order
    StructT(Vec<(Atom, Typ)>),
    /// Algebraic variant; each case is a mixfix constructor
    VariantT(Vec<TypCase>),
}

/// One constructor of a variant type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypCase {
    pub mixop: MixOp,
    pub args: Vec<Typ>,
}

// ============================================================================
// Operators
// ============================================================================

/// The type an operator dispatches on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpTyp {
    BoolT,
    NumT(NumKind),
    TextT,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    /// Boolean negation
    NotOp,
    /// Numeric identity
    PlusOp,
    /// Numeric negation
    MinusOp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    // boolean; `AndOp`/`OrOp`/`ImplOp` short-circuit
    AndOp,
    OrOp,
    ImplOp,
    EquivOp,
    // numeric, kind-preserving
    AddOp,
    SubOp,
    MulOp,
    DivOp,
    ModOp,
    PowOp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    EqOp,
    NeOp,
    LtOp,
    GtOp,
    LeOp,
    GeOp,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::EqOp => "=",
            CmpOp::NeOp => "=/=",
            CmpOp::LtOp => "<",
            CmpOp::GtOp => ">",
            CmpOp::LeOp => "<=",
            CmpOp::GeOp => ">=",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::AndOp => "/\\",
            BinOp::OrOp => "\\/",
            BinOp::ImplOp => "=>",
            BinOp::EquivOp => "<=>",
            BinOp::AddOp => "+",
            BinOp::SubOp => "-",
            BinOp::MulOp => "*",
            BinOp::DivOp => "/",
            BinOp::ModOp => "\\",
            BinOp::PowOp => "^",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnOp::NotOp => "~",
            UnOp::PlusOp => "+",
            UnOp::MinusOp => "-",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression with its note: the declared type and source region
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exp {
    pub kind: ExpKind,
    pub typ: Typ,
    pub region: Region,
}

impl Exp {
    pub fn new(kind: ExpKind, typ: Typ, region: Region) -> Self {
        Self { kind, typ, region }
    }

    /// An expression with a dummy region, for generated nodes
    pub fn dummy(kind: ExpKind, typ: Typ) -> Self {
        Self::new(kind, typ, Region::dummy())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpKind {
    // === Literals ===
    BoolE(bool),
    NumE(Num),
    TextE(String),

    // === Names ===
    /// Variable reference
    VarE(Id),
    /// Reified function reference
    FuncE(Id),

    // === Operators ===
    UnE(UnOp, OpTyp, Box<Exp>),
    BinE(BinOp, OpTyp, Box<Exp>, Box<Exp>),
    CmpE(CmpOp, OpTyp, Box<Exp>, Box<Exp>),

    // === Construction ===
    TupleE(Vec<Exp>),
    ListE(Vec<Exp>),
    OptE(Option<Box<Exp>>),
    /// Mixfix constructor application
    CaseE(MixOp, Vec<Exp>),
    /// Record construction; fields in declaration order
    StrE(Vec<(Atom, Exp)>),

    // === Projection ===
    /// Record field access
    DotE(Box<Exp>, Atom),
    /// Tuple element access
    ProjE(Box<Exp>, usize),
    /// First element of a list
    HeadE(Box<Exp>),
    /// All but the first element of a list
    TailE(Box<Exp>),

    // === Lists ===
    LenE(Box<Exp>),
    /// Membership: element, list
    MemE(Box<Exp>, Box<Exp>),
    /// Concatenation of two lists or two texts
    CatE(Box<Exp>, Box<Exp>),

    // === Iteration ===
    /// Evaluate the body once per iteration of the binders' lifted values
    IterE(Box<Exp>, Iter, Vec<Id>),

    // === Calls ===
    /// Function or `$`-builtin call
    CallE(Id, Vec<Exp>),

    // === Case analysis ===
    /// Scrutinee and arms; first matching pattern wins
    MatchE(Box<Exp>, Vec<(Pattern, Exp)>),
}

// ============================================================================
// Patterns
// ============================================================================

/// Structural patterns; binders must be linear per pattern
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    /// Matches anything, binds nothing
    WildP,
    /// Matches anything, binds the whole value
    VarP(Id),
    BoolP(bool),
    NumP(Num),
    TextP(String),
    /// Constructor pattern; matches the same mixfix constructor pointwise
    CaseP(MixOp, Vec<Pattern>),
    TupleP(Vec<Pattern>),
    /// Option pattern: `None` or `Some` of an inner pattern
    OptP(Option<Box<Pattern>>),
    /// List shape: fixed prefix, optional rest binder, fixed suffix
    ListP {
        prefix: Vec<Pattern>,
        rest: Option<Id>,
        suffix: Vec<Pattern>,
    },
}

impl Pattern {
    /// All binders introduced by this pattern, in left-to-right order
    pub fn binders(&self) -> Vec<&Id> {
        let mut out = Vec::new();
        self.collect_binders(&mut out);
        out
    }

    fn collect_binders<'a>(&'a self, out: &mut Vec<&'a Id>) {
        match self {
            Pattern::WildP | Pattern::BoolP(_) | Pattern::NumP(_) | Pattern::TextP(_) => {}
            Pattern::VarP(id) => out.push(id),
            Pattern::CaseP(_, ps) | Pattern::TupleP(ps) => {
                for p in ps {
                    p.collect_binders(out);
                }
            }
            Pattern::OptP(p) => {
                if let Some(p) = p {
                    p.collect_binders(out);
                }
            }
            Pattern::ListP {
                prefix,
                rest,
                suffix,
            } => {
                for p in prefix {
                    p.collect_binders(out);
                }
                if let Some(id) = rest {
                    out.push(id);
                }
                for p in suffix {
                    p.collect_binders(out);
                }
            }
        }
    }
}

// ============================================================================
// Instructions
// ============================================================================

/// An iteration context attached to an instruction or path condition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterExp {
    pub iter: Iter,
    pub vars: Vec<Id>,
}

/// A relation notation application: the mixop with its argument expressions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotExp {
    pub mixop: MixOp,
    pub args: Vec<Exp>,
}

/// A branch identifier for path-condition tracking
pub type Pid = u32;

/// A path condition attached to a phantom
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathCond {
    ForallC(Exp, Vec<IterExp>),
    ExistsC(Exp, Vec<IterExp>),
    PlainC(Exp),
}

/// A branch that execution may fail to enter, with the conditions that
/// characterize entering it; the seed for negated-guard test generation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phantom {
    pub pid: Pid,
    pub conds: Vec<PathCond>,
}

/// An instruction with its source region
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instr {
    pub kind: InstrKind,
    pub region: Region,
}

impl Instr {
    pub fn new(kind: InstrKind, region: Region) -> Self {
        Self { kind, region }
    }

    pub fn dummy(kind: InstrKind) -> Self {
        Self::new(kind, Region::dummy())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrKind {
    /// Run the body if the condition holds (for every iteration); otherwise
    /// log the phantom and fall through to the next instruction
    IfI {
        cond: Exp,
        iters: Vec<IterExp>,
        then: Vec<Instr>,
        phantom: Option<Phantom>,
    },
    /// Evaluate the scrutinee once and run the first case whose guard is
    /// satisfied; if none is, log the phantom and fall through
    CaseI {
        scrut: Exp,
        cases: Vec<Case>,
        phantom: Option<Phantom>,
    },
    /// Default arm: legal only as the body of the last case of a `CaseI`
    OtherwiseI(Box<Instr>),
    /// Evaluate the right-hand side and bind it against the left-hand side
    /// treated as a pattern
    LetI {
        lhs: Exp,
        rhs: Exp,
        iters: Vec<IterExp>,
    },
    /// Invoke a relation: inputs from the notation's input positions,
    /// outputs pattern-bound into its output positions
    RuleI {
        id: Id,
        notation: NotExp,
        iters: Vec<IterExp>,
    },
    /// Produce the relation's outputs; terminates the instruction list
    ResultI(Vec<Exp>),
    /// Produce the function's value; terminates the instruction list
    ReturnI(Exp),
}

/// One case of a `CaseI`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub guard: Guard,
    pub body: Vec<Instr>,
}

/// Case guards
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Guard {
    /// Literal split
    BoolG(bool),
    /// Compare the scrutinee against an expression
    CmpG(CmpOp, OpTyp, Exp),
    /// The scrutinee's dynamic type is a subtype of the given type
    SubG(Typ),
    /// Pattern match; bindings enter the body's scope
    MatchG(Pattern),
    /// The scrutinee is an element of the list the expression produces
    MemG(Exp),
}

// ============================================================================
// Definitions
// ============================================================================

/// A function parameter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub id: Id,
    pub typ: Typ,
}

/// A top-level definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Def {
    /// Type declaration
    TypD {
        id: Id,
        tparams: Vec<Id>,
        deftyp: DefTyp,
        region: Region,
    },
    /// Inductive relation; `input_indices` names the mixop argument
    /// positions supplied by the caller, the rest are produced by `ResultI`
    RelD {
        id: Id,
        mixop: MixOp,
        input_indices: Vec<usize>,
        args: Vec<Exp>,
        body: Vec<Instr>,
        region: Region,
    },
    /// Deterministic function
    DecD {
        id: Id,
        tparams: Vec<Id>,
        params: Vec<Param>,
        body: Vec<Instr>,
        region: Region,
    },
}

impl Def {
    pub fn id(&self) -> &Id {
        match self {
            Def::TypD { id, .. } | Def::RelD { id, .. } | Def::DecD { id, .. } => id,
        }
    }

    pub fn region(&self) -> &Region {
        match self {
            Def::TypD { region, .. } | Def::RelD { region, .. } | Def::DecD { region, .. } => {
                region
            }
        }
    }
}

/// An elaborated specification: a flat, topologically orderable definition list
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    pub defs: Vec<Def>,
}
