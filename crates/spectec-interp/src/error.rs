//! Evaluation errors for the IL interpreter

use spectec_il::{NumError, Region};
use thiserror::Error;

/// Evaluation error
///
/// Interpretation errors abort the current evaluation and propagate to the
/// driver unchanged; there is no local recovery. The phantom log recorded up
/// to the failure point survives.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// Variable or definition lookup miss
    #[error("`{name}` is not bound")]
    Unbound { name: String, region: Option<Region> },

    /// A value view disagreed with the dynamic tag
    #[error("expected {expected}, got {actual}")]
    KindMismatch {
        expected: &'static str,
        actual: &'static str,
        region: Option<Region>,
    },

    /// Iteration binders disagree in length
    #[error("iteration binders have mismatched lengths: {lengths:?}")]
    IterLengthMismatch {
        lengths: Vec<usize>,
        region: Option<Region>,
    },

    /// A binding pattern failed to match
    #[error("binding pattern did not match")]
    LetMismatch { region: Option<Region> },

    /// Head or tail of an empty list
    #[error("head or tail of empty list")]
    EmptyList { region: Option<Region> },

    /// Division or modulo by zero
    #[error("division by zero")]
    DivByZero { region: Option<Region> },

    /// An inductive rule produced no result
    #[error("relation `{relid}` failed to produce a result")]
    RelFailed {
        relid: String,
        region: Option<Region>,
    },

    /// Recursion bound exceeded
    #[error("recursion depth limit {depth} exceeded")]
    StackOverflow {
        depth: usize,
        region: Option<Region>,
    },

    /// The caller-installed deadline passed
    #[error("evaluation deadline exceeded")]
    Deadline { region: Option<Region> },

    /// A builtin rejected its arguments
    #[error("{msg}")]
    BuiltinError { msg: String, region: Option<Region> },

    /// Arithmetic outside the representable range of the operand kind
    #[error("{msg}")]
    Arith { msg: String, region: Option<Region> },

    /// A state the elaborator is supposed to rule out (bug upstream or here)
    #[error("internal error: {msg}")]
    Internal { msg: String, region: Option<Region> },
}

impl EvalError {
    /// Stable kind name, used in the one-line driver diagnostic
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::Unbound { .. } => "Unbound",
            EvalError::KindMismatch { .. } => "KindMismatch",
            EvalError::IterLengthMismatch { .. } => "IterLengthMismatch",
            EvalError::LetMismatch { .. } => "LetMismatch",
            EvalError::EmptyList { .. } => "EmptyList",
            EvalError::DivByZero { .. } => "DivByZero",
            EvalError::RelFailed { .. } => "RelFailed",
            EvalError::StackOverflow { .. } => "StackOverflow",
            EvalError::Deadline { .. } => "Deadline",
            EvalError::BuiltinError { .. } => "BuiltinError",
            EvalError::Arith { .. } => "Arith",
            EvalError::Internal { .. } => "Internal",
        }
    }

    pub fn region(&self) -> Option<&Region> {
        match self {
            EvalError::Unbound { region, .. }
            | EvalError::KindMismatch { region, .. }
            | EvalError::IterLengthMismatch { region, .. }
            | EvalError::LetMismatch { region }
            | EvalError::EmptyList { region }
            | EvalError::DivByZero { region }
            | EvalError::RelFailed { region, .. }
            | EvalError::StackOverflow { region, .. }
            | EvalError::Deadline { region }
            | EvalError::BuiltinError { region, .. }
            | EvalError::Arith { region, .. }
            | EvalError::Internal { region, .. } => region.as_ref(),
        }
    }

    /// Attach a region if the error does not carry one yet
    pub fn with_region(mut self, r: &Region) -> Self {
        let slot = match &mut self {
            EvalError::Unbound { region, .. }
            | EvalError::KindMismatch { region, .. }
            | EvalError::IterLengthMismatch { region, .. }
            | EvalError::LetMismatch { region }
            | EvalError::EmptyList { region }
            | EvalError::DivByZero { region }
            | EvalError::RelFailed { region, .. }
            | EvalError::StackOverflow { region, .. }
            | EvalError::Deadline { region }
            | EvalError::BuiltinError { region, .. }
            | EvalError::Arith { region, .. }
            | EvalError::Internal { region, .. } => region,
        };
        if slot.is_none() {
            *slot = Some(r.clone());
        }
        self
    }

    pub fn unbound(name: impl Into<String>) -> Self {
        EvalError::Unbound {
            name: name.into(),
            region: None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        EvalError::Internal {
            msg: msg.into(),
            region: None,
        }
    }

    pub fn builtin(msg: impl Into<String>) -> Self {
        EvalError::BuiltinError {
            msg: msg.into(),
            region: None,
        }
    }

    /// Map an arithmetic failure into the taxonomy
    pub fn from_num(err: NumError) -> Self {
        match err {
            NumError::DivByZero => EvalError::DivByZero { region: None },
            NumError::KindMismatch { left, right } => EvalError::KindMismatch {
                expected: kind_name(left),
                actual: kind_name(right),
                region: None,
            },
            other => EvalError::Arith {
                msg: other.to_string(),
                region: None,
            },
        }
    }

    /// One-line diagnostic: `<region>: <kind>: <message>`
    pub fn diagnostic(&self) -> String {
        let region = self
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        format!("{}: {}: {}", region, self.kind(), self)
    }
}

fn kind_name(kind: spectec_il::NumKind) -> &'static str {
    match kind {
        spectec_il::NumKind::Nat => "nat",
        spectec_il::NumKind::Int => "int",
        spectec_il::NumKind::Bits(_) => "bits",
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
