//! Tagged arbitrary-precision numbers
//!
//! A single numeric abstraction with an explicit kind (natural, signed
//! integer, fixed-width bit-vector) so the evaluator has one arithmetic path.
//! Arithmetic is exact and kind-preserving; bit-vector operations wrap modulo
//! `2^width`.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Maximum bit-vector width accepted by validation
pub const MAX_BITS_WIDTH: u32 = 2048;

/// The kind of a number, as declared in the IL type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumKind {
    /// Natural number (unbounded, non-negative)
    Nat,
    /// Signed integer (unbounded)
    Int,
    /// Bit-vector of the given width
    Bits(u32),
}

impl fmt::Display for NumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumKind::Nat => write!(f, "nat"),
            NumKind::Int => write!(f, "int"),
            NumKind::Bits(w) => write!(f, "bits({w})"),
        }
    }
}

/// Arithmetic failure, mapped by the evaluator into its error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumError {
    #[error("division by zero")]
    DivByZero,
    #[error("natural subtraction underflow")]
    Underflow,
    #[error("operands have different kinds: {left} and {right}")]
    KindMismatch { left: NumKind, right: NumKind },
    #[error("exponent too large")]
    ExpOverflow,
    #[error("cannot negate a non-zero natural")]
    NegateNat,
}

/// A tagged arbitrary-precision number
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Num {
    Nat(BigUint),
    Int(BigInt),
    Bits { width: u32, value: BigUint },
}

impl Num {
    pub fn nat(n: u64) -> Self {
        Num::Nat(BigUint::from(n))
    }

    pub fn int(n: i64) -> Self {
        Num::Int(BigInt::from(n))
    }

    /// Construct a bit-vector, wrapping the value into `0..2^width`
    pub fn bits(width: u32, value: u64) -> Self {
        Self::bits_wrapped(width, BigUint::from(value))
    }

    /// Construct a bit-vector from an arbitrary-precision value
    pub fn bits_wrapped(width: u32, value: BigUint) -> Self {
        Num::Bits {
            width,
            value: wrap(width, value),
        }
    }

    pub fn kind(&self) -> NumKind {
        match self {
            Num::Nat(_) => NumKind::Nat,
            Num::Int(_) => NumKind::Int,
            Num::Bits { width, .. } => NumKind::Bits(*width),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Num::Nat(n) => n.is_zero(),
            Num::Int(n) => n.is_zero(),
            Num::Bits { value, .. } => value.is_zero(),
        }
    }

    /// Exact, kind-preserving addition
    pub fn checked_add(&self, other: &Num) -> Result<Num, NumError> {
        match self.same_kind(other)? {
            Pair::Nat(a, b) => Ok(Num::Nat(a + b)),
            Pair::Int(a, b) => Ok(Num::Int(a + b)),
            Pair::Bits(w, a, b) => Ok(Num::Bits {
                width: w,
                value: wrap(w, a + b),
            }),
        }
    }

    /// Exact, kind-preserving subtraction; natural underflow is an error
    pub fn checked_sub(&self, other: &Num) -> Result<Num, NumError> {
        match self.same_kind(other)? {
            Pair::Nat(a, b) => {
                if a < b {
                    Err(NumError::Underflow)
                } else {
                    Ok(Num::Nat(a - b))
                }
            }
            Pair::Int(a, b) => Ok(Num::Int(a - b)),
            Pair::Bits(w, a, b) => {
                // wrap-around subtraction: a - b == a + (2^w - b) mod 2^w
                let modulus = modulus(w);
                Ok(Num::Bits {
                    width: w,
                    value: wrap(w, a + (&modulus - b % &modulus)),
                })
            }
        }
    }

    pub fn checked_mul(&self, other: &Num) -> Result<Num, NumError> {
        match self.same_kind(other)? {
            Pair::Nat(a, b) => Ok(Num::Nat(a * b)),
            Pair::Int(a, b) => Ok(Num::Int(a * b)),
            Pair::Bits(w, a, b) => Ok(Num::Bits {
                width: w,
                value: wrap(w, a * b),
            }),
        }
    }

    /// Truncating division; division by zero is an error
    pub fn checked_div(&self, other: &Num) -> Result<Num, NumError> {
        if other.is_zero() {
            return Err(NumError::DivByZero);
        }
        match self.same_kind(other)? {
            Pair::Nat(a, b) => Ok(Num::Nat(a / b)),
            Pair::Int(a, b) => Ok(Num::Int(a / b)),
            Pair::Bits(w, a, b) => Ok(Num::Bits {
                width: w,
                value: a / b,
            }),
        }
    }

    pub fn checked_rem(&self, other: &Num) -> Result<Num, NumError> {
        if other.is_zero() {
            return Err(NumError::DivByZero);
        }
        match self.same_kind(other)? {
            Pair::Nat(a, b) => Ok(Num::Nat(a % b)),
            Pair::Int(a, b) => Ok(Num::Int(a % b)),
            Pair::Bits(w, a, b) => Ok(Num::Bits {
                width: w,
                value: a % b,
            }),
        }
    }

    /// Exponentiation; the exponent must be a natural that fits in `u32`
    pub fn checked_pow(&self, other: &Num) -> Result<Num, NumError> {
        let exp = match other {
            Num::Nat(n) => u32::try_from(n).map_err(|_| NumError::ExpOverflow)?,
            Num::Bits { value, .. } => u32::try_from(value).map_err(|_| NumError::ExpOverflow)?,
            Num::Int(n) => match n.sign() {
                Sign::Minus => return Err(NumError::ExpOverflow),
                _ => u32::try_from(n.magnitude()).map_err(|_| NumError::ExpOverflow)?,
            },
        };
        match self {
            Num::Nat(a) => Ok(Num::Nat(a.pow(exp))),
            Num::Int(a) => Ok(Num::Int(a.pow(exp))),
            Num::Bits { width, value } => Ok(Num::Bits {
                width: *width,
                value: wrap(*width, value.pow(exp)),
            }),
        }
    }

    /// Arithmetic negation: identity on zero naturals, two's complement on bits
    pub fn checked_neg(&self) -> Result<Num, NumError> {
        match self {
            Num::Nat(n) if n.is_zero() => Ok(self.clone()),
            Num::Nat(_) => Err(NumError::NegateNat),
            Num::Int(n) => Ok(Num::Int(-n)),
            Num::Bits { width, value } => {
                let modulus = modulus(*width);
                Ok(Num::Bits {
                    width: *width,
                    value: wrap(*width, &modulus - value % &modulus),
                })
            }
        }
    }

    /// Total order on numbers of the same kind
    pub fn compare(&self, other: &Num) -> Result<Ordering, NumError> {
        match self.same_kind(other)? {
            Pair::Nat(a, b) => Ok(a.cmp(b)),
            Pair::Int(a, b) => Ok(a.cmp(b)),
            Pair::Bits(_, a, b) => Ok(a.cmp(b)),
        }
    }

    fn same_kind<'a>(&'a self, other: &'a Num) -> Result<Pair<'a>, NumError> {
        match (self, other) {
            (Num::Nat(a), Num::Nat(b)) => Ok(Pair::Nat(a, b)),
            (Num::Int(a), Num::Int(b)) => Ok(Pair::Int(a, b)),
            (
                Num::Bits { width: wa, value: a },
                Num::Bits { width: wb, value: b },
            ) if wa == wb => Ok(Pair::Bits(*wa, a, b)),
            _ => Err(NumError::KindMismatch {
                left: self.kind(),
                right: other.kind(),
            }),
        }
    }
}

enum Pair<'a> {
    Nat(&'a BigUint, &'a BigUint),
    Int(&'a BigInt, &'a BigInt),
    Bits(u32, &'a BigUint, &'a BigUint),
}

fn modulus(width: u32) -> BigUint {
    BigUint::one() << (width as usize)
}

fn wrap(width: u32, value: BigUint) -> BigUint {
    value % modulus(width)
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Num::Nat(n) => write!(f, "{n}"),
            Num::Int(n) => {
                if n.sign() == Sign::Minus {
                    write!(f, "{n}")
                } else {
                    write!(f, "+{n}")
                }
            }
            Num::Bits { width, value } => write!(f, "0x{value:X}`{width}"),
        }
    }
}
