use crate::common::Dtype;
use crate::stmt::Buffer;

use std::fmt::{self, Display, Formatter};
use std::ops::{Add, Mul, Sub};
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(0);

/// A loop or thread iteration variable.
///
/// Vars compare by identity, not by name: two `Var::new("i")` calls produce
/// distinct variables. Cloning preserves identity.
#[derive(Debug, Clone)]
pub struct Var(Arc<VarRepr>);

#[derive(Debug)]
struct VarRepr {
    id: u64,
    name: String,
    dtype: Dtype,
}

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_dtype(name, Dtype::Sint32)
    }

    pub fn with_dtype(name: impl Into<String>, dtype: Dtype) -> Self {
        Var(Arc::new(VarRepr {
            id: NEXT_VAR_ID.fetch_add(1, atomic::Ordering::Relaxed),
            name: name.into(),
            dtype,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn dtype(&self) -> Dtype {
        self.0.dtype
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Var {}

impl std::hash::Hash for Var {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

/// A scalar expression in a lowered tensor program.
///
/// This is a closed tree; consumers match exhaustively rather than
/// implementing visitors.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimExpr {
    IntImm(i64),
    FloatImm(f64),
    Var(Var),
    Add(Box<PrimExpr>, Box<PrimExpr>),
    Sub(Box<PrimExpr>, Box<PrimExpr>),
    Mul(Box<PrimExpr>, Box<PrimExpr>),
    Div(Box<PrimExpr>, Box<PrimExpr>),
    Mod(Box<PrimExpr>, Box<PrimExpr>),
    FloorDiv(Box<PrimExpr>, Box<PrimExpr>),
    FloorMod(Box<PrimExpr>, Box<PrimExpr>),
    Min(Box<PrimExpr>, Box<PrimExpr>),
    Max(Box<PrimExpr>, Box<PrimExpr>),
    Eq(Box<PrimExpr>, Box<PrimExpr>),
    Ne(Box<PrimExpr>, Box<PrimExpr>),
    Lt(Box<PrimExpr>, Box<PrimExpr>),
    Le(Box<PrimExpr>, Box<PrimExpr>),
    Gt(Box<PrimExpr>, Box<PrimExpr>),
    Ge(Box<PrimExpr>, Box<PrimExpr>),
    And(Box<PrimExpr>, Box<PrimExpr>),
    Or(Box<PrimExpr>, Box<PrimExpr>),
    Not(Box<PrimExpr>),
    Select {
        cond: Box<PrimExpr>,
        true_value: Box<PrimExpr>,
        false_value: Box<PrimExpr>,
    },
    Cast(Dtype, Box<PrimExpr>),
    Call(Call),
    Load(BufferLoad),
}

/// A call to a named operator, e.g. `tir.exp`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: String,
    pub dtype: Dtype,
    pub args: Vec<PrimExpr>,
}

/// A read of one element of a buffer at an index tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferLoad {
    pub buffer: Buffer,
    pub indices: Vec<PrimExpr>,
}

impl PrimExpr {
    /// The scalar element type of this expression.
    ///
    /// Binary nodes take their left operand's type; comparisons and boolean
    /// connectives are byte-wide.
    pub fn dtype(&self) -> Dtype {
        match self {
            PrimExpr::IntImm(_) => Dtype::Sint32,
            PrimExpr::FloatImm(_) => Dtype::Float32,
            PrimExpr::Var(v) => v.dtype(),
            PrimExpr::Add(a, _)
            | PrimExpr::Sub(a, _)
            | PrimExpr::Mul(a, _)
            | PrimExpr::Div(a, _)
            | PrimExpr::Mod(a, _)
            | PrimExpr::FloorDiv(a, _)
            | PrimExpr::FloorMod(a, _)
            | PrimExpr::Min(a, _)
            | PrimExpr::Max(a, _) => a.dtype(),
            PrimExpr::Eq(..)
            | PrimExpr::Ne(..)
            | PrimExpr::Lt(..)
            | PrimExpr::Le(..)
            | PrimExpr::Gt(..)
            | PrimExpr::Ge(..)
            | PrimExpr::And(..)
            | PrimExpr::Or(..)
            | PrimExpr::Not(_) => Dtype::Uint8,
            PrimExpr::Select { true_value, .. } => true_value.dtype(),
            PrimExpr::Cast(dtype, _) => *dtype,
            PrimExpr::Call(call) => call.dtype,
            PrimExpr::Load(load) => load.buffer.dtype(),
        }
    }

    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            PrimExpr::IntImm(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether `var` occurs anywhere in this expression.
    pub fn references(&self, var: &Var) -> bool {
        match self {
            PrimExpr::IntImm(_) | PrimExpr::FloatImm(_) => false,
            PrimExpr::Var(v) => v == var,
            PrimExpr::Add(a, b)
            | PrimExpr::Sub(a, b)
            | PrimExpr::Mul(a, b)
            | PrimExpr::Div(a, b)
            | PrimExpr::Mod(a, b)
            | PrimExpr::FloorDiv(a, b)
            | PrimExpr::FloorMod(a, b)
            | PrimExpr::Min(a, b)
            | PrimExpr::Max(a, b)
            | PrimExpr::Eq(a, b)
            | PrimExpr::Ne(a, b)
            | PrimExpr::Lt(a, b)
            | PrimExpr::Le(a, b)
            | PrimExpr::Gt(a, b)
            | PrimExpr::Ge(a, b)
            | PrimExpr::And(a, b)
            | PrimExpr::Or(a, b) => a.references(var) || b.references(var),
            PrimExpr::Not(a) => a.references(var),
            PrimExpr::Select {
                cond,
                true_value,
                false_value,
            } => {
                cond.references(var) || true_value.references(var) || false_value.references(var)
            }
            PrimExpr::Cast(_, a) => a.references(var),
            PrimExpr::Call(call) => call.args.iter().any(|a| a.references(var)),
            PrimExpr::Load(load) => load.indices.iter().any(|i| i.references(var)),
        }
    }

    pub fn min_of(a: impl Into<PrimExpr>, b: impl Into<PrimExpr>) -> PrimExpr {
        PrimExpr::Min(Box::new(a.into()), Box::new(b.into()))
    }

    pub fn max_of(a: impl Into<PrimExpr>, b: impl Into<PrimExpr>) -> PrimExpr {
        PrimExpr::Max(Box::new(a.into()), Box::new(b.into()))
    }

    pub fn lt(self, rhs: impl Into<PrimExpr>) -> PrimExpr {
        PrimExpr::Lt(Box::new(self), Box::new(rhs.into()))
    }

    pub fn ge(self, rhs: impl Into<PrimExpr>) -> PrimExpr {
        PrimExpr::Ge(Box::new(self), Box::new(rhs.into()))
    }

    pub fn and(self, rhs: impl Into<PrimExpr>) -> PrimExpr {
        PrimExpr::And(Box::new(self), Box::new(rhs.into()))
    }

    pub fn select(
        cond: impl Into<PrimExpr>,
        true_value: impl Into<PrimExpr>,
        false_value: impl Into<PrimExpr>,
    ) -> PrimExpr {
        PrimExpr::Select {
            cond: Box::new(cond.into()),
            true_value: Box::new(true_value.into()),
            false_value: Box::new(false_value.into()),
        }
    }

    pub fn call(op: impl Into<String>, dtype: Dtype, args: Vec<PrimExpr>) -> PrimExpr {
        PrimExpr::Call(Call {
            op: op.into(),
            dtype,
            args,
        })
    }

    pub fn floordiv(self, rhs: impl Into<PrimExpr>) -> PrimExpr {
        PrimExpr::FloorDiv(Box::new(self), Box::new(rhs.into()))
    }

    pub fn floormod(self, rhs: impl Into<PrimExpr>) -> PrimExpr {
        PrimExpr::FloorMod(Box::new(self), Box::new(rhs.into()))
    }
}

impl From<i64> for PrimExpr {
    fn from(v: i64) -> Self {
        PrimExpr::IntImm(v)
    }
}

impl From<f64> for PrimExpr {
    fn from(v: f64) -> Self {
        PrimExpr::FloatImm(v)
    }
}

impl From<Var> for PrimExpr {
    fn from(v: Var) -> Self {
        PrimExpr::Var(v)
    }
}

impl From<&Var> for PrimExpr {
    fn from(v: &Var) -> Self {
        PrimExpr::Var(v.clone())
    }
}

impl<R: Into<PrimExpr>> Add<R> for PrimExpr {
    type Output = PrimExpr;

    fn add(self, rhs: R) -> PrimExpr {
        PrimExpr::Add(Box::new(self), Box::new(rhs.into()))
    }
}

impl<R: Into<PrimExpr>> Sub<R> for PrimExpr {
    type Output = PrimExpr;

    fn sub(self, rhs: R) -> PrimExpr {
        PrimExpr::Sub(Box::new(self), Box::new(rhs.into()))
    }
}

impl<R: Into<PrimExpr>> Mul<R> for PrimExpr {
    type Output = PrimExpr;

    fn mul(self, rhs: R) -> PrimExpr {
        PrimExpr::Mul(Box::new(self), Box::new(rhs.into()))
    }
}

impl<R: Into<PrimExpr>> Add<R> for Var {
    type Output = PrimExpr;

    fn add(self, rhs: R) -> PrimExpr {
        PrimExpr::from(self) + rhs
    }
}

impl<R: Into<PrimExpr>> Sub<R> for Var {
    type Output = PrimExpr;

    fn sub(self, rhs: R) -> PrimExpr {
        PrimExpr::from(self) - rhs
    }
}

impl<R: Into<PrimExpr>> Mul<R> for Var {
    type Output = PrimExpr;

    fn mul(self, rhs: R) -> PrimExpr {
        PrimExpr::from(self) * rhs
    }
}

impl<R: Into<PrimExpr>> Add<R> for &Var {
    type Output = PrimExpr;

    fn add(self, rhs: R) -> PrimExpr {
        PrimExpr::from(self) + rhs
    }
}

impl<R: Into<PrimExpr>> Mul<R> for &Var {
    type Output = PrimExpr;

    fn mul(self, rhs: R) -> PrimExpr {
        PrimExpr::from(self) * rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Dtype;

    #[test]
    fn test_var_identity() {
        let a = Var::new("i");
        let b = Var::new("i");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_binary_dtype_follows_left_operand() {
        let x = Var::with_dtype("x", Dtype::Float32);
        let i = Var::new("i");
        assert_eq!((x.clone() + 1i64).dtype(), Dtype::Float32);
        assert_eq!((i.clone() * 4i64).dtype(), Dtype::Sint32);
        assert_eq!(PrimExpr::from(x).lt(0.0).dtype(), Dtype::Uint8);
    }

    #[test]
    fn test_references_descends_into_loads() {
        let i = Var::new("i");
        let j = Var::new("j");
        let buf = Buffer::new("A", &[16], Dtype::Float32);
        let e = buf.load(vec![i.clone() * 4i64]);
        assert!(e.references(&i));
        assert!(!e.references(&j));
    }

    #[test]
    fn test_operator_construction() {
        let i = Var::new("i");
        let j = Var::new("j");
        let e = i.clone() * 64i64 + j.clone();
        match &e {
            PrimExpr::Add(a, b) => {
                assert!(matches!(a.as_ref(), PrimExpr::Mul(..)));
                assert_eq!(b.as_ref(), &PrimExpr::Var(j));
            }
            other => panic!("expected Add, got {other:?}"),
        }
    }
}
