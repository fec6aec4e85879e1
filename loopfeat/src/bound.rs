//! Conservative integer interval analysis over [PrimExpr] trees.
//!
//! The extractor binds every enclosing loop variable to a range and asks for
//! the interval of each array index expression. Bounds saturate instead of
//! overflowing, so symbolic extents surface as "very large" rather than
//! wrapping.

use crate::expr::{PrimExpr, Var};
use crate::stmt::Range;

use std::collections::HashMap;

/// An inclusive integer interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstIntBound {
    pub min_value: i64,
    pub max_value: i64,
}

impl ConstIntBound {
    pub const EVERYTHING: ConstIntBound = ConstIntBound {
        min_value: i64::MIN,
        max_value: i64::MAX,
    };

    pub const fn new(min_value: i64, max_value: i64) -> Self {
        ConstIntBound {
            min_value,
            max_value,
        }
    }

    pub const fn single(value: i64) -> Self {
        ConstIntBound::new(value, value)
    }
}

/// Holds variable range bindings and evaluates expression intervals.
///
/// Later binds for the same variable override earlier ones.
#[derive(Default)]
pub struct Analyzer {
    bindings: HashMap<Var, Range>,
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer::default()
    }

    pub fn bind(&mut self, var: &Var, range: Range) {
        self.bindings.insert(var.clone(), range);
    }

    pub fn const_int_bound(&self, expr: &PrimExpr) -> ConstIntBound {
        match expr {
            PrimExpr::IntImm(v) => ConstIntBound::single(*v),
            PrimExpr::FloatImm(_) => ConstIntBound::EVERYTHING,
            PrimExpr::Var(v) => self.var_bound(v),
            PrimExpr::Add(a, b) => {
                let (a, b) = (self.const_int_bound(a), self.const_int_bound(b));
                ConstIntBound::new(
                    a.min_value.saturating_add(b.min_value),
                    a.max_value.saturating_add(b.max_value),
                )
            }
            PrimExpr::Sub(a, b) => {
                let (a, b) = (self.const_int_bound(a), self.const_int_bound(b));
                ConstIntBound::new(
                    a.min_value.saturating_sub(b.max_value),
                    a.max_value.saturating_sub(b.min_value),
                )
            }
            PrimExpr::Mul(a, b) => {
                let (a, b) = (self.const_int_bound(a), self.const_int_bound(b));
                let products = [
                    a.min_value.saturating_mul(b.min_value),
                    a.min_value.saturating_mul(b.max_value),
                    a.max_value.saturating_mul(b.min_value),
                    a.max_value.saturating_mul(b.max_value),
                ];
                ConstIntBound::new(
                    products.iter().copied().min().unwrap(),
                    products.iter().copied().max().unwrap(),
                )
            }
            PrimExpr::Div(a, b) | PrimExpr::FloorDiv(a, b) => {
                let bound = self.const_int_bound(a);
                match b.as_const_int() {
                    Some(d) if d > 0 => ConstIntBound::new(
                        bound.min_value.div_euclid(d),
                        bound.max_value.div_euclid(d),
                    ),
                    _ => ConstIntBound::EVERYTHING,
                }
            }
            PrimExpr::Mod(a, b) | PrimExpr::FloorMod(a, b) => {
                let bound = self.const_int_bound(a);
                match b.as_const_int() {
                    Some(m) if m > 0 => {
                        if bound.min_value >= 0 && bound.max_value < m {
                            bound
                        } else if bound.min_value >= 0 {
                            ConstIntBound::new(0, m - 1)
                        } else {
                            ConstIntBound::new(-(m - 1), m - 1)
                        }
                    }
                    _ => ConstIntBound::EVERYTHING,
                }
            }
            PrimExpr::Min(a, b) => {
                let (a, b) = (self.const_int_bound(a), self.const_int_bound(b));
                ConstIntBound::new(
                    a.min_value.min(b.min_value),
                    a.max_value.min(b.max_value),
                )
            }
            PrimExpr::Max(a, b) => {
                let (a, b) = (self.const_int_bound(a), self.const_int_bound(b));
                ConstIntBound::new(
                    a.min_value.max(b.min_value),
                    a.max_value.max(b.max_value),
                )
            }
            PrimExpr::Eq(..)
            | PrimExpr::Ne(..)
            | PrimExpr::Lt(..)
            | PrimExpr::Le(..)
            | PrimExpr::Gt(..)
            | PrimExpr::Ge(..)
            | PrimExpr::And(..)
            | PrimExpr::Or(..)
            | PrimExpr::Not(_) => ConstIntBound::new(0, 1),
            PrimExpr::Select {
                true_value,
                false_value,
                ..
            } => {
                let (t, f) = (
                    self.const_int_bound(true_value),
                    self.const_int_bound(false_value),
                );
                ConstIntBound::new(
                    t.min_value.min(f.min_value),
                    t.max_value.max(f.max_value),
                )
            }
            PrimExpr::Cast(_, a) => self.const_int_bound(a),
            PrimExpr::Call(_) | PrimExpr::Load(_) => ConstIntBound::EVERYTHING,
        }
    }

    fn var_bound(&self, var: &Var) -> ConstIntBound {
        let Some(range) = self.bindings.get(var) else {
            return ConstIntBound::EVERYTHING;
        };
        let min = self.const_int_bound(&range.min);
        let extent = self.const_int_bound(&range.extent);
        ConstIntBound::new(
            min.min_value,
            min.max_value
                .saturating_add(extent.max_value.saturating_sub(1)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Var;

    #[test]
    fn test_bound_of_literal() {
        let ana = Analyzer::new();
        assert_eq!(
            ana.const_int_bound(&PrimExpr::IntImm(7)),
            ConstIntBound::single(7)
        );
    }

    #[test]
    fn test_bound_of_bound_var() {
        let i = Var::new("i");
        let mut ana = Analyzer::new();
        ana.bind(&i, Range::from_min_extent(0i64, 16i64));
        assert_eq!(
            ana.const_int_bound(&PrimExpr::from(&i)),
            ConstIntBound::new(0, 15)
        );
    }

    #[test]
    fn test_rebinding_overrides() {
        let i = Var::new("i");
        let mut ana = Analyzer::new();
        ana.bind(&i, Range::from_min_extent(0i64, 1i64));
        ana.bind(&i, Range::from_min_extent(0i64, 1024i64));
        assert_eq!(
            ana.const_int_bound(&PrimExpr::from(&i)),
            ConstIntBound::new(0, 1023)
        );
    }

    #[test]
    fn test_bound_of_affine_index() {
        let i = Var::new("i");
        let j = Var::new("j");
        let mut ana = Analyzer::new();
        ana.bind(&i, Range::from_min_extent(0i64, 8i64));
        ana.bind(&j, Range::from_min_extent(0i64, 4i64));
        let e = i * 4i64 + j;
        assert_eq!(ana.const_int_bound(&e), ConstIntBound::new(0, 31));
    }

    #[test]
    fn test_unbound_var_saturates() {
        let n = Var::new("n");
        let i = Var::new("i");
        let mut ana = Analyzer::new();
        ana.bind(&i, Range::from_min_extent(0i64, PrimExpr::from(&n)));
        let bound = ana.const_int_bound(&PrimExpr::from(&i));
        assert_eq!(bound.min_value, 0);
        assert_eq!(bound.max_value, i64::MAX);
    }

    #[test]
    fn test_floormod_bound() {
        let i = Var::new("i");
        let mut ana = Analyzer::new();
        ana.bind(&i, Range::from_min_extent(0i64, 100i64));
        let e = PrimExpr::from(&i).floormod(8i64);
        assert_eq!(ana.const_int_bound(&e), ConstIntBound::new(0, 7));
        let small = PrimExpr::from(&i).floordiv(32i64);
        assert_eq!(ana.const_int_bound(&small), ConstIntBound::new(0, 3));
    }
}
