//! Arithmetic census of an expression tree.

use crate::expr::PrimExpr;
use crate::opset::OpEffectTable;

use super::FeatureError;

/// Per-kind operation tallies for one expression.
///
/// Binary arithmetic and comparison nodes are classified as float when the
/// left operand's scalar type is floating, integer otherwise. Boolean
/// connectives and selects are counted regardless of operand type. Fused
/// multiply-add detection is not implemented, so the `mad` counters stay
/// zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MathOpCounts {
    pub float_mad: usize,
    pub float_addsub: usize,
    pub float_mul: usize,
    pub float_divmod: usize,
    pub float_cmp: usize,
    pub float_math_func: usize,
    pub float_other_func: usize,
    pub int_mad: usize,
    pub int_addsub: usize,
    pub int_mul: usize,
    pub int_divmod: usize,
    pub int_cmp: usize,
    pub int_math_func: usize,
    pub int_other_func: usize,
    pub bool_op: usize,
    pub select_op: usize,
}

impl MathOpCounts {
    /// Total floating-point work, the numerator of arithmetic intensity.
    pub fn float_total(&self) -> usize {
        self.float_mad
            + self.float_addsub
            + self.float_mul
            + self.float_divmod
            + self.float_cmp
            + self.float_math_func
            + self.float_other_func
    }
}

pub fn count_math_ops(
    expr: &PrimExpr,
    effects: &OpEffectTable,
) -> Result<MathOpCounts, FeatureError> {
    let mut counts = MathOpCounts::default();
    visit(expr, effects, &mut counts)?;
    Ok(counts)
}

fn visit(
    expr: &PrimExpr,
    effects: &OpEffectTable,
    counts: &mut MathOpCounts,
) -> Result<(), FeatureError> {
    match expr {
        PrimExpr::IntImm(_) | PrimExpr::FloatImm(_) | PrimExpr::Var(_) => {}
        PrimExpr::Add(a, b) | PrimExpr::Sub(a, b) => {
            if a.dtype().is_float() {
                counts.float_addsub += 1;
            } else {
                counts.int_addsub += 1;
            }
            visit(a, effects, counts)?;
            visit(b, effects, counts)?;
        }
        PrimExpr::Mul(a, b) => {
            if a.dtype().is_float() {
                counts.float_mul += 1;
            } else {
                counts.int_mul += 1;
            }
            visit(a, effects, counts)?;
            visit(b, effects, counts)?;
        }
        PrimExpr::Div(a, b)
        | PrimExpr::Mod(a, b)
        | PrimExpr::FloorDiv(a, b)
        | PrimExpr::FloorMod(a, b) => {
            if a.dtype().is_float() {
                counts.float_divmod += 1;
            } else {
                counts.int_divmod += 1;
            }
            visit(a, effects, counts)?;
            visit(b, effects, counts)?;
        }
        PrimExpr::Min(a, b)
        | PrimExpr::Max(a, b)
        | PrimExpr::Eq(a, b)
        | PrimExpr::Ne(a, b)
        | PrimExpr::Lt(a, b)
        | PrimExpr::Le(a, b)
        | PrimExpr::Gt(a, b)
        | PrimExpr::Ge(a, b) => {
            if a.dtype().is_float() {
                counts.float_cmp += 1;
            } else {
                counts.int_cmp += 1;
            }
            visit(a, effects, counts)?;
            visit(b, effects, counts)?;
        }
        PrimExpr::And(a, b) | PrimExpr::Or(a, b) => {
            counts.bool_op += 1;
            visit(a, effects, counts)?;
            visit(b, effects, counts)?;
        }
        PrimExpr::Not(a) => {
            counts.bool_op += 1;
            visit(a, effects, counts)?;
        }
        PrimExpr::Select {
            cond,
            true_value,
            false_value,
        } => {
            counts.select_op += 1;
            visit(cond, effects, counts)?;
            visit(true_value, effects, counts)?;
            visit(false_value, effects, counts)?;
        }
        PrimExpr::Cast(_, a) => visit(a, effects, counts)?,
        PrimExpr::Call(call) => {
            let effect = effects
                .effect(&call.op)
                .ok_or_else(|| FeatureError::UnknownCallOp(call.op.clone()))?;
            match (effect.is_pure(), call.dtype.is_float()) {
                (true, true) => counts.float_math_func += 1,
                (true, false) => counts.int_math_func += 1,
                (false, true) => counts.float_other_func += 1,
                (false, false) => counts.int_other_func += 1,
            }
            for arg in &call.args {
                visit(arg, effects, counts)?;
            }
        }
        PrimExpr::Load(load) => {
            for index in &load.indices {
                visit(index, effects, counts)?;
            }
        }
    }
    Ok(())
}
