//! Buffer access collection and the index-expression estimators built on it.

use crate::bound::Analyzer;
use crate::expr::{PrimExpr, Var};
use crate::stmt::Buffer;

use indexmap::IndexMap;

/// How a buffer is touched within one store's scope.
///
/// The discriminant order is the one-hot order in the packed vector;
/// `Unknown` has no slot and never survives collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
    ReadWrite,
    Unknown,
}

impl Default for AccessType {
    fn default() -> Self {
        AccessType::Unknown
    }
}

/// The access type and every observed index tuple for one buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferAccess {
    pub acc_type: AccessType,
    pub indices: Vec<Vec<PrimExpr>>,
}

/// Collects all buffer accesses under one store: the written buffer plus
/// every load in the store's value expression.
///
/// Iteration order over `accesses` is insertion order, which keeps derived
/// features deterministic.
#[derive(Debug, Default)]
pub struct AccessCollector {
    pub accesses: IndexMap<Buffer, BufferAccess>,
}

impl AccessCollector {
    pub fn insert_access(&mut self, buffer: &Buffer, acc_type: AccessType, indices: &[PrimExpr]) {
        let acc = self.accesses.entry(buffer.clone()).or_default();
        acc.acc_type = acc_type;
        acc.indices.push(indices.to_vec());
    }

    /// Records every load in `expr`.
    ///
    /// A load of a buffer already written here promotes it to `ReadWrite`.
    /// Read indices of a read-write buffer are not recorded: such an access
    /// is an update, whose read indices equal the write indices.
    pub fn extract_reads(&mut self, expr: &PrimExpr) {
        match expr {
            PrimExpr::IntImm(_) | PrimExpr::FloatImm(_) | PrimExpr::Var(_) => {}
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
            | PrimExpr::Or(a, b) => {
                self.extract_reads(a);
                self.extract_reads(b);
            }
            PrimExpr::Not(a) | PrimExpr::Cast(_, a) => self.extract_reads(a),
            PrimExpr::Select {
                cond,
                true_value,
                false_value,
            } => {
                self.extract_reads(cond);
                self.extract_reads(true_value);
                self.extract_reads(false_value);
            }
            PrimExpr::Call(call) => {
                for arg in &call.args {
                    self.extract_reads(arg);
                }
            }
            PrimExpr::Load(load) => {
                let acc = self.accesses.entry(load.buffer.clone()).or_default();
                acc.acc_type = match acc.acc_type {
                    AccessType::Read => AccessType::Read,
                    AccessType::Write => AccessType::ReadWrite,
                    AccessType::ReadWrite => AccessType::ReadWrite,
                    AccessType::Unknown => AccessType::Read,
                };
                if acc.acc_type != AccessType::ReadWrite {
                    acc.indices.push(load.indices.clone());
                }
                for index in &load.indices {
                    self.extract_reads(index);
                }
            }
        }
    }
}

#[derive(Default)]
struct CoefficientState {
    visited_var: bool,
    visited_mul: bool,
    visited_add: bool,
    stride: i64,
}

/// Approximate coefficient of `var` in an index expression, or `None` when
/// the variable does not occur.
///
/// This is deliberately not a linear-equation solver. The walk is post-order
/// with three latches: seeing the variable sets a fallback coefficient of 2,
/// an enclosing `Add` (with no `Mul` seen yet) settles on 1, and an
/// enclosing `Mul` by a literal (with no `Add` seen yet) settles on that
/// literal. It terminates quickly on non-linear indices and gives the
/// learned model stable values.
pub fn extract_coefficient(expr: &PrimExpr, var: &Var) -> Option<i64> {
    let mut state = CoefficientState::default();
    walk_coefficient(expr, var, &mut state);
    if !state.visited_var {
        return None;
    }
    if !state.visited_mul && !state.visited_add {
        Some(1)
    } else {
        Some(state.stride)
    }
}

fn walk_coefficient(expr: &PrimExpr, var: &Var, state: &mut CoefficientState) {
    match expr {
        PrimExpr::Var(v) => {
            if v == var {
                state.visited_var = true;
                // Magic fallback for when the approximation fails.
                state.stride = 2;
            }
        }
        PrimExpr::Mul(a, b) => {
            walk_coefficient(a, var, state);
            walk_coefficient(b, var, state);
            if state.visited_var && !state.visited_add {
                if let Some(c) = a.as_const_int().or_else(|| b.as_const_int()) {
                    state.visited_mul = true;
                    state.stride = c;
                }
            }
        }
        PrimExpr::Add(a, b) => {
            walk_coefficient(a, var, state);
            walk_coefficient(b, var, state);
            if state.visited_var && !state.visited_mul {
                state.visited_add = true;
                state.stride = 1;
            }
        }
        PrimExpr::Sub(a, b)
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
        | PrimExpr::Or(a, b) => {
            walk_coefficient(a, var, state);
            walk_coefficient(b, var, state);
        }
        PrimExpr::Not(a) | PrimExpr::Cast(_, a) => walk_coefficient(a, var, state),
        PrimExpr::Select {
            cond,
            true_value,
            false_value,
        } => {
            walk_coefficient(cond, var, state);
            walk_coefficient(true_value, var, state);
            walk_coefficient(false_value, var, state);
        }
        PrimExpr::Call(call) => {
            for arg in &call.args {
                walk_coefficient(arg, var, state);
            }
        }
        PrimExpr::Load(load) => {
            for index in &load.indices {
                walk_coefficient(index, var, state);
            }
        }
        PrimExpr::IntImm(_) | PrimExpr::FloatImm(_) => {}
    }
}

/// Element stride of `var` over a buffer's accesses.
///
/// Index components are scanned innermost-first, accumulating the row-major
/// stride of each dimension; the first component mentioning `var` yields
/// `|coefficient| * accumulated_stride` for its tuple. The minimum over all
/// tuples is returned, or 0 when no index mentions the variable.
pub fn compute_stride(indices: &[Vec<PrimExpr>], shape: &[i64], var: &Var) -> i64 {
    let mut min_stride = i64::MAX;
    let mut found = false;

    for index in indices {
        let mut shape_stride = 1i64;
        for i in (0..index.len()).rev() {
            if let Some(coefficient) = extract_coefficient(&index[i], var) {
                found = true;
                min_stride = min_stride.min(coefficient.abs().saturating_mul(shape_stride));
                break;
            }
            shape_stride = shape_stride.saturating_mul(shape[i]);
        }
    }

    if found {
        min_stride
    } else {
        0
    }
}

/// Per-dimension extent of the region touched by a set of index tuples
/// under the analyzer's current bindings.
///
/// With several tuples the bound per dimension is the union interval, which
/// over-approximates disjoint accesses.
pub fn compute_region(indices: &[Vec<PrimExpr>], analyzer: &Analyzer) -> Vec<i64> {
    let Some(first) = indices.first() else {
        return Vec::new();
    };

    if indices.len() == 1 {
        return first
            .iter()
            .map(|index| {
                let bound = analyzer.const_int_bound(index);
                bound
                    .max_value
                    .saturating_sub(bound.min_value)
                    .saturating_add(1)
            })
            .collect();
    }

    (0..first.len())
        .map(|dim| {
            let mut minimum = i64::MAX;
            let mut maximum = i64::MIN;
            for index in indices {
                let bound = analyzer.const_int_bound(&index[dim]);
                minimum = minimum.min(bound.min_value);
                maximum = maximum.max(bound.max_value);
            }
            maximum.saturating_sub(minimum).saturating_add(1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Dtype;
    use crate::stmt::Range;

    #[test]
    fn test_collector_promotes_to_read_write() {
        let i = Var::new("i");
        let c = Buffer::new("C", &[64], Dtype::Float32);
        let a = Buffer::new("A", &[64], Dtype::Float32);

        let mut collector = AccessCollector::default();
        let store_indices = [PrimExpr::from(&i)];
        collector.insert_access(&c, AccessType::Write, &store_indices);
        let value = c.load(vec![(&i).into()]) + a.load(vec![(&i).into()]);
        collector.extract_reads(&value);

        let c_acc = &collector.accesses[&c];
        assert_eq!(c_acc.acc_type, AccessType::ReadWrite);
        // Update pattern: the read indices are not recorded again.
        assert_eq!(c_acc.indices.len(), 1);

        let a_acc = &collector.accesses[&a];
        assert_eq!(a_acc.acc_type, AccessType::Read);
        assert_eq!(a_acc.indices.len(), 1);
    }

    #[test]
    fn test_repeated_reads_record_each_tuple() {
        let i = Var::new("i");
        let a = Buffer::new("A", &[64], Dtype::Float32);
        let mut collector = AccessCollector::default();
        let value = a.load(vec![(&i).into()]) + a.load(vec![i + 1i64]);
        collector.extract_reads(&value);
        let acc = &collector.accesses[&a];
        assert_eq!(acc.acc_type, AccessType::Read);
        assert_eq!(acc.indices.len(), 2);
    }

    #[test]
    fn test_coefficient_plain_var() {
        let i = Var::new("i");
        assert_eq!(extract_coefficient(&PrimExpr::from(&i), &i), Some(1));
    }

    #[test]
    fn test_coefficient_scaled_var() {
        let i = Var::new("i");
        assert_eq!(extract_coefficient(&(&i * 4i64), &i), Some(4));
    }

    #[test]
    fn test_coefficient_affine() {
        let i = Var::new("i");
        let j = Var::new("j");
        let e = &i * 8i64 + &j;
        assert_eq!(extract_coefficient(&e, &i), Some(8));
        assert_eq!(extract_coefficient(&e, &j), Some(1));
    }

    #[test]
    fn test_coefficient_add_before_mul() {
        // (i + 1) * 8: the Add latches first, so the Mul is ignored.
        let i = Var::new("i");
        let e = (i.clone() + 1i64) * 8i64;
        assert_eq!(extract_coefficient(&e, &i), Some(1));
    }

    #[test]
    fn test_coefficient_absent_var() {
        let i = Var::new("i");
        let j = Var::new("j");
        assert_eq!(extract_coefficient(&(&i * 4i64), &j), None);
    }

    #[test]
    fn test_coefficient_nonlinear() {
        // i * i latches neither Add nor Mul (no literal factor), so the
        // var-only rule reports 1.
        let i = Var::new("i");
        assert_eq!(extract_coefficient(&(i.clone() * i.clone()), &i), Some(1));
    }

    #[test]
    fn test_coefficient_fallback_after_latch() {
        // In i*4 + i the second occurrence of i resets the coefficient to
        // the fallback value of 2 after the Mul already latched.
        let i = Var::new("i");
        let e = i.clone() * 4i64 + i.clone();
        assert_eq!(extract_coefficient(&e, &i), Some(2));
    }

    #[test]
    fn test_stride_row_major_matrix() {
        let i = Var::new("i");
        let j = Var::new("j");
        let indices = vec![vec![PrimExpr::from(&i), PrimExpr::from(&j)]];
        assert_eq!(compute_stride(&indices, &[64, 32], &j), 1);
        assert_eq!(compute_stride(&indices, &[64, 32], &i), 32);
        assert_eq!(compute_stride(&indices, &[64, 32], &Var::new("k")), 0);
    }

    #[test]
    fn test_stride_takes_minimum_over_tuples() {
        let i = Var::new("i");
        let indices = vec![vec![&i * 4i64], vec![PrimExpr::from(&i)]];
        assert_eq!(compute_stride(&indices, &[256], &i), 1);
    }

    #[test]
    fn test_region_single_tuple() {
        let i = Var::new("i");
        let j = Var::new("j");
        let mut ana = Analyzer::new();
        ana.bind(&i, Range::from_min_extent(0i64, 16i64));
        ana.bind(&j, Range::from_min_extent(0i64, 8i64));
        let indices = vec![vec![PrimExpr::from(&i), PrimExpr::from(&j)]];
        assert_eq!(compute_region(&indices, &ana), vec![16, 8]);
    }

    #[test]
    fn test_region_union_over_tuples() {
        let i = Var::new("i");
        let mut ana = Analyzer::new();
        ana.bind(&i, Range::from_min_extent(0i64, 16i64));
        let indices = vec![vec![PrimExpr::from(&i)], vec![i + 4i64]];
        assert_eq!(compute_region(&indices, &ana), vec![20]);
    }

    #[test]
    fn test_region_empty() {
        let ana = Analyzer::new();
        assert!(compute_region(&[], &ana).is_empty());
    }
}
