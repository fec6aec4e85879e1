//! Data-reuse classification for one buffer under a loop nest.

use crate::expr::PrimExpr;
use crate::stmt::Buffer;

use super::{LoopFrame, TouchRegions};

/// The kind of reuse found for a buffer, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseType {
    /// A surrounding loop re-reads the same region on every iteration.
    LoopMultipleRead,
    /// Several accesses to the buffer occur serially in one loop body.
    SerialMultipleReadWrite,
    NoReuse,
}

/// Classify reuse for `buffer`, scanning the loop stack from the innermost
/// loop outward. The first qualifying case wins.
///
/// Returns `(reuse_type, reuse_dis_iter, reuse_dis_bytes, reuse_ct)`.
/// While scanning, `reuse_dis_iter` accumulates the iteration distance
/// between repeat touches and `reuse_dis_bytes` tracks the bytes moved
/// across that distance, taken from the per-loop touch regions.
pub(super) fn compute_reuse(
    buffer: &Buffer,
    indices: &[Vec<PrimExpr>],
    for_stack: &[LoopFrame],
    touch_regions: &TouchRegions,
) -> (ReuseType, f64, f64, f64) {
    let mut reuse_dis_iter = 1.0f64;
    let mut reuse_dis_bytes = -1.0f64;

    for frame in for_stack.iter().rev() {
        let indexed_by_loop = indices
            .iter()
            .flatten()
            .any(|index| index.references(&frame.var));
        let extent = frame.extent_int as f64;
        let regions = &touch_regions[&frame.id];

        if indexed_by_loop {
            reuse_dis_iter *= extent;
            reuse_dis_bytes = regions
                .values()
                .flat_map(|entries| entries.iter())
                .map(|t| (t.elements as f64) * (t.ele_bytes as f64))
                .sum();
        } else {
            // A loop that does not index the buffer re-reads it wholesale.
            if reuse_dis_bytes < 0.0 {
                // Hit on the innermost loop; the accumulation above never
                // ran, so charge one element per access here.
                reuse_dis_bytes = regions
                    .values()
                    .flat_map(|entries| entries.iter())
                    .map(|t| t.ele_bytes as f64)
                    .sum();
            }
            return (
                ReuseType::LoopMultipleRead,
                reuse_dis_iter,
                reuse_dis_bytes,
                extent,
            );
        }

        let own_entries = &regions[buffer];
        let serial_reuse = own_entries.len() as i64 - 1;
        if serial_reuse > 0 {
            let min_elements = own_entries
                .iter()
                .map(|t| t.elements as f64)
                .fold(f64::MAX, f64::min);
            let bytes: f64 = regions
                .values()
                .flat_map(|entries| entries.iter())
                .map(|t| (t.elements as f64) * (t.ele_bytes as f64))
                .sum();
            return (
                ReuseType::SerialMultipleReadWrite,
                min_elements / extent,
                bytes / extent,
                serial_reuse as f64,
            );
        }
    }

    (ReuseType::NoReuse, 0.0, 0.0, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Dtype;
    use crate::expr::Var;
    use crate::feature::access::AccessType;
    use crate::feature::TouchEntry;
    use indexmap::IndexMap;
    use std::collections::HashMap;

    fn frame(id: u64, var: &Var, extent: i64) -> LoopFrame {
        LoopFrame {
            id,
            var: var.clone(),
            min: PrimExpr::IntImm(0),
            extent: PrimExpr::IntImm(extent),
            extent_int: extent,
        }
    }

    fn entry(acc_type: AccessType, elements: i64, ele_bytes: i64) -> TouchEntry {
        TouchEntry {
            acc_type,
            elements,
            ele_bytes,
        }
    }

    #[test]
    fn test_no_reuse_when_every_loop_indexes() {
        let i = Var::new("i");
        let a = Buffer::new("A", &[1024], Dtype::Float32);
        let stack = vec![frame(0, &i, 1024)];
        let mut touch: TouchRegions = HashMap::new();
        let mut per_loop = IndexMap::new();
        per_loop.insert(a.clone(), vec![entry(AccessType::Read, 1024, 4)]);
        touch.insert(0, per_loop);

        let indices = vec![vec![PrimExpr::from(&i)]];
        let (reuse_type, dis_iter, dis_bytes, ct) = compute_reuse(&a, &indices, &stack, &touch);
        assert_eq!(reuse_type, ReuseType::NoReuse);
        assert_eq!((dis_iter, dis_bytes, ct), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_innermost_broadcast_loop() {
        // for i, for j: ... = A[i]; the j loop re-reads A[i] every iteration.
        let i = Var::new("i");
        let j = Var::new("j");
        let a = Buffer::new("A", &[64], Dtype::Float32);
        let c = Buffer::new("C", &[64, 32], Dtype::Float32);
        let stack = vec![frame(0, &i, 64), frame(1, &j, 32)];

        let mut inner = IndexMap::new();
        inner.insert(c.clone(), vec![entry(AccessType::Write, 32, 4)]);
        inner.insert(a.clone(), vec![entry(AccessType::Read, 1, 4)]);
        let mut touch: TouchRegions = HashMap::new();
        touch.insert(1, inner);

        let indices = vec![vec![PrimExpr::from(&i)]];
        let (reuse_type, dis_iter, dis_bytes, ct) = compute_reuse(&a, &indices, &stack, &touch);
        assert_eq!(reuse_type, ReuseType::LoopMultipleRead);
        assert_eq!(dis_iter, 1.0);
        // One element of each buffer per innermost iteration.
        assert_eq!(dis_bytes, 8.0);
        assert_eq!(ct, 32.0);
    }

    #[test]
    fn test_serial_multiple_accesses_in_one_body() {
        let i = Var::new("i");
        let c = Buffer::new("C", &[64], Dtype::Float32);
        let stack = vec![frame(0, &i, 64)];

        let mut per_loop = IndexMap::new();
        per_loop.insert(
            c.clone(),
            vec![
                entry(AccessType::Write, 64, 4),
                entry(AccessType::ReadWrite, 64, 4),
            ],
        );
        let mut touch: TouchRegions = HashMap::new();
        touch.insert(0, per_loop);

        let indices = vec![vec![PrimExpr::from(&i)]];
        let (reuse_type, dis_iter, dis_bytes, ct) = compute_reuse(&c, &indices, &stack, &touch);
        assert_eq!(reuse_type, ReuseType::SerialMultipleReadWrite);
        assert_eq!(dis_iter, 1.0);
        assert_eq!(dis_bytes, 8.0);
        assert_eq!(ct, 1.0);
    }
}
