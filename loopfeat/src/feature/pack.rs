//! Flattening feature sets into fixed-shape float vectors, and the parallel
//! list of field names.
//!
//! The field order is a public contract: the cost model is trained against
//! exact positions. [per_store_feature_names] enumerates names in the same
//! order and count as [pack_features] emits values, which tests enforce.

use itertools::Itertools;

use super::access::AccessType;
use super::curve::ARITH_INTENSITY_CURVE_SAMPLE_N;
use super::reuse::ReuseType;
use super::{AnnotationPos, BufferAccessFeature, FeatureSet};

const ACCESS_TYPE_ONE_HOT: [AccessType; 3] =
    [AccessType::Read, AccessType::Write, AccessType::ReadWrite];

const REUSE_TYPE_ONE_HOT: [ReuseType; 3] = [
    ReuseType::LoopMultipleRead,
    ReuseType::SerialMultipleReadWrite,
    ReuseType::NoReuse,
];

/// Floats in the head of a row, before the per-buffer slots: the compute
/// counters, three annotation blocks, the GPU block, and the intensity
/// curve.
const ROW_HEAD_LEN: usize = 16 + 3 * (3 + AnnotationPos::ALL.len()) + 8 + ARITH_INTENSITY_CURVE_SAMPLE_N;

/// Floats per buffer-access slot.
const BUFFER_SLOT_LEN: usize = 18;

/// Floats in the tail of a row: four allocation fields and three overall
/// fields.
const ROW_TAIL_LEN: usize = 7;

/// Length of one store's packed row for a given number of buffer slots.
pub const fn feature_row_len(max_n_bufs: usize) -> usize {
    ROW_HEAD_LEN + BUFFER_SLOT_LEN * max_n_bufs + ROW_TAIL_LEN
}

/// Shifted signed logarithm: `sign(x) * log2(|x| + 1)`.
///
/// Compresses magnitudes while keeping `slog(0) == 0` and odd symmetry.
/// Base 2 is load-bearing; the cost model is trained against it.
pub fn slog(x: f64) -> f64 {
    if x < 0.0 {
        -(-x + 1.0).log2()
    } else {
        (x + 1.0).log2()
    }
}

/// Pack feature sets into one flat vector: the store count followed by one
/// fixed-length row per store.
pub fn pack_features<'a>(
    sets: impl ExactSizeIterator<Item = &'a FeatureSet>,
    max_n_bufs: usize,
) -> Vec<f32> {
    let mut out = Vec::with_capacity(1 + sets.len() * feature_row_len(max_n_bufs));
    out.push(sets.len() as f32);
    for fea in sets {
        pack_feature_set(fea, max_n_bufs, &mut out);
    }
    out
}

/// Append one store's row to `out`.
pub fn pack_feature_set(fea: &FeatureSet, max_n_bufs: usize, out: &mut Vec<f32>) {
    let start = out.len();

    for value in [
        fea.float_mad,
        fea.float_addsub,
        fea.float_mul,
        fea.float_divmod,
        fea.float_cmp,
        fea.float_math_func,
        fea.float_other_func,
        fea.int_mad,
        fea.int_addsub,
        fea.int_mul,
        fea.int_divmod,
        fea.int_cmp,
        fea.int_math_func,
        fea.int_other_func,
        fea.bool_op,
        fea.select_op,
    ] {
        out.push(slog(value) as f32);
    }

    for (num, prod, len, pos) in [
        (fea.vec_num, fea.vec_prod, fea.vec_len, fea.vec_type),
        (fea.unroll_num, fea.unroll_prod, fea.unroll_len, fea.unroll_type),
        (
            fea.parallel_num,
            fea.parallel_prod,
            fea.parallel_len,
            fea.parallel_type,
        ),
    ] {
        out.push(slog(num) as f32);
        out.push(slog(prod) as f32);
        out.push(slog(len) as f32);
        for candidate in AnnotationPos::ALL {
            out.push((candidate == pos) as u8 as f32);
        }
    }

    out.push(fea.is_gpu as u8 as f32);
    for value in [
        fea.block_idx_x_len,
        fea.block_idx_y_len,
        fea.block_idx_z_len,
        fea.thread_idx_x_len,
        fea.thread_idx_y_len,
        fea.thread_idx_z_len,
        fea.vthread_len,
    ] {
        out.push(slog(value) as f32);
    }

    for value in fea.arith_intensity_curve {
        out.push(value as f32);
    }

    // Buffer-access slots, most cache-line traffic first.
    let ordered = fea
        .access_feas
        .iter()
        .sorted_by(|a, b| {
            b.lines
                .total_cmp(&a.lines)
                .then(b.bytes.total_cmp(&a.bytes))
        })
        .take(max_n_bufs)
        .collect::<Vec<_>>();
    for acc_fea in &ordered {
        pack_buffer_slot(acc_fea, out);
    }
    for _ in ordered.len()..max_n_bufs {
        out.extend(std::iter::repeat(0.0f32).take(BUFFER_SLOT_LEN));
    }

    out.push(slog(fea.alloc_size) as f32);
    out.push(slog(fea.alloc_prod) as f32);
    out.push(slog(fea.alloc_outer_prod) as f32);
    out.push(slog(fea.alloc_inner_prod) as f32);

    out.push(slog(fea.outer_prod) as f32);
    out.push(slog(fea.num_loops) as f32);
    out.push(slog(fea.auto_unroll_max_step) as f32);

    debug_assert_eq!(out.len() - start, feature_row_len(max_n_bufs));
}

fn pack_buffer_slot(acc_fea: &BufferAccessFeature, out: &mut Vec<f32>) {
    for candidate in ACCESS_TYPE_ONE_HOT {
        out.push((candidate == acc_fea.acc_type) as u8 as f32);
    }
    out.push(slog(acc_fea.bytes) as f32);
    out.push(slog(acc_fea.unique_bytes) as f32);
    out.push(slog(acc_fea.lines) as f32);
    out.push(slog(acc_fea.unique_lines) as f32);
    for candidate in REUSE_TYPE_ONE_HOT {
        out.push((candidate == acc_fea.reuse_type) as u8 as f32);
    }
    out.push(slog(acc_fea.reuse_dis_iter) as f32);
    out.push(slog(acc_fea.reuse_dis_bytes) as f32);
    out.push(slog(acc_fea.reuse_ct) as f32);
    out.push(slog(acc_fea.bytes_d_reuse_ct) as f32);
    out.push(slog(acc_fea.unique_bytes_d_reuse_ct) as f32);
    out.push(slog(acc_fea.lines_d_reuse_ct) as f32);
    out.push(slog(acc_fea.unique_lines_d_reuse_ct) as f32);
    out.push(slog(acc_fea.stride) as f32);
}

/// Names of every element of a packed row, in packing order.
pub fn per_store_feature_names(max_n_bufs: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(feature_row_len(max_n_bufs));

    for name in [
        "float_mad",
        "float_addsub",
        "float_mul",
        "float_divmod",
        "float_cmp",
        "float_mathfunc",
        "float_otherfunc",
        "int_mad",
        "int_addsub",
        "int_mul",
        "int_divmod",
        "int_cmp",
        "int_mathfunc",
        "int_otherfunc",
        "bool_op",
        "select_op",
    ] {
        names.push(name.to_string());
    }

    for group in ["vec", "unroll", "parallel"] {
        names.push(format!("{group}_num"));
        names.push(format!("{group}_prod"));
        names.push(format!("{group}_len"));
        for pos in AnnotationPos::ALL {
            names.push(format!("{group}_type.{}", pos.name()));
        }
    }

    for name in [
        "is_gpu",
        "blockIdx_x_len",
        "blockIdx_y_len",
        "blockIdx_z_len",
        "threadIdx_x_len",
        "threadIdx_y_len",
        "threadIdx_z_len",
        "vthread_len",
    ] {
        names.push(name.to_string());
    }

    for i in 0..ARITH_INTENSITY_CURVE_SAMPLE_N {
        names.push(format!("arith_intensity_curve_{i}"));
    }

    for b in 0..max_n_bufs {
        let prefix = format!("B{b}.");
        names.push(format!("{prefix}acc_type.Read"));
        names.push(format!("{prefix}acc_type.Write"));
        names.push(format!("{prefix}acc_type.ReadWrite"));
        names.push(format!("{prefix}bytes"));
        names.push(format!("{prefix}unique_bytes"));
        names.push(format!("{prefix}lines"));
        names.push(format!("{prefix}unique_lines"));
        names.push(format!("{prefix}reuse_type.LoopMultipleRead"));
        names.push(format!("{prefix}reuse_type.SerialMultipleReadWrite"));
        names.push(format!("{prefix}reuse_type.NoReuse"));
        names.push(format!("{prefix}reuse_dis_iter"));
        names.push(format!("{prefix}reuse_dis_bytes"));
        names.push(format!("{prefix}reuse_ct"));
        names.push(format!("{prefix}bytes_d_reuse_ct"));
        names.push(format!("{prefix}unique_bytes_d_reuse_ct"));
        names.push(format!("{prefix}lines_d_reuse_ct"));
        names.push(format!("{prefix}unique_lines_d_reuse_ct"));
        names.push(format!("{prefix}stride"));
    }

    for name in ["alloc_size", "alloc_prod", "alloc_outer_prod", "alloc_inner_prod"] {
        names.push(name.to_string());
    }
    for name in ["outer_prod", "num_loops", "auto_unroll_max_step"] {
        names.push(name.to_string());
    }

    debug_assert_eq!(names.len(), feature_row_len(max_n_bufs));
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn slot(acc: f64, lines: f64, bytes: f64) -> BufferAccessFeature {
        BufferAccessFeature {
            buffer_name: format!("b{acc}"),
            acc_type: AccessType::Read,
            bytes,
            unique_bytes: bytes,
            lines,
            unique_lines: lines,
            reuse_type: ReuseType::NoReuse,
            reuse_dis_iter: 0.0,
            reuse_dis_bytes: 0.0,
            reuse_ct: 0.0,
            bytes_d_reuse_ct: bytes * 2.0,
            unique_bytes_d_reuse_ct: bytes * 2.0,
            lines_d_reuse_ct: lines * 2.0,
            unique_lines_d_reuse_ct: lines * 2.0,
            stride: 1.0,
        }
    }

    #[test]
    fn test_slog_basics() {
        assert_eq!(slog(0.0), 0.0);
        assert_eq!(slog(1.0), 1.0);
        assert_eq!(slog(3.0), 2.0);
        assert_eq!(slog(-3.0), -2.0);
    }

    #[test]
    fn test_row_len_formula() {
        assert_eq!(feature_row_len(0), 74);
        assert_eq!(feature_row_len(5), 74 + 90);
    }

    #[test]
    fn test_names_match_row_len() {
        for max_n_bufs in [0, 1, 5, 11] {
            assert_eq!(
                per_store_feature_names(max_n_bufs).len(),
                feature_row_len(max_n_bufs)
            );
        }
    }

    #[test]
    fn test_pack_counts_and_pads() {
        let mut fea = FeatureSet::default();
        fea.access_feas = vec![slot(0.0, 4.0, 16.0)];
        let packed = pack_features([&fea].into_iter(), 3);
        assert_eq!(packed[0], 1.0);
        assert_eq!(packed.len(), 1 + feature_row_len(3));
        // The two padding slots are bit-exactly zero.
        let tail_start = packed.len() - 7;
        let pad = &packed[tail_start - 2 * 18..tail_start];
        assert!(pad.iter().all(|v| v.to_bits() == 0));
        assert!(packed.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_slot_order_lines_then_bytes() {
        let mut fea = FeatureSet::default();
        fea.access_feas = vec![
            slot(0.0, 1.0, 64.0),
            slot(1.0, 8.0, 32.0),
            slot(2.0, 8.0, 128.0),
        ];
        let mut out = Vec::new();
        pack_feature_set(&fea, 3, &mut out);
        let slots_start = ROW_HEAD_LEN;
        // Slot order by (lines desc, bytes desc): the 128-byte 8-line slot,
        // the 32-byte 8-line slot, then the 1-line slot.
        let slot_bytes: Vec<f32> = (0..3)
            .map(|s| out[slots_start + s * BUFFER_SLOT_LEN + 3])
            .collect();
        assert_eq!(
            slot_bytes,
            vec![slog(128.0) as f32, slog(32.0) as f32, slog(64.0) as f32]
        );
    }

    #[test]
    fn test_truncation_keeps_top_buffers() {
        let mut fea = FeatureSet::default();
        fea.access_feas = vec![slot(0.0, 1.0, 1.0), slot(1.0, 9.0, 1.0), slot(2.0, 5.0, 1.0)];
        let mut out = Vec::new();
        pack_feature_set(&fea, 2, &mut out);
        let lines_at = |s: usize| out[ROW_HEAD_LEN + s * BUFFER_SLOT_LEN + 5];
        assert_eq!(lines_at(0), slog(9.0) as f32);
        assert_eq!(lines_at(1), slog(5.0) as f32);
    }

    proptest! {
        #[test]
        fn test_slog_odd_symmetry(x in -1e12f64..1e12f64) {
            prop_assert!((slog(-x) + slog(x)).abs() < 1e-9);
        }

        #[test]
        fn test_slog_monotone(a in 0f64..1e12f64, b in 0f64..1e12f64) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(slog(lo) <= slog(hi));
        }
    }
}
