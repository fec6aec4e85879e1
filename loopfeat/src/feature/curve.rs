//! Arithmetic-intensity curve sampling.

/// Number of samples taken from the arithmetic intensity curve.
pub const ARITH_INTENSITY_CURVE_SAMPLE_N: usize = 10;

/// Sample the arithmetic-intensity curve at fixed fractions of total
/// compute.
///
/// `compute_ops_list` and `mem_bytes_list` are parallel, non-decreasing
/// sequences of `log2` cumulative compute and `log2` touched bytes per loop
/// level, innermost first. The y axis is intensity (`compute / bytes`, in
/// log space), the x axis is cumulative compute; values between recorded
/// levels are linearly interpolated.
pub fn sample_curve(
    compute_ops_list: &[f64],
    mem_bytes_list: &[f64],
    cur_compute_ops: f64,
) -> [f64; ARITH_INTENSITY_CURVE_SAMPLE_N] {
    let mut curve = [0.0f64; ARITH_INTENSITY_CURVE_SAMPLE_N];
    if cur_compute_ops <= 0.0 || compute_ops_list.is_empty() {
        return curve;
    }

    let total = *compute_ops_list.last().unwrap();
    let mut pt = 0;
    for (sample, slot) in curve.iter_mut().enumerate() {
        let target = total * (sample + 1) as f64 / ARITH_INTENSITY_CURVE_SAMPLE_N as f64;
        while compute_ops_list[pt] < target - 1e-4 {
            pt += 1;
        }

        *slot = if pt == 0 {
            compute_ops_list[0] / mem_bytes_list[0]
        } else {
            let base = compute_ops_list[pt - 1] / mem_bytes_list[pt - 1];
            let slope = (compute_ops_list[pt] / mem_bytes_list[pt]
                - compute_ops_list[pt - 1] / mem_bytes_list[pt - 1])
                / (compute_ops_list[pt] - compute_ops_list[pt - 1]);
            base + slope * (target - compute_ops_list[pt - 1])
        };
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_compute_yields_zeros() {
        assert_eq!(sample_curve(&[], &[], 0.0), [0.0; 10]);
        assert_eq!(sample_curve(&[3.0], &[5.0], 0.0), [0.0; 10]);
    }

    #[test]
    fn test_single_level_is_constant() {
        let curve = sample_curve(&[10.0], &[13.0], 1024.0);
        for value in curve {
            assert!((value - 10.0 / 13.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_two_levels_interpolate() {
        // Intensity rises from 1.0 at compute 4.0 to 2.0 at compute 8.0.
        let compute = [4.0, 8.0];
        let mem = [4.0, 4.0];
        let curve = sample_curve(&compute, &mem, 256.0);
        // First sample: target 0.8 <= 4.0, cursor stays at level 0.
        assert!((curve[0] - 1.0).abs() < 1e-9);
        // Last sample: target 8.0, the outermost level.
        assert!((curve[9] - 2.0).abs() < 1e-9);
        // Midpoint sample: target 5.6 interpolates between the levels.
        let expected = 1.0 + (2.0 - 1.0) / (8.0 - 4.0) * (5.6 - 4.0);
        assert!((curve[6] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_curve_is_monotone_for_monotone_intensity() {
        let compute = [2.0, 6.0, 12.0];
        let mem = [4.0, 6.0, 7.0];
        let curve = sample_curve(&compute, &mem, 4096.0);
        for pair in curve.windows(2) {
            assert!(pair[0] <= pair[1] + 1e-9);
        }
    }
}
