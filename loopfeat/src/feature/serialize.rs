//! Flattening a feature batch into one little-endian byte blob.
//!
//! Layout for `n` records:
//!
//! ```text
//! int32   n
//! int32   sizes[n + 2]      // float count per record, then n, then n
//! float32 features[sizes[0]] .. features[sizes[n-1]]
//! float32 throughputs[sizes[n]]
//! int32   task_ids[sizes[n + 1]]
//! ```
//!
//! Readers deserialize with the size table alone, so rows may have
//! different lengths (failed extractions are empty).

/// Serialize a feature batch with its throughputs and task ids.
pub fn serialize_features(
    features: &[Vec<f32>],
    normalized_throughputs: &[f32],
    task_ids: &[i32],
) -> Vec<u8> {
    let n = features.len();
    let payload_floats: usize = features.iter().map(|row| row.len()).sum();
    let total_bytes = (1 + n + 2) * 4
        + payload_floats * 4
        + normalized_throughputs.len() * 4
        + task_ids.len() * 4;

    let mut out = Vec::with_capacity(total_bytes);

    push_i32(&mut out, n as i32);
    for row in features {
        push_i32(&mut out, row.len() as i32);
    }
    push_i32(&mut out, normalized_throughputs.len() as i32);
    push_i32(&mut out, task_ids.len() as i32);

    for row in features {
        for &value in row {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    for &value in normalized_throughputs {
        out.extend_from_slice(&value.to_le_bytes());
    }
    for &value in task_ids {
        out.extend_from_slice(&value.to_le_bytes());
    }

    debug_assert_eq!(out.len(), total_bytes);
    out
}

fn push_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_i32(data: &[u8], at: usize) -> i32 {
        i32::from_le_bytes(data[at..at + 4].try_into().unwrap())
    }

    fn read_f32(data: &[u8], at: usize) -> f32 {
        f32::from_le_bytes(data[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn test_layout_round_trip() {
        let features = vec![vec![1.5f32, -2.0, 0.25], vec![], vec![7.0]];
        let throughputs = vec![0.5f32, 1.0, 0.125];
        let task_ids = vec![0i32, 0, 1];

        let blob = serialize_features(&features, &throughputs, &task_ids);

        let n = read_i32(&blob, 0) as usize;
        assert_eq!(n, 3);
        let sizes: Vec<i32> = (0..n + 2).map(|i| read_i32(&blob, 4 + 4 * i)).collect();
        assert_eq!(sizes, vec![3, 0, 1, 3, 3]);

        let mut at = 4 * (1 + n + 2);
        let mut rows = Vec::new();
        for &size in &sizes[..n] {
            let row: Vec<f32> = (0..size as usize)
                .map(|i| read_f32(&blob, at + 4 * i))
                .collect();
            at += 4 * size as usize;
            rows.push(row);
        }
        assert_eq!(rows, features);

        let read_throughputs: Vec<f32> = (0..sizes[n] as usize)
            .map(|i| read_f32(&blob, at + 4 * i))
            .collect();
        at += 4 * sizes[n] as usize;
        assert_eq!(read_throughputs, throughputs);

        let read_ids: Vec<i32> = (0..sizes[n + 1] as usize)
            .map(|i| read_i32(&blob, at + 4 * i))
            .collect();
        at += 4 * sizes[n + 1] as usize;
        assert_eq!(read_ids, task_ids);
        assert_eq!(at, blob.len());
    }

    #[test]
    fn test_empty_batch() {
        let blob = serialize_features(&[], &[], &[]);
        assert_eq!(blob.len(), 12);
        assert_eq!(read_i32(&blob, 0), 0);
        assert_eq!(read_i32(&blob, 4), 0);
        assert_eq!(read_i32(&blob, 8), 0);
    }
}
