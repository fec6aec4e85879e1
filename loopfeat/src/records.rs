//! Reading measurement records and normalizing throughputs per task.
//!
//! The measurement subsystem appends one JSON record per line. Extraction
//! does not consume the records themselves; they supply the regression
//! targets that ride along with the feature batch.

use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One measured schedule: which task it belongs to and what it cost.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MeasureRecord {
    /// Identifies the computation being tuned.
    pub workload_key: String,
    /// Target string the schedule was compiled for.
    pub target: String,
    /// Measured run times in seconds, one per repetition.
    pub costs: Vec<f64>,
}

impl MeasureRecord {
    pub fn mean_cost(&self) -> f64 {
        if self.costs.is_empty() {
            return f64::INFINITY;
        }
        self.costs.iter().sum::<f64>() / self.costs.len() as f64
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RecordReadError {
    #[error("failed to read record file")]
    Io(#[from] std::io::Error),
    #[error("malformed record on line {0}")]
    Parse(usize, #[source] serde_json::Error),
}

/// Read newline-delimited records, stopping after `max_lines` when given.
/// Blank lines are skipped.
pub fn read_records(
    path: impl AsRef<Path>,
    max_lines: Option<usize>,
) -> Result<Vec<MeasureRecord>, RecordReadError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: MeasureRecord =
            serde_json::from_str(&line).map_err(|e| RecordReadError::Parse(line_no + 1, e))?;
        records.push(record);
        if max_lines.is_some_and(|max| records.len() >= max) {
            break;
        }
    }
    Ok(records)
}

/// Assign task ids in first-seen order of `(workload_key, target)` and
/// normalize each record's throughput as `best_cost(task) / cost(record)`.
///
/// The best schedule of every task scores 1.0; slower ones fall toward 0.
pub fn normalize_throughputs(records: &[MeasureRecord]) -> (Vec<f32>, Vec<i32>) {
    let mut task_cache: HashMap<(&str, &str), usize> = HashMap::new();
    let mut min_costs: Vec<f64> = Vec::new();
    let mut task_ids = Vec::with_capacity(records.len());
    let mut costs = Vec::with_capacity(records.len());

    for record in records {
        let cost = record.mean_cost();
        let key = (record.workload_key.as_str(), record.target.as_str());
        let task_id = match task_cache.get(&key) {
            Some(&id) => {
                min_costs[id] = min_costs[id].min(cost);
                id
            }
            None => {
                let id = min_costs.len();
                task_cache.insert(key, id);
                min_costs.push(cost);
                id
            }
        };
        task_ids.push(task_id as i32);
        costs.push(cost);
    }

    let throughputs = costs
        .iter()
        .zip(&task_ids)
        .map(|(&cost, &id)| (min_costs[id as usize] / cost) as f32)
        .collect();
    (throughputs, task_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(workload_key: &str, target: &str, cost: f64) -> MeasureRecord {
        MeasureRecord {
            workload_key: workload_key.to_string(),
            target: target.to_string(),
            costs: vec![cost],
        }
    }

    #[test]
    fn test_task_ids_first_seen_order() {
        let records = vec![
            record("matmul", "llvm", 2.0),
            record("conv", "llvm", 3.0),
            record("matmul", "llvm", 1.0),
            record("matmul", "cuda", 4.0),
        ];
        let (throughputs, task_ids) = normalize_throughputs(&records);
        assert_eq!(task_ids, vec![0, 1, 0, 2]);
        assert_eq!(throughputs, vec![0.5, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mean_cost_over_repetitions() {
        let mut r = record("m", "llvm", 0.0);
        r.costs = vec![1.0, 3.0];
        assert_eq!(r.mean_cost(), 2.0);
    }

    #[test]
    fn test_read_records_jsonl() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for cost in [0.25, 0.5, 0.125] {
            writeln!(
                file,
                "{}",
                serde_json::to_string(&record("matmul", "llvm", cost)).unwrap()
            )
            .unwrap();
        }
        writeln!(file).unwrap();

        let all = read_records(file.path(), None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].costs, vec![0.125]);

        let capped = read_records(file.path(), Some(2)).unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_read_records_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(matches!(
            read_records(file.path(), None),
            Err(RecordReadError::Parse(1, _))
        ));
    }
}
