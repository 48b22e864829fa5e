use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::identity::{Order, ResultIdentity};
use crate::measurements::MeasurementTable;

pub const DEFAULT_TOLERANCE: f64 = 0.0001;
pub const MAX_THREAD_LEVEL: &str = "max";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("rollup table is empty, no minimum order to compare from")]
    NoComparableData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Largest absolute difference still treated as equal.
    pub tolerance: f64,
    /// Thread level that only the task runner reports; never compared.
    pub excluded_thread_level: String,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            excluded_thread_level: MAX_THREAD_LEVEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    MissingOrder,
    MissingResult,
    Mismatched,
}

/// A comparison that did not come out correct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    MissingOrder {
        order: Order,
    },
    MissingResult {
        order: Order,
        identity: ResultIdentity,
    },
    Mismatched {
        order: Order,
        identity: ResultIdentity,
        task_runner: Option<f64>,
        rollup: Option<f64>,
    },
}

impl Finding {
    pub fn order(&self) -> Order {
        match self {
            Self::MissingOrder { order }
            | Self::MissingResult { order, .. }
            | Self::Mismatched { order, .. } => *order,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::MissingOrder { .. } => Outcome::MissingOrder,
            Self::MissingResult { .. } => Outcome::MissingResult,
            Self::Mismatched { .. } => Outcome::Mismatched,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub correct: usize,
    pub missing_order: usize,
    pub missing_result: usize,
    pub mismatched: usize,
}

impl Summary {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Correct => self.correct += 1,
            Outcome::MissingOrder => self.missing_order += 1,
            Outcome::MissingResult => self.missing_result += 1,
            Outcome::Mismatched => self.mismatched += 1,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.missing_order == 0 && self.missing_result == 0 && self.mismatched == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Lowest order present in the rollup table.
    pub floor: Order,
    pub findings: Vec<Finding>,
    pub summary: Summary,
}

/// Null on both sides agrees; null on one side never does.
pub fn values_match(task_runner: Option<f64>, rollup: Option<f64>, tolerance: f64) -> bool {
    match (task_runner, rollup) {
        (Some(a), Some(b)) => (a - b).abs() <= tolerance,
        (None, None) => true,
        _ => false,
    }
}

/// Diffs the task-runner table against the rollup table.
///
/// Orders below the rollup table's lowest order are outside its retention
/// and are not compared. An order missing from the rollup table is reported
/// once, without per-identity comparisons. Identities at the excluded
/// thread level are skipped.
pub fn reconcile(
    task_runner: &MeasurementTable,
    rollup: &MeasurementTable,
    options: &ReconcileOptions,
) -> Result<Reconciliation, ReconcileError> {
    let floor = rollup.min_order().ok_or(ReconcileError::NoComparableData)?;
    let mut findings = Vec::new();
    let mut summary = Summary::default();

    for (order, entries) in task_runner.iter() {
        if order < floor {
            continue;
        }
        let Some(rollup_entries) = rollup.entries(order) else {
            debug!(order, "order missing from rollups");
            summary.record(Outcome::MissingOrder);
            findings.push(Finding::MissingOrder { order });
            continue;
        };

        for (identity, value) in entries {
            if identity.thread_level == options.excluded_thread_level {
                continue;
            }
            let finding = match rollup_entries.get(identity) {
                None => Finding::MissingResult {
                    order,
                    identity: identity.clone(),
                },
                Some(rollup_value) if !values_match(*value, *rollup_value, options.tolerance) => {
                    Finding::Mismatched {
                        order,
                        identity: identity.clone(),
                        task_runner: *value,
                        rollup: *rollup_value,
                    }
                }
                Some(_) => {
                    summary.record(Outcome::Correct);
                    continue;
                }
            };
            summary.record(finding.outcome());
            findings.push(finding);
        }
    }

    Ok(Reconciliation {
        floor,
        findings,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::{reconcile, values_match, Finding, ReconcileError, ReconcileOptions, Summary};
    use crate::identity::ResultIdentity;
    use crate::measurements::MeasurementTable;

    fn id(metric: &str, thread_level: &str) -> ResultIdentity {
        ResultIdentity::new("sys-perf", "linux", "insert", "Insert", metric, thread_level)
    }

    fn table(rows: &[(i64, ResultIdentity, f64)]) -> MeasurementTable {
        let mut table = MeasurementTable::new();
        for (order, identity, value) in rows {
            table.insert(*order, identity.clone(), Some(*value));
        }
        table
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        assert!(values_match(Some(0.0), Some(0.0001), 0.0001));
        assert!(!values_match(Some(0.0), Some(0.0001 + 1e-9), 0.0001));
        assert!(values_match(None, None, 0.0001));
        assert!(!values_match(Some(1.0), None, 0.0001));
    }

    #[test]
    fn values_at_exact_tolerance_reconcile_as_correct() {
        let task_runner = table(&[(1, id("ops", "1"), 0.0), (1, id("lat", "1"), 0.0)]);
        let rollup = table(&[(1, id("ops", "1"), 0.0001), (1, id("lat", "1"), 0.0001 + 1e-9)]);

        let result = reconcile(&task_runner, &rollup, &ReconcileOptions::default()).expect("diff");

        assert_eq!(result.summary.correct, 1);
        assert_eq!(result.summary.mismatched, 1);
    }

    #[test]
    fn max_thread_level_within_tolerance_scenario() {
        let task_runner = table(&[(5, id("ops", "1"), 10.0), (5, id("ops", "max"), 999.0)]);
        let rollup = table(&[(5, id("ops", "1"), 10.00005)]);

        let result = reconcile(&task_runner, &rollup, &ReconcileOptions::default()).expect("diff");

        assert_eq!(
            result.summary,
            Summary {
                correct: 1,
                missing_order: 0,
                missing_result: 0,
                mismatched: 0,
            }
        );
        assert!(result.findings.is_empty());
    }

    #[test]
    fn empty_rollup_table_is_fatal() {
        let task_runner = table(&[(5, id("ops", "1"), 10.0)]);
        let err = reconcile(&task_runner, &MeasurementTable::new(), &ReconcileOptions::default())
            .expect_err("no floor");
        assert_eq!(err, ReconcileError::NoComparableData);
    }

    #[test]
    fn orders_below_floor_are_ignored() {
        let task_runner = table(&[(5, id("ops", "1"), 10.0), (6, id("ops", "1"), 20.0)]);
        let rollup = table(&[(6, id("ops", "1"), 19.0)]);

        let result = reconcile(&task_runner, &rollup, &ReconcileOptions::default()).expect("diff");

        assert_eq!(result.floor, 6);
        assert_eq!(result.summary.mismatched, 1);
        assert_eq!(result.summary.correct, 0);
        assert_eq!(result.summary.missing_order, 0);
        assert_eq!(
            result.findings,
            vec![Finding::Mismatched {
                order: 6,
                identity: id("ops", "1"),
                task_runner: Some(20.0),
                rollup: Some(19.0),
            }]
        );
    }

    #[test]
    fn missing_order_is_reported_once() {
        let task_runner = table(&[
            (6, id("ops", "1"), 1.0),
            (7, id("ops", "1"), 1.0),
            (7, id("lat", "1"), 1.0),
        ]);
        let rollup = table(&[(6, id("ops", "1"), 1.0)]);

        let result = reconcile(&task_runner, &rollup, &ReconcileOptions::default()).expect("diff");

        assert_eq!(result.findings, vec![Finding::MissingOrder { order: 7 }]);
        assert_eq!(result.summary.missing_order, 1);
        assert_eq!(result.summary.correct, 1);
    }

    #[test]
    fn missing_result_never_reports_max_thread_level() {
        let task_runner = table(&[
            (6, id("ops", "max"), 1.0),
            (6, id("ops", "8"), 1.0),
        ]);
        let rollup = table(&[(6, id("lat", "8"), 1.0)]);

        let result = reconcile(&task_runner, &rollup, &ReconcileOptions::default()).expect("diff");

        assert_eq!(
            result.findings,
            vec![Finding::MissingResult {
                order: 6,
                identity: id("ops", "8"),
            }]
        );
        assert!(!result.summary.is_clean());
    }

    #[test]
    fn rollup_only_orders_are_not_compared() {
        let task_runner = table(&[(6, id("ops", "1"), 1.0)]);
        let rollup = table(&[(6, id("ops", "1"), 1.0), (9, id("ops", "1"), 3.0)]);

        let result = reconcile(&task_runner, &rollup, &ReconcileOptions::default()).expect("diff");

        assert!(result.summary.is_clean());
        assert_eq!(result.summary.correct, 1);
    }
}
