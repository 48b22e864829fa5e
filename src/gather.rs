use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::measurements::{MeasurementTable, RevisionIndex};
use crate::sources::cedar::record_rollup_history;
use crate::sources::evergreen::record_performance_history;
use crate::sources::{RollupApi, Task, TaskRunnerApi};

/// Both measurement tables for a build plus the revision lookup built alongside them.
#[derive(Debug, Clone, Default)]
pub struct GatheredData {
    pub task_runner: MeasurementTable,
    pub rollup: MeasurementTable,
    pub revisions: RevisionIndex,
}

/// Fails when the window reaches past the earliest representable date.
pub fn cutoff_from_weeks(now: DateTime<Utc>, weeks_back: u32) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(Duration::weeks(i64::from(weeks_back)))
        .ok_or_else(|| {
            anyhow!("--weeks-back {weeks_back} reaches before the earliest supported date")
        })
}

pub struct GatherService {
    task_runner: Arc<dyn TaskRunnerApi>,
    rollup: Arc<dyn RollupApi>,
    cutoff: DateTime<Utc>,
    skip_tasks: BTreeSet<String>,
}

impl GatherService {
    pub fn new(
        task_runner: Arc<dyn TaskRunnerApi>,
        rollup: Arc<dyn RollupApi>,
        cutoff: DateTime<Utc>,
    ) -> Self {
        Self {
            task_runner,
            rollup,
            cutoff,
            skip_tasks: BTreeSet::new(),
        }
    }

    /// Task display names that are never queried.
    pub fn with_skip_tasks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_tasks = names.into_iter().map(Into::into).collect();
        self
    }

    /// Walks every task of `build_id` in listing order, one request at a time.
    /// The first failed request aborts the whole pass.
    pub async fn gather_build(&self, build_id: &str) -> Result<GatheredData> {
        let tasks = self.task_runner.tasks_by_build(build_id).await?;
        info!(
            build_id,
            tasks = tasks.len(),
            cutoff = %self.cutoff,
            "gathering performance data"
        );

        let mut data = GatheredData::default();
        for listed in &tasks {
            if self.skip_tasks.contains(&listed.display_name) {
                debug!(task = %listed.display_name, "skipping filtered task");
                continue;
            }
            if !listed.is_success() {
                debug!(
                    task = %listed.display_name,
                    status = %listed.status,
                    "skipping unsuccessful task"
                );
                continue;
            }
            let task = self.collect_task_runner(&listed.task_id, &mut data).await?;
            self.collect_rollup(&task, &mut data).await?;
        }

        if data.revisions.is_empty() {
            warn!(build_id, "no task runner results inside the cutoff window");
        }
        info!(
            task_runner_orders = data.task_runner.order_count(),
            task_runner_values = data.task_runner.value_count(),
            rollup_orders = data.rollup.order_count(),
            rollup_values = data.rollup.value_count(),
            revisions = data.revisions.len(),
            "gathered performance data"
        );
        Ok(data)
    }

    /// Fetches the task and its performance history into the task-runner table.
    pub async fn collect_task_runner(
        &self,
        task_id: &str,
        data: &mut GatheredData,
    ) -> Result<Task> {
        let task = self.task_runner.task_by_id(task_id).await?;
        let history = self
            .task_runner
            .performance_results_by_task_name(task_id, &task.display_name)
            .await?;
        let written = record_performance_history(
            &task,
            &history,
            self.cutoff,
            &mut data.task_runner,
            &mut data.revisions,
        );
        debug!(
            task = %task.display_name,
            records = history.len(),
            written,
            "task runner history"
        );
        Ok(task)
    }

    pub async fn collect_rollup(&self, task: &Task, data: &mut GatheredData) -> Result<()> {
        let history = self
            .rollup
            .test_history(&task.display_name, &task.build_variant, &task.project_id)
            .await?;
        let written = record_rollup_history(task, &history, self.cutoff, &mut data.rollup);
        debug!(task = %task.display_name, records = history.len(), written, "rollup history");
        Ok(())
    }
}
