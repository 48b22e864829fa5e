pub mod cedar;
pub mod evergreen;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sources::cedar::PerfResult;
use crate::sources::evergreen::PerformanceRecord;

pub const TASK_STATUS_SUCCESS: &str = "success";

/// A task as reported by the task runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub task_id: String,
    pub display_name: String,
    pub project_id: String,
    pub build_variant: String,
    pub status: String,
}

impl Task {
    pub fn is_success(&self) -> bool {
        self.status == TASK_STATUS_SUCCESS
    }
}

/// String form of a loosely typed label such as a thread level. `null` has none.
pub fn label_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Read-only view of the CI task runner.
#[async_trait]
pub trait TaskRunnerApi: Send + Sync {
    async fn tasks_by_build(&self, build_id: &str) -> Result<Vec<Task>>;
    async fn task_by_id(&self, task_id: &str) -> Result<Task>;
    async fn performance_results_by_task_name(
        &self,
        task_id: &str,
        task_name: &str,
    ) -> Result<Vec<PerformanceRecord>>;
}

/// Read-only view of the metrics rollup service.
#[async_trait]
pub trait RollupApi: Send + Sync {
    async fn test_history(
        &self,
        task_name: &str,
        variant: &str,
        project: &str,
    ) -> Result<Vec<PerfResult>>;
}
