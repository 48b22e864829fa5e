use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Position in revision history. Higher orders are later commits.
pub type Order = i64;

/// Composite key naming one measurement series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultIdentity {
    pub project: String,
    pub variant: String,
    pub task: String,
    pub test_name: String,
    pub metric: String,
    pub thread_level: String,
}

impl ResultIdentity {
    pub fn new(
        project: impl Into<String>,
        variant: impl Into<String>,
        task: impl Into<String>,
        test_name: impl Into<String>,
        metric: impl Into<String>,
        thread_level: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            variant: variant.into(),
            task: task.into(),
            test_name: test_name.into(),
            metric: metric.into(),
            thread_level: thread_level.into(),
        }
    }
}

impl Display for ResultIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ResultIdentity(project={}, variant={}, task={}, test_name={}, metric={}, thread_level={})",
            self.project, self.variant, self.task, self.test_name, self.metric, self.thread_level
        )
    }
}
