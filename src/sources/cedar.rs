use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::identity::ResultIdentity;
use crate::measurements::MeasurementTable;
use crate::sources::http::{authenticated_client, endpoint, fetch_json, Credentials};
use crate::sources::{label_from_value, RollupApi, Task};

pub const DEFAULT_CEDAR_HOST: &str = "https://cedar.mongodb.com";

/// Argument keys holding the thread level, in priority order. The first key
/// present with a non-null value wins.
pub const THREAD_LEVEL_KEYS: [&str; 2] = ["thread_level", "threads"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerfResult {
    pub name: String,
    pub info: PerfResultInfo,
    #[serde(default)]
    pub create_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub rollups: PerfRollups,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerfResultInfo {
    pub project: String,
    pub version: String,
    pub order: i64,
    pub variant: String,
    pub task_name: String,
    pub task_id: String,
    pub execution: i64,
    pub test_name: String,
    pub trial: i64,
    pub parent: String,
    #[serde(default)]
    pub args: Option<BTreeMap<String, Value>>,
}

impl PerfResultInfo {
    /// Thread level taken from `args` per [`THREAD_LEVEL_KEYS`], or empty.
    pub fn thread_level(&self) -> String {
        let Some(args) = &self.args else {
            return String::new();
        };
        THREAD_LEVEL_KEYS
            .iter()
            .find_map(|key| args.get(*key).and_then(label_from_value))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerfRollups {
    #[serde(default)]
    pub stats: Option<Vec<PerfStat>>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerfStat {
    pub name: String,
    #[serde(default)]
    pub val: Option<f64>,
    pub version: i64,
    pub user: bool,
}

pub struct CedarClient {
    client: Client,
    host: String,
}

impl CedarClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Self::with_host(DEFAULT_CEDAR_HOST, credentials)
    }

    pub fn with_host(host: impl Into<String>, credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            client: authenticated_client(credentials)?,
            host: host.into(),
        })
    }
}

#[async_trait]
impl RollupApi for CedarClient {
    async fn test_history(
        &self,
        task_name: &str,
        variant: &str,
        project: &str,
    ) -> Result<Vec<PerfResult>> {
        let url = endpoint(&self.host, &["rest", "v1", "perf", "task_name", task_name])?;
        fetch_json(
            &self.client,
            url,
            &[("variant", variant), ("project", project)],
        )
        .await
        .with_context(|| format!("failed fetching rollups for {task_name} on {variant}"))
    }
}

/// Folds rollup statistics for `task` into `table`. Results created before
/// `cutoff` and results without statistics are skipped. Returns the number
/// of values written.
pub fn record_rollup_history(
    task: &Task,
    history: &[PerfResult],
    cutoff: DateTime<Utc>,
    table: &mut MeasurementTable,
) -> usize {
    let mut written = 0;
    for result in history {
        if result.create_at.is_some_and(|created| created < cutoff) {
            continue;
        }

        debug!(order = result.info.order, test = %result.info.test_name, "rollup record");
        let Some(stats) = result.rollups.stats.as_deref() else {
            continue;
        };
        let thread_level = result.info.thread_level();
        for stat in stats {
            let identity = ResultIdentity::new(
                task.project_id.as_str(),
                task.build_variant.as_str(),
                task.display_name.as_str(),
                result.info.test_name.as_str(),
                stat.name.as_str(),
                thread_level.as_str(),
            );
            debug!(
                metric = %stat.name,
                args = ?result.info.args,
                value = ?stat.val,
                "rollup value"
            );
            if let Some(previous) = table.insert(result.info.order, identity, stat.val) {
                debug!(order = result.info.order, ?previous, "rollup value overwritten");
            }
            written += 1;
        }
    }
    written
}
