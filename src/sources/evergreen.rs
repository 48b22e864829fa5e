use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::identity::ResultIdentity;
use crate::measurements::{MeasurementTable, RevisionIndex};
use crate::sources::http::{authenticated_client, endpoint, fetch_json, Credentials};
use crate::sources::{label_from_value, Task, TaskRunnerApi};

pub const DEFAULT_EVERGREEN_HOST: &str = "https://evergreen.mongodb.com";

/// One entry of a task's performance history: every test run recorded for a revision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceRecord {
    pub order: i64,
    #[serde(default)]
    pub revision: String,
    pub create_time: DateTime<Utc>,
    #[serde(rename = "data", default)]
    pub test_batch: TestBatch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestBatch {
    #[serde(rename = "results", default)]
    pub test_runs: Vec<TestRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRun {
    #[serde(rename = "name", default)]
    pub test_name: String,
    #[serde(rename = "results", default)]
    pub test_results: Vec<TestResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    #[serde(default)]
    pub measurement: String,
    #[serde(default, deserialize_with = "thread_level_or_empty")]
    pub thread_level: String,
    #[serde(default)]
    pub mean_value: Option<f64>,
}

fn thread_level_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(label_from_value).unwrap_or_default())
}

pub struct EvergreenClient {
    client: Client,
    host: String,
}

impl EvergreenClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Self::with_host(DEFAULT_EVERGREEN_HOST, credentials)
    }

    pub fn with_host(host: impl Into<String>, credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            client: authenticated_client(credentials)?,
            host: host.into(),
        })
    }
}

#[async_trait]
impl TaskRunnerApi for EvergreenClient {
    async fn tasks_by_build(&self, build_id: &str) -> Result<Vec<Task>> {
        let url = endpoint(&self.host, &["rest", "v2", "builds", build_id, "tasks"])?;
        fetch_json(&self.client, url, &[])
            .await
            .with_context(|| format!("failed listing tasks for build {build_id}"))
    }

    async fn task_by_id(&self, task_id: &str) -> Result<Task> {
        let url = endpoint(&self.host, &["rest", "v2", "tasks", task_id])?;
        fetch_json(&self.client, url, &[])
            .await
            .with_context(|| format!("failed fetching task {task_id}"))
    }

    async fn performance_results_by_task_name(
        &self,
        task_id: &str,
        task_name: &str,
    ) -> Result<Vec<PerformanceRecord>> {
        let url = endpoint(
            &self.host,
            &["api", "2", "task", task_id, "json", "history", task_name, "perf"],
        )?;
        fetch_json(&self.client, url, &[])
            .await
            .with_context(|| format!("failed fetching performance history for {task_name}"))
    }
}

/// Folds a task's performance history into `table`, registering each
/// retained revision in `revisions`. Records created before `cutoff` are
/// skipped. Returns the number of values written.
pub fn record_performance_history(
    task: &Task,
    history: &[PerformanceRecord],
    cutoff: DateTime<Utc>,
    table: &mut MeasurementTable,
    revisions: &mut RevisionIndex,
) -> usize {
    let mut written = 0;
    for record in history {
        if record.create_time < cutoff {
            continue;
        }

        revisions.register(record.order, record.revision.as_str());
        debug!(order = record.order, revision = %record.revision, "task runner record");
        for run in &record.test_batch.test_runs {
            debug!(test = %run.test_name, "task runner test run");
            for result in &run.test_results {
                let identity = ResultIdentity::new(
                    task.project_id.as_str(),
                    task.build_variant.as_str(),
                    task.display_name.as_str(),
                    run.test_name.as_str(),
                    result.measurement.as_str(),
                    result.thread_level.as_str(),
                );
                debug!(
                    metric = %result.measurement,
                    thread_level = %result.thread_level,
                    value = ?result.mean_value,
                    "task runner value"
                );
                if let Some(previous) = table.insert(record.order, identity, result.mean_value) {
                    debug!(order = record.order, ?previous, "task runner value overwritten");
                }
                written += 1;
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{record_performance_history, EvergreenClient, PerformanceRecord, TestResult};
    use crate::identity::ResultIdentity;
    use crate::measurements::{MeasurementTable, RevisionIndex};
    use crate::sources::http::Credentials;
    use crate::sources::{Task, TaskRunnerApi};

    fn task() -> Task {
        Task {
            task_id: "task_1".to_string(),
            display_name: "insert_remove".to_string(),
            project_id: "sys-perf".to_string(),
            build_variant: "linux-standalone".to_string(),
            status: "success".to_string(),
        }
    }

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap()
    }

    fn record(order: i64, revision: &str, create_time: DateTime<Utc>) -> PerformanceRecord {
        serde_json::from_value(json!({
            "order": order,
            "revision": revision,
            "create_time": create_time,
            "data": {
                "results": [
                    {
                        "name": "InsertRemove.Insert",
                        "results": [
                            { "measurement": "ops_per_sec", "thread_level": "8", "mean_value": 1520.5 },
                            { "measurement": "ops_per_sec", "thread_level": "max", "mean_value": 1600.0 }
                        ]
                    }
                ]
            }
        }))
        .expect("invalid record fixture")
    }

    #[test]
    fn decodes_history_and_defaults_missing_thread_level() {
        let result: TestResult = serde_json::from_value(json!({
            "measurement": "latency",
            "mean_value": 3.5
        }))
        .expect("decode failed");
        assert_eq!(result.thread_level, "");

        let numeric: TestResult = serde_json::from_value(json!({
            "measurement": "latency",
            "thread_level": 16,
            "mean_value": null
        }))
        .expect("decode failed");
        assert_eq!(numeric.thread_level, "16");
        assert!(numeric.mean_value.is_none());
    }

    #[test]
    fn missing_required_field_fails_decode() {
        let err = serde_json::from_value::<PerformanceRecord>(json!({
            "revision": "abc",
            "create_time": "2026-09-02T00:00:00Z"
        }));
        assert!(err.is_err());
    }

    #[test]
    fn absent_descriptive_fields_decode_as_empty() {
        let history: Vec<PerformanceRecord> = serde_json::from_value(json!([{
            "order": 5,
            "create_time": "2026-09-02T00:00:00Z",
            "data": { "results": [
                { "results": [{ "measurement": "ops", "thread_level": "1", "mean_value": 1.0 }] },
                { "name": "T", "results": [{ "thread_level": "1", "mean_value": 2.0 }] }
            ]}
        }]))
        .expect("absent fields should decode");

        let record = &history[0];
        assert_eq!(record.revision, "");
        let runs = &record.test_batch.test_runs;
        assert_eq!(runs[0].test_name, "");
        assert_eq!(runs[0].test_results[0].measurement, "ops");
        assert_eq!(runs[1].test_name, "T");
        assert_eq!(runs[1].test_results[0].measurement, "");

        let mut table = MeasurementTable::new();
        let mut revisions = RevisionIndex::new();
        let written =
            record_performance_history(&task(), &history, cutoff(), &mut table, &mut revisions);
        assert_eq!(written, 2);
        assert_eq!(revisions.get(5), Some(""));
    }

    #[test]
    fn records_values_under_task_identity() {
        let mut table = MeasurementTable::new();
        let mut revisions = RevisionIndex::new();
        let history = vec![record(40, "abc", cutoff() + Duration::days(1))];

        let written =
            record_performance_history(&task(), &history, cutoff(), &mut table, &mut revisions);

        assert_eq!(written, 2);
        assert_eq!(revisions.get(40), Some("abc"));
        let entries = table.entries(40).expect("order 40 missing");
        let id = ResultIdentity::new(
            "sys-perf",
            "linux-standalone",
            "insert_remove",
            "InsertRemove.Insert",
            "ops_per_sec",
            "8",
        );
        assert_eq!(entries.get(&id), Some(&Some(1520.5)));
    }

    #[test]
    fn cutoff_excludes_only_strictly_older_records() {
        let mut table = MeasurementTable::new();
        let mut revisions = RevisionIndex::new();
        let history = vec![
            record(10, "old", cutoff() - Duration::seconds(1)),
            record(11, "edge", cutoff()),
        ];

        record_performance_history(&task(), &history, cutoff(), &mut table, &mut revisions);

        assert!(!table.contains_order(10));
        assert!(table.contains_order(11));
        assert!(revisions.get(10).is_none());
        assert_eq!(revisions.get(11), Some("edge"));
    }

    #[test]
    fn later_records_replace_revision_for_same_order() {
        let mut table = MeasurementTable::new();
        let mut revisions = RevisionIndex::new();
        let history = vec![
            record(12, "first", cutoff() + Duration::hours(1)),
            record(12, "second", cutoff() + Duration::hours(2)),
        ];

        record_performance_history(&task(), &history, cutoff(), &mut table, &mut revisions);

        assert_eq!(revisions.get(12), Some("second"));
        assert_eq!(table.value_count(), 2);
    }

    #[tokio::test]
    async fn client_hits_task_runner_endpoints() {
        let server = MockServer::start_async().await;
        let tasks_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v2/builds/build_1/tasks")
                    .header("api-user", "bob");
                then.status(200).json_body(json!([{
                    "task_id": "task_1",
                    "display_name": "insert_remove",
                    "project_id": "sys-perf",
                    "build_variant": "linux-standalone",
                    "status": "success",
                    "execution": 0
                }]));
            })
            .await;
        let perf_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/2/task/task_1/json/history/insert_remove/perf");
                then.status(200).json_body(json!([{
                    "order": 7,
                    "revision": "abc",
                    "create_time": "2026-09-02T00:00:00Z",
                    "data": { "results": [] }
                }]));
            })
            .await;

        let client = EvergreenClient::with_host(server.base_url(), &Credentials::new("bob", "k"))
            .expect("client");
        let tasks = client.tasks_by_build("build_1").await.expect("tasks");
        let history = client
            .performance_results_by_task_name("task_1", "insert_remove")
            .await
            .expect("history");

        tasks_mock.assert_async().await;
        perf_mock.assert_async().await;
        assert_eq!(tasks, vec![task()]);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].order, 7);
        assert!(history[0].test_batch.test_runs.is_empty());
    }

    #[tokio::test]
    async fn client_surfaces_task_lookup_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v2/tasks/nope");
                then.status(401).body("unauthorized");
            })
            .await;

        let client = EvergreenClient::with_host(server.base_url(), &Credentials::default())
            .expect("client");
        let err = client.task_by_id("nope").await.expect_err("401 should fail");
        assert!(format!("{err:#}").contains("401"));
    }
}
