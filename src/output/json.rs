use anyhow::Result;
use serde::Serialize;

use crate::identity::Order;
use crate::measurements::RevisionIndex;
use crate::reconcile::{Finding, Reconciliation, Summary};

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub floor: Order,
    pub summary: Summary,
    pub findings: Vec<JsonFinding<'a>>,
}

#[derive(Debug, Serialize)]
pub struct JsonFinding<'a> {
    pub revision: &'a str,
    #[serde(flatten)]
    pub finding: &'a Finding,
}

pub fn json_report<'a>(result: &'a Reconciliation, revisions: &'a RevisionIndex) -> JsonReport<'a> {
    JsonReport {
        floor: result.floor,
        summary: result.summary,
        findings: result
            .findings
            .iter()
            .map(|finding| JsonFinding {
                revision: revisions.resolve(finding.order()),
                finding,
            })
            .collect(),
    }
}
