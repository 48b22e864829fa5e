use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::measurements::RevisionIndex;
use crate::output::text::{format_value, render_summary};
use crate::reconcile::{Finding, Reconciliation};

pub fn render_findings_table(result: &Reconciliation, revisions: &RevisionIndex) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Outcome",
        "Order",
        "Revision",
        "Test",
        "Metric",
        "Threads",
        "Task runner",
        "Rollup",
    ]);

    for finding in &result.findings {
        let order = finding.order();
        let revision = revisions.resolve(order).to_string();
        let row = match finding {
            Finding::MissingOrder { .. } => vec![
                Cell::new("MISSING ORDER").fg(Color::Red),
                Cell::new(order),
                Cell::new(revision),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
            ],
            Finding::MissingResult { identity, .. } => vec![
                Cell::new("MISSING RESULT").fg(Color::Yellow),
                Cell::new(order),
                Cell::new(revision),
                Cell::new(&identity.test_name),
                Cell::new(&identity.metric),
                Cell::new(&identity.thread_level),
                Cell::new("-"),
                Cell::new("-"),
            ],
            Finding::Mismatched {
                identity,
                task_runner,
                rollup,
                ..
            } => vec![
                Cell::new("MISMATCH").fg(Color::Magenta),
                Cell::new(order),
                Cell::new(revision),
                Cell::new(&identity.test_name),
                Cell::new(&identity.metric),
                Cell::new(&identity.thread_level),
                Cell::new(format_value(*task_runner)),
                Cell::new(format_value(*rollup)),
            ],
        };
        table.add_row(Row::from(row));
    }

    let mut out = table.to_string();
    out.push('\n');
    out.push_str(&render_summary(&result.summary));
    out
}
