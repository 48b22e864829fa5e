use crate::identity::Order;
use crate::measurements::{MeasurementTable, RevisionIndex};
use crate::reconcile::{Finding, Reconciliation, Summary};

pub const RULE_WIDTH: usize = 80;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn format_value(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "null".to_string())
}

/// Banner report: one block per finding, then the tally.
pub fn render_text_report(
    result: &Reconciliation,
    task_runner: &MeasurementTable,
    revisions: &RevisionIndex,
) -> String {
    let mut out = format!("{}\nDiffs\n{}\n", rule(), rule());

    for finding in &result.findings {
        out.push_str(&render_finding(finding, task_runner, revisions));
    }

    out.push_str(&render_summary(&result.summary));
    out
}

pub fn render_finding(
    finding: &Finding,
    task_runner: &MeasurementTable,
    revisions: &RevisionIndex,
) -> String {
    match finding {
        Finding::MissingOrder { order } => {
            let mut out = format!(
                "!!!! No rollup results for order: {order}, {} !!!!\n",
                revisions.resolve(*order)
            );
            out.push_str(&render_order_dump(*order, task_runner));
            out
        }
        Finding::MissingResult { order, identity } => format!(
            "#### No rollup result for result {order} {}: {identity} ####\n",
            revisions.resolve(*order)
        ),
        Finding::Mismatched {
            order,
            identity,
            task_runner,
            rollup,
        } => format!(
            "$$$$ Mismatch result {order}, task_runner={} =/= rollup={} $$$$\n{identity}\n",
            format_value(*task_runner),
            format_value(*rollup)
        ),
    }
}

fn render_order_dump(order: Order, task_runner: &MeasurementTable) -> String {
    let mut out = String::new();
    let Some(entries) = task_runner.entries(order) else {
        return out;
    };
    for (identity, value) in entries {
        out.push_str(&format!("  {identity}: {}\n", format_value(*value)));
    }
    out
}

pub fn render_summary(summary: &Summary) -> String {
    format!(
        "{}\nCorrect: {}\nMissing Order: {}\nMissing Result: {}\nIncorrect result: {}\n",
        rule(),
        summary.correct,
        summary.missing_order,
        summary.missing_result,
        summary.mismatched
    )
}
