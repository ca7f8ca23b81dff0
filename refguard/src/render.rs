// refguard/src/render.rs
//
// Terminal tables (comfy-table). JSON output goes through commands::emit_json instead.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use refguard_core::application::{BatchOutcome, Report};
use refguard_core::domain::dataset::canonical_text;
use refguard_core::domain::expectations::ExpectationResult;
use refguard_core::domain::rules::ResolvedRuleSet;
use refguard_core::domain::run::{RunSummary, ValidationRunResult};
use refguard_core::infrastructure::config::RuleFileReport;

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn status(success: bool) -> Cell {
    if success {
        Cell::new("PASS").fg(Color::Green)
    } else {
        Cell::new("FAIL").fg(Color::Red)
    }
}

fn pct(value: f64) -> String {
    format!("{:.1}%", value)
}

pub fn rules_table(resolved: &ResolvedRuleSet) -> Table {
    let mut t = table(vec!["#", "Column", "Type", "Level", "Source", "Parameters"]);
    for (i, (rule, provenance)) in resolved.iter().enumerate() {
        let params = rule
            .parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, canonical_text(v)))
            .collect::<Vec<_>>()
            .join(", ");
        t.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&rule.column),
            Cell::new(&rule.rule_type),
            Cell::new(provenance.rule_level),
            Cell::new(&provenance.rule_source),
            Cell::new(params),
        ]);
    }
    t
}

/// Short explanation of a result: the rule error, or the most frequent offending values.
fn note(result: &ExpectationResult) -> String {
    if let Some(error) = &result.result_details.rule_error {
        return format!("rule error: {}", error);
    }
    result
        .result_details
        .partial_unexpected_counts
        .iter()
        .take(3)
        .map(|c| format!("{} ×{}", canonical_text(&c.value), c.count))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn results_table(result: &ValidationRunResult) -> Table {
    let mut t = table(vec![
        "Status",
        "Column",
        "Expectation",
        "Elements",
        "Unexpected",
        "Unexpected %",
        "Missing %",
        "Sample",
    ]);
    for r in result.failed_first() {
        t.add_row(vec![
            status(r.success),
            Cell::new(&r.column_name),
            Cell::new(&r.expectation_type),
            Cell::new(r.element_count),
            Cell::new(r.unexpected_count),
            Cell::new(pct(r.unexpected_percent)),
            Cell::new(pct(r.missing_percent)),
            Cell::new(note(r)),
        ]);
    }
    t
}

pub fn batch_table(outcomes: &[BatchOutcome]) -> Table {
    let mut t = table(vec![
        "Status", "Region", "Product", "Exchange", "Passed", "Total", "Run",
    ]);
    for o in outcomes {
        let target = &o.target;
        match &o.outcome {
            Ok(run) => t.add_row(vec![
                status(run.success),
                Cell::new(&target.region),
                Cell::new(&target.product_type),
                Cell::new(&target.exchange),
                Cell::new(run.successful_expectations),
                Cell::new(run.total_expectations),
                Cell::new(&run.run_id),
            ]),
            Err(e) => t.add_row(vec![
                Cell::new("ERROR").fg(Color::Yellow),
                Cell::new(&target.region),
                Cell::new(&target.product_type),
                Cell::new(&target.exchange),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(e),
            ]),
        };
    }
    t
}

pub fn report_table(report: &Report) -> Table {
    let mut t = table(vec!["Key", "Runs", "Successful", "Failed", "Total", "Success rate"]);
    for row in report.rows.iter().chain(std::iter::once(&report.overall)) {
        t.add_row(vec![
            Cell::new(&row.key),
            Cell::new(row.runs),
            Cell::new(row.successful),
            Cell::new(row.failed),
            Cell::new(row.total),
            Cell::new(pct(row.success_rate)),
        ]);
    }
    t
}

pub fn check_table(reports: &[RuleFileReport]) -> Table {
    let mut t = table(vec!["Status", "File", "Level", "Rules", "Error"]);
    for r in reports {
        let level = r
            .level
            .map(|l| l.to_string())
            .unwrap_or_else(|| "outside layout".to_string());
        t.add_row(vec![
            status(r.is_ok()),
            Cell::new(&r.path),
            Cell::new(level),
            Cell::new(r.rules),
            Cell::new(r.error.as_deref().unwrap_or("")),
        ]);
    }
    t
}

pub fn runs_table(runs: &[RunSummary]) -> Table {
    let mut t = table(vec![
        "Status", "Run", "Timestamp", "Region", "Product", "Exchange", "Passed", "Total", "ms",
    ]);
    for run in runs {
        t.add_row(vec![
            status(run.success),
            Cell::new(&run.run_id),
            Cell::new(run.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&run.region),
            Cell::new(&run.product_type),
            Cell::new(&run.exchange),
            Cell::new(run.successful_expectations),
            Cell::new(run.total_expectations),
            Cell::new(run.execution_duration_ms),
        ]);
    }
    t
}
