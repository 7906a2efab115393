use std::fmt::Write as _;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::metrics::ratio;
use crate::model::{Discrepancy, ErrorType, MetricsResult, SourceProvenance};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const RESULT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBreakdown {
    pub error_type: ErrorType,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub case_id: String,
    pub iteration_number: Option<u32>,
    pub generated_at: String,
    pub metrics: MetricsResult,
    pub breakdown: Vec<ErrorBreakdown>,
    pub discrepancies: Vec<Discrepancy>,
}

#[derive(Debug, Serialize)]
pub struct ReportPage<'a> {
    pub page_number: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub rows: &'a [Discrepancy],
}

impl EvaluationReport {
    pub fn build(
        case_id: &str,
        iteration_number: Option<u32>,
        generated_at: &str,
        metrics: MetricsResult,
        discrepancies: Vec<Discrepancy>,
    ) -> Self {
        let breakdown = build_breakdown(&metrics, discrepancies.len());
        Self {
            case_id: case_id.to_string(),
            iteration_number,
            generated_at: generated_at.to_string(),
            metrics,
            breakdown,
            discrepancies,
        }
    }

    pub fn page_count(&self, page_size: usize) -> usize {
        self.discrepancies.len().div_ceil(page_size.max(1)).max(1)
    }

    pub fn page(&self, page_number: usize, page_size: usize) -> ReportPage<'_> {
        let page_size = page_size.max(1);
        let total_rows = self.discrepancies.len();
        let start = page_number
            .saturating_sub(1)
            .saturating_mul(page_size)
            .min(total_rows);
        let end = if page_number == 0 {
            start
        } else {
            start.saturating_add(page_size).min(total_rows)
        };

        ReportPage {
            page_number,
            page_count: self.page_count(page_size),
            page_size,
            total_rows,
            rows: &self.discrepancies[start..end],
        }
    }
}

fn build_breakdown(metrics: &MetricsResult, discrepancy_count: usize) -> Vec<ErrorBreakdown> {
    ErrorType::ALL
        .iter()
        .map(|error_type| {
            let count = metrics.error_counts.get(*error_type);
            ErrorBreakdown {
                error_type: *error_type,
                count,
                percentage: ratio(count, discrepancy_count) * 100.0,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationResult {
    pub result_version: u32,
    pub timestamp: String,
    pub provenance: SourceProvenance,
    pub report: EvaluationReport,
}

pub fn render_markdown(report: &EvaluationReport, page_size: usize) -> Result<String> {
    let mut out = String::new();
    let metrics = &report.metrics;

    writeln!(out, "# Extraction evaluation: {}", report.case_id)?;
    writeln!(out)?;
    match report.iteration_number {
        Some(iteration) => writeln!(out, "- Iteration: {iteration}")?,
        None => writeln!(out, "- Iteration: (not persisted)")?,
    }
    writeln!(out, "- Generated at: {}", report.generated_at)?;
    writeln!(
        out,
        "- Reference fields: {} ({} correct)",
        metrics.total_reference_fields, metrics.correct_fields
    )?;
    writeln!(out)?;

    writeln!(out, "## Metrics")?;
    writeln!(out)?;
    writeln!(out, "| Metric | Value |")?;
    writeln!(out, "|---|---|")?;
    writeln!(out, "| Precision | {:.4} |", metrics.precision)?;
    writeln!(out, "| Recall | {:.4} |", metrics.recall)?;
    writeln!(out, "| F1 | {:.4} |", metrics.f1)?;
    writeln!(out, "| True positives | {} |", metrics.true_positives)?;
    writeln!(out, "| False positives | {} |", metrics.false_positives)?;
    writeln!(out, "| False negatives | {} |", metrics.false_negatives)?;
    writeln!(out)?;

    writeln!(out, "## Error breakdown")?;
    writeln!(out)?;
    writeln!(out, "| Error type | Count | Share |")?;
    writeln!(out, "|---|---|---|")?;
    for entry in &report.breakdown {
        writeln!(
            out,
            "| {} | {} | {:.1}% |",
            entry.error_type.as_str(),
            entry.count,
            entry.percentage
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Discrepancies")?;
    writeln!(out)?;
    if report.discrepancies.is_empty() {
        writeln!(out, "No discrepancies.")?;
        return Ok(out);
    }

    let page_count = report.page_count(page_size);
    for page_number in 1..=page_count {
        let page = report.page(page_number, page_size);
        writeln!(out, "### Page {page_number} of {page_count}")?;
        writeln!(out)?;
        writeln!(out, "| # | Field path | Field | Expected | Actual | Error type |")?;
        writeln!(out, "|---|---|---|---|---|---|")?;
        let offset = (page_number - 1) * page.page_size;
        for (index, row) in page.rows.iter().enumerate() {
            writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} |",
                offset + index + 1,
                escape_cell(&row.field_path),
                escape_cell(row.field_name.as_deref().unwrap_or("")),
                escape_cell(&display_value(row.expected.as_ref())),
                escape_cell(&display_value(row.actual.as_ref())),
                row.error_type.as_str(),
            )?;
        }
        writeln!(out)?;
    }

    Ok(out)
}

pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None => "(absent)".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
