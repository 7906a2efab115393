use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::EvaluateArgs;
use crate::context::EvalContext;
use crate::engine::{
    EvaluationReport, IterationArtifacts, IterationResult, RESULT_VERSION, evaluate_case,
    load_ground_truth, render_markdown,
};
use crate::model::SourceProvenance;
use crate::util::{now_utc_string, read_json, sha256_file};

#[derive(Debug, Serialize)]
pub struct CaseOutcome {
    pub case_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_dir: Option<String>,
    pub report: EvaluationReport,
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let context = EvalContext::from_args(&args.context)?;
    let outcome = evaluate_one(&context, &args.case_id, !args.no_save)?;
    if let Some(iteration) = outcome.report.iteration_number {
        if let Some(best) = context.store.best(&args.case_id)? {
            info!(
                case_id = %args.case_id,
                iteration,
                best_iteration = best.iteration_number,
                best_f1 = best.f1,
                "best iteration so far"
            );
        }
    }

    if args.json {
        write_json_outcome(&outcome)
    } else {
        write_text_outcome(&outcome)
    }
}

pub fn evaluate_one(context: &EvalContext, case_id: &str, persist: bool) -> Result<CaseOutcome> {
    let ground_truth_path = context.ground_truth_path(case_id)?;
    let extraction_path = context.extraction_path(case_id)?;

    if !extraction_path.is_file() {
        bail!(
            "no extraction document for case {case_id}: {}",
            extraction_path.display()
        );
    }

    let ground_truth = load_ground_truth(&ground_truth_path, &context.mapping)
        .with_context(|| format!("failed to load ground truth for case {case_id}"))?;
    for unmapped in &ground_truth.unmapped {
        warn!(
            case_id,
            field = %unmapped.field_name,
            line = unmapped.source_line,
            "reference field has no mapping entry; recorded as format error"
        );
    }

    let document: Value = read_json(&extraction_path)
        .with_context(|| format!("failed to load extraction document for case {case_id}"))?;

    let evaluation = evaluate_case(&ground_truth, &document, &context.mapping, &context.tolerance);
    let timestamp = now_utc_string();
    let metrics = evaluation.metrics.clone();

    info!(
        case_id,
        reference_fields = metrics.total_reference_fields,
        discrepancies = evaluation.discrepancies.len(),
        precision = metrics.precision,
        recall = metrics.recall,
        f1 = metrics.f1,
        "evaluated case"
    );

    if !persist {
        return Ok(CaseOutcome {
            case_id: case_id.to_string(),
            iteration_dir: None,
            report: EvaluationReport::build(
                case_id,
                None,
                &timestamp,
                evaluation.metrics,
                evaluation.discrepancies,
            ),
        });
    }

    let provenance = SourceProvenance {
        ground_truth_path: ground_truth_path.display().to_string(),
        ground_truth_sha256: sha256_file(&ground_truth_path)?,
        extraction_path: extraction_path.display().to_string(),
        extraction_sha256: sha256_file(&extraction_path)?,
        mapping_path: context.mapping_path.display().to_string(),
        mapping_version: context.mapping.version(),
    };

    let iteration_number = context.store.next_iteration_number(case_id)?;
    let report = EvaluationReport::build(
        case_id,
        Some(iteration_number),
        &timestamp,
        evaluation.metrics,
        evaluation.discrepancies,
    );
    let report_markdown = render_markdown(&report, context.page_size)?;
    let result = IterationResult {
        result_version: RESULT_VERSION,
        timestamp: timestamp.clone(),
        provenance,
        report,
    };

    let written = context.store.save(
        case_id,
        iteration_number,
        &IterationArtifacts {
            extraction_document: &document,
            result: &result,
            report_markdown: &report_markdown,
        },
    )?;
    context
        .store
        .append_history(case_id, written.iteration_number, &timestamp, &metrics)
        .with_context(|| {
            format!(
                "iteration {} was written to {} but has no history entry",
                written.iteration_number,
                written.directory.display()
            )
        })?;

    Ok(CaseOutcome {
        case_id: case_id.to_string(),
        iteration_dir: Some(written.directory.display().to_string()),
        report: result.report,
    })
}

fn write_json_outcome(outcome: &CaseOutcome) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, outcome)
        .context("failed to serialize evaluation json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_outcome(outcome: &CaseOutcome) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    let report = &outcome.report;
    let metrics = &report.metrics;

    writeln!(output, "Case: {}", outcome.case_id)?;
    match (report.iteration_number, &outcome.iteration_dir) {
        (Some(iteration), Some(dir)) => writeln!(output, "Iteration: {iteration} ({dir})")?,
        _ => writeln!(output, "Iteration: not persisted")?,
    }
    writeln!(
        output,
        "Metrics: precision={:.4} recall={:.4} f1={:.4}",
        metrics.precision, metrics.recall, metrics.f1
    )?;
    writeln!(
        output,
        "Counts: reference_fields={} correct={} tp={} fp={} fn={}",
        metrics.total_reference_fields,
        metrics.correct_fields,
        metrics.true_positives,
        metrics.false_positives,
        metrics.false_negatives,
    )?;
    for entry in &report.breakdown {
        writeln!(
            output,
            "\t{}: {} ({:.1}%)",
            entry.error_type.as_str(),
            entry.count,
            entry.percentage
        )?;
    }

    output.flush()?;
    Ok(())
}
