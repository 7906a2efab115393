use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use super::evaluate::evaluate_one;
use crate::cli::EvaluateAllArgs;
use crate::context::EvalContext;
use crate::engine::aggregate_metrics;
use crate::model::{AggregateMetrics, MetricsResult};
use crate::util::now_utc_string;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseRun {
    Evaluated {
        case_id: String,
        iteration_number: Option<u32>,
        metrics: MetricsResult,
    },
    Skipped {
        case_id: String,
        reason: String,
    },
    Failed {
        case_id: String,
        error: String,
    },
}

impl CaseRun {
    pub fn case_id(&self) -> &str {
        match self {
            Self::Evaluated { case_id, .. }
            | Self::Skipped { case_id, .. }
            | Self::Failed { case_id, .. } => case_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub generated_at: String,
    pub evaluated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub aggregate: AggregateMetrics,
    pub cases: Vec<CaseRun>,
}

pub fn run(args: EvaluateAllArgs) -> Result<()> {
    let context = EvalContext::from_args(&args.context)?;
    let summary = evaluate_all(&context, !args.no_save, args.jobs)?;

    if args.json {
        write_json_summary(&summary)?;
    } else {
        write_text_summary(&summary)?;
    }

    if summary.failed > 0 {
        bail!("{} of {} case(s) failed", summary.failed, summary.cases.len());
    }
    Ok(())
}

pub fn evaluate_all(context: &EvalContext, persist: bool, jobs: Option<usize>) -> Result<BatchSummary> {
    let case_ids = context.discover_cases()?;
    info!(
        eval_root = %context.eval_root.display(),
        cases = case_ids.len(),
        "starting batch evaluation"
    );

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = jobs {
        pool = pool.num_threads(jobs);
    }
    let pool = pool
        .build()
        .context("failed to build evaluation thread pool")?;

    let cases = pool.install(|| {
        case_ids
            .par_iter()
            .map(|case_id| run_case(context, case_id, persist))
            .collect::<Vec<CaseRun>>()
    });

    let evaluated_metrics = cases
        .iter()
        .filter_map(|case| match case {
            CaseRun::Evaluated { metrics, .. } => Some(metrics.clone()),
            _ => None,
        })
        .collect::<Vec<MetricsResult>>();
    let aggregate = aggregate_metrics(&evaluated_metrics);
    let skipped = cases
        .iter()
        .filter(|case| matches!(case, CaseRun::Skipped { .. }))
        .count();
    let failed = cases
        .iter()
        .filter(|case| matches!(case, CaseRun::Failed { .. }))
        .count();

    info!(
        evaluated = evaluated_metrics.len(),
        skipped,
        failed,
        macro_f1 = aggregate.macro_average.f1,
        micro_f1 = aggregate.micro_average.f1,
        "batch evaluation complete"
    );

    Ok(BatchSummary {
        generated_at: now_utc_string(),
        evaluated: evaluated_metrics.len(),
        skipped,
        failed,
        aggregate,
        cases,
    })
}

fn run_case(context: &EvalContext, case_id: &str, persist: bool) -> CaseRun {
    let extraction_available = context
        .extraction_path(case_id)
        .map(|path| path.is_file())
        .unwrap_or(false);
    if !extraction_available {
        warn!(case_id, "no extraction document; skipping case");
        return CaseRun::Skipped {
            case_id: case_id.to_string(),
            reason: format!("missing {}", context.extraction_file),
        };
    }

    match evaluate_one(context, case_id, persist) {
        Ok(outcome) => CaseRun::Evaluated {
            case_id: outcome.case_id,
            iteration_number: outcome.report.iteration_number,
            metrics: outcome.report.metrics,
        },
        Err(err) => {
            error!(case_id, error = %format!("{err:#}"), "case evaluation failed");
            CaseRun::Failed {
                case_id: case_id.to_string(),
                error: format!("{err:#}"),
            }
        }
    }
}

fn write_json_summary(summary: &BatchSummary) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, summary)
        .context("failed to serialize batch json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_summary(summary: &BatchSummary) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    for case in &summary.cases {
        match case {
            CaseRun::Evaluated {
                iteration_number,
                metrics,
                ..
            } => writeln!(
                output,
                "{}\titeration={}\tprecision={:.4}\trecall={:.4}\tf1={:.4}",
                case.case_id(),
                iteration_number
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                metrics.precision,
                metrics.recall,
                metrics.f1
            )?,
            CaseRun::Skipped { reason, .. } => {
                writeln!(output, "{}\tskipped: {reason}", case.case_id())?
            }
            CaseRun::Failed { error, .. } => writeln!(output, "{}\tfailed: {error}", case.case_id())?,
        }
    }

    let aggregate = &summary.aggregate;
    writeln!(
        output,
        "Cases: evaluated={} skipped={} failed={}",
        summary.evaluated, summary.skipped, summary.failed
    )?;
    writeln!(
        output,
        "Macro: precision={:.4} recall={:.4} f1={:.4}",
        aggregate.macro_average.precision, aggregate.macro_average.recall, aggregate.macro_average.f1
    )?;
    writeln!(
        output,
        "Micro: precision={:.4} recall={:.4} f1={:.4} (tp={} fp={} fn={})",
        aggregate.micro_average.precision,
        aggregate.micro_average.recall,
        aggregate.micro_average.f1,
        aggregate.micro_average.true_positives,
        aggregate.micro_average.false_positives,
        aggregate.micro_average.false_negatives,
    )?;

    output.flush()?;
    Ok(())
}
