use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use crate::cli::HistoryArgs;
use crate::context::EvalContext;
use crate::engine::{best_entry, history_trend};
use crate::model::{HistoryEntry, HistoryTrend};

#[derive(Debug, Serialize)]
struct HistoryResponse {
    case_id: String,
    entries: Vec<HistoryEntry>,
    best: Option<HistoryEntry>,
    trend: Option<HistoryTrend>,
}

pub fn run(args: HistoryArgs) -> Result<()> {
    let context = EvalContext::from_args(&args.context)?;
    let entries = context.store.history(&args.case_id)?;
    if entries.is_empty() {
        warn!(case_id = %args.case_id, "no history recorded for case");
    }

    let response = HistoryResponse {
        case_id: args.case_id.clone(),
        best: best_entry(&entries).cloned(),
        trend: history_trend(&entries),
        entries,
    };

    if args.json {
        let mut output = io::BufWriter::new(io::stdout().lock());
        serde_json::to_writer_pretty(&mut output, &response)
            .context("failed to serialize history json output")?;
        writeln!(output)?;
        output.flush()?;
        return Ok(());
    }

    write_text_history(&response)
}

fn write_text_history(response: &HistoryResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Case: {}", response.case_id)?;
    writeln!(output, "Iterations: {}", response.entries.len())?;
    for entry in &response.entries {
        let counts = &entry.error_counts;
        let marker = match &response.best {
            Some(best) if best.iteration_number == entry.iteration_number => " *",
            _ => "",
        };
        writeln!(
            output,
            "{:>4}\t{}\tprecision={:.4}\trecall={:.4}\tf1={:.4}\tomission={} hallucination={} format_error={} wrong_value={}{marker}",
            entry.iteration_number,
            entry.timestamp,
            entry.precision,
            entry.recall,
            entry.f1,
            counts.omission,
            counts.hallucination,
            counts.format_error,
            counts.wrong_value,
        )?;
    }

    if let Some(trend) = &response.trend {
        writeln!(
            output,
            "Best: iteration {} (f1={:.4})",
            trend.best_iteration, trend.best_f1
        )?;
        writeln!(
            output,
            "Latest: iteration {} (f1={:.4})",
            trend.latest_iteration, trend.latest_f1
        )?;
        if let Some(delta) = trend.delta_from_previous {
            writeln!(output, "Delta from previous: {delta:+.4}")?;
        }
        writeln!(output, "Monotonic improvement: {}", trend.monotonic_improvement)?;
    }

    output.flush()?;
    Ok(())
}
