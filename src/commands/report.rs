use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::cli::ReportArgs;
use crate::context::EvalContext;
use crate::engine::display_value;
use crate::model::Discrepancy;

#[derive(Debug, Serialize)]
struct ReportPageResponse<'a> {
    case_id: &'a str,
    iteration_number: u32,
    generated_at: &'a str,
    page_number: usize,
    page_count: usize,
    page_size: usize,
    total_rows: usize,
    rows: &'a [Discrepancy],
}

pub fn run(args: ReportArgs) -> Result<()> {
    let context = EvalContext::from_args(&args.context)?;
    let iteration_number = match args.iteration {
        Some(iteration) => iteration,
        None => match context.store.existing_iterations(&args.case_id)?.last() {
            Some(latest) => *latest,
            None => bail!("no iterations stored for case {}", args.case_id),
        },
    };

    let result = context.store.load_iteration(&args.case_id, iteration_number)?;
    let report = &result.report;
    let page = report.page(args.page, context.page_size);

    let response = ReportPageResponse {
        case_id: &report.case_id,
        iteration_number,
        generated_at: &report.generated_at,
        page_number: page.page_number,
        page_count: page.page_count,
        page_size: page.page_size,
        total_rows: page.total_rows,
        rows: page.rows,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &response)
            .context("failed to serialize report json output")?;
        writeln!(output)?;
        output.flush()?;
        return Ok(());
    }

    writeln!(
        output,
        "Case: {} iteration {} ({})",
        response.case_id, response.iteration_number, response.generated_at
    )?;
    writeln!(
        output,
        "Metrics: precision={:.4} recall={:.4} f1={:.4}",
        report.metrics.precision, report.metrics.recall, report.metrics.f1
    )?;
    writeln!(
        output,
        "Page {} of {} ({} discrepancies, {} per page)",
        response.page_number, response.page_count, response.total_rows, response.page_size
    )?;

    let offset = response.page_number.saturating_sub(1) * response.page_size;
    for (index, row) in response.rows.iter().enumerate() {
        writeln!(
            output,
            "{}.\t{}\t{}",
            offset + index + 1,
            row.error_type.as_str(),
            row.field_path
        )?;
        writeln!(output, "\texpected: {}", display_value(row.expected.as_ref()))?;
        writeln!(output, "\tactual: {}", display_value(row.actual.as_ref()))?;
        if let Some(detail) = &row.detail {
            writeln!(output, "\tdetail: {detail}")?;
        }
    }

    output.flush()?;
    Ok(())
}
