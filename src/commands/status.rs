use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::context::EvalContext;

pub fn run(args: StatusArgs) -> Result<()> {
    let context = EvalContext::from_args(&args.context)?;

    info!(
        eval_root = %context.eval_root.display(),
        mapping = %context.mapping_path.display(),
        mapping_version = context.mapping.version(),
        mapping_fields = context.mapping.len(),
        "status requested"
    );

    let case_ids = context.discover_cases()?;
    if case_ids.is_empty() {
        warn!(eval_root = %context.eval_root.display(), "no evaluation cases found");
        return Ok(());
    }

    for case_id in &case_ids {
        let has_extraction = context.extraction_path(case_id)?.is_file();
        let iterations = context.store.existing_iterations(case_id)?;
        if !has_extraction {
            warn!(case_id = %case_id, "extraction document missing");
        }
        let unrecorded = context.store.unrecorded_iterations(case_id)?;
        if !unrecorded.is_empty() {
            warn!(
                case_id = %case_id,
                iterations = ?unrecorded,
                "iterations written without a history entry"
            );
        }

        match context.store.trend(case_id)? {
            Some(trend) => info!(
                case_id = %case_id,
                has_extraction,
                iterations = iterations.len(),
                latest_iteration = trend.latest_iteration,
                latest_f1 = trend.latest_f1,
                best_iteration = trend.best_iteration,
                best_f1 = trend.best_f1,
                improving = trend.monotonic_improvement,
                "case status"
            ),
            None => info!(
                case_id = %case_id,
                has_extraction,
                iterations = iterations.len(),
                "case status: no history yet"
            ),
        }
    }

    Ok(())
}
