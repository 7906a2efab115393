use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::context::{DEFAULT_EXTRACTION_FILE, DEFAULT_GROUND_TRUTH_FILE};
use crate::engine::{DEFAULT_ABSOLUTE_TOLERANCE, DEFAULT_PAGE_SIZE, DEFAULT_RELATIVE_TOLERANCE};

#[derive(Parser, Debug)]
#[command(
    name = "extract-eval",
    version,
    about = "Score structured extractions against ground-truth records and track iterations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Evaluate(EvaluateArgs),
    EvaluateAll(EvaluateAllArgs),
    History(HistoryArgs),
    Report(ReportArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ContextArgs {
    #[arg(long, default_value = "evals")]
    pub eval_root: PathBuf,

    #[arg(long)]
    pub mapping_path: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_GROUND_TRUTH_FILE)]
    pub ground_truth_file: String,

    #[arg(long, default_value = DEFAULT_EXTRACTION_FILE)]
    pub extraction_file: String,

    #[arg(long, default_value_t = DEFAULT_RELATIVE_TOLERANCE)]
    pub relative_tolerance: f64,

    #[arg(long, default_value_t = DEFAULT_ABSOLUTE_TOLERANCE)]
    pub absolute_tolerance: f64,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    #[arg(long)]
    pub case_id: String,

    #[arg(long, default_value_t = false)]
    pub no_save: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateAllArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    #[arg(long, default_value_t = false)]
    pub no_save: bool,

    #[arg(long)]
    pub jobs: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    #[arg(long)]
    pub case_id: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    #[arg(long)]
    pub case_id: String,

    #[arg(long)]
    pub iteration: Option<u32>,

    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub context: ContextArgs,
}
