mod categorize;
mod compare;
mod ground_truth;
mod history;
mod mapping;
mod metrics;
mod navigate;
mod report;
mod store;

pub use categorize::evaluate_case;
pub use compare::{DEFAULT_ABSOLUTE_TOLERANCE, DEFAULT_RELATIVE_TOLERANCE, NumericTolerance};
pub use ground_truth::load_ground_truth;
pub use history::{best_entry, history_trend};
pub use mapping::FieldMappingTable;
pub use metrics::aggregate_metrics;
pub use report::{
    DEFAULT_PAGE_SIZE, EvaluationReport, IterationResult, RESULT_VERSION, display_value,
    render_markdown,
};
pub use store::{IterationArtifacts, IterationStore};
