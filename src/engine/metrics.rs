use crate::model::{
    AggregateMetrics, Discrepancy, ErrorCounts, MacroAverage, MetricsResult, MicroAverage,
};

pub fn compute_metrics(discrepancies: &[Discrepancy], total_reference_fields: usize) -> MetricsResult {
    let error_counts = ErrorCounts::from_discrepancies(discrepancies);
    metrics_from_counts(error_counts, total_reference_fields)
}

pub fn metrics_from_counts(error_counts: ErrorCounts, total_reference_fields: usize) -> MetricsResult {
    // Clamped for hand-built inputs; a consistent discrepancy list never goes negative.
    let true_positives = total_reference_fields.saturating_sub(
        error_counts.omission + error_counts.format_error + error_counts.wrong_value,
    );
    let false_positives =
        error_counts.hallucination + error_counts.format_error + error_counts.wrong_value;
    let false_negatives = error_counts.omission;
    let (precision, recall, f1) = precision_recall_f1(true_positives, false_positives, false_negatives);

    MetricsResult {
        true_positives,
        false_positives,
        false_negatives,
        precision,
        recall,
        f1,
        total_reference_fields,
        correct_fields: true_positives,
        error_counts,
    }
}

pub fn precision_recall_f1(
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
) -> (f64, f64, f64) {
    let precision = ratio(true_positives, true_positives + false_positives);
    let recall = ratio(true_positives, true_positives + false_negatives);
    (precision, recall, harmonic_mean(precision, recall))
}

pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

pub fn aggregate_metrics(results: &[MetricsResult]) -> AggregateMetrics {
    if results.is_empty() {
        return AggregateMetrics::default();
    }

    let case_count = results.len() as f64;
    let macro_average = MacroAverage {
        precision: results.iter().map(|m| m.precision).sum::<f64>() / case_count,
        recall: results.iter().map(|m| m.recall).sum::<f64>() / case_count,
        f1: results.iter().map(|m| m.f1).sum::<f64>() / case_count,
    };

    let true_positives = results.iter().map(|m| m.true_positives).sum();
    let false_positives = results.iter().map(|m| m.false_positives).sum();
    let false_negatives = results.iter().map(|m| m.false_negatives).sum();
    let (precision, recall, f1) = precision_recall_f1(true_positives, false_positives, false_negatives);

    AggregateMetrics {
        case_count: results.len(),
        macro_average,
        micro_average: MicroAverage {
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
        },
    }
}
