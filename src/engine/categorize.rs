use serde_json::Value;
use tracing::trace;

use super::compare::{NumericTolerance, coerce_bool, compare};
use super::ground_truth::GroundTruth;
use super::mapping::FieldMappingTable;
use super::metrics::compute_metrics;
use super::navigate::{flatten, is_covered_by, navigate, split_path};
use crate::model::{DeclaredType, Discrepancy, ErrorType, MetricsResult};

pub const UNMAPPED_FIELD_DETAIL: &str = "no mapping entry for reference field";

/// `None` means matched. Order is fixed: omission, hallucination, format error,
/// wrong value; an extracted `null` counts as not extracted.
pub fn categorize(
    field_path: &str,
    expected: Option<&Value>,
    actual: Option<&Value>,
    declared_type: DeclaredType,
    tolerance: &NumericTolerance,
) -> Option<ErrorType> {
    let actual = actual.filter(|value| !value.is_null());

    let outcome = match (expected, actual) {
        (Some(expected), None) if !expected.is_null() => Some(ErrorType::Omission),
        (None, Some(_)) => Some(ErrorType::Hallucination),
        (_, None) => None,
        (Some(expected), Some(actual)) => {
            if !is_type_compatible(actual, declared_type) {
                Some(ErrorType::FormatError)
            } else if compare(expected, actual, declared_type, tolerance).is_match() {
                None
            } else {
                Some(ErrorType::WrongValue)
            }
        }
    };

    trace!(
        field_path,
        declared_type = declared_type.as_str(),
        outcome = outcome.map(ErrorType::as_str).unwrap_or("match"),
        "categorized field"
    );
    outcome
}

pub fn is_type_compatible(actual: &Value, declared_type: DeclaredType) -> bool {
    match declared_type {
        DeclaredType::Numeric => matches!(actual, Value::Number(_) | Value::Bool(_)),
        DeclaredType::String => actual.is_string(),
        DeclaredType::Boolean => coerce_bool(actual).is_some(),
    }
}

fn inferred_type(value: &Value) -> DeclaredType {
    match value {
        Value::Number(_) => DeclaredType::Numeric,
        Value::Bool(_) => DeclaredType::Boolean,
        _ => DeclaredType::String,
    }
}

#[derive(Debug, Clone)]
pub struct CaseEvaluation {
    pub discrepancies: Vec<Discrepancy>,
    pub metrics: MetricsResult,
}

pub fn evaluate_case(
    ground_truth: &GroundTruth,
    document: &Value,
    table: &FieldMappingTable,
    tolerance: &NumericTolerance,
) -> CaseEvaluation {
    let mut discrepancies = Vec::new();
    let mut reference_paths = Vec::with_capacity(ground_truth.fields.len());

    for field in &ground_truth.fields {
        reference_paths.push(split_path(&field.field_path));
        let actual = navigate(document, &field.field_path);
        if let Some(error_type) = categorize(
            &field.field_path,
            Some(&field.expected_value),
            actual,
            field.declared_type,
            tolerance,
        ) {
            discrepancies.push(Discrepancy {
                field_path: field.field_path.clone(),
                field_name: Some(field.field_name.clone()),
                expected: Some(field.expected_value.clone()),
                actual: actual.cloned(),
                error_type,
                detail: None,
            });
        }
    }

    for unmapped in &ground_truth.unmapped {
        let expected = if unmapped.raw_value.is_empty() {
            Value::Null
        } else {
            Value::String(unmapped.raw_value.clone())
        };
        discrepancies.push(Discrepancy {
            field_path: unmapped.field_name.clone(),
            field_name: Some(unmapped.field_name.clone()),
            expected: Some(expected),
            actual: None,
            error_type: ErrorType::FormatError,
            detail: Some(UNMAPPED_FIELD_DETAIL.to_string()),
        });
    }

    for leaf in flatten(document) {
        if is_covered_by(&leaf.segments, &reference_paths) {
            continue;
        }
        let path = leaf.path();
        let entry = if leaf.is_addressable() {
            table.entry_for_path(&path)
        } else {
            None
        };
        let declared_type = entry
            .map(|entry| entry.declared_type)
            .unwrap_or_else(|| inferred_type(leaf.value));
        if let Some(error_type) = categorize(&path, None, Some(leaf.value), declared_type, tolerance)
        {
            discrepancies.push(Discrepancy {
                field_name: entry.map(|entry| entry.reference_field_name.clone()),
                field_path: path,
                expected: None,
                actual: Some(leaf.value.clone()),
                error_type,
                detail: None,
            });
        }
    }

    let metrics = compute_metrics(&discrepancies, ground_truth.total_reference_fields());
    CaseEvaluation {
        discrepancies,
        metrics,
    }
}
