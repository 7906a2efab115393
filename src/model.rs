use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    Numeric,
    String,
    Boolean,
}

impl DeclaredType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Omission,
    Hallucination,
    FormatError,
    WrongValue,
}

impl ErrorType {
    pub const ALL: [ErrorType; 4] = [
        Self::Omission,
        Self::Hallucination,
        Self::FormatError,
        Self::WrongValue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Omission => "omission",
            Self::Hallucination => "hallucination",
            Self::FormatError => "format_error",
            Self::WrongValue => "wrong_value",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceField {
    pub field_name: String,
    pub field_path: String,
    pub expected_value: Value,
    pub declared_type: DeclaredType,
    pub source_line: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmappedField {
    pub field_name: String,
    pub raw_value: String,
    pub source_line: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub field_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// `None` means not present at all; `Some(Value::Null)` is an explicit null.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub expected: Option<Value>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub actual: Option<Value>,
    pub error_type: ErrorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// A present key always yields `Some`, even when its value is `null`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub omission: usize,
    pub hallucination: usize,
    pub format_error: usize,
    pub wrong_value: usize,
}

impl ErrorCounts {
    pub fn from_discrepancies(discrepancies: &[Discrepancy]) -> Self {
        let mut counts = Self::default();
        for discrepancy in discrepancies {
            counts.increment(discrepancy.error_type);
        }
        counts
    }

    pub fn increment(&mut self, error_type: ErrorType) {
        match error_type {
            ErrorType::Omission => self.omission += 1,
            ErrorType::Hallucination => self.hallucination += 1,
            ErrorType::FormatError => self.format_error += 1,
            ErrorType::WrongValue => self.wrong_value += 1,
        }
    }

    pub fn get(&self, error_type: ErrorType) -> usize {
        match error_type {
            ErrorType::Omission => self.omission,
            ErrorType::Hallucination => self.hallucination,
            ErrorType::FormatError => self.format_error,
            ErrorType::WrongValue => self.wrong_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub total_reference_fields: usize,
    pub correct_fields: usize,
    pub error_counts: ErrorCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroAverage {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MicroAverage {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub case_count: usize,
    pub macro_average: MacroAverage,
    pub micro_average: MicroAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub iteration_number: u32,
    pub timestamp: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub error_counts: ErrorCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryTrend {
    pub entry_count: usize,
    pub best_iteration: u32,
    pub best_f1: f64,
    pub latest_iteration: u32,
    pub latest_f1: f64,
    pub delta_from_previous: Option<f64>,
    pub monotonic_improvement: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceProvenance {
    pub ground_truth_path: String,
    pub ground_truth_sha256: String,
    pub extraction_path: String,
    pub extraction_sha256: String,
    pub mapping_path: String,
    pub mapping_version: u32,
}
