use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::DeclaredType;

pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 0.005;
pub const DEFAULT_ABSOLUTE_TOLERANCE: f64 = 0.01;

// Keeps decimal boundaries such as 1.00 vs 1.01 inclusive under binary floats.
const FLOAT_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericTolerance {
    pub relative: f64,
    pub absolute: f64,
}

impl Default for NumericTolerance {
    fn default() -> Self {
        Self {
            relative: DEFAULT_RELATIVE_TOLERANCE,
            absolute: DEFAULT_ABSOLUTE_TOLERANCE,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Comparison {
    Matched,
    Mismatched,
}

impl Comparison {
    pub fn is_match(self) -> bool {
        self == Self::Matched
    }

    fn from_bool(matched: bool) -> Self {
        if matched { Self::Matched } else { Self::Mismatched }
    }
}

pub fn compare(
    expected: &Value,
    actual: &Value,
    declared_type: DeclaredType,
    tolerance: &NumericTolerance,
) -> Comparison {
    if expected.is_null() || actual.is_null() {
        return Comparison::from_bool(expected.is_null() && actual.is_null());
    }

    let matched = match declared_type {
        DeclaredType::Numeric => match (coerce_number(expected), coerce_number(actual)) {
            (Some(expected), Some(actual)) => numbers_match(expected, actual, tolerance),
            _ => false,
        },
        DeclaredType::String => match (expected.as_str(), actual.as_str()) {
            (Some(expected), Some(actual)) => normalize_text(expected) == normalize_text(actual),
            _ => false,
        },
        DeclaredType::Boolean => match (coerce_bool(expected), coerce_bool(actual)) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        },
    };

    Comparison::from_bool(matched)
}

pub fn numbers_match(expected: f64, actual: f64, tolerance: &NumericTolerance) -> bool {
    if expected == 0.0 {
        return actual.abs() <= tolerance.absolute + FLOAT_SLACK;
    }

    let absolute_diff = (actual - expected).abs();
    let relative_diff = absolute_diff / expected.abs();
    absolute_diff <= tolerance.absolute + FLOAT_SLACK
        || relative_diff <= tolerance.relative + FLOAT_SLACK
}

pub fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        // Integers only; 0.5 is not a truth value.
        Value::Number(number) => number
            .as_i64()
            .map(|n| n != 0)
            .or_else(|| number.as_u64().map(|n| n != 0)),
        Value::String(text) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case("true") {
                Some(true)
            } else if text.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}
