use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Number, Value};

use super::mapping::{FieldMappingTable, normalize_field_name};
use crate::model::{DeclaredType, ReferenceField, UnmappedField};

const HEADER_FIELD_NAMES: [&str; 3] = ["field", "field_name", "reference_field_name"];

#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    pub fields: Vec<ReferenceField>,
    pub unmapped: Vec<UnmappedField>,
}

impl GroundTruth {
    pub fn total_reference_fields(&self) -> usize {
        self.fields.len() + self.unmapped.len()
    }
}

pub fn load_ground_truth(path: &Path, table: &FieldMappingTable) -> Result<GroundTruth> {
    let raw = fs::read(path)
        .with_context(|| format!("failed to read ground truth: {}", path.display()))?;
    parse_ground_truth(&raw, table)
        .with_context(|| format!("malformed reference record: {}", path.display()))
}

pub fn parse_ground_truth(raw: &[u8], table: &FieldMappingTable) -> Result<GroundTruth> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(raw);

    let mut ground_truth = GroundTruth::default();
    let mut seen_names = HashSet::<String>::new();
    let mut first_row = true;

    for (row_index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to parse row {}", row_index + 1))?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(row_index as u64 + 1);

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let name = record.get(0).unwrap_or_default().trim();
        if std::mem::take(&mut first_row) && is_header_name(name) {
            continue;
        }
        if name.is_empty() {
            bail!("line {line}: missing field name");
        }
        let Some(raw_value) = record.get(1) else {
            bail!("line {line}: field {name:?} has no expected-value column");
        };
        if !seen_names.insert(normalize_field_name(name)) {
            bail!("line {line}: duplicate reference field {name:?}");
        }

        match table.resolve(name) {
            Some(entry) => {
                let expected_value = parse_expected_value(raw_value, entry.declared_type)
                    .with_context(|| format!("line {line}: invalid expected value for {name:?}"))?;
                ground_truth.fields.push(ReferenceField {
                    field_name: entry.reference_field_name.clone(),
                    field_path: entry.json_path.clone(),
                    expected_value,
                    declared_type: entry.declared_type,
                    source_line: line,
                });
            }
            None => ground_truth.unmapped.push(UnmappedField {
                field_name: name.to_string(),
                raw_value: raw_value.trim().to_string(),
                source_line: line,
            }),
        }
    }

    Ok(ground_truth)
}

fn is_header_name(name: &str) -> bool {
    HEADER_FIELD_NAMES
        .iter()
        .any(|header| name.eq_ignore_ascii_case(header))
}

pub fn parse_expected_value(raw: &str, declared_type: DeclaredType) -> Result<Value> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(Value::Null);
    }

    match declared_type {
        DeclaredType::String => Ok(Value::String(text.to_string())),
        DeclaredType::Numeric => parse_reference_number(text),
        DeclaredType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "0" => Ok(Value::Bool(false)),
            _ => bail!("expected a boolean, found {text:?}"),
        },
    }
}

fn parse_reference_number(text: &str) -> Result<Value> {
    let cleaned = text.replace(',', "");
    if let Ok(integer) = cleaned.parse::<i64>() {
        return Ok(Value::from(integer));
    }

    let number = cleaned
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .with_context(|| format!("expected a number, found {text:?}"))?;
    Ok(Value::Number(number))
}
