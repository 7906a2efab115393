use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::compare::normalize_text;
use super::navigate::PATH_SEPARATOR;
use crate::model::DeclaredType;
use crate::util::read_json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMappingEntry {
    pub reference_field_name: String,
    pub json_path: String,
    pub declared_type: DeclaredType,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FieldMappingManifest {
    pub mapping_version: u32,
    pub fields: Vec<FieldMappingEntry>,
}

#[derive(Debug, Clone)]
pub struct FieldMappingTable {
    version: u32,
    entries: Vec<FieldMappingEntry>,
    by_name: HashMap<String, usize>,
    by_normalized_name: HashMap<String, usize>,
    by_path: HashMap<String, usize>,
}

impl FieldMappingTable {
    pub fn load(path: &Path) -> Result<Self> {
        let manifest: FieldMappingManifest = read_json(path)?;
        Self::from_manifest(manifest)
            .with_context(|| format!("invalid field mapping table: {}", path.display()))
    }

    pub fn from_manifest(manifest: FieldMappingManifest) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(manifest.fields.len());
        let mut by_normalized_name = HashMap::with_capacity(manifest.fields.len());
        let mut by_path = HashMap::with_capacity(manifest.fields.len());

        for (index, entry) in manifest.fields.iter().enumerate() {
            let name = entry.reference_field_name.trim();
            if name.is_empty() {
                bail!("mapping entry {index} has an empty reference_field_name");
            }
            validate_json_path(&entry.json_path)
                .with_context(|| format!("mapping entry {name:?} has an invalid json_path"))?;

            if by_name.insert(name.to_string(), index).is_some()
                || by_normalized_name
                    .insert(normalize_field_name(name), index)
                    .is_some()
            {
                bail!("duplicate reference_field_name in mapping table: {name:?}");
            }
            if by_path.insert(entry.json_path.clone(), index).is_some() {
                bail!(
                    "json_path {:?} is mapped by more than one reference field",
                    entry.json_path
                );
            }
        }

        Ok(Self {
            version: manifest.mapping_version,
            entries: manifest.fields,
            by_name,
            by_normalized_name,
            by_path,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve(&self, reference_field_name: &str) -> Option<&FieldMappingEntry> {
        let name = reference_field_name.trim();
        self.by_name
            .get(name)
            .or_else(|| self.by_normalized_name.get(&normalize_field_name(name)))
            .map(|index| &self.entries[*index])
    }

    pub fn entry_for_path(&self, json_path: &str) -> Option<&FieldMappingEntry> {
        self.by_path.get(json_path).map(|index| &self.entries[*index])
    }
}

pub fn normalize_field_name(name: &str) -> String {
    normalize_text(name)
}

fn validate_json_path(path: &str) -> Result<()> {
    if path.trim() != path {
        bail!("path {path:?} has surrounding whitespace");
    }
    if path.is_empty() {
        bail!("path is empty");
    }
    if path.split(PATH_SEPARATOR).any(str::is_empty) {
        bail!("path {path:?} contains an empty segment");
    }
    Ok(())
}
