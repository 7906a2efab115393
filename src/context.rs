use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::cli::ContextArgs;
use crate::engine::{DEFAULT_PAGE_SIZE, FieldMappingTable, IterationStore, NumericTolerance};

pub const DEFAULT_MAPPING_FILE: &str = "field_mapping.json";
pub const DEFAULT_GROUND_TRUTH_FILE: &str = "ground_truth.csv";
pub const DEFAULT_EXTRACTION_FILE: &str = "extracted.json";

#[derive(Debug, Clone)]
pub struct EvalContext {
    pub eval_root: PathBuf,
    pub mapping_path: PathBuf,
    pub mapping: FieldMappingTable,
    pub tolerance: NumericTolerance,
    pub page_size: usize,
    pub ground_truth_file: String,
    pub extraction_file: String,
    pub store: IterationStore,
}

impl EvalContext {
    pub fn from_args(args: &ContextArgs) -> Result<Self> {
        let mapping_path = args
            .mapping_path
            .clone()
            .unwrap_or_else(|| args.eval_root.join(DEFAULT_MAPPING_FILE));
        let mapping = FieldMappingTable::load(&mapping_path)?;
        let tolerance = NumericTolerance {
            relative: args.relative_tolerance,
            absolute: args.absolute_tolerance,
        };

        let context = Self::new(args.eval_root.clone(), mapping_path, mapping, tolerance)?
            .with_page_size(args.page_size)?
            .with_file_names(&args.ground_truth_file, &args.extraction_file)?;

        debug!(
            eval_root = %context.eval_root.display(),
            mapping = %context.mapping_path.display(),
            mapping_fields = context.mapping.len(),
            "evaluation context ready"
        );
        Ok(context)
    }

    pub fn new(
        eval_root: PathBuf,
        mapping_path: PathBuf,
        mapping: FieldMappingTable,
        tolerance: NumericTolerance,
    ) -> Result<Self> {
        if !(tolerance.relative >= 0.0 && tolerance.absolute >= 0.0) {
            bail!("numeric tolerances must be non-negative");
        }
        if mapping.is_empty() {
            bail!("field mapping table {} has no entries", mapping_path.display());
        }
        let store = IterationStore::new(eval_root.clone())?;

        Ok(Self {
            eval_root,
            mapping_path,
            mapping,
            tolerance,
            page_size: DEFAULT_PAGE_SIZE,
            ground_truth_file: DEFAULT_GROUND_TRUTH_FILE.to_string(),
            extraction_file: DEFAULT_EXTRACTION_FILE.to_string(),
            store,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            bail!("page size must be at least 1");
        }
        self.page_size = page_size;
        Ok(self)
    }

    pub fn with_file_names(mut self, ground_truth_file: &str, extraction_file: &str) -> Result<Self> {
        for name in [ground_truth_file, extraction_file] {
            if name.is_empty() || name.contains(['/', '\\']) {
                bail!("invalid case file name {name:?}");
            }
        }
        self.ground_truth_file = ground_truth_file.to_string();
        self.extraction_file = extraction_file.to_string();
        Ok(self)
    }

    pub fn ground_truth_path(&self, case_id: &str) -> Result<PathBuf> {
        Ok(self.store.case_dir(case_id)?.join(&self.ground_truth_file))
    }

    pub fn extraction_path(&self, case_id: &str) -> Result<PathBuf> {
        Ok(self.store.case_dir(case_id)?.join(&self.extraction_file))
    }

    pub fn discover_cases(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.eval_root)
            .with_context(|| format!("failed to read {}", self.eval_root.display()))?;

        let mut case_ids = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read entry in {}", self.eval_root.display()))?;
            let path = entry.path();
            if !entry
                .file_type()
                .with_context(|| format!("failed to inspect file type: {}", path.display()))?
                .is_dir()
            {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if name.starts_with('.') || !path.join(&self.ground_truth_file).is_file() {
                continue;
            }
            case_ids.push(name.to_string());
        }

        case_ids.sort();
        Ok(case_ids)
    }
}
