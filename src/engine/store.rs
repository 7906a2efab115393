use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::report::IterationResult;
use crate::util::{compact_timestamp, ensure_directory, read_json, write_json_pretty};

pub const ITERATIONS_DIR: &str = "iterations";
pub const EXTRACTION_ARTIFACT: &str = "extraction.json";
pub const RESULT_ARTIFACT: &str = "eval_result.json";
pub const REPORT_ARTIFACT: &str = "report.md";

#[derive(Debug)]
pub struct IterationArtifacts<'a> {
    pub extraction_document: &'a Value,
    pub result: &'a IterationResult,
    pub report_markdown: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenIteration {
    pub iteration_number: u32,
    pub directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct IterationStore {
    eval_root: PathBuf,
    iteration_dir_pattern: Regex,
}

impl IterationStore {
    pub fn new(eval_root: impl Into<PathBuf>) -> Result<Self> {
        let iteration_dir_pattern = Regex::new(r"^iteration-(\d+)$")
            .context("failed to compile iteration directory regex")?;
        Ok(Self {
            eval_root: eval_root.into(),
            iteration_dir_pattern,
        })
    }

    pub fn case_dir(&self, case_id: &str) -> Result<PathBuf> {
        validate_case_id(case_id)?;
        Ok(self.eval_root.join(case_id))
    }

    pub fn iterations_dir(&self, case_id: &str) -> Result<PathBuf> {
        Ok(self.case_dir(case_id)?.join(ITERATIONS_DIR))
    }

    pub fn iteration_dir(&self, case_id: &str, iteration_number: u32) -> Result<PathBuf> {
        Ok(self
            .iterations_dir(case_id)?
            .join(iteration_dir_name(iteration_number)))
    }

    pub fn existing_iterations(&self, case_id: &str) -> Result<Vec<u32>> {
        let iterations_dir = self.iterations_dir(case_id)?;
        if !iterations_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&iterations_dir)
            .with_context(|| format!("failed to read {}", iterations_dir.display()))?;

        let mut numbers = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read entry in {}", iterations_dir.display()))?;
            let is_dir = entry
                .file_type()
                .with_context(|| format!("failed to inspect {}", entry.path().display()))?
                .is_dir();
            if !is_dir {
                continue;
            }
            let name = entry.file_name();
            if let Some(number) = name.to_str().and_then(|name| self.parse_iteration_dir(name)) {
                numbers.push(number);
            }
        }

        numbers.sort_unstable();
        numbers.dedup();
        Ok(numbers)
    }

    pub fn next_iteration_number(&self, case_id: &str) -> Result<u32> {
        let latest = self.existing_iterations(case_id)?.last().copied();
        match latest {
            None => Ok(1),
            Some(latest) => latest
                .checked_add(1)
                .with_context(|| format!("iteration numbers exhausted for case {case_id}")),
        }
    }

    pub fn save(
        &self,
        case_id: &str,
        iteration_number: u32,
        artifacts: &IterationArtifacts<'_>,
    ) -> Result<WrittenIteration> {
        if iteration_number == 0 {
            bail!("iteration numbers start at 1");
        }
        if self.existing_iterations(case_id)?.contains(&iteration_number) {
            bail!(
                "iteration {iteration_number} already exists for case {case_id}; request a new iteration number"
            );
        }

        let iterations_dir = self.iterations_dir(case_id)?;
        ensure_directory(&iterations_dir)?;
        let final_dir = iterations_dir.join(iteration_dir_name(iteration_number));
        let staging_dir = iterations_dir.join(format!(
            ".staging-{}-{}-{}",
            iteration_dir_name(iteration_number),
            compact_timestamp(Utc::now()),
            std::process::id()
        ));

        fs::create_dir(&staging_dir).with_context(|| {
            format!("failed to create staging directory: {}", staging_dir.display())
        })?;
        debug!(path = %staging_dir.display(), "staging iteration");

        let published = write_artifacts(&staging_dir, artifacts).and_then(|()| {
            if final_dir.exists() {
                bail!(
                    "iteration {iteration_number} already exists for case {case_id}; request a new iteration number"
                );
            }
            fs::rename(&staging_dir, &final_dir).with_context(|| {
                format!(
                    "failed to publish iteration {iteration_number} for case {case_id} at {}",
                    final_dir.display()
                )
            })
        });

        if let Err(err) = published {
            if let Err(cleanup_err) = fs::remove_dir_all(&staging_dir) {
                warn!(
                    path = %staging_dir.display(),
                    error = %cleanup_err,
                    "failed to remove staging directory"
                );
            }
            return Err(err);
        }

        info!(
            case_id,
            iteration = iteration_number,
            path = %final_dir.display(),
            "wrote iteration"
        );

        Ok(WrittenIteration {
            iteration_number,
            directory: final_dir,
        })
    }

    pub fn load_iteration(&self, case_id: &str, iteration_number: u32) -> Result<IterationResult> {
        let path = self
            .iteration_dir(case_id, iteration_number)?
            .join(RESULT_ARTIFACT);
        if !path.exists() {
            bail!("iteration {iteration_number} not found for case {case_id}");
        }
        read_json(&path)
    }

    pub fn load_extraction(&self, case_id: &str, iteration_number: u32) -> Result<Value> {
        let path = self
            .iteration_dir(case_id, iteration_number)?
            .join(EXTRACTION_ARTIFACT);
        read_json(&path)
    }

    fn parse_iteration_dir(&self, name: &str) -> Option<u32> {
        self.iteration_dir_pattern
            .captures(name)?
            .get(1)?
            .as_str()
            .parse::<u32>()
            .ok()
    }
}

fn write_artifacts(dir: &Path, artifacts: &IterationArtifacts<'_>) -> Result<()> {
    write_json_pretty(&dir.join(EXTRACTION_ARTIFACT), artifacts.extraction_document)?;
    write_json_pretty(&dir.join(RESULT_ARTIFACT), artifacts.result)?;
    let report_path = dir.join(REPORT_ARTIFACT);
    fs::write(&report_path, artifacts.report_markdown)
        .with_context(|| format!("failed to write report: {}", report_path.display()))
}

pub fn iteration_dir_name(iteration_number: u32) -> String {
    format!("iteration-{iteration_number:03}")
}

pub fn validate_case_id(case_id: &str) -> Result<()> {
    if case_id.trim().is_empty() {
        bail!("case id must not be empty");
    }
    if case_id.starts_with('.') || case_id.contains(['/', '\\']) {
        bail!("invalid case id {case_id:?}: must be a plain directory name");
    }
    Ok(())
}
