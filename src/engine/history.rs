use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use tracing::debug;

use super::store::IterationStore;
use crate::model::{ErrorCounts, HistoryEntry, HistoryTrend, MetricsResult};
use crate::util::ensure_directory;

pub const HISTORY_FILE: &str = "history.sqlite";

// Concurrent appends for one case wait on SQLite's write lock instead of failing.
const HISTORY_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

impl IterationStore {
    pub fn history_path(&self, case_id: &str) -> Result<PathBuf> {
        Ok(self.case_dir(case_id)?.join(HISTORY_FILE))
    }

    pub fn append_history(
        &self,
        case_id: &str,
        iteration_number: u32,
        timestamp: &str,
        metrics: &MetricsResult,
    ) -> Result<HistoryEntry> {
        let path = self.history_path(case_id)?;
        if let Some(parent) = path.parent() {
            ensure_directory(parent)?;
        }
        let connection = open_history(&path)?;

        let counts = metrics.error_counts;
        connection
            .execute(
                "
                INSERT INTO history_entries (
                  iteration_number,
                  recorded_at,
                  precision_score,
                  recall_score,
                  f1_score,
                  omission_count,
                  hallucination_count,
                  format_error_count,
                  wrong_value_count
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
                params![
                    iteration_number,
                    timestamp,
                    metrics.precision,
                    metrics.recall,
                    metrics.f1,
                    counts.omission as i64,
                    counts.hallucination as i64,
                    counts.format_error as i64,
                    counts.wrong_value as i64,
                ],
            )
            .with_context(|| {
                format!("failed to append history for case {case_id} iteration {iteration_number}")
            })?;

        debug!(case_id, iteration = iteration_number, f1 = metrics.f1, "appended history entry");

        Ok(HistoryEntry {
            iteration_number,
            timestamp: timestamp.to_string(),
            precision: metrics.precision,
            recall: metrics.recall,
            f1: metrics.f1,
            error_counts: counts,
        })
    }

    pub fn history(&self, case_id: &str) -> Result<Vec<HistoryEntry>> {
        let path = self.history_path(case_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let connection = open_history(&path)?;
        read_history(&connection)
            .with_context(|| format!("failed to read history: {}", path.display()))
    }

    // A save that succeeded before its history append failed leaves a
    // published iteration with no row; these are reported, never rewritten.
    pub fn unrecorded_iterations(&self, case_id: &str) -> Result<Vec<u32>> {
        let recorded = self
            .history(case_id)?
            .iter()
            .map(|entry| entry.iteration_number)
            .collect::<HashSet<u32>>();
        Ok(self
            .existing_iterations(case_id)?
            .into_iter()
            .filter(|number| !recorded.contains(number))
            .collect())
    }

    pub fn best(&self, case_id: &str) -> Result<Option<HistoryEntry>> {
        Ok(best_entry(&self.history(case_id)?).cloned())
    }

    pub fn trend(&self, case_id: &str) -> Result<Option<HistoryTrend>> {
        Ok(history_trend(&self.history(case_id)?))
    }
}

fn open_history(path: &Path) -> Result<Connection> {
    let connection = Connection::open(path)
        .with_context(|| format!("failed to open history: {}", path.display()))?;
    connection
        .busy_timeout(HISTORY_BUSY_TIMEOUT)
        .context("failed to set history busy timeout")?;
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    ensure_history_schema(&connection)?;
    Ok(connection)
}

fn ensure_history_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS history_entries (
              seq INTEGER PRIMARY KEY AUTOINCREMENT,
              iteration_number INTEGER NOT NULL UNIQUE,
              recorded_at TEXT NOT NULL,
              precision_score REAL NOT NULL,
              recall_score REAL NOT NULL,
              f1_score REAL NOT NULL,
              omission_count INTEGER NOT NULL,
              hallucination_count INTEGER NOT NULL,
              format_error_count INTEGER NOT NULL,
              wrong_value_count INTEGER NOT NULL
            );

            CREATE TRIGGER IF NOT EXISTS history_entries_no_update
            BEFORE UPDATE ON history_entries
            BEGIN
              SELECT RAISE(ABORT, 'history entries are append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS history_entries_no_delete
            BEFORE DELETE ON history_entries
            BEGIN
              SELECT RAISE(ABORT, 'history entries are append-only');
            END;
            ",
        )
        .context("failed to ensure history schema")
}

fn read_history(connection: &Connection) -> Result<Vec<HistoryEntry>> {
    let mut statement = connection.prepare(
        "
        SELECT
          iteration_number,
          recorded_at,
          precision_score,
          recall_score,
          f1_score,
          omission_count,
          hallucination_count,
          format_error_count,
          wrong_value_count
        FROM history_entries
        ORDER BY seq
        ",
    )?;
    let mut rows = statement.query([])?;

    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(HistoryEntry {
            iteration_number: row.get(0)?,
            timestamp: row.get(1)?,
            precision: row.get(2)?,
            recall: row.get(3)?,
            f1: row.get(4)?,
            error_counts: ErrorCounts {
                omission: row.get::<_, i64>(5)? as usize,
                hallucination: row.get::<_, i64>(6)? as usize,
                format_error: row.get::<_, i64>(7)? as usize,
                wrong_value: row.get::<_, i64>(8)? as usize,
            },
        });
    }

    Ok(entries)
}

/// Highest F1; the earliest entry wins a tie.
pub fn best_entry(entries: &[HistoryEntry]) -> Option<&HistoryEntry> {
    entries.iter().fold(None, |best, entry| match best {
        Some(current) if current.f1 >= entry.f1 => Some(current),
        _ => Some(entry),
    })
}

pub fn history_trend(entries: &[HistoryEntry]) -> Option<HistoryTrend> {
    let best = best_entry(entries)?;
    let latest = entries.last()?;
    let delta_from_previous = entries
        .len()
        .checked_sub(2)
        .map(|previous| latest.f1 - entries[previous].f1);
    let monotonic_improvement = entries.windows(2).all(|pair| pair[1].f1 >= pair[0].f1);

    Some(HistoryTrend {
        entry_count: entries.len(),
        best_iteration: best.iteration_number,
        best_f1: best.f1,
        latest_iteration: latest.iteration_number,
        latest_f1: latest.f1,
        delta_from_previous,
        monotonic_improvement,
    })
}
