//! Audit file collecting every executed mutating statement.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

use crate::{AppError, AppResult};

/// Appends executed statements to a file, opened on first use.
///
/// The first statement of each check is preceded by a
/// `-- triggered by <check>` marker line.
#[derive(Debug, Default)]
pub struct SqlAudit {
    path: Option<PathBuf>,
    file: Option<File>,
    marked: HashSet<String>,
    statements: usize,
}

impl SqlAudit {
    /// An audit sink that records nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Number of statements written so far.
    pub fn statements(&self) -> usize {
        self.statements
    }

    pub fn record(&mut self, check: &str, statement: &str) -> AppResult<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let first_for_check = self.marked.insert(check.to_string());
        let file = self.file_handle(&path)?;
        let mut buffer = String::new();
        if first_for_check {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            buffer.push_str(&format!("-- {now} triggered by {check}\n"));
        }
        buffer.push_str(statement.trim_end_matches(';'));
        buffer.push_str(";\n");
        file.write_all(buffer.as_bytes()).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "write_sql_log")
                .with_context("path", path.display().to_string())
        })?;
        self.statements += 1;
        Ok(())
    }

    fn file_handle(&mut self, path: &Path) -> AppResult<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| {
                    AppError::from(err)
                        .with_context("operation", "open_sql_log")
                        .with_context("path", path.display().to_string())
                })?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| AppError::new("AUDIT/UNAVAILABLE", "SQL log file is not open"))
    }
}
