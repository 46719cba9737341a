//! Orchestrator: runs the ordered checks in one execution mode and collects
//! a per-check outcome.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::affected::AffectedRows;
use crate::audit::SqlAudit;
use crate::checks::{Check, CheckContext, RepairClass, RepairReport, Repairer};
use crate::console::Console;
use crate::integrity_errors::{classify, IntegrityErrorCode};
use crate::report::{detail_lines, page_lines, summary_lines};
use crate::rootline::RootlineResolver;
use crate::schema::SchemaProvider;
use crate::store::RowStore;
use crate::{AppError, AppResult};

mod interactive;

pub use interactive::{Command, InteractiveState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Detect only, never mutate.
    #[default]
    Check,
    /// Detect and repair once.
    Execute,
    /// Detect, then let the operator drive repairs.
    Interactive,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Check => "check",
            ExecutionMode::Execute => "execute",
            ExecutionMode::Interactive => "interactive",
        }
    }

    pub fn mutates(self) -> bool {
        !matches!(self, ExecutionMode::Check)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown mode '{0}', expected check, execute or interactive")]
pub struct ModeParseError(String);

impl FromStr for ExecutionMode {
    type Err = ModeParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "check" => Ok(ExecutionMode::Check),
            "execute" => Ok(ExecutionMode::Execute),
            "interactive" => Ok(ExecutionMode::Interactive),
            other => Err(ModeParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckState {
    Ok,
    Broken,
    Aborted,
}

impl CheckState {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckState::Ok => "OK",
            CheckState::Broken => "BROKEN",
            CheckState::Aborted => "ABORTED",
        }
    }

    /// Process exit code for a run ending in this state.
    pub fn exit_code(self) -> i32 {
        match self {
            CheckState::Ok => 0,
            CheckState::Broken => 1,
            CheckState::Aborted => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub id: &'static str,
    pub title: &'static str,
    pub class: RepairClass,
    pub state: CheckState,
    /// Affected rows per table found by the first detection.
    pub found: BTreeMap<String, usize>,
    /// Affected rows per table left after the last detection.
    pub remaining: BTreeMap<String, usize>,
    pub rows_changed: usize,
}

impl CheckOutcome {
    fn new(check: &dyn Check, found: &AffectedRows) -> Self {
        Self {
            id: check.id(),
            title: check.title(),
            class: check.class(),
            state: CheckState::Ok,
            found: found.counts(),
            remaining: found.counts(),
            rows_changed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub mode: ExecutionMode,
    pub started_at: String,
    pub finished_at: String,
    pub outcomes: Vec<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_log: Option<String>,
    pub statements_logged: usize,
}

impl RunSummary {
    /// ABORTED beats BROKEN beats OK.
    pub fn state(&self) -> CheckState {
        let any = |state| self.outcomes.iter().any(|o| o.state == state);
        if any(CheckState::Aborted) {
            CheckState::Aborted
        } else if any(CheckState::Broken) {
            CheckState::Broken
        } else {
            CheckState::Ok
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.state().exit_code()
    }

    pub fn count(&self, state: CheckState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

/// Operator guidance for a fatal error, if it is one the engine raises.
pub fn fatal_guidance(error: &AppError) -> Option<String> {
    let ctx = |key: &str| error.context().get(key).cloned().unwrap_or_else(|| "?".into());
    match classify(error)? {
        IntegrityErrorCode::PrerequisiteViolated => Some(format!(
            "check '{}' found {}:{} which check '{}' should already have repaired. \
             Re-run all checks from the top in execute or interactive mode.",
            ctx("check"),
            ctx("table"),
            ctx("uid"),
            ctx("prerequisite"),
        )),
        IntegrityErrorCode::UnexpectedAffectedRowCount => Some(format!(
            "{} of {}:{} touched {} rows instead of {}. The database changed during the run; \
             re-run the checks to detect the current state.",
            ctx("operation"),
            ctx("table"),
            ctx("uid"),
            ctx("actual"),
            ctx("expected"),
        )),
        _ => None,
    }
}

pub struct Orchestrator<'a> {
    store: &'a dyn RowStore,
    schema: &'a dyn SchemaProvider,
    console: &'a mut dyn Console,
    audit: SqlAudit,
    mode: ExecutionMode,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        store: &'a dyn RowStore,
        schema: &'a dyn SchemaProvider,
        console: &'a mut dyn Console,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            store,
            schema,
            console,
            audit: SqlAudit::disabled(),
            mode,
        }
    }

    pub fn with_audit(mut self, audit: SqlAudit) -> Self {
        self.audit = audit;
        self
    }

    /// Runs `checks` in order. Stops after a check is aborted; fatal errors propagate.
    pub fn run(&mut self, checks: &[&dyn Check]) -> AppResult<RunSummary> {
        let started_at = now();
        info!(target: "dbmend", mode = %self.mode, checks = checks.len(), "run started");
        let mut outcomes = Vec::with_capacity(checks.len());
        for (idx, check) in checks.iter().enumerate() {
            self.console
                .line(&format!("[{:>2}/{}] {}: {}", idx + 1, checks.len(), check.id(), check.title()));
            let outcome = self
                .run_check(*check)
                .map_err(|err| err.with_context("check", check.id()))?;
            let aborted = outcome.state == CheckState::Aborted;
            outcomes.push(outcome);
            if aborted {
                warn!(target: "dbmend", check = check.id(), "run aborted by operator");
                break;
            }
        }
        let summary = RunSummary {
            mode: self.mode,
            started_at,
            finished_at: now(),
            outcomes,
            sql_log: self.audit.path().map(|p| p.display().to_string()),
            statements_logged: self.audit.statements(),
        };
        self.console.line(&format!(
            "Summary: {} OK, {} BROKEN, {} ABORTED => {}",
            summary.count(CheckState::Ok),
            summary.count(CheckState::Broken),
            summary.count(CheckState::Aborted),
            summary.state().as_str()
        ));
        info!(target: "dbmend", state = summary.state().as_str(), "run finished");
        Ok(summary)
    }

    pub fn run_check(&mut self, check: &dyn Check) -> AppResult<CheckOutcome> {
        let ctx = self.context();
        let affected = check.detect(&ctx)?;
        let mut outcome = CheckOutcome::new(check, &affected);
        info!(
            target: "dbmend",
            check = check.id(),
            mode = %self.mode,
            affected = affected.total(),
            "detected"
        );
        outcome.state = match self.mode {
            ExecutionMode::Check => {
                self.show_result(&affected);
                if affected.is_empty() {
                    CheckState::Ok
                } else {
                    CheckState::Broken
                }
            }
            ExecutionMode::Execute => {
                self.show_result(&affected);
                if affected.is_empty() {
                    CheckState::Ok
                } else {
                    let report = self.repair(check, &affected, false)?;
                    outcome.rows_changed += report.rows_changed;
                    let remaining = check.detect(&ctx)?;
                    outcome.remaining = remaining.counts();
                    self.console
                        .line(&format!("  => {} rows repaired", report.rows_changed));
                    if remaining.is_empty() {
                        CheckState::Ok
                    } else {
                        self.console
                            .warning(&format!("{}: {} rows remain", check.id(), remaining.total()));
                        CheckState::Broken
                    }
                }
            }
            ExecutionMode::Interactive => self.interact(check, affected, &mut outcome)?,
        };
        Ok(outcome)
    }

    fn context(&self) -> CheckContext<'a> {
        let ctx = CheckContext::new(self.store, self.schema);
        if self.mode.mutates() {
            ctx
        } else {
            ctx.lenient()
        }
    }

    fn repair(
        &mut self,
        check: &dyn Check,
        affected: &AffectedRows,
        simulate: bool,
    ) -> AppResult<RepairReport> {
        let ctx = self.context();
        let mut repairer = Repairer::new(ctx, &mut self.audit, check.id(), simulate);
        check.repair(&mut repairer, affected)?;
        let report = repairer.finish();
        if simulate || self.mode == ExecutionMode::Interactive {
            for statement in &report.statements {
                self.console.statement(statement);
            }
        }
        Ok(report)
    }

    fn show_result(&mut self, affected: &AffectedRows) {
        if affected.is_empty() {
            self.console.line("  => OK");
            return;
        }
        for line in summary_lines(affected) {
            self.console.line(&line);
        }
    }

    fn show_details(&mut self, affected: &AffectedRows) {
        for line in detail_lines(affected) {
            self.console.line(&line);
        }
    }

    fn show_pages(&mut self, affected: &AffectedRows) -> AppResult<()> {
        let mut resolver = RootlineResolver::new(self.store, self.schema);
        for line in page_lines(affected, self.schema, &mut resolver)? {
            self.console.line(&line);
        }
        Ok(())
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
