//! Integrity checks.
//!
//! Each check detects one class of violation and repairs it with one policy.
//! Checks hold no state between runs: `detect` always reflects the current
//! database, and `repair` only touches the rows it is handed.

use serde::Serialize;
use tracing::debug;

use crate::affected::AffectedRows;
use crate::integrity_errors::prerequisite_violated;
use crate::schema::SchemaProvider;
use crate::store::RowStore;
use crate::AppResult;

mod flags;
mod inline;
mod pages;
mod records;
mod registry;
mod repair;
mod support;
mod translations;
mod workspaces;

pub use registry::{catalogue, CheckRegistry};
pub use repair::{RepairReport, Repairer};

/// Destructive class a check belongs to; decides how `repair` treats rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairClass {
    /// Soft delete live rows, hard delete overlays and tables without soft-delete.
    SoftDelete,
    /// Always hard delete.
    Remove,
    /// Rewrite one or more fields in place.
    FieldUpdate,
    /// Hard delete workspace overlay rows.
    WorkspaceRemove,
}

impl RepairClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairClass::SoftDelete => "soft-delete",
            RepairClass::Remove => "remove",
            RepairClass::FieldUpdate => "field-update",
            RepairClass::WorkspaceRemove => "workspace-overlay-remove",
        }
    }
}

/// Read-only collaborators handed to detection.
#[derive(Clone, Copy)]
pub struct CheckContext<'a> {
    pub store: &'a dyn RowStore,
    pub schema: &'a dyn SchemaProvider,
    /// When set, earlier checks are assumed repaired and a row violating
    /// their invariant is fatal. Check-only runs repair nothing and clear it.
    pub strict: bool,
}

impl<'a> CheckContext<'a> {
    pub fn new(store: &'a dyn RowStore, schema: &'a dyn SchemaProvider) -> Self {
        Self {
            store,
            schema,
            strict: true,
        }
    }

    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    /// Reports a row that `prerequisite` should already have eliminated.
    ///
    /// Fatal in strict mode; otherwise the caller skips the row.
    pub fn prerequisite_missing(
        &self,
        check: &str,
        prerequisite: &str,
        table: &str,
        uid: i64,
    ) -> AppResult<()> {
        if self.strict {
            return Err(prerequisite_violated(check, prerequisite, table, uid));
        }
        debug!(target: "dbmend", check, prerequisite, table, uid, "row left to an earlier check");
        Ok(())
    }
}

pub trait Check {
    /// Stable identifier used on the command line and in the audit log.
    fn id(&self) -> &'static str;

    fn title(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn class(&self) -> RepairClass;

    /// Checks that must run earlier; their invariants are assumed here.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows>;

    fn repair(&self, repairer: &mut Repairer<'_>, affected: &AffectedRows) -> AppResult<()> {
        match self.class() {
            RepairClass::SoftDelete => repairer.apply_policy(affected),
            RepairClass::Remove | RepairClass::WorkspaceRemove => repairer.delete_all(affected),
            RepairClass::FieldUpdate => repairer.update_from_targets(affected),
        }
    }
}
