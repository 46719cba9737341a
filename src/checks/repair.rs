use serde::Serialize;
use tracing::{debug, info};

use super::CheckContext;
use crate::affected::AffectedRows;
use crate::audit::SqlAudit;
use crate::integrity_errors::unexpected_row_count;
use crate::policy::{RepairAction, TablePolicy};
use crate::schema::SchemaProvider;
use crate::store::sql::{render_delete, render_update};
use crate::store::{Row, RowStore, Value};
use crate::{AppError, AppResult};

/// Statements produced by one repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub check: String,
    pub simulated: bool,
    pub statements: Vec<String>,
    /// Rows actually changed; always 0 for simulations.
    pub rows_changed: usize,
}

/// Applies row-level repairs for one check.
///
/// Every statement must touch exactly one row. In simulation mode statements
/// are only rendered.
pub struct Repairer<'a> {
    store: &'a dyn RowStore,
    schema: &'a dyn SchemaProvider,
    audit: &'a mut SqlAudit,
    check: &'static str,
    report: RepairReport,
}

impl<'a> Repairer<'a> {
    pub fn new(
        ctx: CheckContext<'a>,
        audit: &'a mut SqlAudit,
        check: &'static str,
        simulate: bool,
    ) -> Self {
        Self {
            store: ctx.store,
            schema: ctx.schema,
            audit,
            check,
            report: RepairReport {
                check: check.to_string(),
                simulated: simulate,
                ..RepairReport::default()
            },
        }
    }

    pub fn finish(self) -> RepairReport {
        self.report
    }

    /// Soft delete or hard delete each row according to its table's policy.
    pub fn apply_policy(&mut self, affected: &AffectedRows) -> AppResult<()> {
        for (table, rows) in affected.tables() {
            let policy = TablePolicy::for_table(self.schema, table);
            for affected_row in rows {
                self.apply_action(&policy, &affected_row.row)?;
            }
        }
        Ok(())
    }

    pub fn apply_action(&mut self, policy: &TablePolicy, row: &Row) -> AppResult<RepairAction> {
        let action = policy.action_for(row);
        match action {
            RepairAction::SoftDelete => self.soft_delete(&policy.table, row.uid())?,
            RepairAction::HardDelete => self.hard_delete(&policy.table, row.uid())?,
        }
        Ok(action)
    }

    pub fn delete_all(&mut self, affected: &AffectedRows) -> AppResult<()> {
        for (table, rows) in affected.tables() {
            for affected_row in rows {
                self.hard_delete(table, affected_row.row.uid())?;
            }
        }
        Ok(())
    }

    /// Writes the target values recorded at detection time.
    pub fn update_from_targets(&mut self, affected: &AffectedRows) -> AppResult<()> {
        for (table, rows) in affected.tables() {
            for affected_row in rows {
                if affected_row.changes.is_empty() {
                    return Err(AppError::new(
                        "REPAIR/NO_CHANGES",
                        "Field update row carries no target values",
                    )
                    .with_context("check", self.check)
                    .with_context("table", table)
                    .with_context("uid", affected_row.row.uid().to_string()));
                }
                self.update(table, affected_row.row.uid(), &affected_row.changes)?;
            }
        }
        Ok(())
    }

    pub fn soft_delete(&mut self, table: &str, uid: i64) -> AppResult<()> {
        let Some(field) = self.schema.soft_delete_field(table) else {
            return Err(AppError::new(
                "REPAIR/NOT_SOFT_DELETE_AWARE",
                "Table has no soft-delete field",
            )
            .with_context("check", self.check)
            .with_context("table", table));
        };
        let values = vec![(field.to_string(), Value::Int(1))];
        self.update(table, uid, &values)
    }

    pub fn hard_delete(&mut self, table: &str, uid: i64) -> AppResult<()> {
        let sql = render_delete(table, uid);
        self.run(table, uid, "delete", sql, |store| store.delete(table, uid))
    }

    pub fn update(&mut self, table: &str, uid: i64, values: &[(String, Value)]) -> AppResult<()> {
        let sql = render_update(table, uid, values);
        self.run(table, uid, "update", sql, |store| store.update(table, uid, values))
    }

    fn run<F>(&mut self, table: &str, uid: i64, operation: &str, sql: String, apply: F) -> AppResult<()>
    where
        F: FnOnce(&dyn RowStore) -> AppResult<usize>,
    {
        if self.report.simulated {
            debug!(target: "dbmend", check = self.check, sql = %sql, "simulated");
            self.report.statements.push(sql);
            return Ok(());
        }
        let changed = apply(self.store).map_err(|err| {
            err.with_context("check", self.check)
                .with_context("table", table)
                .with_context("uid", uid.to_string())
        })?;
        if changed != 1 {
            return Err(unexpected_row_count(operation, table, uid, 1, changed)
                .with_context("check", self.check));
        }
        self.audit.record(self.check, &sql)?;
        info!(target: "dbmend", check = self.check, table, uid, operation, "row repaired");
        self.report.statements.push(sql);
        self.report.rows_changed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity_errors::{classify, IntegrityErrorCode};
    use crate::schema::{StaticSchema, TableSchema};
    use crate::store::SqliteStore;

    fn fixture() -> (SqliteStore, StaticSchema) {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE pages (uid INTEGER PRIMARY KEY, pid INTEGER, deleted INTEGER DEFAULT 0);
                 CREATE TABLE tt_content (uid INTEGER PRIMARY KEY, pid INTEGER, deleted INTEGER DEFAULT 0, t3ver_wsid INTEGER DEFAULT 0);
                 INSERT INTO pages (uid, pid) VALUES (1, 0);
                 INSERT INTO tt_content (uid, pid, t3ver_wsid) VALUES (10, 1, 0), (11, 1, 2);",
            )
            .unwrap();
        let schema = StaticSchema::new("pages")
            .with_table(
                "pages",
                TableSchema {
                    soft_delete: Some("deleted".into()),
                    ..TableSchema::default()
                },
            )
            .with_table(
                "tt_content",
                TableSchema {
                    soft_delete: Some("deleted".into()),
                    workspace_id: Some("t3ver_wsid".into()),
                    ..TableSchema::default()
                },
            );
        (store, schema)
    }

    fn content_rows(store: &SqliteStore) -> AffectedRows {
        let rows = store
            .select_many(
                "tt_content",
                &["uid", "pid", "t3ver_wsid"],
                &crate::store::Predicate::all(),
                &[crate::store::OrderBy::asc("uid")],
            )
            .unwrap();
        let mut affected = AffectedRows::new();
        affected.add_rows("tt_content", rows);
        affected
    }

    #[test]
    fn policy_soft_deletes_live_rows_and_removes_overlays() {
        let (store, schema) = fixture();
        let affected = content_rows(&store);
        let mut audit = SqlAudit::disabled();
        let mut repairer = Repairer::new(
            CheckContext::new(&store, &schema),
            &mut audit,
            "records_on_missing_pages",
            false,
        );
        repairer.apply_policy(&affected).unwrap();
        let report = repairer.finish();
        assert_eq!(report.rows_changed, 2);
        assert_eq!(
            report.statements,
            vec![
                "UPDATE \"tt_content\" SET \"deleted\" = 1 WHERE \"uid\" = 10".to_string(),
                "DELETE FROM \"tt_content\" WHERE \"uid\" = 11".to_string(),
            ]
        );
        let live = store.find_by_uid("tt_content", &["deleted"], 10).unwrap().unwrap();
        assert_eq!(live.int("deleted"), 1);
        assert!(store.find_by_uid("tt_content", &["uid"], 11).unwrap().is_none());
    }

    #[test]
    fn simulation_renders_without_touching_rows() {
        let (store, schema) = fixture();
        let affected = content_rows(&store);
        let mut audit = SqlAudit::disabled();
        let mut repairer = Repairer::new(
            CheckContext::new(&store, &schema),
            &mut audit,
            "records_on_missing_pages",
            true,
        );
        repairer.apply_policy(&affected).unwrap();
        let report = repairer.finish();
        assert!(report.simulated);
        assert_eq!(report.statements.len(), 2);
        assert_eq!(report.rows_changed, 0);
        assert!(store.find_by_uid("tt_content", &["uid"], 11).unwrap().is_some());
    }

    #[test]
    fn deleting_a_vanished_row_is_fatal() {
        let (store, schema) = fixture();
        let mut audit = SqlAudit::disabled();
        let mut repairer = Repairer::new(
            CheckContext::new(&store, &schema),
            &mut audit,
            "records_with_negative_pid",
            false,
        );
        let err = repairer.hard_delete("tt_content", 999).unwrap_err();
        assert_eq!(
            classify(&err),
            Some(IntegrityErrorCode::UnexpectedAffectedRowCount)
        );
        assert_eq!(err.context().get("actual").map(String::as_str), Some("0"));
    }
}
