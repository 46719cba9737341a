//! Repair-policy decision shared by every destructive check.

use serde::Serialize;

use crate::schema::SchemaProvider;
use crate::store::Row;

/// What a repair does to one affected row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    /// Remove the row.
    HardDelete,
    /// Set the table's soft-delete field to 1.
    SoftDelete,
}

/// Pure three-way decision:
///
/// 1. overlay rows (`workspace_aware` and `workspace_id > 0`) are always hard deleted,
/// 2. live rows of soft-delete aware tables are soft deleted,
/// 3. everything else is hard deleted.
pub fn decide(soft_delete_aware: bool, workspace_aware: bool, workspace_id: i64) -> RepairAction {
    if workspace_aware && workspace_id > 0 {
        RepairAction::HardDelete
    } else if soft_delete_aware {
        RepairAction::SoftDelete
    } else {
        RepairAction::HardDelete
    }
}

/// Capability snapshot of one table, computed once per repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePolicy {
    pub table: String,
    pub soft_delete: Option<String>,
    pub workspace_id: Option<String>,
}

impl TablePolicy {
    pub fn for_table(schema: &dyn SchemaProvider, table: &str) -> Self {
        Self {
            table: table.to_string(),
            soft_delete: schema.soft_delete_field(table).map(str::to_string),
            workspace_id: schema.workspace_id_field(table).map(str::to_string),
        }
    }

    /// Workspace id of `row`; 0 when the table is not workspace aware.
    pub fn workspace_of(&self, row: &Row) -> i64 {
        self.workspace_id
            .as_deref()
            .map(|field| row.int(field))
            .unwrap_or(0)
    }

    pub fn action_for(&self, row: &Row) -> RepairAction {
        decide(
            self.soft_delete.is_some(),
            self.workspace_id.is_some(),
            self.workspace_of(row),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{StaticSchema, TableSchema};

    #[test]
    fn decision_table_covers_all_combinations() {
        let cases = [
            // (soft_delete_aware, workspace_aware, overlay, expected)
            (false, false, false, RepairAction::HardDelete),
            (false, false, true, RepairAction::HardDelete),
            (false, true, false, RepairAction::HardDelete),
            (false, true, true, RepairAction::HardDelete),
            (true, false, false, RepairAction::SoftDelete),
            (true, false, true, RepairAction::SoftDelete),
            (true, true, false, RepairAction::SoftDelete),
            (true, true, true, RepairAction::HardDelete),
        ];
        for (soft, aware, overlay, expected) in cases {
            let workspace_id = if overlay { 3 } else { 0 };
            assert_eq!(
                decide(soft, aware, workspace_id),
                expected,
                "soft={soft} aware={aware} overlay={overlay}"
            );
            assert_eq!(decide(soft, aware, workspace_id), decide(soft, aware, workspace_id));
        }
    }

    #[test]
    fn table_policy_reads_overlay_id_from_row() {
        let schema = StaticSchema::new("pages").with_table(
            "tt_content",
            TableSchema {
                soft_delete: Some("deleted".into()),
                workspace_id: Some("t3ver_wsid".into()),
                ..TableSchema::default()
            },
        );
        let policy = TablePolicy::for_table(&schema, "tt_content");
        let live = Row::new().with("uid", 1).with("t3ver_wsid", 0);
        let overlay = Row::new().with("uid", 2).with("t3ver_wsid", 4);
        assert_eq!(policy.action_for(&live), RepairAction::SoftDelete);
        assert_eq!(policy.action_for(&overlay), RepairAction::HardDelete);
    }
}
