use super::support::{is_deleted, live, select};
use super::{Check, CheckContext, RepairClass};
use crate::affected::AffectedRows;
use crate::rootline::RootlineResolver;
use crate::store::Predicate;
use crate::tree::find_unreachable;
use crate::AppResult;

pub(crate) struct NegativePid;

impl Check for NegativePid {
    fn id(&self) -> &'static str {
        "records_with_negative_pid"
    }

    fn title(&self) -> &'static str {
        "Records with a negative pid"
    }

    fn description(&self) -> &'static str {
        "Negative parent ids are leftovers of an old versioning scheme. Such rows are removed."
    }

    fn class(&self) -> RepairClass {
        RepairClass::Remove
    }

    fn requires(&self) -> &'static [&'static str] {
        &["workspace_overlays_language_mismatch"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in ctx.schema.tables() {
            let rows = select(ctx.store, ctx.schema, table, &Predicate::all().lt("pid", 0))?;
            affected.add_rows(table, rows);
        }
        Ok(affected)
    }
}

/// Hierarchy nodes not connected to the virtual root.
pub(crate) struct BrokenTree;

impl Check for BrokenTree {
    fn id(&self) -> &'static str {
        "pages_broken_tree"
    }

    fn title(&self) -> &'static str {
        "Pages not connected to the root"
    }

    fn description(&self) -> &'static str {
        "Every page must reach the virtual root by following pid. Pages with a missing ancestor or inside a cycle are deleted."
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        &["records_with_negative_pid"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let table = ctx.schema.hierarchy_table();
        let rows = select(ctx.store, ctx.schema, table, &Predicate::all())?;
        let mut affected = AffectedRows::new();
        for row in find_unreachable(rows) {
            if !is_deleted(ctx.schema, table, &row) {
                let reason = format!("no path to root via pid {}", row.pid());
                affected.add_with_reason(table, row, reason);
            }
        }
        Ok(affected)
    }
}

/// Live pages below a soft-deleted ancestor.
pub(crate) struct DeletedAncestor;

impl Check for DeletedAncestor {
    fn id(&self) -> &'static str {
        "pages_deleted_ancestor"
    }

    fn title(&self) -> &'static str {
        "Live pages below deleted pages"
    }

    fn description(&self) -> &'static str {
        "Deleting a page deletes its subtree. Live pages with a soft-deleted ancestor are deleted too."
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        &["pages_broken_tree"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let table = ctx.schema.hierarchy_table();
        let mut affected = AffectedRows::new();
        if ctx.schema.soft_delete_field(table).is_none() {
            return Ok(affected);
        }
        let rows = select(ctx.store, ctx.schema, table, &live(ctx.schema, table))?;
        let mut resolver = RootlineResolver::new(ctx.store, ctx.schema);
        for row in rows {
            let rootline = resolver.resolve(row.uid())?;
            if rootline.iter().any(|entry| entry.is_missing) {
                ctx.prerequisite_missing(self.id(), "pages_broken_tree", table, row.uid())?;
                continue;
            }
            let deleted = rootline
                .iter()
                .rev()
                .skip(1)
                .find(|entry| entry.deleted)
                .map(|entry| entry.uid);
            if let Some(ancestor) = deleted {
                affected.add_with_reason(table, row, format!("ancestor {ancestor} deleted"));
            }
        }
        resolver.clear_cache();
        Ok(affected)
    }
}
