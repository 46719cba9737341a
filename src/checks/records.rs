//! Records and the page they live on.

use std::collections::HashMap;

use super::support::{index_by_uid, is_deleted, live, record_tables, select};
use super::{Check, CheckContext, RepairClass};
use crate::affected::AffectedRows;
use crate::schema::RootLevel;
use crate::store::{Predicate, Row};
use crate::AppResult;

fn pages(ctx: &CheckContext<'_>) -> AppResult<HashMap<i64, Row>> {
    index_by_uid(ctx.store, ctx.schema, ctx.schema.hierarchy_table())
}

pub(crate) struct OnMissingPages;

impl Check for OnMissingPages {
    fn id(&self) -> &'static str {
        "records_on_missing_pages"
    }

    fn title(&self) -> &'static str {
        "Records on missing pages"
    }

    fn description(&self) -> &'static str {
        "Live records whose pid points to a page that does not exist are deleted."
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        &["pages_deleted_ancestor"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let pages = pages(ctx)?;
        let mut affected = AffectedRows::new();
        for table in record_tables(ctx.schema) {
            let predicate = live(ctx.schema, table).gt("pid", 0);
            for row in select(ctx.store, ctx.schema, table, &predicate)? {
                if !pages.contains_key(&row.pid()) {
                    let reason = format!("page {} missing", row.pid());
                    affected.add_with_reason(table, row, reason);
                }
            }
        }
        Ok(affected)
    }
}

pub(crate) struct DeletedOnMissingPages;

impl Check for DeletedOnMissingPages {
    fn id(&self) -> &'static str {
        "deleted_records_on_missing_pages"
    }

    fn title(&self) -> &'static str {
        "Deleted records on missing pages"
    }

    fn description(&self) -> &'static str {
        "Soft-deleted records on pages that do not exist can never be restored and are removed."
    }

    fn class(&self) -> RepairClass {
        RepairClass::Remove
    }

    fn requires(&self) -> &'static [&'static str] {
        &["records_on_missing_pages"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let pages = pages(ctx)?;
        let mut affected = AffectedRows::new();
        for table in record_tables(ctx.schema) {
            let Some(deleted) = ctx.schema.soft_delete_field(table) else {
                continue;
            };
            let predicate = Predicate::all().ne(deleted, 0).gt("pid", 0);
            for row in select(ctx.store, ctx.schema, table, &predicate)? {
                if !pages.contains_key(&row.pid()) {
                    let reason = format!("page {} missing", row.pid());
                    affected.add_with_reason(table, row, reason);
                }
            }
        }
        Ok(affected)
    }
}

pub(crate) struct OnDeletedPages;

impl Check for OnDeletedPages {
    fn id(&self) -> &'static str {
        "records_on_deleted_pages"
    }

    fn title(&self) -> &'static str {
        "Live records on deleted pages"
    }

    fn description(&self) -> &'static str {
        "Records on a soft-deleted page are deleted along with it."
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        &["records_on_missing_pages", "pages_deleted_ancestor"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let hierarchy = ctx.schema.hierarchy_table();
        let mut affected = AffectedRows::new();
        if ctx.schema.soft_delete_field(hierarchy).is_none() {
            return Ok(affected);
        }
        let pages = pages(ctx)?;
        for table in record_tables(ctx.schema) {
            let predicate = live(ctx.schema, table).gt("pid", 0);
            for row in select(ctx.store, ctx.schema, table, &predicate)? {
                let Some(page) = pages.get(&row.pid()) else {
                    ctx.prerequisite_missing(self.id(), "records_on_missing_pages", table, row.uid())?;
                    continue;
                };
                if is_deleted(ctx.schema, hierarchy, page) {
                    let reason = format!("page {} deleted", row.pid());
                    affected.add_with_reason(table, row, reason);
                }
            }
        }
        Ok(affected)
    }
}

/// Records placed where their table's root level forbids.
pub(crate) struct RootLevelViolation {
    level: RootLevel,
}

impl RootLevelViolation {
    pub(crate) fn on_root() -> Self {
        Self {
            level: RootLevel::PagesOnly,
        }
    }

    pub(crate) fn off_root() -> Self {
        Self {
            level: RootLevel::RootOnly,
        }
    }
}

impl Check for RootLevelViolation {
    fn id(&self) -> &'static str {
        match self.level {
            RootLevel::RootOnly => "records_off_root_not_allowed",
            _ => "records_on_root_not_allowed",
        }
    }

    fn title(&self) -> &'static str {
        match self.level {
            RootLevel::RootOnly => "Root-only records below the root",
            _ => "Page-only records on the root",
        }
    }

    fn description(&self) -> &'static str {
        match self.level {
            RootLevel::RootOnly => "Tables restricted to the virtual root may not have records on regular pages.",
            _ => "Tables restricted to regular pages may not have records on the virtual root (pid 0).",
        }
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        &["records_on_deleted_pages"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in record_tables(ctx.schema) {
            if ctx.schema.root_level(table) != self.level {
                continue;
            }
            let predicate = match self.level {
                RootLevel::RootOnly => live(ctx.schema, table).ne("pid", 0),
                _ => live(ctx.schema, table).eq("pid", 0),
            };
            for row in select(ctx.store, ctx.schema, table, &predicate)? {
                let reason = format!("pid {} not allowed", row.pid());
                affected.add_with_reason(table, row, reason);
            }
        }
        Ok(affected)
    }
}

