//! Workspace overlay consistency.
//!
//! An overlay is a row with a workspace id above 0. It points at the live row
//! it overrides via the workspace origin field; 0 marks a row created inside
//! the workspace.

use std::collections::HashMap;

use super::support::{index_by_uid, is_deleted, live, select};
use super::{Check, CheckContext, RepairClass};
use crate::affected::AffectedRows;
use crate::schema::Capability;
use crate::store::{Predicate, Row, Value};
use crate::AppResult;

/// Overlays with an origin pointer, plus every row of the table by uid.
fn overlays_with_origin(
    ctx: &CheckContext<'_>,
    table: &str,
) -> AppResult<Option<(Vec<Row>, HashMap<i64, Row>)>> {
    let (Some(wsid), Some(origin)) = (
        ctx.schema.workspace_id_field(table),
        ctx.schema.workspace_origin_field(table),
    ) else {
        return Ok(None);
    };
    let overlays = select(
        ctx.store,
        ctx.schema,
        table,
        &Predicate::all().gt(wsid, 0).gt(origin, 0),
    )?;
    if overlays.is_empty() {
        return Ok(Some((overlays, HashMap::new())));
    }
    let index = index_by_uid(ctx.store, ctx.schema, table)?;
    Ok(Some((overlays, index)))
}

pub(crate) struct RecordsWithoutWorkspaces;

impl Check for RecordsWithoutWorkspaces {
    fn id(&self) -> &'static str {
        "workspace_records_without_workspaces"
    }

    fn title(&self) -> &'static str {
        "Workspace records while workspaces are disabled"
    }

    fn description(&self) -> &'static str {
        "Without a workspace table every row with a workspace id other than 0 is a leftover overlay and is removed."
    }

    fn class(&self) -> RepairClass {
        RepairClass::WorkspaceRemove
    }

    fn requires(&self) -> &'static [&'static str] {
        &["records_hidden_flag_invalid"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        if ctx.schema.workspace_table().is_some() {
            return Ok(affected);
        }
        for table in ctx.schema.list_tables_with(Capability::WorkspaceId) {
            let Some(wsid) = ctx.schema.workspace_id_field(table) else {
                continue;
            };
            for row in select(ctx.store, ctx.schema, table, &Predicate::all().ne(wsid, 0))? {
                let reason = format!("workspace {} while workspaces are disabled", row.int(wsid));
                affected.add_with_reason(table, row, reason);
            }
        }
        Ok(affected)
    }
}

pub(crate) struct RecordsOfDeletedWorkspaces;

impl Check for RecordsOfDeletedWorkspaces {
    fn id(&self) -> &'static str {
        "workspace_records_of_deleted_workspaces"
    }

    fn title(&self) -> &'static str {
        "Workspace records of missing or deleted workspaces"
    }

    fn description(&self) -> &'static str {
        "Overlays belonging to a workspace that no longer exists or is soft deleted are removed."
    }

    fn class(&self) -> RepairClass {
        RepairClass::WorkspaceRemove
    }

    fn requires(&self) -> &'static [&'static str] {
        &["workspace_records_without_workspaces"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        let Some(workspace_table) = ctx.schema.workspace_table() else {
            return Ok(affected);
        };
        let workspaces = index_by_uid(ctx.store, ctx.schema, workspace_table)?;
        for table in ctx.schema.list_tables_with(Capability::WorkspaceId) {
            let Some(wsid) = ctx.schema.workspace_id_field(table) else {
                continue;
            };
            for row in select(ctx.store, ctx.schema, table, &Predicate::all().ne(wsid, 0))? {
                let workspace = row.int(wsid);
                let reason = match workspaces.get(&workspace) {
                    None => format!("workspace {workspace} missing"),
                    Some(ws) if is_deleted(ctx.schema, workspace_table, ws) => {
                        format!("workspace {workspace} deleted")
                    }
                    Some(_) => continue,
                };
                affected.add_with_reason(table, row, reason);
            }
        }
        Ok(affected)
    }
}

pub(crate) struct SoftDeletedOverlays;

impl Check for SoftDeletedOverlays {
    fn id(&self) -> &'static str {
        "workspace_soft_deleted_overlays"
    }

    fn title(&self) -> &'static str {
        "Soft-deleted workspace overlays"
    }

    fn description(&self) -> &'static str {
        "Overlays are never soft deleted; a discarded overlay is removed."
    }

    fn class(&self) -> RepairClass {
        RepairClass::WorkspaceRemove
    }

    fn requires(&self) -> &'static [&'static str] {
        &["workspace_records_of_deleted_workspaces"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in ctx.schema.list_tables_with(Capability::WorkspaceId) {
            let (Some(wsid), Some(deleted)) = (
                ctx.schema.workspace_id_field(table),
                ctx.schema.soft_delete_field(table),
            ) else {
                continue;
            };
            let predicate = Predicate::all().gt(wsid, 0).ne(deleted, 0);
            affected.add_rows(table, select(ctx.store, ctx.schema, table, &predicate)?);
        }
        Ok(affected)
    }
}

pub(crate) struct LiveRecordsWithOrigin;

impl Check for LiveRecordsWithOrigin {
    fn id(&self) -> &'static str {
        "workspace_live_records_with_origin"
    }

    fn title(&self) -> &'static str {
        "Live records pointing to an origin"
    }

    fn description(&self) -> &'static str {
        "Only overlays point to a live origin row. The origin pointer of live rows is reset to 0."
    }

    fn class(&self) -> RepairClass {
        RepairClass::FieldUpdate
    }

    fn requires(&self) -> &'static [&'static str] {
        &["workspace_records_of_deleted_workspaces"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in ctx.schema.list_tables_with(Capability::WorkspaceOrigin) {
            let (Some(wsid), Some(origin)) = (
                ctx.schema.workspace_id_field(table),
                ctx.schema.workspace_origin_field(table),
            ) else {
                continue;
            };
            let predicate = live(ctx.schema, table).eq(wsid, 0).ne(origin, 0);
            for row in select(ctx.store, ctx.schema, table, &predicate)? {
                let reason = format!("live row points to origin {}", row.int(origin));
                affected.add_change(table, row, vec![(origin.to_string(), Value::Int(0))], reason);
            }
        }
        Ok(affected)
    }
}

pub(crate) struct OverlaysWithoutLiveRecord;

impl Check for OverlaysWithoutLiveRecord {
    fn id(&self) -> &'static str {
        "workspace_overlays_without_live_record"
    }

    fn title(&self) -> &'static str {
        "Overlays of missing live records"
    }

    fn description(&self) -> &'static str {
        "An overlay whose origin row does not exist has nothing to override and is removed."
    }

    fn class(&self) -> RepairClass {
        RepairClass::WorkspaceRemove
    }

    fn requires(&self) -> &'static [&'static str] {
        &["workspace_live_records_with_origin", "workspace_soft_deleted_overlays"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in ctx.schema.list_tables_with(Capability::WorkspaceOrigin) {
            let Some((overlays, index)) = overlays_with_origin(ctx, table)? else {
                continue;
            };
            let origin = ctx.schema.workspace_origin_field(table).unwrap_or_default();
            for row in overlays {
                let target = row.int(origin);
                if !index.contains_key(&target) {
                    affected.add_with_reason(table, row, format!("origin {target} missing"));
                }
            }
        }
        Ok(affected)
    }
}

/// Which property of the origin row disqualifies an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OriginDefect {
    Deleted,
    IsOverlay,
    LanguageMismatch,
}

pub(crate) struct OverlaysWithBadOrigin {
    defect: OriginDefect,
}

impl OverlaysWithBadOrigin {
    pub(crate) fn new(defect: OriginDefect) -> Self {
        Self { defect }
    }

    fn defect_of(&self, ctx: &CheckContext<'_>, table: &str, overlay: &Row, origin: &Row) -> Option<String> {
        match self.defect {
            OriginDefect::Deleted => {
                is_deleted(ctx.schema, table, origin).then(|| format!("origin {} deleted", origin.uid()))
            }
            OriginDefect::IsOverlay => {
                let wsid = ctx.schema.workspace_id_field(table)?;
                (origin.int(wsid) != 0).then(|| {
                    format!("origin {} is an overlay of workspace {}", origin.uid(), origin.int(wsid))
                })
            }
            OriginDefect::LanguageMismatch => {
                let language = ctx.schema.language_field(table)?;
                (overlay.int(language) != origin.int(language)).then(|| {
                    format!(
                        "language {} differs from origin language {}",
                        overlay.int(language),
                        origin.int(language)
                    )
                })
            }
        }
    }
}

impl Check for OverlaysWithBadOrigin {
    fn id(&self) -> &'static str {
        match self.defect {
            OriginDefect::Deleted => "workspace_overlays_of_deleted_live_record",
            OriginDefect::IsOverlay => "workspace_overlays_pointing_to_overlay",
            OriginDefect::LanguageMismatch => "workspace_overlays_language_mismatch",
        }
    }

    fn title(&self) -> &'static str {
        match self.defect {
            OriginDefect::Deleted => "Overlays of soft-deleted live records",
            OriginDefect::IsOverlay => "Overlays pointing to another overlay",
            OriginDefect::LanguageMismatch => "Overlays in a different language than their origin",
        }
    }

    fn description(&self) -> &'static str {
        match self.defect {
            OriginDefect::Deleted => "Overlays of a soft-deleted live row are removed.",
            OriginDefect::IsOverlay => "An origin pointer must target a live row; overlays of overlays are removed.",
            OriginDefect::LanguageMismatch => {
                "An overlay always shares the language of its live row; mismatching overlays are removed."
            }
        }
    }

    fn class(&self) -> RepairClass {
        RepairClass::WorkspaceRemove
    }

    fn requires(&self) -> &'static [&'static str] {
        &["workspace_overlays_without_live_record"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in ctx.schema.list_tables_with(Capability::WorkspaceOrigin) {
            let Some((overlays, index)) = overlays_with_origin(ctx, table)? else {
                continue;
            };
            let origin_field = ctx.schema.workspace_origin_field(table).unwrap_or_default();
            for row in overlays {
                let target = row.int(origin_field);
                let Some(origin) = index.get(&target) else {
                    ctx.prerequisite_missing(
                        self.id(),
                        "workspace_overlays_without_live_record",
                        table,
                        row.uid(),
                    )?;
                    continue;
                };
                if let Some(reason) = self.defect_of(ctx, table, &row, origin) {
                    affected.add_with_reason(table, row, reason);
                }
            }
        }
        Ok(affected)
    }
}
