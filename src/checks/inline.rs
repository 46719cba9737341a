//! Inline (1:n) children and their owning parent row.

use std::collections::{BTreeMap, HashMap};

use super::support::{columns, index_by_uid, is_deleted, live};
use super::{Check, CheckContext, RepairClass};
use crate::affected::AffectedRows;
use crate::schema::SchemaProvider;
use crate::store::{Condition, OrderBy, Predicate, Row, RowStore, Value};
use crate::AppResult;

/// Relations sharing one child table and pointer column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChildGroup {
    pub child_table: String,
    pub foreign_field: String,
    pub table_field: Option<String>,
    pub parents: Vec<String>,
}

impl ChildGroup {
    fn restrict(&self, predicate: Predicate) -> Predicate {
        match &self.table_field {
            Some(field) => predicate.is_in(
                field,
                self.parents.iter().map(|p| Value::from(p.as_str())).collect(),
            ),
            None => predicate,
        }
    }

    /// Pointer columns read on top of the usual capability fields.
    fn pointer_columns(&self) -> Vec<&str> {
        std::iter::once(self.foreign_field.as_str())
            .chain(self.table_field.as_deref())
            .collect()
    }

    /// Child rows matching `predicate`, pointer columns included.
    fn select(
        &self,
        store: &dyn RowStore,
        schema: &dyn SchemaProvider,
        predicate: &Predicate,
    ) -> AppResult<Vec<Row>> {
        let pointers = self.pointer_columns();
        let wanted = columns(schema, &self.child_table, &pointers);
        store.select_many(&self.child_table, &wanted, predicate, &[OrderBy::asc("uid")])
    }

    /// Parent tables a child row may belong to.
    fn candidates<'g>(&'g self, row: &Row) -> Vec<&'g str> {
        match &self.table_field {
            Some(field) => {
                let named = row.text(field);
                self.parents
                    .iter()
                    .filter(|p| **p == named)
                    .map(String::as_str)
                    .collect()
            }
            None => self.parents.iter().map(String::as_str).collect(),
        }
    }
}

pub(crate) fn child_groups(schema: &dyn SchemaProvider) -> Vec<ChildGroup> {
    let mut groups: BTreeMap<(String, String, Option<String>), Vec<String>> = BTreeMap::new();
    for relation in schema.inline_relations() {
        let parents = groups
            .entry((
                relation.child_table,
                relation.foreign_field,
                relation.foreign_table_field,
            ))
            .or_default();
        if !parents.contains(&relation.parent_table) {
            parents.push(relation.parent_table);
        }
    }
    groups
        .into_iter()
        .map(|((child_table, foreign_field, table_field), parents)| ChildGroup {
            child_table,
            foreign_field,
            table_field,
            parents,
        })
        .collect()
}

/// A live child row with a non-zero pointer and the parent it resolves to.
struct Linked {
    row: Row,
    parent: Option<(String, Row)>,
}

fn linked_children(ctx: &CheckContext<'_>, group: &ChildGroup) -> AppResult<Vec<Linked>> {
    let predicate = group.restrict(live(ctx.schema, &group.child_table).gt(&group.foreign_field, 0));
    let rows = group.select(ctx.store, ctx.schema, &predicate)?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let mut indexes: HashMap<&str, HashMap<i64, Row>> = HashMap::new();
    for parent in &group.parents {
        indexes.insert(parent.as_str(), index_by_uid(ctx.store, ctx.schema, parent)?);
    }
    Ok(rows
        .into_iter()
        .map(|row| {
            let target = row.int(&group.foreign_field);
            let parent = group.candidates(&row).into_iter().find_map(|table| {
                indexes
                    .get(table)
                    .and_then(|index| index.get(&target))
                    .map(|parent| (table.to_string(), parent.clone()))
            });
            Linked { row, parent }
        })
        .collect())
}

pub(crate) struct ParentTableInvalid;

impl Check for ParentTableInvalid {
    fn id(&self) -> &'static str {
        "inline_children_parent_table_invalid"
    }

    fn title(&self) -> &'static str {
        "Inline children naming an unknown parent table"
    }

    fn description(&self) -> &'static str {
        "Children storing their parent table name must name a table that owns such children. Others are removed."
    }

    fn class(&self) -> RepairClass {
        RepairClass::Remove
    }

    fn requires(&self) -> &'static [&'static str] {
        &["records_translation_duplicates"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut valid: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for group in child_groups(ctx.schema) {
            if let Some(field) = group.table_field {
                valid
                    .entry((group.child_table, field))
                    .or_default()
                    .extend(group.parents);
            }
        }
        let mut affected = AffectedRows::new();
        for ((child, field), parents) in valid {
            let allowed: Vec<Value> = parents.iter().map(|p| Value::from(p.as_str())).collect();
            let wanted = columns(ctx.schema, &child, &[field.as_str()]);
            let rows = ctx.store.select_many(
                &child,
                &wanted,
                &Predicate::all().any(vec![
                    Condition::NotIn(field.clone(), allowed),
                    Condition::IsNull(field.clone()),
                ]),
                &[OrderBy::asc("uid")],
            )?;
            affected.set_extra_columns(&child, &[field.as_str()]);
            for row in rows {
                let reason = format!("parent table '{}' not allowed", row.text(&field));
                affected.add_with_reason(&child, row, reason);
            }
        }
        Ok(affected)
    }
}

pub(crate) struct WithoutParentId;

impl Check for WithoutParentId {
    fn id(&self) -> &'static str {
        "inline_children_without_parent_id"
    }

    fn title(&self) -> &'static str {
        "Inline children without a parent id"
    }

    fn description(&self) -> &'static str {
        "Live inline children naming their parent table but with a parent pointer of 0 belong to nothing and are deleted."
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        &["inline_children_parent_table_invalid"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        // Without a table-name column a zero pointer is indistinguishable from
        // an ordinary row of the child table.
        for group in child_groups(ctx.schema).into_iter().filter(|g| g.table_field.is_some()) {
            let predicate =
                group.restrict(live(ctx.schema, &group.child_table).eq(&group.foreign_field, 0));
            affected.set_extra_columns(&group.child_table, &group.pointer_columns());
            for row in group.select(ctx.store, ctx.schema, &predicate)? {
                let reason = format!("{} = 0", group.foreign_field);
                affected.add_with_reason(&group.child_table, row, reason);
            }
        }
        Ok(affected)
    }
}

pub(crate) struct ParentMissing;

impl Check for ParentMissing {
    fn id(&self) -> &'static str {
        "inline_children_parent_missing"
    }

    fn title(&self) -> &'static str {
        "Inline children of missing parents"
    }

    fn description(&self) -> &'static str {
        "Live inline children pointing to a parent row that does not exist are deleted."
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        &["inline_children_parent_table_invalid"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for group in child_groups(ctx.schema) {
            for linked in linked_children(ctx, &group)? {
                if linked.parent.is_none() {
                    let reason = format!("parent {} missing", linked.row.int(&group.foreign_field));
                    affected.add_with_reason(&group.child_table, linked.row, reason);
                }
            }
        }
        Ok(affected)
    }
}

/// Which relation between an existing parent and its child is broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkDefect {
    ParentDeleted,
    DifferentPid,
    LanguageMismatch,
    WorkspaceMismatch,
}

pub(crate) struct BrokenLink {
    defect: LinkDefect,
}

impl BrokenLink {
    pub(crate) fn new(defect: LinkDefect) -> Self {
        Self { defect }
    }

    fn inspect(
        &self,
        schema: &dyn SchemaProvider,
        child_table: &str,
        child: &Row,
        parent_table: &str,
        parent: &Row,
    ) -> Option<(String, Vec<(String, Value)>)> {
        match self.defect {
            LinkDefect::ParentDeleted => is_deleted(schema, parent_table, parent)
                .then(|| (format!("parent {parent_table}:{} deleted", parent.uid()), Vec::new())),
            LinkDefect::DifferentPid => {
                // Children of a hierarchy row live on that row itself.
                let expected = if parent_table == schema.hierarchy_table() {
                    parent.uid()
                } else {
                    parent.pid()
                };
                (child.pid() != expected).then(|| {
                    (
                        format!("parent {parent_table}:{} expects pid {expected}", parent.uid()),
                        vec![("pid".to_string(), Value::Int(expected))],
                    )
                })
            }
            LinkDefect::LanguageMismatch => {
                let child_language = schema.language_field(child_table)?;
                let parent_language = schema.language_field(parent_table)?;
                let (own, theirs) = (child.int(child_language), parent.int(parent_language));
                (own != theirs).then(|| {
                    (
                        format!("language {own} differs from parent language {theirs}"),
                        Vec::new(),
                    )
                })
            }
            LinkDefect::WorkspaceMismatch => {
                let child_ws = child.int(schema.workspace_id_field(child_table)?);
                let parent_ws = parent.int(schema.workspace_id_field(parent_table)?);
                (child_ws > 0 && parent_ws != 0 && child_ws != parent_ws).then(|| {
                    (
                        format!("workspace {child_ws} differs from parent workspace {parent_ws}"),
                        Vec::new(),
                    )
                })
            }
        }
    }
}

impl Check for BrokenLink {
    fn id(&self) -> &'static str {
        match self.defect {
            LinkDefect::ParentDeleted => "inline_children_parent_deleted",
            LinkDefect::DifferentPid => "inline_children_parent_different_pid",
            LinkDefect::LanguageMismatch => "inline_children_language_mismatch",
            LinkDefect::WorkspaceMismatch => "inline_children_workspace_mismatch",
        }
    }

    fn title(&self) -> &'static str {
        match self.defect {
            LinkDefect::ParentDeleted => "Live inline children of deleted parents",
            LinkDefect::DifferentPid => "Inline children on a different page than their parent",
            LinkDefect::LanguageMismatch => "Inline children in a different language than their parent",
            LinkDefect::WorkspaceMismatch => "Inline overlays attached to another workspace",
        }
    }

    fn description(&self) -> &'static str {
        match self.defect {
            LinkDefect::ParentDeleted => "Deleting a parent deletes its inline children.",
            LinkDefect::DifferentPid => "Inline children follow their parent's page. The pid is corrected.",
            LinkDefect::LanguageMismatch => {
                "Inline children share their parent's language. Mismatching children are deleted."
            }
            LinkDefect::WorkspaceMismatch => {
                "A child overlay must belong to the workspace of its parent overlay. Mismatching child overlays are removed."
            }
        }
    }

    fn class(&self) -> RepairClass {
        match self.defect {
            LinkDefect::DifferentPid => RepairClass::FieldUpdate,
            LinkDefect::WorkspaceMismatch => RepairClass::WorkspaceRemove,
            LinkDefect::ParentDeleted | LinkDefect::LanguageMismatch => RepairClass::SoftDelete,
        }
    }

    fn requires(&self) -> &'static [&'static str] {
        match self.defect {
            LinkDefect::ParentDeleted => &["inline_children_parent_missing"],
            _ => &["inline_children_parent_deleted"],
        }
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for group in child_groups(ctx.schema) {
            let child_table = group.child_table.as_str();
            for linked in linked_children(ctx, &group)? {
                let Some((parent_table, parent)) = linked.parent.as_ref() else {
                    ctx.prerequisite_missing(
                        self.id(),
                        "inline_children_parent_missing",
                        child_table,
                        linked.row.uid(),
                    )?;
                    continue;
                };
                let found = self.inspect(ctx.schema, child_table, &linked.row, parent_table, parent);
                match found {
                    Some((reason, changes)) if !changes.is_empty() => {
                        affected.add_change(child_table, linked.row, changes, reason)
                    }
                    Some((reason, _)) => affected.add_with_reason(child_table, linked.row, reason),
                    None => {}
                }
            }
        }
        Ok(affected)
    }
}
