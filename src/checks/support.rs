//! Query helpers shared by the detection passes.

use std::collections::HashMap;

use crate::schema::SchemaProvider;
use crate::store::{OrderBy, Predicate, Row, RowStore};
use crate::AppResult;

/// Columns a detection reads: uid, pid, every capability field the table
/// has, then `extra`.
pub(crate) fn columns<'s>(
    schema: &'s dyn SchemaProvider,
    table: &str,
    extra: &[&'s str],
) -> Vec<&'s str> {
    let mut out: Vec<&'s str> = vec!["uid", "pid"];
    let fields = [
        schema.soft_delete_field(table),
        schema.workspace_id_field(table),
        schema.workspace_origin_field(table),
        schema.language_field(table),
        schema.translation_parent_field(table),
        schema.label_field(table),
    ];
    for field in fields.into_iter().flatten().chain(extra.iter().copied()) {
        if !out.contains(&field) {
            out.push(field);
        }
    }
    out
}

/// Rows not flagged as soft deleted; every row when the table has no soft-delete field.
pub(crate) fn live(schema: &dyn SchemaProvider, table: &str) -> Predicate {
    Predicate::all().eq_if(schema.soft_delete_field(table), 0)
}

pub(crate) fn is_deleted(schema: &dyn SchemaProvider, table: &str, row: &Row) -> bool {
    schema
        .soft_delete_field(table)
        .is_some_and(|field| row.int(field) != 0)
}

/// All configured tables except the hierarchy table.
pub(crate) fn record_tables(schema: &dyn SchemaProvider) -> Vec<&str> {
    let hierarchy = schema.hierarchy_table();
    schema
        .tables()
        .into_iter()
        .filter(|table| *table != hierarchy)
        .collect()
}

pub(crate) fn select(
    store: &dyn RowStore,
    schema: &dyn SchemaProvider,
    table: &str,
    predicate: &Predicate,
) -> AppResult<Vec<Row>> {
    let columns = columns(schema, table, &[]);
    store.select_many(table, &columns, predicate, &[OrderBy::asc("uid")])
}

/// Every row of `table` keyed by uid, soft-deleted rows included.
pub(crate) fn index_by_uid(
    store: &dyn RowStore,
    schema: &dyn SchemaProvider,
    table: &str,
) -> AppResult<HashMap<i64, Row>> {
    Ok(select(store, schema, table, &Predicate::all())?
        .into_iter()
        .map(|row| (row.uid(), row))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{StaticSchema, TableSchema};

    #[test]
    fn columns_follow_capabilities_without_duplicates() {
        let schema = StaticSchema::new("pages").with_table(
            "pages",
            TableSchema {
                soft_delete: Some("deleted".into()),
                language: Some("sys_language_uid".into()),
                translation_parent: Some("l10n_parent".into()),
                label: Some("title".into()),
                ..TableSchema::default()
            },
        );
        assert_eq!(
            columns(&schema, "pages", &["title", "hidden"]),
            vec!["uid", "pid", "deleted", "sys_language_uid", "l10n_parent", "title", "hidden"]
        );
        assert_eq!(columns(&schema, "unknown", &[]), vec!["uid", "pid"]);
        assert!(live(&schema, "unknown").is_empty());
    }
}
