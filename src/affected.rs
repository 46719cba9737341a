use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::{Row, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedRow {
    pub row: Row,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Target values for field-update repairs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<(String, Value)>,
}

/// Rows flagged by one detection pass, grouped by table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AffectedRows {
    tables: BTreeMap<String, Vec<AffectedRow>>,
    /// Diagnostic columns worth showing in detail views, per table.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extra_columns: BTreeMap<String, Vec<String>>,
}

impl AffectedRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, table: &str, row: Row) {
        self.push(table, row, None);
    }

    pub fn add_with_reason(&mut self, table: &str, row: Row, reason: impl Into<String>) {
        self.push(table, row, Some(reason.into()));
    }

    /// Flags `row` for an in-place update of `changes`.
    pub fn add_change(
        &mut self,
        table: &str,
        row: Row,
        changes: Vec<(String, Value)>,
        reason: impl Into<String>,
    ) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(AffectedRow {
                row,
                reason: Some(reason.into()),
                changes,
            });
    }

    fn push(&mut self, table: &str, row: Row, reason: Option<String>) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(AffectedRow {
                row,
                reason,
                changes: Vec::new(),
            });
    }

    pub fn add_rows(&mut self, table: &str, rows: Vec<Row>) {
        for row in rows {
            self.add(table, row);
        }
    }

    pub fn set_extra_columns(&mut self, table: &str, columns: &[&str]) {
        self.extra_columns.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn extra_columns(&self, table: &str) -> &[String] {
        self.extra_columns
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(Vec::is_empty)
    }

    pub fn total(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[AffectedRow])> {
        self.tables
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(table, rows)| (table.as_str(), rows.as_slice()))
    }

    pub fn rows(&self, table: &str) -> &[AffectedRow] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Table name -> affected row count, skipping empty tables.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.tables()
            .map(|(table, rows)| (table.to_string(), rows.len()))
            .collect()
    }

    pub fn uids(&self, table: &str) -> Vec<i64> {
        self.rows(table).iter().map(|r| r.row.uid()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_skip_tables_without_rows() {
        let mut affected = AffectedRows::new();
        affected.add_rows("pages", Vec::new());
        assert!(affected.is_empty());
        affected.add("tt_content", Row::new().with("uid", 3));
        affected.add_with_reason("tt_content", Row::new().with("uid", 4), "parent missing");
        assert_eq!(affected.total(), 2);
        assert_eq!(affected.counts().len(), 1);
        assert_eq!(affected.uids("tt_content"), vec![3, 4]);
        assert_eq!(
            affected.rows("tt_content")[1].reason.as_deref(),
            Some("parent missing")
        );
    }

    #[test]
    fn change_rows_carry_target_values() {
        let mut affected = AffectedRows::new();
        affected.add_change(
            "tt_content",
            Row::new().with("uid", 7).with("pid", 3),
            vec![("pid".to_string(), Value::Int(5))],
            "parent lives on page 5",
        );
        let row = &affected.rows("tt_content")[0];
        assert_eq!(row.changes, vec![("pid".to_string(), Value::Int(5))]);
        let json = serde_json::to_value(&affected).unwrap();
        assert_eq!(json["tables"]["tt_content"][0]["row"]["uid"], 7);
    }
}
