//! Schema Metadata Provider.
//!
//! Checks never read a global registry; they receive a `&dyn SchemaProvider`
//! through their context and ask it which capability fields a table has.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod document;

pub use document::{SchemaDocument, SchemaError};

/// Where records of a table may live in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootLevel {
    /// Only on regular pages, never on the virtual root (pid 0).
    PagesOnly,
    /// Only on the virtual root.
    RootOnly,
    #[default]
    Anywhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    SoftDelete,
    Hidden,
    /// Language field plus translation parent field.
    Translation,
    WorkspaceId,
    /// Workspace id plus the pointer from an overlay to its live row.
    WorkspaceOrigin,
}

/// Inline (1:n) composition: rows of `child_table` point at their owning
/// `parent_table` row via `foreign_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineRelation {
    #[serde(default)]
    pub parent_table: String,
    pub field: String,
    pub child_table: String,
    pub foreign_field: String,
    /// Column on the child storing the parent table name, when one child
    /// table serves several parent tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_table_field: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub root_level: RootLevel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline: Vec<InlineRelation>,
}

impl TableSchema {
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::SoftDelete => self.soft_delete.is_some(),
            Capability::Hidden => self.hidden.is_some(),
            Capability::Translation => self.language.is_some() && self.translation_parent.is_some(),
            Capability::WorkspaceId => self.workspace_id.is_some(),
            Capability::WorkspaceOrigin => {
                self.workspace_id.is_some() && self.workspace_origin.is_some()
            }
        }
    }
}

/// Read-only capability lookup over table metadata.
pub trait SchemaProvider {
    /// Name of the tree-shaped table every other row lives in.
    fn hierarchy_table(&self) -> &str;

    /// Table listing the workspaces overlays belong to; `None` when workspaces are disabled.
    fn workspace_table(&self) -> Option<&str>;

    /// All configured tables, in stable order.
    fn tables(&self) -> Vec<&str>;

    fn table(&self, name: &str) -> Option<&TableSchema>;

    fn soft_delete_field(&self, table: &str) -> Option<&str> {
        self.table(table).and_then(|t| t.soft_delete.as_deref())
    }

    fn hidden_field(&self, table: &str) -> Option<&str> {
        self.table(table).and_then(|t| t.hidden.as_deref())
    }

    fn language_field(&self, table: &str) -> Option<&str> {
        self.table(table).and_then(|t| t.language.as_deref())
    }

    fn translation_parent_field(&self, table: &str) -> Option<&str> {
        self.table(table).and_then(|t| t.translation_parent.as_deref())
    }

    fn workspace_id_field(&self, table: &str) -> Option<&str> {
        self.table(table).and_then(|t| t.workspace_id.as_deref())
    }

    fn workspace_origin_field(&self, table: &str) -> Option<&str> {
        self.table(table).and_then(|t| t.workspace_origin.as_deref())
    }

    fn label_field(&self, table: &str) -> Option<&str> {
        self.table(table).and_then(|t| t.label.as_deref())
    }

    fn root_level(&self, table: &str) -> RootLevel {
        self.table(table).map(|t| t.root_level).unwrap_or_default()
    }

    fn list_tables_with(&self, capability: Capability) -> Vec<&str> {
        self.tables()
            .into_iter()
            .filter(|name| self.table(name).is_some_and(|t| t.has(capability)))
            .collect()
    }

    /// Every inline relation, with `parent_table` filled in.
    fn inline_relations(&self) -> Vec<InlineRelation> {
        let mut out = Vec::new();
        for name in self.tables() {
            if let Some(table) = self.table(name) {
                for relation in &table.inline {
                    let mut relation = relation.clone();
                    relation.parent_table = name.to_string();
                    out.push(relation);
                }
            }
        }
        out
    }
}

/// In-memory provider built from a [`SchemaDocument`] or assembled in code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSchema {
    hierarchy_table: String,
    workspace_table: Option<String>,
    tables: BTreeMap<String, TableSchema>,
}

impl StaticSchema {
    pub fn new(hierarchy_table: impl Into<String>) -> Self {
        Self {
            hierarchy_table: hierarchy_table.into(),
            workspace_table: None,
            tables: BTreeMap::new(),
        }
    }

    pub fn with_workspace_table(mut self, table: impl Into<String>) -> Self {
        self.workspace_table = Some(table.into());
        self
    }

    pub fn without_workspace_table(mut self) -> Self {
        self.workspace_table = None;
        self
    }

    pub fn with_table(mut self, name: impl Into<String>, schema: TableSchema) -> Self {
        self.tables.insert(name.into(), schema);
        self
    }

    pub(crate) fn tables_mut(&mut self) -> &mut BTreeMap<String, TableSchema> {
        &mut self.tables
    }
}

impl SchemaProvider for StaticSchema {
    fn hierarchy_table(&self) -> &str {
        &self.hierarchy_table
    }

    fn workspace_table(&self) -> Option<&str> {
        self.workspace_table.as_deref()
    }

    fn tables(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }
}
