use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::{SchemaProvider, StaticSchema, TableSchema};
use crate::integrity_errors::IntegrityErrorCode;
use crate::store::RowStore;
use crate::{AppError, AppResult};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern should compile"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("hierarchy table '{0}' is not configured")]
    UnknownHierarchyTable(String),
    #[error("workspace table '{0}' is not configured")]
    UnknownWorkspaceTable(String),
    #[error("inline relation {parent}.{field} targets unconfigured table '{child}'")]
    UnknownChildTable {
        parent: String,
        field: String,
        child: String,
    },
    #[error("table '{table}' declares '{field}' without '{requires}'")]
    IncompleteCapability {
        table: String,
        field: &'static str,
        requires: &'static str,
    },
}

impl From<SchemaError> for AppError {
    fn from(error: SchemaError) -> Self {
        IntegrityErrorCode::SchemaInvalid
            .into_error()
            .with_cause(AppError::new("SCHEMA/VALIDATION", error.to_string()))
    }
}

/// JSON representation of the table metadata registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub hierarchy_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_table: Option<String>,
    pub tables: BTreeMap<String, TableSchema>,
}

impl SchemaDocument {
    pub fn from_json(raw: &str) -> AppResult<Self> {
        let document: SchemaDocument = serde_json::from_str(raw)?;
        document.validate()?;
        Ok(document)
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "read_schema")
                .with_context("path", path.display().to_string())
        })?;
        Self::from_json(&raw).map_err(|err| err.with_context("path", path.display().to_string()))
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        check_ident(&self.hierarchy_table)?;
        if !self.tables.contains_key(&self.hierarchy_table) {
            return Err(SchemaError::UnknownHierarchyTable(
                self.hierarchy_table.clone(),
            ));
        }
        if let Some(workspace) = &self.workspace_table {
            check_ident(workspace)?;
            if !self.tables.contains_key(workspace) {
                return Err(SchemaError::UnknownWorkspaceTable(workspace.clone()));
            }
        }
        for (name, table) in &self.tables {
            check_ident(name)?;
            for field in capability_fields(table).into_iter().flatten() {
                check_ident(field)?;
            }
            if table.translation_parent.is_some() && table.language.is_none() {
                return Err(SchemaError::IncompleteCapability {
                    table: name.clone(),
                    field: "translation_parent",
                    requires: "language",
                });
            }
            if table.workspace_origin.is_some() && table.workspace_id.is_none() {
                return Err(SchemaError::IncompleteCapability {
                    table: name.clone(),
                    field: "workspace_origin",
                    requires: "workspace_id",
                });
            }
            for relation in &table.inline {
                check_ident(&relation.field)?;
                check_ident(&relation.child_table)?;
                check_ident(&relation.foreign_field)?;
                if let Some(field) = &relation.foreign_table_field {
                    check_ident(field)?;
                }
                if !self.tables.contains_key(&relation.child_table) {
                    return Err(SchemaError::UnknownChildTable {
                        parent: name.clone(),
                        field: relation.field.clone(),
                        child: relation.child_table.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn into_schema(self) -> StaticSchema {
        let mut schema = StaticSchema::new(self.hierarchy_table);
        if let Some(workspace) = self.workspace_table {
            schema = schema.with_workspace_table(workspace);
        }
        for (name, table) in self.tables {
            schema = schema.with_table(name, table);
        }
        schema
    }

    /// Builds the provider and drops metadata the database does not back.
    ///
    /// Missing tables and fields are logged and returned as warnings. A missing
    /// hierarchy table is fatal.
    pub fn reconcile(self, store: &dyn RowStore) -> AppResult<(StaticSchema, Vec<String>)> {
        let hierarchy = self.hierarchy_table.clone();
        if !store.table_exists(&hierarchy)? {
            return Err(IntegrityErrorCode::SchemaInvalid
                .into_error()
                .with_context("table", hierarchy)
                .with_context("reason", "hierarchy table does not exist"));
        }

        let mut warnings = Vec::new();
        let mut schema = self.into_schema();
        let names: Vec<String> = schema.tables_mut().keys().cloned().collect();
        for name in names {
            if !store.table_exists(&name)? {
                warnings.push(format!("table '{name}' does not exist; skipped"));
                schema.tables_mut().remove(&name);
                continue;
            }
            if !store.field_exists(&name, "uid")? || !store.field_exists(&name, "pid")? {
                if name == hierarchy {
                    return Err(IntegrityErrorCode::SchemaInvalid
                        .into_error()
                        .with_context("table", hierarchy)
                        .with_context("reason", "hierarchy table lacks uid or pid"));
                }
                warnings.push(format!("table '{name}' lacks uid or pid; skipped"));
                schema.tables_mut().remove(&name);
                continue;
            }
            let mut table = schema.tables_mut().remove(&name).unwrap_or_default();
            for slot in [
                &mut table.soft_delete,
                &mut table.hidden,
                &mut table.language,
                &mut table.translation_parent,
                &mut table.workspace_id,
                &mut table.workspace_origin,
                &mut table.label,
            ] {
                if let Some(field) = slot.as_deref() {
                    if !store.field_exists(&name, field)? {
                        warnings.push(format!("field '{name}.{field}' does not exist; ignored"));
                        *slot = None;
                    }
                }
            }
            if table.language.is_none() {
                table.translation_parent = None;
            }
            if table.workspace_id.is_none() {
                table.workspace_origin = None;
            }
            schema.tables_mut().insert(name, table);
        }

        let existing: Vec<String> = schema.tables_mut().keys().cloned().collect();
        for (name, table) in schema.tables_mut().iter_mut() {
            for relation in std::mem::take(&mut table.inline) {
                if !existing.contains(&relation.child_table) {
                    warnings.push(format!(
                        "inline relation '{}' targets missing table '{}'; ignored",
                        relation.field, relation.child_table
                    ));
                    continue;
                }
                let pointers = std::iter::once(&relation.foreign_field)
                    .chain(relation.foreign_table_field.as_ref());
                let mut missing = None;
                for column in pointers {
                    if !store.field_exists(&relation.child_table, column)? {
                        missing = Some(column.clone());
                        break;
                    }
                }
                if let Some(column) = missing {
                    warnings.push(format!(
                        "inline relation '{name}.{}' needs missing field '{}.{column}'; ignored",
                        relation.field, relation.child_table
                    ));
                    continue;
                }
                table.inline.push(relation);
            }
        }

        let workspace_missing = schema
            .workspace_table()
            .is_some_and(|workspace| !existing.iter().any(|t| t == workspace));
        if workspace_missing {
            warnings.push("workspace table does not exist; workspaces treated as disabled".into());
            schema = schema.without_workspace_table();
        }

        for warning in &warnings {
            warn!(target: "dbmend", area = "schema", "{warning}");
        }
        Ok((schema, warnings))
    }
}

fn capability_fields(table: &TableSchema) -> [Option<&String>; 7] {
    [
        table.soft_delete.as_ref(),
        table.hidden.as_ref(),
        table.language.as_ref(),
        table.translation_parent.as_ref(),
        table.workspace_id.as_ref(),
        table.workspace_origin.as_ref(),
        table.label.as_ref(),
    ]
}

fn check_ident(name: &str) -> Result<(), SchemaError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}
