//! Translation parent pointers.
//!
//! A translated row carries a language above 0 and points at its
//! default-language row through the translation parent field. Language 0 is
//! the default language, -1 means "all languages".

use std::collections::{BTreeMap, HashMap};

use super::support::{index_by_uid, is_deleted, live, select};
use super::{Check, CheckContext, RepairClass};
use crate::affected::AffectedRows;
use crate::schema::{Capability, SchemaProvider};
use crate::store::{Row, Value};
use crate::AppResult;

/// Which tables a translation check covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Pages,
    Records,
}

impl Scope {
    fn tables<'s>(self, schema: &'s dyn SchemaProvider) -> Vec<&'s str> {
        let hierarchy = schema.hierarchy_table();
        schema
            .list_tables_with(Capability::Translation)
            .into_iter()
            .filter(|table| match self {
                Scope::Pages => *table == hierarchy,
                Scope::Records => *table != hierarchy,
            })
            .collect()
    }

    fn pick(self, pages: &'static str, records: &'static str) -> &'static str {
        match self {
            Scope::Pages => pages,
            Scope::Records => records,
        }
    }
}

/// Live translations of `table` that point at a parent, plus the table by uid.
fn translations(ctx: &CheckContext<'_>, table: &str) -> AppResult<(Vec<Row>, HashMap<i64, Row>)> {
    let (Some(language), Some(parent)) = (
        ctx.schema.language_field(table),
        ctx.schema.translation_parent_field(table),
    ) else {
        return Ok((Vec::new(), HashMap::new()));
    };
    let predicate = live(ctx.schema, table).gt(language, 0).gt(parent, 0);
    let rows = select(ctx.store, ctx.schema, table, &predicate)?;
    if rows.is_empty() {
        return Ok((rows, HashMap::new()));
    }
    Ok((rows, index_by_uid(ctx.store, ctx.schema, table)?))
}

/// Rows in the default or "all" language must not point at a parent.
pub(crate) struct UntranslatedWithParent {
    language: i64,
}

impl UntranslatedWithParent {
    pub(crate) fn default_language() -> Self {
        Self { language: 0 }
    }

    pub(crate) fn all_languages() -> Self {
        Self { language: -1 }
    }
}

impl Check for UntranslatedWithParent {
    fn id(&self) -> &'static str {
        if self.language == 0 {
            "records_default_language_with_parent"
        } else {
            "records_all_languages_with_parent"
        }
    }

    fn title(&self) -> &'static str {
        if self.language == 0 {
            "Default language rows with a translation parent"
        } else {
            "All-language rows with a translation parent"
        }
    }

    fn description(&self) -> &'static str {
        if self.language == 0 {
            "Rows in the default language are not translations; their translation parent is reset to 0."
        } else {
            "Rows shown in all languages are not translations; their translation parent is reset to 0."
        }
    }

    fn class(&self) -> RepairClass {
        RepairClass::FieldUpdate
    }

    fn requires(&self) -> &'static [&'static str] {
        if self.language == 0 {
            &["pages_broken_tree"]
        } else {
            &["records_default_language_with_parent"]
        }
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in ctx.schema.list_tables_with(Capability::Translation) {
            let (Some(language), Some(parent)) = (
                ctx.schema.language_field(table),
                ctx.schema.translation_parent_field(table),
            ) else {
                continue;
            };
            let predicate = live(ctx.schema, table).eq(language, self.language).ne(parent, 0);
            for row in select(ctx.store, ctx.schema, table, &predicate)? {
                let reason = format!("language {} with parent {}", self.language, row.int(parent));
                affected.add_change(table, row, vec![(parent.to_string(), Value::Int(0))], reason);
            }
        }
        Ok(affected)
    }
}

pub(crate) struct ParentMissing {
    scope: Scope,
}

impl ParentMissing {
    pub(crate) fn new(scope: Scope) -> Self {
        Self { scope }
    }
}

impl Check for ParentMissing {
    fn id(&self) -> &'static str {
        self.scope
            .pick("pages_translation_parent_missing", "records_translation_parent_missing")
    }

    fn title(&self) -> &'static str {
        self.scope.pick(
            "Page translations without a parent page",
            "Record translations with a missing parent",
        )
    }

    fn description(&self) -> &'static str {
        self.scope.pick(
            "Every translated page points to an existing default-language page. Orphaned translations are deleted.",
            "Translated records pointing to a parent that does not exist are deleted.",
        )
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        match self.scope {
            Scope::Pages => &["pages_broken_tree", "records_all_languages_with_parent"],
            Scope::Records => &["records_all_languages_with_parent", "records_on_deleted_pages"],
        }
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in self.scope.tables(ctx.schema) {
            let (Some(language), Some(parent)) = (
                ctx.schema.language_field(table),
                ctx.schema.translation_parent_field(table),
            ) else {
                continue;
            };
            // Records may be translated without a parent; pages may not.
            let mut predicate = live(ctx.schema, table).gt(language, 0);
            if self.scope == Scope::Records {
                predicate = predicate.gt(parent, 0);
            }
            let rows = select(ctx.store, ctx.schema, table, &predicate)?;
            if rows.is_empty() {
                continue;
            }
            let index = index_by_uid(ctx.store, ctx.schema, table)?;
            for row in rows {
                let target = row.int(parent);
                if target == 0 {
                    affected.add_with_reason(table, row, "translation without parent");
                } else if !index.contains_key(&target) {
                    affected.add_with_reason(table, row, format!("parent {target} missing"));
                }
            }
        }
        Ok(affected)
    }
}

/// Which property of an existing parent disqualifies a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParentDefect {
    Deleted,
    IsTranslation,
}

pub(crate) struct BadParent {
    scope: Scope,
    defect: ParentDefect,
}

impl BadParent {
    pub(crate) fn new(scope: Scope, defect: ParentDefect) -> Self {
        Self { scope, defect }
    }
}

impl Check for BadParent {
    fn id(&self) -> &'static str {
        match self.defect {
            ParentDefect::Deleted => self
                .scope
                .pick("pages_translation_parent_deleted", "records_translation_parent_deleted"),
            ParentDefect::IsTranslation => self.scope.pick(
                "pages_translation_parent_is_translation",
                "records_translation_parent_is_translation",
            ),
        }
    }

    fn title(&self) -> &'static str {
        match self.defect {
            ParentDefect::Deleted => "Translations of deleted parents",
            ParentDefect::IsTranslation => "Translations of translations",
        }
    }

    fn description(&self) -> &'static str {
        match self.defect {
            ParentDefect::Deleted => "Live translations whose default-language parent is soft deleted are deleted.",
            ParentDefect::IsTranslation => {
                "A translation parent must be in the default language. Translations pointing at another translation are deleted."
            }
        }
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        match self.scope {
            Scope::Pages => &["pages_translation_parent_missing"],
            Scope::Records => &["records_translation_parent_missing"],
        }
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let prerequisite = ParentMissing::new(self.scope).id();
        let mut affected = AffectedRows::new();
        for table in self.scope.tables(ctx.schema) {
            let language = ctx.schema.language_field(table).unwrap_or_default();
            let parent_field = ctx.schema.translation_parent_field(table).unwrap_or_default();
            let (rows, index) = translations(ctx, table)?;
            for row in rows {
                let target = row.int(parent_field);
                let Some(parent) = index.get(&target) else {
                    ctx.prerequisite_missing(self.id(), prerequisite, table, row.uid())?;
                    continue;
                };
                let reason = match self.defect {
                    ParentDefect::Deleted => is_deleted(ctx.schema, table, parent)
                        .then(|| format!("parent {target} deleted")),
                    ParentDefect::IsTranslation => (parent.int(language) != 0)
                        .then(|| format!("parent {target} has language {}", parent.int(language))),
                };
                if let Some(reason) = reason {
                    affected.add_with_reason(table, row, reason);
                }
            }
        }
        Ok(affected)
    }
}

/// Translations live on the same page as their parent; pid is copied over.
pub(crate) struct ParentDifferentPid {
    scope: Scope,
}

impl ParentDifferentPid {
    pub(crate) fn new(scope: Scope) -> Self {
        Self { scope }
    }
}

impl Check for ParentDifferentPid {
    fn id(&self) -> &'static str {
        self.scope.pick(
            "pages_translation_parent_different_pid",
            "records_translation_parent_different_pid",
        )
    }

    fn title(&self) -> &'static str {
        "Translations on a different page than their parent"
    }

    fn description(&self) -> &'static str {
        "A translation always shares the pid of its default-language parent. The pid is set to the parent's pid."
    }

    fn class(&self) -> RepairClass {
        RepairClass::FieldUpdate
    }

    fn requires(&self) -> &'static [&'static str] {
        match self.scope {
            Scope::Pages => &["pages_translation_parent_deleted", "pages_translation_parent_is_translation"],
            Scope::Records => &[
                "records_translation_parent_deleted",
                "records_translation_parent_is_translation",
            ],
        }
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let prerequisite = ParentMissing::new(self.scope).id();
        let mut affected = AffectedRows::new();
        for table in self.scope.tables(ctx.schema) {
            let parent_field = ctx.schema.translation_parent_field(table).unwrap_or_default();
            let (rows, index) = translations(ctx, table)?;
            affected.set_extra_columns(table, &[parent_field]);
            for row in rows {
                let target = row.int(parent_field);
                let Some(parent) = index.get(&target) else {
                    ctx.prerequisite_missing(self.id(), prerequisite, table, row.uid())?;
                    continue;
                };
                if parent.pid() != row.pid() {
                    let reason = format!("parent {target} lives on pid {}", parent.pid());
                    let changes = vec![("pid".to_string(), Value::Int(parent.pid()))];
                    affected.add_change(table, row, changes, reason);
                }
            }
        }
        Ok(affected)
    }
}

/// More than one live translation of the same parent into the same language.
pub(crate) struct Duplicates;

impl Check for Duplicates {
    fn id(&self) -> &'static str {
        "records_translation_duplicates"
    }

    fn title(&self) -> &'static str {
        "Duplicate translations"
    }

    fn description(&self) -> &'static str {
        "Each parent has at most one translation per language and workspace. The lowest uid is kept, the others are deleted."
    }

    fn class(&self) -> RepairClass {
        RepairClass::SoftDelete
    }

    fn requires(&self) -> &'static [&'static str] {
        &["pages_translation_parent_different_pid", "records_translation_parent_different_pid"]
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in ctx.schema.list_tables_with(Capability::Translation) {
            let (Some(language), Some(parent)) = (
                ctx.schema.language_field(table),
                ctx.schema.translation_parent_field(table),
            ) else {
                continue;
            };
            let workspace = ctx.schema.workspace_id_field(table);
            let predicate = live(ctx.schema, table).gt(language, 0).gt(parent, 0);
            let mut groups: BTreeMap<(i64, i64, i64), Vec<Row>> = BTreeMap::new();
            for row in select(ctx.store, ctx.schema, table, &predicate)? {
                let key = (
                    row.int(parent),
                    row.int(language),
                    workspace.map(|field| row.int(field)).unwrap_or(0),
                );
                groups.entry(key).or_default().push(row);
            }
            for ((parent_uid, language_uid, _), mut rows) in groups {
                if rows.len() < 2 {
                    continue;
                }
                rows.sort_by_key(Row::uid);
                let kept = rows[0].uid();
                for row in rows.into_iter().skip(1) {
                    let reason = format!(
                        "duplicate of {kept} (parent {parent_uid}, language {language_uid})"
                    );
                    affected.add_with_reason(table, row, reason);
                }
            }
        }
        Ok(affected)
    }
}
