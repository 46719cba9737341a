use super::support::columns;
use super::{Check, CheckContext, RepairClass};
use crate::affected::AffectedRows;
use crate::schema::{Capability, SchemaProvider};
use crate::store::{Condition, OrderBy, Predicate, Value};
use crate::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flag {
    SoftDelete,
    Hidden,
}

impl Flag {
    fn field<'s>(self, schema: &'s dyn SchemaProvider, table: &str) -> Option<&'s str> {
        match self {
            Flag::SoftDelete => schema.soft_delete_field(table),
            Flag::Hidden => schema.hidden_field(table),
        }
    }

    fn capability(self) -> Capability {
        match self {
            Flag::SoftDelete => Capability::SoftDelete,
            Flag::Hidden => Capability::Hidden,
        }
    }
}

/// Boolean flag columns holding something other than 0 or 1.
///
/// NULL is normalized to 0, any other value to 1. Later checks read
/// `deleted = 0` as "live", so these run first.
pub(crate) struct FlagValues {
    flag: Flag,
}

impl FlagValues {
    pub(crate) fn new(flag: Flag) -> Self {
        Self { flag }
    }
}

impl Check for FlagValues {
    fn id(&self) -> &'static str {
        match self.flag {
            Flag::SoftDelete => "records_soft_delete_flag_invalid",
            Flag::Hidden => "records_hidden_flag_invalid",
        }
    }

    fn title(&self) -> &'static str {
        match self.flag {
            Flag::SoftDelete => "Soft-delete flags outside 0/1",
            Flag::Hidden => "Hidden flags outside 0/1",
        }
    }

    fn description(&self) -> &'static str {
        match self.flag {
            Flag::SoftDelete => {
                "The soft-delete column is a boolean. NULL becomes 0, any other non-boolean value becomes 1."
            }
            Flag::Hidden => {
                "The hidden column is a boolean. NULL becomes 0, any other non-boolean value becomes 1."
            }
        }
    }

    fn class(&self) -> RepairClass {
        RepairClass::FieldUpdate
    }

    fn requires(&self) -> &'static [&'static str] {
        match self.flag {
            Flag::SoftDelete => &[],
            Flag::Hidden => &["records_soft_delete_flag_invalid"],
        }
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> AppResult<AffectedRows> {
        let mut affected = AffectedRows::new();
        for table in ctx.schema.list_tables_with(self.flag.capability()) {
            let Some(field) = self.flag.field(ctx.schema, table) else {
                continue;
            };
            let predicate = Predicate::all().any(vec![
                Condition::NotIn(field.to_string(), vec![Value::Int(0), Value::Int(1)]),
                Condition::IsNull(field.to_string()),
            ]);
            let wanted = columns(ctx.schema, table, &[field]);
            let rows = ctx
                .store
                .select_many(table, &wanted, &predicate, &[OrderBy::asc("uid")])?;
            affected.set_extra_columns(table, &[field]);
            for row in rows {
                let current = row.get(field).cloned().unwrap_or(Value::Null);
                let target = if current.is_null() { 0 } else { 1 };
                affected.add_change(
                    table,
                    row,
                    vec![(field.to_string(), Value::Int(target))],
                    format!("{field} = {current}, set to {target}"),
                );
            }
        }
        Ok(affected)
    }
}

