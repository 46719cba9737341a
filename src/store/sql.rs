//! SQL text generation shared by the SQLite gateway and the dry-run renderer.

use super::{Condition, OrderBy, Predicate, Value};

pub fn quote_ident(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Renders `value` as an inline SQL literal for display and the audit log.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(v) => v.to_string(),
        Value::Bool(b) => i64::from(*b).to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn render_condition(condition: &Condition, params: &mut Vec<Value>) -> String {
    match condition {
        Condition::Eq(column, value) => {
            params.push(value.clone());
            format!("{} = ?", quote_ident(column))
        }
        Condition::Ne(column, value) => {
            params.push(value.clone());
            format!("{} <> ?", quote_ident(column))
        }
        Condition::Gt(column, value) => {
            params.push(Value::Int(*value));
            format!("{} > ?", quote_ident(column))
        }
        Condition::Lt(column, value) => {
            params.push(Value::Int(*value));
            format!("{} < ?", quote_ident(column))
        }
        Condition::In(column, values) => {
            if values.is_empty() {
                return "0 = 1".to_string();
            }
            params.extend(values.iter().cloned());
            format!("{} IN ({})", quote_ident(column), placeholders(values.len()))
        }
        Condition::NotIn(column, values) => {
            if values.is_empty() {
                return "1 = 1".to_string();
            }
            params.extend(values.iter().cloned());
            format!(
                "{} NOT IN ({})",
                quote_ident(column),
                placeholders(values.len())
            )
        }
        Condition::IsNull(column) => format!("{} IS NULL", quote_ident(column)),
        Condition::NotNull(column) => format!("{} IS NOT NULL", quote_ident(column)),
        Condition::Any(conditions) => {
            if conditions.is_empty() {
                return "0 = 1".to_string();
            }
            let parts: Vec<String> = conditions
                .iter()
                .map(|condition| render_condition(condition, params))
                .collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Renders the WHERE clause (without the keyword) and its bound parameters.
pub fn where_clause(predicate: &Predicate) -> (String, Vec<Value>) {
    let mut params = Vec::new();
    if predicate.is_empty() {
        return ("1 = 1".to_string(), params);
    }
    let parts: Vec<String> = predicate
        .conditions()
        .iter()
        .map(|condition| render_condition(condition, &mut params))
        .collect();
    (parts.join(" AND "), params)
}

pub fn build_select_sql(
    table: &str,
    columns: &[&str],
    predicate: &Predicate,
    order_by: &[OrderBy],
    limit: Option<usize>,
) -> (String, Vec<Value>) {
    let select_cols = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|col| quote_ident(col))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let (clause, params) = where_clause(predicate);
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_cols,
        quote_ident(table),
        clause
    );
    if !order_by.is_empty() {
        let order: Vec<String> = order_by
            .iter()
            .map(|order| format!("{} ASC", quote_ident(&order.column)))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    (sql, params)
}

pub fn build_update_sql(table: &str, uid: i64, values: &[(String, Value)]) -> (String, Vec<Value>) {
    let assignments: Vec<String> = values
        .iter()
        .map(|(column, _)| format!("{} = ?", quote_ident(column)))
        .collect();
    let mut params: Vec<Value> = values.iter().map(|(_, value)| value.clone()).collect();
    params.push(Value::Int(uid));
    (
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(table),
            assignments.join(", "),
            quote_ident("uid")
        ),
        params,
    )
}

pub fn build_delete_sql(table: &str, uid: i64) -> (String, Vec<Value>) {
    (
        format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_ident(table),
            quote_ident("uid")
        ),
        vec![Value::Int(uid)],
    )
}

/// Substitutes positional `?` placeholders with literals, producing the
/// statement as it is shown to users and written to the audit log.
pub fn inline_params(sql: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len() + params.len() * 4);
    let mut params = params.iter();
    let mut in_quote = false;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                out.push(c);
            }
            '?' if !in_quote => match params.next() {
                Some(value) => out.push_str(&literal(value)),
                None => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out
}

pub fn render_update(table: &str, uid: i64, values: &[(String, Value)]) -> String {
    let (sql, params) = build_update_sql(table, uid, values);
    inline_params(&sql, &params)
}

pub fn render_delete(table: &str, uid: i64) -> String {
    let (sql, params) = build_delete_sql(table, uid);
    inline_params(&sql, &params)
}
