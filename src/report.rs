//! Reporting sink: summaries, per-row details and per-page aggregation.

use std::collections::BTreeMap;

use crate::affected::AffectedRows;
use crate::console::render_table;
use crate::rootline::{render_path, RootlineResolver};
use crate::schema::SchemaProvider;
use crate::AppResult;

/// `table: count` lines for a detection result.
pub fn summary_lines(affected: &AffectedRows) -> Vec<String> {
    affected
        .counts()
        .into_iter()
        .map(|(table, count)| format!("  {table}: {count} affected"))
        .collect()
}

/// One table per affected table listing uid, pid, reason and extra columns.
pub fn detail_lines(affected: &AffectedRows) -> Vec<String> {
    let mut out = Vec::new();
    for (table, rows) in affected.tables() {
        let mut headers: Vec<String> = vec!["uid".into(), "pid".into()];
        let extra = affected.extra_columns(table);
        headers.extend(extra.iter().cloned());
        let with_reason = rows.iter().any(|r| r.reason.is_some());
        if with_reason {
            headers.push("reason".into());
        }
        let body: Vec<Vec<String>> = rows
            .iter()
            .map(|affected_row| {
                let mut cells = vec![
                    affected_row.row.uid().to_string(),
                    affected_row.row.pid().to_string(),
                ];
                for column in extra {
                    cells.push(affected_row.row.text(column));
                }
                if with_reason {
                    cells.push(affected_row.reason.clone().unwrap_or_default());
                }
                cells
            })
            .collect();
        out.push(format!("Table \"{table}\":"));
        out.extend(render_table(&headers, &body));
    }
    out
}

/// Affected rows grouped by the page they live on, each page shown with its rootline.
///
/// Rows of the hierarchy table are grouped under themselves.
pub fn page_lines(
    affected: &AffectedRows,
    schema: &dyn SchemaProvider,
    resolver: &mut RootlineResolver<'_>,
) -> AppResult<Vec<String>> {
    let hierarchy = schema.hierarchy_table();
    let mut pages: BTreeMap<i64, BTreeMap<String, usize>> = BTreeMap::new();
    for (table, rows) in affected.tables() {
        for affected_row in rows {
            let page = if table == hierarchy {
                affected_row.row.uid()
            } else {
                affected_row.row.pid()
            };
            *pages
                .entry(page)
                .or_default()
                .entry(table.to_string())
                .or_insert(0) += 1;
        }
    }

    let mut out = Vec::with_capacity(pages.len());
    for (page, tables) in pages {
        let path = render_path(&resolver.resolve(page)?);
        let counts: Vec<String> = tables
            .iter()
            .map(|(table, count)| format!("{table}: {count}"))
            .collect();
        out.push(format!("  [{page}] {path} ({})", counts.join(", ")));
    }
    resolver.clear_cache();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Row;

    #[test]
    fn details_include_extra_columns_and_reason() {
        let mut affected = AffectedRows::new();
        affected.set_extra_columns("tt_content", &["header"]);
        affected.add_with_reason(
            "tt_content",
            Row::new().with("uid", 3).with("pid", 8).with("header", "Intro"),
            "page 8 missing",
        );
        let lines = detail_lines(&affected);
        assert_eq!(lines[0], "Table \"tt_content\":");
        assert_eq!(lines[1], "uid | pid | header | reason");
        assert!(lines[3].starts_with("3   | 8   | Intro  | page 8 missing"));
    }

    #[test]
    fn summary_lists_counts_per_table() {
        let mut affected = AffectedRows::new();
        affected.add("pages", Row::new().with("uid", 1));
        affected.add("pages", Row::new().with("uid", 2));
        assert_eq!(summary_lines(&affected), vec!["  pages: 2 affected".to_string()]);
    }
}
