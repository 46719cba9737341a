//! Rootline Resolver: the path from a hierarchy node up to the virtual root.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::schema::SchemaProvider;
use crate::store::{Row, RowStore};
use crate::AppResult;

/// Hard ceiling on ascent steps, on top of the visited-id guard.
const MAX_DEPTH: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootlineEntry {
    pub uid: i64,
    pub pid: i64,
    pub is_missing: bool,
    pub deleted: bool,
    pub workspace_id: i64,
    pub title: String,
}

impl RootlineEntry {
    /// The virtual root, always terminal.
    pub fn root() -> Self {
        Self {
            uid: 0,
            pid: 0,
            is_missing: false,
            deleted: false,
            workspace_id: 0,
            title: String::new(),
        }
    }

    /// Marker for a node whose parent `pid` cannot be resolved.
    fn broken(mut from: RootlineEntry) -> Self {
        from.is_missing = true;
        from
    }

    /// Marker for a requested node that does not exist at all.
    fn missing(uid: i64) -> Self {
        Self {
            uid,
            pid: uid,
            is_missing: true,
            deleted: false,
            workspace_id: 0,
            title: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0 && !self.is_missing
    }
}

/// Renders a rootline as `/Home(1)/About(2)`; a broken head renders as `<broken 99>`.
pub fn render_path(entries: &[RootlineEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        if entry.is_root() {
            continue;
        }
        if entry.is_missing {
            out.push_str(&format!("<broken {}>", entry.pid));
            if entry.uid == entry.pid {
                continue;
            }
        }
        out.push('/');
        if entry.title.is_empty() {
            out.push_str(&format!("[{}]", entry.uid));
        } else {
            out.push_str(&format!("{}({})", entry.title, entry.uid));
        }
        if entry.deleted {
            out.push_str("[deleted]");
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Walks `pid` pointers with an explicit loop, caching fetched nodes.
pub struct RootlineResolver<'a> {
    store: &'a dyn RowStore,
    table: String,
    deleted_field: Option<String>,
    workspace_field: Option<String>,
    label_field: Option<String>,
    cache: HashMap<i64, Option<RootlineEntry>>,
}

impl<'a> RootlineResolver<'a> {
    pub fn new(store: &'a dyn RowStore, schema: &dyn SchemaProvider) -> Self {
        let table = schema.hierarchy_table().to_string();
        Self {
            store,
            deleted_field: schema.soft_delete_field(&table).map(str::to_string),
            workspace_field: schema.workspace_id_field(&table).map(str::to_string),
            label_field: schema.label_field(&table).map(str::to_string),
            table,
            cache: HashMap::new(),
        }
    }

    /// Ordered from the outermost entry (root or broken marker) down to `uid`.
    pub fn resolve(&mut self, uid: i64) -> AppResult<Vec<RootlineEntry>> {
        let mut entries: Vec<RootlineEntry> = Vec::new();
        let mut visited: HashSet<i64> = HashSet::new();
        let mut current = uid;

        loop {
            if current == 0 {
                entries.push(RootlineEntry::root());
                break;
            }
            let exhausted = !visited.insert(current) || visited.len() > MAX_DEPTH;
            let node = if exhausted { None } else { self.node(current)? };
            match node {
                Some(entry) => {
                    current = entry.pid;
                    entries.push(entry);
                }
                None => {
                    match entries.pop() {
                        Some(child) => entries.push(RootlineEntry::broken(child)),
                        None => entries.push(RootlineEntry::missing(uid)),
                    }
                    break;
                }
            }
        }

        entries.reverse();
        Ok(entries)
    }

    /// Drops cached nodes; call between large batches to bound memory.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cached_nodes(&self) -> usize {
        self.cache.len()
    }

    fn node(&mut self, uid: i64) -> AppResult<Option<RootlineEntry>> {
        if let Some(cached) = self.cache.get(&uid) {
            return Ok(cached.clone());
        }
        let mut columns = vec!["uid", "pid"];
        columns.extend(self.deleted_field.as_deref());
        columns.extend(self.workspace_field.as_deref());
        columns.extend(self.label_field.as_deref());
        let row = self.store.find_by_uid(&self.table, &columns, uid)?;
        let entry = row.map(|row| self.entry_from(&row));
        self.cache.insert(uid, entry.clone());
        Ok(entry)
    }

    fn entry_from(&self, row: &Row) -> RootlineEntry {
        RootlineEntry {
            uid: row.uid(),
            pid: row.pid(),
            is_missing: false,
            deleted: self
                .deleted_field
                .as_deref()
                .is_some_and(|field| row.int(field) != 0),
            workspace_id: self
                .workspace_field
                .as_deref()
                .map(|field| row.int(field))
                .unwrap_or(0),
            title: self
                .label_field
                .as_deref()
                .map(|field| row.text(field))
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_broken_head_and_titles() {
        let entries = vec![
            RootlineEntry {
                uid: 4,
                pid: 99,
                is_missing: true,
                deleted: false,
                workspace_id: 0,
                title: "Four".into(),
            },
            RootlineEntry {
                uid: 5,
                pid: 4,
                is_missing: false,
                deleted: true,
                workspace_id: 0,
                title: String::new(),
            },
        ];
        assert_eq!(render_path(&entries), "<broken 99>/Four(4)/[5][deleted]");
    }

    #[test]
    fn renders_root_only_as_slash() {
        assert_eq!(render_path(&[RootlineEntry::root()]), "/");
    }

    #[test]
    fn renders_missing_requested_node() {
        assert_eq!(render_path(&[RootlineEntry::missing(7)]), "<broken 7>");
    }
}
