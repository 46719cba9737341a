#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::path::Path;

use dbmend_lib::store::{Predicate, RowStore};
use dbmend_lib::{SchemaDocument, SqliteStore, StaticSchema};
use rusqlite::Connection;

/// Page tree, content with inline file references, a workspace table and a
/// translated table without soft delete.
pub const SCHEMA_JSON: &str = r#"{
  "hierarchy_table": "pages",
  "workspace_table": "sys_workspace",
  "tables": {
    "pages": {
      "soft_delete": "deleted",
      "hidden": "hidden",
      "language": "sys_language_uid",
      "translation_parent": "l10n_parent",
      "workspace_id": "t3ver_wsid",
      "workspace_origin": "t3ver_oid",
      "label": "title"
    },
    "tt_content": {
      "soft_delete": "deleted",
      "hidden": "hidden",
      "language": "sys_language_uid",
      "translation_parent": "l18n_parent",
      "workspace_id": "t3ver_wsid",
      "workspace_origin": "t3ver_oid",
      "label": "header",
      "root_level": "pages_only",
      "inline": [
        {
          "field": "image",
          "child_table": "sys_file_reference",
          "foreign_field": "uid_foreign",
          "foreign_table_field": "tablenames"
        }
      ]
    },
    "sys_file_reference": {
      "soft_delete": "deleted",
      "hidden": "hidden",
      "language": "sys_language_uid",
      "translation_parent": "l10n_parent",
      "workspace_id": "t3ver_wsid",
      "workspace_origin": "t3ver_oid"
    },
    "sys_workspace": {
      "soft_delete": "deleted",
      "label": "title",
      "root_level": "root_only"
    },
    "tx_news": {
      "language": "sys_language_uid",
      "translation_parent": "l10n_parent",
      "label": "title"
    }
  }
}"#;

pub const DDL: &str = "
CREATE TABLE pages (
    uid INTEGER PRIMARY KEY,
    pid INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER DEFAULT 0,
    hidden INTEGER DEFAULT 0,
    sys_language_uid INTEGER NOT NULL DEFAULT 0,
    l10n_parent INTEGER NOT NULL DEFAULT 0,
    t3ver_wsid INTEGER NOT NULL DEFAULT 0,
    t3ver_oid INTEGER NOT NULL DEFAULT 0,
    title TEXT NOT NULL DEFAULT ''
);
CREATE TABLE tt_content (
    uid INTEGER PRIMARY KEY,
    pid INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER DEFAULT 0,
    hidden INTEGER DEFAULT 0,
    sys_language_uid INTEGER NOT NULL DEFAULT 0,
    l18n_parent INTEGER NOT NULL DEFAULT 0,
    t3ver_wsid INTEGER NOT NULL DEFAULT 0,
    t3ver_oid INTEGER NOT NULL DEFAULT 0,
    header TEXT NOT NULL DEFAULT ''
);
CREATE TABLE sys_file_reference (
    uid INTEGER PRIMARY KEY,
    pid INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER DEFAULT 0,
    hidden INTEGER DEFAULT 0,
    sys_language_uid INTEGER NOT NULL DEFAULT 0,
    l10n_parent INTEGER NOT NULL DEFAULT 0,
    t3ver_wsid INTEGER NOT NULL DEFAULT 0,
    t3ver_oid INTEGER NOT NULL DEFAULT 0,
    uid_foreign INTEGER NOT NULL DEFAULT 0,
    tablenames TEXT DEFAULT ''
);
CREATE TABLE sys_workspace (
    uid INTEGER PRIMARY KEY,
    pid INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER DEFAULT 0,
    title TEXT NOT NULL DEFAULT ''
);
CREATE TABLE tx_news (
    uid INTEGER PRIMARY KEY,
    pid INTEGER NOT NULL DEFAULT 0,
    sys_language_uid INTEGER NOT NULL DEFAULT 0,
    l10n_parent INTEGER NOT NULL DEFAULT 0,
    title TEXT NOT NULL DEFAULT ''
);
";

/// A small healthy site: root page, two subpages, content, one image and a workspace.
pub const HEALTHY_ROWS: &str = "
INSERT INTO pages (uid, pid, title) VALUES (1, 0, 'Home'), (2, 1, 'About'), (3, 1, 'News');
INSERT INTO tt_content (uid, pid, header) VALUES (7, 2, 'Team'), (8, 3, 'Latest');
INSERT INTO sys_file_reference (uid, pid, uid_foreign, tablenames) VALUES (20, 2, 7, 'tt_content');
INSERT INTO sys_workspace (uid, pid, title) VALUES (1, 0, 'Draft');
INSERT INTO tx_news (uid, pid, title) VALUES (4, 3, 'Launch');
";

/// One defect for three different checks:
/// content on a missing page, a news translation whose parent is gone and an
/// image attached to soft-deleted content.
pub const BROKEN_ROWS: &str = "
INSERT INTO tt_content (uid, pid, header) VALUES (30, 42, 'Lost');
INSERT INTO tx_news (uid, pid, sys_language_uid, l10n_parent, title) VALUES (5, 3, 2, 10, 'Lancement');
INSERT INTO tt_content (uid, pid, deleted, header) VALUES (9, 2, 1, 'Removed');
INSERT INTO sys_file_reference (uid, pid, uid_foreign, tablenames) VALUES (21, 2, 9, 'tt_content');
";

pub fn schema() -> StaticSchema {
    SchemaDocument::from_json(SCHEMA_JSON)
        .expect("parse schema document")
        .into_schema()
}

/// In-memory store with the tables created and `rows` inserted.
pub fn store_with(rows: &str) -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("open in-memory database");
    store.execute_batch(DDL).expect("create tables");
    store.execute_batch(rows).expect("seed rows");
    store
}

/// Database file at `path` with the tables created and `rows` inserted.
pub fn write_database(path: &Path, rows: &str) {
    let conn = Connection::open(path).expect("create database file");
    conn.execute_batch(DDL).expect("create tables");
    conn.execute_batch(rows).expect("seed rows");
}

pub fn write_schema(path: &Path) {
    std::fs::write(path, SCHEMA_JSON).expect("write schema document");
}

/// Uids of `table` matching `predicate`, ascending.
pub fn uids(store: &dyn RowStore, table: &str, predicate: &Predicate) -> Vec<i64> {
    store
        .select_many(table, &["uid"], predicate, &[dbmend_lib::store::OrderBy::asc("uid")])
        .expect("select uids")
        .iter()
        .map(|row| row.uid())
        .collect()
}

pub fn field(store: &dyn RowStore, table: &str, uid: i64, field: &str) -> Option<i64> {
    store
        .find_by_uid(table, &["uid", field], uid)
        .expect("find row")
        .map(|row| row.int(field))
}
