#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};

use anyhow::Result;
use assert_cmd::Command;
use tempfile::{tempdir, TempDir};

mod util;

struct Site {
    _dir: TempDir,
    db: PathBuf,
    schema: PathBuf,
}

impl Site {
    fn new(rows: &str) -> Result<Self> {
        let dir = tempdir()?;
        let db = dir.path().join("site.sqlite");
        let schema = dir.path().join("schema.json");
        util::write_database(&db, rows);
        util::write_schema(&schema);
        Ok(Self { _dir: dir, db, schema })
    }

    fn broken() -> Result<Self> {
        Self::new(&format!("{}{}", util::HEALTHY_ROWS, util::BROKEN_ROWS))
    }

    fn command(&self, mode: &str) -> Result<Command> {
        let mut cmd = Command::cargo_bin("dbmend")?;
        cmd.env("DBMEND_LOG", "off")
            .arg("--db")
            .arg(&self.db)
            .arg("--schema")
            .arg(&self.schema)
            .arg("--mode")
            .arg(mode);
        Ok(cmd)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.db.parent().map(Path::to_path_buf).unwrap_or_default().join(name)
    }
}

#[test]
fn list_prints_the_catalogue_in_order() -> Result<()> {
    let output = Command::cargo_bin("dbmend")?.arg("--list").output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let first = stdout.find("records_soft_delete_flag_invalid").expect("first check listed");
    let last = stdout.find("inline_children_workspace_mismatch").expect("last check listed");
    assert!(first < last);
    assert!(stdout.contains("workspace-overlay-remove"));
    Ok(())
}

#[test]
fn check_mode_exits_one_on_broken_database() -> Result<()> {
    let site = Site::broken()?;
    let output = site.command("check")?.output()?;
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("[20/36] records_on_missing_pages"));
    assert!(stdout.contains("tt_content: 1 affected"));
    assert!(stdout.contains("=> BROKEN"));
    Ok(())
}

#[test]
fn execute_repairs_logs_sql_and_leaves_a_clean_database() -> Result<()> {
    let site = Site::broken()?;
    let log = site.path("repair.sql");

    let output = site.command("execute")?.arg("--sql-log").arg(&log).output()?;
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let written = std::fs::read_to_string(&log)?;
    assert!(written.contains("triggered by records_on_missing_pages"));
    assert!(written.contains(r#"UPDATE "tt_content" SET "deleted" = 1 WHERE "uid" = 30;"#));
    assert!(written.contains(r#"DELETE FROM "tt_content" WHERE "uid" = 30;"#));
    assert!(written.contains(r#"DELETE FROM "tx_news" WHERE "uid" = 5;"#));

    let output = site.command("check")?.arg("--json").output()?;
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout)?;
    let json_start = stdout.find("{\n").expect("json summary printed");
    let summary: serde_json::Value = serde_json::from_str(&stdout[json_start..])?;
    assert_eq!(summary["mode"], "check");
    assert_eq!(summary["outcomes"].as_array().map(Vec::len), Some(36));
    assert!(summary["outcomes"]
        .as_array()
        .into_iter()
        .flatten()
        .all(|outcome| outcome["state"] == "OK"));
    Ok(())
}

#[test]
fn only_runs_the_selection_and_its_requirements() -> Result<()> {
    let site = Site::broken()?;
    let output = site
        .command("check")?
        .args(["--only", "records_soft_delete_flag_invalid"])
        .output()?;
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("[ 1/1] records_soft_delete_flag_invalid"));
    Ok(())
}

#[test]
fn interactive_abort_exits_two() -> Result<()> {
    let site = Site::broken()?;
    let output = site.command("interactive")?.write_stdin("a\n").output()?;
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Action? [e]xecute"));
    assert!(stdout.contains("=> ABORTED"));
    Ok(())
}

#[test]
fn unknown_check_is_fatal() -> Result<()> {
    let site = Site::broken()?;
    let output = site.command("check")?.args(["--only", "no_such_check"]).output()?;
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("select checks"));
    Ok(())
}

#[test]
fn missing_hierarchy_table_is_fatal() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("empty.sqlite");
    let schema = dir.path().join("schema.json");
    rusqlite::Connection::open(&db)?.execute_batch("CREATE TABLE other (uid INTEGER, pid INTEGER);")?;
    util::write_schema(&schema);

    let output = Command::cargo_bin("dbmend")?
        .env("DBMEND_LOG", "off")
        .arg("--db")
        .arg(&db)
        .arg("--schema")
        .arg(&schema)
        .output()?;
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8(output.stderr)?.contains("reconcile schema with database"));
    Ok(())
}

#[test]
fn missing_database_file_is_not_created() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("absent.sqlite");
    let schema = dir.path().join("schema.json");
    util::write_schema(&schema);

    let output = Command::cargo_bin("dbmend")?
        .env("DBMEND_LOG", "off")
        .arg("--db")
        .arg(&db)
        .arg("--schema")
        .arg(&schema)
        .output()?;
    assert_eq!(output.status.code(), Some(3));
    assert!(!db.exists());
    Ok(())
}
