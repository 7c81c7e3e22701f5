//! CLI command implementations
//!
//! Commands are thin clients of the library: they open a connection with a
//! no-op commit backend, run one operation, print one JSON object and close.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::commit::NoopBackend;
use crate::config::Config;
use crate::db::GitDb;
use crate::observability::{self, Event};
use crate::storage::{BlockView, Dataset};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    observability::init_logging();
    let cli = Cli::parse_args();
    run_command(&cli.config, cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(config_path: &Path, cmd: Command) -> CliResult<()> {
    let db = open(config_path)?;
    let data = match cmd {
        Command::Datasets => datasets(&db)?,
        Command::Show { dataset, block } => show(&db, &dataset, block.as_deref())?,
        Command::Reindex => reindex(&db)?,
    };
    db.close()?;
    write_response(data)
}

/// Open a connection for the configuration at `config_path`
pub fn open(config_path: &Path) -> CliResult<GitDb> {
    let config = Config::load(config_path)?;
    info!(event = %Event::ConfigLoaded, path = %config_path.display(), "configuration loaded");
    Ok(GitDb::open(config, Arc::new(NoopBackend))?)
}

/// Summary of every dataset
pub fn datasets(db: &GitDb) -> CliResult<Value> {
    let summaries: Vec<Value> = db.datasets()?.iter().map(dataset_summary).collect();
    Ok(Value::Array(summaries))
}

/// Blocks of a dataset, or the table of one block
pub fn show(db: &GitDb, name: &str, block: Option<&str>) -> CliResult<Value> {
    let dataset = db.dataset(name)?;

    let Some(block_name) = block else {
        let mut summary = dataset_summary(&dataset);
        summary["blocks"] = dataset.blocks.iter().map(block_summary).collect();
        return Ok(summary);
    };

    let view = dataset
        .block(block_name)
        .ok_or_else(|| CliError::not_found(format!("block {} not found in {}", block_name, name)))?;
    let table = view.table();
    Ok(json!({
        "dataset": dataset.name,
        "block": view.name,
        "size": view.human_size(),
        "headers": table.headers,
        "rows": table.rows,
    }))
}

/// Rebuild every index
pub fn reindex(db: &GitDb) -> CliResult<Value> {
    db.build_index()?;
    let metrics = db.metrics();
    Ok(json!({
        "datasets": db.datasets()?.len(),
        "index_flushes": metrics.index_flushes,
        "bad_blocks": metrics.bad_blocks,
        "bad_records": metrics.bad_records,
    }))
}

fn dataset_summary(dataset: &Dataset) -> Value {
    json!({
        "name": dataset.name,
        "blocks": dataset.blocks.len(),
        "records": dataset.record_count(),
        "size": dataset.human_size(),
        "bad_blocks": dataset.bad_blocks.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        "bad_records": dataset.bad_records,
    })
}

fn block_summary(block: &BlockView) -> Value {
    json!({
        "name": block.name,
        "records": block.record_count(),
        "size": block.human_size(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitDb) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("db");
        let block = root.join("Booking/202401.json");
        fs::create_dir_all(block.parent().unwrap()).unwrap();
        fs::write(
            &block,
            r#"{"Booking/202401/a": "{\"indexes\":{\"Type\":\"Room\"},\"data\":{\"name\":\"a\"}}"}"#,
        )
        .unwrap();

        let config_path = temp.path().join("gitdb.json");
        fs::write(&config_path, format!(r#"{{"db_path": {:?}}}"#, root.display().to_string())).unwrap();

        let db = open(&config_path).unwrap();
        (temp, db)
    }

    #[test]
    fn test_datasets_summary() {
        let (_temp, db) = setup();
        let data = datasets(&db).unwrap();
        assert_eq!(data[0]["name"], "Booking");
        assert_eq!(data[0]["records"], 1);
    }

    #[test]
    fn test_show_block_table() {
        let (_temp, db) = setup();
        let data = show(&db, "Booking", Some("202401")).unwrap();
        assert_eq!(data["headers"], json!(["name"]));
        assert_eq!(data["rows"], json!([["a"]]));

        let missing = show(&db, "Booking", Some("nope")).unwrap_err();
        assert_eq!(missing.code_str(), "GITDB_CLI_NOT_FOUND");
    }

    #[test]
    fn test_reindex_writes_index_files() {
        let (temp, db) = setup();
        reindex(&db).unwrap();
        assert!(temp.path().join("db/.index/Booking/Type.json").exists());
    }
}
