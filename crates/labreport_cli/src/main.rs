//! Command-line access to a stored lab report.
//!
//! # Responsibility
//! - Inspect the report kept in a SQLite store.
//! - Apply a saved template lookup response to that report.
//!
//! Usage:
//! - `labreport_cli version`
//! - `labreport_cli show <db_path>`
//! - `labreport_cli import <db_path> <response.json>`
//!
//! `LABREPORT_LOG_DIR` (absolute path) enables file logging.

use labreport_core::{
    core_version, default_log_level, init_logging, EngineConfig, PersistenceEngine,
    ReportSession, SessionStart, SqliteStore,
};
use log::error;
use std::process::ExitCode;

const USAGE: &str = "usage: labreport_cli version | show <db_path> | import <db_path> <response.json>";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("LABREPORT_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["version"] => {
            println!("labreport_core version={}", core_version());
            Ok(())
        }
        ["show", db_path] => show(db_path),
        ["import", db_path, response_path] => import(db_path, response_path).await,
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_command module=cli status=error");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

/// Default engine settings, with the store quota overridable through
/// `LABREPORT_CAPACITY_BYTES`.
fn engine_config() -> Result<EngineConfig, String> {
    let mut config = EngineConfig::default();
    if let Ok(raw) = std::env::var("LABREPORT_CAPACITY_BYTES") {
        let capacity = raw
            .trim()
            .parse::<usize>()
            .map_err(|err| format!("invalid LABREPORT_CAPACITY_BYTES `{raw}`: {err}"))?;
        config = config.with_store_capacity_bytes(capacity);
    }
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

fn open_store(db_path: &str, config: &EngineConfig) -> Result<SqliteStore, String> {
    SqliteStore::open(db_path, config.store_capacity_bytes).map_err(|err| err.to_string())
}

fn show(db_path: &str) -> Result<(), String> {
    let config = engine_config()?;
    let engine = PersistenceEngine::from_config(open_store(db_path, &config)?, &config);
    let Some(loaded) = engine.load().map_err(|err| err.to_string())? else {
        println!("no report stored");
        return Ok(());
    };

    let document = &loaded.document;
    println!("title={}", document.title);
    println!("author={}", document.author);
    println!(
        "stored_version={} migrated={} saved_at_ms={}",
        loaded.stored_version,
        loaded.was_migrated(),
        loaded.saved_at_ms
    );
    for section in &document.sections {
        let cells: usize = section
            .subsections
            .iter()
            .map(|subsection| subsection.cells.len())
            .sum();
        println!(
            "section id={} title={:?} subsections={} cells={}",
            section.id,
            section.title,
            section.subsections.len(),
            cells
        );
    }
    for failure in &loaded.attachment_failures {
        println!("attachment_failure cell={} error={}", failure.cell_id, failure.error);
    }
    Ok(())
}

async fn import(db_path: &str, response_path: &str) -> Result<(), String> {
    let config = engine_config()?;
    let raw = std::fs::read_to_string(response_path)
        .map_err(|err| format!("cannot read `{response_path}`: {err}"))?;
    let response: serde_json::Value =
        serde_json::from_str(&raw).map_err(|err| format!("invalid JSON response: {err}"))?;

    let (mut session, start) = ReportSession::open(open_store(db_path, &config)?, &config)
        .await
        .map_err(|err| err.to_string())?;
    if start == SessionStart::Seeded {
        println!("no report stored; starting from the default report");
    }

    let name = session
        .import_template_response(&response)
        .await
        .map_err(|err| err.to_string())?;
    println!(
        "imported template={name:?} sections={}",
        session.document().sections.len()
    );
    Ok(())
}
