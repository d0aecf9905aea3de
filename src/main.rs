//! Command-line driver for the sprint signal engine.
//!
//! Usage:
//!   sprintgauge <command> [args]
//!
//! Commands:
//!   setup [<json>]        Show the stored setup, or replace it with <json>
//!   compute               Compute metrics from the stored setup
//!   snapshot [--force]    Compute and save a snapshot
//!   history               Print the snapshot log
//!   trend <metric>        up/down/flat for one snapshot field
//!   analyze               Analysis and narrative for the current log
//!   new-sprint            Start a new sprint id
//!   clear                 Clear the snapshot log
//!
//! Environment: SPRINTGAUGE_DB, DEDUP_WINDOW_MS, HISTORY_CAP, LOG_LEVEL,
//! LOG_DOMAINS, LOG_DIR.

use anyhow::{bail, Context, Result};
use serde_json::json;

use sprintgauge::logging::{log, obj, v_str, Domain, Level};
use sprintgauge::narrative;
use sprintgauge::state::Config;
use sprintgauge::storage::SqliteKv;
use sprintgauge::{trend, CanonicalSignals, SaveOptions, SignalCalculator, SnapshotStore, SprintSetup};

fn print_usage() {
    eprintln!("Usage: sprintgauge <setup|compute|snapshot|history|trend|analyze|new-sprint|clear> [args]");
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cfg = Config::from_env();
    let kv = SqliteKv::open(&cfg.db_path).with_context(|| format!("opening {}", cfg.db_path))?;
    let mut store = SnapshotStore::with_system_clock(Box::new(kv), cfg.store_config());
    let calculator = CanonicalSignals;

    let cmd = args[1].as_str();
    log(
        Level::Debug,
        Domain::System,
        "command",
        obj(&[("cmd", v_str(cmd)), ("db_path", v_str(&cfg.db_path))]),
    );

    match cmd {
        "setup" => {
            if let Some(raw) = args.get(2) {
                let value: serde_json::Value = serde_json::from_str(raw).context("setup must be a JSON object")?;
                if !value.is_object() {
                    bail!("setup must be a JSON object");
                }
                store.save_setup(&SprintSetup::from_value(&value));
            }
            print_json(&store.load_setup())?;
        }
        "compute" => {
            let metrics = calculator.compute(&store.load_setup());
            print_json(&metrics)?;
        }
        "snapshot" => {
            let force = args[2..].iter().any(|a| a == "--force");
            let metrics = calculator.compute(&store.load_setup());
            let outcome = store.save_snapshot(&metrics, SaveOptions { force });
            print_json(&outcome)?;
        }
        "history" => print_json(&store.get_history())?,
        "trend" => {
            let Some(metric) = args.get(2) else {
                bail!("usage: sprintgauge trend <metric>");
            };
            print_json(&json!({ "metric": metric, "trend": store.get_trend(metric) }))?;
        }
        "analyze" => {
            let history = store.get_history();
            let analysis = trend::analyze(&history);
            let story = narrative::explain(&history, &analysis);
            print_json(&json!({ "analysis": analysis, "narrative": story }))?;
            println!("\n{}", story.render());
        }
        "new-sprint" => {
            let id = store.reset_current_sprint();
            print_json(&json!({ "sprintId": id }))?;
        }
        "clear" => {
            store.clear_history();
            print_json(&json!({ "cleared": true }))?;
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }
    Ok(())
}
