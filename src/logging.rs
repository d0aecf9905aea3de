//! Structured logging for the sprint signal engine.
//!
//! Every record is one JSON line carrying a run id, a sequence number, a
//! level, a domain and a `data` object. Records go to stderr and, when
//! `LOG_DIR` is set, to `<LOG_DIR>/<run_id>/events.jsonl`.
//!
//! Filtering:
//! - `LOG_LEVEL` (trace, debug, info, warn, error, fatal), default info
//! - `LOG_DOMAINS` comma-separated list or "all"

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok(v) => Self::parse(v).unwrap_or(Level::Info),
            Err(_) => Level::Info,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" => Some(Level::Fatal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Signal,    // Metric computation
    Store,     // Snapshot writes, persistence
    Sprint,    // Sprint id lifecycle
    Trend,     // Streaks, stability, bands
    Narrative, // Rendered explanations
    System,    // Startup, CLI
    Audit,     // History fingerprints
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Signal => "signal",
            Domain::Store => "store",
            Domain::Sprint => "sprint",
            Domain::Trend => "trend",
            Domain::Narrative => "narrative",
            Domain::System => "system",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let events = std::env::var("LOG_DIR").ok().and_then(|base| {
            let mut run_dir = PathBuf::from(base);
            run_dir.push(&run_id);
            if let Err(err) = create_dir_all(&run_dir) {
                eprintln!("[log] failed to create run dir: {}", err);
                return None;
            }
            match File::create(run_dir.join("events.jsonl")) {
                Ok(file) => Some(Mutex::new(BufWriter::new(file))),
                Err(err) => {
                    eprintln!("[log] failed to create events log: {}", err);
                    None
                }
            }
        });
        RunContext { run_id, events }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["sprint_id", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if let Some(events) = &ctx.events {
        write_line(events, &line);
    }
    eprintln!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_metrics(risk_score: u32, confidence: u32, overcommit_ratio: f64, health: &str) {
    log(
        Level::Debug,
        Domain::Signal,
        "metrics_computed",
        obj(&[
            ("risk_score", json!(risk_score)),
            ("confidence", json!(confidence)),
            ("overcommit_ratio", v_num(overcommit_ratio)),
            ("capacity_health", v_str(health)),
        ]),
    );
}

pub fn log_snapshot_saved(sprint_id: &str, ts: u64, risk_score: u32, mode: &str, len: usize) {
    log(
        Level::Info,
        Domain::Store,
        "snapshot_saved",
        obj(&[
            ("sprint_id", v_str(sprint_id)),
            ("snapshot_ts", json!(ts)),
            ("risk_score", json!(risk_score)),
            ("mode", v_str(mode)),
            ("history_len", json!(len)),
        ]),
    );
}

pub fn log_snapshot_rejected(reason: &str, age_ms: Option<u64>) {
    log(
        Level::Info,
        Domain::Store,
        "snapshot_rejected",
        obj(&[
            ("reason", v_str(reason)),
            ("age_ms", age_ms.map(|a| json!(a)).unwrap_or(Value::Null)),
        ]),
    );
}

/// Swallowed storage failure (quota, disabled storage, locked db).
pub fn log_persistence_failure(op: &str, key: &str, err: &anyhow::Error) {
    log(
        Level::Warn,
        Domain::Store,
        "persistence_failure",
        obj(&[
            ("op", v_str(op)),
            ("key", v_str(key)),
            ("error", v_str(&format!("{:#}", err))),
        ]),
    );
}

/// A persisted record that failed to parse and was replaced by its default.
pub fn log_malformed_record(key: &str, err: &str) {
    log(
        Level::Warn,
        Domain::Store,
        "malformed_record",
        obj(&[("key", v_str(key)), ("error", v_str(err))]),
    );
}

pub fn log_sprint_event(event: &str, sprint_id: &str) {
    log(
        Level::Info,
        Domain::Sprint,
        event,
        obj(&[("sprint_id", v_str(sprint_id))]),
    );
}

pub fn log_history_cleared(previous_len: usize) {
    log(
        Level::Info,
        Domain::Store,
        "history_cleared",
        obj(&[("previous_len", json!(previous_len))]),
    );
}

/// Fingerprint of the history after a write, for replay comparison.
pub fn log_audit(event_type: &str, state_hash: &str, len: usize) {
    log(
        Level::Debug,
        Domain::Audit,
        event_type,
        obj(&[("state_hash", v_str(state_hash)), ("history_len", json!(len))]),
    );
}

pub fn log_analysis(streak: usize, stability_index: u32, label: &str, predictability: &str) {
    log(
        Level::Debug,
        Domain::Trend,
        "analysis",
        obj(&[
            ("overcommit_streak", json!(streak)),
            ("stability_index", json!(stability_index)),
            ("stability_label", v_str(label)),
            ("predictability", v_str(predictability)),
        ]),
    );
}

pub fn log_narrative(tone: &str, lines: usize) {
    log(
        Level::Trace,
        Domain::Narrative,
        "rendered",
        obj(&[("tone", v_str(tone)), ("lines", json!(lines))]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Short sha256 fingerprint of an arbitrary string.
pub fn state_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Tests
// =============================================================================
