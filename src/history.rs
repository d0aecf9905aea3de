//! Snapshot Store: append-only, deduplicated, bounded history of metrics.
//!
//! Every read goes to the backing `KvStore`; nothing is cached apart from
//! the sprint id. Storage errors never reach the caller: a failed write is
//! logged and the call behaves as a no-op, and a record that does not parse
//! reads as its empty default. Callers that need to know whether a save
//! stuck compare `get_last()` with the returned snapshot.

use serde_json::Value;

use crate::logging;
use crate::setup::SprintSetup;
use crate::signals::Metrics;
use crate::snapshot::{SaveOptions, SaveOutcome, Snapshot, SnapshotField, SnapshotInput};
use crate::state::{Clock, SprintContext, StoreConfig, SystemClock};
use crate::storage::{KvStore, HISTORY_KEY, SETUP_KEY, SPRINT_ID_KEY};
use crate::trend::{trend_of, Trend};

pub type History = Vec<Snapshot>;

pub struct SnapshotStore {
    kv: Box<dyn KvStore + Send>,
    clock: Box<dyn Clock + Send>,
    sprint: SprintContext,
    cfg: StoreConfig,
}

impl SnapshotStore {
    pub fn new(kv: Box<dyn KvStore + Send>, clock: Box<dyn Clock + Send>, cfg: StoreConfig) -> Self {
        Self { kv, clock, sprint: SprintContext::new(), cfg }
    }

    /// Store on the system clock.
    pub fn with_system_clock(kv: Box<dyn KvStore + Send>, cfg: StoreConfig) -> Self {
        Self::new(kv, Box::new(SystemClock), cfg)
    }

    pub fn config(&self) -> StoreConfig {
        self.cfg
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn save_snapshot(&mut self, metrics: &Metrics, opts: SaveOptions) -> SaveOutcome {
        self.save_input(SnapshotInput::from(metrics), opts)
    }

    /// Loose entry point for collaborators holding plain JSON.
    pub fn save_snapshot_value(&mut self, metrics: &Value, opts: SaveOptions) -> SaveOutcome {
        match SnapshotInput::from_value(metrics) {
            Some(input) => self.save_input(input, opts),
            None => {
                logging::log_snapshot_rejected("invalid_data", None);
                SaveOutcome::invalid()
            }
        }
    }

    fn save_input(&mut self, input: SnapshotInput, opts: SaveOptions) -> SaveOutcome {
        let now = self.clock.now_ms();
        let mut history = self.get_history();

        // A clock that reads behind the newest snapshot is outside the window.
        if let Some(last) = history.last() {
            match now.checked_sub(last.timestamp) {
                Some(age) if !opts.force && age < self.cfg.dedup_window_ms => {
                    logging::log_snapshot_rejected("dedup_60s", Some(age));
                    return SaveOutcome::deduplicated(last.clone());
                }
                _ => {}
            }
        }

        // Keep the log sorted even if the wall clock stepped backwards.
        let timestamp = history.last().map(|l| l.timestamp.max(now)).unwrap_or(now);
        let sprint_id = self.current_sprint_id();
        let snapshot = input.into_snapshot(sprint_id, timestamp);

        history.push(snapshot.clone());
        trim_to_cap(&mut history, self.cfg.history_cap);
        self.write_history(&history);

        logging::log_snapshot_saved(
            &snapshot.sprint_id,
            snapshot.timestamp,
            snapshot.risk_score,
            snapshot.mode.as_str(),
            history.len(),
        );
        SaveOutcome::saved(snapshot)
    }

    /// Stored snapshots, oldest first, at most `history_cap` of them.
    pub fn get_history(&self) -> History {
        let raw = match self.kv.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                logging::log_persistence_failure("read", HISTORY_KEY, &err);
                return Vec::new();
            }
        };
        match serde_json::from_str::<History>(&raw) {
            Ok(mut history) => {
                history.sort_by_key(|s| s.timestamp);
                trim_to_cap(&mut history, self.cfg.history_cap);
                history
            }
            Err(err) => {
                logging::log_malformed_record(HISTORY_KEY, &err.to_string());
                Vec::new()
            }
        }
    }

    pub fn get_last(&self) -> Option<Snapshot> {
        self.get_history().pop()
    }

    /// Direction of `metric` between the two newest snapshots.
    /// Unknown metric names read as flat.
    pub fn get_trend(&self, metric: &str) -> Trend {
        match SnapshotField::from_name(metric) {
            Some(field) => trend_of(&self.get_history(), field),
            None => Trend::Flat,
        }
    }

    pub fn clear_history(&mut self) {
        let previous = self.get_history().len();
        if let Err(err) = self.kv.remove(HISTORY_KEY) {
            logging::log_persistence_failure("remove", HISTORY_KEY, &err);
            return;
        }
        logging::log_history_cleared(previous);
    }

    /// Replace the log with records from an import or sync source.
    /// Entries are ordered by timestamp and only the newest `history_cap` kept.
    /// Returns the length of the history read back after the write, so a
    /// failed write reports what is actually stored.
    pub fn import_history(&mut self, mut snapshots: History) -> usize {
        snapshots.sort_by_key(|s| s.timestamp);
        trim_to_cap(&mut snapshots, self.cfg.history_cap);
        self.write_history(&snapshots);
        self.get_history().len()
    }

    fn write_history(&mut self, history: &[Snapshot]) {
        let raw = match serde_json::to_string(history) {
            Ok(raw) => raw,
            Err(err) => {
                logging::log_persistence_failure("encode", HISTORY_KEY, &anyhow::Error::from(err));
                return;
            }
        };
        if let Err(err) = self.kv.set(HISTORY_KEY, &raw) {
            logging::log_persistence_failure("write", HISTORY_KEY, &err);
            return;
        }
        logging::log_audit("history_written", &logging::state_hash(&raw), history.len());
    }

    // =========================================================================
    // Sprint id
    // =========================================================================

    /// Current sprint id, loaded or created on first use.
    pub fn current_sprint_id(&mut self) -> String {
        if let Some(id) = self.sprint.current() {
            return id.to_string();
        }
        if let Some(id) = self.load_sprint_id() {
            self.sprint.adopt(id.clone());
            return id;
        }
        let id = self.sprint.begin(self.clock.now_ms());
        self.persist_sprint_id(&id);
        logging::log_sprint_event("sprint_created", &id);
        id
    }

    /// Start a new sprint. History is left alone.
    pub fn reset_current_sprint(&mut self) -> String {
        let id = self.sprint.begin(self.clock.now_ms());
        self.persist_sprint_id(&id);
        logging::log_sprint_event("sprint_reset", &id);
        id
    }

    /// Drop the in-memory sprint context. The persisted id is kept and is
    /// picked up again on next use.
    pub fn teardown(&mut self) {
        self.sprint.teardown();
    }

    fn load_sprint_id(&self) -> Option<String> {
        let raw = match self.kv.get(SPRINT_ID_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                logging::log_persistence_failure("read", SPRINT_ID_KEY, &err);
                return None;
            }
        };
        match serde_json::from_str::<String>(&raw) {
            Ok(id) if !id.trim().is_empty() => Some(id),
            Ok(_) => None,
            Err(err) => {
                logging::log_malformed_record(SPRINT_ID_KEY, &err.to_string());
                None
            }
        }
    }

    fn persist_sprint_id(&mut self, id: &str) {
        let raw = Value::String(id.to_string()).to_string();
        if let Err(err) = self.kv.set(SPRINT_ID_KEY, &raw) {
            logging::log_persistence_failure("write", SPRINT_ID_KEY, &err);
        }
    }

    // =========================================================================
    // Setup record
    // =========================================================================

    /// Last saved setup, or the zero setup when missing or unreadable.
    pub fn load_setup(&self) -> SprintSetup {
        let raw = match self.kv.get(SETUP_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return SprintSetup::default(),
            Err(err) => {
                logging::log_persistence_failure("read", SETUP_KEY, &err);
                return SprintSetup::default();
            }
        };
        match serde_json::from_str::<SprintSetup>(&raw) {
            Ok(setup) => setup,
            Err(err) => {
                logging::log_malformed_record(SETUP_KEY, &err.to_string());
                SprintSetup::default()
            }
        }
    }

    pub fn save_setup(&mut self, setup: &SprintSetup) {
        let raw = match serde_json::to_string(&setup.sanitized()) {
            Ok(raw) => raw,
            Err(err) => {
                logging::log_persistence_failure("encode", SETUP_KEY, &anyhow::Error::from(err));
                return;
            }
        };
        if let Err(err) = self.kv.set(SETUP_KEY, &raw) {
            logging::log_persistence_failure("write", SETUP_KEY, &err);
        }
    }
}

/// Drop the oldest entries beyond `cap`.
fn trim_to_cap(history: &mut History, cap: usize) {
    if history.len() > cap {
        let excess = history.len() - cap;
        history.drain(..excess);
    }
}
