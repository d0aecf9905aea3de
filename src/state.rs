//! Runtime configuration, the clock capability and the sprint context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_DEDUP_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_HISTORY_CAP: usize = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// Saves closer than this to the previous snapshot are rejected unless forced.
    pub dedup_window_ms: u64,
    /// Maximum snapshots kept; oldest evicted first.
    pub history_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "./sprintgauge.sqlite".to_string(),
            dedup_window_ms: DEFAULT_DEDUP_WINDOW_MS,
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_path: std::env::var("SPRINTGAUGE_DB").unwrap_or(defaults.db_path),
            dedup_window_ms: std::env::var("DEDUP_WINDOW_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.dedup_window_ms),
            history_cap: std::env::var("HISTORY_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.history_cap),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.dedup_window_ms, self.history_cap)
    }
}

/// The two knobs the snapshot store needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub dedup_window_ms: u64,
    pub history_cap: usize,
}

impl StoreConfig {
    pub fn new(dedup_window_ms: u64, history_cap: usize) -> Self {
        Self { dedup_window_ms, history_cap: history_cap.max(1) }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW_MS, DEFAULT_HISTORY_CAP)
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Wall-clock source in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        now_ms()
    }
}

/// Hand-driven clock for tests and replays. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self { ms: Arc::new(AtomicU64::new(start_ms)) }
    }

    pub fn advance(&self, delta_ms: u64) {
        self.ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}

pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// =============================================================================
// Sprint context
// =============================================================================

/// In-memory holder of the current sprint id.
///
/// Lifecycle: created on first use, replaced on reset, dropped on teardown.
/// Persistence of the id is the store's job.
#[derive(Debug, Clone, Default)]
pub struct SprintContext {
    current: Option<String>,
}

impl SprintContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Take over an id loaded from storage.
    pub fn adopt(&mut self, id: String) {
        self.current = Some(id);
    }

    /// Start a fresh sprint and return its id.
    pub fn begin(&mut self, now_ms: u64) -> String {
        let id = new_sprint_id(now_ms);
        self.current = Some(id.clone());
        id
    }

    pub fn teardown(&mut self) {
        self.current = None;
    }
}

pub fn new_sprint_id(now_ms: u64) -> String {
    let suffix = rand::random::<u32>() & 0x00ff_ffff;
    format!("sprint-{}-{:06x}", now_ms, suffix)
}
