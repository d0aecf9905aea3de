//! End-to-end flow: setup → metrics → snapshot store → analysis → narrative.
//!
//! Runs against an on-disk SQLite file so persistence across store
//! instances is exercised the same way the CLI uses it.

use sprintgauge::history::SnapshotStore;
use sprintgauge::narrative::{explain, Tone};
use sprintgauge::state::{ManualClock, StoreConfig};
use sprintgauge::storage::{KvStore, SqliteKv, HISTORY_KEY};
use sprintgauge::trend::{analyze, overcommit_streak, stability_index, StabilityLabel};
use sprintgauge::{CanonicalSignals, CapacityHealth, Mode, SaveOptions, SaveReason, SignalCalculator, SprintSetup, Trend};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const T0: u64 = 1_700_000_000_000;
const MINUTE: u64 = 60_000;

fn open_store(path: &str, clock: &ManualClock) -> SnapshotStore {
    let kv = SqliteKv::open(path).unwrap();
    SnapshotStore::new(Box::new(kv), Box::new(clock.clone()), StoreConfig::default())
}

fn scenario_a() -> SprintSetup {
    SprintSetup {
        sprint_days: 10,
        team_members: 5,
        leave_days: 5.0,
        committed_sp: 50.0,
        v1: 40.0,
        v2: 42.0,
        v3: 38.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn overcommitted_sprint_flows_through_to_narrative() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gauge.sqlite");
    let clock = ManualClock::new(T0);
    let mut store = open_store(path.to_str().unwrap(), &clock);
    let calc = CanonicalSignals;

    store.save_setup(&scenario_a());
    let metrics = calc.compute(&store.load_setup());
    assert_eq!(metrics.capacity_health, CapacityHealth::Critical);
    assert!(metrics.risk_score > 0);

    let first = store.save_snapshot(&metrics, SaveOptions::default());
    assert!(first.ok);
    assert_eq!(first.snapshot.as_ref().unwrap().mode, Mode::Watch);

    // Trim scope and save again after the dedup window.
    clock.advance(MINUTE + 1);
    let mut trimmed = scenario_a();
    trimmed.committed_sp = 34.0;
    let second = store.save_snapshot(&calc.compute(&trimmed), SaveOptions::default());
    assert!(second.ok);

    let history = store.get_history();
    assert_eq!(history.len(), 2);
    assert_eq!(store.get_trend("riskScore"), Trend::Down);
    assert_eq!(overcommit_streak(&history), 0);

    let analysis = analyze(&history);
    let story = explain(&history, &analysis);
    assert_eq!(story.tone, Tone::Calm);
    assert!(story.render().contains("Risk is falling"));
}

#[test]
fn history_survives_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gauge.sqlite");
    let path = path.to_str().unwrap();
    let clock = ManualClock::new(T0);

    let sprint_id = {
        let mut store = open_store(path, &clock);
        let metrics = CanonicalSignals.compute(&scenario_a());
        store.save_snapshot(&metrics, SaveOptions::default());
        store.current_sprint_id()
    };

    let mut reopened = open_store(path, &clock);
    assert_eq!(reopened.get_history().len(), 1);
    assert_eq!(reopened.current_sprint_id(), sprint_id);

    // Same clock instant: the persisted snapshot still blocks a duplicate.
    let again = reopened.save_snapshot(&CanonicalSignals.compute(&scenario_a()), SaveOptions::default());
    assert_eq!(again.reason, SaveReason::Deduplicated);
}

#[test]
fn thirty_five_saves_keep_newest_thirty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gauge.sqlite");
    let clock = ManualClock::new(T0);
    let mut store = open_store(path.to_str().unwrap(), &clock);

    for i in 0..35u32 {
        let mut setup = scenario_a();
        setup.committed_sp = 30.0 + i as f64;
        store.save_snapshot(&CanonicalSignals.compute(&setup), SaveOptions::default());
        clock.advance(MINUTE);
    }

    let history = store.get_history();
    assert_eq!(history.len(), 30);
    assert_eq!(history.first().unwrap().committed_sp, 35.0);
    assert_eq!(history.last().unwrap().committed_sp, 64.0);
    assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn corrupted_history_degrades_to_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gauge.sqlite");
    let path = path.to_str().unwrap();
    {
        let mut kv = SqliteKv::open(path).unwrap();
        kv.set(HISTORY_KEY, "{\"oops\":").unwrap();
    }
    let clock = ManualClock::new(T0);
    let store = open_store(path, &clock);
    let history = store.get_history();
    assert!(history.is_empty());
    assert_eq!(stability_index(&history).label, StabilityLabel::NoData);
}

#[test]
fn new_sprint_tags_later_snapshots_only() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gauge.sqlite");
    let clock = ManualClock::new(T0);
    let mut store = open_store(path.to_str().unwrap(), &clock);
    let metrics = CanonicalSignals.compute(&scenario_a());

    store.save_snapshot(&metrics, SaveOptions::default());
    let old = store.current_sprint_id();
    let new = store.reset_current_sprint();
    store.save_snapshot(&metrics, SaveOptions::forced());

    let history = store.get_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sprint_id, old);
    assert_eq!(history[1].sprint_id, new);
}
