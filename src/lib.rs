//! Sprint signal engine: derives risk, confidence and capacity health from
//! sprint planning inputs, keeps a bounded history of snapshots, and reads
//! trends and stability back out of it.

pub mod coerce;
pub mod history;
pub mod logging;
pub mod narrative;
pub mod setup;
pub mod signals;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod trend;

pub use history::{History, SnapshotStore};
pub use setup::SprintSetup;
pub use signals::{compute, CanonicalSignals, CapacityHealth, Metrics, SignalCalculator};
pub use snapshot::{Mode, SaveOptions, SaveOutcome, SaveReason, Snapshot};
pub use trend::{analyze, Analysis, Trend};
