//! Persisted snapshot records and the save contract types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::coerce;
use crate::signals::Metrics;

pub const RESCUE_THRESHOLD: u32 = 70;
pub const WATCH_THRESHOLD: u32 = 40;

/// Risk band stamped on a snapshot at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Stable,
    Watch,
    Rescue,
}

impl Mode {
    pub fn from_risk(risk_score: u32) -> Self {
        if risk_score >= RESCUE_THRESHOLD {
            Mode::Rescue
        } else if risk_score >= WATCH_THRESHOLD {
            Mode::Watch
        } else {
            Mode::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Stable => "stable",
            Mode::Watch => "watch",
            Mode::Rescue => "rescue",
        }
    }
}

/// One timestamped record of metrics for a sprint. Never edited after write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SnapshotRecord")]
pub struct Snapshot {
    pub sprint_id: String,
    /// Epoch milliseconds.
    pub timestamp: u64,
    pub risk_score: u32,
    pub confidence: u32,
    pub overcommit_ratio: f64,
    pub avg_velocity: f64,
    #[serde(rename = "committedSP")]
    pub committed_sp: f64,
    #[serde(rename = "capacitySP")]
    pub capacity_sp: f64,
    pub mode: Mode,
}

impl Snapshot {
    pub fn field(&self, field: SnapshotField) -> f64 {
        match field {
            SnapshotField::Timestamp => self.timestamp as f64,
            SnapshotField::RiskScore => self.risk_score as f64,
            SnapshotField::Confidence => self.confidence as f64,
            SnapshotField::OvercommitRatio => self.overcommit_ratio,
            SnapshotField::AvgVelocity => self.avg_velocity,
            SnapshotField::CommittedSp => self.committed_sp,
            SnapshotField::CapacitySp => self.capacity_sp,
        }
    }
}

/// Wire form read back from storage. Every field is optional and lenient;
/// a record without a mode takes the band of its own risk score.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SnapshotRecord {
    sprint_id: Option<String>,
    #[serde(deserialize_with = "coerce::lenient_u64")]
    timestamp: u64,
    #[serde(deserialize_with = "coerce::lenient_score")]
    risk_score: u32,
    #[serde(deserialize_with = "coerce::lenient_score")]
    confidence: u32,
    #[serde(deserialize_with = "coerce::lenient_f64")]
    overcommit_ratio: f64,
    #[serde(deserialize_with = "coerce::lenient_f64")]
    avg_velocity: f64,
    #[serde(rename = "committedSP", deserialize_with = "coerce::lenient_f64")]
    committed_sp: f64,
    #[serde(rename = "capacitySP", deserialize_with = "coerce::lenient_f64")]
    capacity_sp: f64,
    #[serde(deserialize_with = "lenient_mode")]
    mode: Option<Mode>,
}

/// Unrecognised mode tags read as absent rather than failing the record.
fn lenient_mode<'de, D>(deserializer: D) -> Result<Option<Mode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl From<SnapshotRecord> for Snapshot {
    fn from(r: SnapshotRecord) -> Self {
        Self {
            sprint_id: r.sprint_id.unwrap_or_default(),
            timestamp: r.timestamp,
            risk_score: r.risk_score,
            confidence: r.confidence,
            overcommit_ratio: r.overcommit_ratio,
            avg_velocity: r.avg_velocity,
            committed_sp: r.committed_sp,
            capacity_sp: r.capacity_sp,
            mode: r.mode.unwrap_or_else(|| Mode::from_risk(r.risk_score)),
        }
    }
}

/// The metric values a snapshot is built from, already coerced.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SnapshotInput {
    pub risk_score: u32,
    pub confidence: u32,
    pub overcommit_ratio: f64,
    pub avg_velocity: f64,
    pub committed_sp: f64,
    pub capacity_sp: f64,
}

impl SnapshotInput {
    /// Loose metrics object from a collaborator. `None` unless it is a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            risk_score: coerce::score(coerce::field(map.get("riskScore"))),
            confidence: coerce::score(coerce::field(map.get("confidence"))),
            overcommit_ratio: coerce::field(map.get("overcommitRatio")),
            avg_velocity: coerce::field(map.get("avgVelocity")),
            committed_sp: coerce::field(map.get("committedSP")),
            capacity_sp: coerce::field(map.get("capacitySP")),
        })
    }

    pub fn into_snapshot(self, sprint_id: String, timestamp: u64) -> Snapshot {
        Snapshot {
            sprint_id,
            timestamp,
            risk_score: self.risk_score,
            confidence: self.confidence,
            overcommit_ratio: self.overcommit_ratio,
            avg_velocity: self.avg_velocity,
            committed_sp: self.committed_sp,
            capacity_sp: self.capacity_sp,
            mode: Mode::from_risk(self.risk_score),
        }
    }
}

impl From<&Metrics> for SnapshotInput {
    fn from(m: &Metrics) -> Self {
        Self {
            risk_score: m.risk_score.min(100),
            confidence: m.confidence.min(100),
            overcommit_ratio: coerce::non_negative(m.overcommit_ratio),
            avg_velocity: coerce::non_negative(m.avg_velocity),
            committed_sp: coerce::non_negative(m.committed_sp),
            capacity_sp: coerce::non_negative(m.capacity_sp),
        }
    }
}

/// Numeric snapshot fields addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotField {
    Timestamp,
    RiskScore,
    Confidence,
    OvercommitRatio,
    AvgVelocity,
    CommittedSp,
    CapacitySp,
}

impl SnapshotField {
    /// Accepts wire names (`riskScore`) and snake_case (`risk_score`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "timestamp" => Some(SnapshotField::Timestamp),
            "riskScore" | "risk_score" | "risk" => Some(SnapshotField::RiskScore),
            "confidence" => Some(SnapshotField::Confidence),
            "overcommitRatio" | "overcommit_ratio" => Some(SnapshotField::OvercommitRatio),
            "avgVelocity" | "avg_velocity" => Some(SnapshotField::AvgVelocity),
            "committedSP" | "committed_sp" => Some(SnapshotField::CommittedSp),
            "capacitySP" | "capacity_sp" => Some(SnapshotField::CapacitySp),
            _ => None,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            SnapshotField::Timestamp => "timestamp",
            SnapshotField::RiskScore => "riskScore",
            SnapshotField::Confidence => "confidence",
            SnapshotField::OvercommitRatio => "overcommitRatio",
            SnapshotField::AvgVelocity => "avgVelocity",
            SnapshotField::CommittedSp => "committedSP",
            SnapshotField::CapacitySp => "capacitySP",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Skip the dedup window check.
    pub force: bool,
}

impl SaveOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveReason {
    #[serde(rename = "saved")]
    Saved,
    /// Previous snapshot is inside the dedup window.
    #[serde(rename = "dedup_60s")]
    Deduplicated,
    #[serde(rename = "invalid_data")]
    InvalidData,
}

impl SaveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveReason::Saved => "saved",
            SaveReason::Deduplicated => "dedup_60s",
            SaveReason::InvalidData => "invalid_data",
        }
    }
}

/// Result of a save attempt. A rejected save is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub ok: bool,
    pub reason: SaveReason,
    pub snapshot: Option<Snapshot>,
}

impl SaveOutcome {
    pub fn saved(snapshot: Snapshot) -> Self {
        Self { ok: true, reason: SaveReason::Saved, snapshot: Some(snapshot) }
    }

    pub fn deduplicated(last: Snapshot) -> Self {
        Self { ok: false, reason: SaveReason::Deduplicated, snapshot: Some(last) }
    }

    pub fn invalid() -> Self {
        Self { ok: false, reason: SaveReason::InvalidData, snapshot: None }
    }
}
