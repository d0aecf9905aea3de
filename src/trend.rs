//! Trend & Stability Analyzer.
//!
//! Read-only derivations over the snapshot log. Every function accepts an
//! empty or short history and returns a defined sentinel instead of failing.

use serde::{Deserialize, Serialize};

use crate::logging;
use crate::snapshot::{Snapshot, SnapshotField};

/// A snapshot counts toward the overcommit streak above this ratio.
pub const STREAK_RATIO: f64 = 1.01;
/// Snapshots considered by predictability and the volatility band.
pub const RECENT_WINDOW: usize = 5;

pub const HIGH_PREDICTABILITY_CV: f64 = 0.10;
pub const MEDIUM_PREDICTABILITY_CV: f64 = 0.25;

pub const NARROW_BAND: u32 = 10;
pub const MODERATE_BAND: u32 = 25;

const RISK_WEIGHT: f64 = 0.45;
const TREND_WEIGHT: f64 = 0.25;
const OVERCOMMIT_WEIGHT: f64 = 0.20;
const CONFIDENCE_WEIGHT: f64 = 0.10;

// =============================================================================
// Directional trend
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn between(prev: f64, latest: f64) -> Self {
        if !prev.is_finite() || !latest.is_finite() {
            Trend::Flat
        } else if latest > prev {
            Trend::Up
        } else if latest < prev {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Flat => "→",
        }
    }
}

/// Direction of one field between the two newest snapshots.
pub fn trend_of(history: &[Snapshot], field: SnapshotField) -> Trend {
    match last_two(history) {
        Some((prev, latest)) => Trend::between(prev.field(field), latest.field(field)),
        None => Trend::Flat,
    }
}

fn last_two(history: &[Snapshot]) -> Option<(&Snapshot, &Snapshot)> {
    match history {
        [.., prev, latest] => Some((prev, latest)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendArrows {
    pub risk: Trend,
    pub confidence: Trend,
    pub overcommit: Trend,
    pub velocity: Trend,
    pub capacity: Trend,
    pub committed: Trend,
}

pub fn trend_arrows(history: &[Snapshot]) -> TrendArrows {
    TrendArrows {
        risk: trend_of(history, SnapshotField::RiskScore),
        confidence: trend_of(history, SnapshotField::Confidence),
        overcommit: trend_of(history, SnapshotField::OvercommitRatio),
        velocity: trend_of(history, SnapshotField::AvgVelocity),
        capacity: trend_of(history, SnapshotField::CapacitySp),
        committed: trend_of(history, SnapshotField::CommittedSp),
    }
}

// =============================================================================
// Overcommit streak
// =============================================================================

/// Consecutive newest snapshots with overcommit ratio above 1.01.
pub fn overcommit_streak(history: &[Snapshot]) -> usize {
    history
        .iter()
        .rev()
        .take_while(|s| s.overcommit_ratio > STREAK_RATIO)
        .count()
}

// =============================================================================
// Predictability
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictabilityScore {
    High,
    Medium,
    Low,
    InsufficientData,
}

impl PredictabilityScore {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictabilityScore::High => "High",
            PredictabilityScore::Medium => "Medium",
            PredictabilityScore::Low => "Low",
            PredictabilityScore::InsufficientData => "insufficient data",
        }
    }

    fn hint(&self) -> &'static str {
        match self {
            PredictabilityScore::High => "Velocity has been steady; forecasts from it are dependable.",
            PredictabilityScore::Medium => "Velocity moves around a bit; keep some buffer in the plan.",
            PredictabilityScore::Low => "Velocity swings widely; treat capacity estimates as rough.",
            PredictabilityScore::InsufficientData => "Save at least two snapshots with velocity to judge predictability.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictability {
    pub score: PredictabilityScore,
    pub hint: String,
    /// Coefficient of variation of recent velocities, when computable.
    pub cv: Option<f64>,
    pub samples: usize,
}

pub fn predictability(history: &[Snapshot]) -> Predictability {
    let velocities: Vec<f64> = recent(history)
        .iter()
        .map(|s| s.avg_velocity)
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();

    let samples = velocities.len();
    if samples < 2 {
        let score = PredictabilityScore::InsufficientData;
        return Predictability { score, hint: score.hint().to_string(), cv: None, samples };
    }

    let mean = velocities.iter().sum::<f64>() / samples as f64;
    let variance = velocities.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples as f64;
    let cv = variance.sqrt() / mean;

    let score = if cv <= HIGH_PREDICTABILITY_CV {
        PredictabilityScore::High
    } else if cv <= MEDIUM_PREDICTABILITY_CV {
        PredictabilityScore::Medium
    } else {
        PredictabilityScore::Low
    };
    Predictability { score, hint: score.hint().to_string(), cv: Some(cv), samples }
}

fn recent(history: &[Snapshot]) -> &[Snapshot] {
    &history[history.len().saturating_sub(RECENT_WINDOW)..]
}

// =============================================================================
// Stability index
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StabilityLabel {
    Fragile,
    Watch,
    Stable,
    NoData,
}

impl StabilityLabel {
    pub fn from_index(index: u32) -> Self {
        if index < 45 {
            StabilityLabel::Fragile
        } else if index < 70 {
            StabilityLabel::Watch
        } else {
            StabilityLabel::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityLabel::Fragile => "Fragile",
            StabilityLabel::Watch => "Watch",
            StabilityLabel::Stable => "Stable",
            StabilityLabel::NoData => "no data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityIndex {
    pub index: u32,
    pub label: StabilityLabel,
}

impl StabilityIndex {
    pub fn no_data() -> Self {
        Self { index: 0, label: StabilityLabel::NoData }
    }
}

/// Weighted blend of current risk, risk direction, overcommit state and
/// confidence on the newest snapshot.
pub fn stability_index(history: &[Snapshot]) -> StabilityIndex {
    let Some(latest) = history.last() else {
        return StabilityIndex::no_data();
    };
    let prior = history.len().checked_sub(2).map(|i| &history[i]);

    let risk_component = 1.0 - (latest.risk_score.min(100) as f64 / 100.0);
    let trend_component = match prior {
        Some(p) if latest.risk_score < p.risk_score => 0.8,
        Some(p) if latest.risk_score > p.risk_score => 0.2,
        _ => 0.5,
    };
    let overcommit_component = if latest.overcommit_ratio <= 1.0 {
        1.0
    } else if latest.overcommit_ratio <= 1.15 {
        0.6
    } else {
        0.2
    };
    let confidence_component = (latest.confidence as f64 / 100.0).clamp(0.0, 1.0);

    let blended = risk_component * RISK_WEIGHT
        + trend_component * TREND_WEIGHT
        + overcommit_component * OVERCOMMIT_WEIGHT
        + confidence_component * CONFIDENCE_WEIGHT;
    let index = (blended * 100.0).round().clamp(0.0, 100.0) as u32;
    StabilityIndex { index, label: StabilityLabel::from_index(index) }
}

// =============================================================================
// Volatility band
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    Narrow,
    Moderate,
    Wide,
    Insufficient,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Narrow => "narrow",
            Band::Moderate => "moderate",
            Band::Wide => "wide",
            Band::Insufficient => "insufficient",
        }
    }
}

/// Envelope of risk scores over the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatilityBand {
    pub band: Band,
    pub low: u32,
    pub high: u32,
    pub spread: u32,
    pub samples: usize,
}

pub fn volatility_band(history: &[Snapshot]) -> VolatilityBand {
    let window = recent(history);
    let low = window.iter().map(|s| s.risk_score).min().unwrap_or(0);
    let high = window.iter().map(|s| s.risk_score).max().unwrap_or(0);
    let spread = high - low;
    let band = if window.len() < 2 {
        Band::Insufficient
    } else if spread <= NARROW_BAND {
        Band::Narrow
    } else if spread <= MODERATE_BAND {
        Band::Moderate
    } else {
        Band::Wide
    };
    VolatilityBand { band, low, high, spread, samples: window.len() }
}

// =============================================================================
// Bundle
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub snapshots: usize,
    pub latest: Option<Snapshot>,
    pub overcommit_streak: usize,
    pub predictability: Predictability,
    pub stability: StabilityIndex,
    pub volatility_band: VolatilityBand,
    pub arrows: TrendArrows,
}

pub fn analyze(history: &[Snapshot]) -> Analysis {
    let analysis = Analysis {
        snapshots: history.len(),
        latest: history.last().cloned(),
        overcommit_streak: overcommit_streak(history),
        predictability: predictability(history),
        stability: stability_index(history),
        volatility_band: volatility_band(history),
        arrows: trend_arrows(history),
    };
    logging::log_analysis(
        analysis.overcommit_streak,
        analysis.stability.index,
        analysis.stability.label.as_str(),
        analysis.predictability.score.as_str(),
    );
    analysis
}
