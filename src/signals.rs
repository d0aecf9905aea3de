//! Signal Calculator: raw sprint setup → normalized risk metrics.
//!
//! `compute` is a pure function. Same setup in, same metrics out; no clock
//! reads, no randomness, no failure path. `CanonicalSignals` wraps it and
//! adds a debug log line. Invalid inputs were already coerced to 0
//! by `SprintSetup::sanitized`.

use serde::{Deserialize, Serialize};

use crate::logging;
use crate::setup::SprintSetup;

/// Flat penalty when there is nothing to measure against.
pub const MISSING_DATA_PENALTY: f64 = 30.0;
pub const OVERCOMMIT_PENALTY_CAP: f64 = 50.0;
pub const CAPACITY_PENALTY_CAP: f64 = 35.0;
pub const VOLATILITY_PENALTY_CAP: f64 = 15.0;

pub const CRITICAL_RATIO: f64 = 1.15;
pub const AT_RISK_RATIO: f64 = 1.0;

/// Capacity health from the overcommit ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityHealth {
    Healthy,
    AtRisk,
    Critical,
    /// No commitment or no capacity to compare against.
    Unknown,
}

impl CapacityHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityHealth::Healthy => "Healthy",
            CapacityHealth::AtRisk => "AtRisk",
            CapacityHealth::Critical => "Critical",
            CapacityHealth::Unknown => "Unknown",
        }
    }
}

/// Additive contributions to the risk score, before the final clamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBreakdown {
    pub missing_data: f64,
    pub overcommit: f64,
    pub capacity: f64,
    pub volatility: f64,
}

impl RiskBreakdown {
    pub fn total(&self) -> f64 {
        self.missing_data + self.overcommit + self.capacity + self.volatility
    }
}

/// Derived sprint metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Positive velocities in v1, v2, v3 order.
    pub velocities: Vec<f64>,
    pub avg_velocity: f64,
    /// Coefficient of variation of `velocities`.
    pub volatility: f64,
    pub ideal_person_days: f64,
    pub availability_ratio: f64,
    #[serde(rename = "capacitySP")]
    pub capacity_sp: f64,
    #[serde(rename = "committedSP")]
    pub committed_sp: f64,
    pub overcommit_ratio: f64,
    pub risk_score: u32,
    pub confidence: u32,
    pub capacity_health: CapacityHealth,
    pub penalties: RiskBreakdown,
}

/// Capability interface for metric computation.
///
/// Callers receive an implementation instead of probing for one.
pub trait SignalCalculator {
    fn compute(&self, setup: &SprintSetup) -> Metrics;
}

/// The one formula set used everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalSignals;

impl SignalCalculator for CanonicalSignals {
    fn compute(&self, setup: &SprintSetup) -> Metrics {
        let metrics = compute(setup);
        logging::log_metrics(
            metrics.risk_score,
            metrics.confidence,
            metrics.overcommit_ratio,
            metrics.capacity_health.as_str(),
        );
        metrics
    }
}

pub fn compute(setup: &SprintSetup) -> Metrics {
    let setup = setup.sanitized();

    let velocities: Vec<f64> = setup.velocities().into_iter().filter(|v| *v > 0.0).collect();
    let (avg_velocity, volatility) = velocity_stats(&velocities);

    let ideal_person_days = setup.sprint_days as f64 * setup.team_members.max(1) as f64;
    let availability_ratio = availability_ratio(ideal_person_days, setup.leave_days);
    let capacity_sp = avg_velocity * availability_ratio;
    let committed_sp = setup.committed_sp;

    let overcommit_ratio = overcommit_ratio(committed_sp, capacity_sp);
    let penalties = risk_penalties(committed_sp, capacity_sp, overcommit_ratio, volatility);
    let risk_score = penalties.total().clamp(0.0, 100.0).round() as u32;
    let confidence = confidence(committed_sp, capacity_sp, volatility);
    let capacity_health = capacity_health(committed_sp, capacity_sp, overcommit_ratio);

    Metrics {
        velocities,
        avg_velocity,
        volatility,
        ideal_person_days,
        availability_ratio,
        capacity_sp,
        committed_sp,
        overcommit_ratio,
        risk_score,
        confidence,
        capacity_health,
        penalties,
    }
}

/// Mean and coefficient of variation (population sd / mean).
///
/// Volatility is 0 with fewer than two samples or a zero mean.
pub fn velocity_stats(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 || mean <= 0.0 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt() / mean)
}

pub fn availability_ratio(ideal_person_days: f64, leave_days: f64) -> f64 {
    if ideal_person_days <= 0.0 {
        return 0.0;
    }
    ((ideal_person_days - leave_days) / ideal_person_days).clamp(0.0, 1.0)
}

/// committed / capacity, with fixed values when capacity is unknown:
/// 0 if nothing is committed either, 1 (at capacity) otherwise.
pub fn overcommit_ratio(committed_sp: f64, capacity_sp: f64) -> f64 {
    if capacity_sp > 0.0 {
        committed_sp / capacity_sp
    } else if committed_sp > 0.0 {
        1.0
    } else {
        0.0
    }
}

pub fn risk_penalties(committed_sp: f64, capacity_sp: f64, overcommit_ratio: f64, volatility: f64) -> RiskBreakdown {
    let missing_data = if committed_sp <= 0.0 || capacity_sp <= 0.0 {
        MISSING_DATA_PENALTY
    } else {
        0.0
    };
    let overcommit = ((overcommit_ratio - 1.0) * 60.0).clamp(0.0, OVERCOMMIT_PENALTY_CAP);
    let capacity = if capacity_sp > 0.0 {
        ((committed_sp / capacity_sp - 1.0) * 50.0).clamp(0.0, CAPACITY_PENALTY_CAP)
    } else {
        0.0
    };
    let volatility = (volatility * 50.0).clamp(0.0, VOLATILITY_PENALTY_CAP);
    RiskBreakdown { missing_data, overcommit, capacity, volatility }
}

pub fn confidence(committed_sp: f64, capacity_sp: f64, volatility: f64) -> u32 {
    if committed_sp <= 0.0 {
        return 0;
    }
    let raw = (capacity_sp / committed_sp) * 100.0 - volatility * 100.0;
    raw.clamp(0.0, 100.0).round() as u32
}

pub fn capacity_health(committed_sp: f64, capacity_sp: f64, overcommit_ratio: f64) -> CapacityHealth {
    if committed_sp <= 0.0 || capacity_sp <= 0.0 {
        CapacityHealth::Unknown
    } else if overcommit_ratio > CRITICAL_RATIO {
        CapacityHealth::Critical
    } else if overcommit_ratio > AT_RISK_RATIO {
        CapacityHealth::AtRisk
    } else {
        CapacityHealth::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(sprint_days: u32, team: u32, leave: f64, committed: f64, v: [f64; 3]) -> SprintSetup {
        SprintSetup {
            sprint_days,
            team_members: team,
            leave_days: leave,
            committed_sp: committed,
            v1: v[0],
            v2: v[1],
            v3: v[2],
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_overcommitted_team_is_critical() {
        let m = compute(&setup(10, 5, 5.0, 50.0, [40.0, 42.0, 38.0]));
        assert_eq!(m.velocities, vec![40.0, 42.0, 38.0]);
        assert!(approx(m.avg_velocity, 40.0));
        assert!(approx(m.availability_ratio, 0.9));
        assert!(approx(m.capacity_sp, 36.0));
        assert!(approx(m.overcommit_ratio, 50.0 / 36.0));
        assert!(approx(m.penalties.overcommit, 23.333333333));
        assert!(approx(m.penalties.capacity, 19.444444444));
        assert_eq!(m.penalties.missing_data, 0.0);
        assert_eq!(m.risk_score, 45);
        assert_eq!(m.confidence, 68);
        assert_eq!(m.capacity_health, CapacityHealth::Critical);
    }

    #[test]
    fn test_no_commitment_carries_missing_data_penalty() {
        let m = compute(&setup(10, 5, 0.0, 0.0, [0.0, 0.0, 0.0]));
        assert_eq!(m.penalties.missing_data, 30.0);
        assert!(m.risk_score >= 30);
        assert_eq!(m.capacity_sp, 0.0);
        assert_eq!(m.confidence, 0);
        assert_eq!(m.overcommit_ratio, 0.0);
        assert_eq!(m.capacity_health, CapacityHealth::Unknown);
    }

    #[test]
    fn test_commitment_without_history_is_not_healthy() {
        let m = compute(&setup(10, 5, 0.0, 30.0, [0.0, 0.0, 0.0]));
        assert_eq!(m.overcommit_ratio, 1.0);
        assert_eq!(m.capacity_health, CapacityHealth::Unknown);
        assert_eq!(m.risk_score, 30);
        assert_eq!(m.confidence, 0);
    }

    #[test]
    fn test_under_committed_is_healthy() {
        let m = compute(&setup(10, 4, 0.0, 20.0, [30.0, 30.0, 30.0]));
        assert_eq!(m.volatility, 0.0);
        assert!(approx(m.overcommit_ratio, 20.0 / 30.0));
        assert_eq!(m.risk_score, 0);
        assert_eq!(m.confidence, 100);
        assert_eq!(m.capacity_health, CapacityHealth::Healthy);
    }

    #[test]
    fn test_slight_overcommit_is_at_risk() {
        // capacity 40, committed 44 -> ratio 1.1
        let m = compute(&setup(10, 4, 0.0, 44.0, [40.0, 0.0, 0.0]));
        assert_eq!(m.capacity_health, CapacityHealth::AtRisk);
        assert_eq!(m.risk_score, 11);
    }

    #[test]
    fn test_velocity_order_and_filtering() {
        let m = compute(&setup(10, 1, 0.0, 10.0, [0.0, 25.0, 15.0]));
        assert_eq!(m.velocities, vec![25.0, 15.0]);
        assert!(approx(m.avg_velocity, 20.0));
        assert!(approx(m.volatility, 0.25));
    }

    #[test]
    fn test_single_velocity_has_no_volatility() {
        let (mean, cv) = velocity_stats(&[12.0]);
        assert_eq!(mean, 12.0);
        assert_eq!(cv, 0.0);
        assert_eq!(velocity_stats(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_volatility_penalty_capped() {
        let b = risk_penalties(10.0, 10.0, 1.0, 2.0);
        assert_eq!(b.volatility, VOLATILITY_PENALTY_CAP);
    }

    #[test]
    fn test_penalties_capped_and_score_bounded() {
        let m = compute(&setup(10, 1, 0.0, 1000.0, [10.0, 1.0, 0.0]));
        assert_eq!(m.penalties.overcommit, OVERCOMMIT_PENALTY_CAP);
        assert_eq!(m.penalties.capacity, CAPACITY_PENALTY_CAP);
        assert!(m.risk_score <= 100);
    }

    #[test]
    fn test_availability_guards() {
        assert_eq!(availability_ratio(0.0, 3.0), 0.0);
        assert_eq!(availability_ratio(10.0, 30.0), 0.0);
        assert_eq!(availability_ratio(10.0, 0.0), 1.0);
    }

    #[test]
    fn test_zero_team_counts_as_one_member() {
        let m = compute(&setup(10, 0, 5.0, 10.0, [20.0, 0.0, 0.0]));
        assert_eq!(m.ideal_person_days, 10.0);
        assert!(approx(m.availability_ratio, 0.5));
        assert!(approx(m.capacity_sp, 10.0));
    }

    #[test]
    fn test_invalid_fields_coerce_to_zero() {
        let bad = SprintSetup {
            sprint_days: 10,
            team_members: 2,
            leave_days: f64::NAN,
            committed_sp: -5.0,
            v1: f64::INFINITY,
            v2: 20.0,
            v3: -1.0,
        };
        let m = compute(&bad);
        assert_eq!(m.velocities, vec![20.0]);
        assert_eq!(m.committed_sp, 0.0);
        assert_eq!(m.availability_ratio, 1.0);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let s = setup(10, 5, 5.0, 50.0, [40.0, 42.0, 38.0]);
        let calc = CanonicalSignals;
        assert_eq!(calc.compute(&s), calc.compute(&s));
        assert_eq!(compute(&s), calc.compute(&s));
    }

    #[test]
    fn test_metrics_wire_names() {
        let m = compute(&setup(10, 5, 5.0, 50.0, [40.0, 42.0, 38.0]));
        let v = serde_json::to_value(&m).unwrap();
        assert!(v.get("capacitySP").is_some());
        assert!(v.get("committedSP").is_some());
        assert!(v.get("overcommitRatio").is_some());
        assert_eq!(v["capacityHealth"], "Critical");
        assert_eq!(v["riskScore"], 45);
    }
}
