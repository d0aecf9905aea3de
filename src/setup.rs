//! Sprint planning inputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce;

/// Raw planning inputs as entered by the user.
///
/// Deserialization never fails on field contents: strings, nulls, negatives
/// and missing fields all become 0. Only a non-object document is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprintSetup {
    #[serde(rename = "sprintDays", deserialize_with = "coerce::lenient_u32")]
    pub sprint_days: u32,
    #[serde(rename = "teamMembers", deserialize_with = "coerce::lenient_u32")]
    pub team_members: u32,
    #[serde(rename = "leaveDays", deserialize_with = "coerce::lenient_f64")]
    pub leave_days: f64,
    #[serde(rename = "committedSP", deserialize_with = "coerce::lenient_f64")]
    pub committed_sp: f64,
    /// Most recent completed sprint velocity; 0 means unset.
    #[serde(deserialize_with = "coerce::lenient_f64")]
    pub v1: f64,
    #[serde(deserialize_with = "coerce::lenient_f64")]
    pub v2: f64,
    #[serde(deserialize_with = "coerce::lenient_f64")]
    pub v3: f64,
}

impl SprintSetup {
    /// Build from an arbitrary JSON value; non-objects yield the zero setup.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                sprint_days: map.get("sprintDays").map(coerce::count).unwrap_or(0),
                team_members: map.get("teamMembers").map(coerce::count).unwrap_or(0),
                leave_days: coerce::field(map.get("leaveDays")),
                committed_sp: coerce::field(map.get("committedSP")),
                v1: coerce::field(map.get("v1")),
                v2: coerce::field(map.get("v2")),
                v3: coerce::field(map.get("v3")),
            },
            _ => Self::default(),
        }
    }

    /// Copy with every float field forced finite and non-negative.
    ///
    /// Public fields can be set to anything, so computation always goes
    /// through this first.
    pub fn sanitized(&self) -> Self {
        Self {
            sprint_days: self.sprint_days,
            team_members: self.team_members,
            leave_days: coerce::non_negative(self.leave_days),
            committed_sp: coerce::non_negative(self.committed_sp),
            v1: coerce::non_negative(self.v1),
            v2: coerce::non_negative(self.v2),
            v3: coerce::non_negative(self.v3),
        }
    }

    pub fn velocities(&self) -> [f64; 3] {
        [self.v1, self.v2, self.v3]
    }
}
