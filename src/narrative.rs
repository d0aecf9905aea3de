//! Narrative Generator - plain-language read of the analyzer output.
//!
//! Only consumes `Analysis` and the history it was computed from; never
//! recomputes metrics.

use serde::{Deserialize, Serialize};

use crate::logging;
use crate::snapshot::{Mode, Snapshot};
use crate::trend::{Analysis, Band, PredictabilityScore, Trend};

/// Overall tone of the explanation, for styling by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Calm,
    Cautious,
    Urgent,
    Neutral,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Calm => "calm",
            Tone::Cautious => "cautious",
            Tone::Urgent => "urgent",
            Tone::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub headline: String,
    pub tone: Tone,
    pub lines: Vec<String>,
}

impl Narrative {
    pub fn render(&self) -> String {
        let mut out = self.headline.clone();
        for line in &self.lines {
            out.push_str("\n- ");
            out.push_str(line);
        }
        out
    }
}

pub fn explain(history: &[Snapshot], analysis: &Analysis) -> Narrative {
    let Some(latest) = analysis.latest.as_ref().or(history.last()) else {
        return Narrative {
            headline: "No snapshots yet. Save one to start tracking this sprint.".to_string(),
            tone: Tone::Neutral,
            lines: Vec::new(),
        };
    };

    let (headline, tone) = headline(latest);
    let mut lines = Vec::new();

    lines.push(format!(
        "Stability index {}/100 ({}).",
        analysis.stability.index,
        analysis.stability.label.as_str()
    ));

    if history.len() >= 2 {
        lines.push(direction_line(analysis.arrows.risk, analysis.arrows.confidence));
    }

    if analysis.overcommit_streak >= 2 {
        lines.push(format!(
            "Commitment has exceeded capacity for {} snapshots in a row.",
            analysis.overcommit_streak
        ));
    } else if analysis.overcommit_streak == 1 {
        lines.push("The latest plan commits more than the team's capacity.".to_string());
    }

    match analysis.predictability.score {
        PredictabilityScore::InsufficientData => {}
        score => lines.push(format!("Predictability {}: {}", score.as_str(), analysis.predictability.hint)),
    }

    let band = &analysis.volatility_band;
    if band.band == Band::Wide {
        lines.push(format!(
            "Risk has ranged {}-{} over the last {} snapshots; the plan is not settling.",
            band.low, band.high, band.samples
        ));
    }

    let narrative = Narrative { headline, tone, lines };
    logging::log_narrative(narrative.tone.as_str(), narrative.lines.len());
    narrative
}

fn headline(latest: &Snapshot) -> (String, Tone) {
    match latest.mode {
        Mode::Rescue => (
            format!(
                "Rescue mode: risk {} with {:.0}% of capacity committed. Cut scope before the sprint starts slipping.",
                latest.risk_score,
                latest.overcommit_ratio * 100.0
            ),
            Tone::Urgent,
        ),
        Mode::Watch => (
            format!(
                "Watch: risk {} and confidence {}%. The plan is tight; keep an eye on scope changes.",
                latest.risk_score, latest.confidence
            ),
            Tone::Cautious,
        ),
        Mode::Stable => (
            format!(
                "Stable: risk {} and confidence {}%. The commitment fits the team's capacity.",
                latest.risk_score, latest.confidence
            ),
            Tone::Calm,
        ),
    }
}

fn direction_line(risk: Trend, confidence: Trend) -> String {
    let risk_part = match risk {
        Trend::Up => "Risk is rising",
        Trend::Down => "Risk is falling",
        Trend::Flat => "Risk is unchanged",
    };
    let confidence_part = match confidence {
        Trend::Up => "confidence is improving",
        Trend::Down => "confidence is slipping",
        Trend::Flat => "confidence is holding",
    };
    format!(
        "{} {} and {} {} since the previous snapshot.",
        risk_part,
        risk.arrow(),
        confidence_part,
        confidence.arrow()
    )
}
