//! Placeholder risk score and its classification.
//!
//! The live generator does not estimate risk; it writes a uniform random
//! stand-in whose range depends on the stage. The learned estimate is
//! produced by the separate predictor and is never mixed in here.

use crate::model::Stage;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Range of the placeholder score for a stage and override state.
pub fn placeholder_range(stage: Stage, forced: bool) -> (f64, f64) {
    match (forced, stage) {
        (true, Stage::Normal) => (10.0, 30.0),
        (true, _) => (60.0, 98.0),
        (false, Stage::Normal) => (0.0, 40.0),
        (false, Stage::Watch) => (30.0, 85.0),
        (false, Stage::Alert) => (70.0, 100.0),
    }
}

pub fn placeholder_risk<R: Rng + ?Sized>(rng: &mut R, stage: Stage, forced: bool) -> f64 {
    let (lo, hi) = placeholder_range(stage, forced);
    rng.gen_range(lo..=hi)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            RiskLevel::Low
        } else if score < 60.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// Alert string published to the field hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Normal,
    Warning,
    HighRisk,
}

impl From<RiskLevel> for AlertLevel {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => AlertLevel::Normal,
            RiskLevel::Medium => AlertLevel::Warning,
            RiskLevel::High => AlertLevel::HighRisk,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Normal => write!(f, "NORMAL"),
            AlertLevel::Warning => write!(f, "WARNING"),
            AlertLevel::HighRisk => write!(f, "HIGH_RISK"),
        }
    }
}

/// Per-node status entry written after every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub stage: Stage,
    pub risk: f64,
    pub alert: AlertLevel,
}

impl NodeStatus {
    pub fn new(stage: Stage, risk: f64) -> Self {
        Self {
            stage,
            risk,
            alert: RiskLevel::from_score(risk).into(),
        }
    }
}
