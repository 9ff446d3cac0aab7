//! Automatic stage-escalation triggers.
//!
//! Pure functions of the node's current snapshot, its rolling deltas and
//! its persisted stage. Thresholds come from `config::TriggerThresholds`.

use crate::config::TriggerThresholds;
use crate::model::{EnvironmentSample, RollingDeltas, Stage};

/// Escalation signals for one node at one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerSignal {
    pub escalate_to_2: bool,
    pub escalate_to_3: bool,
}

/// Stage 2 fires on strong reflectivity alone, or on a sharp pressure drop
/// combined with a humidity rise.
pub fn stage2_triggered(
    thresholds: &TriggerThresholds,
    environment: &EnvironmentSample,
    deltas: &RollingDeltas,
) -> bool {
    let reflectivity = environment.cloud.radar_dbz >= thresholds.dbz_stage2;
    let pressure_humidity = deltas.pressure_drop_5 <= thresholds.pressure_drop_5
        && deltas.humidity_change_15 >= thresholds.humidity_rise_15;
    reflectivity || pressure_humidity
}

/// Stage 3 fires on reflectivity growth, and only for a node already at
/// stage 2 or above. A stage-1 node can never reach 3 in one step.
pub fn stage3_triggered(
    thresholds: &TriggerThresholds,
    environment: &EnvironmentSample,
    current: Stage,
) -> bool {
    current >= Stage::Watch && environment.burst_dbz_growth >= thresholds.dbz_growth_stage3
}

pub fn evaluate(
    thresholds: &TriggerThresholds,
    environment: &EnvironmentSample,
    deltas: &RollingDeltas,
    current: Stage,
) -> TriggerSignal {
    TriggerSignal {
        escalate_to_2: stage2_triggered(thresholds, environment, deltas),
        escalate_to_3: stage3_triggered(thresholds, environment, current),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
