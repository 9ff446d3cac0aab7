//! Synthetic stage-2 microphysics and stage-3 burst signals.
//!
//! Each node carries two small vectors of smoothed values, one per tier.
//! Every call nudges the previous values instead of resampling, so the traces
//! are continuous. While a tier is active (or the stage was forced by an
//! operator) the nudge is a strictly positive jump; otherwise it is a small
//! symmetric drift. State lives for the process lifetime only.

use crate::model::{Stage2Fields, Stage3Fields};
use rand::Rng;
use std::collections::HashMap;

pub const SIGNALS_PER_TIER: usize = 6;

type TierState = [f64; SIGNALS_PER_TIER];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Stage-2 microphysics fields.
    Microphysics,
    /// Stage-3 burst fields.
    Burst,
}

#[derive(Debug, Clone, Copy)]
struct SignalParams {
    baseline: f64,
    noise: f64,
}

const fn signal(baseline: f64, noise: f64) -> SignalParams {
    SignalParams { baseline, noise }
}

/// Jump increments are drawn from `[noise * factor, noise * factor * span]`.
#[derive(Debug)]
struct TierParams {
    jump_factor: f64,
    jump_span: f64,
    signals: [SignalParams; SIGNALS_PER_TIER],
}

// lwc, droplet size, vertical wind, turbulence, moisture gradient, temp gradient
const MICROPHYSICS: TierParams = TierParams {
    jump_factor: 2.0,
    jump_span: 3.0,
    signals: [
        signal(0.5, 0.2),
        signal(1.0, 0.1),
        signal(3.0, 0.5),
        signal(1.0, 0.3),
        signal(4.0, 0.5),
        signal(1.5, 0.3),
    ],
};

// dbz growth, updraft surge, lightning burst, lwc spike, drop collapse, rainfall burst
const BURST: TierParams = TierParams {
    jump_factor: 3.0,
    jump_span: 4.0,
    signals: [
        signal(2.0, 1.0),
        signal(6.0, 2.0),
        signal(3.0, 1.5),
        signal(1.0, 0.6),
        signal(0.5, 0.2),
        signal(5.0, 1.5),
    ],
};

impl Tier {
    fn params(self) -> &'static TierParams {
        match self {
            Tier::Microphysics => &MICROPHYSICS,
            Tier::Burst => &BURST,
        }
    }

    /// Starting values for a node that has not been sampled yet.
    pub fn baseline(self) -> TierState {
        self.params().signals.map(|s| s.baseline)
    }

    /// Inclusive increment range when the tier is escalating.
    pub fn jump_range(self, signal: usize) -> (f64, f64) {
        let p = self.params();
        let lo = p.signals[signal].noise * p.jump_factor;
        (lo, lo * p.jump_span)
    }

    /// Inclusive increment range for baseline drift.
    pub fn drift_range(self, signal: usize) -> (f64, f64) {
        let noise = self.params().signals[signal].noise;
        (-noise, noise)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticSignalSynthesizer {
    microphysics: HashMap<String, TierState>,
    burst: HashMap<String, TierState>,
}

impl SyntheticSignalSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn states_mut(&mut self, tier: Tier) -> &mut HashMap<String, TierState> {
        match tier {
            Tier::Microphysics => &mut self.microphysics,
            Tier::Burst => &mut self.burst,
        }
    }

    /// Current smoothed values for a node, if it has been sampled.
    pub fn state(&self, tier: Tier, node_id: &str) -> Option<TierState> {
        match tier {
            Tier::Microphysics => self.microphysics.get(node_id).copied(),
            Tier::Burst => self.burst.get(node_id).copied(),
        }
    }

    /// Advances one tier for one node and returns the new values.
    ///
    /// `jump` means the node's stage qualifies for this tier; `forced` means
    /// the stage was set by a manual override this tick. Either one selects
    /// the positive jump range.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        tier: Tier,
        node_id: &str,
        jump: bool,
        forced: bool,
    ) -> TierState {
        let escalating = jump || forced;
        let state = self
            .states_mut(tier)
            .entry(node_id.to_string())
            .or_insert_with(|| tier.baseline());

        for (i, value) in state.iter_mut().enumerate() {
            let (lo, hi) = if escalating {
                tier.jump_range(i)
            } else {
                tier.drift_range(i)
            };
            *value += rng.gen_range(lo..=hi);
        }
        *state
    }

    pub fn sample_stage2<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        node_id: &str,
        jump: bool,
        forced: bool,
    ) -> Stage2Fields {
        let v = self.sample(rng, Tier::Microphysics, node_id, jump, forced);
        Stage2Fields {
            micro_lwc: v[0],
            micro_droplet_size: v[1],
            micro_vertical_wind: v[2],
            micro_turbulence: v[3],
            micro_moisture_gradient: v[4],
            micro_temp_gradient: v[5],
        }
    }

    pub fn sample_stage3<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        node_id: &str,
        jump: bool,
        forced: bool,
    ) -> Stage3Fields {
        let v = self.sample(rng, Tier::Burst, node_id, jump, forced);
        Stage3Fields {
            burst_dbz_growth: v[0],
            burst_updraft_surge: v[1],
            // Strike count: the smoothed value may drift below zero.
            burst_lightning_burst: v[2].max(0.0) as u32,
            burst_lwc_spike: v[3],
            burst_drop_collapse: v[4],
            burst_rainfall_burst: v[5],
        }
    }
}
