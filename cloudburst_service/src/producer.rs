//! Live multi-node tick producer.
//!
//! One tick, for every node in registry order:
//!   replay row (or hardware reading) + per-node noise
//!   → rolling history → triggers (replay cloud fields, per-node deltas)
//!   → stage machine
//!   → synthetic tiers → placeholder risk → output row
//! then the stage map is saved, the live table appended and rotated, and the
//! node status published. Ticks run sequentially on one thread; the only
//! suspension point is the sleep between ticks.

use crate::alert::risk::{placeholder_risk, NodeStatus};
use crate::alert::stage::StageStateMachine;
use crate::alert::stalenesses::reading_is_stale;
use crate::alert::triggers::{self, TriggerSignal};
use crate::analysis::rolling::RollingWindowStore;
use crate::config::{Config, NoiseScales, TriggerThresholds};
use crate::ingest::hardware::CsvHardwareFeed;
use crate::ingest::replay::ReplayDataset;
use crate::logging::{self, Component};
use crate::model::{
    override_note, EnvironmentSample, ManualOverrides, OutputRow, Stage, StageMap, SurfaceReading,
};
use crate::noise::{perturb_cloud, perturb_surface};
use crate::nodes::Node;
use crate::store::json::{JsonOverrideFile, JsonStageFile, JsonStatusFile};
use crate::store::table::CsvTableFile;
use crate::store::{
    append_rotate, HardwareFeed, MemoryStore, OverrideSource, StageStore, StatusMap, StatusSink,
    TableStore,
};
use crate::synth::SyntheticSignalSynthesizer;
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Ports bundle
// ---------------------------------------------------------------------------

/// The external collaborators one producer talks to.
pub struct Ports {
    pub hardware: Box<dyn HardwareFeed>,
    pub overrides: Box<dyn OverrideSource>,
    pub stages: Box<dyn StageStore>,
    pub table: Box<dyn TableStore>,
    pub status: Option<Box<dyn StatusSink>>,
}

impl Ports {
    /// File-backed ports at the configured paths.
    pub fn from_config(config: &Config) -> Self {
        let paths = &config.paths;
        Self {
            hardware: Box::new(CsvHardwareFeed::new(paths.hardware_csv())),
            overrides: Box::new(JsonOverrideFile::new(paths.manual_stage())),
            stages: Box::new(JsonStageFile::new(paths.stage_state())),
            table: Box::new(CsvTableFile::new(paths.live_csv())),
            status: Some(Box::new(JsonStatusFile::new(paths.status_json()))),
        }
    }

    /// Every port backed by the same shared in-memory store.
    pub fn in_memory(store: &MemoryStore) -> Self {
        Self {
            hardware: Box::new(store.clone()),
            overrides: Box::new(store.clone()),
            stages: Box::new(store.clone()),
            table: Box::new(store.clone()),
            status: Some(Box::new(store.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// What one tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// 1-based tick sequence number since process start.
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub rows: Vec<OutputRow>,
    pub stages: StageMap,
    /// Live-table length after rotation.
    pub table_len: usize,
}

impl TickReport {
    pub fn row(&self, node_id: &str) -> Option<&OutputRow> {
        self.rows.iter().find(|r| r.node_id == node_id)
    }

    pub fn stage(&self, node_id: &str) -> Option<Stage> {
        self.stages.get(node_id).copied()
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

pub struct LiveTickProducer {
    nodes: Vec<Node>,
    replay: ReplayDataset,
    ports: Ports,
    rolling: RollingWindowStore,
    machine: StageStateMachine,
    synth: SyntheticSignalSynthesizer,
    rng: ChaCha8Rng,
    thresholds: TriggerThresholds,
    noise: NoiseScales,
    interval: Duration,
    max_rows: usize,
    hardware_max_age_minutes: Option<u64>,
    ticks: u64,
}

impl LiveTickProducer {
    /// Builds a producer and resumes the persisted stage map. A missing or
    /// unreadable stage file starts every node at stage 1.
    pub fn new(config: &Config, replay: ReplayDataset, ports: Ports) -> Self {
        let persisted = match ports.stages.load() {
            Ok(stages) => stages,
            Err(e) => {
                logging::log_input_failure(Component::Stage, "load stage state", &e);
                StageMap::new()
            }
        };
        let mut machine = StageStateMachine::from_persisted(persisted);
        machine.seed_nodes(config.nodes.iter().map(|n| n.node_id.as_str()));

        let rng = match config.service.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            nodes: config.nodes.clone(),
            replay,
            ports,
            rolling: RollingWindowStore::new(config.service.interval_secs),
            machine,
            synth: SyntheticSignalSynthesizer::new(),
            rng,
            thresholds: config.triggers,
            noise: config.noise,
            interval: Duration::from_secs(config.service.interval_secs),
            max_rows: config.max_rows(),
            hardware_max_age_minutes: config.hardware.max_age_minutes,
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn stage(&self, node_id: &str) -> Stage {
        self.machine.current(node_id)
    }

    pub fn rolling(&self) -> &RollingWindowStore {
        &self.rolling
    }

    pub fn synth(&self) -> &SyntheticSignalSynthesizer {
        &self.synth
    }

    /// Runs one tick stamped `now`.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> TickReport {
        let replay_row = *self.replay.row(self.ticks);
        let hardware = self.read_hardware(now);
        let overrides = self.read_overrides();

        let mut rows = Vec::with_capacity(self.nodes.len());
        let mut status = StatusMap::new();

        for node in &self.nodes {
            let id = node.node_id.as_str();

            let surface_override = if node.hardware { hardware } else { None };
            let env = node_environment(&mut self.rng, &replay_row, surface_override, &self.noise);

            self.rolling.update(id, now, env.surface.pressure, env.surface.humidity);
            let deltas = self.rolling.deltas(id);

            // Cloud triggers read the shared replay row; only the deltas are per node.
            let signal: TriggerSignal = triggers::evaluate(
                &self.thresholds,
                &replay_row,
                &deltas,
                self.machine.current(id),
            );
            let transition = self.machine.transition(id, overrides.get(id).copied(), signal);
            let stage = transition.stage;
            let forced = transition.forced;

            if transition.changed() {
                let how = if forced { "manual override" } else { "auto trigger" };
                logging::info(
                    Component::Stage,
                    Some(id),
                    &format!("stage {} -> {} ({})", transition.previous, stage, how),
                );
            }

            // Both tiers advance every tick; only the jump flags depend on stage.
            let stage2 = self.synth.sample_stage2(&mut self.rng, id, stage >= Stage::Watch, forced);
            let stage3 = self.synth.sample_stage3(&mut self.rng, id, stage >= Stage::Alert, forced);
            let risk = placeholder_risk(&mut self.rng, stage, forced);
            let notes = if forced { override_note(stage) } else { String::new() };

            match OutputRow::new(
                now, id, node.lat, node.lon, &env, deltas, stage, stage2, stage3, risk, notes,
            ) {
                Ok(row) => {
                    status.insert(id.to_string(), NodeStatus::new(stage, risk));
                    rows.push(row);
                }
                Err(e) => logging::error(Component::Tick, Some(id), &format!("dropping row: {}", e)),
            }
        }

        let stages = self.machine.snapshot();
        if let Err(e) = self.ports.stages.save(&stages) {
            logging::error(Component::Stage, None, &format!("save stage state failed: {}", e));
        }

        let table_len = self.persist_rows(&rows);

        if let Some(sink) = &self.ports.status {
            if let Err(e) = sink.publish(&status) {
                logging::error(Component::System, None, &format!("publish status failed: {}", e));
            }
        }

        self.ticks += 1;
        logging::log_tick_summary(self.ticks, rows.len(), table_len, &stages);

        TickReport {
            tick: self.ticks,
            timestamp: now,
            rows,
            stages,
            table_len,
        }
    }

    /// Runs ticks on the fixed interval. Returns only when `max_ticks` is
    /// reached; with `None` it runs until the process is killed.
    pub fn run(&mut self, max_ticks: Option<u64>) {
        logging::info(
            Component::System,
            None,
            &format!(
                "live generator started: {} nodes, {} replay rows, every {}s",
                self.nodes.len(),
                self.replay.len(),
                self.interval.as_secs()
            ),
        );

        let mut next = Instant::now();
        let mut done = 0u64;
        loop {
            self.tick_at(Utc::now());
            done += 1;
            if max_ticks.is_some_and(|max| done >= max) {
                return;
            }

            next += self.interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                logging::warn(Component::Tick, None, "tick overran its interval");
                next = now;
            }
        }
    }

    fn read_hardware(&self, now: DateTime<Utc>) -> Option<SurfaceReading> {
        if !self.nodes.iter().any(|n| n.hardware) {
            return None;
        }
        match self.ports.hardware.latest() {
            Ok(reading) if reading_is_stale(reading.observed_at, self.hardware_max_age_minutes, now) => {
                logging::warn(Component::Hardware, None, "hardware reading is stale, using replay");
                None
            }
            Ok(reading) => Some(reading.surface),
            Err(e) => {
                logging::log_input_failure(Component::Hardware, "read hardware feed", &e);
                None
            }
        }
    }

    /// Fresh every tick. Entries for unknown nodes are ignored.
    fn read_overrides(&self) -> ManualOverrides {
        let mut overrides = match self.ports.overrides.load() {
            Ok(map) => map,
            Err(e) => {
                logging::log_input_failure(Component::Override, "read manual overrides", &e);
                return ManualOverrides::new();
            }
        };
        overrides.retain(|node_id, _| {
            let known = self.nodes.iter().any(|n| &n.node_id == node_id);
            if !known {
                logging::debug(Component::Override, Some(node_id), "override for unknown node ignored");
            }
            known
        });
        overrides
    }

    fn persist_rows(&self, rows: &[OutputRow]) -> usize {
        let mut table = match self.ports.table.load() {
            Ok(existing) => existing,
            Err(e) => {
                logging::log_input_failure(Component::Table, "load live table", &e);
                Vec::new()
            }
        };
        append_rotate(&mut table, rows, self.max_rows);
        if let Err(e) = self.ports.table.save(&table) {
            logging::error(Component::Table, None, &format!("save live table failed: {}", e));
        }
        table.len()
    }
}

/// Environment for one node: hardware surface fields when available,
/// otherwise the replay row with per-node noise. Reflectivity and echo top
/// are perturbed for every node.
fn node_environment<R: Rng + ?Sized>(
    rng: &mut R,
    replay_row: &EnvironmentSample,
    hardware: Option<SurfaceReading>,
    noise: &NoiseScales,
) -> EnvironmentSample {
    let surface = match hardware {
        Some(reading) => reading,
        None => perturb_surface(rng, &replay_row.surface, noise),
    };
    EnvironmentSample {
        surface,
        cloud: perturb_cloud(rng, &replay_row.cloud, noise),
        burst_dbz_growth: replay_row.burst_dbz_growth,
    }
}
