// Cloudburst live generator
//
// Usage:
//   cloudburst_service                          # run the live generator
//   cloudburst_service run --ticks 10 --seed 7  # bounded, reproducible run
//   cloudburst_service check [--json]           # verify the data directory
//   cloudburst_service status                   # stages and latest risk per node
//   cloudburst_service set-stage node2 3        # manual override
//   cloudburst_service clear-stage [node2]      # drop one or all overrides
//
// Configuration comes from CLOUDBURST_CONFIG (or ./cloudburst.toml) after
// `.env` is applied. CLOUDBURST_LOG_LEVEL selects debug|info|warn|error.

use chrono::Utc;
use cloudburst_service::alert::risk::NodeStatus;
use cloudburst_service::config::Config;
use cloudburst_service::ingest::replay::ReplayDataset;
use cloudburst_service::logging::{self, Component, LogLevel};
use cloudburst_service::model::Stage;
use cloudburst_service::nodes;
use cloudburst_service::producer::{LiveTickProducer, Ports};
use cloudburst_service::store::json::{JsonOverrideFile, JsonStageFile};
use cloudburst_service::store::table::{latest_tick, CsvTableFile};
use cloudburst_service::store::{OverrideSource, StageStore, TableStore};
use cloudburst_service::verify;
use std::error::Error;
use std::process;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

enum Command {
    Run { ticks: Option<u64>, seed: Option<u64> },
    Check { json: bool },
    Status,
    SetStage { node_id: String, stage: Stage },
    ClearStage { node_id: Option<String> },
}

fn usage() -> &'static str {
    "usage: cloudburst_service [run [--ticks N] [--seed S] | check [--json] | status | \
     set-stage <node> <1|2|3> | clear-stage [node]]"
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(command) = args.first() else {
        return Ok(Command::Run { ticks: None, seed: None });
    };
    let rest = &args[1..];

    match command.as_str() {
        "run" => {
            let (mut ticks, mut seed) = (None, None);
            let mut i = 0;
            while i < rest.len() {
                let value = rest.get(i + 1);
                match (rest[i].as_str(), value) {
                    ("--ticks", Some(v)) => {
                        ticks = Some(v.parse().map_err(|_| format!("invalid --ticks '{}'", v))?);
                    }
                    ("--seed", Some(v)) => {
                        seed = Some(v.parse().map_err(|_| format!("invalid --seed '{}'", v))?);
                    }
                    (flag, _) => return Err(format!("unknown or incomplete argument '{}'", flag)),
                }
                i += 2;
            }
            Ok(Command::Run { ticks, seed })
        }
        "check" => match rest {
            [] => Ok(Command::Check { json: false }),
            [flag] if flag == "--json" => Ok(Command::Check { json: true }),
            _ => Err(usage().to_string()),
        },
        "status" => Ok(Command::Status),
        "set-stage" => match rest {
            [node, stage] => Ok(Command::SetStage {
                node_id: node.clone(),
                stage: stage.parse().map_err(|e| format!("{}", e))?,
            }),
            _ => Err(usage().to_string()),
        },
        "clear-stage" => match rest {
            [] => Ok(Command::ClearStage { node_id: None }),
            [node] => Ok(Command::ClearStage {
                node_id: Some(node.clone()),
            }),
            _ => Err(usage().to_string()),
        },
        "-h" | "--help" | "help" => Err(usage().to_string()),
        other => Err(format!("unknown command '{}'\n{}", other, usage())),
    }
}

// ─── Commands ───────────────────────────────────────────────────────────────

fn run(mut config: Config, ticks: Option<u64>, seed: Option<u64>) -> Result<(), Box<dyn Error>> {
    if seed.is_some() {
        config.service.seed = seed;
    }

    let replay_path = config.paths.replay_csv();
    let replay = ReplayDataset::load(&replay_path)?;
    logging::info(
        Component::Replay,
        None,
        &format!("loaded {} rows from {}", replay.len(), replay_path.display()),
    );

    let ports = Ports::from_config(&config);
    let mut producer = LiveTickProducer::new(&config, replay, ports);
    producer.run(ticks);
    Ok(())
}

fn check(config: &Config, json: bool) -> Result<(), Box<dyn Error>> {
    let report = verify::run_data_check(config, Utc::now());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        verify::print_summary(&report);
    }
    if report.is_healthy() {
        Ok(())
    } else {
        Err(format!("{} data source(s) failed", report.summary.failed).into())
    }
}

fn status(config: &Config) -> Result<(), Box<dyn Error>> {
    let stages = match JsonStageFile::new(config.paths.stage_state()).load() {
        Ok(stages) => stages,
        Err(e) => {
            logging::log_input_failure(Component::Stage, "load stage state", &e);
            Default::default()
        }
    };
    let rows = match CsvTableFile::new(config.paths.live_csv()).load() {
        Ok(rows) => rows,
        Err(e) => {
            logging::log_input_failure(Component::Table, "load live table", &e);
            Vec::new()
        }
    };
    let overrides = match JsonOverrideFile::new(config.paths.manual_stage()).load() {
        Ok(overrides) => overrides,
        Err(e) => {
            logging::log_input_failure(Component::Override, "read manual overrides", &e);
            Default::default()
        }
    };
    let latest = latest_tick(&rows);
    if let Some(first) = latest.first() {
        println!("latest tick: {}", first.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    println!("{:<10} {:>5} {:>7}  {}", "node", "stage", "risk", "alert");
    for node in &config.nodes {
        let stage = stages.get(&node.node_id).copied().unwrap_or_default();
        match latest.iter().find(|r| r.node_id == node.node_id) {
            Some(row) => {
                let status = NodeStatus::new(row.stage, row.risk_score);
                println!(
                    "{:<10} {:>5} {:>7.1}  {}{}",
                    node.node_id,
                    stage.as_u8(),
                    status.risk,
                    status.alert,
                    if row.notes.is_empty() { String::new() } else { format!("  ({})", row.notes) }
                );
            }
            None => println!("{:<10} {:>5} {:>7}  -", node.node_id, stage.as_u8(), "-"),
        }
    }

    if overrides.is_empty() {
        println!("no manual overrides");
    } else {
        let active: Vec<String> = overrides
            .iter()
            .map(|(node, stage)| format!("{}={}", node, stage))
            .collect();
        println!("manual overrides: {}", active.join(" "));
    }
    Ok(())
}

fn set_stage(config: &Config, node_id: &str, stage: Stage) -> Result<(), Box<dyn Error>> {
    if nodes::find_node(&config.nodes, node_id).is_none() {
        return Err(format!(
            "unknown node '{}' (known: {})",
            node_id,
            nodes::all_node_ids(&config.nodes).join(", ")
        )
        .into());
    }
    let file = JsonOverrideFile::new(config.paths.manual_stage());
    let overrides = file.set(node_id, stage)?;
    logging::info(
        Component::Override,
        Some(node_id),
        &format!("override set to stage {} ({} active)", stage, overrides.len()),
    );
    Ok(())
}

fn clear_stage(config: &Config, node_id: Option<&str>) -> Result<(), Box<dyn Error>> {
    let file = JsonOverrideFile::new(config.paths.manual_stage());
    let message = match node_id {
        Some(id) => {
            if file.clear_node(id)? {
                format!("override cleared for {}", id)
            } else {
                format!("no override set for {}", id)
            }
        }
        None => {
            if file.clear_all()? {
                "all overrides cleared".to_string()
            } else {
                "no overrides set".to_string()
            }
        }
    };
    logging::info(Component::Override, node_id, &message);
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(2);
        }
    };

    let config = match Config::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            process::exit(1);
        }
    };

    let level = match std::env::var("CLOUDBURST_LOG_LEVEL") {
        Ok(value) => value.parse().unwrap_or_else(|e| {
            eprintln!("⚠ {}; using info", e);
            LogLevel::Info
        }),
        Err(_) => LogLevel::Info,
    };
    let log_file = config.paths.log_file.as_ref().map(|p| p.display().to_string());
    let daemon = matches!(command, Command::Run { .. });
    logging::init_logger(level, log_file.as_deref(), daemon);

    let result = match command {
        Command::Run { ticks, seed } => run(config, ticks, seed),
        Command::Check { json } => check(&config, json),
        Command::Status => status(&config),
        Command::SetStage { node_id, stage } => set_stage(&config, &node_id, stage),
        Command::ClearStage { node_id } => clear_stage(&config, node_id.as_deref()),
    };

    if let Err(e) = result {
        logging::error(Component::System, None, &e.to_string());
        process::exit(1);
    }
}
