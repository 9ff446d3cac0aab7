//! Cloudburst early-warning live generator.
//!
//! Replays a Stage-1 environment dataset across a small network of sensor
//! nodes, escalates each node through stages 1 -> 2 -> 3 on fixed triggers,
//! honours operator overrides, and maintains the bounded live table the
//! dashboard reads.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod nodes;
pub mod noise;
pub mod producer;
pub mod store;
pub mod synth;
pub mod verify;
