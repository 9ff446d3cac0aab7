/// Per-node signal analysis for the live generator.
///
/// Submodules:
/// - `rolling` — bounded per-node history and short-horizon deltas.

pub mod rolling;
