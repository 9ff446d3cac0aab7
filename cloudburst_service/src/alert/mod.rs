//! Escalation logic: trigger evaluation, the per-node stage machine, the
//! placeholder risk score, and hardware staleness checks.

pub mod risk;
pub mod stage;
pub mod stalenesses;
pub mod triggers;
