//! Per-node stage state machine.
//!
//! Precedence per tick:
//!   1. a manual override sets the stage directly (up or down);
//!   2. otherwise 1 -> 2 on `escalate_to_2`, 2 -> 3 on `escalate_to_3`.
//!
//! Automatic transitions never lower the stage.

use super::triggers::TriggerSignal;
use crate::model::{Stage, StageMap};

/// Outcome of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: Stage,
    pub stage: Stage,
    /// The stage came from a manual override this tick.
    pub forced: bool,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.previous != self.stage
    }
}

#[derive(Debug, Clone, Default)]
pub struct StageStateMachine {
    stages: StageMap,
}

impl StageStateMachine {
    /// Resumes from a persisted stage map. Nodes missing from it start at 1.
    pub fn from_persisted(stages: StageMap) -> Self {
        Self { stages }
    }

    pub fn current(&self, node_id: &str) -> Stage {
        self.stages.get(node_id).copied().unwrap_or_default()
    }

    pub fn transition(
        &mut self,
        node_id: &str,
        manual: Option<Stage>,
        signal: TriggerSignal,
    ) -> Transition {
        let previous = self.current(node_id);

        let (stage, forced) = match manual {
            Some(stage) => (stage, true),
            None => (auto_next(previous, signal), false),
        };

        self.stages.insert(node_id.to_string(), stage);
        Transition {
            previous,
            stage,
            forced,
        }
    }

    /// Snapshot to persist after the tick.
    pub fn snapshot(&self) -> StageMap {
        self.stages.clone()
    }

    /// Ensures every listed node has an entry, so the persisted map always
    /// covers the whole registry.
    pub fn seed_nodes<'a>(&mut self, node_ids: impl IntoIterator<Item = &'a str>) {
        for id in node_ids {
            self.stages.entry(id.to_string()).or_default();
        }
    }
}

fn auto_next(previous: Stage, signal: TriggerSignal) -> Stage {
    match previous {
        Stage::Normal if signal.escalate_to_2 => Stage::Watch,
        // Only a node that entered the tick at 2 may reach 3.
        Stage::Watch if signal.escalate_to_3 => Stage::Alert,
        stage => stage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: TriggerSignal = TriggerSignal {
        escalate_to_2: false,
        escalate_to_3: false,
    };
    const TO_2: TriggerSignal = TriggerSignal {
        escalate_to_2: true,
        escalate_to_3: false,
    };
    const TO_3: TriggerSignal = TriggerSignal {
        escalate_to_2: false,
        escalate_to_3: true,
    };
    const BOTH: TriggerSignal = TriggerSignal {
        escalate_to_2: true,
        escalate_to_3: true,
    };

    #[test]
    fn test_unknown_node_starts_normal() {
        let machine = StageStateMachine::default();
        assert_eq!(machine.current("node0"), Stage::Normal);
    }

    #[test]
    fn test_auto_escalation_steps_one_at_a_time() {
        let mut machine = StageStateMachine::default();
        assert_eq!(machine.transition("A", None, TO_2).stage, Stage::Watch);
        assert_eq!(machine.transition("A", None, TO_3).stage, Stage::Alert);
    }

    #[test]
    fn test_stage3_signal_ignored_at_stage1() {
        let mut machine = StageStateMachine::default();
        let t = machine.transition("A", None, TO_3);
        assert_eq!(t.stage, Stage::Normal);
        assert!(!t.changed());
    }

    #[test]
    fn test_quiet_signal_never_downgrades() {
        let mut persisted = StageMap::new();
        persisted.insert("A".to_string(), Stage::Alert);
        let mut machine = StageStateMachine::from_persisted(persisted);
        for _ in 0..5 {
            assert_eq!(machine.transition("A", None, QUIET).stage, Stage::Alert);
        }
    }

    #[test]
    fn test_override_wins_in_both_directions() {
        let mut machine = StageStateMachine::default();
        machine.transition("A", None, TO_2);
        machine.transition("A", None, TO_3);

        let down = machine.transition("A", Some(Stage::Normal), BOTH);
        assert_eq!(down.stage, Stage::Normal);
        assert!(down.forced);
        assert_eq!(down.previous, Stage::Alert);

        let up = machine.transition("B", Some(Stage::Alert), QUIET);
        assert_eq!(up.stage, Stage::Alert);
        assert!(up.forced);
    }

    #[test]
    fn test_auto_logic_resumes_from_overridden_stage() {
        let mut machine = StageStateMachine::default();
        machine.transition("A", Some(Stage::Watch), QUIET);
        // Override removed: stage stays where the override left it.
        let t = machine.transition("A", None, QUIET);
        assert_eq!(t.stage, Stage::Watch);
        assert!(!t.forced);
    }

    #[test]
    fn test_non_decreasing_without_override() {
        let mut machine = StageStateMachine::default();
        let signals = [QUIET, TO_3, TO_2, QUIET, BOTH, QUIET, TO_2];
        let mut last = Stage::Normal;
        for signal in signals {
            let stage = machine.transition("A", None, signal).stage;
            assert!(stage >= last);
            last = stage;
        }
        assert_eq!(last, Stage::Alert);
    }

    #[test]
    fn test_seed_nodes_fills_missing_entries_only() {
        let mut persisted = StageMap::new();
        persisted.insert("node1".to_string(), Stage::Watch);
        let mut machine = StageStateMachine::from_persisted(persisted);
        machine.seed_nodes(["node0", "node1"]);
        let snapshot = machine.snapshot();
        assert_eq!(snapshot["node0"], Stage::Normal);
        assert_eq!(snapshot["node1"], Stage::Watch);
    }
}
