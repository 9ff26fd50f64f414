//! Escalation ladder of increasingly invasive recovery strategies
//!
//! The rung index only moves forward; the single way back is `reset()`,
//! called after a successful cycle or a successful emergency recovery.

use crate::recovery::types::RecoveryStrategy;
use serde::{Deserialize, Serialize};

/// One rung of the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderRung {
    pub strategy: RecoveryStrategy,

    /// Failures this rung absorbs before the ladder advances
    pub tolerance: u32,
}

impl LadderRung {
    pub fn new(strategy: RecoveryStrategy, tolerance: u32) -> Self {
        Self {
            strategy,
            tolerance,
        }
    }
}

/// Default ladder: each rung absorbs exactly one failure
pub fn default_rungs() -> Vec<LadderRung> {
    RecoveryStrategy::ladder_order()
        .into_iter()
        .map(|strategy| LadderRung::new(strategy, 1))
        .collect()
}

/// Ordered escalation ladder with a forward-only cursor
#[derive(Debug, Clone)]
pub struct EscalationLadder {
    rungs: Vec<LadderRung>,

    /// Rung the next escalation uses
    index: usize,

    /// Escalations already absorbed by the current rung
    uses_on_rung: u32,

    /// Last rung used up; further escalation means emergency
    exhausted: bool,
}

impl EscalationLadder {
    /// Create ladder from rungs (an empty list is always exhausted)
    pub fn new(rungs: Vec<LadderRung>) -> Self {
        let exhausted = rungs.is_empty();
        Self {
            rungs,
            index: 0,
            uses_on_rung: 0,
            exhausted,
        }
    }

    /// Take the strategy for the next escalation and advance the cursor.
    ///
    /// Returns `None` once every rung has been used up.
    pub fn escalate(&mut self) -> Option<(usize, RecoveryStrategy)> {
        if self.exhausted {
            return None;
        }

        let rung_index = self.index;
        let rung = self.rungs[rung_index];
        self.uses_on_rung += 1;

        if self.uses_on_rung >= rung.tolerance.max(1) {
            if self.index + 1 >= self.rungs.len() {
                self.exhausted = true;
            } else {
                self.index += 1;
                self.uses_on_rung = 0;
            }
        }

        Some((rung_index, rung.strategy))
    }

    /// Return to rung 0
    pub fn reset(&mut self) {
        self.index = 0;
        self.uses_on_rung = 0;
        self.exhausted = self.rungs.is_empty();
    }

    /// Current rung index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Strategy of the current rung
    pub fn current(&self) -> Option<RecoveryStrategy> {
        self.rungs.get(self.index).map(|r| r.strategy)
    }

    /// Whether every rung has been used up
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Get rungs
    pub fn rungs(&self) -> &[LadderRung] {
        &self.rungs
    }
}

impl Default for EscalationLadder {
    fn default() -> Self {
        Self::new(default_rungs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_rung_per_escalation() {
        let mut ladder = EscalationLadder::default();
        let expected = RecoveryStrategy::ladder_order();

        for (i, strategy) in expected.iter().enumerate() {
            assert_eq!(ladder.escalate(), Some((i, *strategy)));
        }

        assert!(ladder.is_exhausted());
        assert_eq!(ladder.escalate(), None);
    }

    #[test]
    fn test_tolerance_holds_rung() {
        let mut ladder = EscalationLadder::new(vec![
            LadderRung::new(RecoveryStrategy::QuickRestart, 2),
            LadderRung::new(RecoveryStrategy::FullRestart, 1),
        ]);

        assert_eq!(ladder.escalate(), Some((0, RecoveryStrategy::QuickRestart)));
        assert_eq!(ladder.index(), 0);
        assert_eq!(ladder.escalate(), Some((0, RecoveryStrategy::QuickRestart)));
        assert_eq!(ladder.index(), 1);
        assert_eq!(ladder.escalate(), Some((1, RecoveryStrategy::FullRestart)));
        assert_eq!(ladder.escalate(), None);
    }

    #[test]
    fn test_index_never_decreases_until_reset() {
        let mut ladder = EscalationLadder::default();
        let mut last = 0;
        for _ in 0..10 {
            ladder.escalate();
            assert!(ladder.index() >= last);
            last = ladder.index();
        }

        ladder.reset();
        assert_eq!(ladder.index(), 0);
        assert!(!ladder.is_exhausted());
        assert_eq!(ladder.current(), Some(RecoveryStrategy::QuickRestart));
    }

    #[test]
    fn test_empty_ladder_is_exhausted() {
        let mut ladder = EscalationLadder::new(Vec::new());
        assert!(ladder.is_exhausted());
        assert_eq!(ladder.escalate(), None);
        ladder.reset();
        assert!(ladder.is_exhausted());
    }
}
