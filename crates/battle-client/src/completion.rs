use battle_core::model::{MatchResult, MatchState};
use battle_core::rating::rating_deltas;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    InProgress,
    /// Terminal. Further evaluations are no-ops.
    Concluded,
}

/// Decides when a match is won and by how much rating should move.
///
/// Evaluated after every reconciliation and optimistic update. The player
/// whose update first reaches full acceptance wins; ties are impossible
/// because the detector fires on the update that produces the first
/// full-acceptance state.
#[derive(Debug)]
pub struct CompletionDetector {
    phase: MatchPhase,
}

impl CompletionDetector {
    pub fn new() -> Self {
        Self {
            phase: MatchPhase::InProgress,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_concluded(&self) -> bool {
        self.phase == MatchPhase::Concluded
    }

    /// Re-arm for a new match.
    pub fn reset(&mut self) {
        self.phase = MatchPhase::InProgress;
    }

    /// Produces the result exactly once; every later call returns `None`
    /// no matter how many further updates arrive.
    pub fn evaluate(&mut self, state: &MatchState) -> Option<MatchResult> {
        if self.phase == MatchPhase::Concluded {
            return None;
        }
        let total = state.problems.len();
        if total == 0 {
            return None;
        }

        let (winner, loser) = if state.accepted_count(&state.you.id) == total {
            (&state.you.id, &state.opponent.id)
        } else if state.accepted_count(&state.opponent.id) == total {
            (&state.opponent.id, &state.you.id)
        } else {
            return None;
        };

        self.phase = MatchPhase::Concluded;
        Some(MatchResult {
            winner_id: winner.clone(),
            rating_delta: rating_deltas(winner, loser),
        })
    }
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self::new()
    }
}
