use battle_core::merge::{merge, StatusWrite};
use battle_core::model::{now_ms, MatchState, Verdict};
use tracing::warn;

/// Canonical in-memory record of the current match.
///
/// All mutation goes through the entry points below; every status write is
/// resolved by `battle_core::merge`, which is the single place the
/// optimistic-vs-authoritative rule lives.
#[derive(Debug, Default)]
pub struct MatchStore {
    state: Option<MatchState>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Install a fully built match state. All-or-nothing: the state arrives
    /// complete from `MatchState::new` or a restored snapshot.
    pub fn install(&mut self, state: MatchState) {
        self.state = Some(state);
    }

    pub fn clear(&mut self) {
        self.state = None;
    }

    pub fn state(&self) -> Option<&MatchState> {
        self.state.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn match_id(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.match_id.as_str())
    }

    /// Select the active problem, clamping an out-of-range index to the
    /// last problem instead of panicking.
    pub fn set_active_problem(&mut self, index: usize) {
        if let Some(state) = &mut self.state {
            if state.problems.is_empty() {
                return;
            }
            state.active_problem = index.min(state.problems.len() - 1);
        }
    }

    pub fn apply_optimistic(&mut self, player_id: &str, problem_id: &str, verdict: Verdict) -> bool {
        self.apply(player_id, problem_id, StatusWrite::Optimistic(verdict))
    }

    pub fn apply_authoritative(
        &mut self,
        player_id: &str,
        problem_id: &str,
        verdict: Verdict,
    ) -> bool {
        self.apply(player_id, problem_id, StatusWrite::Authoritative(verdict))
    }

    /// Resolve the in-flight submission for a key: the execution service's
    /// verdict on success, the pre-submission value on failure. A no-op
    /// unless the key still holds the optimistic `Pending` the submission
    /// placed; an authoritative verdict that landed mid-flight stands.
    pub fn resolve_submission(
        &mut self,
        player_id: &str,
        problem_id: &str,
        verdict: Verdict,
    ) -> bool {
        self.apply(player_id, problem_id, StatusWrite::Resolution(verdict))
    }

    pub fn status_of(&self, player_id: &str, problem_id: &str) -> Verdict {
        self.state
            .as_ref()
            .map(|s| s.status_of(player_id, problem_id))
            .unwrap_or(Verdict::Unsubmitted)
    }

    pub fn accepted_count(&self, player_id: &str) -> usize {
        self.state
            .as_ref()
            .map(|s| s.accepted_count(player_id))
            .unwrap_or(0)
    }

    /// Returns true when the write changed the stored status. Writes naming
    /// an unknown player or problem are dropped and logged; unrelated
    /// entries are untouched.
    fn apply(&mut self, player_id: &str, problem_id: &str, write: StatusWrite) -> bool {
        let Some(state) = &mut self.state else {
            warn!(player_id, problem_id, "status write dropped: no match in progress");
            return false;
        };
        if !state.contains_player(player_id) {
            warn!(player_id, "status write dropped: unknown player");
            return false;
        }
        if !state.contains_problem(problem_id) {
            warn!(problem_id, "status write dropped: unknown problem");
            return false;
        }

        let current = state
            .statuses
            .get(player_id)
            .and_then(|m| m.get(problem_id));
        let Some(next) = merge(current, write, now_ms()) else {
            return false;
        };
        state
            .statuses
            .entry(player_id.to_string())
            .or_default()
            .insert(problem_id.to_string(), next);
        true
    }
}
