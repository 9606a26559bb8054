use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub type PlayerId = String;
pub type ProblemId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
}

/// One sample test case shown alongside a problem statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCase {
    pub input: String,
    pub output: String,
}

/// A problem in the match's fixed set. Immutable once the match starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    pub title: String,
    pub statement: String,
    pub sample_cases: Vec<SampleCase>,
}

/// Submission verdict for one (player, problem) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Unsubmitted,
    Pending,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    RuntimeError,
}

impl Verdict {
    /// Accepted is terminal: it is never overwritten by a later write.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// A verdict the execution service can return as a final answer.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Verdict::Unsubmitted | Verdict::Pending)
    }
}

/// Where a stored status came from. The server is authoritative; local
/// guesses made right after a user action are optimistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Optimistic,
    Authoritative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemStatus {
    pub verdict: Verdict,
    pub source: Source,
    pub last_updated_ms: u64,
}

/// Milliseconds since the Unix epoch, used for `last_updated_ms`.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The canonical record of one head-to-head match.
///
/// Serializable so an in-progress match survives a client restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub match_id: String,
    pub problems: Vec<Problem>,
    /// Index into `problems`; always in bounds for a non-empty set.
    pub active_problem: usize,
    pub you: Player,
    pub opponent: Player,
    /// player id -> problem id -> status.
    pub statuses: HashMap<PlayerId, HashMap<ProblemId, ProblemStatus>>,
}

impl MatchState {
    /// Build a fresh match with every (player, problem) pair `Unsubmitted`.
    pub fn new(match_id: String, problems: Vec<Problem>, you: Player, opponent: Player) -> Self {
        // Never-written blanks; a real write always outranks them.
        let blank = ProblemStatus {
            verdict: Verdict::Unsubmitted,
            source: Source::Authoritative,
            last_updated_ms: 0,
        };
        let mut statuses = HashMap::new();
        for player in [&you, &opponent] {
            let per_problem = problems
                .iter()
                .map(|p| (p.id.clone(), blank))
                .collect::<HashMap<_, _>>();
            statuses.insert(player.id.clone(), per_problem);
        }
        Self {
            match_id,
            problems,
            active_problem: 0,
            you,
            opponent,
            statuses,
        }
    }

    pub fn contains_player(&self, player_id: &str) -> bool {
        self.you.id == player_id || self.opponent.id == player_id
    }

    pub fn contains_problem(&self, problem_id: &str) -> bool {
        self.problems.iter().any(|p| p.id == problem_id)
    }

    pub fn active(&self) -> Option<&Problem> {
        self.problems.get(self.active_problem)
    }

    pub fn entry(&self, player_id: &str, problem_id: &str) -> Option<&ProblemStatus> {
        self.statuses.get(player_id)?.get(problem_id)
    }

    /// Stored verdict for a key, `Unsubmitted` if nothing was ever written.
    pub fn status_of(&self, player_id: &str, problem_id: &str) -> Verdict {
        self.entry(player_id, problem_id)
            .map(|s| s.verdict)
            .unwrap_or(Verdict::Unsubmitted)
    }

    pub fn accepted_count(&self, player_id: &str) -> usize {
        self.statuses
            .get(player_id)
            .map(|per_problem| {
                per_problem
                    .values()
                    .filter(|s| s.verdict.is_accepted())
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Produced exactly once per match by the completion detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner_id: PlayerId,
    pub rating_delta: HashMap<PlayerId, i32>,
}
