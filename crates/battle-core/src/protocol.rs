use serde::{Deserialize, Serialize};

use crate::model::{Player, PlayerId, Problem, ProblemId, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Casual,
    Ranked,
}

/// Messages sent from client to the match service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth {
        token: String,
    },
    FindMatch {
        mode: MatchMode,
    },
    CancelMatchmaking,
    /// Ask whether a match persisted from a prior session is still live.
    ResumeMatch {
        match_id: String,
    },
    Ping,
}

/// One authoritative per-key status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub player_id: PlayerId,
    pub problem_id: ProblemId,
    pub verdict: Verdict,
}

/// `game_state_update` carries either one record or an ordered batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusUpdatePayload {
    One(StatusUpdate),
    Many(Vec<StatusUpdate>),
}

impl StatusUpdatePayload {
    /// Flatten into the order records must be applied in.
    pub fn into_vec(self) -> Vec<StatusUpdate> {
        match self {
            StatusUpdatePayload::One(u) => vec![u],
            StatusUpdatePayload::Many(v) => v,
        }
    }
}

/// Messages pushed from the match service to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthOk {
        player: Player,
        rating: i32,
    },
    /// Matchmaking request acknowledged; waiting for an opponent.
    Searching,
    MatchmakingCancelled,
    MatchFound {
        match_id: String,
        problems: Vec<Problem>,
        you: Player,
        opponent: Player,
    },
    GameStateUpdate {
        update: StatusUpdatePayload,
    },
    /// Reply to `resume_match`: the match is live, with the authoritative
    /// statuses to reconcile over the restored snapshot.
    MatchResumed {
        match_id: String,
        updates: Vec<StatusUpdate>,
    },
    /// Reply to `resume_match`: the match no longer exists.
    MatchGone {
        match_id: String,
    },
    OpponentDisconnected,
    OpponentReconnected,
    Error {
        message: String,
    },
    Pong,
}

// ── Execution service (request/response) ────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub match_id: String,
    pub problem_id: ProblemId,
    pub code: String,
    pub language: String,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    pub output: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub match_id: String,
    pub problem_id: ProblemId,
    pub code: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub verdict: Verdict,
    pub test_cases_passed: u32,
    pub failed_test_case: Option<u32>,
}

// ── Profile service (request/response) ──────────────────────────────────

/// Authoritative post-match profile, fetched for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player_id: PlayerId,
    pub display_name: String,
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
}
