use battle_core::model::{MatchState, Player, Problem};
use battle_core::protocol::{ClientMessage, MatchMode};
use tracing::{debug, warn};

/// Requests and cancels matchmaking, and turns a `match_found` payload into
/// a complete `MatchState`.
///
/// Transport-free by design: each operation returns the message to emit (if
/// any) so the merge of queue state and wire traffic stays unit-testable.
#[derive(Debug, Default)]
pub struct MatchmakingClient {
    searching: bool,
}

impl MatchmakingClient {
    pub fn new() -> Self {
        Self { searching: false }
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Request a match. Only one request may be outstanding per connection;
    /// a second call while pending is a no-op.
    pub fn find_match(&mut self, mode: MatchMode) -> Option<ClientMessage> {
        if self.searching {
            debug!("matchmaking request already pending, ignoring");
            return None;
        }
        self.searching = true;
        Some(ClientMessage::FindMatch { mode })
    }

    /// Cancel the pending request. Safe to call with nothing pending; the
    /// server treats a stray cancellation as a no-op.
    pub fn cancel(&mut self) -> ClientMessage {
        self.searching = false;
        ClientMessage::CancelMatchmaking
    }

    /// Build the full match state from a `match_found` payload: every
    /// (player, problem) pair starts `Unsubmitted`. Returns `None` (and
    /// installs nothing) for a payload no match can be played on.
    pub fn on_match_found(
        &mut self,
        match_id: String,
        problems: Vec<Problem>,
        you: Player,
        opponent: Player,
    ) -> Option<MatchState> {
        self.searching = false;
        if problems.is_empty() {
            warn!(match_id, "match_found with an empty problem set dropped");
            return None;
        }
        Some(MatchState::new(match_id, problems, you, opponent))
    }
}
