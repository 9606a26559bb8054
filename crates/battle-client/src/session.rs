use std::collections::VecDeque;

use battle_core::model::MatchResult;
use battle_core::protocol::{
    ClientMessage, MatchMode, RunResponse, ServerMessage, StatusUpdatePayload, SubmitResponse,
};
use tracing::{debug, info, warn};

use crate::completion::CompletionDetector;
use crate::dispatcher::SubmissionDispatcher;
use crate::error::ClientError;
use crate::matchmaking::MatchmakingClient;
use crate::net::connection::{Connection, ConnectionEvent, ConnectionStatus};
use crate::persist::MatchArchive;
use crate::reconciler;
use crate::store::MatchStore;

/// Notifications for the presentation layer, drained via `poll_event`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connection(ConnectionStatus),
    Searching,
    MatchmakingCancelled,
    MatchStarted,
    MatchResumed,
    /// Statuses changed; views over the store should refresh.
    StateChanged,
    /// One-shot: fired exactly once per match.
    MatchEnded(MatchResult),
    /// A rehydrated match turned out to be dead; the store was cleared.
    MatchAbandoned,
    OpponentDisconnected,
    OpponentReconnected,
    ServerError(String),
}

/// Owns the per-match state and is the single dispatch point for server
/// events: every mutation of the store happens either here (on an inbound
/// event) or through `submit` (a direct user action), sequentially on the
/// caller's task — no locking, ordering resolved by the store's merge rule.
///
/// The embedding app drives it from its event loop:
///
/// ```ignore
/// let mut events = connection.subscribe();
/// loop {
///     tokio::select! {
///         Ok(ev) = events.recv() => session.handle_event(ev),
///         // ... user input arms calling session.submit(), etc.
///     }
///     while let Some(ev) = session.poll_event() { /* render */ }
/// }
/// ```
pub struct MatchSession {
    matchmaking: MatchmakingClient,
    store: MatchStore,
    detector: CompletionDetector,
    dispatcher: SubmissionDispatcher,
    archive: MatchArchive,
    result: Option<MatchResult>,
    events: VecDeque<SessionEvent>,
}

impl MatchSession {
    pub fn new(dispatcher: SubmissionDispatcher, archive: MatchArchive) -> Self {
        Self {
            matchmaking: MatchmakingClient::new(),
            store: MatchStore::new(),
            detector: CompletionDetector::new(),
            dispatcher,
            archive,
            result: None,
            events: VecDeque::new(),
        }
    }

    pub fn store(&self) -> &MatchStore {
        &self.store
    }

    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    pub fn is_searching(&self) -> bool {
        self.matchmaking.is_searching()
    }

    /// Next pending notification, if any.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    // ── User actions ────────────────────────────────────────────────────

    pub fn find_match(&mut self, conn: &Connection, mode: MatchMode) {
        if let Some(msg) = self.matchmaking.find_match(mode) {
            conn.emit(msg);
        }
    }

    /// Idempotent; only affects the pending matchmaking request, never an
    /// active match.
    pub fn cancel_matchmaking(&mut self, conn: &Connection) {
        conn.emit(self.matchmaking.cancel());
    }

    pub fn set_active_problem(&mut self, index: usize) {
        self.store.set_active_problem(index);
        self.persist();
    }

    /// Run against sample input; the result is editor feedback only.
    pub async fn run_samples(
        &self,
        code: &str,
        language: &str,
        input: &str,
    ) -> Result<RunResponse, ClientError> {
        self.dispatcher.run(&self.store, code, language, input).await
    }

    /// Submit for scoring. The optimistic verdict can conclude the match
    /// before the server's own update arrives.
    pub async fn submit(&mut self, code: &str, language: &str) -> Result<SubmitResponse, ClientError> {
        let response = self.dispatcher.submit(&mut self.store, code, language).await?;
        self.persist();
        self.push(SessionEvent::StateChanged);
        self.check_completion();
        Ok(response)
    }

    /// Restore a persisted match and ask the match service whether it is
    /// still live. Resumption completes on `match_resumed`; a `match_gone`
    /// reply clears the store instead.
    pub fn rehydrate(&mut self, conn: &Connection) -> bool {
        let Some(state) = self.archive.load() else {
            return false;
        };
        let match_id = state.match_id.clone();
        info!(match_id, "restoring persisted match, validating with server");
        self.store.install(state);
        self.detector.reset();
        self.result = None;
        conn.emit(ClientMessage::ResumeMatch { match_id });
        true
    }

    /// Abandon the current match: store and snapshot are cleared.
    pub fn leave_match(&mut self) {
        self.store.clear();
        if let Err(e) = self.archive.clear() {
            warn!(error = %e, "failed to clear match snapshot");
        }
        self.detector.reset();
        self.result = None;
    }

    // ── Inbound events ──────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Status(status) => self.push(SessionEvent::Connection(status)),
            ConnectionEvent::Message(msg) => self.handle_server_message(msg),
        }
    }

    pub fn handle_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::AuthOk { player, .. } => {
                debug!(player_id = %player.id, "authenticated");
            }
            ServerMessage::Searching => self.push(SessionEvent::Searching),
            ServerMessage::MatchmakingCancelled => self.push(SessionEvent::MatchmakingCancelled),
            ServerMessage::MatchFound {
                match_id,
                problems,
                you,
                opponent,
            } => {
                let Some(state) = self.matchmaking.on_match_found(match_id, problems, you, opponent)
                else {
                    return;
                };
                self.store.install(state);
                self.detector.reset();
                self.result = None;
                self.persist();
                self.push(SessionEvent::MatchStarted);
            }
            ServerMessage::GameStateUpdate { update } => {
                let applied = reconciler::reconcile(&mut self.store, update);
                if applied > 0 {
                    self.persist();
                    self.push(SessionEvent::StateChanged);
                }
                self.check_completion();
            }
            ServerMessage::MatchResumed { match_id, updates } => {
                if self.store.match_id() != Some(match_id.as_str()) {
                    warn!(match_id, "match_resumed for a match we are not in, dropped");
                    return;
                }
                reconciler::reconcile(&mut self.store, StatusUpdatePayload::Many(updates));
                self.persist();
                self.push(SessionEvent::MatchResumed);
                self.check_completion();
            }
            ServerMessage::MatchGone { match_id } => {
                if self.store.match_id() != Some(match_id.as_str()) {
                    debug!(match_id, "match_gone for a match we are not in");
                    return;
                }
                info!(match_id, "match no longer exists, clearing restored state");
                self.leave_match();
                self.push(SessionEvent::MatchAbandoned);
            }
            ServerMessage::OpponentDisconnected => self.push(SessionEvent::OpponentDisconnected),
            ServerMessage::OpponentReconnected => self.push(SessionEvent::OpponentReconnected),
            ServerMessage::Error { message } => self.push(SessionEvent::ServerError(message)),
            ServerMessage::Pong => {}
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn push(&mut self, event: SessionEvent) {
        self.events.push_back(event);
    }

    fn persist(&self) {
        if let Some(state) = self.store.state() {
            if let Err(e) = self.archive.save(state) {
                warn!(error = %e, "failed to persist match snapshot");
            }
        }
    }

    /// On conclusion the snapshot is cleared (nothing to resume), but the
    /// store stays installed so the final scoreboard can still be rendered;
    /// `leave_match` is what tears it down.
    fn check_completion(&mut self) {
        let Some(state) = self.store.state() else {
            return;
        };
        if let Some(result) = self.detector.evaluate(state) {
            info!(winner_id = %result.winner_id, "match concluded");
            if let Err(e) = self.archive.clear() {
                warn!(error = %e, "failed to clear match snapshot");
            }
            self.result = Some(result.clone());
            self.push(SessionEvent::MatchEnded(result));
        }
    }
}
