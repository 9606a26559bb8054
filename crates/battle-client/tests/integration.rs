use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{any, get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use battle_client::dispatcher::SubmissionDispatcher;
use battle_client::persist::MatchArchive;
use battle_client::profile::ProfileClient;
use battle_client::session::{MatchSession, SessionEvent};
use battle_client::{Connection, ConnectionConfig, ConnectionEvent};
use battle_core::model::{Player, Problem, Verdict};
use battle_core::protocol::{
    ClientMessage, MatchMode, PlayerProfile, RunResponse, ServerMessage, StatusUpdate,
    StatusUpdatePayload, SubmitRequest, SubmitResponse,
};
use battle_core::rating::RATING_DELTA;

#[derive(Clone)]
struct StubState {
    /// Messages the client sent over the socket.
    inbound: mpsc::UnboundedSender<ClientMessage>,
    /// Messages the stub should push to every connected client.
    outbound: broadcast::Sender<ServerMessage>,
    /// Drops every open socket, simulating a server-side disconnect.
    kick: broadcast::Sender<()>,
}

struct Stub {
    base: String,
    ws_url: String,
    inbound: mpsc::UnboundedReceiver<ClientMessage>,
    outbound: broadcast::Sender<ServerMessage>,
    kick: broadcast::Sender<()>,
}

/// Spin up a stub match + execution service on a random port.
async fn start_stub() -> Stub {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, _) = broadcast::channel(64);
    let (kick_tx, _) = broadcast::channel(4);
    let state = StubState {
        inbound: inbound_tx,
        outbound: outbound_tx.clone(),
        kick: kick_tx.clone(),
    };

    let app = Router::new()
        .route("/ws", any(ws_handler))
        .route("/run", post(run_handler))
        .route("/submit", post(submit_handler))
        .route("/profile/{id}", get(profile_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    Stub {
        base: format!("http://127.0.0.1:{}", port),
        ws_url: format!("ws://127.0.0.1:{}", port),
        inbound: inbound_rx,
        outbound: outbound_tx,
        kick: kick_tx,
    }
}

async fn ws_handler(State(state): State<StubState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: StubState) {
    let mut pushes = state.outbound.subscribe();
    let mut kicked = state.kick.subscribe();
    loop {
        tokio::select! {
            _ = kicked.recv() => return,
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Ok(msg) = serde_json::from_str::<ClientMessage>(&text) {
                            let _ = state.inbound.send(msg);
                        }
                    }
                    Some(Ok(_)) => {}
                    _ => return,
                }
            }
            pushed = pushes.recv() => {
                let Ok(msg) = pushed else { return };
                let json = serde_json::to_string(&msg).unwrap();
                if socket.send(WsMessage::Text(json.into())).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn run_handler() -> Json<RunResponse> {
    Json(RunResponse {
        output: "3".into(),
        error: None,
    })
}

/// Every submission passes.
async fn submit_handler(Json(_req): Json<SubmitRequest>) -> Json<SubmitResponse> {
    Json(SubmitResponse {
        verdict: Verdict::Accepted,
        test_cases_passed: 10,
        failed_test_case: None,
    })
}

async fn profile_handler(Path(id): Path<String>) -> Json<PlayerProfile> {
    Json(PlayerProfile {
        display_name: id.to_uppercase(),
        player_id: id,
        rating: 1224,
        wins: 3,
        losses: 1,
    })
}

/// Receive the next message the client sent, panicking on a quiet wire.
async fn recv_client(stub: &mut Stub) -> ClientMessage {
    tokio::time::timeout(Duration::from_secs(5), stub.inbound.recv())
        .await
        .expect("timed out waiting for a client message")
        .expect("stub inbound channel closed")
}

/// Pump connection events into the session until `done` says stop, collecting
/// every session notification seen along the way.
async fn drive_until(
    session: &mut MatchSession,
    events: &mut broadcast::Receiver<ConnectionEvent>,
    done: impl Fn(&[SessionEvent]) -> bool,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !done(&seen) {
        let remaining = deadline - tokio::time::Instant::now();
        if remaining.is_zero() {
            panic!("timed out waiting for session events, saw: {:?}", seen);
        }
        let event = tokio::time::timeout(remaining, events.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for session events, saw: {:?}", seen))
            .expect("connection event channel closed");
        session.handle_event(event);
        while let Some(ev) = session.poll_event() {
            seen.push(ev);
        }
    }
    seen
}

fn temp_archive(name: &str) -> MatchArchive {
    let dir = std::env::temp_dir().join(format!(
        "codebattle-integration-{}-{}",
        std::process::id(),
        name
    ));
    let _ = std::fs::remove_dir_all(&dir);
    MatchArchive::with_dir(dir)
}

fn player(id: &str) -> Player {
    Player {
        id: id.into(),
        display_name: id.to_uppercase(),
    }
}

fn problem(id: &str) -> Problem {
    Problem {
        id: id.into(),
        title: id.to_uppercase(),
        statement: "Sum two integers.".into(),
        sample_cases: vec![],
    }
}

fn match_found(problems: &[&str]) -> ServerMessage {
    ServerMessage::MatchFound {
        match_id: "m1".into(),
        problems: problems.iter().map(|id| problem(id)).collect(),
        you: player("a"),
        opponent: player("b"),
    }
}

fn accepted(player: &str, problem: &str) -> ServerMessage {
    ServerMessage::GameStateUpdate {
        update: StatusUpdatePayload::One(StatusUpdate {
            player_id: player.into(),
            problem_id: problem.into(),
            verdict: Verdict::Accepted,
        }),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_authenticates_first() {
    let mut stub = start_stub().await;
    let conn = Connection::connect(ConnectionConfig::new(&stub.ws_url, "tok-123"))
        .await
        .unwrap();

    let first = recv_client(&mut stub).await;
    assert_eq!(
        first,
        ClientMessage::Auth {
            token: "tok-123".into()
        }
    );
    assert!(conn.is_connected());
    conn.close();
}

#[tokio::test]
async fn full_match_over_the_wire_concludes_exactly_once() {
    let mut stub = start_stub().await;
    let conn = Connection::connect(ConnectionConfig::new(&stub.ws_url, "tok"))
        .await
        .unwrap();
    let mut events = conn.subscribe();
    let mut session = MatchSession::new(
        SubmissionDispatcher::new(&stub.base),
        temp_archive("full-match"),
    );

    // The socket is live once auth arrives; only then are pushes delivered.
    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::Auth { .. }
    ));

    session.find_match(&conn, MatchMode::Ranked);
    assert_eq!(
        recv_client(&mut stub).await,
        ClientMessage::FindMatch {
            mode: MatchMode::Ranked
        }
    );

    stub.outbound.send(ServerMessage::Searching).unwrap();
    stub.outbound.send(match_found(&["p1", "p2"])).unwrap();
    let seen = drive_until(&mut session, &mut events, |seen| {
        seen.contains(&SessionEvent::MatchStarted)
    })
    .await;
    assert!(seen.contains(&SessionEvent::Searching));
    assert!(session.store().is_active());
    assert!(!session.is_searching());

    // Opponent solves one problem, then we finish both.
    stub.outbound.send(accepted("b", "p1")).unwrap();
    stub.outbound.send(accepted("a", "p1")).unwrap();
    stub.outbound.send(accepted("a", "p2")).unwrap();
    // Straggler after the winning update.
    stub.outbound.send(accepted("b", "p2")).unwrap();

    let seen = drive_until(&mut session, &mut events, |seen| {
        seen.iter().filter(|e| matches!(e, SessionEvent::StateChanged)).count() >= 3
    })
    .await;

    let ended: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            SessionEvent::MatchEnded(result) => Some(result),
            _ => None,
        })
        .collect();
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].winner_id, "a");
    assert_eq!(ended[0].rating_delta["a"], RATING_DELTA);
    assert_eq!(ended[0].rating_delta["b"], -RATING_DELTA);

    conn.close();
}

#[tokio::test]
async fn submission_verdict_can_conclude_before_the_server_update() {
    let mut stub = start_stub().await;
    let conn = Connection::connect(ConnectionConfig::new(&stub.ws_url, "tok"))
        .await
        .unwrap();
    let mut events = conn.subscribe();
    let mut session = MatchSession::new(
        SubmissionDispatcher::new(&stub.base),
        temp_archive("submit-path"),
    );

    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::Auth { .. }
    ));

    stub.outbound.send(match_found(&["p1"])).unwrap();
    drive_until(&mut session, &mut events, |seen| {
        seen.contains(&SessionEvent::MatchStarted)
    })
    .await;

    // The stub's execution service accepts everything, so the optimistic
    // verdict alone reaches full acceptance.
    let response = session.submit("fn main() {}", "rust").await.unwrap();
    assert_eq!(response.verdict, Verdict::Accepted);

    let result = session.result().expect("match should have concluded");
    assert_eq!(result.winner_id, "a");

    let ended: Vec<_> = std::iter::from_fn(|| session.poll_event())
        .filter(|e| matches!(e, SessionEvent::MatchEnded(_)))
        .collect();
    assert_eq!(ended.len(), 1);

    conn.close();
}

#[tokio::test]
async fn sample_run_reaches_the_execution_service() {
    let mut stub = start_stub().await;
    let conn = Connection::connect(ConnectionConfig::new(&stub.ws_url, "tok"))
        .await
        .unwrap();
    let mut events = conn.subscribe();
    let mut session = MatchSession::new(
        SubmissionDispatcher::new(&stub.base),
        temp_archive("run-path"),
    );

    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::Auth { .. }
    ));
    stub.outbound.send(match_found(&["p1"])).unwrap();
    drive_until(&mut session, &mut events, |seen| {
        seen.contains(&SessionEvent::MatchStarted)
    })
    .await;

    let response = session.run_samples("fn main() {}", "rust", "1 2").await.unwrap();
    assert_eq!(response.output, "3");
    assert!(response.error.is_none());
    // Sample runs never touch the scoreboard.
    assert_eq!(session.store().status_of("a", "p1"), Verdict::Unsubmitted);

    conn.close();
}

#[tokio::test]
async fn rehydrated_match_the_server_forgot_is_abandoned() {
    let mut stub = start_stub().await;
    let archive = temp_archive("rehydrate-gone");

    // A previous session crashed mid-match, leaving a snapshot.
    {
        let mut previous = MatchSession::new(
            SubmissionDispatcher::new(&stub.base),
            archive.clone(),
        );
        previous.handle_server_message(match_found(&["p1"]));
    }

    let conn = Connection::connect(ConnectionConfig::new(&stub.ws_url, "tok"))
        .await
        .unwrap();
    let mut events = conn.subscribe();
    let mut session = MatchSession::new(SubmissionDispatcher::new(&stub.base), archive.clone());

    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::Auth { .. }
    ));

    assert!(session.rehydrate(&conn));
    assert_eq!(
        recv_client(&mut stub).await,
        ClientMessage::ResumeMatch {
            match_id: "m1".into()
        }
    );

    stub.outbound
        .send(ServerMessage::MatchGone {
            match_id: "m1".into(),
        })
        .unwrap();
    let seen = drive_until(&mut session, &mut events, |seen| {
        seen.contains(&SessionEvent::MatchAbandoned)
    })
    .await;

    assert!(seen.contains(&SessionEvent::MatchAbandoned));
    assert!(!session.store().is_active());
    assert!(archive.load().is_none());

    conn.close();
}

#[tokio::test]
async fn rehydrated_match_resumes_with_missed_updates() {
    let mut stub = start_stub().await;
    let archive = temp_archive("rehydrate-resume");

    {
        let mut previous = MatchSession::new(
            SubmissionDispatcher::new(&stub.base),
            archive.clone(),
        );
        previous.handle_server_message(match_found(&["p1", "p2"]));
    }

    let conn = Connection::connect(ConnectionConfig::new(&stub.ws_url, "tok"))
        .await
        .unwrap();
    let mut events = conn.subscribe();
    let mut session = MatchSession::new(SubmissionDispatcher::new(&stub.base), archive.clone());

    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::Auth { .. }
    ));

    assert!(session.rehydrate(&conn));
    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::ResumeMatch { .. }
    ));

    // The opponent solved p1 while we were away.
    stub.outbound
        .send(ServerMessage::MatchResumed {
            match_id: "m1".into(),
            updates: vec![StatusUpdate {
                player_id: "b".into(),
                problem_id: "p1".into(),
                verdict: Verdict::Accepted,
            }],
        })
        .unwrap();
    drive_until(&mut session, &mut events, |seen| {
        seen.contains(&SessionEvent::MatchResumed)
    })
    .await;

    assert!(session.store().is_active());
    assert_eq!(session.store().status_of("b", "p1"), Verdict::Accepted);
    assert_eq!(session.store().status_of("a", "p1"), Verdict::Unsubmitted);

    conn.close();
}

#[tokio::test]
async fn reconnect_reauthenticates_without_replaying_requests() {
    let mut stub = start_stub().await;
    let mut config = ConnectionConfig::new(&stub.ws_url, "tok-r");
    config.base_backoff = Duration::from_millis(20);
    let conn = Connection::connect(config).await.unwrap();

    assert_eq!(
        recv_client(&mut stub).await,
        ClientMessage::Auth {
            token: "tok-r".into()
        }
    );
    conn.emit(ClientMessage::FindMatch {
        mode: MatchMode::Ranked,
    });
    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::FindMatch { .. }
    ));

    // Server drops the socket; the supervisor reconnects and re-auths.
    stub.kick.send(()).unwrap();
    assert_eq!(
        recv_client(&mut stub).await,
        ClientMessage::Auth {
            token: "tok-r".into()
        }
    );
    // The earlier find_match is not replayed.
    assert!(
        tokio::time::timeout(Duration::from_millis(300), stub.inbound.recv())
            .await
            .is_err()
    );

    conn.close();
}

#[tokio::test]
async fn messages_emitted_after_close_are_dropped() {
    let mut stub = start_stub().await;
    let conn = Connection::connect(ConnectionConfig::new(&stub.ws_url, "tok"))
        .await
        .unwrap();
    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::Auth { .. }
    ));

    conn.close();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while conn.is_connected() {
        assert!(tokio::time::Instant::now() < deadline, "never went offline");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    conn.emit(ClientMessage::Ping);
    assert!(
        tokio::time::timeout(Duration::from_millis(300), stub.inbound.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn post_match_profile_carries_the_authoritative_rating() {
    let stub = start_stub().await;
    let profiles = ProfileClient::new(&stub.base);

    let profile = profiles.fetch("a").await.unwrap();
    assert_eq!(profile.player_id, "a");
    assert_eq!(profile.rating, 1224);
    assert_eq!(profile.wins, 3);
}

#[tokio::test]
async fn cancel_matchmaking_round_trips() {
    let mut stub = start_stub().await;
    let conn = Connection::connect(ConnectionConfig::new(&stub.ws_url, "tok"))
        .await
        .unwrap();
    let mut events = conn.subscribe();
    let mut session = MatchSession::new(
        SubmissionDispatcher::new(&stub.base),
        temp_archive("cancel"),
    );

    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::Auth { .. }
    ));

    session.find_match(&conn, MatchMode::Casual);
    assert!(matches!(
        recv_client(&mut stub).await,
        ClientMessage::FindMatch { .. }
    ));
    // A second request while one is pending stays local.
    session.find_match(&conn, MatchMode::Casual);

    session.cancel_matchmaking(&conn);
    assert_eq!(recv_client(&mut stub).await, ClientMessage::CancelMatchmaking);

    stub.outbound
        .send(ServerMessage::MatchmakingCancelled)
        .unwrap();
    let seen = drive_until(&mut session, &mut events, |seen| {
        seen.contains(&SessionEvent::MatchmakingCancelled)
    })
    .await;
    assert!(seen.contains(&SessionEvent::MatchmakingCancelled));
    assert!(!session.is_searching());

    conn.close();
}
