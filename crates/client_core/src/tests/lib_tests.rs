use super::*;

use std::{
    net::SocketAddr,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use shared::{
    domain::{RobotHost, RobotName, SessionId, Vector3},
    error::ErrorBody,
    protocol::{
        CalibrationCheckStep, CommandData, DeckCalibrationStep, SessionAttributes, SessionCommand,
        SessionType,
    },
};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct StubCounters {
    creates: Arc<AtomicUsize>,
    commands: Arc<AtomicUsize>,
}

fn deck_session_resource(step: &str) -> serde_json::Value {
    json!({
        "data": {
            "id": "sess-1",
            "type": "Session",
            "attributes": {
                "sessionType": "deckCalibration",
                "details": { "currentStep": step }
            }
        }
    })
}

fn command_reply(step: &str) -> serde_json::Value {
    json!({
        "data": {
            "id": "cmd-1",
            "type": "SessionCommand",
            "attributes": { "command": "jog", "data": {} }
        },
        "meta": {
            "sessionType": "deckCalibration",
            "details": { "currentStep": step }
        }
    })
}

async fn create_session_handler(
    State(counters): State<StubCounters>,
) -> (StatusCode, Json<serde_json::Value>) {
    counters.creates.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::CREATED,
        Json(deck_session_resource("sessionStarted")),
    )
}

async fn command_handler(
    State(counters): State<StubCounters>,
) -> (StatusCode, Json<serde_json::Value>) {
    counters.commands.fetch_add(1, Ordering::SeqCst);
    // Small delay so overlapping commands really are in flight together.
    tokio::time::sleep(Duration::from_millis(25)).await;
    (StatusCode::OK, Json(command_reply("joggingToDeck")))
}

async fn delete_handler() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({"message": "deleted"})))
}

fn robot_stub(counters: StubCounters) -> Router {
    Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/:id/commands", post(command_handler))
        .route("/sessions/:id", delete(delete_handler))
        .with_state(counters)
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve stub");
    });
    addr
}

fn client_with_host(addr: SocketAddr, robot: &str) -> Arc<RobotApiClient> {
    let client = RobotApiClient::with_default_transport();
    client
        .upsert_host(RobotHost::new(robot, addr.ip().to_string(), addr.port()))
        .expect("register host");
    client
}

fn robot() -> RobotName {
    RobotName::from("robotA")
}

fn sess_1() -> SessionId {
    SessionId::from("sess-1")
}

async fn create_and_settle(client: &RobotApiClient) -> TrackedRequest {
    let id = client
        .create_session(robot(), SessionType::DeckCalibration, None)
        .expect("dispatch create");
    client.settled(id).await.expect("create settles")
}

#[tokio::test]
async fn create_session_stores_server_snapshot() {
    let addr = serve(robot_stub(StubCounters::default())).await;
    let client = client_with_host(addr, "robotA");

    let record = create_and_settle(&client).await;
    assert_eq!(record.status, RequestStatus::Success);

    let state = client.snapshot().await;
    let session = sessions::session_by_id(&state, &robot(), &sess_1()).expect("live session");
    match &session.attributes {
        SessionAttributes::DeckCalibration(details) => {
            assert_eq!(details.current_step, DeckCalibrationStep::SessionStarted);
        }
        other => panic!("unexpected attributes: {other:?}"),
    }
}

#[tokio::test]
async fn ensure_session_reuses_existing_session() {
    let counters = StubCounters::default();
    let addr = serve(robot_stub(counters.clone())).await;
    let client = client_with_host(addr, "robotA");

    create_and_settle(&client).await;

    for _ in 0..2 {
        let ensured = client
            .ensure_session(robot(), SessionType::DeckCalibration, None)
            .await
            .expect("ensure");
        assert_eq!(ensured, EnsureSession::Existing(sess_1()));
    }
    assert_eq!(counters.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn delete_session_leaves_explicit_tombstone() {
    let addr = serve(robot_stub(StubCounters::default())).await;
    let client = client_with_host(addr, "robotA");

    create_and_settle(&client).await;
    let id = client
        .delete_session(robot(), sess_1())
        .expect("dispatch delete");
    let record = client.settled(id).await.expect("delete settles");
    assert_eq!(record.status, RequestStatus::Success);

    let state = client.snapshot().await;
    assert!(sessions::session_by_id(&state, &robot(), &sess_1()).is_none());
    assert!(sessions::is_tombstoned(&state, &robot(), &sess_1()));
}

#[tokio::test]
async fn unresolved_host_drops_trigger_without_request_or_outcome() {
    let counters = StubCounters::default();
    let addr = serve(robot_stub(counters.clone())).await;
    let client = client_with_host(addr, "robotA");

    let id = client
        .create_session(
            RobotName::from("ghost-robot"),
            SessionType::DeckCalibration,
            None,
        )
        .expect("dispatch");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = client.snapshot().await;
    assert!(requests::is_pending(&state, id), "stays pending forever");
    assert_eq!(counters.creates.load(Ordering::SeqCst), 0, "no request sent");
}

#[tokio::test]
async fn overlapping_jogs_are_both_sent() {
    let counters = StubCounters::default();
    let addr = serve(robot_stub(counters.clone())).await;
    let client = client_with_host(addr, "robotA");

    create_and_settle(&client).await;

    let first = client
        .issue_command(
            robot(),
            sess_1(),
            SessionCommand::Jog,
            CommandData::jog(Vector3::new(-0.1, 0.0, 0.0)),
        )
        .expect("first jog");
    let second = client
        .issue_command(
            robot(),
            sess_1(),
            SessionCommand::Jog,
            CommandData::jog(Vector3::new(0.1, 0.0, 0.0)),
        )
        .expect("second jog");

    let first = client.settled(first).await.expect("first settles");
    let second = client.settled(second).await.expect("second settles");
    assert_eq!(first.status, RequestStatus::Success);
    assert_eq!(second.status, RequestStatus::Success);
    assert_eq!(
        counters.commands.load(Ordering::SeqCst),
        2,
        "no debouncing or single-flight enforcement"
    );
}

#[tokio::test]
async fn non_ok_reply_settles_failure_with_error_body_verbatim() {
    async fn reject() -> (StatusCode, Json<serde_json::Value>) {
        (
            StatusCode::CONFLICT,
            Json(json!({
                "errors": [
                    {"status": "409", "title": "Bad state", "detail": "command not allowed now"}
                ]
            })),
        )
    }
    let router = Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/:id/commands", post(reject))
        .with_state(StubCounters::default());
    let addr = serve(router).await;
    let client = client_with_host(addr, "robotA");

    create_and_settle(&client).await;
    let id = client
        .issue_command(
            robot(),
            sess_1(),
            SessionCommand::SaveOffset,
            CommandData::empty(),
        )
        .expect("dispatch");
    let record = client.settled(id).await.expect("settles");

    assert_eq!(record.status, RequestStatus::Failure);
    let error = record.error.expect("error body");
    assert_eq!(error.summary(), "command not allowed now");
    assert!(matches!(error, ErrorBody::Errors { .. }));

    // The step was never advanced locally on failure.
    let state = client.snapshot().await;
    let session = sessions::session_by_id(&state, &robot(), &sess_1()).expect("live");
    match &session.attributes {
        SessionAttributes::DeckCalibration(details) => {
            assert_eq!(details.current_step, DeckCalibrationStep::SessionStarted);
        }
        other => panic!("unexpected attributes: {other:?}"),
    }
}

#[tokio::test]
async fn stale_command_reply_resurrects_deleted_session() {
    let addr = serve(robot_stub(StubCounters::default())).await;
    let client = client_with_host(addr, "robotA");

    create_and_settle(&client).await;
    let id = client.delete_session(robot(), sess_1()).expect("delete");
    client.settled(id).await.expect("delete settles");

    // A command against the tombstoned slot still goes out and its
    // reply writes the slot live again. Documented race, preserved.
    let id = client
        .issue_command(
            robot(),
            sess_1(),
            SessionCommand::Jog,
            CommandData::jog(Vector3::new(0.0, 0.0, 0.1)),
        )
        .expect("stale command");
    client.settled(id).await.expect("command settles");

    let state = client.snapshot().await;
    assert!(sessions::session_by_id(&state, &robot(), &sess_1()).is_some());
}

#[tokio::test]
async fn fetch_all_sessions_populates_robot_map() {
    async fn list_sessions() -> Json<serde_json::Value> {
        Json(json!({
            "data": [
                {
                    "id": "sess-1",
                    "type": "Session",
                    "attributes": {
                        "sessionType": "deckCalibration",
                        "details": { "currentStep": "savingPointOne" }
                    }
                },
                {
                    "id": "check-7",
                    "type": "Session",
                    "attributes": {
                        "sessionType": "calibrationCheck",
                        "details": { "currentStep": "comparingFirstPipettePointOne" }
                    }
                }
            ]
        }))
    }
    let router = Router::new().route("/sessions", get(list_sessions));
    let addr = serve(router).await;
    let client = client_with_host(addr, "robotA");

    let id = client.fetch_all_sessions(robot()).expect("dispatch");
    let record = client.settled(id).await.expect("settles");
    assert_eq!(record.status, RequestStatus::Success);

    let state = client.snapshot().await;
    assert_eq!(sessions::live_sessions(&state, &robot()).count(), 2);
    let check = sessions::find_session_of_type(&state, &robot(), SessionType::CalibrationCheck)
        .expect("check session");
    assert_eq!(check.id, SessionId::from("check-7"));
}

#[tokio::test]
async fn calibration_status_poll_feeds_aggregation_selectors() {
    async fn status() -> Json<serde_json::Value> {
        Json(json!({
            "deckCalibration": {
                "status": "OK",
                "data": { "lastModified": "2024-11-02T10:15:00Z", "source": "user" }
            },
            "instrumentCalibration": {
                "left": { "offset": {"x": 0.1, "y": 0.0, "z": -0.2} }
            }
        }))
    }
    let router = Router::new().route("/calibration/status", get(status));
    let addr = serve(router).await;
    let client = client_with_host(addr, "robotA");

    let id = client.fetch_calibration_status(robot()).expect("dispatch");
    let record = client.settled(id).await.expect("settles");
    assert_eq!(record.status, RequestStatus::Success);

    let state = client.snapshot().await;
    assert!(calibration::deck_calibration_ok(&state, &robot()));
    let status = calibration::calibration_status_of(&state, &robot()).expect("snapshot");
    let left = status
        .instrument_calibration
        .left
        .as_ref()
        .expect("left mount");
    assert_eq!(left.offset, Vector3::new(0.1, 0.0, -0.2));
}

#[tokio::test]
async fn legacy_check_flow_updates_and_clears_slot() {
    fn legacy_session(step: &str) -> Json<serde_json::Value> {
        Json(json!({
            "token": "legacy-token",
            "currentStep": step,
            "comparisonsByStep": {},
            "labware": []
        }))
    }
    async fn create() -> (StatusCode, Json<serde_json::Value>) {
        (StatusCode::CREATED, legacy_session("sessionStarted"))
    }
    async fn jog() -> Json<serde_json::Value> {
        legacy_session("joggingFirstPipetteToPointOne")
    }
    async fn destroy() -> StatusCode {
        StatusCode::OK
    }
    let router = Router::new()
        .route("/calibration/check/session", post(create).delete(destroy))
        .route("/calibration/check/session/jog", post(jog));
    let addr = serve(router).await;
    let client = client_with_host(addr, "robotA");

    let id = client
        .legacy_check(robot(), LegacyCheckAction::CreateSession)
        .expect("create");
    client.settled(id).await.expect("create settles");
    let state = client.snapshot().await;
    let session = sessions::legacy_check_session(&state, &robot()).expect("legacy session");
    assert_eq!(session.current_step, CalibrationCheckStep::SessionStarted);

    let id = client
        .legacy_check(
            robot(),
            LegacyCheckAction::Jog(Vector3::new(0.0, 0.1, 0.0)),
        )
        .expect("jog");
    client.settled(id).await.expect("jog settles");
    let state = client.snapshot().await;
    let session = sessions::legacy_check_session(&state, &robot()).expect("legacy session");
    assert_eq!(
        session.current_step,
        CalibrationCheckStep::JoggingFirstPipetteToPointOne
    );

    let id = client
        .legacy_check(robot(), LegacyCheckAction::DeleteSession)
        .expect("delete");
    client.settled(id).await.expect("delete settles");
    let state = client.snapshot().await;
    assert!(sessions::legacy_check_session(&state, &robot()).is_none());
    // Tombstone, not absence: the robot's slot exists and is cleared.
    assert_eq!(state.legacy_check.get(&robot()), Some(&None));
}

#[tokio::test]
async fn transport_failure_settles_as_failure_outcome() {
    // Reserve a port and close it again so the connection is refused.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        listener.local_addr().expect("addr")
    };
    let client = client_with_host(addr, "robotA");

    let id = client
        .create_session(robot(), SessionType::DeckCalibration, None)
        .expect("dispatch");
    let record = client.settled(id).await.expect("settles as data");
    assert_eq!(record.status, RequestStatus::Failure);
    let error = record.error.expect("error body");
    assert!(!error.summary().is_empty());
}

#[tokio::test]
async fn outcome_stream_reports_typed_success() {
    let addr = serve(robot_stub(StubCounters::default())).await;
    let client = client_with_host(addr, "robotA");
    let mut outcomes = client.subscribe();

    let id = client
        .create_session(robot(), SessionType::DeckCalibration, None)
        .expect("dispatch");

    let outcome = loop {
        let outcome = outcomes.recv().await.expect("outcome stream");
        if outcome.id == id {
            break outcome;
        }
    };
    match outcome.kind {
        OutcomeKind::SessionCreated(session) => assert_eq!(session.id, sess_1()),
        other => panic!("unexpected outcome: {other:?}"),
    }
}
