//! Request orchestration pipeline.
//!
//! Each dispatched trigger becomes one detached task: build the request
//! descriptor (pure), execute it through the transport (infallible),
//! re-read current state, map the reply into exactly one outcome
//! (pure), and push it onto the event queue. Tasks are never cancelled
//! and nothing enforces single-flight per session; outcomes may settle
//! out of issuance order and each one is independently authoritative.
//! Nothing in here may panic: a fault on this path would sever the
//! outcome stream for every session type multiplexed over it.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::Vector3,
    error::ErrorBody,
    protocol::{
        CalibrationStatus, CommandData, CommandResponse, CreateCommandRequest,
        CreateSessionRequest, LegacyCheckSession, SessionListResponse, SessionResponse,
    },
};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::{
    events::{Event, LegacyCheckAction, Outcome, OutcomeKind, RequestFailure, Trigger, TriggerKind},
    store::RobotApiState,
    transport::{RequestDescriptor, ResponseEnvelope, Transport},
};

pub(crate) struct PipelineDeps {
    pub state: Arc<RwLock<RobotApiState>>,
    pub transport: Arc<dyn Transport>,
    pub event_tx: mpsc::UnboundedSender<Event>,
}

fn legacy_check_path(action: &LegacyCheckAction) -> &'static str {
    match action {
        LegacyCheckAction::CreateSession | LegacyCheckAction::DeleteSession => {
            "/calibration/check/session"
        }
        LegacyCheckAction::LoadLabware => "/calibration/check/session/loadLabware",
        LegacyCheckAction::PreparePipette => "/calibration/check/session/preparePipette",
        LegacyCheckAction::Jog(_) => "/calibration/check/session/jog",
        LegacyCheckAction::PickUpTip => "/calibration/check/session/pickUpTip",
        LegacyCheckAction::ConfirmTip => "/calibration/check/session/confirmTip",
        LegacyCheckAction::InvalidateTip => "/calibration/check/session/invalidateTip",
        LegacyCheckAction::ConfirmStep => "/calibration/check/session/confirmStep",
    }
}

fn jog_body(vector: Vector3) -> Option<Value> {
    serde_json::to_value(CommandData::jog(vector)).ok()
}

/// Pure, total mapping from a trigger to its request descriptor.
pub(crate) fn request_descriptor(kind: &TriggerKind) -> RequestDescriptor {
    match kind {
        TriggerKind::CreateSession {
            session_type,
            create_params,
        } => RequestDescriptor::new(
            Method::POST,
            "/sessions",
            serde_json::to_value(CreateSessionRequest::new(
                *session_type,
                create_params.clone(),
            ))
            .ok(),
        ),
        TriggerKind::FetchSession { session_id } => {
            RequestDescriptor::new(Method::GET, format!("/sessions/{session_id}"), None)
        }
        TriggerKind::FetchAllSessions => RequestDescriptor::new(Method::GET, "/sessions", None),
        TriggerKind::CreateSessionCommand {
            session_id,
            command,
            data,
        } => RequestDescriptor::new(
            Method::POST,
            format!("/sessions/{session_id}/commands"),
            serde_json::to_value(CreateCommandRequest::new(*command, data.clone())).ok(),
        ),
        TriggerKind::DeleteSession { session_id } => {
            RequestDescriptor::new(Method::DELETE, format!("/sessions/{session_id}"), None)
        }
        TriggerKind::FetchCalibrationStatus => {
            RequestDescriptor::new(Method::GET, "/calibration/status", None)
        }
        TriggerKind::LegacyCheck(action) => {
            let method = match action {
                LegacyCheckAction::DeleteSession => Method::DELETE,
                _ => Method::POST,
            };
            let body = match action {
                LegacyCheckAction::Jog(vector) => jog_body(*vector),
                _ => None,
            };
            RequestDescriptor::new(method, legacy_check_path(action), body)
        }
    }
}

fn parse<T: DeserializeOwned>(reply: &ResponseEnvelope) -> Result<T, RequestFailure> {
    serde_json::from_value(reply.body.clone()).map_err(|err| RequestFailure {
        status: reply.status,
        body: ErrorBody::message(format!("unexpected reply shape: {err}")),
    })
}

fn reply_failure(reply: &ResponseEnvelope) -> RequestFailure {
    RequestFailure {
        status: reply.status,
        body: ErrorBody::from(reply.body.clone()),
    }
}

fn map_success(kind: &TriggerKind, reply: &ResponseEnvelope) -> OutcomeKind {
    match kind {
        TriggerKind::CreateSession { .. } => match parse::<SessionResponse>(reply) {
            Ok(response) => OutcomeKind::SessionCreated(response.data.into_session()),
            Err(failure) => OutcomeKind::SessionCreateFailed(failure),
        },
        TriggerKind::FetchSession { session_id } => match parse::<SessionResponse>(reply) {
            Ok(response) => OutcomeKind::SessionFetched(response.data.into_session()),
            Err(failure) => OutcomeKind::SessionFetchFailed {
                session_id: session_id.clone(),
                failure,
            },
        },
        TriggerKind::FetchAllSessions => match parse::<SessionListResponse>(reply) {
            Ok(response) => OutcomeKind::AllSessionsFetched(
                response
                    .data
                    .into_iter()
                    .map(|resource| resource.into_session())
                    .collect(),
            ),
            Err(failure) => OutcomeKind::AllSessionsFetchFailed(failure),
        },
        TriggerKind::CreateSessionCommand { session_id, .. } => {
            match parse::<CommandResponse>(reply) {
                Ok(response) => OutcomeKind::CommandExecuted {
                    session_id: session_id.clone(),
                    attributes: response.meta,
                },
                Err(failure) => OutcomeKind::CommandFailed {
                    session_id: session_id.clone(),
                    failure,
                },
            }
        }
        TriggerKind::DeleteSession { session_id } => OutcomeKind::SessionDeleted {
            session_id: session_id.clone(),
        },
        TriggerKind::FetchCalibrationStatus => match parse::<CalibrationStatus>(reply) {
            Ok(status) => OutcomeKind::CalibrationStatusFetched(status),
            Err(failure) => OutcomeKind::CalibrationStatusFetchFailed(failure),
        },
        TriggerKind::LegacyCheck(LegacyCheckAction::DeleteSession) => {
            OutcomeKind::LegacyCheckDeleted
        }
        TriggerKind::LegacyCheck(action) => match parse::<LegacyCheckSession>(reply) {
            Ok(session) => OutcomeKind::LegacyCheckUpdated(session),
            Err(failure) => OutcomeKind::LegacyCheckFailed {
                action: action.clone(),
                failure,
            },
        },
    }
}

fn map_failure(kind: &TriggerKind, reply: &ResponseEnvelope) -> OutcomeKind {
    let failure = reply_failure(reply);
    match kind {
        TriggerKind::CreateSession { .. } => OutcomeKind::SessionCreateFailed(failure),
        TriggerKind::FetchSession { session_id } => OutcomeKind::SessionFetchFailed {
            session_id: session_id.clone(),
            failure,
        },
        TriggerKind::FetchAllSessions => OutcomeKind::AllSessionsFetchFailed(failure),
        TriggerKind::CreateSessionCommand { session_id, .. } => OutcomeKind::CommandFailed {
            session_id: session_id.clone(),
            failure,
        },
        TriggerKind::DeleteSession { session_id } => OutcomeKind::SessionDeleteFailed {
            session_id: session_id.clone(),
            failure,
        },
        TriggerKind::FetchCalibrationStatus => OutcomeKind::CalibrationStatusFetchFailed(failure),
        TriggerKind::LegacyCheck(action) => OutcomeKind::LegacyCheckFailed {
            action: action.clone(),
            failure,
        },
    }
}

/// Pure mapping of {reply, original trigger, current state} into exactly
/// one outcome. Success is decided from the envelope's `ok` flag alone.
pub(crate) fn map_outcome(
    trigger: &Trigger,
    reply: &ResponseEnvelope,
    state: &RobotApiState,
) -> Outcome {
    if !state.hosts.contains_key(&trigger.robot) {
        debug!(
            robot = %trigger.robot,
            correlation = %trigger.id,
            "reply arrived for a robot no longer resolvable"
        );
    }
    let kind = if reply.ok {
        map_success(&trigger.kind, reply)
    } else {
        map_failure(&trigger.kind, reply)
    };
    Outcome {
        id: trigger.id,
        robot: trigger.robot.clone(),
        body: reply.body.clone(),
        kind,
    }
}

/// One trigger, one detached task, at most one outcome.
pub(crate) async fn run(trigger: Trigger, host: shared::domain::RobotHost, deps: Arc<PipelineDeps>) {
    let descriptor = request_descriptor(&trigger.kind);
    let reply = deps.transport.execute(&host, &descriptor).await;
    if !reply.ok {
        warn!(
            robot = %trigger.robot,
            correlation = %trigger.id,
            status = reply.status,
            "robot rejected request"
        );
    }
    let outcome = {
        let state = deps.state.read().await;
        map_outcome(&trigger, &reply, &state)
    };
    if deps.event_tx.send(Event::Settled(outcome)).is_err() {
        debug!(
            correlation = %trigger.id,
            "state task stopped before outcome delivery"
        );
    }
}
