//! Closed trigger/outcome unions for the orchestration pipeline.
//!
//! Every dispatched trigger settles as at most one outcome: its success
//! variant, its failure variant carrying the server's error body
//! verbatim, or nothing at all when the robot's host could not be
//! resolved at issue time. Reducers match these exhaustively with an
//! explicit state-unchanged fallback arm.

use serde_json::Value;
use shared::{
    domain::{CorrelationId, RobotHost, RobotName, SessionId, Vector3},
    error::ErrorBody,
    protocol::{
        CalibrationStatus, CommandData, LegacyCheckSession, Session, SessionAttributes,
        SessionCommand, SessionType,
    },
};

/// Path-addressed actions of the legacy calibration-check endpoint
/// family. Same envelope shape and pipeline as the session API.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyCheckAction {
    CreateSession,
    LoadLabware,
    PreparePipette,
    Jog(Vector3),
    PickUpTip,
    ConfirmTip,
    InvalidateTip,
    ConfirmStep,
    DeleteSession,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    CreateSession {
        session_type: SessionType,
        create_params: Option<Value>,
    },
    FetchSession {
        session_id: SessionId,
    },
    FetchAllSessions,
    CreateSessionCommand {
        session_id: SessionId,
        command: SessionCommand,
        data: CommandData,
    },
    DeleteSession {
        session_id: SessionId,
    },
    FetchCalibrationStatus,
    LegacyCheck(LegacyCheckAction),
}

/// A dispatched request, correlation id minted at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub id: CorrelationId,
    pub robot: RobotName,
    pub kind: TriggerKind,
}

/// Non-ok reply, carried as data. `body` is the server's reply verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFailure {
    pub status: u16,
    pub body: ErrorBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeKind {
    SessionCreated(Session),
    SessionCreateFailed(RequestFailure),
    SessionFetched(Session),
    SessionFetchFailed {
        session_id: SessionId,
        failure: RequestFailure,
    },
    AllSessionsFetched(Vec<Session>),
    AllSessionsFetchFailed(RequestFailure),
    CommandExecuted {
        session_id: SessionId,
        attributes: SessionAttributes,
    },
    CommandFailed {
        session_id: SessionId,
        failure: RequestFailure,
    },
    SessionDeleted {
        session_id: SessionId,
    },
    SessionDeleteFailed {
        session_id: SessionId,
        failure: RequestFailure,
    },
    CalibrationStatusFetched(CalibrationStatus),
    CalibrationStatusFetchFailed(RequestFailure),
    LegacyCheckUpdated(LegacyCheckSession),
    LegacyCheckDeleted,
    LegacyCheckFailed {
        action: LegacyCheckAction,
        failure: RequestFailure,
    },
}

impl OutcomeKind {
    /// The failure payload, when this outcome is a failure variant.
    pub fn failure(&self) -> Option<&RequestFailure> {
        match self {
            Self::SessionCreateFailed(failure)
            | Self::AllSessionsFetchFailed(failure)
            | Self::CalibrationStatusFetchFailed(failure)
            | Self::SessionFetchFailed { failure, .. }
            | Self::CommandFailed { failure, .. }
            | Self::SessionDeleteFailed { failure, .. }
            | Self::LegacyCheckFailed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }
}

/// The settled result of one trigger. `body` is the normalized reply
/// body as received, kept for the request tracking store.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub id: CorrelationId,
    pub robot: RobotName,
    pub body: Value,
    pub kind: OutcomeKind,
}

/// The only inputs the state store consumes; applied one at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    HostDiscovered(RobotHost),
    HostLost(RobotName),
    Issued(Trigger),
    Settled(Outcome),
}
