//! Wire types for the robot controller's session and calibration APIs.
//!
//! Session resources follow the server's JSON:API-flavored envelope:
//! `{data: {id, type, attributes}}`, where `attributes` carries the
//! session type tag next to its type-specific `details` payload. Step
//! enums tolerate unrecognized wire values so a newer server never
//! crashes an older client.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{SessionId, Vector3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionType {
    DeckCalibration,
    PipetteOffsetCalibration,
    TipLengthCalibration,
    CalibrationCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeckCalibrationStep {
    SessionStarted,
    LabwareLoaded,
    MeasuringNozzleOffset,
    PreparingPipette,
    InspectingTip,
    JoggingToDeck,
    SavingPointOne,
    SavingPointTwo,
    SavingPointThree,
    CalibrationComplete,
    SessionExited,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipetteOffsetCalibrationStep {
    SessionStarted,
    LabwareLoaded,
    PreparingPipette,
    InspectingTip,
    JoggingToDeck,
    SavingPointOne,
    CalibrationComplete,
    SessionExited,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TipLengthCalibrationStep {
    SessionStarted,
    LabwareLoaded,
    MeasuringNozzleOffset,
    PreparingPipette,
    InspectingTip,
    MeasuringTipOffset,
    CalibrationComplete,
    SessionExited,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationCheckStep {
    SessionStarted,
    LabwareLoaded,
    PreparingFirstPipette,
    InspectingFirstTip,
    JoggingFirstPipetteToHeight,
    ComparingFirstPipetteHeight,
    JoggingFirstPipetteToPointOne,
    ComparingFirstPipettePointOne,
    JoggingFirstPipetteToPointTwo,
    ComparingFirstPipettePointTwo,
    JoggingFirstPipetteToPointThree,
    ComparingFirstPipettePointThree,
    PreparingSecondPipette,
    InspectingSecondTip,
    JoggingSecondPipetteToHeight,
    ComparingSecondPipetteHeight,
    JoggingSecondPipetteToPointOne,
    ComparingSecondPipettePointOne,
    ReturningTip,
    SessionExited,
    CheckComplete,
    BadRobotCalibration,
    NoPipettesAttached,
    #[serde(other)]
    Unknown,
}

impl CalibrationCheckStep {
    /// Terminal steps end the procedure; no further command is meaningful.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CheckComplete
                | Self::BadRobotCalibration
                | Self::NoPipettesAttached
                | Self::SessionExited
        )
    }

    /// Abnormal terminals signal a precondition failure requiring operator
    /// intervention; they must never be treated as nominal completion or
    /// retried automatically.
    pub fn is_abnormal_exit(&self) -> bool {
        matches!(self, Self::BadRobotCalibration | Self::NoPipettesAttached)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mount {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipetteInfo {
    pub model: String,
    pub mount: Mount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareRef {
    pub load_name: String,
    pub slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformType {
    InstrumentOffset,
    DeckCalibration,
    #[serde(other)]
    Unknown,
}

/// Measured-vs-expected offset evaluation for one reference point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub difference_vector: Vector3,
    pub threshold_vector: Vector3,
    pub exceeds_threshold: bool,
    pub transform_type: TransformType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCalibrationDetails {
    pub current_step: DeckCalibrationStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<PipetteInfo>,
    #[serde(default)]
    pub labware: Vec<LabwareRef>,
    #[serde(default)]
    pub supported_commands: Vec<SessionCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipetteOffsetCalibrationDetails {
    pub current_step: PipetteOffsetCalibrationStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<PipetteInfo>,
    #[serde(default)]
    pub labware: Vec<LabwareRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TipLengthCalibrationDetails {
    pub current_step: TipLengthCalibrationStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<PipetteInfo>,
    #[serde(default)]
    pub labware: Vec<LabwareRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationCheckDetails {
    pub current_step: CalibrationCheckStep,
    #[serde(default)]
    pub instruments: Vec<PipetteInfo>,
    #[serde(default)]
    pub labware: Vec<LabwareRef>,
    #[serde(default)]
    pub comparisons_by_step: HashMap<String, ComparisonResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_pipette_id: Option<String>,
}

/// Session attributes as they appear on the wire: the session type tag
/// sits next to its type-specific `details` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sessionType", content = "details", rename_all = "camelCase")]
pub enum SessionAttributes {
    DeckCalibration(DeckCalibrationDetails),
    PipetteOffsetCalibration(PipetteOffsetCalibrationDetails),
    TipLengthCalibration(TipLengthCalibrationDetails),
    CalibrationCheck(CalibrationCheckDetails),
}

impl SessionAttributes {
    pub fn session_type(&self) -> SessionType {
        match self {
            Self::DeckCalibration(_) => SessionType::DeckCalibration,
            Self::PipetteOffsetCalibration(_) => SessionType::PipetteOffsetCalibration,
            Self::TipLengthCalibration(_) => SessionType::TipLengthCalibration,
            Self::CalibrationCheck(_) => SessionType::CalibrationCheck,
        }
    }
}

/// Client-side mirror of a server-held session: id + typed attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(flatten)]
    pub attributes: SessionAttributes,
}

impl Session {
    pub fn session_type(&self) -> SessionType {
        self.attributes.session_type()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommand {
    LoadLabware,
    PreparePipette,
    Jog,
    PickUpTip,
    ConfirmTip,
    InvalidateTip,
    SaveOffset,
    MoveToPointOne,
    MoveToPointTwo,
    MoveToPointThree,
    MoveToDeck,
    MoveToTipRack,
    ComparePoint,
    SwitchPipette,
    ReturnTip,
    Exit,
}

/// Command payload; only `jog` carries data (a 3-vector), every other
/// command sends an empty object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vector3>,
}

impl CommandData {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn jog(vector: Vector3) -> Self {
        Self {
            vector: Some(vector),
        }
    }
}

// Request/response envelopes.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResource {
    pub id: SessionId,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: SessionAttributes,
}

impl SessionResource {
    pub fn into_session(self) -> Session {
        Session {
            id: self.id,
            attributes: self.attributes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionAttributes {
    #[serde(rename = "sessionType")]
    pub session_type: SessionType,
    #[serde(
        rename = "createParams",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub create_params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionBody {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: CreateSessionAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub data: CreateSessionBody,
}

impl CreateSessionRequest {
    pub fn new(session_type: SessionType, create_params: Option<serde_json::Value>) -> Self {
        Self {
            data: CreateSessionBody {
                resource_type: "Session".to_string(),
                attributes: CreateSessionAttributes {
                    session_type,
                    create_params,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub data: SessionResource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub data: Vec<SessionResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAttributes {
    pub command: SessionCommand,
    #[serde(default)]
    pub data: CommandData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommandBody {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: CommandAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommandRequest {
    pub data: CreateCommandBody,
}

impl CreateCommandRequest {
    pub fn new(command: SessionCommand, data: CommandData) -> Self {
        Self {
            data: CreateCommandBody {
                resource_type: "SessionCommand".to_string(),
                attributes: CommandAttributes { command, data },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: CommandAttributes,
}

/// Command replies carry the executed command resource plus the session's
/// refreshed attributes; the client replaces its whole `details` with the
/// `meta` snapshot and never advances steps locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub data: CommandResource,
    pub meta: SessionAttributes,
}

// Legacy robot-calibration-check endpoint family. Commands are addressed
// by path rather than body; every reply returns the full session snapshot.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCheckSession {
    pub token: String,
    pub current_step: CalibrationCheckStep,
    #[serde(default)]
    pub comparisons_by_step: HashMap<String, ComparisonResult>,
    #[serde(default)]
    pub labware: Vec<LabwareRef>,
}

// Separately polled per-robot calibration health snapshot.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeckCalibrationStatus {
    Ok,
    Identity,
    BadCalibration,
    Singularity,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSource {
    Default,
    Factory,
    User,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCalibrationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipette_calibrated_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<CalibrationSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCalibrationInfo {
    pub status: DeckCalibrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DeckCalibrationData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountCalibration {
    #[serde(default)]
    pub offset: Vector3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentCalibrationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<MountCalibration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<MountCalibration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationStatus {
    pub deck_calibration: DeckCalibrationInfo,
    #[serde(default)]
    pub instrument_calibration: InstrumentCalibrationInfo,
}
