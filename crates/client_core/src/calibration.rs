//! Calibration comparison engine and calibration-status aggregation.

use std::collections::HashMap;

use shared::{
    domain::{RobotName, Vector3},
    protocol::{
        CalibrationCheckStep, CalibrationStatus, ComparisonResult, DeckCalibrationStatus, Session,
        SessionAttributes, SessionType, TransformType,
    },
};

use crate::{
    events::{Event, OutcomeKind},
    sessions,
    store::RobotApiState,
};

/// Evaluates a measured offset against a per-axis tolerance. The
/// threshold check always runs on full-precision vectors; display
/// rounding never feeds back into this result.
pub fn compare(
    difference: Vector3,
    threshold: Vector3,
    transform_type: TransformType,
) -> ComparisonResult {
    let magnitude = difference.abs();
    let exceeds_threshold = magnitude.x > threshold.x
        || magnitude.y > threshold.y
        || magnitude.z > threshold.z;
    ComparisonResult {
        difference_vector: difference,
        threshold_vector: threshold,
        exceeds_threshold,
        transform_type,
    }
}

pub(crate) fn reduce(mut state: RobotApiState, event: &Event) -> RobotApiState {
    let Event::Settled(outcome) = event else {
        return state;
    };
    match &outcome.kind {
        OutcomeKind::CalibrationStatusFetched(status) => {
            state
                .calibration_status
                .insert(outcome.robot.clone(), status.clone());
        }
        // Status polling failures leave the last known snapshot in place.
        _ => {}
    }
    state
}

pub fn calibration_status_of<'a>(
    state: &'a RobotApiState,
    robot: &RobotName,
) -> Option<&'a CalibrationStatus> {
    state.calibration_status.get(robot)
}

/// Unknown when the robot has never been polled.
pub fn deck_calibration_status(state: &RobotApiState, robot: &RobotName) -> DeckCalibrationStatus {
    calibration_status_of(state, robot)
        .map(|status| status.deck_calibration.status)
        .unwrap_or(DeckCalibrationStatus::Unknown)
}

pub fn deck_calibration_ok(state: &RobotApiState, robot: &RobotName) -> bool {
    deck_calibration_status(state, robot) == DeckCalibrationStatus::Ok
}

/// Step-name → comparison map of the robot's active calibration-check
/// session, if one is live.
pub fn session_comparisons<'a>(
    state: &'a RobotApiState,
    robot: &RobotName,
) -> Option<&'a HashMap<String, ComparisonResult>> {
    let session = sessions::find_session_of_type(state, robot, SessionType::CalibrationCheck)?;
    match &session.attributes {
        SessionAttributes::CalibrationCheck(details) => Some(&details.comparisons_by_step),
        _ => None,
    }
}

/// Classification of a calibration-check session's progress. The
/// abnormal terminals signal a precondition failure requiring operator
/// intervention; they are not completion and must not be auto-retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Nominal,
    BadRobotCalibration,
    NoPipettesAttached,
    Incomplete,
}

/// `None` when the session is not a calibration check.
pub fn check_outcome_of(session: &Session) -> Option<CheckOutcome> {
    let SessionAttributes::CalibrationCheck(details) = &session.attributes else {
        return None;
    };
    Some(match details.current_step {
        CalibrationCheckStep::CheckComplete => CheckOutcome::Nominal,
        CalibrationCheckStep::BadRobotCalibration => CheckOutcome::BadRobotCalibration,
        CalibrationCheckStep::NoPipettesAttached => CheckOutcome::NoPipettesAttached,
        _ => CheckOutcome::Incomplete,
    })
}
