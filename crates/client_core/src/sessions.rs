//! Per-robot session state: reducer and selectors.
//!
//! The server is the sole authority over step state. Every successful
//! reply replaces the affected session's attributes wholesale; nothing
//! here advances a step locally. A deleted session leaves an explicit
//! tombstone so "deleted" stays distinguishable from "never existed".

use shared::{
    domain::{RobotName, SessionId},
    protocol::{LegacyCheckSession, Session, SessionType},
};
use tracing::warn;

use crate::{
    events::{Event, OutcomeKind},
    store::RobotApiState,
};

pub(crate) fn reduce(mut state: RobotApiState, event: &Event) -> RobotApiState {
    let Event::Settled(outcome) = event else {
        return state;
    };
    let robot = &outcome.robot;
    match &outcome.kind {
        OutcomeKind::SessionCreated(session) | OutcomeKind::SessionFetched(session) => {
            upsert(&mut state, robot, session.clone());
        }
        OutcomeKind::AllSessionsFetched(sessions) => {
            for session in sessions {
                upsert(&mut state, robot, session.clone());
            }
        }
        OutcomeKind::CommandExecuted {
            session_id,
            attributes,
        } => {
            let robot_sessions = state.sessions.entry(robot.clone()).or_default();
            if matches!(robot_sessions.get(session_id), Some(None)) {
                // Late reply for a session deleted in the meantime; the
                // write resurrects the slot. Known race, preserved.
                warn!(
                    robot = %robot,
                    session = %session_id,
                    "command reply resurrecting a deleted session slot"
                );
            }
            robot_sessions.insert(
                session_id.clone(),
                Some(Session {
                    id: session_id.clone(),
                    attributes: attributes.clone(),
                }),
            );
        }
        OutcomeKind::SessionDeleted { session_id } => {
            state
                .sessions
                .entry(robot.clone())
                .or_default()
                .insert(session_id.clone(), None);
        }
        OutcomeKind::LegacyCheckUpdated(session) => {
            state
                .legacy_check
                .insert(robot.clone(), Some(session.clone()));
        }
        OutcomeKind::LegacyCheckDeleted => {
            state.legacy_check.insert(robot.clone(), None);
        }
        // Failures and unrelated outcomes leave session state unchanged.
        _ => {}
    }
    state
}

fn upsert(state: &mut RobotApiState, robot: &RobotName, session: Session) {
    state
        .sessions
        .entry(robot.clone())
        .or_default()
        .insert(session.id.clone(), Some(session));
}

/// A live session by id; `None` for tombstoned and unknown slots alike.
pub fn session_by_id<'a>(
    state: &'a RobotApiState,
    robot: &RobotName,
    session_id: &SessionId,
) -> Option<&'a Session> {
    state
        .sessions
        .get(robot)?
        .get(session_id)?
        .as_ref()
}

/// First live session of the given type; used to resume an in-progress
/// procedure across UI remounts. Best-effort first match only.
pub fn find_session_of_type<'a>(
    state: &'a RobotApiState,
    robot: &RobotName,
    session_type: SessionType,
) -> Option<&'a Session> {
    state
        .sessions
        .get(robot)?
        .values()
        .flatten()
        .find(|session| session.session_type() == session_type)
}

pub fn live_sessions<'a>(
    state: &'a RobotApiState,
    robot: &RobotName,
) -> impl Iterator<Item = &'a Session> {
    state
        .sessions
        .get(robot)
        .into_iter()
        .flat_map(|sessions| sessions.values().flatten())
}

/// Whether the slot holds an explicit tombstone, as opposed to never
/// having existed.
pub fn is_tombstoned(state: &RobotApiState, robot: &RobotName, session_id: &SessionId) -> bool {
    matches!(
        state.sessions.get(robot).and_then(|s| s.get(session_id)),
        Some(None)
    )
}

pub fn legacy_check_session<'a>(
    state: &'a RobotApiState,
    robot: &RobotName,
) -> Option<&'a LegacyCheckSession> {
    state.legacy_check.get(robot)?.as_ref()
}
