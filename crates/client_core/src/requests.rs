//! Request tracking store: per-correlation-id status records that let
//! callers gate busy/idle state. Populated by exactly two event kinds
//! per id: issuance (Pending) and settlement (Success or Failure).
//! Terminal records are immutable; a correlation id is never reused.

use serde_json::Value;
use shared::{domain::CorrelationId, error::ErrorBody};

use crate::{
    events::Event,
    store::RobotApiState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRequest {
    pub status: RequestStatus,
    pub response: Option<Value>,
    pub error: Option<ErrorBody>,
}

impl TrackedRequest {
    fn pending() -> Self {
        Self {
            status: RequestStatus::Pending,
            response: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != RequestStatus::Pending
    }
}

pub(crate) fn reduce(mut state: RobotApiState, event: &Event) -> RobotApiState {
    match event {
        Event::Issued(trigger) => {
            // Never revert a terminal record to pending, even if a
            // duplicate issuance slips through.
            state
                .requests
                .entry(trigger.id)
                .or_insert_with(TrackedRequest::pending);
        }
        Event::Settled(outcome) => {
            let already_terminal = state
                .requests
                .get(&outcome.id)
                .is_some_and(TrackedRequest::is_terminal);
            if already_terminal {
                return state;
            }
            let record = match outcome.kind.failure() {
                Some(failure) => TrackedRequest {
                    status: RequestStatus::Failure,
                    response: None,
                    error: Some(failure.body.clone()),
                },
                None => TrackedRequest {
                    status: RequestStatus::Success,
                    response: Some(outcome.body.clone()),
                    error: None,
                },
            };
            state.requests.insert(outcome.id, record);
        }
        Event::HostDiscovered(_) | Event::HostLost(_) => {}
    }
    state
}

pub fn lookup(state: &RobotApiState, id: CorrelationId) -> Option<&TrackedRequest> {
    state.requests.get(&id)
}

pub fn is_pending(state: &RobotApiState, id: CorrelationId) -> bool {
    lookup(state, id).is_some_and(|record| record.status == RequestStatus::Pending)
}
