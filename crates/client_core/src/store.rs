//! Serialized state store: one task drains the event queue and applies
//! pure reducers, so the session map and the request-tracking map are
//! never mutated concurrently. Mutation is always append-or-replace-by-
//! key, never a partial in-place edit.

use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{CorrelationId, RobotHost, RobotName, SessionId},
    protocol::{CalibrationStatus, LegacyCheckSession, Session},
};
use tokio::{
    sync::{broadcast, mpsc, RwLock},
    task::JoinHandle,
};
use tracing::debug;

use crate::{
    calibration,
    events::{Event, Outcome},
    pipeline::{self, PipelineDeps},
    requests::{self, TrackedRequest},
    resolver::HostResolver,
    sessions,
};

/// The whole client-side state. Sessions are keyed robot → session id;
/// a deleted session holds an explicit `None` tombstone so "deleted"
/// and "never existed" stay distinguishable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotApiState {
    pub hosts: HashMap<RobotName, RobotHost>,
    pub sessions: HashMap<RobotName, HashMap<SessionId, Option<Session>>>,
    pub legacy_check: HashMap<RobotName, Option<LegacyCheckSession>>,
    pub requests: HashMap<CorrelationId, TrackedRequest>,
    pub calibration_status: HashMap<RobotName, CalibrationStatus>,
}

/// Pure: `(OldState, Event) -> NewState`. Sub-reducers each handle the
/// slice they own and fall through for everything else.
pub fn reduce(state: RobotApiState, event: &Event) -> RobotApiState {
    let state = reduce_hosts(state, event);
    let state = requests::reduce(state, event);
    let state = sessions::reduce(state, event);
    calibration::reduce(state, event)
}

fn reduce_hosts(mut state: RobotApiState, event: &Event) -> RobotApiState {
    match event {
        Event::HostDiscovered(host) => {
            state.hosts.insert(host.name.clone(), host.clone());
        }
        Event::HostLost(name) => {
            state.hosts.remove(name);
        }
        Event::Issued(_) | Event::Settled(_) => {}
    }
    state
}

/// Spawns the store task. Each event is reduced into the shared state
/// before the next is looked at; issuance ordering on the queue
/// guarantees a request is Pending before its outcome can settle.
/// Triggers whose robot resolves spawn a detached pipeline task; the
/// rest are dropped silently.
pub(crate) fn spawn(
    state: Arc<RwLock<RobotApiState>>,
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    outcomes: broadcast::Sender<Outcome>,
    deps: Arc<PipelineDeps>,
    resolver: Arc<dyn HostResolver>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            {
                let mut guard = state.write().await;
                let current = std::mem::take(&mut *guard);
                *guard = reduce(current, &event);
            }
            match event {
                Event::Issued(trigger) => {
                    let resolved = {
                        let guard = state.read().await;
                        resolver.resolve(&guard, &trigger.robot)
                    };
                    match resolved {
                        Some(host) => {
                            tokio::spawn(pipeline::run(trigger, host, Arc::clone(&deps)));
                        }
                        None => debug!(
                            robot = %trigger.robot,
                            correlation = %trigger.id,
                            "robot host unresolved; dropping trigger"
                        ),
                    }
                }
                Event::Settled(outcome) => {
                    // No receivers is fine; outcomes are also readable
                    // through the request tracking store.
                    let _ = outcomes.send(outcome);
                }
                Event::HostDiscovered(_) | Event::HostLost(_) => {}
            }
        }
    })
}
