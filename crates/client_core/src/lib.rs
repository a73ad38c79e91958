//! Client core for driving multi-step hardware calibration procedures
//! on a remote robot controller over HTTP.
//!
//! The public surface is a dispatch-then-observe loop: callers fire a
//! typed trigger (session create, step command, delete, status poll),
//! get back a correlation id, and read results either from the request
//! tracking store or from the broadcast outcome stream. All state lives
//! in one [`store::RobotApiState`] mutated exclusively by a single
//! reducer task; the server stays the sole authority over calibration
//! step progression.

use std::sync::Arc;

use serde_json::Value;
use tokio::{
    sync::{broadcast, mpsc, RwLock},
    task::JoinHandle,
};

use shared::{
    domain::{CorrelationId, RobotHost, RobotName, SessionId},
    protocol::{CommandData, SessionCommand, SessionType},
};

pub mod calibration;
pub mod error;
pub mod events;
pub mod jog;
pub mod requests;
pub mod resolver;
pub mod sessions;
pub mod store;
pub mod transport;

mod pipeline;

pub use error::ClientError;
pub use events::{Event, LegacyCheckAction, Outcome, OutcomeKind, Trigger, TriggerKind};
pub use requests::{RequestStatus, TrackedRequest};
pub use resolver::{HostResolver, StateHostResolver};
pub use store::RobotApiState;
pub use transport::{ReqwestTransport, RequestDescriptor, ResponseEnvelope, Transport};

use pipeline::PipelineDeps;

const OUTCOME_CHANNEL_CAPACITY: usize = 1024;

/// Result of [`RobotApiClient::ensure_session`]: either a session of
/// the requested type already existed, or a create was dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum EnsureSession {
    Existing(SessionId),
    Requested(CorrelationId),
}

pub struct RobotApiClient {
    state: Arc<RwLock<RobotApiState>>,
    event_tx: mpsc::UnboundedSender<Event>,
    outcomes: broadcast::Sender<Outcome>,
    _store_task: JoinHandle<()>,
}

impl RobotApiClient {
    pub fn new(transport: Arc<dyn Transport>, resolver: Arc<dyn HostResolver>) -> Arc<Self> {
        let state = Arc::new(RwLock::new(RobotApiState::default()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        let deps = Arc::new(PipelineDeps {
            state: Arc::clone(&state),
            transport,
            event_tx: event_tx.clone(),
        });
        let store_task = store::spawn(
            Arc::clone(&state),
            event_rx,
            outcomes.clone(),
            deps,
            resolver,
        );
        Arc::new(Self {
            state,
            event_tx,
            outcomes,
            _store_task: store_task,
        })
    }

    /// Production wiring: reqwest transport, discovery-map resolver.
    pub fn with_default_transport() -> Arc<Self> {
        Self::new(Arc::new(ReqwestTransport::new()), Arc::new(StateHostResolver))
    }

    fn send(&self, event: Event) -> Result<(), ClientError> {
        self.event_tx
            .send(event)
            .map_err(|_| ClientError::StoreUnavailable)
    }

    fn dispatch(
        &self,
        robot: RobotName,
        kind: TriggerKind,
    ) -> Result<CorrelationId, ClientError> {
        let id = CorrelationId::mint();
        self.send(Event::Issued(Trigger { id, robot, kind }))?;
        Ok(id)
    }

    // Discovery input for the host resolver.

    pub fn upsert_host(&self, host: RobotHost) -> Result<(), ClientError> {
        self.send(Event::HostDiscovered(host))
    }

    pub fn remove_host(&self, name: RobotName) -> Result<(), ClientError> {
        self.send(Event::HostLost(name))
    }

    // Session operations. Each dispatch mints a fresh correlation id;
    // callers watch it through the tracking store or `settled`.

    pub fn create_session(
        &self,
        robot: RobotName,
        session_type: SessionType,
        create_params: Option<Value>,
    ) -> Result<CorrelationId, ClientError> {
        self.dispatch(
            robot,
            TriggerKind::CreateSession {
                session_type,
                create_params,
            },
        )
    }

    /// Creates a session only if none of that type is currently known
    /// for the robot; otherwise hands back the existing one. Guards
    /// against duplicate creation from repeated user clicks, but is
    /// client-side best-effort only: two racing calls can still produce
    /// two server-side sessions.
    pub async fn ensure_session(
        &self,
        robot: RobotName,
        session_type: SessionType,
        create_params: Option<Value>,
    ) -> Result<EnsureSession, ClientError> {
        {
            let state = self.state.read().await;
            if let Some(existing) = sessions::find_session_of_type(&state, &robot, session_type) {
                return Ok(EnsureSession::Existing(existing.id.clone()));
            }
        }
        Ok(EnsureSession::Requested(self.create_session(
            robot,
            session_type,
            create_params,
        )?))
    }

    pub fn fetch_session(
        &self,
        robot: RobotName,
        session_id: SessionId,
    ) -> Result<CorrelationId, ClientError> {
        self.dispatch(robot, TriggerKind::FetchSession { session_id })
    }

    pub fn fetch_all_sessions(&self, robot: RobotName) -> Result<CorrelationId, ClientError> {
        self.dispatch(robot, TriggerKind::FetchAllSessions)
    }

    /// Issues one step transition. The server executes the command and
    /// replies with the session's full refreshed details; nothing is
    /// debounced here, so a second command issued while the first is
    /// still pending is also sent.
    pub fn issue_command(
        &self,
        robot: RobotName,
        session_id: SessionId,
        command: SessionCommand,
        data: CommandData,
    ) -> Result<CorrelationId, ClientError> {
        self.dispatch(
            robot,
            TriggerKind::CreateSessionCommand {
                session_id,
                command,
                data,
            },
        )
    }

    pub fn delete_session(
        &self,
        robot: RobotName,
        session_id: SessionId,
    ) -> Result<CorrelationId, ClientError> {
        self.dispatch(robot, TriggerKind::DeleteSession { session_id })
    }

    pub fn fetch_calibration_status(
        &self,
        robot: RobotName,
    ) -> Result<CorrelationId, ClientError> {
        self.dispatch(robot, TriggerKind::FetchCalibrationStatus)
    }

    pub fn legacy_check(
        &self,
        robot: RobotName,
        action: LegacyCheckAction,
    ) -> Result<CorrelationId, ClientError> {
        self.dispatch(robot, TriggerKind::LegacyCheck(action))
    }

    // Observation.

    pub fn subscribe(&self) -> broadcast::Receiver<Outcome> {
        self.outcomes.subscribe()
    }

    /// Clone of the current state for selector use.
    pub async fn snapshot(&self) -> RobotApiState {
        self.state.read().await.clone()
    }

    /// Waits until the given request settles and returns its terminal
    /// tracking record. Subscribes before checking the store so an
    /// outcome racing this call is not missed. A request whose robot was
    /// never resolvable stays pending forever; callers that care apply
    /// their own timeout.
    pub async fn settled(&self, id: CorrelationId) -> Result<TrackedRequest, ClientError> {
        let mut rx = self.subscribe();
        {
            let state = self.state.read().await;
            if let Some(record) = requests::lookup(&state, id) {
                if record.is_terminal() {
                    return Ok(record.clone());
                }
            }
        }
        loop {
            match rx.recv().await {
                Ok(outcome) if outcome.id == id => {
                    let state = self.state.read().await;
                    // The broadcast happens after reduction, so the
                    // record is terminal by the time we observe it.
                    return requests::lookup(&state, id)
                        .cloned()
                        .ok_or(ClientError::StoreUnavailable);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let state = self.state.read().await;
                    if let Some(record) = requests::lookup(&state, id) {
                        if record.is_terminal() {
                            return Ok(record.clone());
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(ClientError::StoreUnavailable)
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
