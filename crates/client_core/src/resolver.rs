//! Host resolution seam.

use shared::domain::{RobotHost, RobotName};

use crate::store::RobotApiState;

/// Maps a robot name to a reachable host descriptor using the current
/// state; may return unresolved, in which case the trigger is dropped
/// without a request or an error (a robot going offline mid-flow is an
/// expected condition, not a fault).
pub trait HostResolver: Send + Sync {
    fn resolve(&self, state: &RobotApiState, name: &RobotName) -> Option<RobotHost>;
}

/// Default resolver backed by the discovery map inside shared state,
/// fed by `upsert_host`/`remove_host`.
pub struct StateHostResolver;

impl HostResolver for StateHostResolver {
    fn resolve(&self, state: &RobotApiState, name: &RobotName) -> Option<RobotHost> {
        state.hosts.get(name).cloned()
    }
}
