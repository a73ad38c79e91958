use thiserror::Error;

/// Failures of the client machinery itself. Request-path failures are
/// never errors: they settle as failure outcomes in the tracking store.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client state task is no longer running")]
    StoreUnavailable,
}
