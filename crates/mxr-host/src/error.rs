use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("stream consumer is not running")]
    NotRunning,
    #[error("cannot start calculation: {0}")]
    Selection(#[from] mxr_store::SelectionError),
    #[error("stream consumer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
