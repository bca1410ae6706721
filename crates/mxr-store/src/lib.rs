//! Projections built from the matrix result stream, the snapshot codec for the
//! sparse result cache, and the durable record stores that hold it.

mod cache;
mod correlator;
mod error_log;
mod fs_store;
mod mem_store;
mod reconciler;
mod registry;
mod session;
pub mod snapshot;

pub use cache::{CellCoord, CellKeyError, RecordOutcome, ResultCache};
pub use correlator::{Calculation, JobCorrelator, LinkOutcome, StartOutcome};
pub use error_log::ErrorLog;
pub use fs_store::FsStateStore;
pub use mem_store::MemStateStore;
pub use reconciler::{Applied, Progress, ReconcileStats, Reconciler};
pub use registry::MatrixRegistry;
pub use session::{Selection, SelectionError, SessionRecord};

use std::{io, path::PathBuf, sync::Arc};

pub type StoreResult<T> = Result<T, StoreError>;
pub type DynStateStore = Arc<dyn StateStore>;

/// Record holding the serialized sparse result cache.
pub const RESULT_CACHE_KEY: &str = "result_cache";
/// Record holding the live calculation and the selected matrices.
pub const SESSION_KEY: &str = "session";

/// String-valued record storage that survives a restart.
///
/// A successful `write` must be durable before it returns.
pub trait StateStore: Send + Sync {
    fn read(&self, key: &str) -> StoreResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid record key '{0}'")]
    InvalidKey(String),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source: err,
    }
}

pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_owned()))
    }
}
