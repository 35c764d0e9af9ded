//! Per-user state and its persistence.
//!
//! [`UserStateStore`] owns every [`UserState`]; the pipeline reads and
//! mutates state only through it. Persistence goes through a
//! [`ProfileStorage`] backend chosen by the `database` config section.

mod profile;
mod retry;
mod sqlite;
mod storage;
mod store;

pub use profile::UserState;
pub use retry::RetryPolicy;
pub use sqlite::SqliteProfileStorage;
pub use storage::{FileProfileStorage, MemoryProfileStorage, ProfileStorage};
pub use store::{StoreStats, UserStateStore};

use crate::config::{DatabaseConfig, StorageBackend};
use crate::error::StorageResult;
use std::sync::Arc;

/// Open the backend configured in `config`.
///
/// # Errors
///
/// Returns [`StorageError::Init`](crate::error::StorageError::Init) if the
/// backend cannot be opened. Callers treat this as fatal.
pub async fn open_storage(config: &DatabaseConfig) -> StorageResult<Arc<dyn ProfileStorage>> {
    Ok(match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteProfileStorage::open(config.resolved_path()).await?),
        StorageBackend::File => Arc::new(FileProfileStorage::open(config.resolved_path()).await?),
        StorageBackend::Memory => Arc::new(MemoryProfileStorage::new()),
    })
}
