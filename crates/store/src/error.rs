use blocksync_common_types::BlockNumber;
use diesel_async::pooled_connection::deadpool::PoolError;
use thiserror::Error;

/// Errors returned by [`Store`](crate::Store) operations. None of them are
/// retried internally; that's up to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record referenced a block number that isn't in the `blocks` table
    /// (yet). Usually means derivation ran ahead of ingestion.
    #[error("no block with block number {block_number} exists (needed by {table})")]
    BlockNotFound {
        table: &'static str,
        block_number: BlockNumber,
    },
    /// The database rejected a statement, e.g. because of a constraint
    /// violation or a dropped connection.
    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: diesel::result::Error,
    },
    #[error("failed to get a database connection: {0}")]
    Pool(#[from] PoolError),
    /// Data that can't be converted between its canonical form and its
    /// columns.
    #[error("invalid {table} data at block number {block_number}: {reason}")]
    InvalidData {
        table: &'static str,
        block_number: BlockNumber,
        reason: String,
    },
}

// Needed by `AsyncConnection::transaction`, which produces bare diesel errors
// for `BEGIN` and `COMMIT`.
impl From<diesel::result::Error> for StoreError {
    fn from(source: diesel::result::Error) -> Self {
        Self::Storage {
            context: "database transaction failed".to_string(),
            source,
        }
    }
}

pub(crate) trait StorageContext<T> {
    fn storage_context<F>(self, context: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> String;
}

impl<T> StorageContext<T> for Result<T, diesel::result::Error> {
    fn storage_context<F>(self, context: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| StoreError::Storage {
            context: context(),
            source,
        })
    }
}
