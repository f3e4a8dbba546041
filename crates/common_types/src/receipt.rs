//! Canonical, store-ready transaction receipts.

use serde::Serialize;
use thiserror::Error;

use crate::{Address, HexString, LogTopic, LogsBloom, TxHash};

/// The value stored in the `status` column of a receipt whose finality is
/// expressed by an intermediate state root. Its status column must be
/// ignored.
pub const STATE_ROOT_STATUS_SENTINEL: i64 = -99;

/// How a receipt commits to the outcome of its transaction.
///
/// Receipts produced before the Byzantium fork carry the intermediate state
/// root after the transaction, later ones a status code. A single chain
/// mixes both shapes across its history, so this must be decided per receipt
/// and never from the block height.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Finality {
    /// Pre-fork receipts. Never empty.
    StateRoot(HexString<Vec<u8>>),
    /// Post-fork receipts.
    Status(u64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FinalityError {
    #[error("status is the state root sentinel (-99) but no state root is present")]
    MissingStateRoot,
    #[error("both a state root and status {0} are present")]
    Ambiguous(i64),
    #[error("invalid status code {0}")]
    InvalidStatus(i64),
    #[error("status code {0} does not fit in the status column")]
    StatusOutOfRange(u64),
    #[error("invalid state root: {0}")]
    InvalidStateRoot(&'static str),
}

impl Finality {
    /// Resolves the finality marker from a raw receipt's fields: a non-empty
    /// post state wins, the status code is only meaningful otherwise.
    pub fn resolve(post_state: &[u8], status: u64) -> Self {
        if post_state.is_empty() {
            Self::Status(status)
        } else {
            Self::StateRoot(HexString(post_state.to_vec()))
        }
    }

    pub fn state_root(&self) -> Option<&HexString<Vec<u8>>> {
        match self {
            Self::StateRoot(root) => Some(root),
            Self::Status(_) => None,
        }
    }

    pub fn status(&self) -> Option<u64> {
        match self {
            Self::StateRoot(_) => None,
            Self::Status(status) => Some(*status),
        }
    }

    /// Flattens the marker into its `(post_state, status)` column pair. The
    /// post state is the empty string in status mode.
    pub fn to_columns(&self) -> Result<(String, i64), FinalityError> {
        match self {
            Self::StateRoot(root) => Ok((root.to_string(), STATE_ROOT_STATUS_SENTINEL)),
            Self::Status(status) => i64::try_from(*status)
                .map(|status| (String::new(), status))
                .map_err(|_| FinalityError::StatusOutOfRange(*status)),
        }
    }

    /// The inverse of [`Finality::to_columns`]. `NULL` and the empty string are
    /// both accepted as an absent post state.
    pub fn from_columns(post_state: Option<&str>, status: i64) -> Result<Self, FinalityError> {
        let post_state = post_state.filter(|s| !s.is_empty());

        match (post_state, status) {
            (Some(root), STATE_ROOT_STATUS_SENTINEL) => {
                let root: HexString<Vec<u8>> =
                    root.parse().map_err(FinalityError::InvalidStateRoot)?;
                if root.0.is_empty() {
                    return Err(FinalityError::MissingStateRoot);
                }
                Ok(Self::StateRoot(root))
            }
            (None, STATE_ROOT_STATUS_SENTINEL) => Err(FinalityError::MissingStateRoot),
            (Some(_), status) => Err(FinalityError::Ambiguous(status)),
            (None, status) => u64::try_from(status)
                .map(Self::Status)
                .map_err(|_| FinalityError::InvalidStatus(status)),
        }
    }
}

/// An event log emitted during a transaction. Always an owned copy; it never
/// borrows from the node client's buffers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<LogTopic>,
    pub data: HexString<Vec<u8>>,
    /// Position of the log within the block.
    pub log_index: u64,
    pub removed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub bloom: LogsBloom,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    /// `None` unless the transaction created a contract.
    pub contract_address: Option<Address>,
    pub finality: Finality,
    pub logs: Vec<Log>,
}

impl Receipt {
    /// The contract address as stored: canonical hex, or the empty string if
    /// the transaction didn't create a contract.
    pub fn contract_address_string(&self) -> String {
        self.contract_address
            .map(|address| address.to_string())
            .unwrap_or_default()
    }
}
