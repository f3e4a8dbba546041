//! Canonical chain data types shared by the normalizer, the store and the
//! backfill driver.

mod hex_string;
pub mod inputs;
mod receipt;

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
pub use hex_string::HexString;
pub use receipt::{Finality, FinalityError, Log, Receipt, STATE_ROOT_STATUS_SENTINEL};
use serde::{Deserialize, Serialize};

/// Block numbers are signed to match the database column. The natural key of
/// a block.
pub type BlockNumber = i64;

/// Note that block hashes have variable length, to easily deal with different
/// hash sizes across networks.
pub type BlockHash = HexString<Vec<u8>>;

/// Transaction hashes are always 32 bytes.
pub type TxHash = HexString<[u8; 32]>;

pub type LogTopic = HexString<[u8; 32]>;

/// Account and contract addresses are 20 bytes long.
pub type Address = HexString<[u8; 20]>;

/// Width in bytes of a receipt's logs bloom filter.
pub const LOGS_BLOOM_LENGTH: usize = 256;

pub type LogsBloom = HexString<[u8; LOGS_BLOOM_LENGTH]>;

/// A block header as ingested from the node. `number` identifies the block;
/// everything else may change when the block is re-ingested after a reorg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: BlockNumber,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub timestamp: NaiveDateTime,
    pub miner: Address,
    pub gas_limit: i64,
    pub gas_used: i64,
}

/// The total supply of a token as observed at some block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSupply {
    /// Hex-encoded token contract address. Kept as text so that the store,
    /// not the caller, has the final say on what it accepts.
    pub token_address: String,
    /// Arbitrary precision, so 256-bit supplies fit without loss. Stored as
    /// `NUMERIC` rather than as a decimal string.
    pub supply: BigDecimal,
}
