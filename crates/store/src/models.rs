//! Row types. These never leave the crate: surrogate ids are internal, and
//! callers only deal in [`blocksync_common_types`] values.

use blocksync_common_types::{
    Address, Block, BlockHash, BlockNumber, Finality, HexString, Log, LogTopic, LogsBloom,
    Receipt, TxHash,
};
use chrono::NaiveDateTime;
use diesel::{AsChangeset, Insertable, Queryable, Selectable};

use super::schema::*;
use crate::StoreError;

pub type BigIntId = i64;

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = blocks)]
pub struct NewBlock {
    pub number: BlockNumber,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub timestamp: NaiveDateTime,
    pub miner: Address,
    pub gas_limit: i64,
    pub gas_used: i64,
}

impl From<&Block> for NewBlock {
    fn from(block: &Block) -> Self {
        Self {
            number: block.number,
            hash: block.hash.clone(),
            parent_hash: block.parent_hash.clone(),
            timestamp: block.timestamp,
            miner: block.miner,
            gas_limit: block.gas_limit,
            gas_used: block.gas_used,
        }
    }
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = blocks)]
pub struct BlockRow {
    pub number: BlockNumber,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub timestamp: NaiveDateTime,
    pub miner: Address,
    pub gas_limit: i64,
    pub gas_used: i64,
}

impl From<BlockRow> for Block {
    fn from(row: BlockRow) -> Self {
        Self {
            number: row.number,
            hash: row.hash,
            parent_hash: row.parent_hash,
            timestamp: row.timestamp,
            miner: row.miner,
            gas_limit: row.gas_limit,
            gas_used: row.gas_used,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = receipts)]
pub struct NewReceipt {
    pub block_id: BigIntId,
    pub tx_index: i32,
    pub tx_hash: TxHash,
    pub contract_address: String,
    pub cumulative_gas_used: i64,
    pub gas_used: i64,
    pub bloom: String,
    pub post_state: Option<String>,
    pub status: i64,
}

impl NewReceipt {
    /// Flattens a canonical receipt into its columns. This is the only place
    /// where [`Finality`] turns into the `(post_state, status)` pair.
    pub fn new(
        block_id: BigIntId,
        block_number: BlockNumber,
        tx_index: usize,
        receipt: &Receipt,
    ) -> Result<Self, StoreError> {
        let invalid = |reason: String| StoreError::InvalidData {
            table: "receipts",
            block_number,
            reason,
        };

        let (post_state, status) = receipt
            .finality
            .to_columns()
            .map_err(|e| invalid(format!("receipt {}: {}", receipt.tx_hash, e)))?;

        Ok(Self {
            block_id,
            tx_index: i32::try_from(tx_index)
                .map_err(|_| invalid(format!("transaction index {tx_index} is too large")))?,
            tx_hash: receipt.tx_hash,
            contract_address: receipt.contract_address_string(),
            cumulative_gas_used: gas_column(receipt.cumulative_gas_used).map_err(invalid)?,
            gas_used: gas_column(receipt.gas_used).map_err(invalid)?,
            bloom: receipt.bloom.to_string(),
            post_state: Some(post_state).filter(|s| !s.is_empty()),
            status,
        })
    }
}

fn gas_column(gas: u64) -> Result<i64, String> {
    i64::try_from(gas).map_err(|_| format!("gas amount {gas} is too large"))
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = receipts)]
pub struct ReceiptRow {
    pub id: BigIntId,
    pub tx_hash: TxHash,
    pub contract_address: String,
    pub cumulative_gas_used: i64,
    pub gas_used: i64,
    pub bloom: String,
    pub post_state: Option<String>,
    pub status: i64,
}

impl ReceiptRow {
    pub fn into_receipt(
        self,
        block_number: BlockNumber,
        logs: Vec<Log>,
    ) -> Result<Receipt, StoreError> {
        let invalid = |reason: String| StoreError::InvalidData {
            table: "receipts",
            block_number,
            reason: format!("receipt {}: {}", self.tx_hash, reason),
        };

        let contract_address = match self.contract_address.as_str() {
            "" => None,
            address => Some(
                Address::parse_fixed(address)
                    .map_err(|e| invalid(format!("contract address: {e}")))?,
            ),
        };
        let finality = Finality::from_columns(self.post_state.as_deref(), self.status)
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Receipt {
            tx_hash: self.tx_hash,
            bloom: LogsBloom::parse_fixed(&self.bloom)
                .map_err(|e| invalid(format!("bloom: {e}")))?,
            cumulative_gas_used: u64::try_from(self.cumulative_gas_used)
                .map_err(|_| invalid("negative cumulative gas".to_string()))?,
            gas_used: u64::try_from(self.gas_used)
                .map_err(|_| invalid("negative gas".to_string()))?,
            contract_address,
            finality,
            logs,
        })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = logs)]
pub struct NewLog {
    pub receipt_id: BigIntId,
    pub log_index: i64,
    pub address: Address,
    pub topics: Vec<String>,
    pub data: HexString<Vec<u8>>,
    pub removed: bool,
}

impl NewLog {
    pub fn new(receipt_id: BigIntId, block_number: BlockNumber, log: &Log) -> Result<Self, StoreError> {
        Ok(Self {
            receipt_id,
            log_index: i64::try_from(log.log_index).map_err(|_| StoreError::InvalidData {
                table: "logs",
                block_number,
                reason: format!("log index {} is too large", log.log_index),
            })?,
            address: log.address,
            topics: log.topics.iter().map(ToString::to_string).collect(),
            data: log.data.clone(),
            removed: log.removed,
        })
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = logs)]
pub struct LogRow {
    pub receipt_id: BigIntId,
    pub log_index: i64,
    pub address: Address,
    pub topics: Vec<String>,
    pub data: HexString<Vec<u8>>,
    pub removed: bool,
}

impl LogRow {
    pub fn into_log(self, block_number: BlockNumber) -> Result<Log, StoreError> {
        let invalid = |reason: String| StoreError::InvalidData {
            table: "logs",
            block_number,
            reason,
        };

        let topics = self
            .topics
            .iter()
            .map(|topic| LogTopic::parse_fixed(topic))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid(format!("log {}: topic: {}", self.log_index, e)))?;

        Ok(Log {
            address: self.address,
            topics,
            data: self.data,
            log_index: u64::try_from(self.log_index)
                .map_err(|_| invalid(format!("negative log index {}", self.log_index)))?,
            removed: self.removed,
        })
    }
}
