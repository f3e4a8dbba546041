use alloy_primitives::{Address, Bytes, B256};

/// A transaction receipt exactly as the node client decoded it.
///
/// Only fields that exist on both sides of the Byzantium fork are modeled.
/// Which of `post_state` and `status` carries meaning is decided by the
/// normalizer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawReceipt {
    pub tx_hash: B256,
    /// Upstream guarantees this is exactly 256 bytes.
    pub logs_bloom: Bytes,
    /// Intermediate state root, empty for post-fork receipts.
    pub post_state: Bytes,
    pub status: u64,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    /// The zero address unless the transaction created a contract.
    pub contract_address: Address,
    pub logs: Vec<RawLog>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub log_index: u64,
    pub removed: bool,
}
