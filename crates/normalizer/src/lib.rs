//! Converts the receipts of a block, as delivered by the node client, into
//! canonical [`Receipt`]s ready to be stored.
//!
//! Normalization never fails on well-formed input. Malformed fixed-width
//! fields mean the node client broke its contract, and the normalizer panics
//! rather than letting corrupted data reach the store.

mod raw;

use alloy_primitives::Address as RawAddress;
use blocksync_common_types::{
    Address, Finality, HexString, Log, LogsBloom, Receipt, LOGS_BLOOM_LENGTH,
};
pub use raw::{RawLog, RawReceipt};
use tracing::trace;

/// Normalizes all receipts of a block, preserving execution order.
pub fn normalize_receipts(raw_receipts: &[RawReceipt]) -> Vec<Receipt> {
    let receipts: Vec<Receipt> = raw_receipts.iter().map(normalize_receipt).collect();
    trace!(receipts = receipts.len(), "Normalized block receipts");
    receipts
}

/// # Panics
///
/// If the logs bloom isn't exactly [`LOGS_BLOOM_LENGTH`] bytes wide.
pub fn normalize_receipt(raw: &RawReceipt) -> Receipt {
    Receipt {
        tx_hash: HexString(raw.tx_hash.0),
        bloom: logs_bloom(raw),
        cumulative_gas_used: raw.cumulative_gas_used,
        gas_used: raw.gas_used,
        contract_address: contract_address(&raw.contract_address),
        finality: Finality::resolve(&raw.post_state, raw.status),
        logs: raw.logs.iter().map(normalize_log).collect(),
    }
}

fn normalize_log(raw: &RawLog) -> Log {
    Log {
        address: HexString(raw.address.0 .0),
        topics: raw.topics.iter().map(|topic| HexString(topic.0)).collect(),
        data: HexString(raw.data.to_vec()),
        log_index: raw.log_index,
        removed: raw.removed,
    }
}

fn logs_bloom(raw: &RawReceipt) -> LogsBloom {
    let bloom: &[u8] = &raw.logs_bloom;
    match <[u8; LOGS_BLOOM_LENGTH]>::try_from(bloom) {
        Ok(bloom) => HexString(bloom),
        Err(_) => panic!(
            "receipt {} has a {}-byte logs bloom, expected {}",
            raw.tx_hash,
            raw.logs_bloom.len(),
            LOGS_BLOOM_LENGTH
        ),
    }
}

/// The node reports the zero address for transactions that didn't create a
/// contract. It must not be stored as if it were a real address.
fn contract_address(raw: &RawAddress) -> Option<Address> {
    let address: Address = HexString(raw.0 .0);
    if address.is_zero() {
        None
    } else {
        Some(address)
    }
}
