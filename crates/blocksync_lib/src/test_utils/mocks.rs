use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use blocksync_common_types::{BlockNumber, TokenSupply};
use blocksync_store::{DerivedRecordStore, StoreError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::backfill::{PerTokenSupplies, RecordDeriver, TokenSupplyDeriver};

pub const MOCK_TOKEN: &str = "0x8dd5fbce2f6a956c3022ba3663759011dd51e73e";

/// An in-memory token supply table, together with the block numbers it can
/// refer to. Records are keyed by block number and token, and clones share
/// them.
///
/// Unscoped, a block counts as covered once any token has a record there.
/// [`PerTokenSupplies::for_token`] returns a view that only looks at one
/// token.
#[derive(Clone, Debug, Default)]
pub struct MockRecordStore {
    blocks: BTreeSet<BlockNumber>,
    /// Reported as missing, but deleted before anything can be created for
    /// them.
    vanishing_blocks: BTreeSet<BlockNumber>,
    records: Arc<Mutex<BTreeMap<(BlockNumber, String), TokenSupply>>>,
    fail_lookups: bool,
    token_address: Option<String>,
}

impl MockRecordStore {
    pub fn with_blocks(blocks: impl IntoIterator<Item = BlockNumber>) -> Self {
        Self {
            blocks: blocks.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_vanishing_blocks(mut self, blocks: impl IntoIterator<Item = BlockNumber>) -> Self {
        self.vanishing_blocks.extend(blocks);
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    pub fn insert_record(&self, block_number: BlockNumber, record: TokenSupply) {
        self.records
            .lock()
            .unwrap()
            .insert((block_number, record.token_address.clone()), record);
    }

    /// The [`MOCK_TOKEN`] record at `block_number`.
    pub fn record(&self, block_number: BlockNumber) -> Option<TokenSupply> {
        self.record_of(MOCK_TOKEN, block_number)
    }

    pub fn record_of(&self, token_address: &str, block_number: BlockNumber) -> Option<TokenSupply> {
        self.records
            .lock()
            .unwrap()
            .get(&(block_number, token_address.to_string()))
            .cloned()
    }

    /// All `(block number, token)` keys, in order.
    pub fn keys(&self) -> Vec<(BlockNumber, String)> {
        self.records.lock().unwrap().keys().cloned().collect()
    }

    /// Whether records of `token_address` count towards coverage.
    fn covers(&self, token_address: &str) -> bool {
        self.token_address
            .as_deref()
            .map_or(true, |scope| scope == token_address)
    }
}

#[async_trait]
impl DerivedRecordStore for MockRecordStore {
    type Record = TokenSupply;

    const TABLE_NAME: &'static str = "mock_token_supply";

    async fn create(
        &self,
        block_number: BlockNumber,
        record: &TokenSupply,
    ) -> Result<(), StoreError> {
        if let Some(scope) = &self.token_address {
            if *scope != record.token_address {
                return Err(StoreError::InvalidData {
                    table: Self::TABLE_NAME,
                    block_number,
                    reason: format!("record for token {:?}", record.token_address),
                });
            }
        }
        if self.vanishing_blocks.contains(&block_number) || !self.blocks.contains(&block_number) {
            return Err(StoreError::BlockNotFound {
                table: Self::TABLE_NAME,
                block_number,
            });
        }

        let mut records = self.records.lock().unwrap();
        let key = (block_number, record.token_address.clone());
        if records.contains_key(&key) {
            return Err(StoreError::Storage {
                context: format!("failed to create record for block number {block_number}"),
                source: DieselError::DatabaseError(
                    DatabaseErrorKind::UniqueViolation,
                    Box::new("duplicate key value".to_string()),
                ),
            });
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn missing_blocks(
        &self,
        start: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<BlockNumber>, StoreError> {
        if self.fail_lookups {
            return Err(StoreError::Storage {
                context: "failed to find missing blocks".to_string(),
                source: DieselError::DatabaseError(
                    DatabaseErrorKind::ClosedConnection,
                    Box::new("connection closed".to_string()),
                ),
            });
        }

        let covered: BTreeSet<BlockNumber> = self
            .keys()
            .into_iter()
            .filter(|(_, token_address)| self.covers(token_address))
            .map(|(block_number, _)| block_number)
            .collect();
        Ok(self
            .blocks
            .union(&self.vanishing_blocks)
            .copied()
            .filter(|n| (start..=end).contains(n) && !covered.contains(n))
            .collect())
    }
}

impl PerTokenSupplies for MockRecordStore {
    type Scoped = MockRecordStore;

    fn for_token(&self, token_address: &str) -> MockRecordStore {
        Self {
            token_address: Some(token_address.to_string()),
            ..self.clone()
        }
    }
}

/// Derives a supply of `1000 * block_number` for any token, except at the
/// block numbers it's told to fail at.
#[derive(Debug, Default)]
pub struct MockDeriver {
    failing: BTreeSet<BlockNumber>,
}

impl MockDeriver {
    pub fn failing_at(blocks: impl IntoIterator<Item = BlockNumber>) -> Self {
        Self {
            failing: blocks.into_iter().collect(),
        }
    }

    /// The [`MOCK_TOKEN`] record this deriver produces at `block_number`.
    pub fn record_for(block_number: BlockNumber) -> TokenSupply {
        Self::record_of(MOCK_TOKEN, block_number)
    }

    pub fn record_of(token_address: &str, block_number: BlockNumber) -> TokenSupply {
        TokenSupply {
            token_address: token_address.to_string(),
            supply: BigDecimal::from(block_number * 1000),
        }
    }
}

#[async_trait]
impl TokenSupplyDeriver for MockDeriver {
    async fn total_supply(
        &self,
        token_address: &str,
        block_number: BlockNumber,
    ) -> anyhow::Result<BigDecimal> {
        if self.failing.contains(&block_number) {
            Err(anyhow!(
                "node unavailable at block number {block_number} for token {token_address}"
            ))
        } else {
            Ok(Self::record_of(token_address, block_number).supply)
        }
    }
}

#[async_trait]
impl RecordDeriver<TokenSupply> for MockDeriver {
    async fn derive(&self, block_number: BlockNumber) -> anyhow::Result<TokenSupply> {
        let supply = self.total_supply(MOCK_TOKEN, block_number).await?;
        Ok(TokenSupply {
            token_address: MOCK_TOKEN.to_string(),
            supply,
        })
    }
}
