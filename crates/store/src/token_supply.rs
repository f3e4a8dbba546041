use async_trait::async_trait;
use bigdecimal::BigDecimal;
use blocksync_common_types::{BlockNumber, TokenSupply};
use diesel::prelude::*;
use diesel::sql_types;
use diesel::IntoSql;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::error::StorageContext;
use crate::{schema, Store, StoreError};

/// Storage for one kind of record derived from blocks, e.g. a token supply
/// snapshot. Every record belongs to a block in the registry and is deleted
/// together with it.
///
/// Creation is insert-only: creating the same record twice is an error, not a
/// no-op. Callers consult [`DerivedRecordStore::missing_blocks`] to find out
/// what to create.
#[async_trait]
pub trait DerivedRecordStore: Send + Sync {
    type Record: Send + Sync;

    /// The table holding the records. Used in error messages and metrics.
    const TABLE_NAME: &'static str;

    /// Stores a record for the block with the given number. Fails with
    /// [`StoreError::BlockNotFound`] if there is no such block.
    async fn create(
        &self,
        block_number: BlockNumber,
        record: &Self::Record,
    ) -> Result<(), StoreError>;

    /// Returns, in ascending order, the numbers in `start..=end` of all known
    /// blocks that have no record yet. Blocks that were never ingested are not
    /// gaps.
    ///
    /// The result is a snapshot; records created concurrently may or may not
    /// be reflected.
    async fn missing_blocks(
        &self,
        start: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<BlockNumber>, StoreError>;
}

/// [`TokenSupply`] records, see [`Store::token_supplies`].
#[derive(Clone, Debug)]
pub struct TokenSupplies {
    store: Store,
}

impl TokenSupplies {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// The records of a single token. Unlike `self`, the returned store
    /// treats a block as missing until it has a record for that token.
    pub fn for_token(&self, token_address: impl Into<String>) -> SingleTokenSupplies {
        SingleTokenSupplies {
            supplies: self.clone(),
            token_address: token_address.into(),
        }
    }

    /// Like [`DerivedRecordStore::missing_blocks`], except that a block only
    /// counts as covered if it has a record for this particular token.
    pub async fn missing_blocks_for_token(
        &self,
        token_address: &str,
        start: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<BlockNumber>, StoreError> {
        use schema::{blocks, token_supply};

        blocks::table
            .left_join(
                token_supply::table.on(token_supply::block_id
                    .eq(blocks::id)
                    .and(token_supply::token_address.eq(token_address))),
            )
            .filter(blocks::number.between(start, end))
            .filter(token_supply::id.is_null())
            .select(blocks::number)
            .order_by(blocks::number.asc())
            .load(&mut self.store.conn().await?)
            .await
            .storage_context(|| {
                format!(
                    "failed to find blocks {start}..={end} missing {} for token {token_address:?}",
                    Self::TABLE_NAME
                )
            })
    }

    /// All token supplies recorded at the given block, ordered by token.
    pub async fn at_block(&self, block_number: BlockNumber) -> Result<Vec<TokenSupply>, StoreError> {
        use schema::{blocks, token_supply};

        let rows: Vec<(String, BigDecimal)> = token_supply::table
            .inner_join(blocks::table)
            .filter(blocks::number.eq(block_number))
            .select((token_supply::token_address, token_supply::supply))
            .order_by(token_supply::token_address.asc())
            .load(&mut self.store.conn().await?)
            .await
            .storage_context(|| {
                format!(
                    "failed to load {} for block number {block_number}",
                    Self::TABLE_NAME
                )
            })?;

        Ok(rows
            .into_iter()
            .map(|(token_address, supply)| TokenSupply {
                token_address,
                supply,
            })
            .collect())
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        use schema::token_supply;

        token_supply::table
            .count()
            .get_result(&mut self.store.conn().await?)
            .await
            .storage_context(|| format!("failed to count {}", Self::TABLE_NAME))
    }
}

#[async_trait]
impl DerivedRecordStore for TokenSupplies {
    type Record = TokenSupply;

    const TABLE_NAME: &'static str = "token_supply";

    async fn create(
        &self,
        block_number: BlockNumber,
        record: &TokenSupply,
    ) -> Result<(), StoreError> {
        use schema::{blocks, token_supply};

        // Resolving the block and inserting the record is a single statement,
        // so a block deleted in between can't leave a dangling record behind.
        let inserted = diesel::insert_into(token_supply::table)
            .values(
                blocks::table
                    .filter(blocks::number.eq(block_number))
                    .select((
                        blocks::id,
                        record
                            .token_address
                            .clone()
                            .into_sql::<sql_types::Text>(),
                        record.supply.clone().into_sql::<sql_types::Numeric>(),
                    )),
            )
            .into_columns((
                token_supply::block_id,
                token_supply::token_address,
                token_supply::supply,
            ))
            .execute(&mut self.store.conn().await?)
            .await
            .storage_context(|| {
                format!(
                    "failed to create {} for block number {block_number} and token {:?}",
                    Self::TABLE_NAME,
                    record.token_address
                )
            })?;

        if inserted == 0 {
            return Err(StoreError::BlockNotFound {
                table: Self::TABLE_NAME,
                block_number,
            });
        }

        debug!(
            block_number,
            token_address = %record.token_address,
            supply = %record.supply,
            "Created token supply"
        );
        Ok(())
    }

    async fn missing_blocks(
        &self,
        start: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<BlockNumber>, StoreError> {
        use schema::{blocks, token_supply};

        blocks::table
            .left_join(token_supply::table)
            .filter(blocks::number.between(start, end))
            .filter(token_supply::id.is_null())
            .select(blocks::number)
            .order_by(blocks::number.asc())
            .load(&mut self.store.conn().await?)
            .await
            .storage_context(|| {
                format!(
                    "failed to find blocks {start}..={end} missing {}",
                    Self::TABLE_NAME
                )
            })
    }
}

/// [`TokenSupply`] records of one token, see [`TokenSupplies::for_token`].
#[derive(Clone, Debug)]
pub struct SingleTokenSupplies {
    supplies: TokenSupplies,
    token_address: String,
}

impl SingleTokenSupplies {
    pub fn token_address(&self) -> &str {
        &self.token_address
    }
}

#[async_trait]
impl DerivedRecordStore for SingleTokenSupplies {
    type Record = TokenSupply;

    const TABLE_NAME: &'static str = TokenSupplies::TABLE_NAME;

    /// Fails with [`StoreError::InvalidData`] for records of other tokens.
    async fn create(
        &self,
        block_number: BlockNumber,
        record: &TokenSupply,
    ) -> Result<(), StoreError> {
        if record.token_address != self.token_address {
            return Err(StoreError::InvalidData {
                table: Self::TABLE_NAME,
                block_number,
                reason: format!(
                    "record for token {:?} doesn't belong to token {:?}",
                    record.token_address, self.token_address
                ),
            });
        }
        self.supplies.create(block_number, record).await
    }

    async fn missing_blocks(
        &self,
        start: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<BlockNumber>, StoreError> {
        self.supplies
            .missing_blocks_for_token(&self.token_address, start, end)
            .await
    }
}
