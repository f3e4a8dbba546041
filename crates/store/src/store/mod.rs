mod diesel_queries;

use std::fmt::Debug;

use blocksync_common_types::inputs::BlockRange;
use blocksync_common_types::{Block, BlockNumber, Receipt};
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_async_migrations::{embed_migrations, EmbeddedMigrations};
use tracing::{debug, info};

use crate::error::StorageContext;
use crate::models::{BigIntId, BlockRow, NewBlock};
use crate::token_supply::TokenSupplies;
use crate::{schema, StoreError};

/// The internal identifier the store assigned to a block. It can be compared,
/// but not inspected: blocks are only ever addressed by number from outside
/// the store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(BigIntId);

/// An abstraction over all database operations. It uses [`Arc`] internally, so
/// it's cheaply cloneable.
///
/// [`Arc`]: std::sync::Arc
#[derive(Clone)]
pub struct Store {
    pool: Pool<AsyncPgConnection>,
}

impl Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // It might contain sensitive data, so don't print it.
        f.debug_struct("Store").finish()
    }
}

impl Store {
    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    /// Connects to the database and runs all pending migrations.
    pub async fn new(db_url: &str) -> anyhow::Result<Self> {
        info!("Initializing database connection pool");

        let manager = AsyncDieselConnectionManager::new(db_url);
        let pool = Pool::builder(manager).build()?;
        let store = Self { pool };

        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;

        // Get a lock for running migrations. Blocks until we get the lock.
        // Ingesters and backfillers may start at the same time and must not
        // run migrations concurrently.
        diesel::sql_query("select pg_advisory_lock(1)")
            .execute(&mut conn)
            .await?;
        info!("Run database migrations");

        let result = Self::MIGRATIONS
            .run_pending_migrations(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!(e));

        // Release the migration lock.
        diesel::sql_query("select pg_advisory_unlock(1)")
            .execute(&mut conn)
            .await?;

        result
    }

    pub(crate) async fn conn(&self) -> Result<Object<AsyncPgConnection>, StoreError> {
        Ok(self.pool.get().await?)
    }

    /// Access to the token supply records, the derived records that are
    /// backfilled for every known block.
    pub fn token_supplies(&self) -> TokenSupplies {
        TokenSupplies::new(self.clone())
    }
}

/// Block registry.
impl Store {
    /// Inserts the block, or overwrites the block with the same number in
    /// place. The block keeps its [`BlockId`], so anything derived from it
    /// stays attached; recovering from a reorg is simply re-ingesting the
    /// block.
    pub async fn upsert_block(&self, block: &Block) -> Result<BlockId, StoreError> {
        use schema::blocks;

        let new_block = NewBlock::from(block);
        let id = diesel::insert_into(blocks::table)
            .values(&new_block)
            .on_conflict(blocks::number)
            .do_update()
            .set(&new_block)
            .returning(blocks::id)
            .get_result::<BigIntId>(&mut self.conn().await?)
            .await
            .storage_context(|| format!("failed to upsert block number {}", block.number))?;

        debug!(block_number = block.number, hash = %block.hash, "Upserted block");
        Ok(BlockId(id))
    }

    /// Fetches the block with the given number, if known.
    pub async fn block(&self, block_number: BlockNumber) -> Result<Option<Block>, StoreError> {
        use schema::blocks;

        let row = blocks::table
            .filter(blocks::number.eq(block_number))
            .select(BlockRow::as_select())
            .get_result(&mut self.conn().await?)
            .await
            .optional()
            .storage_context(|| format!("failed to fetch block number {block_number}"))?;

        Ok(row.map(Into::into))
    }

    pub async fn blocks_count(&self) -> Result<i64, StoreError> {
        use schema::blocks;

        blocks::table
            .count()
            .get_result(&mut self.conn().await?)
            .await
            .storage_context(|| "failed to count blocks".to_string())
    }

    /// Deletes all blocks in the range, together with **all** of their
    /// derived records, receipts and logs. Returns the number of deleted
    /// blocks.
    pub async fn delete_blocks(&self, range: BlockRange) -> Result<usize, StoreError> {
        use schema::blocks;

        let (start, end) = range.bounds();
        let deleted = diesel::delete(blocks::table.filter(blocks::number.between(start, end)))
            .execute(&mut self.conn().await?)
            .await
            .storage_context(|| format!("failed to delete blocks {start}..={end}"))?;
        // The `ON DELETE CASCADE`s take care of the rest of the cleanup.

        info!(start, end, deleted, "Deleted blocks");
        Ok(deleted)
    }

    /// Like [`Store::delete_blocks`], for a single block. Returns whether the
    /// block existed.
    pub async fn delete_block(&self, block_number: BlockNumber) -> Result<bool, StoreError> {
        Ok(self.delete_blocks(BlockRange::single(block_number)).await? > 0)
    }
}

/// Receipts.
impl Store {
    /// Stores the normalized receipts of a known block, replacing whatever
    /// receipts were stored for it before. Returns the number of stored logs.
    pub async fn write_receipts(
        &self,
        block_number: BlockNumber,
        receipts: &[Receipt],
    ) -> Result<usize, StoreError> {
        let logs = self
            .conn()
            .await?
            .transaction::<_, StoreError, _>(|conn| {
                async move { diesel_queries::write_receipts(conn, block_number, receipts).await }
                    .scope_boxed()
            })
            .await?;

        info!(
            block_number,
            receipts = receipts.len(),
            logs,
            "Wrote receipts to database"
        );
        Ok(logs)
    }

    /// Returns the receipts of a block in execution order. Unknown blocks
    /// have no receipts.
    pub async fn receipts(&self, block_number: BlockNumber) -> Result<Vec<Receipt>, StoreError> {
        let mut conn = self.conn().await?;
        conn.build_transaction()
            .read_only()
            .repeatable_read()
            .run(|conn| {
                async move { diesel_queries::receipts(conn, block_number).await }.scope_boxed()
            })
            .await
    }
}
