//! Fills in derived records for blocks that are already in the registry but
//! don't have one yet.

use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use blocksync_common_types::inputs::BlockRange;
use blocksync_common_types::{BlockNumber, TokenSupply};
use blocksync_store::{DerivedRecordStore, SingleTokenSupplies, StoreError, TokenSupplies};
use tracing::*;

use crate::config::{Config, TokenSupplyConfig};
use crate::PrometheusMetrics;

/// Computes the record of a single block, usually by querying a node at that
/// block.
#[async_trait]
pub trait RecordDeriver<R>: Send + Sync {
    async fn derive(&self, block_number: BlockNumber) -> anyhow::Result<R>;
}

/// The outcome of one [`backfill_once`] pass. Both lists are in ascending
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub created: Vec<BlockNumber>,
    pub failed: Vec<BlockNumber>,
}

/// Derives and stores a record for every block in `range` that is missing
/// one. Failing to derive or store one record doesn't stop the pass; only
/// failing to find the missing blocks does.
pub async fn backfill_once<S, D>(
    store: &S,
    deriver: &D,
    range: BlockRange,
    metrics: &PrometheusMetrics,
) -> Result<BackfillReport, StoreError>
where
    S: DerivedRecordStore,
    D: RecordDeriver<S::Record>,
{
    let (start, end) = range.bounds();
    let missing = store.missing_blocks(start, end).await?;
    info!(
        table = S::TABLE_NAME,
        start,
        end,
        missing = missing.len(),
        "Found blocks to backfill"
    );

    let records_created = metrics
        .backfill_records_created
        .with_label_values(&[S::TABLE_NAME]);
    let failures = metrics.backfill_failures.with_label_values(&[S::TABLE_NAME]);

    let mut report = BackfillReport::default();
    for block_number in missing {
        match derive_and_create(store, deriver, block_number).await {
            Ok(()) => {
                records_created.inc();
                report.created.push(block_number);
            }
            Err(err) => {
                failures.inc();
                warn!(
                    table = S::TABLE_NAME,
                    block_number,
                    error = %format!("{err:#}"),
                    "Failed to backfill block"
                );
                report.failed.push(block_number);
            }
        }
    }

    info!(
        table = S::TABLE_NAME,
        created = report.created.len(),
        failed = report.failed.len(),
        "Finished backfill pass"
    );
    Ok(report)
}

async fn derive_and_create<S, D>(
    store: &S,
    deriver: &D,
    block_number: BlockNumber,
) -> anyhow::Result<()>
where
    S: DerivedRecordStore,
    D: RecordDeriver<S::Record>,
{
    let record = deriver.derive(block_number).await?;
    store.create(block_number, &record).await?;
    Ok(())
}

/// Runs [`backfill_once`] forever, sleeping for `polling_period` after every
/// pass. Failed passes are retried at the next tick.
pub async fn run_backfill<S, D>(
    store: &S,
    deriver: &D,
    range: BlockRange,
    polling_period: Duration,
    metrics: &PrometheusMetrics,
) where
    S: DerivedRecordStore,
    D: RecordDeriver<S::Record>,
{
    loop {
        if let Err(err) = backfill_once(store, deriver, range, metrics).await {
            error!(table = S::TABLE_NAME, error = %err, "Backfill pass failed");
        }

        debug!(
            sleep_seconds = polling_period.as_secs(),
            "Sleeping for a while before next backfill pass"
        );
        tokio::time::sleep(polling_period).await;
    }
}

/// Computes the total supply of any token at a given block.
#[async_trait]
pub trait TokenSupplyDeriver: Send + Sync {
    async fn total_supply(
        &self,
        token_address: &str,
        block_number: BlockNumber,
    ) -> anyhow::Result<BigDecimal>;
}

/// Token supply records that can be narrowed down to a single token, so that
/// every token gets its own gaps.
pub trait PerTokenSupplies: Send + Sync {
    type Scoped: DerivedRecordStore<Record = TokenSupply>;

    fn for_token(&self, token_address: &str) -> Self::Scoped;
}

impl PerTokenSupplies for TokenSupplies {
    type Scoped = SingleTokenSupplies;

    fn for_token(&self, token_address: &str) -> SingleTokenSupplies {
        TokenSupplies::for_token(self, token_address)
    }
}

struct SupplyOf<'a, D> {
    deriver: &'a D,
    token_address: &'a str,
}

#[async_trait]
impl<'a, D: TokenSupplyDeriver> RecordDeriver<TokenSupply> for SupplyOf<'a, D> {
    async fn derive(&self, block_number: BlockNumber) -> anyhow::Result<TokenSupply> {
        let supply = self
            .deriver
            .total_supply(self.token_address, block_number)
            .await?;
        Ok(TokenSupply {
            token_address: self.token_address.to_string(),
            supply,
        })
    }
}

/// The outcome of backfilling one configured token.
#[derive(Debug)]
pub struct TokenBackfill {
    pub token_address: String,
    pub result: Result<BackfillReport, StoreError>,
}

/// Runs a [`backfill_once`] pass for every configured token, each over its
/// own block range. A failed pass for one token doesn't affect the others.
pub async fn backfill_token_supplies<S, D>(
    store: &S,
    deriver: &D,
    tokens: &[TokenSupplyConfig],
    metrics: &PrometheusMetrics,
) -> Vec<TokenBackfill>
where
    S: PerTokenSupplies,
    D: TokenSupplyDeriver,
{
    let mut backfills = Vec::with_capacity(tokens.len());
    for token in tokens {
        let supply_of = SupplyOf {
            deriver,
            token_address: &token.token_address,
        };
        let result = backfill_once(
            &store.for_token(&token.token_address),
            &supply_of,
            token.block_range(),
            metrics,
        )
        .await;
        if let Err(err) = &result {
            error!(
                token_address = %token.token_address,
                error = %err,
                "Token supply backfill pass failed"
            );
        }
        backfills.push(TokenBackfill {
            token_address: token.token_address.clone(),
            result,
        });
    }
    backfills
}

/// Runs [`backfill_token_supplies`] for all tokens in `config` forever,
/// sleeping for the configured polling period after every round.
pub async fn run_token_supply_backfills<S, D>(
    store: &S,
    deriver: &D,
    config: &Config,
    metrics: &PrometheusMetrics,
) where
    S: PerTokenSupplies,
    D: TokenSupplyDeriver,
{
    let polling_period = config.polling_period();
    loop {
        backfill_token_supplies(store, deriver, &config.token_supply, metrics).await;

        debug!(
            sleep_seconds = polling_period.as_secs(),
            "Sleeping for a while before next backfill round"
        );
        tokio::time::sleep(polling_period).await;
    }
}
