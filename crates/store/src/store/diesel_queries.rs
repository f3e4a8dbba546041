//! Provides the diesel queries, callers should handle connection pooling and
//! transactions.

use std::collections::HashMap;

use blocksync_common_types::{BlockNumber, Log, Receipt};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::error::StorageContext;
use crate::models::{BigIntId, LogRow, NewLog, NewReceipt, ReceiptRow};
use crate::{schema, StoreError};

/// Keeps multi-row inserts well below PostgreSQL's limit of 65535 bind
/// parameters per statement.
const INSERT_CHUNK_SIZE: usize = 1000;

async fn block_id(
    conn: &mut AsyncPgConnection,
    block_number: BlockNumber,
) -> Result<Option<BigIntId>, StoreError> {
    use schema::blocks;

    blocks::table
        .filter(blocks::number.eq(block_number))
        .select(blocks::id)
        .get_result(conn)
        .await
        .optional()
        .storage_context(|| format!("failed to look up block number {block_number}"))
}

// The caller must make sure that `conn` is within a transaction.
pub(super) async fn write_receipts(
    conn: &mut AsyncPgConnection,
    block_number: BlockNumber,
    receipts: &[Receipt],
) -> Result<usize, StoreError> {
    use schema::{logs, receipts as r};

    let block_id = block_id(conn, block_number)
        .await?
        .ok_or(StoreError::BlockNotFound {
            table: "receipts",
            block_number,
        })?;

    // Re-ingested blocks replace their receipts. Logs go with them.
    diesel::delete(r::table.filter(r::block_id.eq(block_id)))
        .execute(conn)
        .await
        .storage_context(|| format!("failed to clear receipts for block number {block_number}"))?;

    let new_receipts = receipts
        .iter()
        .enumerate()
        .map(|(tx_index, receipt)| NewReceipt::new(block_id, block_number, tx_index, receipt))
        .collect::<Result<Vec<_>, _>>()?;

    let mut receipt_ids = HashMap::with_capacity(new_receipts.len());
    for chunk in new_receipts.chunks(INSERT_CHUNK_SIZE) {
        let ids: Vec<(BigIntId, i32)> = diesel::insert_into(r::table)
            .values(chunk)
            .returning((r::id, r::tx_index))
            .get_results(conn)
            .await
            .storage_context(|| {
                format!("failed to insert receipts for block number {block_number}")
            })?;
        receipt_ids.extend(ids.into_iter().map(|(id, tx_index)| (tx_index, id)));
    }

    let mut new_logs = vec![];
    for (new_receipt, receipt) in new_receipts.iter().zip(receipts) {
        let receipt_id =
            *receipt_ids
                .get(&new_receipt.tx_index)
                .ok_or_else(|| StoreError::InvalidData {
                    table: "receipts",
                    block_number,
                    reason: format!("receipt {} was not inserted", receipt.tx_hash),
                })?;
        for log in &receipt.logs {
            new_logs.push(NewLog::new(receipt_id, block_number, log)?);
        }
    }

    for chunk in new_logs.chunks(INSERT_CHUNK_SIZE) {
        diesel::insert_into(logs::table)
            .values(chunk)
            .execute(conn)
            .await
            .storage_context(|| format!("failed to insert logs for block number {block_number}"))?;
    }

    Ok(new_logs.len())
}

pub(super) async fn receipts(
    conn: &mut AsyncPgConnection,
    block_number: BlockNumber,
) -> Result<Vec<Receipt>, StoreError> {
    use schema::{blocks, logs, receipts as r};

    let rows: Vec<ReceiptRow> = r::table
        .inner_join(blocks::table)
        .filter(blocks::number.eq(block_number))
        .order_by(r::tx_index.asc())
        .select(ReceiptRow::as_select())
        .load(conn)
        .await
        .storage_context(|| format!("failed to load receipts for block number {block_number}"))?;

    if rows.is_empty() {
        return Ok(vec![]);
    }

    let receipt_ids: Vec<BigIntId> = rows.iter().map(|row| row.id).collect();
    let log_rows: Vec<LogRow> = logs::table
        .filter(logs::receipt_id.eq_any(&receipt_ids))
        .order_by((logs::receipt_id.asc(), logs::log_index.asc()))
        .select(LogRow::as_select())
        .load(conn)
        .await
        .storage_context(|| format!("failed to load logs for block number {block_number}"))?;

    let mut logs_by_receipt: HashMap<BigIntId, Vec<Log>> = HashMap::new();
    for row in log_rows {
        logs_by_receipt
            .entry(row.receipt_id)
            .or_default()
            .push(row.into_log(block_number)?);
    }

    rows.into_iter()
        .map(|row| {
            let logs = logs_by_receipt.remove(&row.id).unwrap_or_default();
            row.into_receipt(block_number, logs)
        })
        .collect()
}
