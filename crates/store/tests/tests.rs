mod common;

use blocksync_common_types::inputs::BlockRange;
use blocksync_common_types::{Finality, HexString, Log, Receipt};
use blocksync_store::{DerivedRecordStore, StoreError};

use crate::common::{block, supply, EmptyStoreForTesting, OTHER_TOKEN, TOKEN};

#[tokio::test]
async fn empty_store_has_no_blocks() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    assert_eq!(store.blocks_count().await.unwrap(), 0);
    assert_eq!(store.block(100).await.unwrap(), None);
    assert_eq!(store.token_supplies().count().await.unwrap(), 0);
}

#[tokio::test]
async fn upsert_overwrites_block_in_place() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let id1 = store.upsert_block(&block(100, 1)).await.unwrap();
    let id2 = store.upsert_block(&block(100, 2)).await.unwrap();
    let id3 = store.upsert_block(&block(101, 1)).await.unwrap();

    assert_eq!(id1, id2);
    assert_ne!(id1, id3);
    assert_eq!(store.blocks_count().await.unwrap(), 2);
    assert_eq!(store.block(100).await.unwrap(), Some(block(100, 2)));
}

#[tokio::test]
async fn reorg_overwrite_keeps_derived_records() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    store.upsert_block(&block(100, 1)).await.unwrap();
    token_supplies
        .create(100, &supply(TOKEN, "100"))
        .await
        .unwrap();
    store.upsert_block(&block(100, 2)).await.unwrap();

    assert_eq!(
        token_supplies.at_block(100).await.unwrap(),
        vec![supply(TOKEN, "100")]
    );
}

#[tokio::test]
async fn create_token_supply() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    store.upsert_block(&block(100, 1)).await.unwrap();
    let record = supply(TOKEN, "115792089237316195423570985008687907853269984665640564039457");
    token_supplies.create(100, &record).await.unwrap();

    assert_eq!(token_supplies.count().await.unwrap(), 1);
    assert_eq!(token_supplies.at_block(100).await.unwrap(), vec![record]);
}

#[tokio::test]
async fn create_without_block_fails() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let err = store
        .token_supplies()
        .create(-1, &supply(TOKEN, "0"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::BlockNotFound {
            block_number: -1,
            ..
        }
    ));
    assert!(err.to_string().contains("block number -1"));
}

#[tokio::test]
async fn create_with_malformed_token_address_fails() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    store.upsert_block(&block(100, 1)).await.unwrap();
    let err = token_supplies
        .create(100, &supply("", "0"))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Storage { .. }));
    let message = err.to_string();
    assert!(message.contains("block number 100"), "{message}");
    assert!(message.contains("token_supply"), "{message}");
    assert_eq!(token_supplies.count().await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    store.upsert_block(&block(100, 1)).await.unwrap();
    token_supplies
        .create(100, &supply(TOKEN, "1"))
        .await
        .unwrap();
    let err = token_supplies
        .create(100, &supply(TOKEN, "2"))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Storage { .. }));
    assert_eq!(
        token_supplies.at_block(100).await.unwrap(),
        vec![supply(TOKEN, "1")]
    );

    // Other tokens at the same block are fine.
    token_supplies
        .create(100, &supply(OTHER_TOKEN, "3"))
        .await
        .unwrap();
    assert_eq!(token_supplies.count().await.unwrap(), 2);
}

#[tokio::test]
async fn concurrent_creates_for_the_same_token_and_block() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    store.upsert_block(&block(100, 1)).await.unwrap();
    let record1 = supply(TOKEN, "1");
    let record2 = supply(TOKEN, "2");
    let (res1, res2) = tokio::join!(
        token_supplies.create(100, &record1),
        token_supplies.create(100, &record2)
    );

    assert!(res1.is_ok() != res2.is_ok());
    assert_eq!(token_supplies.count().await.unwrap(), 1);
}

#[tokio::test]
async fn missing_blocks_is_range_bounded() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    store.upsert_block(&block(100, 1)).await.unwrap();
    store.upsert_block(&block(101, 1)).await.unwrap();
    token_supplies
        .create(100, &supply(TOKEN, "0"))
        .await
        .unwrap();

    assert_eq!(token_supplies.missing_blocks(100, 101).await.unwrap(), vec![101]);

    store.upsert_block(&block(102, 1)).await.unwrap();
    assert_eq!(token_supplies.missing_blocks(100, 101).await.unwrap(), vec![101]);
    assert_eq!(
        token_supplies.missing_blocks(100, 102).await.unwrap(),
        vec![101, 102]
    );
}

#[tokio::test]
async fn missing_blocks_skips_unknown_and_covered_blocks() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    for number in [1, 3, 4, 7] {
        store.upsert_block(&block(number, 1)).await.unwrap();
    }
    token_supplies.create(4, &supply(TOKEN, "0")).await.unwrap();
    token_supplies
        .create(4, &supply(OTHER_TOKEN, "0"))
        .await
        .unwrap();

    assert_eq!(token_supplies.missing_blocks(0, 10).await.unwrap(), vec![1, 3, 7]);
    assert!(token_supplies.missing_blocks(4, 4).await.unwrap().is_empty());
    assert!(token_supplies.missing_blocks(5, 6).await.unwrap().is_empty());

    token_supplies.create(3, &supply(TOKEN, "0")).await.unwrap();
    assert_eq!(token_supplies.missing_blocks(0, 10).await.unwrap(), vec![1, 7]);
}

#[tokio::test]
async fn missing_blocks_for_token() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    store.upsert_block(&block(10, 1)).await.unwrap();
    store.upsert_block(&block(11, 1)).await.unwrap();
    token_supplies.create(10, &supply(TOKEN, "5")).await.unwrap();
    token_supplies
        .create(11, &supply(OTHER_TOKEN, "5"))
        .await
        .unwrap();

    assert!(token_supplies.missing_blocks(10, 11).await.unwrap().is_empty());
    assert_eq!(
        token_supplies
            .missing_blocks_for_token(TOKEN, 10, 11)
            .await
            .unwrap(),
        vec![11]
    );
    assert_eq!(
        token_supplies
            .missing_blocks_for_token(OTHER_TOKEN, 10, 11)
            .await
            .unwrap(),
        vec![10]
    );
}

#[tokio::test]
async fn deleting_a_block_deletes_its_derived_records() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    store.upsert_block(&block(100, 1)).await.unwrap();
    store.upsert_block(&block(101, 1)).await.unwrap();
    token_supplies.create(100, &supply(TOKEN, "0")).await.unwrap();
    token_supplies.create(101, &supply(TOKEN, "0")).await.unwrap();

    assert!(store.delete_block(100).await.unwrap());
    assert!(!store.delete_block(100).await.unwrap());

    assert!(token_supplies.at_block(100).await.unwrap().is_empty());
    assert_eq!(token_supplies.count().await.unwrap(), 1);

    // Re-ingesting the block after the reorg makes it a gap again.
    store.upsert_block(&block(100, 2)).await.unwrap();
    assert_eq!(token_supplies.missing_blocks(100, 101).await.unwrap(), vec![100]);
}

#[tokio::test]
async fn deleting_all_blocks_deletes_all_derived_records() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    for number in 0..5 {
        store.upsert_block(&block(number, 1)).await.unwrap();
        token_supplies
            .create(number, &supply(TOKEN, "0"))
            .await
            .unwrap();
    }
    assert_eq!(token_supplies.count().await.unwrap(), 5);

    assert_eq!(store.delete_blocks(BlockRange::all()).await.unwrap(), 5);

    assert_eq!(store.blocks_count().await.unwrap(), 0);
    assert_eq!(token_supplies.count().await.unwrap(), 0);
}

#[tokio::test]
async fn delete_blocks_in_range() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    for number in 0..10 {
        store.upsert_block(&block(number, 1)).await.unwrap();
    }
    let deleted = store
        .delete_blocks(BlockRange {
            start: Some(7),
            end: None,
        })
        .await
        .unwrap();

    assert_eq!(deleted, 3);
    assert!(store.block(6).await.unwrap().is_some());
    assert!(store.block(7).await.unwrap().is_none());
}

fn receipt(tx_byte: u8, finality: Finality, logs: Vec<Log>) -> Receipt {
    let mut bloom = [0u8; 256];
    bloom[tx_byte as usize] = 0xff;
    Receipt {
        tx_hash: HexString([tx_byte; 32]),
        bloom: HexString(bloom),
        cumulative_gas_used: 21_000 * tx_byte as u64,
        gas_used: 21_000,
        contract_address: None,
        finality,
        logs,
    }
}

fn log(log_index: u64, topics: usize) -> Log {
    Log {
        address: HexString([0x42; 20]),
        topics: (0..topics).map(|i| HexString([i as u8; 32])).collect(),
        data: HexString(vec![0xca, 0xfe, log_index as u8]),
        log_index,
        removed: false,
    }
}

#[tokio::test]
async fn receipts_roundtrip_both_finality_shapes() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    store.upsert_block(&block(100, 1)).await.unwrap();

    let mut contract_creation = receipt(2, Finality::Status(1), vec![]);
    contract_creation.contract_address = Some(HexString([0x99; 20]));
    let receipts = vec![
        receipt(
            1,
            Finality::StateRoot(HexString(vec![0x11; 32])),
            vec![log(0, 3), log(1, 0)],
        ),
        contract_creation,
        receipt(3, Finality::Status(0), vec![log(2, 1)]),
    ];

    assert_eq!(store.write_receipts(100, &receipts).await.unwrap(), 3);
    assert_eq!(store.receipts(100).await.unwrap(), receipts);
}

#[tokio::test]
async fn rewriting_receipts_replaces_them() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    store.upsert_block(&block(100, 1)).await.unwrap();

    let before = vec![
        receipt(1, Finality::Status(1), vec![log(0, 1)]),
        receipt(2, Finality::Status(1), vec![]),
    ];
    let after = vec![receipt(3, Finality::Status(0), vec![log(0, 2)])];

    store.write_receipts(100, &before).await.unwrap();
    store.write_receipts(100, &after).await.unwrap();

    assert_eq!(store.receipts(100).await.unwrap(), after);
}

#[tokio::test]
async fn receipts_need_a_known_block() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let err = store
        .write_receipts(5, &[receipt(1, Finality::Status(1), vec![])])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("block number 5"));
    assert!(matches!(err, StoreError::BlockNotFound { .. }));
    assert!(store.receipts(5).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_block_deletes_its_receipts() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    store.upsert_block(&block(100, 1)).await.unwrap();
    store
        .write_receipts(100, &[receipt(1, Finality::Status(1), vec![log(0, 1)])])
        .await
        .unwrap();

    store.delete_block(100).await.unwrap();
    store.upsert_block(&block(100, 2)).await.unwrap();

    assert!(store.receipts(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_blocks_of_an_inverted_range_is_empty() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();

    store.upsert_block(&block(100, 1)).await.unwrap();
    store.upsert_block(&block(101, 1)).await.unwrap();

    assert!(token_supplies.missing_blocks(101, 100).await.unwrap().is_empty());
    assert!(token_supplies
        .for_token(TOKEN)
        .missing_blocks(101, 100)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn single_token_supplies_track_their_own_gaps() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token_supplies = store.token_supplies();
    let token = token_supplies.for_token(TOKEN);
    let other_token = token_supplies.for_token(OTHER_TOKEN);

    store.upsert_block(&block(1, 1)).await.unwrap();
    store.upsert_block(&block(2, 1)).await.unwrap();
    for number in [1, 2] {
        token.create(number, &supply(TOKEN, "7")).await.unwrap();
    }

    assert!(token.missing_blocks(1, 2).await.unwrap().is_empty());
    assert!(token_supplies.missing_blocks(1, 2).await.unwrap().is_empty());
    assert_eq!(other_token.missing_blocks(1, 2).await.unwrap(), vec![1, 2]);

    other_token
        .create(2, &supply(OTHER_TOKEN, "8"))
        .await
        .unwrap();
    assert_eq!(other_token.missing_blocks(1, 2).await.unwrap(), vec![1]);
    assert_eq!(token_supplies.count().await.unwrap(), 3);
}

#[tokio::test]
async fn single_token_supplies_reject_other_tokens() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let token = store.token_supplies().for_token(TOKEN);

    store.upsert_block(&block(1, 1)).await.unwrap();
    let err = token
        .create(1, &supply(OTHER_TOKEN, "1"))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::InvalidData { .. }));
    assert_eq!(token.token_address(), TOKEN);
    assert_eq!(store.token_supplies().count().await.unwrap(), 0);
}

#[tokio::test]
async fn receipts_with_unstorable_status_are_rejected() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    store.upsert_block(&block(100, 1)).await.unwrap();
    let before = vec![receipt(1, Finality::Status(1), vec![log(0, 1)])];
    store.write_receipts(100, &before).await.unwrap();

    let err = store
        .write_receipts(
            100,
            &[
                receipt(2, Finality::Status(1), vec![]),
                receipt(3, Finality::Status(u64::MAX), vec![]),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::InvalidData {
            table: "receipts",
            block_number: 100,
            ..
        }
    ));
    assert!(err.to_string().contains("does not fit"), "{err}");
    // The whole write is rolled back.
    assert_eq!(store.receipts(100).await.unwrap(), before);
}
