//! Database access (read and write) abstractions for blocksync: the block
//! registry, derived records keyed by block, and normalized receipts.

mod error;
mod models;
mod schema;
mod store;
mod token_supply;

pub use error::StoreError;
pub use store::{BlockId, Store};
pub use token_supply::{DerivedRecordStore, SingleTokenSupplies, TokenSupplies};
