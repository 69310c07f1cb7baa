pub mod ledger;
pub mod memory_store;
pub mod sqlite_store;
pub mod storage;
