pub mod cache;
pub mod db;
pub mod ledgerdb;
pub mod memory;
pub mod query_timeout;

pub use ledgerdb::LedgerExt;
