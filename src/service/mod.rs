pub mod background_jobs;
pub mod classifier;
pub mod error;
pub mod gateway;
pub mod ledger_service;
pub mod reconciliation;
pub mod signature;
