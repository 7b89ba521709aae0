//! Shared campaign ETL domain primitives.
//!
//! This crate owns the invocation contracts, the record model, the batch
//! chunking plan, the query-poll state machine, and the retry policy. It
//! intentionally excludes AWS SDK and Lambda runtime concerns, which live in
//! `crates/campaign_etl_lambda`.

pub mod batching;
pub mod contract;
pub mod query;
pub mod retry;
pub mod storage_keys;
