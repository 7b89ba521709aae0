//! AWS-oriented adapters and handlers for the campaign ETL pipeline.
//!
//! This crate owns runtime integration details (the Lambda handler, service
//! adapter traits, Parquet encoding, transfer, and query polling) and exposes
//! a single runtime module boundary for contract, batching, query, retry, and
//! storage key primitives.

pub mod adapters;
pub mod clients;
pub mod encoder;
pub mod handlers;
pub mod log;
pub mod poller;
pub mod runtime;
pub mod transfer;
