pub use campaign_etl_core::{batching, contract, query, retry, storage_keys};
