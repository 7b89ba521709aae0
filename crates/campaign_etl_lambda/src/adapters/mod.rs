pub mod invoke;
pub mod notifier;
pub mod object_store;
pub mod query_engine;
pub mod record_store;
