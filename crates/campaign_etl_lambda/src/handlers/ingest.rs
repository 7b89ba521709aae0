use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use aws_lambda_events::s3::S3Event;
use serde_json::{json, Value};

use crate::runtime::batching::flush_in_batches;
use crate::runtime::contract::{decode_records, InvocationRequest, OutputMessage, QueryJob};
use crate::runtime::query::PollConfig;
use crate::runtime::storage_keys::{records_object_key, source_stem};

use crate::adapters::invoke::FunctionInvoker;
use crate::adapters::notifier::Notifier;
use crate::adapters::object_store::ObjectStore;
use crate::adapters::query_engine::QueryEngine;
use crate::adapters::record_store::RecordStore;
use crate::encoder;
use crate::log;
use crate::poller;
use crate::transfer;

pub const MODE_INGEST: &str = "ingest";
pub const MODE_INGEST_WITH_QUERY: &str = "ingest+query";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub results_prefix: String,
    pub run_date: String,
    pub query: Option<QueryJob>,
    pub poll: PollConfig,
}

/// The remote services one invocation talks to. Concrete AWS adapters are
/// wired up in the binary; tests substitute recording fakes.
pub struct PipelineServices<'a> {
    pub object_store: &'a dyn ObjectStore,
    pub record_store: &'a dyn RecordStore,
    pub query_engine: &'a dyn QueryEngine,
    pub notifier: &'a dyn Notifier,
    pub invoker: Option<&'a dyn FunctionInvoker>,
}

enum EventKind {
    ObjectCreated(String),
    Direct(InvocationRequest),
}

/// Entry point for one invocation. A storage-event payload drives the full
/// pipeline; a direct payload is acknowledged without touching any remote
/// service.
pub fn handle_event(
    event: Value,
    config: &IngestConfig,
    services: &PipelineServices<'_>,
) -> Result<Value, String> {
    let started = Instant::now();
    match classify_event(event)? {
        EventKind::Direct(request) => {
            log::info(
                "ingest_handler",
                "direct_invocation",
                json!({ "date": request.date, "text": request.text }),
            );
            log_elapsed(started);
            Ok(json!({ "status": "finished" }))
        }
        EventKind::ObjectCreated(object_key) => {
            let message = run_pipeline(&object_key, config, services)?;
            log_elapsed(started);
            Ok(json!({
                "status": "finished",
                "s3_key": message.s3_key,
                "mode": message.mode,
            }))
        }
    }
}

fn classify_event(event: Value) -> Result<EventKind, String> {
    if let Ok(s3_event) = serde_json::from_value::<S3Event>(event.clone()) {
        if let Some(key) = s3_event
            .records
            .first()
            .and_then(|record| record.s3.object.key.clone())
        {
            return Ok(EventKind::ObjectCreated(key));
        }
    }
    serde_json::from_value::<InvocationRequest>(event)
        .map(EventKind::Direct)
        .map_err(|error| format!("unrecognized invocation payload: {error}"))
}

fn run_pipeline(
    object_key: &str,
    config: &IngestConfig,
    services: &PipelineServices<'_>,
) -> Result<OutputMessage, String> {
    log::info(
        "ingest_handler",
        "pipeline_started",
        json!({ "object_key": object_key }),
    );

    let payload = services.object_store.read_object(object_key)?;
    let records = decode_records(&payload)
        .map_err(|error| format!("could not decode records from {object_key}: {error}"))?;
    log::info(
        "ingest_handler",
        "records_decoded",
        json!({ "object_key": object_key, "record_count": records.len() }),
    );

    let local_path = temp_artifact_path(object_key);
    encoder::encode_records_to_file(&records, &local_path)?;
    let remote_key = records_object_key(
        &config.results_prefix,
        &config.run_date,
        &source_stem(object_key),
    );
    transfer::upload_file(services.object_store, &local_path, &remote_key)?;

    let written = flush_in_batches(&records, |chunk| services.record_store.write_batch(chunk))
        .map_err(|error| {
            log::error(
                "ingest_handler",
                "batch_flush_failed",
                json!({
                    "written": error.written,
                    "retained": error.pending.len(),
                    "cause": error.cause,
                }),
            );
            error.to_string()
        })?;
    log::info(
        "ingest_handler",
        "records_ingested",
        json!({ "written": written }),
    );

    services.object_store.delete_object(object_key)?;

    let mut mode = MODE_INGEST;
    if let Some(job) = &config.query {
        let cancel = AtomicBool::new(false);
        let execution_id = services.query_engine.submit(job)?;
        log::info(
            "ingest_handler",
            "query_submitted",
            json!({ "execution_id": execution_id }),
        );
        poller::await_completion(services.query_engine, &execution_id, &config.poll, &cancel)
            .map_err(|error| format!("query {execution_id} did not complete: {error}"))?;
        let campaign_ids = poller::collect_results(services.query_engine, &execution_id)?;
        log::info(
            "ingest_handler",
            "query_completed",
            json!({ "execution_id": execution_id, "campaign_count": campaign_ids.len() }),
        );
        mode = MODE_INGEST_WITH_QUERY;
    }

    let message = OutputMessage {
        s3_key: remote_key,
        mode: mode.to_string(),
    };
    services.notifier.publish(&message)?;

    if let Some(invoker) = services.invoker {
        let body = serde_json::to_vec(&message)
            .map_err(|error| format!("could not serialize follow-up payload: {error}"))?;
        invoker.invoke_async(&body)?;
    }

    Ok(message)
}

fn temp_artifact_path(object_key: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "campaign-etl-{}-{timestamp}.parquet",
        source_stem(object_key)
    ));
    path
}

fn log_elapsed(started: Instant) {
    log::info(
        "ingest_handler",
        "invocation_completed",
        json!({ "duration_ms": started.elapsed().as_millis() as u64 }),
    );
}
