use std::time::Duration;

use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use aws_sdk_dynamodb::types::{PutRequest, WriteRequest};
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

use campaign_etl_core::contract::{CampaignRecord, OutputMessage, QueryJob};
use campaign_etl_core::query::{PollConfig, QueryState, DEFAULT_POLL_DEADLINE};
use campaign_etl_core::retry::RetryPolicy;
use campaign_etl_lambda::adapters::invoke::FunctionInvoker;
use campaign_etl_lambda::adapters::notifier::Notifier;
use campaign_etl_lambda::adapters::object_store::ObjectStore;
use campaign_etl_lambda::adapters::query_engine::{QueryEngine, ResultsPage};
use campaign_etl_lambda::adapters::record_store::{to_store_item, RecordStore};
use campaign_etl_lambda::clients::{connect, ServiceClients};
use campaign_etl_lambda::handlers::ingest::{handle_event, IngestConfig, PipelineServices};

struct RuntimeSettings {
    region: String,
    source_bucket: String,
    results_bucket: String,
    results_prefix: String,
    table_name: String,
    queue_url: String,
    followup_function_arn: Option<String>,
    query: Option<QueryJob>,
    query_timeout: Duration,
}

impl RuntimeSettings {
    fn from_env() -> Result<Self, Error> {
        let query = match (
            std::env::var("ETL_QUERY_SQL"),
            std::env::var("ETL_QUERY_DATABASE"),
            std::env::var("ETL_QUERY_OUTPUT_LOCATION"),
        ) {
            (Ok(sql), Ok(database), Ok(output_location)) => Some(QueryJob {
                sql,
                database,
                output_location,
            }),
            _ => None,
        };

        let query_timeout = std::env::var("ETL_QUERY_TIMEOUT_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_DEADLINE);

        Ok(Self {
            region: std::env::var("ETL_AWS_REGION").unwrap_or_else(|_| "eu-west-2".to_string()),
            source_bucket: require_env("ETL_SOURCE_BUCKET")?,
            results_bucket: require_env("ETL_RESULTS_BUCKET")?,
            results_prefix: std::env::var("ETL_RESULTS_PREFIX")
                .unwrap_or_else(|_| "campaign-etl/outcomes".to_string()),
            table_name: require_env("ETL_TABLE_NAME")?,
            queue_url: require_env("ETL_NOTIFY_QUEUE_URL")?,
            followup_function_arn: std::env::var("ETL_FOLLOWUP_FUNCTION_ARN").ok(),
            query,
            query_timeout,
        })
    }
}

fn require_env(name: &str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::from(format!("{name} must be configured")))
}

struct S3ObjectStore {
    source_bucket: String,
    results_bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl ObjectStore for S3ObjectStore {
    fn read_object(&self, key: &str) -> Result<Vec<u8>, String> {
        let bucket = self.source_bucket.clone();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_object()
                    .bucket(bucket)
                    .key(&object_key)
                    .send()
                    .await
                    .map_err(|error| format!("could not open object {object_key}: {error}"))?;
                output
                    .body
                    .collect()
                    .await
                    .map(|data| data.into_bytes().to_vec())
                    .map_err(|error| format!("could not read object {object_key}: {error}"))
            })
        })
    }

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String> {
        let bucket = self.results_bucket.clone();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(object_key)
                    .body(ByteStream::from(body_bytes))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("could not write object to s3: {error}"))
            })
        })
    }

    fn delete_object(&self, key: &str) -> Result<(), String> {
        let bucket = self.source_bucket.clone();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .delete_object()
                    .bucket(bucket)
                    .key(&object_key)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("could not delete object {object_key}: {error}"))
            })
        })
    }
}

struct DynamoRecordStore {
    table_name: String,
    dynamodb_client: aws_sdk_dynamodb::Client,
}

impl RecordStore for DynamoRecordStore {
    fn write_batch(&self, records: &[CampaignRecord]) -> Result<(), String> {
        let mut requests = Vec::with_capacity(records.len());
        for record in records {
            let item = to_store_item(record)?;
            let put = PutRequest::builder()
                .set_item(Some(item))
                .build()
                .map_err(|error| format!("could not build put request: {error}"))?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }

        let table_name = self.table_name.clone();
        let client = self.dynamodb_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .batch_write_item()
                    .request_items(&table_name, requests)
                    .send()
                    .await
                    .map_err(|error| {
                        format!("could not write batch to {table_name}: {error}")
                    })?;

                let unprocessed = output
                    .unprocessed_items()
                    .map(|items| items.values().map(Vec::len).sum::<usize>())
                    .unwrap_or(0);
                if unprocessed > 0 {
                    return Err(format!(
                        "store left {unprocessed} items of the batch unprocessed"
                    ));
                }
                Ok(())
            })
        })
    }
}

struct AthenaQueryEngine {
    athena_client: aws_sdk_athena::Client,
}

impl QueryEngine for AthenaQueryEngine {
    fn submit(&self, job: &QueryJob) -> Result<String, String> {
        let job = job.clone();
        let client = self.athena_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .start_query_execution()
                    .query_string(job.sql)
                    .query_execution_context(
                        QueryExecutionContext::builder()
                            .database(job.database)
                            .build(),
                    )
                    .result_configuration(
                        ResultConfiguration::builder()
                            .output_location(job.output_location)
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|error| format!("could not submit query: {error}"))?;
                output
                    .query_execution_id()
                    .map(str::to_string)
                    .ok_or_else(|| "query submission returned no execution id".to_string())
            })
        })
    }

    fn execution_state(&self, execution_id: &str) -> Result<QueryState, String> {
        let execution_id = execution_id.to_string();
        let client = self.athena_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_query_execution()
                    .query_execution_id(&execution_id)
                    .send()
                    .await
                    .map_err(|error| {
                        format!("could not poll query {execution_id}: {error}")
                    })?;
                let state = output
                    .query_execution()
                    .and_then(|execution| execution.status())
                    .and_then(|status| status.state())
                    .ok_or_else(|| format!("query {execution_id} reported no state"))?;
                map_query_state(state)
            })
        })
    }

    fn results_page(
        &self,
        execution_id: &str,
        page_token: Option<&str>,
    ) -> Result<ResultsPage, String> {
        let execution_id = execution_id.to_string();
        let page_token = page_token.map(str::to_string);
        let client = self.athena_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_query_results()
                    .query_execution_id(&execution_id)
                    .set_next_token(page_token)
                    .send()
                    .await
                    .map_err(|error| {
                        format!("could not fetch results for query {execution_id}: {error}")
                    })?;

                let rows = output
                    .result_set()
                    .map(|set| {
                        set.rows()
                            .iter()
                            .map(|row| {
                                row.data()
                                    .iter()
                                    .map(|datum| datum.var_char_value().map(str::to_string))
                                    .collect()
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(ResultsPage {
                    rows,
                    next_token: output.next_token().map(str::to_string),
                })
            })
        })
    }
}

fn map_query_state(state: &QueryExecutionState) -> Result<QueryState, String> {
    match state {
        QueryExecutionState::Queued => Ok(QueryState::Queued),
        QueryExecutionState::Running => Ok(QueryState::Running),
        QueryExecutionState::Succeeded => Ok(QueryState::Succeeded),
        QueryExecutionState::Failed => Ok(QueryState::Failed),
        QueryExecutionState::Cancelled => Ok(QueryState::Cancelled),
        other => Err(format!("unrecognized query state: {other:?}")),
    }
}

struct SqsNotifier {
    queue_url: String,
    sqs_client: aws_sdk_sqs::Client,
}

impl Notifier for SqsNotifier {
    fn publish(&self, message: &OutputMessage) -> Result<(), String> {
        let body = serde_json::to_string(message)
            .map_err(|error| format!("could not serialize output message: {error}"))?;
        let queue_url = self.queue_url.clone();
        let client = self.sqs_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .send_message()
                    .queue_url(queue_url)
                    .message_body(body)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("could not publish notification: {error}"))
            })
        })
    }
}

struct LambdaFunctionInvoker {
    function_arn: String,
    lambda_client: aws_sdk_lambda::Client,
}

impl FunctionInvoker for LambdaFunctionInvoker {
    fn invoke_async(&self, payload: &[u8]) -> Result<(), String> {
        let request_payload = payload.to_vec();
        let function_name = self.function_arn.clone();
        let client = self.lambda_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .invoke()
                    .function_name(function_name)
                    .invocation_type(InvocationType::Event)
                    .set_payload(Some(request_payload.into()))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("could not invoke follow-up function: {error}"))
            })
        })
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let settings = RuntimeSettings::from_env()?;
    let clients: ServiceClients = connect(&settings.region, &RetryPolicy::default())
        .await
        .map_err(Error::from)?;

    let object_store = S3ObjectStore {
        source_bucket: settings.source_bucket.clone(),
        results_bucket: settings.results_bucket.clone(),
        s3_client: clients.s3,
    };
    let record_store = DynamoRecordStore {
        table_name: settings.table_name.clone(),
        dynamodb_client: clients.dynamodb,
    };
    let query_engine = AthenaQueryEngine {
        athena_client: clients.athena,
    };
    let notifier = SqsNotifier {
        queue_url: settings.queue_url.clone(),
        sqs_client: clients.sqs,
    };
    let invoker = settings
        .followup_function_arn
        .clone()
        .map(|function_arn| LambdaFunctionInvoker {
            function_arn,
            lambda_client: clients.lambda,
        });

    let config = IngestConfig {
        results_prefix: settings.results_prefix.clone(),
        run_date: Utc::now().format("%Y-%m-%d").to_string(),
        query: settings.query.clone(),
        poll: PollConfig {
            deadline: settings.query_timeout,
            ..PollConfig::default()
        },
    };

    let services = PipelineServices {
        object_store: &object_store,
        record_store: &record_store,
        query_engine: &query_engine,
        notifier: &notifier,
        invoker: invoker
            .as_ref()
            .map(|value| value as &dyn FunctionInvoker),
    };

    handle_event(event.payload, &config, &services).map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
