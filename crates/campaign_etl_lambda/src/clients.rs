//! Session factory for the five remote services.

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use serde_json::json;

use campaign_etl_core::retry::RetryPolicy;

use crate::log;

/// Authenticated handles to every remote service the pipeline talks to, all
/// bound to the same region.
#[derive(Clone)]
pub struct ServiceClients {
    pub s3: aws_sdk_s3::Client,
    pub dynamodb: aws_sdk_dynamodb::Client,
    pub sqs: aws_sdk_sqs::Client,
    pub athena: aws_sdk_athena::Client,
    pub lambda: aws_sdk_lambda::Client,
}

/// Loads the shared SDK configuration and verifies that credentials resolve,
/// retrying under `policy` before giving up with a connection error.
pub async fn connect(region: &str, policy: &RetryPolicy) -> Result<ServiceClients, String> {
    let mut attempt = 1u32;
    let config = loop {
        match load_verified_config(region).await {
            Ok(config) => break config,
            Err(cause) if attempt < policy.max_attempts => {
                log::error(
                    "clients",
                    "connect_retry",
                    json!({
                        "attempt": attempt,
                        "max_attempts": policy.max_attempts,
                        "cause": cause,
                    }),
                );
                tokio::time::sleep(policy.delay_before(attempt)).await;
                attempt += 1;
            }
            Err(cause) => {
                return Err(format!("connection error after {attempt} attempts: {cause}"))
            }
        }
    };

    Ok(ServiceClients {
        s3: aws_sdk_s3::Client::new(&config),
        dynamodb: aws_sdk_dynamodb::Client::new(&config),
        sqs: aws_sdk_sqs::Client::new(&config),
        athena: aws_sdk_athena::Client::new(&config),
        lambda: aws_sdk_lambda::Client::new(&config),
    })
}

async fn load_verified_config(region: &str) -> Result<aws_config::SdkConfig, String> {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;

    let provider = config
        .credentials_provider()
        .ok_or_else(|| "no credentials provider configured".to_string())?;
    provider
        .provide_credentials()
        .await
        .map_err(|error| format!("could not resolve credentials: {error}"))?;

    Ok(config)
}
