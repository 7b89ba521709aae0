use serde::{Deserialize, Serialize};

/// Direct invocation payload. Carries no object reference, so handling it
/// never touches a remote service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationRequest {
    pub date: String,
    pub text: String,
}

/// Outcome descriptor published downstream once per successful run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputMessage {
    pub s3_key: String,
    pub mode: String,
}

/// One tabular row of campaign metrics, as decoded from the fetched object
/// and written to both the columnar artifact and the key-value table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignRecord {
    pub campaign_id: i64,
    pub event_date: String,
    pub channel: String,
    pub impressions: i64,
    pub clicks: i64,
    pub spend: f64,
}

/// Analytical query to run after ingest: statement, database, and the
/// location the engine writes its result files to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryJob {
    pub sql: String,
    pub database: String,
    pub output_location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DecodeError {}

/// Decodes campaign records from a fetched object body.
///
/// Accepts either a top-level JSON array or a stream of concatenated /
/// newline-separated JSON objects. A malformed entry aborts the decode.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<CampaignRecord>, DecodeError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|error| DecodeError::new(format!("payload is not valid UTF-8: {error}")))?;
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|error| DecodeError::new(format!("malformed record array: {error}")));
    }

    let mut records = Vec::new();
    for entry in serde_json::Deserializer::from_str(trimmed).into_iter::<CampaignRecord>() {
        let record = entry
            .map_err(|error| DecodeError::new(format!("malformed record stream: {error}")))?;
        records.push(record);
    }
    Ok(records)
}
