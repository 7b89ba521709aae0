use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use campaign_etl_core::contract::CampaignRecord;

/// The store's item representation of one record.
pub type StoreItem = HashMap<String, AttributeValue>;

pub trait RecordStore {
    /// Submits the chunk as a single unconditional multi-put. Callers respect
    /// the per-call item ceiling; a larger chunk is a contract violation the
    /// store itself rejects.
    fn write_batch(&self, records: &[CampaignRecord]) -> Result<(), String>;
}

/// Marshals a record into the store item format. Failure here is
/// unrecoverable for the invocation: the record set cannot be ingested.
pub fn to_store_item(record: &CampaignRecord) -> Result<StoreItem, String> {
    serde_dynamo::to_item(record)
        .map_err(|error| format!("could not marshal record {}: {error}", record.campaign_id))
}

pub fn from_store_item(item: StoreItem) -> Result<CampaignRecord, String> {
    serde_dynamo::from_item(item).map_err(|error| format!("could not unmarshal item: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> CampaignRecord {
        CampaignRecord {
            campaign_id: 7,
            event_date: "2020-01-01".to_string(),
            channel: "display".to_string(),
            impressions: 5_000,
            clicks: 120,
            spend: 74.25,
        }
    }

    #[test]
    fn record_round_trips_through_the_item_format() {
        let record = sample_record();
        let item = to_store_item(&record).expect("record should marshal");
        let restored = from_store_item(item).expect("item should unmarshal");
        assert_eq!(restored, record);
    }

    #[test]
    fn marshaled_item_keeps_field_values() {
        let item = to_store_item(&sample_record()).expect("record should marshal");
        assert_eq!(
            item.get("campaign_id"),
            Some(&AttributeValue::N("7".to_string()))
        );
        assert_eq!(
            item.get("channel"),
            Some(&AttributeValue::S("display".to_string()))
        );
        assert_eq!(
            item.get("impressions"),
            Some(&AttributeValue::N("5000".to_string()))
        );
    }
}
