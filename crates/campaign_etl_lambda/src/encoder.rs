//! Columnar encoding of campaign records.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;

use campaign_etl_core::contract::CampaignRecord;

/// Encoded size at which the in-progress row group is flushed to disk.
pub const ROW_GROUP_TARGET_BYTES: usize = 5 * 1024 * 1024;
/// Data page size handed to the writer.
pub const DATA_PAGE_SIZE_BYTES: usize = 64 * 1024;

/// Accumulates records and writes them to a local Parquet file. `close`
/// finalizes the footer; the caller hands the file to object transfer.
pub struct RecordEncoder {
    writer: ArrowWriter<File>,
    schema: Arc<Schema>,
    path: PathBuf,
}

impl RecordEncoder {
    pub fn create(path: &Path) -> Result<Self, String> {
        let schema = Arc::new(record_schema());
        let file = File::create(path)
            .map_err(|error| format!("could not create {}: {error}", path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::GZIP(GzipLevel::default()))
            .set_data_page_size_limit(DATA_PAGE_SIZE_BYTES)
            .build();
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props)).map_err(|error| {
            format!("could not open parquet writer for {}: {error}", path.display())
        })?;
        Ok(Self {
            writer,
            schema,
            path: path.to_path_buf(),
        })
    }

    pub fn write(&mut self, records: &[CampaignRecord]) -> Result<(), String> {
        if records.is_empty() {
            return Ok(());
        }
        let batch = build_record_batch(self.schema.clone(), records)
            .map_err(|error| format!("could not build record batch: {error}"))?;
        self.writer
            .write(&batch)
            .map_err(|error| format!("could not write record batch: {error}"))?;
        if self.writer.in_progress_size() >= ROW_GROUP_TARGET_BYTES {
            self.writer
                .flush()
                .map_err(|error| format!("could not flush row group: {error}"))?;
        }
        Ok(())
    }

    pub fn close(self) -> Result<PathBuf, String> {
        let Self { writer, path, .. } = self;
        writer
            .close()
            .map_err(|error| format!("could not close parquet file {}: {error}", path.display()))?;
        Ok(path)
    }
}

pub fn encode_records_to_file(records: &[CampaignRecord], path: &Path) -> Result<(), String> {
    let mut encoder = RecordEncoder::create(path)?;
    encoder.write(records)?;
    encoder.close().map(|_| ())
}

fn record_schema() -> Schema {
    Schema::new(vec![
        Field::new("campaign_id", DataType::Int64, false),
        Field::new("event_date", DataType::Utf8, false),
        Field::new("channel", DataType::Utf8, false),
        Field::new("impressions", DataType::Int64, false),
        Field::new("clicks", DataType::Int64, false),
        Field::new("spend", DataType::Float64, false),
    ])
}

fn build_record_batch(
    schema: Arc<Schema>,
    records: &[CampaignRecord],
) -> Result<RecordBatch, arrow::error::ArrowError> {
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(
            records.iter().map(|r| r.campaign_id).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records
                .iter()
                .map(|r| r.event_date.clone())
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records.iter().map(|r| r.channel.clone()).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            records.iter().map(|r| r.impressions).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            records.iter().map(|r| r.clicks).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.spend).collect::<Vec<_>>(),
        )),
    ];
    RecordBatch::try_new(schema, arrays)
}
