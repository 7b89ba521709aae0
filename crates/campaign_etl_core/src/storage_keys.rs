//! Object key layout for columnar artifacts.

/// Key of the Parquet artifact produced for one source object.
pub fn records_object_key(base_prefix: &str, run_date: &str, source_stem: &str) -> String {
    let trimmed = base_prefix.trim_matches('/');
    format!("{trimmed}/dataset=campaign_records/run_date={run_date}/{source_stem}.parquet")
}

/// File-name stem of a source object key: final path segment, extension
/// dropped. Falls back to `records` for keys with no usable name.
pub fn source_stem(object_key: &str) -> String {
    let name = object_key.rsplit('/').next().unwrap_or(object_key);
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(index) => &name[..index],
    };
    if stem.is_empty() {
        "records".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_key_is_partitioned_by_dataset_and_run_date() {
        let key = records_object_key("campaign-etl/outcomes/", "2020-01-01", "daily");
        assert_eq!(
            key,
            "campaign-etl/outcomes/dataset=campaign_records/run_date=2020-01-01/daily.parquet"
        );
    }

    #[test]
    fn stem_drops_path_and_extension() {
        assert_eq!(source_stem("incoming/2020/daily.json"), "daily");
        assert_eq!(source_stem("daily.json.gz"), "daily.json");
        assert_eq!(source_stem("no-extension"), "no-extension");
    }

    #[test]
    fn unusable_names_fall_back() {
        assert_eq!(source_stem("incoming/"), "records");
        assert_eq!(source_stem(""), "records");
    }
}
