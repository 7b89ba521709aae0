//! Local-to-remote artifact transfer.

use std::fs;
use std::path::Path;

use crate::adapters::object_store::ObjectStore;

/// Size of the known empty-artifact marker; a local file of exactly this
/// size carries no rows and must never reach the store.
pub const EMPTY_ARTIFACT_SIZE_BYTES: u64 = 4;

/// Uploads a local file and removes it. The local file is gone afterwards
/// whether or not the upload went through; an undersized file is removed and
/// rejected without contacting the store.
pub fn upload_file(
    store: &dyn ObjectStore,
    local_path: &Path,
    remote_key: &str,
) -> Result<(), String> {
    let file_name = local_path.display();
    let metadata = fs::metadata(local_path)
        .map_err(|error| format!("could not stat {file_name}: {error}"))?;

    if metadata.len() == EMPTY_ARTIFACT_SIZE_BYTES {
        fs::remove_file(local_path)
            .map_err(|error| format!("could not remove {file_name}: {error}"))?;
        return Err(format!(
            "refusing to upload {file_name}: artifact is {EMPTY_ARTIFACT_SIZE_BYTES} bytes"
        ));
    }

    let body =
        fs::read(local_path).map_err(|error| format!("could not read {file_name}: {error}"))?;
    let outcome = store
        .write_object(remote_key, &body)
        .map_err(|error| format!("could not upload {file_name} to {remote_key}: {error}"));

    if let Err(error) = fs::remove_file(local_path) {
        if outcome.is_ok() {
            return Err(format!("could not remove {file_name}: {error}"));
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<HashMap<String, Vec<u8>>>,
        fail_writes: bool,
    }

    impl RecordingStore {
        fn failing() -> Self {
            Self {
                writes: Mutex::new(HashMap::new()),
                fail_writes: true,
            }
        }

        fn write_count(&self) -> usize {
            self.writes.lock().expect("poisoned mutex").len()
        }

        fn body(&self, key: &str) -> Option<Vec<u8>> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .get(key)
                .cloned()
        }
    }

    impl ObjectStore for RecordingStore {
        fn read_object(&self, key: &str) -> Result<Vec<u8>, String> {
            Err(format!("could not open object {key}: not seeded"))
        }

        fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String> {
            if self.fail_writes {
                return Err("simulated outage".to_string());
            }
            self.writes
                .lock()
                .expect("poisoned mutex")
                .insert(key.to_string(), body.to_vec());
            Ok(())
        }

        fn delete_object(&self, _key: &str) -> Result<(), String> {
            Ok(())
        }
    }

    fn write_artifact(dir: &tempfile::TempDir, name: &str, body: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).expect("artifact should write");
        path
    }

    #[test]
    fn four_byte_artifact_is_rejected_without_contacting_the_store() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = write_artifact(&dir, "empty.parquet", b"PAR1");
        let store = RecordingStore::default();

        let error = upload_file(&store, &path, "outcomes/empty.parquet")
            .expect_err("4-byte artifact should be rejected");

        assert!(error.contains("empty.parquet"));
        assert!(error.contains("4 bytes"));
        assert_eq!(store.write_count(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn upload_sends_the_body_and_removes_the_local_file() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = write_artifact(&dir, "records.parquet", b"PAR1-body-PAR1");
        let store = RecordingStore::default();

        upload_file(&store, &path, "outcomes/records.parquet").expect("upload should succeed");

        assert_eq!(
            store.body("outcomes/records.parquet"),
            Some(b"PAR1-body-PAR1".to_vec())
        );
        assert!(!path.exists());
    }

    #[test]
    fn failed_upload_reports_file_and_cause_and_still_removes_the_file() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = write_artifact(&dir, "records.parquet", b"PAR1-body-PAR1");
        let store = RecordingStore::failing();

        let error = upload_file(&store, &path, "outcomes/records.parquet")
            .expect_err("upload should fail");

        assert!(error.contains("records.parquet"));
        assert!(error.contains("simulated outage"));
        assert!(!path.exists());
    }
}
