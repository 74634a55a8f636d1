//! CSV-backed record store.
//!
//! The input file is both the job queue and the durable checkpoint:
//! every `write_result` rewrites the whole file through a temp-file
//! rename, so a crash mid-run loses at most the in-flight record and a
//! rerun resumes from the first row without a result.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use harvest_core::error::HarvestError;
use harvest_core::record::{RecordResult, StatusCounts, TargetRecord};
use harvest_core::traits::RecordStore;

#[derive(Debug)]
pub struct CsvRecordStore {
    path: PathBuf,
    rows: Mutex<Vec<TargetRecord>>,
}

impl CsvRecordStore {
    /// Load every row up front. Row order is preserved for the life of
    /// the store; output stays aligned 1:1 with input.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut reader = csv::Reader::from_reader(file);
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<TargetRecord>, csv::Error>>()?;

        tracing::info!(path = %path.display(), rows = rows.len(), "Loaded record list");

        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    /// Rewrite the whole file and fsync before renaming over the
    /// original, so the checkpoint on disk is never half-written.
    fn persist(&self, rows: &[TargetRecord]) -> Result<(), HarvestError> {
        let tmp = self.path.with_extension("csv.tmp");

        let file = File::create(&tmp)?;
        let mut writer = csv::Writer::from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| HarvestError::StoreError(format!("flush failed: {e}")))?;
        file.sync_all()?;

        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RecordStore for CsvRecordStore {
    async fn next_pending(&self) -> Result<Option<(usize, TargetRecord)>, HarvestError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .enumerate()
            .find(|(_, r)| !r.status().is_terminal())
            .map(|(i, r)| (i, r.clone())))
    }

    async fn write_result(&self, index: usize, result: &RecordResult) -> Result<(), HarvestError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(index)
            .ok_or_else(|| HarvestError::StoreError(format!("no row at index {index}")))?;
        row.apply(result);
        self.persist(&rows)
    }

    async fn counts(&self) -> Result<StatusCounts, HarvestError> {
        Ok(StatusCounts::tally(self.rows.lock().unwrap().iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::record::{ProfilePayload, RecordStatus};

    const SAMPLE: &str = "\
first_name,last_name,geo,prooflink,IP change,result
,,,https://www.example.com/in/ada,,
,,,https://www.example.com/in/bob,,
,,,https://www.example.com/in/cleo,,
";

    /// Input files from the original tooling do not carry the result
    /// column yet.
    const SAMPLE_WITHOUT_RESULT: &str = "\
first_name,last_name,geo,prooflink,IP change
,,,https://www.example.com/in/ada,
";

    fn store_with(content: &str) -> (tempfile::TempDir, CsvRecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.csv");
        std::fs::write(&path, content).unwrap();
        (dir, CsvRecordStore::open(&path).unwrap())
    }

    fn done(payload_name: &str) -> RecordResult {
        RecordResult::Done {
            payload: ProfilePayload {
                full_name: payload_name.to_string(),
                location: "Somewhere".to_string(),
            },
            rotated: false,
        }
    }

    #[tokio::test]
    async fn test_next_pending_returns_rows_in_input_order() {
        let (_dir, store) = store_with(SAMPLE);

        let (idx, rec) = store.next_pending().await.unwrap().unwrap();
        assert_eq!(idx, 0);
        assert_eq!(rec.prooflink, "https://www.example.com/in/ada");

        store.write_result(0, &done("Ada Lovelace")).await.unwrap();

        let (idx, rec) = store.next_pending().await.unwrap().unwrap();
        assert_eq!(idx, 1);
        assert_eq!(rec.prooflink, "https://www.example.com/in/bob");
    }

    #[tokio::test]
    async fn test_exhausted_when_all_rows_terminal() {
        let (_dir, store) = store_with(SAMPLE);
        for i in 0..3 {
            store.write_result(i, &done("X Y")).await.unwrap();
        }
        assert!(store.next_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_result_is_durable_before_next_pull() {
        let (dir, store) = store_with(SAMPLE);
        store.write_result(0, &done("Ada Lovelace")).await.unwrap();

        // A fresh store over the same file sees the checkpoint.
        let reopened = CsvRecordStore::open(dir.path().join("targets.csv")).unwrap();
        let (idx, _) = reopened.next_pending().await.unwrap().unwrap();
        assert_eq!(idx, 1);

        let counts = reopened.counts().await.unwrap();
        assert_eq!(counts.done, 1);
        assert_eq!(counts.pending, 2);
    }

    #[tokio::test]
    async fn test_row_order_and_count_preserved_across_writes() {
        let (dir, store) = store_with(SAMPLE);
        store.write_result(1, &done("Bob Dylan")).await.unwrap();

        let reopened = CsvRecordStore::open(dir.path().join("targets.csv")).unwrap();
        let mut links = Vec::new();
        loop {
            // Drain by marking each pending row failed so order is visible.
            match reopened.next_pending().await.unwrap() {
                Some((i, rec)) => {
                    links.push(rec.prooflink.clone());
                    reopened
                        .write_result(
                            i,
                            &RecordResult::Failed {
                                reason: "test".into(),
                            },
                        )
                        .await
                        .unwrap();
                }
                None => break,
            }
        }
        assert_eq!(
            links,
            [
                "https://www.example.com/in/ada",
                "https://www.example.com/in/cleo",
            ]
        );

        let counts = reopened.counts().await.unwrap();
        assert_eq!(counts.done + counts.failed + counts.pending, 3);
    }

    #[tokio::test]
    async fn test_rerun_leaves_done_rows_untouched() {
        let (dir, store) = store_with(SAMPLE);
        store.write_result(0, &done("Ada Lovelace")).await.unwrap();

        let reopened = CsvRecordStore::open(dir.path().join("targets.csv")).unwrap();
        let before = reopened.rows.lock().unwrap()[0].clone();
        drop(reopened);

        // Another pass writing a different row must not alter row 0.
        let again = CsvRecordStore::open(dir.path().join("targets.csv")).unwrap();
        again.write_result(2, &done("Cleo Patra")).await.unwrap();
        let after = again.rows.lock().unwrap()[0].clone();
        assert_eq!(before, after);
        assert_eq!(after.status(), RecordStatus::Done);
        assert_eq!(after.first_name, "Ada");
    }

    #[tokio::test]
    async fn test_input_without_result_column_loads_as_pending() {
        let (_dir, store) = store_with(SAMPLE_WITHOUT_RESULT);
        let counts = store.counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.done, 0);
    }

    #[tokio::test]
    async fn test_result_column_appended_on_first_write() {
        let (dir, store) = store_with(SAMPLE_WITHOUT_RESULT);
        store.write_result(0, &done("Ada Lovelace")).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("targets.csv")).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(header, "first_name,last_name,geo,prooflink,IP change,result");
        assert!(content.lines().nth(1).unwrap().ends_with(",done"));
    }

    #[test]
    fn test_open_missing_file_is_an_error() {
        let err = CsvRecordStore::open("/nonexistent/targets.csv").unwrap_err();
        assert!(matches!(err, HarvestError::IoError(_)));
    }
}
