use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sheet::{self, DecodeError, SheetFormat};
use crate::store::{RecordFields, RecordStore, StoreError};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("insert of row {row} failed after {inserted} rows were stored: {source}")]
    Insert {
        // 1-based
        row: usize,
        inserted: usize,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
}

pub struct TempUpload {
    file: Option<NamedTempFile>,
    format: SheetFormat,
}

impl TempUpload {
    pub fn create(dir: &Path, file_name: Option<&str>, bytes: &[u8]) -> std::io::Result<Self> {
        use std::io::Write;

        std::fs::create_dir_all(dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(TempUpload {
            file: Some(file),
            format: SheetFormat::from_file_name(file_name),
        })
    }

    pub fn path(&self) -> &Path {
        match &self.file {
            Some(f) => f.path(),
            None => Path::new(""),
        }
    }

    pub fn format(&self) -> SheetFormat {
        self.format
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        let path = file.path().to_path_buf();
        if let Err(e) = file.close() {
            warn!(path = %path.display(), error = %e, "failed to remove uploaded file");
        }
    }
}

/// Run one import to completion or first failure. Rows are inserted one by
/// one without a transaction, so rows before a failing one stay persisted.
/// The upload is consumed and its file deleted before this returns.
pub fn ingest(store: &dyn RecordStore, upload: TempUpload) -> Result<IngestReport, IngestError> {
    debug!(path = %upload.path().display(), format = ?upload.format(), "decoding upload");
    let rows = sheet::decode_file(upload.path(), upload.format())?;
    insert_rows(store, &rows)
}

fn insert_rows(
    store: &dyn RecordStore,
    rows: &[sheet::DecodedRow],
) -> Result<IngestReport, IngestError> {
    debug!(rows = rows.len(), "inserting decoded rows");
    let mut inserted = 0;
    for (idx, row) in rows.iter().enumerate() {
        let fields = RecordFields::from_row(row);
        store
            .insert(&fields)
            .map_err(|source| IngestError::Insert {
                row: idx + 1,
                inserted,
                source,
            })?;
        inserted += 1;
    }
    info!(inserted, "import completed");
    Ok(IngestReport { inserted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MEMORY_URL;
    use crate::store::{Record, SqliteStore};
    use rust_xlsxwriter::Workbook;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegates to a real store but fails the `fail_at`-th insert (1-based).
    struct FailingStore {
        inner: SqliteStore,
        fail_at: usize,
        calls: AtomicUsize,
    }

    impl RecordStore for FailingStore {
        fn insert(&self, fields: &RecordFields) -> crate::store::Result<Record> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_at {
                return Err(StoreError::Closed);
            }
            self.inner.insert(fields)
        }
        fn find_all(&self) -> crate::store::Result<Vec<Record>> {
            self.inner.find_all()
        }
        fn find_one_exact(&self, name: &str, email: &str) -> crate::store::Result<Option<Record>> {
            self.inner.find_one_exact(name, email)
        }
        fn update_by_id(
            &self,
            id: &str,
            fields: &RecordFields,
        ) -> crate::store::Result<Option<Record>> {
            self.inner.update_by_id(id, fields)
        }
        fn delete_by_id(&self, id: &str) -> crate::store::Result<Option<Record>> {
            self.inner.delete_by_id(id)
        }
        fn delete_by_id_set(&self, ids: &[String]) -> crate::store::Result<usize> {
            self.inner.delete_by_id_set(ids)
        }
        fn count(&self) -> crate::store::Result<usize> {
            self.inner.count()
        }
        fn close(&self) -> crate::store::Result<()> {
            self.inner.close()
        }
    }

    fn roster_xlsx(rows: &[(&str, &str, &str)]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (c, h) in ["name", "email", "course"].iter().enumerate() {
            sheet.write_string(0, c as u16, *h).expect("header");
        }
        for (r, (name, email, course)) in rows.iter().enumerate() {
            let r = r as u32 + 1;
            sheet.write_string(r, 0, *name).expect("name");
            sheet.write_string(r, 1, *email).expect("email");
            sheet.write_string(r, 2, *course).expect("course");
        }
        workbook.save_to_buffer().expect("save")
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).expect("read dir").next().is_none()
    }

    #[test]
    fn inserts_every_row_and_removes_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(MEMORY_URL).expect("store");
        let bytes = roster_xlsx(&[
            ("Ann", "ann@x.com", "Math"),
            ("Bo", "bo@x.com", "Sci"),
            ("Cy", "cy@x.com", "Art"),
        ]);
        let upload = TempUpload::create(dir.path(), Some("roster.xlsx"), &bytes).expect("upload");
        assert!(upload.path().exists());

        let report = ingest(&store, upload).expect("ingest");
        assert_eq!(report.inserted, 3);
        assert!(dir_is_empty(dir.path()));

        let all = store.find_all().expect("find_all");
        let names: Vec<_> = all.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["Ann", "Bo", "Cy"]);
        assert_eq!(all[1].email.as_deref(), Some("bo@x.com"));
        assert_eq!(all[2].course.as_deref(), Some("Art"));
    }

    #[test]
    fn zero_rows_is_a_successful_empty_import() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(MEMORY_URL).expect("store");
        let upload =
            TempUpload::create(dir.path(), Some("empty.xlsx"), &roster_xlsx(&[])).expect("upload");
        let report = ingest(&store, upload).expect("ingest");
        assert_eq!(report.inserted, 0);
        assert_eq!(store.count().expect("count"), 0);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn decode_failure_still_removes_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(MEMORY_URL).expect("store");
        let garbage = [0x00u8, 0x9f, 0x92, 0x96, 0xff, 0xfe];
        let upload = TempUpload::create(dir.path(), Some("bad.xlsx"), &garbage).expect("upload");
        let err = ingest(&store, upload).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
        assert!(dir_is_empty(dir.path()));
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn insert_failure_keeps_earlier_rows_and_abandons_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FailingStore {
            inner: SqliteStore::open(MEMORY_URL).expect("store"),
            fail_at: 3,
            calls: AtomicUsize::new(0),
        };
        let bytes = roster_xlsx(&[
            ("A", "a@x.com", "1"),
            ("B", "b@x.com", "2"),
            ("C", "c@x.com", "3"),
            ("D", "d@x.com", "4"),
        ]);
        let upload = TempUpload::create(dir.path(), None, &bytes).expect("upload");
        match ingest(&store, upload) {
            Err(IngestError::Insert { row, inserted, .. }) => {
                assert_eq!(row, 3);
                assert_eq!(inserted, 2);
            }
            other => panic!("expected insert failure, got {other:?}"),
        }
        assert!(dir_is_empty(dir.path()));

        let names: Vec<_> = store
            .find_all()
            .expect("find_all")
            .into_iter()
            .filter_map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn csv_upload_is_decoded_by_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(MEMORY_URL).expect("store");
        let upload = TempUpload::create(
            dir.path(),
            Some("roster.csv"),
            b"name,email,course\nAnn,ann@x.com,Math\n",
        )
        .expect("upload");
        assert_eq!(upload.format(), SheetFormat::Csv);
        assert_eq!(ingest(&store, upload).expect("ingest").inserted, 1);
        assert!(store
            .find_one_exact("Ann", "ann@x.com")
            .expect("lookup")
            .is_some());
    }

    #[test]
    fn dropping_an_unused_upload_removes_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload = TempUpload::create(dir.path(), None, b"bytes").expect("upload");
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        drop(upload);
        assert!(!path.exists());
    }
}
