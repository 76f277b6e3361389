//! CSV batch upload
//!
//! The client only checks the file's extension and size before handing it
//! to the submitter; CSV content is parsed server-side.

use std::path::Path;

use crate::error::FormError;
use crate::notify::{Notifier, DEFAULT_DURATION};
use crate::submit::Submitter;
use crate::types::{BatchSummary, Severity};

/// Largest file the batch endpoint accepts (60 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 60 * 1024 * 1024;

/// A file picked for batch scoring
#[derive(Debug, Clone, PartialEq)]
pub struct CsvUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl CsvUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Client-side checks: `.csv` extension, non-empty, at most `max_bytes`.
    pub fn validate(&self, max_bytes: u64) -> Result<(), FormError> {
        let is_csv = Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if !is_csv {
            return Err(FormError::UploadRejected(format!(
                "'{}' is not a CSV file",
                self.file_name
            )));
        }

        if self.bytes.is_empty() {
            return Err(FormError::UploadRejected(format!(
                "'{}' is empty",
                self.file_name
            )));
        }

        if self.size() > max_bytes {
            return Err(FormError::UploadRejected(format!(
                "'{}' is {:.1} MB, the limit is {:.0} MB",
                self.file_name,
                self.size() as f64 / (1024.0 * 1024.0),
                max_bytes as f64 / (1024.0 * 1024.0)
            )));
        }

        Ok(())
    }
}

/// Check `upload`, send it for batch scoring and report the outcome.
pub async fn upload_csv(
    submitter: &dyn Submitter,
    notifier: &dyn Notifier,
    upload: CsvUpload,
    max_bytes: u64,
) -> Result<BatchSummary, FormError> {
    if let Err(e) = upload.validate(max_bytes) {
        tracing::warn!(file = %upload.file_name, "{}", e);
        notifier.notify(&e.to_string(), Severity::Error, DEFAULT_DURATION);
        return Err(e);
    }

    tracing::info!(file = %upload.file_name, bytes = upload.size(), "uploading CSV for batch scoring");
    notifier.notify(
        &format!("Uploading {}...", upload.file_name),
        Severity::Info,
        DEFAULT_DURATION,
    );

    match submitter.submit_batch(upload).await {
        Ok(summary) => {
            tracing::info!(
                total_rows = summary.total_rows,
                success = summary.success_count,
                errors = summary.error_count,
                "batch processed"
            );
            notifier.notify(&summary.headline(), Severity::Success, DEFAULT_DURATION);
            Ok(summary)
        }
        Err(e) => {
            let err = FormError::from(e);
            tracing::error!("batch upload failed: {}", err);
            notifier.notify(&err.to_string(), Severity::Error, DEFAULT_DURATION);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubmissionError;
    use crate::notify::MemoryNotifier;
    use crate::submit::{BatchFuture, SubmissionFuture};
    use crate::types::FeatureValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct BatchStub {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Submitter for BatchStub {
        fn submit_values(&self, _values: Vec<FeatureValue>) -> SubmissionFuture {
            Box::pin(async { Err(SubmissionError::Application("unused".to_string())) })
        }

        fn submit_batch(&self, upload: CsvUpload) -> BatchFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(SubmissionError::Application(format!(
                        "{} has no feature columns",
                        upload.file_name
                    )))
                } else {
                    Ok(BatchSummary {
                        total_rows: 3,
                        success_count: 3,
                        error_count: 0,
                        download_url: Some("/download/results.csv".to_string()),
                    })
                }
            })
        }
    }

    fn stub(fail: bool) -> BatchStub {
        BatchStub {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    #[test]
    fn test_extension_check() {
        let upload = CsvUpload::new("signals.txt", b"a,b\n1,2\n".to_vec());
        assert!(matches!(
            upload.validate(DEFAULT_MAX_UPLOAD_BYTES),
            Err(FormError::UploadRejected(_))
        ));

        let upper = CsvUpload::new("SIGNALS.CSV", b"a,b\n1,2\n".to_vec());
        assert!(upper.validate(DEFAULT_MAX_UPLOAD_BYTES).is_ok());

        let bare = CsvUpload::new("csv", b"a".to_vec());
        assert!(bare.validate(DEFAULT_MAX_UPLOAD_BYTES).is_err());
    }

    #[test]
    fn test_size_check() {
        let upload = CsvUpload::new("big.csv", vec![b'1'; 11]);
        assert!(upload.validate(10).is_err());
        assert!(upload.validate(11).is_ok());

        let empty = CsvUpload::new("empty.csv", Vec::new());
        assert!(empty.validate(10).is_err());
    }

    #[tokio::test]
    async fn test_rejected_file_never_reaches_submitter() {
        let submitter = stub(false);
        let notifier = MemoryNotifier::new();

        let result = upload_csv(
            &submitter,
            &notifier,
            CsvUpload::new("notes.xlsx", b"x".to_vec()),
            DEFAULT_MAX_UPLOAD_BYTES,
        )
        .await;

        assert!(matches!(result, Err(FormError::UploadRejected(_))));
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.last().unwrap().severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_successful_upload_surfaces_summary() {
        let submitter = stub(false);
        let notifier = MemoryNotifier::new();

        let summary = upload_csv(
            &submitter,
            &notifier,
            CsvUpload::new("batch.csv", b"mean_0_a\n1.0\n".to_vec()),
            DEFAULT_MAX_UPLOAD_BYTES,
        )
        .await
        .unwrap();

        assert_eq!(summary.total_rows, 3);
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
        let last = notifier.last().unwrap();
        assert_eq!(last.severity, Severity::Success);
        assert_eq!(last.message, "Processed 3 rows (3 ok, 0 failed)");
    }

    #[tokio::test]
    async fn test_application_failure_is_reported() {
        let submitter = stub(true);
        let notifier = MemoryNotifier::new();

        let result = upload_csv(
            &submitter,
            &notifier,
            CsvUpload::new("batch.csv", b"x\n".to_vec()),
            DEFAULT_MAX_UPLOAD_BYTES,
        )
        .await;

        match result {
            Err(FormError::Application(msg)) => assert_eq!(msg, "batch.csv has no feature columns"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(notifier.last().unwrap().message, "batch.csv has no feature columns");
    }
}
