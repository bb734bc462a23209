use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::{
    error::AppError,
    storage::{
        blob::BlobStorage,
        db::SurrealDbClient,
        types::ocr_job::{JobOutcome, JobStatus, OcrJob},
    },
    utils::config::AppConfig,
};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::recognizer::{RecognitionError, TextRecognizer};

/// Slack added on top of the recognition timeout when leasing a claim, so
/// a run that uses its full timeout still finishes inside its lease.
const LEASE_MARGIN: Duration = Duration::from_secs(60);

/// The job lifecycle manager.
///
/// One shared instance serves both submission modes, the polling queries
/// and the admin operations; the synchronous and deferred paths differ only
/// in where recognition runs and which row shape gets inserted.
pub struct JobLifecycle {
    db: Arc<SurrealDbClient>,
    blobs: BlobStorage,
    recognizer: Arc<dyn TextRecognizer>,
    recognition_timeout: Duration,
}

impl JobLifecycle {
    pub fn new(
        db: Arc<SurrealDbClient>,
        blobs: BlobStorage,
        recognizer: Arc<dyn TextRecognizer>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            blobs,
            recognizer,
            recognition_timeout: Duration::from_secs(config.recognition_timeout_secs),
        }
    }

    pub fn db(&self) -> &Arc<SurrealDbClient> {
        &self.db
    }

    pub fn blobs(&self) -> &BlobStorage {
        &self.blobs
    }

    /// Lease length for claimed jobs. Always longer than the recognition
    /// timeout, otherwise a live run would be reclaimed mid-flight and
    /// recognized twice.
    pub fn lease_duration(&self) -> Duration {
        self.recognition_timeout.saturating_add(LEASE_MARGIN)
    }

    /// Deferred submission: persist the blob and a `processing` row, then
    /// return immediately. The worker loop picks the job up from the table.
    ///
    /// The blob is written before the row becomes visible, so a stored row
    /// always references a readable blob.
    pub async fn submit_deferred(
        &self,
        original_name: &str,
        bytes: Bytes,
    ) -> Result<OcrJob, AppError> {
        let job = OcrJob::processing(original_name);
        self.blobs.put(&job.filename, bytes).await?;
        let job = job.create(&self.db).await?;
        info!(job_id = %job.id, filename = %job.filename, "deferred job submitted");
        Ok(job)
    }

    /// Synchronous submission: recognition runs inline and the row is
    /// inserted already terminal, so there is no `processing` window.
    pub async fn submit_sync(&self, original_name: &str, bytes: Bytes) -> Result<OcrJob, AppError> {
        let outcome = self.recognize_outcome(&bytes).await;
        let job = OcrJob::terminal(original_name, &outcome);
        self.blobs.put(&job.filename, bytes).await?;
        let job = job.create(&self.db).await?;
        info!(job_id = %job.id, status = job.status.as_str(), "sync job completed");
        Ok(job)
    }

    /// Status query. `None` means the id is unknown; never an error.
    pub async fn get_status(&self, id: &str) -> Result<Option<JobStatus>, AppError> {
        Ok(OcrJob::get(&self.db, id).await?.map(|job| job.status))
    }

    /// Result query. `None` means the id is unknown; `text` stays `None`
    /// while the job is still `processing`.
    pub async fn get_result(&self, id: &str) -> Result<Option<OcrJob>, AppError> {
        OcrJob::get(&self.db, id).await
    }

    /// Admin listing, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<OcrJob>, AppError> {
        OcrJob::list_all(&self.db).await
    }

    /// Bulk delete. Per id: remove the row first (so no reader can resolve
    /// a row whose blob is gone), then the blob, best-effort. Unknown ids
    /// are skipped; the batch always runs to the end. Returns how many jobs
    /// were actually removed.
    pub async fn delete_jobs(&self, ids: &[String]) -> Result<usize, AppError> {
        let mut removed = 0_usize;
        for id in ids {
            match OcrJob::delete(&self.db, id).await? {
                Some(job) => {
                    if let Err(err) = self.blobs.delete(&job.filename).await {
                        warn!(job_id = %id, error = %err, "failed to delete blob for removed job");
                    }
                    removed = removed.saturating_add(1);
                }
                None => {
                    debug!(job_id = %id, "delete skipped unknown job id");
                }
            }
        }
        Ok(removed)
    }

    /// Worker path for a claimed job: read the blob, recognize under the
    /// timeout, and write the terminal status exactly once. Every fault is
    /// converted into a terminal `error`; nothing propagates out of the
    /// background task except store-level failures (which leave the lease
    /// to expire and the claim to be retried).
    pub async fn process_claimed(&self, job: OcrJob) -> Result<(), AppError> {
        let outcome = match self.blobs.get(&job.filename).await {
            Ok(bytes) => self.recognize_outcome(&bytes).await,
            Err(err) => JobOutcome::Error(format!(
                "Failed to read stored image {}: {}",
                job.filename, err
            )),
        };

        match OcrJob::finish(&self.db, &job.id, &outcome).await? {
            Some(finished) => {
                info!(
                    job_id = %finished.id,
                    status = finished.status.as_str(),
                    "job reached terminal status"
                );
            }
            None => {
                debug!(job_id = %job.id, "terminal status already written, skipping");
            }
        }
        Ok(())
    }

    async fn recognize_outcome(&self, bytes: &[u8]) -> JobOutcome {
        match timeout(self.recognition_timeout, self.recognizer.recognize(bytes)).await {
            Ok(Ok(text)) => JobOutcome::Done(text),
            Ok(Err(err)) => JobOutcome::Error(err.to_string()),
            Err(_) => JobOutcome::Error(
                RecognitionError::Timeout(self.recognition_timeout.as_secs()).to_string(),
            ),
        }
    }
}
