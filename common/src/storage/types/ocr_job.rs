use std::time::Duration;

use state_machines::state_machine;
use surrealdb::sql::Datetime as SurrealDatetime;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

pub const MAX_ATTEMPTS: u32 = 3;
/// Row default only; every claim overwrites it with the worker's actual
/// lease, which must exceed the recognition timeout.
pub const DEFAULT_LEASE_SECS: i64 = 180;

/// Job status as exposed to clients. `processing` is the only non-terminal
/// state; terminal states are absorbing until the job is deleted.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// Outcome of a recognition run, carried into the terminal write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done(String),
    Error(String),
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Done(_) => JobStatus::Done,
            JobOutcome::Error(_) => JobStatus::Error,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            JobOutcome::Done(text) | JobOutcome::Error(text) => text,
        }
    }
}

mod lifecycle {
    use super::state_machine;

    state_machine! {
        name: JobStatusMachine,
        initial: Processing,
        states: [Processing, Done, Error],
        events {
            succeed {
                transition: { from: Processing, to: Done }
            }
            fail {
                transition: { from: Processing, to: Error }
            }
        }
    }

    pub(super) fn processing() -> JobStatusMachine<(), Processing> {
        JobStatusMachine::new(())
    }
}

fn invalid_transition(status: &JobStatus, outcome: &JobOutcome) -> AppError {
    AppError::Validation(format!(
        "Invalid job transition: {} -> {}",
        status.as_str(),
        outcome.status().as_str()
    ))
}

/// Validates a terminal transition against the compile-checked state
/// machine. Only `processing -> done` and `processing -> error` exist.
fn compute_terminal(status: &JobStatus, outcome: &JobOutcome) -> Result<JobStatus, AppError> {
    match (status, outcome) {
        (JobStatus::Processing, JobOutcome::Done(_)) => lifecycle::processing()
            .succeed()
            .map(|_| JobStatus::Done)
            .map_err(|_| invalid_transition(status, outcome)),
        (JobStatus::Processing, JobOutcome::Error(_)) => lifecycle::processing()
            .fail()
            .map(|_| JobStatus::Error)
            .map_err(|_| invalid_transition(status, outcome)),
        _ => Err(invalid_transition(status, outcome)),
    }
}

stored_object!(OcrJob, "ocr_job", {
    filename: String,
    status: JobStatus,
    text: Option<String>,
    attempts: u32,
    max_attempts: u32,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    locked_at: Option<chrono::DateTime<chrono::Utc>>,
    worker_id: Option<String>,
    lease_duration_secs: i64
});

impl OcrJob {
    /// New job awaiting recognition by the background worker.
    pub fn processing(original_name: &str) -> Self {
        Self::with_status(original_name, JobStatus::Processing, None)
    }

    /// New job created directly in its terminal state (synchronous mode has
    /// no `processing` window).
    pub fn terminal(original_name: &str, outcome: &JobOutcome) -> Self {
        Self::with_status(
            original_name,
            outcome.status(),
            Some(outcome.text().to_string()),
        )
    }

    fn with_status(original_name: &str, status: JobStatus, text: Option<String>) -> Self {
        let id = Uuid::new_v4().to_string();
        let filename = format!("{}_{}", id, Self::sanitize_file_name(original_name));
        let now = Utc::now();

        Self {
            id,
            created_at: now,
            updated_at: now,
            filename,
            status,
            text,
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
            locked_at: None,
            worker_id: None,
            lease_duration_secs: DEFAULT_LEASE_SECS,
        }
    }

    /// Sanitizes the uploaded file name to prevent directory traversal.
    /// Replaces any non-alphanumeric characters (excluding '_' and the
    /// final extension dot) with underscores.
    pub fn sanitize_file_name(file_name: &str) -> String {
        let map_char = |c: char| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        };
        if let Some(idx) = file_name.rfind('.') {
            let (name, ext) = file_name.split_at(idx);
            let sanitized_name: String = name.chars().map(map_char).collect();
            let sanitized_ext: String = ext
                .chars()
                .map(|c| if c == '.' { c } else { map_char(c) })
                .collect();
            format!("{}{}", sanitized_name, sanitized_ext)
        } else {
            file_name.chars().map(map_char).collect()
        }
    }

    /// Insert the job row. A colliding id is a hard error, never a silent
    /// overwrite.
    pub async fn create(self, db: &SurrealDbClient) -> Result<OcrJob, AppError> {
        let id = self.id.clone();
        match db.store_item(self).await {
            Ok(Some(job)) => Ok(job),
            Ok(None) => Err(AppError::InternalError(format!(
                "Insert of job {} returned no record",
                id
            ))),
            Err(surrealdb::Error::Db(surrealdb::error::Db::RecordExists { .. })) => {
                Err(AppError::DuplicateId(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(db: &SurrealDbClient, id: &str) -> Result<Option<OcrJob>, AppError> {
        Ok(db.get_item::<OcrJob>(id).await?)
    }

    /// All jobs, newest first.
    pub async fn list_all(db: &SurrealDbClient) -> Result<Vec<OcrJob>, AppError> {
        let jobs: Vec<OcrJob> = db
            .query("SELECT * FROM type::table($table) ORDER BY created_at DESC")
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;
        Ok(jobs)
    }

    /// Remove the row, returning it so the caller can delete the blob it
    /// references. Deleting an absent id is a no-op.
    pub async fn delete(db: &SurrealDbClient, id: &str) -> Result<Option<OcrJob>, AppError> {
        Ok(db.delete_item::<OcrJob>(id).await?)
    }

    /// Write the terminal status exactly once.
    ///
    /// The update is conditional on `status = 'processing'`, so of any
    /// number of racing completers exactly one wins. Returns the updated
    /// job for the winner, `None` for losers (row already terminal), and
    /// `NotFound` when the id does not exist at all.
    pub async fn finish(
        db: &SurrealDbClient,
        id: &str,
        outcome: &JobOutcome,
    ) -> Result<Option<OcrJob>, AppError> {
        debug_assert!(compute_terminal(&JobStatus::Processing, outcome).is_ok());

        const FINISH_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $status,
                text = $text,
                updated_at = $now,
                locked_at = NONE,
                worker_id = NONE
            WHERE status = $processing
            RETURN *;
        "#;

        let now = chrono::Utc::now();
        let mut result = db
            .client
            .query(FINISH_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("status", outcome.status().as_str()))
            .bind(("text", outcome.text().to_string()))
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("processing", JobStatus::Processing.as_str()))
            .await?;

        let updated: Option<OcrJob> = result.take(0)?;
        if updated.is_some() {
            return Ok(updated);
        }

        // Distinguish a lost race from a missing row.
        match Self::get(db, id).await? {
            Some(_) => Ok(None),
            None => Err(AppError::NotFound(format!("Job {} does not exist", id))),
        }
    }

    /// Atomically reserve the oldest claimable job for a worker.
    ///
    /// Claimable rows are `processing`, below their attempts budget, and
    /// either never leased or past their lease expiry — a worker crash
    /// therefore re-queues the job instead of stranding it.
    pub async fn claim_next_ready(
        db: &SurrealDbClient,
        worker_id: &str,
        now: chrono::DateTime<chrono::Utc>,
        lease_duration: Duration,
    ) -> Result<Option<OcrJob>, AppError> {
        const CLAIM_QUERY: &str = r#"
            UPDATE (
                SELECT * FROM type::table($table)
                WHERE status = $processing
                  AND attempts < max_attempts
                  AND (
                        locked_at = NONE
                        OR time::unix($now) - time::unix(locked_at) >= lease_duration_secs
                  )
                ORDER BY created_at ASC
                LIMIT 1
            )
            SET attempts = attempts + 1,
                locked_at = $now,
                worker_id = $worker_id,
                lease_duration_secs = $lease_secs,
                updated_at = $now
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(CLAIM_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("processing", JobStatus::Processing.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("worker_id", worker_id.to_string()))
            .bind(("lease_secs", lease_duration.as_secs() as i64))
            .await?;

        let job: Option<OcrJob> = result.take(0)?;
        Ok(job)
    }

    /// Reconciliation sweep: jobs that exhausted their attempts budget and
    /// whose lease has expired become terminal `error` instead of staying
    /// stuck in `processing` forever.
    pub async fn mark_exhausted(
        db: &SurrealDbClient,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<OcrJob>, AppError> {
        const EXHAUST_QUERY: &str = r#"
            UPDATE type::table($table)
            SET status = $error,
                text = $diagnostic,
                updated_at = $now,
                locked_at = NONE,
                worker_id = NONE
            WHERE status = $processing
              AND attempts >= max_attempts
              AND locked_at != NONE
              AND time::unix($now) - time::unix(locked_at) >= lease_duration_secs
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(EXHAUST_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("error", JobStatus::Error.as_str()))
            .bind((
                "diagnostic",
                "Recognition attempts exhausted; the task was repeatedly interrupted".to_string(),
            ))
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("processing", JobStatus::Processing.as_str()))
            .await?;

        let jobs: Vec<OcrJob> = result.take(0)?;
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SurrealDbClient {
        let namespace = "test_ns";
        let database = Uuid::new_v4().to_string();
        SurrealDbClient::memory(namespace, &database)
            .await
            .expect("in-memory surrealdb")
    }

    #[test]
    fn test_terminal_transitions() {
        let done = JobOutcome::Done("text".into());
        let error = JobOutcome::Error("boom".into());

        assert_eq!(
            compute_terminal(&JobStatus::Processing, &done).expect("valid"),
            JobStatus::Done
        );
        assert_eq!(
            compute_terminal(&JobStatus::Processing, &error).expect("valid"),
            JobStatus::Error
        );

        // Terminal states are absorbing.
        assert!(compute_terminal(&JobStatus::Done, &error).is_err());
        assert!(compute_terminal(&JobStatus::Error, &done).is_err());
    }

    #[test]
    fn test_new_job_naming() {
        let job = OcrJob::processing("my scan.png");
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.text.is_none());
        assert_eq!(job.filename, format!("{}_my_scan.png", job.id));
        assert!(job.locked_at.is_none());
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            OcrJob::sanitize_file_name("normal_file.png"),
            "normal_file.png"
        );
        assert_eq!(
            OcrJob::sanitize_file_name("../dangerous.png"),
            "___dangerous.png"
        );
        assert_eq!(
            OcrJob::sanitize_file_name("file with spaces.jpg"),
            "file_with_spaces.jpg"
        );
        assert_eq!(OcrJob::sanitize_file_name("no_extension"), "no_extension");

        // Separators after the last dot must not survive either, or the
        // blob would land in a subdirectory the image route cannot serve.
        assert_eq!(OcrJob::sanitize_file_name("a.b/c"), "a.b_c");
        assert_eq!(OcrJob::sanitize_file_name("scan.p\\ng"), "scan.p_ng");
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = memory_db().await;
        let job = OcrJob::processing("cat.png").create(&db).await.expect("create");

        let fetched = OcrJob::get(&db, &job.id).await.expect("get");
        let fetched = fetched.expect("job exists");
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_create_duplicate_id_is_rejected() {
        let db = memory_db().await;
        let job = OcrJob::processing("cat.png");
        let clone = job.clone();

        job.create(&db).await.expect("first create");
        let second = clone.create(&db).await;
        assert!(matches!(second, Err(AppError::DuplicateId(_))));
    }

    #[tokio::test]
    async fn test_finish_is_exactly_once() {
        let db = memory_db().await;
        let job = OcrJob::processing("cat.png").create(&db).await.expect("create");

        let won = OcrJob::finish(&db, &job.id, &JobOutcome::Done("Hello".into()))
            .await
            .expect("first finish");
        let won = won.expect("first writer wins");
        assert_eq!(won.status, JobStatus::Done);
        assert_eq!(won.text.as_deref(), Some("Hello"));

        // A racing second terminal write loses quietly.
        let lost = OcrJob::finish(&db, &job.id, &JobOutcome::Error("late".into()))
            .await
            .expect("second finish");
        assert!(lost.is_none());

        let current = OcrJob::get(&db, &job.id).await.expect("get").expect("job");
        assert_eq!(current.status, JobStatus::Done);
        assert_eq!(current.text.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_finish_unknown_id_is_not_found() {
        let db = memory_db().await;
        let result = OcrJob::finish(&db, "missing", &JobOutcome::Done("x".into())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sync_job_is_born_terminal() {
        let db = memory_db().await;
        let outcome = JobOutcome::Error("engine rejected the image".into());
        let job = OcrJob::terminal("broken.png", &outcome)
            .create(&db)
            .await
            .expect("create");

        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.text.as_deref(), Some("engine rejected the image"));

        // Born-terminal rows are invisible to the worker queue.
        let claimed =
            OcrJob::claim_next_ready(&db, "w1", chrono::Utc::now(), Duration::from_secs(60))
                .await
                .expect("claim");
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn test_claim_leases_and_increments_attempts() {
        let db = memory_db().await;
        let job = OcrJob::processing("cat.png").create(&db).await.expect("create");

        let now = chrono::Utc::now();
        let claimed = OcrJob::claim_next_ready(&db, "worker-1", now, Duration::from_secs(60))
            .await
            .expect("claim")
            .expect("job claimed");
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.worker_id.as_deref(), Some("worker-1"));
        assert!(claimed.locked_at.is_some());
        // Still `processing` from the client's point of view.
        assert_eq!(claimed.status, JobStatus::Processing);

        // A second worker finds nothing while the lease is live.
        let second = OcrJob::claim_next_ready(&db, "worker-2", now, Duration::from_secs(60))
            .await
            .expect("claim");
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimable() {
        let db = memory_db().await;
        let job = OcrJob::processing("cat.png").create(&db).await.expect("create");

        let start = chrono::Utc::now();
        OcrJob::claim_next_ready(&db, "worker-1", start, Duration::from_secs(5))
            .await
            .expect("claim")
            .expect("claimed");

        // Before expiry the lease holds; after expiry another worker takes over.
        let later = start + chrono::Duration::seconds(6);
        let reclaimed = OcrJob::claim_next_ready(&db, "worker-2", later, Duration::from_secs(5))
            .await
            .expect("claim")
            .expect("reclaimed");
        assert_eq!(reclaimed.id, job.id);
        assert_eq!(reclaimed.attempts, 2);
        assert_eq!(reclaimed.worker_id.as_deref(), Some("worker-2"));
    }

    #[tokio::test]
    async fn test_exhausted_jobs_become_terminal_error() {
        let db = memory_db().await;
        let job = OcrJob::processing("cat.png").create(&db).await.expect("create");

        // Burn through the attempts budget with expiring leases.
        let mut now = chrono::Utc::now();
        for attempt in 1..=MAX_ATTEMPTS {
            let claimed = OcrJob::claim_next_ready(&db, "worker-1", now, Duration::from_secs(1))
                .await
                .expect("claim")
                .expect("claimable");
            assert_eq!(claimed.attempts, attempt);
            now += chrono::Duration::seconds(2);
        }

        let swept = OcrJob::mark_exhausted(&db, now).await.expect("sweep");
        assert_eq!(swept.len(), 1);

        let current = OcrJob::get(&db, &job.id).await.expect("get").expect("job");
        assert_eq!(current.status, JobStatus::Error);
        let diagnostic = current.text.expect("diagnostic text");
        assert!(!diagnostic.is_empty());
    }

    #[tokio::test]
    async fn test_list_all_is_newest_first() {
        let db = memory_db().await;

        let mut first = OcrJob::processing("first.png");
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        let mut second = OcrJob::processing("second.png");
        second.created_at = chrono::Utc::now();

        let first = first.create(&db).await.expect("create first");
        let second = second.create(&db).await.expect("create second");

        let listed = OcrJob::list_all(&db).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed.first().map(|j| j.id.clone()), Some(second.id));
        assert_eq!(listed.get(1).map(|j| j.id.clone()), Some(first.id));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let db = memory_db().await;
        let job = OcrJob::processing("cat.png").create(&db).await.expect("create");

        let removed = OcrJob::delete(&db, &job.id).await.expect("delete");
        assert_eq!(removed.map(|j| j.id), Some(job.id.clone()));

        // Second delete of the same id is a no-op, not an error.
        let again = OcrJob::delete(&db, &job.id).await.expect("delete again");
        assert!(again.is_none());
    }
}
