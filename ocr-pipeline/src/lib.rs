#![allow(clippy::missing_docs_in_private_items)]

pub mod lifecycle;
pub mod recognizer;

use std::sync::Arc;

use chrono::Utc;
use common::storage::{db::SurrealDbClient, types::ocr_job::OcrJob};
pub use lifecycle::JobLifecycle;
use tokio::time::{sleep, Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Claim-and-process loop for deferred jobs.
///
/// Claims re-lease expired work, so a job survives a crashed worker; the
/// attempts budget plus the exhaustion sweep turns permanently lost work
/// into a terminal `error` instead of leaving it `processing` forever.
pub async fn run_worker_loop(
    db: Arc<SurrealDbClient>,
    lifecycle: Arc<JobLifecycle>,
) -> Result<(), Box<dyn std::error::Error>> {
    let worker_id = format!("ocr-worker-{}", Uuid::new_v4());
    let lease_duration = lifecycle.lease_duration();
    let idle_backoff = Duration::from_millis(500);
    let mut last_sweep = Instant::now();

    info!(%worker_id, "worker loop started");

    loop {
        if last_sweep.elapsed() >= SWEEP_INTERVAL {
            match OcrJob::mark_exhausted(&db, Utc::now()).await {
                Ok(swept) if !swept.is_empty() => {
                    warn!(%worker_id, count = swept.len(), "marked exhausted jobs as error");
                }
                Ok(_) => {}
                Err(err) => error!(%worker_id, error = %err, "exhaustion sweep failed"),
            }
            last_sweep = Instant::now();
        }

        match OcrJob::claim_next_ready(&db, &worker_id, Utc::now(), lease_duration).await {
            Ok(Some(job)) => {
                let job_id = job.id.clone();
                info!(%worker_id, %job_id, attempt = job.attempts, "claimed ocr job");
                if let Err(err) = lifecycle.process_claimed(job).await {
                    error!(%worker_id, %job_id, error = %err, "ocr job processing failed");
                }
            }
            Ok(None) => {
                sleep(idle_backoff).await;
            }
            Err(err) => {
                error!(%worker_id, error = %err, "failed to claim ocr job");
                warn!("Backing off for 1s after claim error");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
