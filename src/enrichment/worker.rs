//! Polling enrichment worker.
//!
//! The worker claims one job at a time from the outbox, fetches the show's
//! metadata from the configured source, and persists the snapshot in a single
//! transaction. Any failure marks the job (and its show) as errored with the
//! failure message; the job stays errored until someone re-enqueues it.
//!
//! Multiple workers can poll the same database: the claim is a conditional
//! update, so a contested job goes to exactly one of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use showstash_common::Result;
use showstash_db::pool::{self, DbPool};
use showstash_db::queries::{enrichment, outbox};
use tracing::{error, info, warn};

use crate::tmdb::ShowMetadataSource;

use super::TOPIC;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(750);

/// Polling worker for enrichment jobs.
pub struct EnrichmentWorker {
    pool: DbPool,
    source: Arc<dyn ShowMetadataSource>,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
}

impl EnrichmentWorker {
    pub fn new(pool: DbPool, source: Arc<dyn ShowMetadataSource>) -> Self {
        Self {
            pool,
            source,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the idle poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Get a handle that stops the worker loop when set to true.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Return jobs orphaned by a crashed worker to the queue.
    ///
    /// Call once at startup, before polling begins.
    pub fn reclaim_stale(&self, max_age: chrono::Duration) -> Result<usize> {
        let conn = pool::get_conn(&self.pool)?;
        let reclaimed = outbox::reclaim_stale_jobs(&conn, max_age)?;
        if reclaimed > 0 {
            info!(reclaimed, "Returned stale jobs to the queue");
        }
        Ok(reclaimed)
    }

    /// Poll for jobs until the stop signal is set.
    pub async fn run(&self) -> Result<()> {
        info!(
            provider = self.source.name(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Enrichment worker started"
        );

        while !self.stop.load(Ordering::Relaxed) {
            match self.try_process_next().await {
                Ok(true) => {
                    // Drain the queue before sleeping again.
                }
                Ok(false) => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    error!("Worker iteration failed: {}", e);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        info!("Enrichment worker stopped");
        Ok(())
    }

    /// Claim and process at most one job.
    ///
    /// Returns `Ok(true)` if a job was claimed, `Ok(false)` if the queue was
    /// empty. Fetch and persistence failures are recorded on the job rather
    /// than returned, so a bad show cannot wedge the loop.
    pub async fn try_process_next(&self) -> Result<bool> {
        let mut conn = pool::get_conn(&self.pool)?;

        let Some(job) = outbox::claim_next(&mut conn, TOPIC)? else {
            return Ok(false);
        };

        info!(
            job_id = %job.id,
            tmdb_id = job.tmdb_id,
            attempt = job.attempts,
            "Claimed enrichment job"
        );

        match self.source.fetch_show(job.tmdb_id).await {
            Ok(snapshot) => {
                match enrichment::persist_enrichment(&mut conn, job.id, job.show_id, &snapshot) {
                    Ok(()) => {
                        info!(
                            job_id = %job.id,
                            tmdb_id = job.tmdb_id,
                            seasons = snapshot.seasons.len(),
                            cast = snapshot.cast.len(),
                            "Enrichment complete"
                        );
                    }
                    Err(e) => {
                        let message = format_error_message(&e);
                        error!(job_id = %job.id, error = %message, "Failed to persist enrichment");
                        outbox::mark_error(&mut conn, job.id, job.show_id, &message)?;
                    }
                }
            }
            Err(e) => {
                let message = format_error_message(&e);
                warn!(
                    job_id = %job.id,
                    tmdb_id = job.tmdb_id,
                    error = %message,
                    "Enrichment fetch failed"
                );
                outbox::mark_error(&mut conn, job.id, job.show_id, &message)?;
            }
        }

        Ok(true)
    }
}

/// Render an error with its immediate cause, if any.
pub fn format_error_message(err: &dyn std::error::Error) -> String {
    match err.source() {
        Some(cause) => format!("{} (cause: {})", err, cause),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_without_cause() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "plain failure");
        assert_eq!(format_error_message(&err), "plain failure");
    }

    #[test]
    fn format_error_includes_cause() {
        #[derive(Debug)]
        struct Outer(std::io::Error);

        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "outer failed")
            }
        }

        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "inner"));
        assert_eq!(format_error_message(&err), "outer failed (cause: inner)");
    }
}
