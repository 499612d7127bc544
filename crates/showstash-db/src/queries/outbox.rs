//! Outbox job queue operations.
//!
//! Jobs are enqueued in the same transaction as the show row they belong to
//! and are claimed by polling workers. SQLite serializes writers, so a single
//! conditional `UPDATE ... RETURNING` against the oldest pending row is enough
//! to guarantee that exactly one claimant wins a contested job.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use showstash_common::{Error, JobId, JobStatus, Result, ShowId};
use uuid::Uuid;

use crate::models::OutboxJob;

/// Stored error messages are truncated to this many characters.
pub const MAX_ERROR_LEN: usize = 1000;

const JOB_COLUMNS: &str =
    "id, topic, show_id, tmdb_id, status, attempts, locked_at, last_error, created_at";

fn map_job_row(row: &Row) -> rusqlite::Result<OutboxJob> {
    Ok(OutboxJob {
        id: JobId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        topic: row.get(1)?,
        show_id: ShowId::from(Uuid::parse_str(&row.get::<_, String>(2)?).unwrap()),
        tmdb_id: row.get(3)?,
        status: row.get::<_, String>(4)?.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
        })?,
        attempts: row.get(5)?,
        locked_at: row
            .get::<_, Option<String>>(6)?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        last_error: row.get(7)?,
        created_at: row
            .get::<_, String>(8)?
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Truncate an error message to [`MAX_ERROR_LEN`] characters.
pub fn truncate_error(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    message.chars().take(MAX_ERROR_LEN).collect()
}

/// Enqueue a new pending job.
///
/// Takes a plain `&Connection` so callers can enqueue inside the same
/// transaction that writes the show row.
pub fn enqueue(conn: &Connection, topic: &str, show_id: ShowId, tmdb_id: i64) -> Result<OutboxJob> {
    let job = OutboxJob {
        id: JobId::new(),
        topic: topic.to_string(),
        show_id,
        tmdb_id,
        status: JobStatus::Pending,
        attempts: 0,
        locked_at: None,
        last_error: None,
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO outbox_jobs (id, topic, show_id, tmdb_id, status, attempts, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            job.id.to_string(),
            job.topic,
            job.show_id.to_string(),
            job.tmdb_id,
            job.status.to_string(),
            job.attempts,
            job.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(job)
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: JobId) -> Result<Option<OutboxJob>> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM outbox_jobs WHERE id = ?"),
        [id.to_string()],
        map_job_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// List all jobs for a show, newest first.
pub fn jobs_for_show(conn: &Connection, show_id: ShowId) -> Result<Vec<OutboxJob>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM outbox_jobs WHERE show_id = ? ORDER BY created_at DESC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let jobs = stmt
        .query_map([show_id.to_string()], map_job_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(jobs)
}

/// Count pending jobs on a topic.
pub fn count_pending(conn: &Connection, topic: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM outbox_jobs WHERE topic = ? AND status = 'pending'",
        [topic],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Atomically claim the oldest pending job on a topic.
///
/// In one write transaction this moves the job to `running`, stamps
/// `locked_at`, increments `attempts`, clears the previous error, and marks
/// the owning show `running`. Returns `None` when nothing is pending.
pub fn claim_next(conn: &mut Connection, topic: &str) -> Result<Option<OutboxJob>> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| Error::database(e.to_string()))?;

    let claimed = tx
        .query_row(
            &format!(
                "UPDATE outbox_jobs
                 SET status = 'running', locked_at = ?, attempts = attempts + 1, last_error = NULL
                 WHERE id = (
                     SELECT id FROM outbox_jobs
                     WHERE topic = ? AND status = 'pending'
                     ORDER BY created_at ASC, id ASC
                     LIMIT 1
                 )
                 RETURNING {JOB_COLUMNS}"
            ),
            params![Utc::now().to_rfc3339(), topic],
            map_job_row,
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    let Some(job) = claimed else {
        // Nothing pending; drop the transaction without touching anything.
        return Ok(None);
    };

    tx.execute(
        "UPDATE shows SET enrich_state = 'running', enrich_error = NULL WHERE id = ?",
        [job.show_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    Ok(Some(job))
}

/// Mark a running job as done, releasing its lock.
///
/// Takes a plain `&Connection` so the worker can complete the job inside the
/// same transaction that persists the fetched metadata.
pub fn mark_done(conn: &Connection, job_id: JobId) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE outbox_jobs SET status = 'done', locked_at = NULL, last_error = NULL
             WHERE id = ?",
            [job_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::not_found(format!("job {}", job_id)));
    }

    Ok(())
}

/// Mark a job as failed and surface the error on its show.
///
/// The message is truncated to [`MAX_ERROR_LEN`] characters before storage.
/// Both rows move in one transaction so the job and the show never disagree
/// about the failure.
pub fn mark_error(
    conn: &mut Connection,
    job_id: JobId,
    show_id: ShowId,
    message: &str,
) -> Result<()> {
    let message = truncate_error(message);

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| Error::database(e.to_string()))?;

    let affected = tx
        .execute(
            "UPDATE outbox_jobs SET status = 'error', locked_at = NULL, last_error = ?
             WHERE id = ?",
            params![message, job_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::not_found(format!("job {}", job_id)));
    }

    tx.execute(
        "UPDATE shows SET enrich_state = 'error', enrich_error = ? WHERE id = ?",
        params![message, show_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Return running jobs whose lock is older than `max_age` to pending.
///
/// Run at worker startup so jobs orphaned by a crashed process get picked up
/// again instead of staying locked forever. Returns the number of jobs
/// reclaimed.
pub fn reclaim_stale_jobs(conn: &Connection, max_age: Duration) -> Result<usize> {
    let cutoff = Utc::now() - max_age;

    let affected = conn
        .execute(
            "UPDATE outbox_jobs SET status = 'pending', locked_at = NULL
             WHERE status = 'running' AND locked_at IS NOT NULL AND locked_at < ?",
            [cutoff.to_rfc3339()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected)
}
