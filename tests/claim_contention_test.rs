//! Concurrent claim tests: a contested job must go to exactly one claimant.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use showstash::enrichment::{request_enrichment, EnqueueOutcome, TOPIC};
use showstash_db::pool::{init_pool, DbPool};
use showstash_db::queries::outbox;

fn file_pool(dir: &tempfile::TempDir) -> DbPool {
    let db_path = dir.path().join("contention.db");
    init_pool(&db_path.to_string_lossy()).unwrap()
}

fn queue_jobs(pool: &DbPool, count: i64) {
    let mut conn = pool.get().unwrap();
    for tmdb_id in 1..=count {
        match request_enrichment(&mut conn, tmdb_id, None, false).unwrap() {
            EnqueueOutcome::Queued { .. } => {}
            EnqueueOutcome::Skipped { .. } => panic!("expected a queued job"),
        }
    }
}

#[test]
fn single_job_goes_to_one_claimant() {
    let dir = tempfile::tempdir().unwrap();
    let pool = Arc::new(file_pool(&dir));
    queue_jobs(&pool, 1);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                outbox::claim_next(&mut conn, TOPIC).unwrap()
            })
        })
        .collect();

    let claims: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .flatten()
        .collect();

    assert_eq!(claims.len(), 1, "exactly one claimant should win");
    assert_eq!(claims[0].attempts, 1);
}

#[test]
fn concurrent_workers_drain_queue_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let pool = Arc::new(file_pool(&dir));
    queue_jobs(&pool, 20);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                let mut claimed = Vec::new();
                while let Some(job) = outbox::claim_next(&mut conn, TOPIC).unwrap() {
                    claimed.push(job.id);
                }
                claimed
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().unwrap());
    }

    assert_eq!(all.len(), 20, "every job claimed exactly once");
    let unique: HashSet<_> = all.iter().collect();
    assert_eq!(unique.len(), 20, "no job claimed twice");

    // Queue is empty afterwards.
    let conn = pool.get().unwrap();
    assert_eq!(outbox::count_pending(&conn, TOPIC).unwrap(), 0);
}
