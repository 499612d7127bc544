//! Enqueueing enrichment work.
//!
//! The show row and its outbox job are written in one transaction, so a job
//! never exists without its show and a queued show never misses its job.

use rusqlite::{Connection, TransactionBehavior};
use showstash_common::{EnrichState, Error, Result, ShowId};
use showstash_db::models::{OutboxJob, Show};
use showstash_db::queries::{outbox, shows};
use tracing::info;

use super::TOPIC;

/// What `request_enrichment` did.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// A job was queued for the show.
    Queued { show: Show, job: OutboxJob },
    /// The show already has current or in-flight metadata; nothing queued.
    Skipped { show: Show },
}

/// Request enrichment for a TMDB show.
///
/// A job is queued when the show is new, when its last run failed, or when
/// `force` is set. Shows that are queued, running, or ready are left alone
/// otherwise, so repeated requests cannot pile up duplicate work.
pub fn request_enrichment(
    conn: &mut Connection,
    tmdb_id: i64,
    name: Option<&str>,
    force: bool,
) -> Result<EnqueueOutcome> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| Error::database(e.to_string()))?;

    let existing = shows::get_show_by_tmdb_id(&tx, tmdb_id)?;

    if let Some(ref show) = existing {
        if !force && show.enrich_state != EnrichState::Error {
            return Ok(EnqueueOutcome::Skipped { show: show.clone() });
        }
    }

    let show = match existing {
        Some(mut show) => {
            if let Some(name) = name {
                show.name = name.to_string();
            }
            show.enrich_state = EnrichState::Queued;
            show.enrich_error = None;
            show
        }
        None => Show {
            id: ShowId::new(),
            tmdb_id,
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("TMDB {}", tmdb_id)),
            overview: None,
            poster_path: None,
            enrich_state: EnrichState::Queued,
            enrich_error: None,
            enriched_at: None,
        },
    };

    shows::upsert_show(&tx, &show)?;
    let job = outbox::enqueue(&tx, TOPIC, show.id, tmdb_id)?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    info!(tmdb_id, show_id = %show.id, job_id = %job.id, "Queued enrichment");

    Ok(EnqueueOutcome::Queued { show, job })
}
