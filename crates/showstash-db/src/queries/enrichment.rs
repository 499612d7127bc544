//! Persistence of one completed enrichment run.
//!
//! A run replaces the show's denormalized metadata wholesale: existing
//! seasons, episodes, and credits are deleted and the fresh snapshot is
//! inserted, people are upserted by TMDB person id, the show flips to `ready`,
//! and the job completes. All of it happens in a single transaction so readers
//! only ever observe the previous complete state or the new complete state.

use chrono::Utc;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use showstash_common::{CreditId, CreditKind, EpisodeId, Error, JobId, PersonId, Result, SeasonId, ShowId};
use uuid::Uuid;

use crate::models::{EnrichedShow, PersonRef};
use crate::queries::outbox;

/// Persist a fetched metadata snapshot and complete its job atomically.
///
/// If any statement fails the transaction rolls back and the database is left
/// exactly as it was before the call, including the job's `running` status.
pub fn persist_enrichment(
    conn: &mut Connection,
    job_id: JobId,
    show_id: ShowId,
    enriched: &EnrichedShow,
) -> Result<()> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| Error::database(e.to_string()))?;

    replace_show_metadata(&tx, show_id, enriched)?;
    outbox::mark_done(&tx, job_id)?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

fn replace_show_metadata(tx: &Transaction, show_id: ShowId, enriched: &EnrichedShow) -> Result<()> {
    // Episodes first: their FK points at seasons, not the show.
    tx.execute(
        "DELETE FROM episodes WHERE season_id IN (SELECT id FROM seasons WHERE show_id = ?)",
        [show_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    tx.execute(
        "DELETE FROM seasons WHERE show_id = ?",
        [show_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    tx.execute(
        "DELETE FROM credits WHERE show_id = ?",
        [show_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    for season in &enriched.seasons {
        let season_id = SeasonId::new();
        tx.execute(
            "INSERT INTO seasons (id, show_id, season_number, name, overview, poster_path, episode_count, air_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                season_id.to_string(),
                show_id.to_string(),
                season.season_number,
                season.name,
                season.overview,
                season.poster_path,
                season.episode_count,
                season.air_date,
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        for episode in &season.episodes {
            tx.execute(
                "INSERT INTO episodes (id, season_id, episode_number, name, overview, still_path, air_date, runtime)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    EpisodeId::new().to_string(),
                    season_id.to_string(),
                    episode.episode_number,
                    episode.name,
                    episode.overview,
                    episode.still_path,
                    episode.air_date,
                    episode.runtime,
                ],
            )
            .map_err(|e| Error::database(e.to_string()))?;
        }
    }

    for cast in &enriched.cast {
        let person_id = upsert_person(tx, &cast.person)?;
        tx.execute(
            "INSERT INTO credits (id, show_id, person_id, kind, character, job, department, order_index)
             VALUES (?, ?, ?, ?, ?, NULL, NULL, ?)",
            params![
                CreditId::new().to_string(),
                show_id.to_string(),
                person_id.to_string(),
                CreditKind::Cast.to_string(),
                cast.character,
                cast.order_index,
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    }

    for crew in &enriched.crew {
        let person_id = upsert_person(tx, &crew.person)?;
        tx.execute(
            "INSERT INTO credits (id, show_id, person_id, kind, character, job, department, order_index)
             VALUES (?, ?, ?, ?, NULL, ?, ?, NULL)",
            params![
                CreditId::new().to_string(),
                show_id.to_string(),
                person_id.to_string(),
                CreditKind::Crew.to_string(),
                crew.job,
                crew.department,
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    }

    let affected = tx
        .execute(
            "UPDATE shows
             SET name = ?, overview = ?, poster_path = ?,
                 enrich_state = 'ready', enrich_error = NULL, enriched_at = ?
             WHERE id = ?",
            params![
                enriched.name,
                enriched.overview,
                enriched.poster_path,
                Utc::now().to_rfc3339(),
                show_id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::not_found(format!("show {}", show_id)));
    }

    Ok(())
}

/// Insert a person or refresh their name and profile path, keeping the
/// internal id stable across enrichment runs.
fn upsert_person(tx: &Transaction, person: &PersonRef) -> Result<PersonId> {
    let id: String = tx
        .query_row(
            "INSERT INTO people (id, tmdb_person_id, name, profile_path)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (tmdb_person_id) DO UPDATE SET
                 name = excluded.name,
                 profile_path = excluded.profile_path
             RETURNING id",
            params![
                PersonId::new().to_string(),
                person.tmdb_person_id,
                person.name,
                person.profile_path,
            ],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(PersonId::from(Uuid::parse_str(&id).map_err(|e| {
        Error::database(format!("Invalid person id in database: {}", e))
    })?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CastCredit, CrewCredit, EpisodeSnapshot, SeasonSnapshot, Show};
    use crate::pool::{init_memory_pool, DbPool};
    use crate::queries::{outbox, shows};
    use showstash_common::{EnrichState, JobStatus};

    const TOPIC: &str = "tmdb.enrich_show";

    fn setup_test_db() -> DbPool {
        init_memory_pool().unwrap()
    }

    fn seed_show(conn: &Connection, tmdb_id: i64) -> ShowId {
        let show = Show {
            id: ShowId::new(),
            tmdb_id,
            name: format!("Show {}", tmdb_id),
            overview: None,
            poster_path: None,
            enrich_state: EnrichState::Queued,
            enrich_error: None,
            enriched_at: None,
        };
        shows::upsert_show(conn, &show).unwrap();
        show.id
    }

    fn person(tmdb_person_id: i64, name: &str) -> PersonRef {
        PersonRef {
            tmdb_person_id,
            name: name.to_string(),
            profile_path: None,
        }
    }

    fn sample_snapshot() -> EnrichedShow {
        EnrichedShow {
            name: "Game of Thrones".to_string(),
            overview: Some("Seven noble families...".to_string()),
            poster_path: Some("/poster.jpg".to_string()),
            seasons: vec![SeasonSnapshot {
                season_number: 1,
                name: "Season 1".to_string(),
                overview: None,
                poster_path: None,
                episode_count: Some(2),
                air_date: Some("2011-04-17".to_string()),
                episodes: vec![
                    EpisodeSnapshot {
                        episode_number: 1,
                        name: "Winter Is Coming".to_string(),
                        overview: None,
                        still_path: None,
                        air_date: Some("2011-04-17".to_string()),
                        runtime: Some(62),
                    },
                    EpisodeSnapshot {
                        episode_number: 2,
                        name: "The Kingsroad".to_string(),
                        overview: None,
                        still_path: None,
                        air_date: Some("2011-04-24".to_string()),
                        runtime: Some(56),
                    },
                ],
            }],
            cast: vec![CastCredit {
                person: person(22970, "Peter Dinklage"),
                character: Some("Tyrion Lannister".to_string()),
                order_index: 0,
            }],
            crew: vec![CrewCredit {
                person: person(9813, "David Benioff"),
                job: Some("Creator".to_string()),
                department: Some("Writing".to_string()),
            }],
        }
    }

    #[test]
    fn test_persist_enrichment_full_snapshot() {
        let pool = setup_test_db();
        let mut conn = pool.get().unwrap();
        let show_id = seed_show(&conn, 1399);
        let job = outbox::enqueue(&conn, TOPIC, show_id, 1399).unwrap();
        outbox::claim_next(&mut conn, TOPIC).unwrap().unwrap();

        persist_enrichment(&mut conn, job.id, show_id, &sample_snapshot()).unwrap();

        let show = shows::get_show(&conn, show_id).unwrap().unwrap();
        assert_eq!(show.name, "Game of Thrones");
        assert_eq!(show.enrich_state, EnrichState::Ready);
        assert!(show.enrich_error.is_none());
        assert!(show.enriched_at.is_some());

        let seasons = shows::seasons_for_show(&conn, show_id).unwrap();
        assert_eq!(seasons.len(), 1);
        assert_eq!(seasons[0].season_number, 1);

        let episodes = shows::episodes_for_season(&conn, seasons[0].id).unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].name, "Winter Is Coming");

        let credits = shows::credits_for_show(&conn, show_id).unwrap();
        assert_eq!(credits.len(), 2);

        let fetched = outbox::get_job(&conn, job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Done);
        assert!(fetched.locked_at.is_none());
    }

    #[test]
    fn test_persist_replaces_previous_metadata() {
        let pool = setup_test_db();
        let mut conn = pool.get().unwrap();
        let show_id = seed_show(&conn, 1399);

        let first_job = outbox::enqueue(&conn, TOPIC, show_id, 1399).unwrap();
        outbox::claim_next(&mut conn, TOPIC).unwrap().unwrap();
        persist_enrichment(&mut conn, first_job.id, show_id, &sample_snapshot()).unwrap();

        // Second run comes back with one fewer episode and a new credit set.
        let mut second = sample_snapshot();
        second.seasons[0].episodes.truncate(1);
        second.crew.clear();

        let second_job = outbox::enqueue(&conn, TOPIC, show_id, 1399).unwrap();
        outbox::claim_next(&mut conn, TOPIC).unwrap().unwrap();
        persist_enrichment(&mut conn, second_job.id, show_id, &second).unwrap();

        assert_eq!(shows::count_episodes_for_show(&conn, show_id).unwrap(), 1);
        let credits = shows::credits_for_show(&conn, show_id).unwrap();
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].kind, CreditKind::Cast);

        // No duplicate season rows either.
        assert_eq!(shows::seasons_for_show(&conn, show_id).unwrap().len(), 1);
    }

    #[test]
    fn test_persist_keeps_person_ids_stable() {
        let pool = setup_test_db();
        let mut conn = pool.get().unwrap();
        let show_id = seed_show(&conn, 1399);

        let first_job = outbox::enqueue(&conn, TOPIC, show_id, 1399).unwrap();
        outbox::claim_next(&mut conn, TOPIC).unwrap().unwrap();
        persist_enrichment(&mut conn, first_job.id, show_id, &sample_snapshot()).unwrap();

        let before = shows::get_person_by_tmdb_id(&conn, 22970).unwrap().unwrap();

        // Same person comes back with a refreshed profile path.
        let mut second = sample_snapshot();
        second.cast[0].person.profile_path = Some("/dinklage.jpg".to_string());

        let second_job = outbox::enqueue(&conn, TOPIC, show_id, 1399).unwrap();
        outbox::claim_next(&mut conn, TOPIC).unwrap().unwrap();
        persist_enrichment(&mut conn, second_job.id, show_id, &second).unwrap();

        let after = shows::get_person_by_tmdb_id(&conn, 22970).unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.profile_path.as_deref(), Some("/dinklage.jpg"));
    }

    #[test]
    fn test_persist_missing_show_rolls_back() {
        let pool = setup_test_db();
        let mut conn = pool.get().unwrap();
        let show_id = seed_show(&conn, 1399);
        let job = outbox::enqueue(&conn, TOPIC, show_id, 1399).unwrap();
        outbox::claim_next(&mut conn, TOPIC).unwrap().unwrap();

        let result = persist_enrichment(&mut conn, job.id, ShowId::new(), &sample_snapshot());
        assert!(result.is_err());

        // The job must still be running: nothing from the failed run landed.
        let fetched = outbox::get_job(&conn, job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Running);
    }

    #[test]
    fn test_persist_empty_snapshot() {
        let pool = setup_test_db();
        let mut conn = pool.get().unwrap();
        let show_id = seed_show(&conn, 100);
        let job = outbox::enqueue(&conn, TOPIC, show_id, 100).unwrap();
        outbox::claim_next(&mut conn, TOPIC).unwrap().unwrap();

        let snapshot = EnrichedShow {
            name: "Obscure Show".to_string(),
            overview: None,
            poster_path: None,
            seasons: vec![],
            cast: vec![],
            crew: vec![],
        };
        persist_enrichment(&mut conn, job.id, show_id, &snapshot).unwrap();

        let show = shows::get_show(&conn, show_id).unwrap().unwrap();
        assert_eq!(show.enrich_state, EnrichState::Ready);
        assert!(shows::seasons_for_show(&conn, show_id).unwrap().is_empty());
    }
}
