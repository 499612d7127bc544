//! Show query operations.
//!
//! Reads and upserts for shows plus read access to the denormalized
//! season/episode/credit rows owned by a show. The child rows themselves are
//! only ever written by [`crate::queries::enrichment::persist_enrichment`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use showstash_common::{
    CreditId, EnrichState, EpisodeId, Error, PersonId, Result, SeasonId, ShowId,
};
use uuid::Uuid;

use crate::models::{Credit, Episode, Person, Season, Show};

const SHOW_COLUMNS: &str =
    "id, tmdb_id, name, overview, poster_path, enrich_state, enrich_error, enriched_at";

fn map_show_row(row: &Row) -> rusqlite::Result<Show> {
    Ok(Show {
        id: ShowId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        tmdb_id: row.get(1)?,
        name: row.get(2)?,
        overview: row.get(3)?,
        poster_path: row.get(4)?,
        enrich_state: row.get::<_, String>(5)?.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
        })?,
        enrich_error: row.get(6)?,
        enriched_at: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

/// Insert or fully replace a show row by primary key.
pub fn upsert_show(conn: &Connection, show: &Show) -> Result<()> {
    conn.execute(
        "INSERT INTO shows (id, tmdb_id, name, overview, poster_path, enrich_state, enrich_error, enriched_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
             tmdb_id = excluded.tmdb_id,
             name = excluded.name,
             overview = excluded.overview,
             poster_path = excluded.poster_path,
             enrich_state = excluded.enrich_state,
             enrich_error = excluded.enrich_error,
             enriched_at = excluded.enriched_at",
        params![
            show.id.to_string(),
            show.tmdb_id,
            show.name,
            show.overview,
            show.poster_path,
            show.enrich_state.to_string(),
            show.enrich_error,
            show.enriched_at.map(|dt| dt.to_rfc3339()),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Get a show by ID.
pub fn get_show(conn: &Connection, id: ShowId) -> Result<Option<Show>> {
    conn.query_row(
        &format!("SELECT {SHOW_COLUMNS} FROM shows WHERE id = ?"),
        [id.to_string()],
        map_show_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Get a show by its external TMDB id.
pub fn get_show_by_tmdb_id(conn: &Connection, tmdb_id: i64) -> Result<Option<Show>> {
    conn.query_row(
        &format!("SELECT {SHOW_COLUMNS} FROM shows WHERE tmdb_id = ?"),
        [tmdb_id],
        map_show_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// List all shows, most recently enriched first.
pub fn list_shows(conn: &Connection) -> Result<Vec<Show>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SHOW_COLUMNS} FROM shows ORDER BY enriched_at DESC, name ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let shows = stmt
        .query_map([], map_show_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(shows)
}

fn map_season_row(row: &Row) -> rusqlite::Result<Season> {
    Ok(Season {
        id: SeasonId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        show_id: ShowId::from(Uuid::parse_str(&row.get::<_, String>(1)?).unwrap()),
        season_number: row.get(2)?,
        name: row.get(3)?,
        overview: row.get(4)?,
        poster_path: row.get(5)?,
        episode_count: row.get(6)?,
        air_date: row.get(7)?,
    })
}

/// List a show's seasons in season-number order.
pub fn seasons_for_show(conn: &Connection, show_id: ShowId) -> Result<Vec<Season>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, show_id, season_number, name, overview, poster_path, episode_count, air_date
             FROM seasons WHERE show_id = ? ORDER BY season_number ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let seasons = stmt
        .query_map([show_id.to_string()], map_season_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(seasons)
}

fn map_episode_row(row: &Row) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: EpisodeId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        season_id: SeasonId::from(Uuid::parse_str(&row.get::<_, String>(1)?).unwrap()),
        episode_number: row.get(2)?,
        name: row.get(3)?,
        overview: row.get(4)?,
        still_path: row.get(5)?,
        air_date: row.get(6)?,
        runtime: row.get(7)?,
    })
}

/// List a season's episodes in episode-number order.
pub fn episodes_for_season(conn: &Connection, season_id: SeasonId) -> Result<Vec<Episode>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, season_id, episode_number, name, overview, still_path, air_date, runtime
             FROM episodes WHERE season_id = ? ORDER BY episode_number ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let episodes = stmt
        .query_map([season_id.to_string()], map_episode_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(episodes)
}

/// Count all episodes belonging to a show, across all of its seasons.
pub fn count_episodes_for_show(conn: &Connection, show_id: ShowId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM episodes
         WHERE season_id IN (SELECT id FROM seasons WHERE show_id = ?)",
        [show_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

fn map_credit_row(row: &Row) -> rusqlite::Result<Credit> {
    Ok(Credit {
        id: CreditId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        show_id: ShowId::from(Uuid::parse_str(&row.get::<_, String>(1)?).unwrap()),
        person_id: PersonId::from(Uuid::parse_str(&row.get::<_, String>(2)?).unwrap()),
        kind: row.get::<_, String>(3)?.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?,
        character: row.get(4)?,
        job: row.get(5)?,
        department: row.get(6)?,
        order_index: row.get(7)?,
    })
}

/// List a show's credits, cast first in billing order.
pub fn credits_for_show(conn: &Connection, show_id: ShowId) -> Result<Vec<Credit>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, show_id, person_id, kind, character, job, department, order_index
             FROM credits WHERE show_id = ?
             ORDER BY kind ASC, order_index ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let credits = stmt
        .query_map([show_id.to_string()], map_credit_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(credits)
}

/// Look up a person by their external TMDB person id.
pub fn get_person_by_tmdb_id(conn: &Connection, tmdb_person_id: i64) -> Result<Option<Person>> {
    conn.query_row(
        "SELECT id, tmdb_person_id, name, profile_path FROM people WHERE tmdb_person_id = ?",
        [tmdb_person_id],
        |row| {
            Ok(Person {
                id: PersonId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
                tmdb_person_id: row.get(1)?,
                name: row.get(2)?,
                profile_path: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{init_memory_pool, PooledConnection};

    fn setup_test_db() -> PooledConnection {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    fn test_show(tmdb_id: i64) -> Show {
        Show {
            id: ShowId::new(),
            tmdb_id,
            name: "Test Show".to_string(),
            overview: None,
            poster_path: None,
            enrich_state: EnrichState::Queued,
            enrich_error: None,
            enriched_at: None,
        }
    }

    #[test]
    fn test_upsert_and_get_show() {
        let conn = setup_test_db();
        let show = test_show(1399);

        upsert_show(&conn, &show).unwrap();
        let fetched = get_show(&conn, show.id).unwrap().unwrap();
        assert_eq!(fetched, show);

        let by_tmdb = get_show_by_tmdb_id(&conn, 1399).unwrap().unwrap();
        assert_eq!(by_tmdb.id, show.id);
    }

    #[test]
    fn test_upsert_show_replaces_fields() {
        let conn = setup_test_db();
        let mut show = test_show(42);
        upsert_show(&conn, &show).unwrap();

        show.name = "Renamed".to_string();
        show.enrich_state = EnrichState::Ready;
        show.enriched_at = Some(Utc::now());
        upsert_show(&conn, &show).unwrap();

        let fetched = get_show(&conn, show.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Renamed");
        assert_eq!(fetched.enrich_state, EnrichState::Ready);
        assert!(fetched.enriched_at.is_some());
    }

    #[test]
    fn test_get_missing_show() {
        let conn = setup_test_db();
        assert!(get_show(&conn, ShowId::new()).unwrap().is_none());
        assert!(get_show_by_tmdb_id(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn test_list_shows() {
        let conn = setup_test_db();
        upsert_show(&conn, &test_show(1)).unwrap();
        upsert_show(&conn, &test_show(2)).unwrap();

        let shows = list_shows(&conn).unwrap();
        assert_eq!(shows.len(), 2);
    }

    #[test]
    fn test_corrupt_enrich_state_is_reported() {
        let conn = setup_test_db();
        let show = test_show(8);
        upsert_show(&conn, &show).unwrap();

        conn.execute(
            "UPDATE shows SET enrich_state = 'bogus' WHERE id = ?",
            [show.id.to_string()],
        )
        .unwrap();

        let result = get_show(&conn, show.id);
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[test]
    fn test_corrupt_credit_kind_is_reported() {
        let conn = setup_test_db();
        let show = test_show(9);
        upsert_show(&conn, &show).unwrap();

        let person_id = PersonId::new();
        conn.execute(
            "INSERT INTO people (id, tmdb_person_id, name) VALUES (?, ?, ?)",
            params![person_id.to_string(), 22970, "Peter Dinklage"],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO credits (id, show_id, person_id, kind, order_index)
             VALUES (?, ?, ?, 'bogus', 0)",
            params![
                CreditId::new().to_string(),
                show.id.to_string(),
                person_id.to_string()
            ],
        )
        .unwrap();

        let result = credits_for_show(&conn, show.id);
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[test]
    fn test_child_reads_empty_for_new_show() {
        let conn = setup_test_db();
        let show = test_show(7);
        upsert_show(&conn, &show).unwrap();

        assert!(seasons_for_show(&conn, show.id).unwrap().is_empty());
        assert!(credits_for_show(&conn, show.id).unwrap().is_empty());
        assert_eq!(count_episodes_for_show(&conn, show.id).unwrap(), 0);
    }
}
