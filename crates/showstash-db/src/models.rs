//! Rust models matching the database schema.
//!
//! Two families of types live here: row models read back from the database
//! (`Show`, `Season`, ...) and snapshot types (`EnrichedShow`, ...) that carry
//! one fully fetched set of remote metadata into the persistence layer. The
//! snapshot types are the strongly-typed side of the parse-and-validate
//! boundary: every field the remote API may omit is an `Option`, never an
//! empty-string sentinel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use showstash_common::{
    CreditId, CreditKind, EnrichState, EpisodeId, JobId, JobStatus, PersonId, SeasonId, ShowId,
};

/// Show row model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Show {
    pub id: ShowId,
    pub tmdb_id: i64,
    pub name: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub enrich_state: EnrichState,
    pub enrich_error: Option<String>,
    pub enriched_at: Option<DateTime<Utc>>,
}

/// Season row model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Season {
    pub id: SeasonId,
    pub show_id: ShowId,
    pub season_number: i64,
    pub name: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub episode_count: Option<i64>,
    pub air_date: Option<String>,
}

/// Episode row model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    pub id: EpisodeId,
    pub season_id: SeasonId,
    pub episode_number: i64,
    pub name: String,
    pub overview: Option<String>,
    pub still_path: Option<String>,
    pub air_date: Option<String>,
    pub runtime: Option<i64>,
}

/// Person row model. Global and deduplicated by TMDB person id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: PersonId,
    pub tmdb_person_id: i64,
    pub name: String,
    pub profile_path: Option<String>,
}

/// Credit row model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credit {
    pub id: CreditId,
    pub show_id: ShowId,
    pub person_id: PersonId,
    pub kind: CreditKind,
    pub character: Option<String>,
    pub job: Option<String>,
    pub department: Option<String>,
    pub order_index: Option<i64>,
}

/// Outbox job row model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboxJob {
    pub id: JobId,
    pub topic: String,
    pub show_id: ShowId,
    pub tmdb_id: i64,
    pub status: JobStatus,
    pub attempts: i64,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Enrichment snapshots
// ---------------------------------------------------------------------------

/// One fully fetched set of remote metadata for a show, ready to be
/// persisted in a single transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedShow {
    pub name: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub seasons: Vec<SeasonSnapshot>,
    pub cast: Vec<CastCredit>,
    pub crew: Vec<CrewCredit>,
}

/// A season with its episodes as fetched from the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonSnapshot {
    pub season_number: i64,
    pub name: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub episode_count: Option<i64>,
    pub air_date: Option<String>,
    pub episodes: Vec<EpisodeSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSnapshot {
    pub episode_number: i64,
    pub name: String,
    pub overview: Option<String>,
    pub still_path: Option<String>,
    pub air_date: Option<String>,
    pub runtime: Option<i64>,
}

/// Reference to a person as it appears in remote credits.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRef {
    pub tmdb_person_id: i64,
    pub name: String,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastCredit {
    pub person: PersonRef,
    pub character: Option<String>,
    pub order_index: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrewCredit {
    pub person: PersonRef,
    pub job: Option<String>,
    pub department: Option<String>,
}
