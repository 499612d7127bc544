//! TMDB API response types (private).

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct TvDetail {
    pub id: i64,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub seasons: Vec<SeasonSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeasonSummary {
    pub season_number: i64,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub episode_count: Option<i64>,
    pub air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeasonDetail {
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub air_date: Option<String>,
    #[serde(default)]
    pub episodes: Vec<EpisodeEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EpisodeEntry {
    pub episode_number: i64,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub still_path: Option<String>,
    pub air_date: Option<String>,
    pub runtime: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreditsBlock {
    #[serde(default)]
    pub cast: Vec<CastEntry>,
    #[serde(default)]
    pub crew: Vec<CrewEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CastEntry {
    pub id: i64,
    pub name: Option<String>,
    pub profile_path: Option<String>,
    pub character: Option<String>,
    pub order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CrewEntry {
    pub id: i64,
    pub name: Option<String>,
    pub profile_path: Option<String>,
    pub job: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchEntry {
    pub id: i64,
    pub name: Option<String>,
    pub first_air_date: Option<String>,
    pub overview: Option<String>,
}
