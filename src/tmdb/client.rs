//! TMDB REST API client.
//!
//! Implements [`ShowMetadataSource`] against the TMDB v3 API:
//! - Accepts either a v3 API key (sent as the `api_key` query parameter) or a
//!   v4 read access token (sent as a `Bearer` authorization header), detected
//!   from the credential's shape.
//! - Retries network-level failures up to a configured number of attempts
//!   with a linearly growing delay. Non-2xx responses fail immediately; an
//!   upstream 4xx/5xx is an answer, not an outage.
//! - 30-second request timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use showstash_db::models::{
    CastCredit, CrewCredit, EnrichedShow, EpisodeSnapshot, PersonRef, SeasonSnapshot,
};
use tracing::{debug, warn};

use super::types::{CreditsBlock, SearchResponse, SeasonDetail, SeasonSummary, TvDetail};
use super::{ShowMetadataSource, ShowSearchResult, TmdbError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Upstream error bodies are truncated to this many characters.
const MAX_ERROR_BODY_LEN: usize = 200;

/// How a TMDB credential is presented to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// v3 API key, sent as the `api_key` query parameter.
    ApiKey(String),
    /// v4 read access token, sent as a `Bearer` authorization header.
    Bearer(String),
}

impl Credential {
    /// Classify a raw credential string by shape.
    ///
    /// v3 API keys are 32 hex characters; anything else is treated as a v4
    /// read access token. A leading `Bearer ` prefix is accepted and stripped
    /// so pasting the header value verbatim works.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        let token = trimmed.strip_prefix("Bearer ").unwrap_or(trimmed);

        if is_v3_api_key(token) {
            Credential::ApiKey(token.to_string())
        } else {
            Credential::Bearer(token.to_string())
        }
    }
}

fn is_v3_api_key(s: &str) -> bool {
    s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Truncate an upstream error body to [`MAX_ERROR_BODY_LEN`] characters.
fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_LEN {
        return trimmed.to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_LEN).collect()
}

/// TMDB API client.
///
/// # Examples
///
/// ```no_run
/// use showstash::tmdb::{Credential, TmdbClient};
///
/// let client = TmdbClient::new(
///     "https://api.themoviedb.org/3".into(),
///     Credential::from_raw("your-access-token"),
///     "en-US".into(),
/// );
/// ```
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    credential: Credential,
    language: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl TmdbClient {
    /// Create a new client with the default retry policy.
    pub fn new(base_url: String, credential: Credential, language: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");

        Self {
            http,
            base_url,
            credential,
            language,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the retry policy.
    pub fn with_retries(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// GET a JSON document, retrying network-level failures with a linear
    /// backoff. Non-2xx responses and decode failures return immediately.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TmdbError> {
        let url = format!("{}{}", self.base_url, path);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_get_json(&url, query).await {
                Ok(value) => return Ok(value),
                Err(TmdbError::Request(e)) if attempt < self.max_attempts && !e.is_decode() => {
                    warn!(url = %url, attempt, error = %e, "TMDB request failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TmdbError> {
        let mut request = self
            .http
            .get(url)
            .query(&[("language", self.language.as_str())])
            .query(query);

        request = match &self.credential {
            Credential::ApiKey(key) => request.query(&[("api_key", key.as_str())]),
            Credential::Bearer(token) => request.bearer_auth(token),
        };

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(TmdbError::Status {
                status: status.as_u16(),
                url,
                body: truncate_body(&body),
            });
        }

        Ok(response.json().await?)
    }

    async fn fetch_season(
        &self,
        tmdb_id: i64,
        summary: &SeasonSummary,
    ) -> Result<SeasonSnapshot, TmdbError> {
        let detail: SeasonDetail = self
            .get_json(
                &format!("/tv/{}/season/{}", tmdb_id, summary.season_number),
                &[],
            )
            .await?;

        let episodes: Vec<EpisodeSnapshot> = detail
            .episodes
            .into_iter()
            .map(|e| EpisodeSnapshot {
                episode_number: e.episode_number,
                name: e
                    .name
                    .unwrap_or_else(|| format!("Episode {}", e.episode_number)),
                overview: e.overview,
                still_path: e.still_path,
                air_date: e.air_date,
                runtime: e.runtime,
            })
            .collect();

        Ok(SeasonSnapshot {
            season_number: summary.season_number,
            name: detail
                .name
                .or_else(|| summary.name.clone())
                .unwrap_or_else(|| format!("Season {}", summary.season_number)),
            overview: detail.overview.or_else(|| summary.overview.clone()),
            poster_path: detail.poster_path.or_else(|| summary.poster_path.clone()),
            episode_count: summary.episode_count.or(Some(episodes.len() as i64)),
            air_date: detail.air_date.or_else(|| summary.air_date.clone()),
            episodes,
        })
    }
}

#[async_trait]
impl ShowMetadataSource for TmdbClient {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn fetch_show(&self, tmdb_id: i64) -> Result<EnrichedShow, TmdbError> {
        debug!(tmdb_id, "TMDB fetch show");

        let detail: TvDetail = self.get_json(&format!("/tv/{}", tmdb_id), &[]).await?;

        // Fetch each distinct season number once, in listing order.
        let mut seen = std::collections::HashSet::new();
        let mut seasons = Vec::with_capacity(detail.seasons.len());
        for summary in &detail.seasons {
            if seen.insert(summary.season_number) {
                seasons.push(self.fetch_season(tmdb_id, summary).await?);
            }
        }

        let credits: CreditsBlock = self
            .get_json(&format!("/tv/{}/credits", tmdb_id), &[])
            .await?;

        let cast = credits
            .cast
            .into_iter()
            .enumerate()
            .map(|(i, c)| CastCredit {
                person: PersonRef {
                    tmdb_person_id: c.id,
                    name: c.name.unwrap_or_else(|| "Unknown".to_string()),
                    profile_path: c.profile_path,
                },
                character: c.character,
                order_index: c.order.unwrap_or(i as i64),
            })
            .collect();

        let crew = credits
            .crew
            .into_iter()
            .map(|c| CrewCredit {
                person: PersonRef {
                    tmdb_person_id: c.id,
                    name: c.name.unwrap_or_else(|| "Unknown".to_string()),
                    profile_path: c.profile_path,
                },
                job: c.job,
                department: c.department,
            })
            .collect();

        Ok(EnrichedShow {
            name: detail
                .name
                .or(detail.original_name)
                .unwrap_or_else(|| format!("Show {}", detail.id)),
            overview: detail.overview,
            poster_path: detail.poster_path,
            seasons,
            cast,
            crew,
        })
    }

    async fn search_shows(&self, query: &str) -> Result<Vec<ShowSearchResult>, TmdbError> {
        debug!(query, "TMDB search TV");

        let body: SearchResponse = self.get_json("/search/tv", &[("query", query)]).await?;

        Ok(body
            .results
            .into_iter()
            .map(|r| ShowSearchResult {
                tmdb_id: r.id,
                name: r.name.unwrap_or_default(),
                first_air_date: r.first_air_date,
                overview: r.overview,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_detects_v3_api_key() {
        let raw = "0123456789abcdef0123456789ABCDEF";
        assert_eq!(Credential::from_raw(raw), Credential::ApiKey(raw.into()));
    }

    #[test]
    fn credential_treats_long_token_as_bearer() {
        let raw = "eyJhbGciOiJIUzI1NiJ9.some.token";
        assert_eq!(Credential::from_raw(raw), Credential::Bearer(raw.into()));
    }

    #[test]
    fn credential_strips_bearer_prefix() {
        assert_eq!(
            Credential::from_raw("Bearer my-token"),
            Credential::Bearer("my-token".into())
        );
    }

    #[test]
    fn credential_trims_whitespace() {
        let raw = "  0123456789abcdef0123456789abcdef  ";
        assert_eq!(
            Credential::from_raw(raw),
            Credential::ApiKey("0123456789abcdef0123456789abcdef".into())
        );
    }

    #[test]
    fn non_hex_32_chars_is_bearer() {
        let raw = "zzzz456789abcdef0123456789abcdef";
        assert_eq!(Credential::from_raw(raw), Credential::Bearer(raw.into()));
    }

    #[test]
    fn error_body_truncation() {
        assert_eq!(truncate_body("  short  "), "short");
        assert_eq!(
            truncate_body(&"x".repeat(MAX_ERROR_BODY_LEN + 50)).chars().count(),
            MAX_ERROR_BODY_LEN
        );
    }
}
