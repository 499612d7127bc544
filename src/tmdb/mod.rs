//! TMDB (The Movie Database) integration.
//!
//! [`ShowMetadataSource`] is the seam the enrichment worker talks through;
//! [`TmdbClient`] is the production implementation backed by the TMDB v3 REST
//! API. Tests substitute stub sources to exercise the worker without network.

pub mod client;
mod types;

pub use client::{Credential, TmdbClient};

use async_trait::async_trait;
use showstash_db::models::EnrichedShow;
use thiserror::Error;

/// Errors from talking to TMDB.
#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("TMDB request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("TMDB request failed: {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        /// Truncated upstream response body, kept for diagnostics.
        body: String,
    },
}

/// A single result from a TV search.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowSearchResult {
    pub tmdb_id: i64,
    pub name: String,
    pub first_air_date: Option<String>,
    pub overview: Option<String>,
}

/// Source of remote show metadata.
#[async_trait]
pub trait ShowMetadataSource: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch the complete metadata snapshot for one show: details, every
    /// season with its episodes, and credits.
    async fn fetch_show(&self, tmdb_id: i64) -> Result<EnrichedShow, TmdbError>;

    /// Search TV shows by name.
    async fn search_shows(&self, query: &str) -> Result<Vec<ShowSearchResult>, TmdbError>;
}
