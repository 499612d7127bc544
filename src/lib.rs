//! Showstash: a TV-show catalog that enriches its records from TMDB.
//!
//! Shows are added with only a TMDB id; a transactional outbox queues an
//! enrichment job in the same write, and a polling worker fetches seasons,
//! episodes, and credits and persists them atomically.

pub mod config;
pub mod enrichment;
pub mod tmdb;
