//! Show enrichment: the producer that queues work and the worker that does it.

pub mod producer;
pub mod worker;

pub use producer::{request_enrichment, EnqueueOutcome};
pub use worker::EnrichmentWorker;

/// Outbox topic for show enrichment jobs.
pub const TOPIC: &str = "tmdb.enrich_show";
