//! Database query modules.
//!
//! This module organizes all database operations into logical groups:
//! - shows: Show upserts and reads, plus season/episode/credit reads
//! - outbox: Outbox job lifecycle (enqueue, claim, done, error, reclaim)
//! - enrichment: Single-transaction persistence of one enrichment run

pub mod enrichment;
pub mod outbox;
pub mod shows;
