//! Showstash-DB: Database schema, migrations, and query operations.
//!
//! This crate provides database functionality for showstash using SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching the database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use showstash_db::pool::{init_pool, get_conn};
//! use showstash_db::queries::outbox;
//!
//! let pool = init_pool("/var/lib/showstash/db.sqlite").unwrap();
//! let mut conn = get_conn(&pool).unwrap();
//!
//! let job = outbox::claim_next(&mut conn, "tmdb.enrich_show").unwrap();
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
