//! Showstash-Common: Shared types, IDs, and errors.
//!
//! This crate provides common functionality used across showstash:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for shows, seasons, jobs, etc.
//! - **Core Types**: Enums for enrichment states, job statuses, and credit kinds
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use showstash_common::{ShowId, EnrichState, Error, Result};
//!
//! // Create typed IDs
//! let show_id = ShowId::new();
//!
//! // Work with enrichment states
//! let state = EnrichState::Queued;
//! assert_eq!(state.to_string(), "queued");
//!
//! // Use common error types
//! fn example() -> Result<()> {
//!     Err(Error::not_found("show"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
