//! Search Index Sync Library
//!
//! Keeps a full-text search index consistent with a transactional primary
//! store, without the application ever writing to the index directly.
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled subsystems:
//!
//! - **`storage`**: The primary store. An in-memory transactional database whose
//!   sessions expose pre-commit and post-commit notifications to a bound hook.
//! - **`search`**: The index side. The `Searchable` capability, the `IndexClient`
//!   transports (HTTP, in-process, disabled), and the relevance-preserving
//!   `QueryMerger`.
//! - **`indexing`**: The sync layer in between. Captures each transaction's
//!   searchable changes at pre-commit and replays them after a successful
//!   commit, inline or through background workers; rebuilds indexes on demand.
//! - **`blog`**: A microblog served over HTTP whose posts are kept searchable.
//! - **`config`** / **`error`**: Runtime configuration and the library error type.

pub mod blog;
pub mod config;
pub mod error;
pub mod indexing;
pub mod search;
pub mod storage;
