//! Primary Store Module
//!
//! An in-memory, transactional system of record for entities. The search sync
//! layer treats it as an external collaborator: it only relies on the
//! notifications and bulk reads exposed here.
//!
//! ## Core Concepts
//! - **Tables**: One ordered row map per `Model::TABLE`, each with its own id sequence.
//! - **Sessions**: A `Session` buffers pending adds, updates, and deletes for a single
//!   transaction. Nothing is visible to other sessions until `commit` succeeds.
//! - **Commit Hooks**: A `CommitHook` is bound to exactly one session at `begin_with`.
//!   It sees the pending sets just before the commit and is consumed just after a
//!   successful commit. Rollback (or dropping the session) discards it unused.
//! - **Bulk Reads**: `fetch_by_ids` and `scan` serve query hydration and reindexing.

pub mod memory;
pub mod session;
pub mod types;

#[cfg(test)]
mod tests;
