//! Search Module
//!
//! Everything on the index side of the sync boundary.
//!
//! ## Responsibilities
//! - **Capability**: the `Searchable` trait a model implements to be mirrored into the index.
//! - **Transport**: the `IndexClient` contract and its HTTP, in-process, and disabled implementations.
//! - **Ranking**: a term-frequency ranked in-memory index for local runs.
//! - **Retrieval**: `QueryMerger`, which hydrates ranked ids from the primary store
//!   without losing the index's relevance order.
//!
//! ## Submodules
//! - **`client`**: The `IndexClient` trait and `DisabledIndex`.
//! - **`elastic`**: Elasticsearch-compatible HTTP transport.
//! - **`memory`**: In-process ranked index.
//! - **`merger`**: Query + hydration merge.
//! - **`tokenizer`**: Text normalization for the in-process index.
//! - **`types`**: Records, ranked results, and pages.

pub mod client;
pub mod elastic;
pub mod memory;
pub mod merger;
pub mod tokenizer;
pub mod types;

#[cfg(test)]
mod tests;
