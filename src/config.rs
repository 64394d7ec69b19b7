//! Runtime configuration, parsed from command-line flags and environment.

use crate::error::{Result, SyncError};

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

/// How committed changes reach the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PropagationMode {
    /// Replay the change set before `commit` returns.
    Sync,
    /// Hand the change set to background workers right after the commit.
    Deferred,
}

/// search-sync - a microblog whose posts are mirrored into a full-text index
#[derive(Parser, Debug, Clone)]
#[command(name = "search-sync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Base URL of an Elasticsearch-compatible endpoint; search is disabled when unset
    #[arg(long, env = "ELASTICSEARCH_URL")]
    pub elasticsearch_url: Option<String>,

    /// Use the in-process index instead of a remote endpoint
    #[arg(long, conflicts_with = "elasticsearch_url")]
    pub in_memory_index: bool,

    /// Search results per page
    #[arg(long, env = "POSTS_PER_PAGE", default_value_t = 10)]
    pub posts_per_page: usize,

    /// Upper bound for a single search query, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub query_timeout_ms: u64,

    /// Transport timeout for index writes, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub request_timeout_ms: u64,

    /// When committed changes are pushed to the index
    #[arg(long, value_enum, default_value = "sync")]
    pub propagation: PropagationMode,

    /// Background workers for deferred propagation
    #[arg(long, default_value_t = 2)]
    pub workers: usize,

    /// Rows fetched per batch while reindexing
    #[arg(long, default_value_t = 500)]
    pub reindex_batch: usize,

    /// Rebuild every registered index before serving
    #[arg(long)]
    pub reindex_on_start: bool,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Config {
    /// Rejects settings that would make pagination or workers meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.posts_per_page == 0 {
            return Err(SyncError::invalid_argument("posts-per-page must be >= 1"));
        }
        if self.reindex_batch == 0 {
            return Err(SyncError::invalid_argument("reindex-batch must be >= 1"));
        }
        if self.propagation == PropagationMode::Deferred && self.workers == 0 {
            return Err(SyncError::invalid_argument(
                "deferred propagation needs at least one worker",
            ));
        }
        if self.query_timeout_ms == 0 {
            return Err(SyncError::invalid_argument("query-timeout-ms must be >= 1"));
        }
        Ok(())
    }

    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::WARN;
        }
        match self.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
