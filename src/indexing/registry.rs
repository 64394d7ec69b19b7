//! Searchable Type Registry
//!
//! An explicit table of the model types that take part in index sync, keyed by
//! their store table. Registration captures, once and with full type
//! information, everything the type-erased parts of the pipeline need later:
//! how to project an erased pending row, and how to rebuild the whole index.
//!
//! A table that was never registered is invisible to the sync layer.

use super::reindex::Reindexer;
use super::types::ReindexReport;
use crate::error::{Result, SyncError};
use crate::search::types::{IndexKey, Searchable, SearchableRecord};
use crate::storage::types::{Record, downcast};

use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Projects an erased row of the registered table.
pub type ProjectFn = fn(&dyn Record) -> Option<SearchableRecord>;

/// Runs the typed rebuild of the registered index.
pub type RebuildFn = for<'a> fn(&'a Reindexer) -> BoxFuture<'a, ReindexReport>;

/// Registration entry for one searchable model.
#[derive(Clone)]
pub struct SearchableType {
    pub table: &'static str,
    pub index_name: &'static str,
    pub fields: Vec<&'static str>,
    project: ProjectFn,
    rebuild: RebuildFn,
}

fn project_erased<T: Searchable>(record: &dyn Record) -> Option<SearchableRecord> {
    downcast::<T>(record).map(|entity| SearchableRecord::project(entity))
}

fn rebuild_erased<T: Searchable>(reindexer: &Reindexer) -> BoxFuture<'_, ReindexReport> {
    Box::pin(reindexer.rebuild::<T>())
}

pub struct SearchRegistry {
    by_table: DashMap<&'static str, SearchableType>,
}

impl SearchRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Opts `T` into index sync.
    pub fn register<T: Searchable>(&self) {
        let entry = SearchableType {
            table: T::TABLE,
            index_name: T::INDEX_NAME,
            fields: T::field_names(),
            project: project_erased::<T>,
            rebuild: rebuild_erased::<T>,
        };

        self.by_table.insert(T::TABLE, entry);

        tracing::info!(
            "Registered searchable table '{}' -> index '{}' {:?}",
            T::TABLE,
            T::INDEX_NAME,
            T::field_names()
        );
    }

    /// Index document for an erased row, or `None` if its table is not registered.
    pub fn project(&self, record: &dyn Record) -> Option<SearchableRecord> {
        let project = self.by_table.get(record.table_name())?.project;
        project(record)
    }

    /// Index address of an erased row, or `None` if its table is not registered.
    pub fn index_key(&self, record: &dyn Record) -> Option<IndexKey> {
        let entry = self.by_table.get(record.table_name())?;
        Some(IndexKey {
            index: entry.index_name,
            id: record.record_id(),
        })
    }

    pub fn lookup(&self, index_name: &str) -> Option<SearchableType> {
        self.by_table
            .iter()
            .find(|entry| entry.value().index_name == index_name)
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, index_name: &str) -> bool {
        self.lookup(index_name).is_some()
    }

    /// Registered index names, sorted.
    pub fn index_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .by_table
            .iter()
            .map(|entry| entry.value().index_name)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_table.is_empty()
    }

    /// Rebuilds the index registered as `index_name`.
    pub async fn rebuild(&self, index_name: &str, reindexer: &Reindexer) -> Result<ReindexReport> {
        let entry = self
            .lookup(index_name)
            .ok_or_else(|| SyncError::unknown_index(index_name))?;

        Ok((entry.rebuild)(reindexer).await)
    }

    /// Rebuilds every registered index, one after another.
    pub async fn rebuild_all(&self, reindexer: &Reindexer) -> Vec<ReindexReport> {
        let mut reports = Vec::new();
        for index_name in self.index_names() {
            if let Ok(report) = self.rebuild(index_name, reindexer).await {
                reports.push(report);
            }
        }
        reports
    }
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self {
            by_table: DashMap::new(),
        }
    }
}
