//! Full Index Rebuild
//!
//! Out-of-band maintenance: walk every row of a searchable table and push it
//! through the same upsert path incremental sync uses. No session and no commit
//! hooks are involved.
//!
//! Rows are pulled in primary-key ordered batches (`EntityBatches`), so memory
//! stays bounded by the batch size however large the table is, and a rebuild
//! can resume from the offset a previous run reported. A record that fails to
//! upsert is logged and counted; the rebuild carries on.
//!
//! Each batch is read together with the commit it reflects, and its upserts go
//! through the `VersionGate` at that commit. A rebuild running alongside live
//! traffic therefore never overwrites a document a later commit already wrote.

use super::ordering::{Admission, VersionGate};
use super::types::ReindexReport;
use crate::search::client::IndexClient;
use crate::search::types::{Searchable, SearchableRecord};
use crate::storage::memory::Database;
use crate::storage::types::{CommitSeq, Model};

use std::marker::PhantomData;
use std::sync::Arc;

/// Lazy, offset-addressed sequence of row batches.
pub struct EntityBatches<'a, M> {
    db: &'a Database,
    offset: usize,
    batch_size: usize,
    exhausted: bool,
    _model: PhantomData<M>,
}

impl<'a, M: Model> EntityBatches<'a, M> {
    pub fn new(db: &'a Database, offset: usize, batch_size: usize) -> Self {
        Self {
            db,
            offset,
            batch_size: batch_size.max(1),
            exhausted: false,
            _model: PhantomData,
        }
    }

    /// Offset of the next batch; a new sequence started here resumes the scan.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<M: Model> Iterator for EntityBatches<'_, M> {
    /// A batch and the commit it was read at.
    type Item = (CommitSeq, Vec<M>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let (seq, batch) = self.db.scan_at::<M>(self.offset, self.batch_size);
        if batch.len() < self.batch_size {
            self.exhausted = true;
        }
        if batch.is_empty() {
            return None;
        }

        self.offset += batch.len();
        Some((seq, batch))
    }
}

pub struct Reindexer {
    db: Arc<Database>,
    client: Arc<dyn IndexClient>,
    gate: Arc<VersionGate>,
    batch_size: usize,
}

impl Reindexer {
    pub fn new(
        db: Arc<Database>,
        client: Arc<dyn IndexClient>,
        gate: Arc<VersionGate>,
        batch_size: usize,
    ) -> Self {
        Self {
            db,
            client,
            gate,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batches<M: Model>(&self, offset: usize) -> EntityBatches<'_, M> {
        EntityBatches::new(&self.db, offset, self.batch_size)
    }

    /// Upserts every `T` row into `T`'s index.
    pub async fn rebuild<T: Searchable>(&self) -> ReindexReport {
        self.rebuild_from::<T>(0).await
    }

    /// Upserts every `T` row from `offset` onwards.
    pub async fn rebuild_from<T: Searchable>(&self, offset: usize) -> ReindexReport {
        let mut report = ReindexReport {
            index: T::INDEX_NAME,
            next_offset: offset,
            ..ReindexReport::default()
        };

        if !self.client.is_enabled() {
            tracing::info!("Search index disabled, skipping rebuild of '{}'", T::INDEX_NAME);
            return report;
        }

        tracing::info!(
            "Rebuilding index '{}' from table '{}' (offset {}, batch {})",
            T::INDEX_NAME,
            T::TABLE,
            offset,
            self.batch_size
        );

        let mut batches = self.batches::<T>(offset);
        while let Some((seq, batch)) = batches.next() {
            for entity in &batch {
                let record = SearchableRecord::project(entity);
                let result = self
                    .gate
                    .admit(record.key(), seq, || {
                        self.client.upsert(record.index, record.id, &record.fields)
                    })
                    .await;
                match result {
                    Ok(Admission::Applied) => report.upserted += 1,
                    Ok(Admission::Superseded) => report.superseded += 1,
                    Err(e) => {
                        tracing::warn!(
                            "Reindex of {}#{} failed, skipping: {}",
                            record.index,
                            record.id,
                            e
                        );
                        report.failed += 1;
                    }
                }
            }

            report.next_offset = batches.offset();
            tracing::debug!(
                "Reindex '{}' progress: {} rows scanned",
                T::INDEX_NAME,
                report.next_offset
            );
        }

        if report.failed > 0 {
            tracing::error!(
                "Rebuilt index '{}' with {} failures ({} upserted)",
                T::INDEX_NAME,
                report.failed,
                report.upserted
            );
        } else {
            tracing::info!(
                "Rebuilt index '{}': {} upserted, {} already newer",
                T::INDEX_NAME,
                report.upserted,
                report.superseded
            );
        }
        report
    }
}
