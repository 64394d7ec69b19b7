use crate::storage::types::{EntityId, Model};

use serde::Serialize;

/// One projected field of a searchable type: its index field name and the
/// accessor producing its flat string value.
pub struct SearchField<T> {
    pub name: &'static str,
    pub value: fn(&T) -> String,
}

/// Opt-in capability for models that should be mirrored into the index.
///
/// The projection is a fixed table of typed accessors, so a field that does not
/// exist on the model is a compile error rather than a runtime lookup failure.
///
/// ```ignore
/// impl Searchable for Post {
///     const INDEX_NAME: &'static str = "post";
///     const FIELDS: &'static [SearchField<Self>] = &[SearchField {
///         name: "body",
///         value: |post| post.body.clone(),
///     }];
/// }
/// ```
pub trait Searchable: Model {
    const INDEX_NAME: &'static str;
    const FIELDS: &'static [SearchField<Self>];

    /// Declared field names, in projection order.
    fn field_names() -> Vec<&'static str> {
        Self::FIELDS.iter().map(|field| field.name).collect()
    }
}

/// Flat `(field, value)` pairs in declared order.
pub type SearchFields = Vec<(&'static str, String)>;

/// An entity projected into its index document.
///
/// Lives only while flowing from the store to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchableRecord {
    pub index: &'static str,
    pub id: EntityId,
    pub fields: SearchFields,
}

impl SearchableRecord {
    pub fn project<T: Searchable>(entity: &T) -> Self {
        Self {
            index: T::INDEX_NAME,
            id: entity.id(),
            fields: T::FIELDS
                .iter()
                .map(|field| (field.name, (field.value)(entity)))
                .collect(),
        }
    }

    pub fn key(&self) -> IndexKey {
        IndexKey {
            index: self.index,
            id: self.id,
        }
    }
}

/// Address of a document in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub index: &'static str,
    pub id: EntityId,
}

/// Ids in relevance-descending order, plus the index's total match count.
///
/// `total` may exceed `ids.len()`: `ids` is one page of the full result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedResultSet {
    pub ids: Vec<EntityId>,
    pub total: usize,
}

impl RankedResultSet {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The externally visible result of a search: hydrated records in the index's
/// relevance order, and the index's total for pagination.
#[derive(Debug, Clone, Serialize)]
pub struct Page<M> {
    pub records: Vec<M>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

impl<M> Page<M> {
    pub fn empty(page: usize, per_page: usize) -> Self {
        Self {
            records: Vec::new(),
            total: 0,
            page,
            per_page,
        }
    }

    pub fn has_next(&self) -> bool {
        self.total > self.page.saturating_mul(self.per_page)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Number of pages the index total spans.
    pub fn pages(&self) -> usize {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page)
    }
}
