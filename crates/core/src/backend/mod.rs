//! Storage backends.
//!
//! The engine hands a backend a logical [Query]: a predicate whose fields are
//! already resolved to storage locations, the sort keys, and how many rows to
//! fetch. The backend translates it into its own query language.

mod memory;

pub use memory::MemoryBackend;

use crate::{Literal, Predicate, Record, api::Collection, pagination::SortKey};
use std::future::Future;

/// A logical storage query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The rows to select.
    pub predicate: Predicate,

    /// The sort keys, already reversed when paging backwards.
    pub sort: Vec<SortKey>,

    /// The maximum number of rows to return, or `None` for all of them.
    pub fetch: Option<usize>,
}

/// A fetched record and the values of its sort keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// The record.
    pub record: Record,

    /// One value per [Query::sort] key.
    pub keys: Vec<Literal>,
}

/// Storage for item records.
///
/// Implementations acquire whatever connection they need per call and
/// release it before returning, on every path.
pub trait Backend: Send + Sync {
    /// The error type for this backend.
    type Error: Into<crate::Error> + Send;

    /// Returns the rows matching the query, in sort order.
    fn fetch(&self, query: &Query) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send;

    /// Counts the rows matching the query's predicate, ignoring sort and fetch.
    fn count(&self, query: &Query) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    /// Returns true if the collection exists.
    fn collection_exists(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Returns every collection document, sorted by id.
    fn collections(&self) -> impl Future<Output = Result<Vec<Collection>, Self::Error>> + Send;

    /// Returns one collection document.
    fn collection(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Collection>, Self::Error>> + Send;

    /// Returns one record.
    fn record(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send;
}

impl Query {
    /// Creates a query for every row, sorted by the given keys.
    pub fn new(predicate: Predicate, sort: Vec<SortKey>) -> Query {
        Query {
            predicate,
            sort,
            fetch: None,
        }
    }

    /// Limits the number of fetched rows.
    pub fn fetch(mut self, fetch: usize) -> Query {
        self.fetch = Some(fetch);
        self
    }
}
