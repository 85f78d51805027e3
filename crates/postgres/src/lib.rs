//! A PostgreSQL/PostGIS storage backend for [flyfoto].
//!
//! Logical queries are rendered as parameterized SQL against an items view
//! with a handful of fixed columns (`id`, `collection_id`, `datetime`,
//! `footprint` and a `properties` document) plus one column per indexed
//! queryable. Connections come from a [bb8] pool.
//!
//! ```
//! use flyfoto::{Predicate, backend::Query};
//! use flyfoto_postgres::Layout;
//!
//! let statement = Layout::default().count(&Query::new(Predicate::True, vec![]));
//! assert_eq!(statement.sql, "SELECT count(*) FROM stac_api.images_mvw t WHERE TRUE");
//! ```

#![warn(missing_docs, unused_crate_dependencies)]

mod backend;
mod error;
mod sql;

pub use {
    backend::PostgresBackend,
    error::Error,
    sql::{Layout, Param, Statement},
};

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
use {geo as _, tokio_test as _};
