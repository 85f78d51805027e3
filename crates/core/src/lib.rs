//! Query compilation and keyset pagination for [STAC](https://stacspec.org)
//! item search.
//!
//! This crate takes a typed search request (collections, ids, bbox or
//! intersects, datetime, a CQL-JSON filter, sortby, CRS parameters, limit and
//! a pagination token), compiles it into a logical storage query, hands that
//! query to a [Backend](backend::Backend), and turns the returned records
//! into a page of items with opaque `next` and `previous` tokens.
//!
//! # Searching
//!
//! ```
//! use flyfoto::{Queryables, SearchEngine, api::Search, backend::MemoryBackend};
//! use serde_json::json;
//!
//! let backend = MemoryBackend::new();
//! backend
//!     .add_features(
//!         json!({
//!             "type": "Feature",
//!             "id": "2021_83_29_2_0019_00003995",
//!             "collection": "skraafotos2021",
//!             "geometry": {"type": "Point", "coordinates": [9.5, 55.5]},
//!             "properties": {"datetime": "2021-04-05T10:09:41Z", "direction": "north"}
//!         }),
//!         &Queryables::skraafoto(),
//!     )
//!     .unwrap();
//! let engine = SearchEngine::new(backend);
//! let search = Search::new().filter(json!({"eq": [{"property": "direction"}, "north"]}));
//! # tokio_test::block_on(async {
//! let page = engine.search(search).await.unwrap();
//! assert_eq!(page.features.len(), 1);
//! # })
//! ```
//!
//! # Compiling
//!
//! Everything up to the storage call is pure, so a search can be inspected
//! without running it:
//!
//! ```
//! use flyfoto::{SearchEngine, api::Search, backend::MemoryBackend};
//! use serde_json::json;
//!
//! let engine = SearchEngine::new(MemoryBackend::new());
//! let err = engine
//!     .compile(&Search::new().filter(json!({"eq": [{"property": "invalid-field"}, 50]})))
//!     .unwrap_err();
//! assert_eq!(err.to_string(), "Cannot search on field: invalid-field");
//! ```

#![warn(missing_docs, unused_qualifications, unused_crate_dependencies)]

pub mod api;
pub mod backend;
mod bbox;
pub mod config;
mod crs;
mod datetime;
pub mod engine;
mod error;
pub mod filter;
pub mod pagination;
pub mod predicate;
mod queryables;
mod record;
mod reproject;
pub mod spatial;

pub use {
    bbox::Bbox,
    config::Config,
    crs::{CRS84_URI, Crs, EPSG_URI_PREFIX},
    datetime::Interval,
    engine::{CompiledSearch, SearchEngine, SearchResultPage},
    error::{Error, ErrorKind},
    predicate::{Literal, Predicate},
    queryables::{
        Queryable, Queryables, QueryablesConfig, SKRAAFOTO_COLLECTIONS, Storage, ValueType,
    },
    record::{COLLECTION_COLUMN, DATETIME_COLUMN, FOOTPRINT_COLUMN, ID_COLUMN, Record},
    reproject::{Reproject, TransverseMercator},
};

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Return this crate's version.
///
/// # Examples
///
/// ```
/// println!("{}", flyfoto::version());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
use tokio_test as _;
