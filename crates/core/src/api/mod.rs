//! Request and response shapes of the item search endpoints.
//!
//! This module **is**:
//!
//! - Data structures for `/search` and `/collections/{id}/items`, in both
//!   their GET (query string) and POST (JSON body) forms
//! - Response assembly, i.e. turning a page of results into a GeoJSON
//!   feature collection with paging links
//! - Collection documents and their links
//!
//! This module **is not**:
//!
//! - A server implementation
//!
//! GET shapes hold the raw strings of the query string and convert into their
//! POST counterparts with [TryFrom], so both run through the same validation:
//!
//! ```
//! use flyfoto::api::{GetSearch, Search};
//!
//! let get_search: GetSearch = serde_urlencoded::from_str("ids=a,b&limit=2").unwrap();
//! let search: Search = get_search.try_into().unwrap();
//! assert_eq!(search.ids, ["a", "b"]);
//! ```

mod collections;
mod item_collection;
mod items;
mod search;
mod sort;

pub use collections::{Collection, Collections, add_collection_links};
pub use item_collection::{
    Context, Endpoint, GEOJSON_MEDIA_TYPE, ItemCollection, JSON_MEDIA_TYPE, Link, add_item_links,
};
pub use items::{FILTER_LANGS, GetItems, Items};
pub use search::{GetSearch, Search};
pub use sort::{Direction, Sortby};

/// A STAC item, as returned by the search endpoints.
///
/// Items are assembled from records at read time, so they're kept as plain
/// JSON objects rather than a typed structure.
pub type Item = serde_json::Map<String, serde_json::Value>;
