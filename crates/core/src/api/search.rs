use super::{GetItems, Items, Sortby};
use crate::{Bbox, Error, Result};
use geojson::Geometry;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// The parameters of an item search.
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Search {
    /// Many fields are shared with [Items], so we re-use that structure.
    #[serde(flatten)]
    pub items: Items,

    /// Searches items by performing intersection between their footprint and
    /// this GeoJSON geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<Geometry>,

    /// Array of item ids to return.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ids: Vec<String>,

    /// Array of collection ids that each matching item must be in.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub collections: Vec<String>,
}

/// GET parameters for the item search endpoint.
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetSearch {
    /// Many fields are shared with [GetItems], so we re-use that structure.
    #[serde(flatten)]
    pub items: GetItems,

    /// A GeoJSON geometry, as a JSON string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<String>,

    /// Comma-delimited list of item ids to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<String>,

    /// Comma-delimited list of collection ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<String>,
}

impl Search {
    /// Creates a new, empty search.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::api::Search;
    ///
    /// let search = Search::new();
    /// ```
    pub fn new() -> Search {
        Search::default()
    }

    /// Sets the ids of this search.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::api::Search;
    /// let search = Search::new().ids(vec!["an-id".to_string()]);
    /// ```
    pub fn ids(mut self, ids: Vec<String>) -> Search {
        self.ids = ids;
        self
    }

    /// Sets the intersects of this search.
    pub fn intersects(mut self, intersects: impl Into<Geometry>) -> Search {
        self.intersects = Some(intersects.into());
        self
    }

    /// Sets the collections of this search.
    pub fn collections(mut self, collections: Vec<String>) -> Search {
        self.collections = collections;
        self
    }

    /// Sets the bbox of this search.
    pub fn bbox(mut self, bbox: impl Into<Bbox>) -> Search {
        self.items.bbox = Some(bbox.into());
        self
    }

    /// Sets the CRS of the bbox.
    pub fn bbox_crs(mut self, crs: impl ToString) -> Search {
        self.items.bbox_crs = Some(crs.to_string());
        self
    }

    /// Sets the datetime of this search.
    pub fn datetime(mut self, datetime: impl ToString) -> Search {
        self.items.datetime = Some(datetime.to_string());
        self
    }

    /// Sets the CQL-JSON filter of this search.
    pub fn filter(mut self, filter: serde_json::Value) -> Search {
        self.items.filter = Some(filter);
        self
    }

    /// Sets the CRS of the filter's geometries.
    pub fn filter_crs(mut self, crs: impl ToString) -> Search {
        self.items.filter_crs = Some(crs.to_string());
        self
    }

    /// Sets the limit of this search.
    pub fn limit(mut self, limit: u64) -> Search {
        self.items.limit = Some(limit);
        self
    }

    /// Sets the sortby of this search.
    pub fn sortby(mut self, sortby: Vec<Sortby>) -> Search {
        self.items.sortby = sortby;
        self
    }

    /// Sets the output CRS of this search.
    pub fn crs(mut self, crs: impl ToString) -> Search {
        self.items.crs = Some(crs.to_string());
        self
    }

    /// Sets the pagination token of this search.
    pub fn pt(mut self, pt: impl ToString) -> Search {
        self.items.pt = Some(pt.to_string());
        self
    }

    /// Returns an error if this search is invalid, e.g. if both bbox and intersects are specified.
    ///
    /// Returns the search unchanged if it is valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Bbox, api::Search};
    /// use geojson::{Geometry, Value};
    ///
    /// let search = Search::new().bbox(Bbox::new(9.0, 55.0, 10.0, 56.0)).valid().unwrap();
    /// let err = search
    ///     .intersects(Geometry::new(Value::Point(vec![9.5, 55.5])))
    ///     .valid()
    ///     .unwrap_err();
    /// assert_eq!(err.to_string(), "intersects and bbox parameters are mutually exclusive");
    /// ```
    pub fn valid(mut self) -> Result<Search> {
        if self.items.bbox.is_some() & self.intersects.is_some() {
            return Err(Error::BboxAndIntersects);
        }
        self.items = self.items.valid()?;
        Ok(self)
    }
}

impl TryFrom<Search> for GetSearch {
    type Error = Error;

    fn try_from(search: Search) -> Result<GetSearch> {
        let get_items: GetItems = search.items.try_into()?;
        let intersects = search
            .intersects
            .map(|intersects| serde_json::to_string(&intersects))
            .transpose()?;
        let collections = if search.collections.is_empty() {
            None
        } else {
            Some(search.collections.join(","))
        };
        let ids = if search.ids.is_empty() {
            None
        } else {
            Some(search.ids.join(","))
        };
        Ok(GetSearch {
            items: get_items,
            intersects,
            ids,
            collections,
        })
    }
}

impl TryFrom<GetSearch> for Search {
    type Error = Error;

    fn try_from(get_search: GetSearch) -> Result<Search> {
        let items: Items = get_search.items.try_into()?;
        let intersects = get_search
            .intersects
            .map(|intersects| serde_json::from_str(&intersects))
            .transpose()?;
        let collections = get_search
            .collections
            .map(|collections| split(&collections))
            .unwrap_or_default();
        let ids = get_search
            .ids
            .map(|ids| split(&ids))
            .unwrap_or_default();
        Ok(Search {
            items,
            intersects,
            ids,
            collections,
        })
    }
}

impl From<Items> for Search {
    fn from(items: Items) -> Self {
        Search {
            items,
            ..Default::default()
        }
    }
}

impl Deref for Search {
    type Target = Items;
    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl DerefMut for Search {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.items
    }
}

fn split(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
