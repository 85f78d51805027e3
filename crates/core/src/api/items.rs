use super::Sortby;
use crate::{Bbox, Error, Interval, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The filter languages this crate understands.
pub const FILTER_LANGS: [&str; 2] = ["cql-json", "cql2-json"];

/// Parameters for the items endpoint of a collection.
///
/// [Search](super::Search) shares all of these.
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Items {
    /// The maximum number of results to return (page size).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Requested bounding box.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,

    /// The CRS of the bbox coordinates.
    #[serde(rename = "bbox-crs", skip_serializing_if = "Option::is_none")]
    pub bbox_crs: Option<String>,

    /// Single date+time, or a range ('/' separator), formatted to [RFC 3339,
    /// section 5.6](https://tools.ietf.org/html/rfc3339#section-5.6).
    ///
    /// Use double dots `..` for open date ranges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// A CQL-JSON filter expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,

    /// The language of the filter.
    #[serde(rename = "filter-lang", skip_serializing_if = "Option::is_none")]
    pub filter_lang: Option<String>,

    /// The CRS of the filter's geometry literals.
    #[serde(rename = "filter-crs", skip_serializing_if = "Option::is_none")]
    pub filter_crs: Option<String>,

    /// Fields by which to sort results.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sortby: Vec<Sortby>,

    /// The CRS of returned geometries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,

    /// The pagination token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pt: Option<String>,

    /// Additional fields.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

/// GET parameters for the items endpoint.
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetItems {
    /// The maximum number of results to return (page size).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,

    /// Comma-separated bbox values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<String>,

    /// The CRS of the bbox coordinates.
    #[serde(rename = "bbox-crs", skip_serializing_if = "Option::is_none")]
    pub bbox_crs: Option<String>,

    /// Single date+time, or a range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// A CQL-JSON filter, as a JSON string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// The language of the filter.
    #[serde(rename = "filter-lang", skip_serializing_if = "Option::is_none")]
    pub filter_lang: Option<String>,

    /// The CRS of the filter's geometry literals.
    #[serde(rename = "filter-crs", skip_serializing_if = "Option::is_none")]
    pub filter_crs: Option<String>,

    /// Comma-separated sort fields, e.g. `+datetime,-id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sortby: Option<String>,

    /// The CRS of returned geometries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,

    /// The pagination token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pt: Option<String>,

    /// Additional fields.
    #[serde(flatten)]
    pub additional_fields: HashMap<String, String>,
}

impl Items {
    /// Returns an error if these parameters are invalid.
    ///
    /// Returns the parameters unchanged if they are valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::api::Items;
    ///
    /// let items = Items {
    ///     datetime: Some("../..".to_string()),
    ///     ..Default::default()
    /// };
    /// let err = items.valid().unwrap_err();
    /// assert_eq!(err.to_string(), "Double open-ended intervals are not allowed.");
    /// ```
    pub fn valid(self) -> Result<Items> {
        if self.limit == Some(0) {
            return Err(Error::InvalidLimit("0".to_string()));
        }
        if let Some(bbox) = self.bbox {
            let _ = bbox.valid()?;
        }
        if let Some(datetime) = &self.datetime {
            let _: Interval = datetime.parse()?;
        }
        if let Some(filter_lang) = &self.filter_lang
            && !FILTER_LANGS.contains(&filter_lang.as_str())
        {
            return Err(Error::InvalidFilterLang(filter_lang.clone()));
        }
        Ok(self)
    }
}

impl TryFrom<GetItems> for Items {
    type Error = Error;

    fn try_from(get_items: GetItems) -> Result<Items> {
        let limit = get_items
            .limit
            .map(|limit| {
                limit
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| Error::InvalidLimit(limit.clone()))
            })
            .transpose()?;
        let bbox = get_items.bbox.map(|bbox| bbox.parse()).transpose()?;
        let filter = get_items
            .filter
            .map(|filter| serde_json::from_str(&filter))
            .transpose()?;
        let sortby = get_items
            .sortby
            .map(|sortby| Sortby::parse_list(&sortby))
            .transpose()?
            .unwrap_or_default();
        Ok(Items {
            limit,
            bbox,
            bbox_crs: get_items.bbox_crs,
            datetime: get_items.datetime,
            filter,
            filter_lang: get_items.filter_lang,
            filter_crs: get_items.filter_crs,
            sortby,
            crs: get_items.crs,
            pt: get_items.pt,
            additional_fields: get_items
                .additional_fields
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        })
    }
}

impl TryFrom<Items> for GetItems {
    type Error = Error;

    fn try_from(items: Items) -> Result<GetItems> {
        let bbox = items.bbox.map(|bbox| {
            Vec::<f64>::from(bbox)
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        });
        let filter = items
            .filter
            .map(|filter| serde_json::to_string(&filter))
            .transpose()?;
        let sortby = if items.sortby.is_empty() {
            None
        } else {
            Some(
                items
                    .sortby
                    .iter()
                    .map(|sortby| sortby.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            )
        };
        Ok(GetItems {
            limit: items.limit.map(|limit| limit.to_string()),
            bbox,
            bbox_crs: items.bbox_crs,
            datetime: items.datetime,
            filter,
            filter_lang: items.filter_lang,
            filter_crs: items.filter_crs,
            sortby,
            crs: items.crs,
            pt: items.pt,
            additional_fields: items
                .additional_fields
                .into_iter()
                .map(|(key, value)| match value {
                    Value::String(s) => (key, s),
                    value => (key, value.to_string()),
                })
                .collect(),
        })
    }
}
