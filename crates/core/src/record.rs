//! The stored shape of an item.

use crate::{Error, Literal, Queryables, Result, Storage, ValueType};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The column holding item ids.
pub const ID_COLUMN: &str = "id";

/// The column holding collection ids.
pub const COLLECTION_COLUMN: &str = "collection_id";

/// The column holding item datetimes.
pub const DATETIME_COLUMN: &str = "datetime";

/// The column holding item footprints.
pub const FOOTPRINT_COLUMN: &str = "footprint";

/// One item row: a few fixed columns plus a properties document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The item id.
    pub id: String,

    /// The collection id.
    pub collection: String,

    /// The acquisition time.
    pub datetime: Option<DateTime<FixedOffset>>,

    /// The ground footprint, in the storage CRS.
    pub footprint: Option<geojson::Geometry>,

    /// Indexed columns, keyed by column name.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub columns: Map<String, Value>,

    /// The item properties.
    #[serde(default)]
    pub properties: Map<String, Value>,

    /// The item assets.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub assets: Map<String, Value>,

    /// The STAC extensions the item implements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stac_extensions: Vec<String>,
}

#[derive(Deserialize)]
struct Feature {
    id: String,
    collection: String,
    geometry: Option<geojson::Geometry>,
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    assets: Map<String, Value>,
    #[serde(default)]
    stac_extensions: Vec<String>,
}

impl Record {
    /// Creates a record with no datetime, footprint or properties.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Record;
    ///
    /// let record = Record::new("an-id", "a-collection");
    /// assert_eq!(record.id, "an-id");
    /// ```
    pub fn new(id: impl ToString, collection: impl ToString) -> Record {
        Record {
            id: id.to_string(),
            collection: collection.to_string(),
            datetime: None,
            footprint: None,
            columns: Map::new(),
            properties: Map::new(),
            assets: Map::new(),
            stac_extensions: Vec::new(),
        }
    }

    /// Sets the datetime.
    pub fn datetime(mut self, datetime: DateTime<FixedOffset>) -> Record {
        self.datetime = Some(datetime);
        self
    }

    /// Sets the footprint.
    pub fn footprint(mut self, footprint: impl Into<geojson::Geometry>) -> Record {
        self.footprint = Some(footprint.into());
        self
    }

    /// Sets an indexed column.
    pub fn column(mut self, name: impl ToString, value: impl Into<Value>) -> Record {
        let _ = self.columns.insert(name.to_string(), value.into());
        self
    }

    /// Sets a property.
    pub fn property(mut self, name: impl ToString, value: impl Into<Value>) -> Record {
        let _ = self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Builds a record from a STAC item.
    ///
    /// Every queryable stored in a column gets its value copied from the
    /// property of the same name, following dots into nested objects.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Queryables, Record};
    /// use serde_json::json;
    ///
    /// let record = Record::from_feature(
    ///     json!({
    ///         "type": "Feature",
    ///         "id": "2021_83_29_2_0019_00003995",
    ///         "collection": "skraafotos2021",
    ///         "geometry": null,
    ///         "properties": {"datetime": "2021-04-05T10:09:41Z", "gsd": 0.1, "direction": "north"}
    ///     }),
    ///     &Queryables::skraafoto(),
    /// )
    /// .unwrap();
    /// assert_eq!(record.columns["gsd"], 0.1);
    /// ```
    pub fn from_feature(value: Value, queryables: &Queryables) -> Result<Record> {
        let feature: Feature = serde_json::from_value(value)?;
        let datetime = match feature.properties.get("datetime") {
            Some(Value::String(s)) => Some(
                DateTime::parse_from_rfc3339(s).map_err(|_| Error::InvalidDatetime(s.clone()))?,
            ),
            _ => None,
        };
        let mut record = Record {
            id: feature.id,
            collection: feature.collection,
            datetime,
            footprint: feature.geometry,
            columns: Map::new(),
            properties: feature.properties,
            assets: feature.assets,
            stac_extensions: feature.stac_extensions,
        };
        for queryable in queryables.fields() {
            if let Storage::Column(column) = &queryable.storage
                && let Some(value) = lookup(&record.properties, &queryable.name)
            {
                let value = value.clone();
                let _ = record.columns.insert(column.clone(), value);
            }
        }
        Ok(record)
    }

    /// Returns the raw value stored at this location, or `None` if it is missing.
    pub fn value(&self, storage: &Storage) -> Option<Value> {
        match storage {
            Storage::Column(column) => match column.as_str() {
                ID_COLUMN => Some(Value::String(self.id.clone())),
                COLLECTION_COLUMN => Some(Value::String(self.collection.clone())),
                DATETIME_COLUMN => self
                    .datetime
                    .map(|datetime| Literal::Timestamp(datetime).to_json()),
                FOOTPRINT_COLUMN => self
                    .footprint
                    .as_ref()
                    .and_then(|footprint| serde_json::to_value(footprint).ok()),
                column => self.columns.get(column).cloned(),
            },
            Storage::Property(path) => lookup(&self.properties, path).cloned(),
        }
    }

    /// Returns the value stored at this location, cast to `value_type`.
    ///
    /// Missing values and values that can't be cast are null.
    pub fn literal(&self, storage: &Storage, value_type: ValueType) -> Literal {
        if let (Storage::Column(column), Some(datetime)) = (storage, self.datetime)
            && column == DATETIME_COLUMN
        {
            return Literal::Timestamp(datetime);
        }
        self.value(storage)
            .and_then(|value| Literal::cast(&value, value_type))
            .unwrap_or(Literal::Null)
    }
}

fn lookup<'a>(properties: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = properties.get(path) {
        return Some(value);
    }
    let (head, rest) = path.split_once('.')?;
    match properties.get(head)? {
        Value::Object(object) => lookup(object, rest),
        _ => None,
    }
}
