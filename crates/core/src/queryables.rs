//! The registry of fields that can be filtered and sorted on.

use crate::{Error, Result, predicate::FieldRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// The JSON schema dialect of queryables documents.
pub const QUERYABLES_SCHEMA: &str = "https://json-schema.org/draft/2019-09/schema";

/// The default title of the shared queryables document.
pub const DEFAULT_TITLE: &str = "Dataforsyningen FlyfotoAPI - Shared queryables";

const ITEM_SCHEMA: &str = "https://schemas.stacspec.org/v1.0.0/item-spec/json-schema";

/// The collections of the Skraafoto catalog.
pub const SKRAAFOTO_COLLECTIONS: [&str; 4] = [
    "skraafotos2017",
    "skraafotos2019",
    "skraafotos2021",
    "skraafotos2023",
];

/// The type of a queryable's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Text.
    String,

    /// A number.
    Number,

    /// An RFC 3339 timestamp.
    Datetime,

    /// A GeoJSON geometry.
    Geometry,

    /// An item id.
    Id,
}

/// Where a queryable's values are stored on an item record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    /// A fixed column.
    Column(String),

    /// A dot-separated path inside the `properties` document.
    Property(String),
}

/// A named, typed, addressable attribute of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queryable {
    /// The logical name, e.g. `pers:omega`.
    pub name: String,

    /// Where the value is stored.
    pub storage: Storage,

    /// The value type.
    #[serde(rename = "type")]
    pub value_type: ValueType,

    /// Human-readable description, used in queryables documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// A JSON schema reference, used instead of the type in queryables documents.
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// The collections where this field applies, or all collections if `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<BTreeSet<String>>,
}

/// A serializable queryables table, e.g. loaded from a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryablesConfig {
    /// The title of the shared queryables document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// The registered collections.
    pub collections: Vec<String>,

    /// The non-base fields.
    #[serde(default)]
    pub fields: Vec<Queryable>,
}

/// The registry of queryable fields.
///
/// The four base fields (`id`, `collection`, `geometry`, and `datetime`) are
/// always present. Other fields apply to a set of collections.
#[derive(Debug, Clone)]
pub struct Queryables {
    title: String,
    collections: BTreeSet<String>,
    base: Vec<Queryable>,
    fields: BTreeMap<String, Queryable>,
}

impl Queryable {
    /// Creates a new queryable that applies to all collections.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Queryable, Storage, ValueType};
    ///
    /// let queryable = Queryable::new("gsd", Storage::Column("gsd".into()), ValueType::Number);
    /// ```
    pub fn new(name: impl ToString, storage: Storage, value_type: ValueType) -> Queryable {
        Queryable {
            name: name.to_string(),
            storage,
            value_type,
            title: None,
            reference: None,
            collections: None,
        }
    }

    /// Creates a new queryable stored in a column of the same name.
    pub fn column(name: impl ToString, value_type: ValueType) -> Queryable {
        let name = name.to_string();
        Queryable::new(name.clone(), Storage::Column(name), value_type)
    }

    /// Sets the title.
    pub fn title(mut self, title: impl ToString) -> Queryable {
        self.title = Some(title.to_string());
        self
    }

    /// Sets the JSON schema reference.
    pub fn reference(mut self, reference: impl ToString) -> Queryable {
        self.reference = Some(reference.to_string());
        self
    }

    /// Limits this queryable to some collections.
    pub fn collections(mut self, collections: impl IntoIterator<Item = impl ToString>) -> Queryable {
        self.collections = Some(collections.into_iter().map(|c| c.to_string()).collect());
        self
    }

    /// Returns this queryable as a resolved field reference.
    pub fn to_field_ref(&self) -> FieldRef {
        FieldRef {
            name: self.name.clone(),
            storage: self.storage.clone(),
            value_type: self.value_type,
        }
    }

    fn applies_to(&self, collection: &str) -> bool {
        self.collections
            .as_ref()
            .is_none_or(|collections| collections.contains(collection))
    }

    fn schema(&self) -> Value {
        let mut schema = Map::new();
        let _ = schema.insert(
            "description".into(),
            self.title.clone().unwrap_or_else(|| self.name.clone()).into(),
        );
        if let Some(reference) = &self.reference {
            let _ = schema.insert("$ref".into(), reference.clone().into());
        } else {
            let _ = schema.insert("type".into(), self.value_type.schema_type().into());
        }
        Value::Object(schema)
    }
}

impl ValueType {
    /// Returns the lowercase name of this value type.
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Datetime => "datetime",
            ValueType::Geometry => "geometry",
            ValueType::Id => "id",
        }
    }

    /// Returns the JSON schema type of this value type.
    pub fn schema_type(&self) -> &'static str {
        match self {
            ValueType::Number => "number",
            ValueType::Geometry => "Geometry",
            ValueType::String | ValueType::Datetime | ValueType::Id => "string",
        }
    }
}

impl Queryables {
    /// Creates a registry with only the base fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Queryables;
    ///
    /// let queryables = Queryables::new(["a-collection"]);
    /// assert!(queryables.resolve("datetime", &[]).is_ok());
    /// assert!(queryables.resolve("gsd", &[]).is_err());
    /// ```
    pub fn new(collections: impl IntoIterator<Item = impl ToString>) -> Queryables {
        Queryables {
            title: DEFAULT_TITLE.to_string(),
            collections: collections.into_iter().map(|c| c.to_string()).collect(),
            base: base_queryables(),
            fields: BTreeMap::new(),
        }
    }

    /// The queryables of the Skraafoto catalog.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Queryables, Storage};
    ///
    /// let queryables = Queryables::skraafoto();
    /// let field = queryables.resolve("view:azimuth", &["skraafotos2021".to_string()]).unwrap();
    /// assert_eq!(field.storage, Storage::Column("azimuth".into()));
    /// ```
    pub fn skraafoto() -> Queryables {
        use ValueType::{Number, String as Text};

        let fields = [
            ("pers:perspective_center.x", "easting", Number, "Easting", None),
            ("pers:perspective_center.y", "northing", Number, "Northing", None),
            ("pers:perspective_center.z", "height", Number, "Height", None),
            ("pers:vertical_crs", "vertical_crs", Number, "Perspective vertical_crs", None),
            ("pers:crs", "horisontal_crs", Number, "Perspective crs", None),
            ("pers:omega", "omega", Number, "Perspective omega", None),
            ("pers:phi", "phi", Number, "Perspective phi", None),
            ("pers:kappa", "kappa", Number, "Perspective kappa", None),
            ("direction", "direction", Text, "Direction", None),
            ("view:azimuth", "azimuth", Number, "View azimuth", None),
            ("view:off_nadir", "offnadir", Number, "View off_nadir", None),
            ("estimated_accuracy", "estacc", Number, "Estimated accuracy", None),
            ("providers.producer", "producer", Text, "(Providers) Producer name", None),
            (
                "gsd",
                "gsd",
                Number,
                "Ground Sample Distance",
                Some("instrument.json#/properties/gsd"),
            ),
            (
                "instruments",
                "camera_id",
                Text,
                "Instruments",
                Some("instrument.json#/properties/platform"),
            ),
            (
                "pers:interior_orientation.focal_length",
                "focal_length",
                Text,
                "Perspective (Interior Orientation) Focal Length",
                None,
            ),
            (
                "pers:interior_orientation.calibration_date",
                "calibration_date",
                Text,
                "Perspective (Interior Orientation) Calibration Date",
                None,
            ),
        ];
        fields.into_iter().fold(
            Queryables::new(SKRAAFOTO_COLLECTIONS),
            |queryables, (name, column, value_type, title, reference)| {
                let mut queryable =
                    Queryable::new(name, Storage::Column(column.to_string()), value_type)
                        .title(title)
                        .collections(SKRAAFOTO_COLLECTIONS);
                if let Some(reference) = reference {
                    queryable = queryable.reference(format!("{ITEM_SCHEMA}/{reference}"));
                }
                queryables.with_field(queryable)
            },
        )
    }

    /// Creates a registry from a configuration table.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Queryables, QueryablesConfig};
    /// use serde_json::json;
    ///
    /// let config: QueryablesConfig = serde_json::from_value(json!({
    ///     "collections": ["a", "b"],
    ///     "fields": [
    ///         {"name": "cloud_cover", "storage": {"property": "eo:cloud_cover"}, "type": "number"}
    ///     ]
    /// })).unwrap();
    /// let queryables = Queryables::from_config(config);
    /// assert!(queryables.resolve("cloud_cover", &["a".to_string()]).is_ok());
    /// ```
    pub fn from_config(config: QueryablesConfig) -> Queryables {
        let mut queryables = Queryables::new(config.collections);
        if let Some(title) = config.title {
            queryables.title = title;
        }
        config
            .fields
            .into_iter()
            .fold(queryables, Queryables::with_field)
    }

    /// Adds a field, replacing any field with the same name.
    pub fn with_field(mut self, queryable: Queryable) -> Queryables {
        let _ = self.fields.insert(queryable.name.clone(), queryable);
        self
    }

    /// Returns true if this collection is registered.
    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains(collection)
    }

    /// Returns the registered collection ids, sorted.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(String::as_str)
    }

    /// Returns the registered non-base fields, sorted by name.
    pub fn fields(&self) -> impl Iterator<Item = &Queryable> {
        self.fields.values()
    }

    /// Resolves a field name for a set of collections.
    ///
    /// Base fields always resolve. Other fields resolve if they apply to every
    /// given collection, or to every registered collection if none are given.
    /// Unregistered collection ids are ignored.
    pub fn resolve(&self, name: &str, collections: &[String]) -> Result<FieldRef> {
        if let Some(base) = self.base.iter().find(|q| q.name == name) {
            return Ok(base.to_field_ref());
        }
        self.fields
            .get(name)
            .filter(|queryable| self.applies(queryable, collections))
            .map(Queryable::to_field_ref)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))
    }

    /// Returns the base fields, in declaration order, and the non-base fields
    /// shared by all of the given collections, sorted by name.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Queryables;
    ///
    /// let queryables = Queryables::skraafoto();
    /// let (base, shared) = queryables.intersection(&[]);
    /// assert_eq!(base[0].name, "id");
    /// assert!(shared.windows(2).all(|w| w[0].name < w[1].name));
    /// ```
    pub fn intersection(&self, collections: &[String]) -> (Vec<&Queryable>, Vec<&Queryable>) {
        let base = self.base.iter().collect();
        let shared = self
            .fields
            .values()
            .filter(|queryable| self.applies(queryable, collections))
            .collect();
        (base, shared)
    }

    /// Returns the id base field.
    pub fn id(&self) -> FieldRef {
        self.base_field(0)
    }

    /// Returns the datetime base field.
    pub fn datetime(&self) -> FieldRef {
        self.base_field(3)
    }

    /// Returns the geometry base field.
    pub fn geometry(&self) -> FieldRef {
        self.base_field(2)
    }

    /// Returns the collection base field.
    pub fn collection(&self) -> FieldRef {
        self.base_field(1)
    }

    /// Returns the JSON-schema queryables document.
    ///
    /// With a collection, the document lists the fields of that collection,
    /// otherwise the fields shared by all collections.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Queryables;
    /// use url::Url;
    ///
    /// let base_url = Url::parse("https://api.example.com/stac/").unwrap();
    /// let schema = Queryables::skraafoto().schema(None, &base_url).unwrap();
    /// assert_eq!(schema["$id"], "https://api.example.com/stac/queryables");
    /// assert_eq!(schema["properties"]["gsd"]["description"], "Ground Sample Distance");
    /// ```
    pub fn schema(&self, collection: Option<&str>, base_url: &Url) -> Result<Value> {
        let collections = collection
            .map(|c| vec![c.to_string()])
            .unwrap_or_default();
        let (base, shared) = self.intersection(&collections);
        let properties: IndexMap<&str, Value> = base
            .into_iter()
            .chain(shared)
            .map(|queryable| (queryable.name.as_str(), queryable.schema()))
            .collect();
        let (id, title) = match collection {
            Some(collection) => (
                base_url.join(&format!("collections/{collection}/queryables"))?,
                capitalize(collection),
            ),
            None => (base_url.join("queryables")?, self.title.clone()),
        };
        Ok(json!({
            "$schema": QUERYABLES_SCHEMA,
            "$id": id,
            "type": "object",
            "title": title,
            "properties": properties,
        }))
    }

    fn applies(&self, queryable: &Queryable, collections: &[String]) -> bool {
        if collections.is_empty() {
            self.collections.iter().all(|c| queryable.applies_to(c))
        } else {
            let known: Vec<&String> = collections
                .iter()
                .filter(|c| self.collections.contains(*c))
                .collect();
            !known.is_empty() && known.iter().all(|c| queryable.applies_to(c))
        }
    }

    fn base_field(&self, index: usize) -> FieldRef {
        self.base[index].to_field_ref()
    }
}

impl Default for Queryables {
    fn default() -> Queryables {
        Queryables::skraafoto()
    }
}

fn base_queryables() -> Vec<Queryable> {
    vec![
        Queryable::column("id", ValueType::Id)
            .title("ID")
            .reference(format!("{ITEM_SCHEMA}/item.json#/id")),
        Queryable::new(
            "collection",
            Storage::Column("collection_id".into()),
            ValueType::String,
        )
        .title("Collection ID")
        .reference(format!("{ITEM_SCHEMA}/item.json#/collection")),
        Queryable::new(
            "geometry",
            Storage::Column("footprint".into()),
            ValueType::Geometry,
        )
        .title("Geometry")
        .reference(format!("{ITEM_SCHEMA}/item.json#/geometry")),
        Queryable::column("datetime", ValueType::Datetime)
            .title("Datetime")
            .reference(format!(
                "{ITEM_SCHEMA}/datetime.json#/properties/datetime"
            )),
    ]
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
