use crate::Crs;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// Error enum for crate-specific errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// An error returned by a storage backend.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Returned when a search has both `bbox` and `intersects` set.
    #[error("intersects and bbox parameters are mutually exclusive")]
    BboxAndIntersects,

    /// A minimum bound of a bbox is greater than its maximum bound.
    #[error("Maximum {0} must be greater than minimum {0}")]
    BboxMinGreaterThanMax(&'static str),

    /// The search was cancelled before the backend answered.
    #[error("search was cancelled")]
    Cancelled,

    /// A filter references a field that is not queryable for the targeted collections.
    #[error("Cannot search on field: {0}")]
    CannotSearchOnField(String),

    /// [chrono::ParseError]
    #[error(transparent)]
    ChronoParse(#[from] chrono::ParseError),

    /// The collection does not exist.
    #[error("Collection {0} not found")]
    CollectionNotFound(String),

    /// Both ends of a datetime interval are open.
    #[error("Double open-ended intervals are not allowed.")]
    DoubleOpenInterval,

    /// A sortby references a field that is not queryable.
    #[error("No matching field name: {0}")]
    FieldNotFound(String),

    /// The filter document could not be interpreted as a known expression node.
    #[error("Unable to parse expression node {0}")]
    FilterParse(serde_json::Value),

    /// [geojson::Error]
    #[error(transparent)]
    Geojson(#[from] Box<geojson::Error>),

    /// A CRS parameter names an unsupported reference system.
    #[error("CRS provided for argument {argument} is invalid, valid options are: {}", .valid.join(", "))]
    InvalidCrs {
        /// The name of the request argument, e.g. `bbox-crs`.
        argument: &'static str,

        /// The value that was provided.
        value: String,

        /// The supported CRS URIs.
        valid: Vec<String>,
    },

    /// The configuration can't be served, e.g. it lists a CRS the reprojector doesn't handle.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// This vector is not a valid bounding box.
    #[error("invalid bbox: {0:?}")]
    InvalidBbox(Vec<f64>),

    /// The pagination token can't be used for this search.
    #[error("invalid pagination token: {0}")]
    InvalidCursor(String),

    /// This string is not a valid RFC 3339 datetime or datetime interval.
    #[error("Invalid RFC3339 datetime: {0}")]
    InvalidDatetime(String),

    /// Only `cql-json` is supported as a filter language.
    #[error("invalid filter-lang: {0}, only cql-json is supported")]
    InvalidFilterLang(String),

    /// The limit is not a positive integer.
    #[error("invalid limit: {0}, limit must be a positive integer")]
    InvalidLimit(String),

    /// A literal can't be compared with a field of this type.
    #[error("invalid {expected} value for field {field}: {value}")]
    InvalidLiteral {
        /// The field name.
        field: String,

        /// The expected value type.
        expected: &'static str,

        /// The offending literal.
        value: serde_json::Value,
    },

    /// A sortby entry has no field name, or names a field that can't be
    /// ordered, such as a geometry.
    #[error("invalid sortby: {0:?}")]
    InvalidSortby(String),

    /// The item does not exist.
    #[error("Item {0} not found")]
    ItemNotFound(String),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// [serde_urlencoded::ser::Error]
    #[error(transparent)]
    SerdeUrlencodedSer(#[from] serde_urlencoded::ser::Error),

    /// Returned when the start datetime is after the end datetime.
    #[error("start datetime ({0}) is after end datetime ({1})")]
    StartIsAfterEnd(DateTime<FixedOffset>, DateTime<FixedOffset>),

    /// A sortby started with a space, which is what an unencoded `+` becomes.
    #[error(
        "Invalid parameters provided, if using + notation (+datetime), remember to URL encode the request"
    )]
    UnencodedSortby(String),

    /// The filter uses an operator outside the supported set.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// There's no transformation between these reference systems.
    #[error("unsupported reprojection: {from} to {to}")]
    UnsupportedReprojection {
        /// The source CRS.
        from: Crs,

        /// The target CRS.
        to: Crs,
    },

    /// [url::ParseError]
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
}

/// The broad category of an [Error], used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request is malformed.
    Validation,

    /// A field name does not resolve to a queryable.
    FieldNotFound,

    /// The filter uses an unsupported operator.
    UnsupportedOperation,

    /// The filter document has an unknown shape.
    FilterParse,

    /// A collection or item does not exist.
    NotFound,

    /// The pagination token is unusable.
    InvalidCursor,

    /// The search was cancelled.
    Cancelled,

    /// Storage or internal failure.
    Backend,
}

impl Error {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::Backend(Box::new(err))
    }

    /// Returns the kind of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Error, ErrorKind};
    ///
    /// assert_eq!(Error::DoubleOpenInterval.kind(), ErrorKind::Validation);
    /// assert_eq!(Error::CollectionNotFound("x".into()).kind(), ErrorKind::NotFound);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CannotSearchOnField(_) | Error::FieldNotFound(_) => ErrorKind::FieldNotFound,
            Error::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Error::FilterParse(_) => ErrorKind::FilterParse,
            Error::CollectionNotFound(_) | Error::ItemNotFound(_) => ErrorKind::NotFound,
            Error::InvalidCursor(_) => ErrorKind::InvalidCursor,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Backend(_)
            | Error::InvalidConfig(_)
            | Error::SerdeUrlencodedSer(_)
            | Error::UnsupportedReprojection { .. }
            | Error::UrlParse(_) => ErrorKind::Backend,
            _ => ErrorKind::Validation,
        }
    }
}
