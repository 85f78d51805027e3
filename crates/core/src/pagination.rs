//! Keyset pagination.
//!
//! A page boundary is remembered by the sort-key values of the row on that
//! boundary. The next request turns those values back into a [Keyset] bound,
//! so resuming costs the same on page one thousand as on page two.
//!
//! Nulls sort first in ascending order and last in descending order, i.e. a
//! null is lower than every other value.

use crate::{
    Config, Error, Record, Result, ValueType,
    api::Direction,
    backend::Row,
    config::CursorPolicy,
    predicate::{Comparison, FieldRef, Literal, Operand, Predicate},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use geo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// The sorted expression, a field or a distance.
    pub operand: Operand,

    /// The direction.
    pub direction: Direction,
}

/// The full sort order of a search, always ending with a unique key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

/// A pagination bound: rows that sort strictly after `values` under `keys`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyset {
    /// The sort keys, in query order.
    pub keys: Vec<SortKey>,

    /// One bookmark value per key.
    pub values: Vec<Literal>,
}

/// Which way a cursor points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDirection {
    /// The rows after the bookmark.
    Next,

    /// The rows before the bookmark.
    Previous,
}

/// A decoded pagination token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Which way this cursor points.
    pub direction: PageDirection,

    /// The sort-key values of the bookmarked row.
    pub values: Vec<Value>,

    /// The signature of the sort that produced this cursor.
    pub sort: String,
}

/// The pagination state of one request.
#[derive(Debug, Clone)]
pub struct PageRequest {
    sort: SortSpec,
    limit: usize,
    bookmark: Option<Bookmark>,
}

#[derive(Debug, Clone)]
struct Bookmark {
    direction: PageDirection,
    values: Vec<Literal>,
}

/// A page of records with its neighbours' tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated {
    /// The records, in sort order.
    pub records: Vec<Record>,

    /// True if there are records after this page.
    pub has_next: bool,

    /// True if there are records before this page.
    pub has_previous: bool,

    /// The token of the next page.
    pub next: Option<String>,

    /// The token of the previous page.
    pub previous: Option<String>,
}

impl SortKey {
    /// Sorts on a field.
    pub fn field(field: FieldRef, direction: Direction) -> SortKey {
        SortKey {
            operand: Operand::Field(field),
            direction,
        }
    }

    /// Sorts closest first, by distance from `origin` to the centroid of the
    /// field's bounding envelope.
    pub fn distance(field: FieldRef, origin: Point) -> SortKey {
        SortKey {
            operand: Operand::Distance { field, origin },
            direction: Direction::Ascending,
        }
    }

    /// Returns the name of this key as it appears in a sort signature.
    pub fn name(&self) -> String {
        match &self.operand {
            Operand::Field(field) => field.name.clone(),
            Operand::Distance { field, origin } => {
                format!("distance({},{},{})", field.name, origin.x(), origin.y())
            }
            Operand::Literal(_) | Operand::Arithmetic { .. } => "expression".to_string(),
        }
    }

    /// Returns the type of this key's values.
    pub fn value_type(&self) -> ValueType {
        match &self.operand {
            Operand::Field(field) => field.value_type,
            _ => ValueType::Number,
        }
    }

    fn reversed(&self) -> SortKey {
        SortKey {
            operand: self.operand.clone(),
            direction: self.direction.reverse(),
        }
    }

    /// Rows whose key is strictly after `value`.
    fn after(&self, value: &Literal) -> Predicate {
        let operand = self.operand.clone();
        match (self.direction, value) {
            (Direction::Ascending, Literal::Null) => {
                Predicate::Not(Box::new(Predicate::IsNull(operand)))
            }
            (Direction::Ascending, value) => Predicate::Compare {
                op: Comparison::Gt,
                lhs: operand,
                rhs: Operand::Literal(value.clone()),
            },
            (Direction::Descending, Literal::Null) => Predicate::Not(Box::new(Predicate::True)),
            (Direction::Descending, value) => Predicate::Or(vec![
                Predicate::Compare {
                    op: Comparison::Lt,
                    lhs: operand.clone(),
                    rhs: Operand::Literal(value.clone()),
                },
                Predicate::IsNull(operand),
            ]),
        }
    }

    /// Rows whose key equals `value`, nulls included.
    fn equal(&self, value: &Literal) -> Predicate {
        match value {
            Literal::Null => Predicate::IsNull(self.operand.clone()),
            value => Predicate::Compare {
                op: Comparison::Eq,
                lhs: self.operand.clone(),
                rhs: Operand::Literal(value.clone()),
            },
        }
    }
}

impl SortSpec {
    /// Creates a sort spec, appending `tiebreak` ascending unless a key
    /// already sorts on it.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Queryables, api::Direction, pagination::{SortKey, SortSpec}};
    ///
    /// let queryables = Queryables::skraafoto();
    /// let sort = SortSpec::new(
    ///     vec![SortKey::field(queryables.datetime(), Direction::Descending)],
    ///     queryables.id(),
    /// );
    /// assert_eq!(sort.signature(), "datetime:desc,id:asc");
    /// ```
    pub fn new(mut keys: Vec<SortKey>, tiebreak: FieldRef) -> SortSpec {
        let has_tiebreak = keys
            .iter()
            .any(|key| matches!(&key.operand, Operand::Field(field) if *field == tiebreak));
        if !has_tiebreak {
            keys.push(SortKey::field(tiebreak, Direction::Ascending));
        }
        SortSpec { keys }
    }

    /// Returns the keys.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Renders this sort, e.g. `datetime:desc,id:asc`.
    pub fn signature(&self) -> String {
        self.keys
            .iter()
            .map(|key| format!("{}:{}", key.name(), key.direction))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Returns this sort with every direction flipped.
    pub fn reversed(&self) -> SortSpec {
        SortSpec {
            keys: self.keys.iter().map(SortKey::reversed).collect(),
        }
    }
}

impl Keyset {
    /// Expands this bound into plain comparisons.
    ///
    /// For keys `k1, k2` and values `v1, v2` this is
    /// `k1 after v1 OR (k1 = v1 AND k2 after v2)`.
    pub fn expand(&self) -> Predicate {
        let mut alternatives = Vec::with_capacity(self.keys.len());
        for (i, (key, value)) in self.keys.iter().zip(&self.values).enumerate() {
            let mut conjuncts: Vec<Predicate> = self
                .keys
                .iter()
                .zip(&self.values)
                .take(i)
                .map(|(key, value)| key.equal(value))
                .collect();
            conjuncts.push(key.after(value));
            alternatives.push(Predicate::and(conjuncts));
        }
        Predicate::Or(alternatives)
    }
}

impl Cursor {
    /// Encodes this cursor as an opaque, URL-safe token.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::pagination::{Cursor, PageDirection};
    /// use serde_json::json;
    ///
    /// let cursor = Cursor {
    ///     direction: PageDirection::Next,
    ///     values: vec![json!("an-id")],
    ///     sort: "id:asc".to_string(),
    /// };
    /// let token = cursor.token().unwrap();
    /// assert_eq!(Cursor::parse(&token).unwrap(), cursor);
    /// ```
    pub fn token(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes a token.
    ///
    /// This never touches storage, the values are only used when the next
    /// query runs.
    pub fn parse(token: &str) -> Result<Cursor> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| Error::InvalidCursor(token.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|_| Error::InvalidCursor(token.to_string()))
    }
}

impl PageRequest {
    /// Creates a request for the first page.
    pub fn new(sort: SortSpec, limit: usize) -> PageRequest {
        PageRequest {
            sort,
            limit,
            bookmark: None,
        }
    }

    /// Resumes from a token.
    ///
    /// A token that can't be decoded, or that was produced by a different
    /// sort, is an error under [CursorPolicy::Strict]. Under
    /// [CursorPolicy::Lenient] it's logged and the first page is served.
    pub fn with_token(mut self, token: Option<&str>, config: &Config) -> Result<PageRequest> {
        let Some(token) = token else {
            return Ok(self);
        };
        match self.bookmark(token) {
            Ok(bookmark) => self.bookmark = Some(bookmark),
            Err(err) => match config.cursor_policy {
                CursorPolicy::Strict => return Err(err),
                CursorPolicy::Lenient => {
                    tracing::warn!(%err, "ignoring pagination token, serving the first page")
                }
            },
        }
        Ok(self)
    }

    /// Returns the sort, in page order.
    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// Returns the page size.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns how many rows to fetch, one more than the limit to detect a
    /// further page.
    pub fn fetch(&self) -> usize {
        self.limit + 1
    }

    /// Returns the direction this request pages in.
    pub fn direction(&self) -> PageDirection {
        self.bookmark
            .as_ref()
            .map(|bookmark| bookmark.direction)
            .unwrap_or(PageDirection::Next)
    }

    /// Returns the sort to query with, reversed when paging backwards.
    pub fn query_sort(&self) -> SortSpec {
        match self.direction() {
            PageDirection::Next => self.sort.clone(),
            PageDirection::Previous => self.sort.reversed(),
        }
    }

    /// Returns the keyset bound for the query, if resuming from a token.
    pub fn keyset(&self) -> Option<Keyset> {
        self.bookmark.as_ref().map(|bookmark| Keyset {
            keys: self.query_sort().keys,
            values: bookmark.values.clone(),
        })
    }

    /// Turns the fetched rows into a page.
    ///
    /// `rows` must come back in [PageRequest::query_sort] order, with at
    /// most [PageRequest::fetch] rows.
    pub fn paginate(&self, mut rows: Vec<Row>) -> Result<Paginated> {
        let has_more = rows.len() > self.limit;
        rows.truncate(self.limit);
        let (has_next, has_previous) = match (&self.bookmark, self.direction()) {
            (None, _) => (has_more, false),
            (Some(_), PageDirection::Next) => (has_more, true),
            (Some(_), PageDirection::Previous) => {
                rows.reverse();
                (true, has_more)
            }
        };
        let signature = self.sort.signature();
        let token = |row: Option<&Row>, direction: PageDirection| -> Result<Option<String>> {
            row.map(|row| {
                Cursor {
                    direction,
                    values: row.keys.iter().map(Literal::to_json).collect(),
                    sort: signature.clone(),
                }
                .token()
            })
            .transpose()
        };
        let next = if has_next {
            token(rows.last(), PageDirection::Next)?
        } else {
            None
        };
        let previous = if has_previous {
            token(rows.first(), PageDirection::Previous)?
        } else {
            None
        };
        Ok(Paginated {
            records: rows.into_iter().map(|row| row.record).collect(),
            has_next,
            has_previous,
            next,
            previous,
        })
    }

    fn bookmark(&self, token: &str) -> Result<Bookmark> {
        let cursor = Cursor::parse(token)?;
        let signature = self.sort.signature();
        if cursor.sort != signature {
            return Err(Error::InvalidCursor(format!(
                "token was issued for sort {} but this search sorts by {}",
                cursor.sort, signature
            )));
        }
        if cursor.values.len() != self.sort.keys.len() {
            return Err(Error::InvalidCursor(token.to_string()));
        }
        let values = self
            .sort
            .keys
            .iter()
            .zip(&cursor.values)
            .map(|(key, value)| {
                Literal::cast(value, key.value_type())
                    .ok_or_else(|| Error::InvalidCursor(token.to_string()))
            })
            .collect::<Result<_>>()?;
        Ok(Bookmark {
            direction: cursor.direction,
            values,
        })
    }
}
