use super::{Backend, Query, Row};
use crate::{
    Error, Literal, Predicate, Queryables, Record, Result, ValueType, api::Collection,
    predicate::Operand,
};
use geo::{BoundingRect, Geometry, Intersects};
use serde_json::Value;
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};

/// A naive backend that stores records in memory and evaluates predicates
/// with [geo].
///
/// # Examples
///
/// ```
/// use flyfoto::{Record, backend::MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// backend.add_record(Record::new("an-id", "a-collection")).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    collections: Arc<RwLock<BTreeMap<String, Collection>>>,
    entries: Arc<RwLock<BTreeMap<(String, String), Entry>>>,
}

#[derive(Debug, Clone)]
struct Entry {
    record: Record,
    footprint: Option<Geometry>,
}

impl MemoryBackend {
    /// Creates a new, empty backend.
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    /// Registers a collection, even if it has no records.
    ///
    /// A collection that is already registered keeps its document.
    pub fn add_collection(&self, collection: impl ToString) {
        let id = collection.to_string();
        let _ = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_insert_with(|| {
                let mut document = Collection::new();
                let _ = document.insert("type".into(), "Collection".into());
                let _ = document.insert("id".into(), id.into());
                document
            });
    }

    /// Registers a collection with its document, replacing any previous document.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{api::Collection, backend::MemoryBackend};
    ///
    /// let backend = MemoryBackend::new();
    /// let mut document = Collection::new();
    /// let _ = document.insert("title".into(), "Skråfotos 2021".into());
    /// backend.add_collection_document("skraafotos2021", document);
    /// ```
    pub fn add_collection_document(&self, id: impl ToString, mut document: Collection) {
        let id = id.to_string();
        let _ = document.insert("id".into(), id.clone().into());
        let _ = document
            .entry("type")
            .or_insert_with(|| "Collection".into());
        let _ = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, document);
    }

    /// Adds a record, replacing any record with the same collection and id.
    pub fn add_record(&self, record: Record) -> Result<()> {
        let footprint = record
            .footprint
            .clone()
            .map(Geometry::try_from)
            .transpose()
            .map_err(Box::new)?;
        self.add_collection(&record.collection);
        let _ = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (record.collection.clone(), record.id.clone()),
                Entry { record, footprint },
            );
        Ok(())
    }

    /// Adds STAC items, either a single item, an array, or a feature collection.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Queryables, backend::MemoryBackend};
    /// use serde_json::json;
    ///
    /// let backend = MemoryBackend::new();
    /// backend.add_features(json!({
    ///     "type": "FeatureCollection",
    ///     "features": [{"type": "Feature", "id": "a", "collection": "c", "geometry": null, "properties": {}}]
    /// }), &Queryables::skraafoto()).unwrap();
    /// ```
    pub fn add_features(&self, value: Value, queryables: &Queryables) -> Result<()> {
        let features = match value {
            Value::Array(features) => features,
            Value::Object(mut object) => match object.remove("features") {
                Some(Value::Array(features)) => features,
                _ => vec![Value::Object(object)],
            },
            value => vec![value],
        };
        for feature in features {
            self.add_record(Record::from_feature(feature, queryables)?)?;
        }
        Ok(())
    }

    fn select(&self, query: &Query) -> Vec<Row> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<Row> = entries
            .values()
            .filter(|entry| entry.matches(&query.predicate))
            .map(|entry| Row {
                keys: query
                    .sort
                    .iter()
                    .map(|key| entry.eval(&key.operand))
                    .collect(),
                record: entry.record.clone(),
            })
            .collect();
        rows.sort_by(|a, b| {
            query
                .sort
                .iter()
                .zip(a.keys.iter().zip(&b.keys))
                .map(|(key, (a, b))| key.direction.apply(sort_cmp(a, b)))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        if let Some(fetch) = query.fetch {
            rows.truncate(fetch);
        }
        rows
    }
}

impl Backend for MemoryBackend {
    type Error = Error;

    async fn fetch(&self, query: &Query) -> Result<Vec<Row>> {
        Ok(self.select(query))
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .values()
            .filter(|entry| entry.matches(&query.predicate))
            .count() as u64)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(collection))
    }

    async fn collections(&self) -> Result<Vec<Collection>> {
        Ok(self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    async fn collection(&self, id: &str) -> Result<Option<Collection>> {
        Ok(self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    async fn record(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection.to_string(), id.to_string()))
            .map(|entry| entry.record.clone()))
    }
}

impl Entry {
    fn matches(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::True => true,
            Predicate::And(children) => children.iter().all(|child| self.matches(child)),
            Predicate::Or(children) => children.iter().any(|child| self.matches(child)),
            Predicate::Not(child) => !self.matches(child),
            Predicate::Compare { op, lhs, rhs } => compare(&self.eval(lhs), &self.eval(rhs))
                .is_some_and(|ordering| op.matches(ordering)),
            Predicate::Between {
                value,
                lower,
                upper,
            } => {
                let value = self.eval(value);
                compare(&value, &self.eval(lower)).is_some_and(Ordering::is_ge)
                    && compare(&value, &self.eval(upper)).is_some_and(Ordering::is_le)
            }
            Predicate::IsNull(Operand::Field(field)) if field.value_type == ValueType::Geometry => {
                self.footprint.is_none()
            }
            Predicate::IsNull(operand) => self.eval(operand) == Literal::Null,
            Predicate::Like { value, pattern } => match self.eval(value) {
                Literal::Text(text) => like(&text, pattern),
                _ => false,
            },
            Predicate::In { value, list } => {
                let value = self.eval(value);
                list.iter()
                    .any(|item| compare(&value, &self.eval(item)).is_some_and(Ordering::is_eq))
            }
            Predicate::Intersects { geometry, .. } => self
                .footprint
                .as_ref()
                .is_some_and(|footprint| footprint.intersects(geometry)),
            Predicate::Keyset(keyset) => self.matches(&keyset.expand()),
        }
    }

    fn eval(&self, operand: &Operand) -> Literal {
        match operand {
            Operand::Field(field) if field.value_type == ValueType::Geometry => Literal::Null,
            Operand::Field(field) => self.record.literal(&field.storage, field.value_type),
            Operand::Literal(literal) => literal.clone(),
            Operand::Arithmetic { op, lhs, rhs } => match (self.eval(lhs), self.eval(rhs)) {
                (Literal::Number(lhs), Literal::Number(rhs)) => {
                    op.apply(lhs, rhs).map(Literal::Number).unwrap_or(Literal::Null)
                }
                _ => Literal::Null,
            },
            Operand::Distance { origin, .. } => self
                .footprint
                .as_ref()
                .and_then(|footprint| footprint.bounding_rect())
                .map(|rect| {
                    let center = rect.center();
                    Literal::Number((center.x - origin.x()).hypot(center.y - origin.y()))
                })
                .unwrap_or(Literal::Null),
        }
    }
}

/// Compares two values the way a SQL comparison does: nulls and mismatched
/// types don't compare.
fn compare(a: &Literal, b: &Literal) -> Option<Ordering> {
    match (a, b) {
        (Literal::Number(a), Literal::Number(b)) => a.partial_cmp(b),
        (Literal::Text(a), Literal::Text(b)) => Some(a.cmp(b)),
        (Literal::Timestamp(a), Literal::Timestamp(b)) => Some(a.cmp(b)),
        (Literal::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// A total order for sorting, nulls lowest.
fn sort_cmp(a: &Literal, b: &Literal) -> Ordering {
    compare(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

fn rank(literal: &Literal) -> u8 {
    match literal {
        Literal::Null => 0,
        Literal::Bool(_) => 1,
        Literal::Number(_) => 2,
        Literal::Text(_) => 3,
        Literal::Timestamp(_) => 4,
    }
}

/// SQL `LIKE`: `%` matches any run of characters, `_` exactly one.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    // matched[j]: the text so far matches pattern[..j]
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }
    for c in text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == c,
            };
        }
        matched = next;
    }
    matched[pattern.len()]
}

#[cfg(test)]
mod tests {
    use super::{MemoryBackend, like, sort_cmp};
    use crate::{
        Literal, Predicate, Queryables, Record,
        api::Direction,
        backend::{Backend, Query},
        pagination::SortKey,
        predicate::Comparison,
    };
    use geo::{Point, polygon};
    use rstest::{fixture, rstest};
    use std::cmp::Ordering;

    #[fixture]
    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for (id, x, gsd) in [("a", 10.0, 0.1), ("b", 11.0, 0.2), ("c", 12.0, 0.3)] {
            let footprint = geo::Geometry::from(polygon![
                (x: x, y: 56.0),
                (x: x + 0.5, y: 56.0),
                (x: x + 0.5, y: 56.5),
                (x: x, y: 56.5),
            ]);
            backend
                .add_record(
                    Record::new(id, "skraafotos2021")
                        .footprint(geojson::Geometry::new(geojson::Value::from(&footprint)))
                        .column("gsd", gsd),
                )
                .unwrap();
        }
        backend
            .add_record(Record::new("no-footprint", "skraafotos2021"))
            .unwrap();
        backend
    }

    fn ids(rows: &[super::Row]) -> Vec<&str> {
        rows.iter().map(|row| row.record.id.as_str()).collect()
    }

    #[rstest]
    #[case("2021_83", "2021%", true)]
    #[case("2021_83", "2021_83", true)]
    #[case("2021x83", "2021_83", true)]
    #[case("2021_83", "%83", true)]
    #[case("2021_83", "%84", false)]
    #[case("", "%", true)]
    #[case("abc", "a_", false)]
    fn like_patterns(#[case] text: &str, #[case] pattern: &str, #[case] expected: bool) {
        assert_eq!(like(text, pattern), expected);
    }

    #[test]
    fn nulls_sort_first() {
        assert_eq!(
            sort_cmp(&Literal::Null, &Literal::Number(-1.0)),
            Ordering::Less
        );
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_sorted(backend: MemoryBackend) {
        let queryables = Queryables::skraafoto();
        let gsd = queryables.resolve("gsd", &[]).unwrap();
        let query = Query::new(
            Predicate::compare(gsd.clone(), Comparison::Gte, Literal::Number(0.2)),
            vec![SortKey::field(gsd, Direction::Descending)],
        );
        let rows = backend.fetch(&query).await.unwrap();
        assert_eq!(ids(&rows), ["c", "b"]);
        assert_eq!(rows[0].keys, vec![Literal::Number(0.3)]);
        assert_eq!(backend.count(&query).await.unwrap(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn distance(backend: MemoryBackend) {
        let queryables = Queryables::skraafoto();
        let query = Query::new(
            Predicate::True,
            vec![
                SortKey::distance(queryables.geometry(), Point::new(12.2, 56.2)),
                SortKey::field(queryables.id(), Direction::Ascending),
            ],
        )
        .fetch(3);
        let rows = backend.fetch(&query).await.unwrap();
        // The record without a footprint has a null distance, which sorts first.
        assert_eq!(ids(&rows), ["no-footprint", "c", "b"]);
    }

    #[rstest]
    #[tokio::test]
    async fn intersects(backend: MemoryBackend) {
        let queryables = Queryables::skraafoto();
        let query = Query::new(
            Predicate::Intersects {
                field: queryables.geometry(),
                geometry: Point::new(11.25, 56.25).into(),
            },
            Vec::new(),
        );
        assert_eq!(ids(&backend.fetch(&query).await.unwrap()), ["b"]);
        let query = Query::new(
            Predicate::IsNull(crate::predicate::Operand::Field(queryables.geometry())),
            Vec::new(),
        );
        assert_eq!(ids(&backend.fetch(&query).await.unwrap()), ["no-footprint"]);
    }

    #[rstest]
    #[tokio::test]
    async fn lookups(backend: MemoryBackend) {
        assert!(backend.collection_exists("skraafotos2021").await.unwrap());
        assert!(!backend.collection_exists("skraafotos2017").await.unwrap());
        assert!(backend.record("skraafotos2021", "a").await.unwrap().is_some());
        assert!(backend.record("skraafotos2019", "a").await.unwrap().is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn collection_documents(backend: MemoryBackend) {
        let mut document = crate::api::Collection::new();
        let _ = document.insert("title".into(), "Skråfotos 2019".into());
        backend.add_collection_document("skraafotos2019", document);
        backend.add_collection("skraafotos2019");
        backend
            .add_record(Record::new("d", "skraafotos2019"))
            .unwrap();

        let collections = backend.collections().await.unwrap();
        let ids: Vec<&serde_json::Value> = collections.iter().map(|c| &c["id"]).collect();
        assert_eq!(ids, ["skraafotos2019", "skraafotos2021"]);

        let collection = backend.collection("skraafotos2019").await.unwrap().unwrap();
        assert_eq!(collection["title"], "Skråfotos 2019");
        assert_eq!(collection["type"], "Collection");
        let collection = backend.collection("skraafotos2021").await.unwrap().unwrap();
        assert_eq!(collection.len(), 2);
        assert!(backend.collection("skraafotos2017").await.unwrap().is_none());
    }
}
