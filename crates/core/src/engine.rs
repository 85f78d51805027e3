//! The search orchestrator.
//!
//! A search goes through the same steps every time: validate the request,
//! resolve its fields, build the filter and the spatial and temporal clauses,
//! resolve the sort, bound the page, run the query, count, and turn records
//! into items. Everything up to running the query is pure and available on
//! its own through [SearchEngine::compile].

use crate::{
    Config, Crs, Error, Predicate, Queryables, Record, Reproject, Result, Storage,
    TransverseMercator, ValueType,
    api::{Collection, Direction, Item, Items, Search},
    backend::{Backend, Query},
    filter::Compiler,
    pagination::{PageRequest, SortKey, SortSpec},
    predicate::{FieldRef, Literal, Operand},
    spatial::{Spatial, spatial_clause, temporal_clause},
};
use chrono::Utc;
use geo::{BoundingRect, Point};
use serde_json::{Map, Value, json};
use std::{future::Future, sync::Arc};
use url::Url;

/// The STAC version of returned items.
pub const STAC_VERSION: &str = "1.0.0";

/// Runs searches against a backend.
///
/// The engine is cheap to clone: the queryables, configuration and
/// reprojector are shared.
///
/// # Examples
///
/// ```
/// use flyfoto::{SearchEngine, api::Search, backend::MemoryBackend};
///
/// let engine = SearchEngine::new(MemoryBackend::new());
/// let compiled = engine.compile(&Search::new().limit(5)).unwrap();
/// assert_eq!(compiled.limit, 5);
/// assert_eq!(compiled.sort_signature(), "datetime:desc,id:asc");
/// ```
#[derive(Debug, Clone)]
pub struct SearchEngine<B: Backend> {
    backend: B,
    queryables: Arc<Queryables>,
    config: Arc<Config>,
    reprojector: Arc<dyn Reproject>,
}

/// A search, compiled down to a storage query.
#[derive(Debug, Clone)]
pub struct CompiledSearch {
    /// The row selection, without the pagination bound. This is what gets counted.
    pub predicate: Predicate,

    /// The query to fetch the page with.
    pub query: Query,

    /// The pagination state.
    pub page: PageRequest,

    /// The output CRS.
    pub crs: Crs,

    /// The effective page size.
    pub limit: u64,

    /// The number of requested ids, for id searches.
    pub ids: Option<u64>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResultPage {
    /// The items, at most `limit` of them.
    pub features: Vec<Item>,

    /// The total number of matches, when counting is enabled and succeeded.
    pub matched: Option<u64>,

    /// The token of the next page.
    pub next: Option<String>,

    /// The token of the previous page.
    pub previous: Option<String>,

    /// The CRS of the features' geometries and bboxes.
    pub crs: Crs,

    /// The effective page size.
    pub limit: u64,
}

impl<B: Backend> SearchEngine<B> {
    /// Creates an engine with the Skraafoto queryables, the default
    /// configuration, and [TransverseMercator] reprojection.
    pub fn new(backend: B) -> SearchEngine<B> {
        SearchEngine {
            backend,
            queryables: Arc::new(Queryables::skraafoto()),
            config: Arc::new(Config::default()),
            reprojector: Arc::new(TransverseMercator),
        }
    }

    /// Sets the queryables.
    pub fn with_queryables(mut self, queryables: Queryables) -> SearchEngine<B> {
        self.queryables = Arc::new(queryables);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: Config) -> SearchEngine<B> {
        self.config = Arc::new(config);
        self
    }

    /// Sets the configuration, after checking it with [Config::validate].
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Config, Crs, SearchEngine, backend::MemoryBackend};
    ///
    /// let config = Config {
    ///     supported_crs: vec![Crs::Crs84, Crs::Epsg(3857)],
    ///     ..Default::default()
    /// };
    /// assert!(SearchEngine::new(MemoryBackend::new()).try_with_config(config).is_err());
    /// ```
    pub fn try_with_config(self, config: Config) -> Result<SearchEngine<B>> {
        config.validate(self.reprojector.as_ref())?;
        Ok(self.with_config(config))
    }

    /// Sets the reprojector.
    pub fn with_reprojector(mut self, reprojector: impl Reproject + 'static) -> SearchEngine<B> {
        self.reprojector = Arc::new(reprojector);
        self
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the queryables.
    pub fn queryables(&self) -> &Queryables {
        &self.queryables
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compiles a search into a storage query, without touching storage.
    ///
    /// Every validation error surfaces here, before any backend call.
    pub fn compile(&self, search: &Search) -> Result<CompiledSearch> {
        let search = search.clone().valid()?;
        let supported = &self.config.supported_crs;
        let crs = Crs::resolve(search.crs.as_deref(), "crs", supported, Crs::Crs84)?;
        let bbox_crs = Crs::resolve(search.bbox_crs.as_deref(), "bbox-crs", supported, Crs::Crs84)?;
        let filter_crs =
            Crs::resolve(search.filter_crs.as_deref(), "filter-crs", supported, Crs::Crs84)?;
        let limit = self.limit(search.limit)?;

        let mut parts = Vec::new();
        if !search.collections.is_empty() {
            parts.push(in_list(self.queryables.collection(), &search.collections));
        }
        let mut ordering_point = None;
        if search.ids.is_empty() {
            if let Some(filter) = &search.filter {
                let compiler = Compiler {
                    queryables: &self.queryables,
                    collections: &search.collections,
                    storage_crs: self.config.storage_crs,
                    reprojector: self.reprojector.as_ref(),
                };
                let compiled = compiler.compile(filter, filter_crs)?;
                parts.push(compiled.predicate);
                ordering_point = compiled.ordering_point;
            }
            let spatial = match (&search.bbox, &search.intersects) {
                (Some(bbox), _) => Some(Spatial::Bbox(*bbox)),
                (None, Some(intersects)) => Some(Spatial::Intersects(intersects)),
                (None, None) => None,
            };
            if let Some(spatial) = spatial {
                let clause = spatial_clause(
                    spatial,
                    bbox_crs,
                    self.config.storage_crs,
                    self.reprojector.as_ref(),
                    self.queryables.geometry(),
                )?;
                parts.push(clause.predicate);
                ordering_point = clause.centroid.or(ordering_point);
            }
            if let Some(datetime) = &search.datetime {
                parts.push(temporal_clause(datetime, self.queryables.datetime())?);
            }
        } else {
            parts.push(in_list(self.queryables.id(), &search.ids));
        }
        let predicate = Predicate::and(parts);

        let sort = SortSpec::new(
            self.sort_keys(&search, ordering_point)?,
            self.queryables.id(),
        );
        let page =
            PageRequest::new(sort, limit as usize).with_token(search.pt.as_deref(), &self.config)?;
        let mut query_parts = vec![predicate.clone()];
        if let Some(keyset) = page.keyset() {
            query_parts.push(Predicate::Keyset(keyset));
        }
        let query =
            Query::new(Predicate::and(query_parts), page.query_sort().keys().to_vec()).fetch(page.fetch());
        tracing::debug!(?query, "compiled search");
        Ok(CompiledSearch {
            predicate,
            query,
            page,
            crs,
            limit,
            ids: (!search.ids.is_empty()).then_some(search.ids.len() as u64),
        })
    }

    /// Runs a search.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Record, SearchEngine, api::Search, backend::MemoryBackend};
    ///
    /// let backend = MemoryBackend::new();
    /// backend.add_record(Record::new("an-id", "skraafotos2021")).unwrap();
    /// let engine = SearchEngine::new(backend);
    /// # tokio_test::block_on(async {
    /// let page = engine.search(Search::new()).await.unwrap();
    /// assert_eq!(page.features.len(), 1);
    /// assert_eq!(page.matched, Some(1));
    /// # })
    /// ```
    pub async fn search(&self, search: Search) -> Result<SearchResultPage> {
        let compiled = self.compile(&search)?;
        self.execute(compiled).await
    }

    /// Runs a search, giving up with [Error::Cancelled] when `cancel` resolves first.
    ///
    /// The in-flight backend call is dropped, which releases its connection.
    pub async fn search_until(
        &self,
        search: Search,
        cancel: impl Future<Output = ()>,
    ) -> Result<SearchResultPage> {
        tokio::select! {
            biased;
            () = cancel => {
                tracing::debug!("search cancelled");
                Err(Error::Cancelled)
            }
            result = self.search(search) => result,
        }
    }

    /// Runs a compiled search.
    pub async fn execute(&self, compiled: CompiledSearch) -> Result<SearchResultPage> {
        let rows = self
            .backend
            .fetch(&compiled.query)
            .await
            .map_err(Into::<Error>::into)?;
        let paginated = compiled.page.paginate(rows)?;
        let matched = if !self.config.context {
            None
        } else if let Some(ids) = compiled.ids {
            Some(ids)
        } else {
            let query = Query::new(compiled.predicate, Vec::new());
            match self.backend.count(&query).await {
                Ok(count) => Some(count),
                Err(err) => {
                    let err: Error = err.into();
                    tracing::warn!(%err, "count failed, returning the page without it");
                    None
                }
            }
        };
        let features = paginated
            .records
            .into_iter()
            .map(|record| self.to_item(record, compiled.crs))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchResultPage {
            features,
            matched,
            next: paginated.next,
            previous: paginated.previous,
            crs: compiled.crs,
            limit: compiled.limit,
        })
    }

    /// Searches the items of one collection.
    pub async fn items(&self, collection: &str, items: Items) -> Result<SearchResultPage> {
        self.ensure_collection(collection).await?;
        let mut search = Search::from(items);
        search.collections = vec![collection.to_string()];
        self.search(search).await
    }

    /// Returns one item.
    pub async fn item(&self, collection: &str, id: &str, crs: Option<&str>) -> Result<Item> {
        let crs = Crs::resolve(crs, "crs", &self.config.supported_crs, Crs::Crs84)?;
        self.ensure_collection(collection).await?;
        let record = self
            .backend
            .record(collection, id)
            .await
            .map_err(Into::<Error>::into)?
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))?;
        self.to_item(record, crs)
    }

    /// Returns every collection, each with the list of supported CRSs.
    pub async fn collections(&self) -> Result<Vec<Collection>> {
        let collections = self
            .backend
            .collections()
            .await
            .map_err(Into::<Error>::into)?;
        Ok(collections
            .into_iter()
            .map(|collection| self.with_supported_crs(collection))
            .collect())
    }

    /// Returns one collection, with the list of supported CRSs.
    pub async fn collection(&self, id: &str) -> Result<Collection> {
        let collection = self
            .backend
            .collection(id)
            .await
            .map_err(Into::<Error>::into)?
            .ok_or_else(|| Error::CollectionNotFound(id.to_string()))?;
        Ok(self.with_supported_crs(collection))
    }

    /// Returns the queryables document of a collection, or of all collections.
    pub fn queryables_schema(&self, collection: Option<&str>, base_url: &Url) -> Result<Value> {
        if let Some(collection) = collection
            && !self.queryables.has_collection(collection)
        {
            return Err(Error::CollectionNotFound(collection.to_string()));
        }
        self.queryables.schema(collection, base_url)
    }

    /// Turns a record into an item, with its footprint in `crs`.
    pub fn to_item(&self, record: Record, crs: Crs) -> Result<Item> {
        let (geometry, bbox) = match record.footprint {
            Some(footprint) => {
                let mut geometry = geo::Geometry::try_from(footprint)
                    .map_err(|err| Error::Geojson(Box::new(err)))?;
                self.reprojector
                    .reproject(&mut geometry, self.config.storage_crs, crs)?;
                let bbox = geometry.bounding_rect().map(|rect| {
                    vec![rect.min().x, rect.min().y, rect.max().x, rect.max().y]
                });
                let geometry = geojson::Geometry::new(geojson::Value::from(&geometry));
                (serde_json::to_value(geometry)?, bbox)
            }
            None => (Value::Null, None),
        };
        let mut properties = record.properties;
        let datetime = record
            .datetime
            .map(|datetime| {
                datetime
                    .with_timezone(&Utc)
                    .format("%Y-%m-%dT%H:%M:%SZ")
                    .to_string()
            })
            .map(Value::String)
            .unwrap_or(Value::Null);
        let _ = properties.insert("datetime".to_string(), datetime);
        for queryable in self.queryables.fields() {
            if let Storage::Column(column) = &queryable.storage
                && !queryable.name.contains('.')
                && !properties.contains_key(&queryable.name)
                && let Some(value) = record.columns.get(column)
            {
                let _ = properties.insert(queryable.name.clone(), value.clone());
            }
        }
        if !properties.contains_key("crs") {
            let _ = properties.insert(
                "crs".to_string(),
                json!({"type": "name", "properties": {"name": crs.uri()}}),
            );
        }
        let mut item = Map::new();
        let _ = item.insert("type".into(), "Feature".into());
        let _ = item.insert("stac_version".into(), STAC_VERSION.into());
        let _ = item.insert("stac_extensions".into(), record.stac_extensions.into());
        let _ = item.insert("id".into(), record.id.into());
        let _ = item.insert("collection".into(), record.collection.into());
        let _ = item.insert("geometry".into(), geometry);
        if let Some(bbox) = bbox {
            let _ = item.insert("bbox".into(), bbox.into());
        }
        let _ = item.insert("properties".into(), Value::Object(properties));
        let _ = item.insert("links".into(), Value::Array(Vec::new()));
        let _ = item.insert("assets".into(), Value::Object(record.assets));
        Ok(item)
    }

    fn with_supported_crs(&self, mut collection: Collection) -> Collection {
        let crs: Vec<Value> = self
            .config
            .supported_crs
            .iter()
            .map(|crs| crs.uri().into())
            .collect();
        let _ = collection.insert("crs".to_string(), Value::Array(crs));
        collection
    }

    fn limit(&self, limit: Option<u64>) -> Result<u64> {
        match limit {
            None => Ok(self.config.default_limit.min(self.config.max_limit)),
            Some(0) => Err(Error::InvalidLimit("0".to_string())),
            Some(limit) => Ok(limit.min(self.config.max_limit)),
        }
    }

    fn sort_keys(&self, search: &Search, ordering_point: Option<Point>) -> Result<Vec<SortKey>> {
        if !search.sortby.is_empty() {
            search
                .sortby
                .iter()
                .map(|sortby| {
                    let field = self.queryables.resolve(&sortby.field, &search.collections)?;
                    if field.value_type == ValueType::Geometry {
                        return Err(Error::InvalidSortby(sortby.field.clone()));
                    }
                    Ok(SortKey::field(field, sortby.direction))
                })
                .collect()
        } else if !search.ids.is_empty() {
            Ok(Vec::new())
        } else if let Some(point) = ordering_point {
            Ok(vec![SortKey::distance(self.queryables.geometry(), point)])
        } else {
            Ok(vec![SortKey::field(
                self.queryables.datetime(),
                Direction::Descending,
            )])
        }
    }

    async fn ensure_collection(&self, collection: &str) -> Result<()> {
        if self
            .backend
            .collection_exists(collection)
            .await
            .map_err(Into::<Error>::into)?
        {
            Ok(())
        } else {
            Err(Error::CollectionNotFound(collection.to_string()))
        }
    }
}

impl CompiledSearch {
    /// Returns the signature of the sort, e.g. `datetime:desc,id:asc`.
    pub fn sort_signature(&self) -> String {
        self.page.sort().signature()
    }
}

fn in_list(field: FieldRef, values: &[String]) -> Predicate {
    Predicate::In {
        value: Operand::Field(field),
        list: values
            .iter()
            .map(|value| Operand::Literal(Literal::Text(value.clone())))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::SearchEngine;
    use crate::{
        Bbox, Config, Crs, Error, Record,
        api::{Search, Sortby},
        backend::MemoryBackend,
        pagination::{Cursor, PageDirection},
    };
    use assert_json_diff::assert_json_include;
    use chrono::DateTime;
    use geo::polygon;
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    /// Twelve items, four per timestamp, in a row from west to east.
    #[fixture]
    fn engine() -> SearchEngine<MemoryBackend> {
        let backend = MemoryBackend::new();
        for i in 0..12_u32 {
            let x = 9.0 + 0.25 * f64::from(i);
            let footprint = geo::Geometry::from(polygon![
                (x: x, y: 55.5),
                (x: x + 0.1, y: 55.5),
                (x: x + 0.1, y: 55.6),
                (x: x, y: 55.6),
            ]);
            let datetime =
                DateTime::parse_from_rfc3339(&format!("2021-04-0{}T10:00:00Z", 1 + i / 4))
                    .unwrap();
            let collection = if i < 8 {
                "skraafotos2021"
            } else {
                "skraafotos2019"
            };
            backend
                .add_record(
                    Record::new(format!("item-{i:02}"), collection)
                        .datetime(datetime)
                        .footprint(geojson::Geometry::new(geojson::Value::from(&footprint)))
                        .column("gsd", f64::from(10 + i) / 100.0)
                        .column("direction", if i % 2 == 0 { "north" } else { "south" }),
                )
                .unwrap();
        }
        SearchEngine::new(backend)
    }

    fn ids(features: &[crate::api::Item]) -> Vec<&str> {
        features
            .iter()
            .map(|feature| feature["id"].as_str().unwrap())
            .collect()
    }

    fn item_ids(range: impl IntoIterator<Item = u32>) -> Vec<String> {
        range.into_iter().map(|i| format!("item-{i:02}")).collect()
    }

    #[rstest]
    #[tokio::test]
    async fn default_sort(engine: SearchEngine<MemoryBackend>) {
        let page = engine.search(Search::new().limit(20)).await.unwrap();
        assert_eq!(
            ids(&page.features)[..6],
            ["item-08", "item-09", "item-10", "item-11", "item-04", "item-05"]
        );
        assert_eq!(page.matched, Some(12));
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn sort_stability(engine: SearchEngine<MemoryBackend>) {
        let search = Search::new()
            .sortby(Sortby::parse_list("+datetime,-id").unwrap())
            .limit(12);
        let page = engine.search(search).await.unwrap();
        let expected: Vec<String> = [3, 2, 1, 0, 7, 6, 5, 4, 11, 10, 9, 8]
            .into_iter()
            .map(|i| format!("item-{i:02}"))
            .collect();
        assert_eq!(ids(&page.features), expected);
    }

    #[rstest]
    #[tokio::test]
    async fn keyset_completeness(engine: SearchEngine<MemoryBackend>) {
        let filter = json!({"gt": [{"property": "gsd"}, 0.145]});
        let all = engine
            .search(Search::new().filter(filter.clone()).limit(100))
            .await
            .unwrap();
        assert_eq!(all.features.len(), 7);

        let mut visited = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut search = Search::new().filter(filter.clone()).limit(1);
            if let Some(token) = token.take() {
                search = search.pt(token);
            }
            let page = engine.search(search).await.unwrap();
            assert_eq!(page.features.len(), 1);
            visited.extend(ids(&page.features).into_iter().map(String::from));
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert_eq!(visited, ids(&all.features));
    }

    #[rstest]
    #[tokio::test]
    async fn ids_pages_are_idempotent(engine: SearchEngine<MemoryBackend>) {
        let search = Search::new().ids(item_ids([3, 1, 2])).limit(1);
        let first = engine.search(search.clone()).await.unwrap();
        assert_eq!(ids(&first.features), ["item-01"]);
        assert_eq!(first.matched, Some(3));
        let next = first.next.unwrap();
        let a = engine.search(search.clone().pt(&next)).await.unwrap();
        let b = engine.search(search.clone().pt(&next)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(ids(&a.features), ["item-02"]);

        let last = engine.search(search.clone().pt(a.next.unwrap())).await.unwrap();
        assert_eq!(ids(&last.features), ["item-03"]);
        assert!(last.next.is_none());

        let back = engine
            .search(search.pt(last.previous.unwrap()))
            .await
            .unwrap();
        assert_eq!(ids(&back.features), ["item-02"]);
        assert!(back.next.is_some());
        assert!(back.previous.is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn previous_returns_the_same_page(engine: SearchEngine<MemoryBackend>) {
        let first = engine.search(Search::new().limit(5)).await.unwrap();
        let second = engine
            .search(Search::new().limit(5).pt(first.next.clone().unwrap()))
            .await
            .unwrap();
        let cursor = Cursor::parse(second.previous.as_deref().unwrap()).unwrap();
        assert_eq!(cursor.direction, PageDirection::Previous);
        let back = engine
            .search(Search::new().limit(5).pt(second.previous.unwrap()))
            .await
            .unwrap();
        assert_eq!(ids(&back.features), ids(&first.features));
        assert!(back.previous.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn only_the_query_is_bounded(engine: SearchEngine<MemoryBackend>) {
        let first = engine.search(Search::new().limit(3)).await.unwrap();
        let compiled = engine
            .compile(&Search::new().limit(3).pt(first.next.unwrap()))
            .unwrap();
        assert!(compiled.query.predicate.has_keyset());
        assert!(!compiled.predicate.has_keyset());
        assert_eq!(compiled.query.fetch, Some(4));
        let page = engine.execute(compiled).await.unwrap();
        assert_eq!(page.matched, Some(12));
    }

    #[rstest]
    #[tokio::test]
    async fn ids_short_circuit(engine: SearchEngine<MemoryBackend>) {
        let search = Search::new()
            .ids(item_ids([9, 0, 4]))
            .bbox(Bbox::new(-10.0, -10.0, -9.0, -9.0))
            .datetime("1999-01-01T00:00:00Z")
            .filter(json!({"eq": [{"property": "direction"}, "east"]}));
        let page = engine.search(search).await.unwrap();
        assert_eq!(ids(&page.features), ["item-00", "item-04", "item-09"]);

        let scoped = Search::new()
            .ids(item_ids([9, 0, 4]))
            .collections(vec!["skraafotos2019".to_string()]);
        let page = engine.search(scoped).await.unwrap();
        assert_eq!(ids(&page.features), ["item-09"]);
    }

    #[rstest]
    #[tokio::test]
    async fn bbox_orders_by_distance(engine: SearchEngine<MemoryBackend>) {
        let page = engine
            .search(Search::new().bbox(Bbox::new(10.0, 55.0, 10.7, 56.0)))
            .await
            .unwrap();
        assert_eq!(ids(&page.features), ["item-05", "item-06", "item-04"]);

        let sorted = engine
            .search(
                Search::new()
                    .bbox(Bbox::new(10.0, 55.0, 10.7, 56.0))
                    .sortby(vec![Sortby::asc("id")]),
            )
            .await
            .unwrap();
        assert_eq!(ids(&sorted.features), ["item-04", "item-05", "item-06"]);
    }

    #[rstest]
    #[tokio::test]
    async fn three_dimensional_bbox(engine: SearchEngine<MemoryBackend>) {
        let flat = engine
            .search(Search::new().bbox(Bbox::new(9.0, 55.0, 10.0, 56.0)))
            .await
            .unwrap();
        let bbox: Bbox = vec![9.0, 55.0, 0.0, 10.0, 56.0, 1000.0].try_into().unwrap();
        let deep = engine.search(Search::new().bbox(bbox)).await.unwrap();
        assert_eq!(ids(&flat.features), ids(&deep.features));
        assert_eq!(flat.features.len(), 5);
    }

    #[rstest]
    #[tokio::test]
    async fn bbox_in_another_crs(engine: SearchEngine<MemoryBackend>) {
        // A small box around item-00 at (9.05, 55.55), in UTM zone 32N.
        let page = engine
            .search(
                Search::new()
                    .bbox(Bbox::new(500_000.0, 6_150_000.0, 506_000.0, 6_160_000.0))
                    .bbox_crs("EPSG:25832"),
            )
            .await
            .unwrap();
        assert_eq!(ids(&page.features), ["item-00"]);
    }

    #[rstest]
    #[tokio::test]
    async fn crs_round_trip(engine: SearchEngine<MemoryBackend>) {
        let search = Search::new().ids(item_ids([0]));
        let storage = engine.search(search.clone()).await.unwrap();
        let projected = engine
            .search(search.crs("EPSG:25832"))
            .await
            .unwrap();
        assert_eq!(storage.crs, Crs::Crs84);
        assert_eq!(projected.crs, Crs::ETRS89_UTM32N);
        let storage = &storage.features[0];
        let projected = &projected.features[0];
        assert_eq!(storage["bbox"][0], 9.0);
        let easting = projected["bbox"][0].as_f64().unwrap();
        assert!((499_000.0..510_000.0).contains(&easting), "{easting}");
        assert_ne!(storage["geometry"], projected["geometry"]);
        assert_eq!(
            projected["properties"]["crs"]["properties"]["name"],
            "http://www.opengis.net/def/crs/EPSG/0/25832"
        );
        assert_eq!(
            storage["properties"]["crs"]["properties"]["name"],
            "http://www.opengis.net/def/crs/OGC/1.3/CRS84"
        );
    }

    #[rstest]
    #[tokio::test]
    async fn items_are_assembled(engine: SearchEngine<MemoryBackend>) {
        let item = engine.item("skraafotos2021", "item-01", None).await.unwrap();
        assert_json_include!(
            actual: Value::Object(item),
            expected: json!({
                "type": "Feature",
                "stac_version": "1.0.0",
                "id": "item-01",
                "collection": "skraafotos2021",
                "properties": {
                    "datetime": "2021-04-01T10:00:00Z",
                    "gsd": 0.11,
                    "direction": "south"
                }
            })
        );
    }

    #[rstest]
    #[case(Search::new().bbox(Bbox::new(9.0, 55.0, 10.0, 56.0)).intersects(geojson::Geometry::new(geojson::Value::Point(vec![9.5, 55.5]))), "intersects and bbox parameters are mutually exclusive")]
    #[case(Search::new().datetime("../.."), "Double open-ended intervals are not allowed.")]
    #[case(Search::new().datetime("/"), "Double open-ended intervals are not allowed.")]
    #[case(Search::new().filter(json!({"eq": [{"property": "invalid-field"}, 50]})), "Cannot search on field: invalid-field")]
    #[case(Search::new().sortby(vec![Sortby::desc("invalid-field")]), "No matching field name: invalid-field")]
    #[case(Search::new().sortby(vec![Sortby::asc("geometry")]), "invalid sortby: \"geometry\"")]
    #[case(Search::new().filter(json!({"within": [{"property": "geometry"}, {"type": "Point", "coordinates": [9.0, 55.0]}]})), "Unsupported operation: within")]
    #[case(Search::new().filter(json!({"foo": []})), "Unable to parse expression node {\"foo\":[]}")]
    fn rejected(
        engine: SearchEngine<MemoryBackend>,
        #[case] search: Search,
        #[case] message: &str,
    ) {
        assert_eq!(engine.compile(&search).unwrap_err().to_string(), message);
    }

    #[rstest]
    fn invalid_crs_names_the_argument(engine: SearchEngine<MemoryBackend>) {
        let err = engine
            .compile(&Search::new().filter_crs("EPSG:3857"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCrs { argument: "filter-crs", .. }));
        let err = engine.compile(&Search::new().crs("EPSG:4326")).unwrap_err();
        assert!(err.to_string().starts_with("CRS provided for argument crs is invalid"));
    }

    #[rstest]
    #[tokio::test]
    async fn limits(engine: SearchEngine<MemoryBackend>) {
        let engine = engine.with_config(Config {
            max_limit: 5,
            ..Default::default()
        });
        let page = engine.search(Search::new().limit(10_000)).await.unwrap();
        assert_eq!(page.limit, 5);
        assert_eq!(page.features.len(), 5);
        let page = engine.search(Search::new()).await.unwrap();
        assert_eq!(page.limit, 5);
        let err = engine.compile(&Search::new().limit(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidLimit(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn context_can_be_disabled(engine: SearchEngine<MemoryBackend>) {
        let engine = engine.with_config(Config {
            context: false,
            ..Default::default()
        });
        let page = engine.search(Search::new()).await.unwrap();
        assert!(page.matched.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn stale_token(engine: SearchEngine<MemoryBackend>) {
        let page = engine.search(Search::new().limit(2)).await.unwrap();
        let err = engine
            .search(
                Search::new()
                    .limit(2)
                    .sortby(vec![Sortby::asc("gsd")])
                    .pt(page.next.unwrap()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCursor(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn not_found(engine: SearchEngine<MemoryBackend>) {
        let err = engine
            .items("skraafotos2017", Default::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Collection skraafotos2017 not found");
        let err = engine
            .item("skraafotos2021", "item-99", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Item item-99 not found");
        let page = engine
            .items("skraafotos2019", Default::default())
            .await
            .unwrap();
        assert_eq!(page.features.len(), 4);
    }

    #[rstest]
    #[tokio::test]
    async fn cancelled(engine: SearchEngine<MemoryBackend>) {
        let err = engine
            .search_until(Search::new(), std::future::ready(()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        let page = engine
            .search_until(Search::new(), std::future::pending())
            .await
            .unwrap();
        assert_eq!(page.features.len(), 10);
    }

    #[rstest]
    #[tokio::test]
    async fn collections_list_supported_crs(engine: SearchEngine<MemoryBackend>) {
        let collections = engine.collections().await.unwrap();
        let ids: Vec<&Value> = collections.iter().map(|c| &c["id"]).collect();
        assert_eq!(ids, ["skraafotos2019", "skraafotos2021"]);
        let crs = json!([
            "http://www.opengis.net/def/crs/OGC/1.3/CRS84",
            "http://www.opengis.net/def/crs/EPSG/0/25832"
        ]);
        assert!(collections.iter().all(|c| c["crs"] == crs));

        let collection = engine.collection("skraafotos2021").await.unwrap();
        assert_eq!(collection["crs"], crs);
        let err = engine.collection("skraafotos2017").await.unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(_)));
    }

    #[rstest]
    fn unservable_config(engine: SearchEngine<MemoryBackend>) {
        let config = Config {
            supported_crs: vec![Crs::Crs84, Crs::Epsg(3857)],
            ..Default::default()
        };
        let err = engine.try_with_config(config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[rstest]
    fn queryables_schema(engine: SearchEngine<MemoryBackend>) {
        let base_url = url::Url::parse("http://localhost/").unwrap();
        let _ = engine
            .queryables_schema(Some("skraafotos2021"), &base_url)
            .unwrap();
        let err = engine
            .queryables_schema(Some("nope"), &base_url)
            .unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(_)));
    }
}
