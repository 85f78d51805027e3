use super::{GetItems, GetSearch, Item};
use crate::{Crs, Result, engine::SearchResultPage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// The media type of GeoJSON responses.
pub const GEOJSON_MEDIA_TYPE: &str = "application/geo+json";

/// The media type of JSON responses.
pub const JSON_MEDIA_TYPE: &str = "application/json";

const LICENSE_HREF: &str = "https://dataforsyningen.dk/Vilkaar";

/// A page of search results, as returned to clients.
///
/// This is a GeoJSON `FeatureCollection` with paging links and a context
/// object, whose `matched` is only set when counting is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCollection {
    #[serde(rename = "type")]
    r#type: String,

    /// The items.
    pub features: Vec<Item>,

    /// Links, including `next` and `previous` when there are further pages.
    pub links: Vec<Link>,

    /// Counts for this page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,

    /// The CRS of the geometries, for the transport's `Content-Crs` header.
    #[serde(skip)]
    pub content_crs: Option<Crs>,
}

/// The search context of an [ItemCollection].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// The number of items on this page.
    pub returned: u64,

    /// The effective page size.
    pub limit: u64,

    /// The total number of matching items, if counted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<u64>,
}

/// A link to a related resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// The relation type.
    pub rel: String,

    /// The target.
    pub href: String,

    /// The media type of the target.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// A human-readable title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// The HTTP method to follow this link with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// The request body to send when following this link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Map<String, Value>>,

    /// Whether `body` should be merged into the previous request's body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,
}

/// The endpoint that produced a page, which decides what paging links look like.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// `POST /search`
    PostSearch,

    /// `GET /search`, with the original query parameters.
    GetSearch(GetSearch),

    /// `GET /collections/{collection}/items`, with the original query parameters.
    Items {
        /// The collection id.
        collection: String,

        /// The query parameters.
        items: GetItems,
    },
}

impl Link {
    /// Creates a new link.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::api::Link;
    ///
    /// let link = Link::new("https://api.example.com/", "root").r#type("application/json");
    /// assert_eq!(link.rel, "root");
    /// ```
    pub fn new(href: impl ToString, rel: impl ToString) -> Link {
        Link {
            rel: rel.to_string(),
            href: href.to_string(),
            r#type: None,
            title: None,
            method: None,
            body: None,
            merge: None,
        }
    }

    /// Sets the media type.
    pub fn r#type(mut self, r#type: impl ToString) -> Link {
        self.r#type = Some(r#type.to_string());
        self
    }

    /// Sets the title.
    pub fn title(mut self, title: impl ToString) -> Link {
        self.title = Some(title.to_string());
        self
    }

    /// Sets the method.
    pub fn method(mut self, method: impl ToString) -> Link {
        self.method = Some(method.to_string());
        self
    }

    /// Makes this a POST link whose body sets the pagination token.
    pub fn post_token(mut self, token: &str) -> Link {
        let mut body = Map::new();
        let _ = body.insert("pt".to_string(), token.into());
        self.method = Some("POST".to_string());
        self.body = Some(body);
        self.merge = Some(true);
        self
    }
}

impl ItemCollection {
    /// Assembles a page into a feature collection.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Crs, api::{Endpoint, ItemCollection}, engine::SearchResultPage};
    /// use url::Url;
    ///
    /// let page = SearchResultPage {
    ///     features: Vec::new(),
    ///     matched: Some(0),
    ///     next: None,
    ///     previous: None,
    ///     crs: Crs::Crs84,
    ///     limit: 10,
    /// };
    /// let base_url = Url::parse("https://api.example.com/").unwrap();
    /// let item_collection = ItemCollection::new(page, &base_url, &Endpoint::PostSearch).unwrap();
    /// assert_eq!(item_collection.context.unwrap().matched, Some(0));
    /// ```
    pub fn new(
        page: SearchResultPage,
        base_url: &Url,
        endpoint: &Endpoint,
    ) -> Result<ItemCollection> {
        let mut links = match endpoint {
            Endpoint::PostSearch | Endpoint::GetSearch(_) => vec![
                Link::new(base_url.join("search")?, "self").r#type(GEOJSON_MEDIA_TYPE),
                Link::new(base_url, "root").r#type(JSON_MEDIA_TYPE),
            ],
            Endpoint::Items { collection, .. } => vec![
                Link::new(
                    base_url.join(&format!("collections/{collection}/items"))?,
                    "self",
                )
                .r#type(GEOJSON_MEDIA_TYPE),
                Link::new(base_url, "root").r#type(JSON_MEDIA_TYPE),
                Link::new(base_url, "parent").r#type(JSON_MEDIA_TYPE),
            ],
        };
        for (rel, token) in [("next", &page.next), ("previous", &page.previous)] {
            if let Some(token) = token {
                links.push(paging_link(base_url, endpoint, rel, token)?);
            }
        }
        let mut features = page.features;
        for feature in &mut features {
            add_item_links(feature, base_url)?;
        }
        let context = Context {
            returned: features.len() as u64,
            limit: page.limit,
            matched: page.matched,
        };
        Ok(ItemCollection {
            r#type: "FeatureCollection".to_string(),
            features,
            links,
            context: Some(context),
            content_crs: Some(page.crs),
        })
    }

    /// Returns the link with the given relation, if any.
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }
}

/// Adds `self`, `parent`, `collection`, `root` and `license` links to an item.
///
/// Links the item already has are kept.
pub fn add_item_links(item: &mut Item, base_url: &Url) -> Result<()> {
    let id = item.get("id").and_then(Value::as_str).unwrap_or_default();
    let collection = item
        .get("collection")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let collection_href = base_url.join(&format!("collections/{collection}"))?;
    let new_links = [
        Link::new(
            base_url.join(&format!("collections/{collection}/items/{id}"))?,
            "self",
        )
        .r#type(GEOJSON_MEDIA_TYPE),
        Link::new(&collection_href, "parent").r#type(JSON_MEDIA_TYPE),
        Link::new(&collection_href, "collection").r#type(JSON_MEDIA_TYPE),
        Link::new(base_url, "root").r#type(JSON_MEDIA_TYPE),
        Link::new(LICENSE_HREF, "license")
            .r#type("text/html; charset=UTF-8")
            .title("SDFI license terms"),
    ];
    let mut links = match item.remove("links") {
        Some(Value::Array(links)) => links,
        _ => Vec::new(),
    };
    for link in new_links {
        links.push(serde_json::to_value(link)?);
    }
    let _ = item.insert("links".to_string(), Value::Array(links));
    Ok(())
}

fn paging_link(base_url: &Url, endpoint: &Endpoint, rel: &str, token: &str) -> Result<Link> {
    let link = match endpoint {
        Endpoint::PostSearch => Link::new(base_url.join("search")?, rel).post_token(token),
        Endpoint::GetSearch(get_search) => {
            let mut get_search = get_search.clone();
            get_search.items.pt = Some(token.to_string());
            let mut href = base_url.join("search")?;
            href.set_query(Some(&serde_urlencoded::to_string(&get_search)?));
            Link::new(href, rel).method("GET")
        }
        Endpoint::Items { collection, items } => {
            let mut items = items.clone();
            items.pt = Some(token.to_string());
            let mut href = base_url.join(&format!("collections/{collection}/items"))?;
            href.set_query(Some(&serde_urlencoded::to_string(&items)?));
            Link::new(href, rel).method("GET")
        }
    };
    Ok(link.r#type(GEOJSON_MEDIA_TYPE))
}

#[cfg(test)]
mod tests {
    use super::{Endpoint, ItemCollection};
    use crate::{
        Crs,
        api::{GetItems, GetSearch, Item},
        engine::SearchResultPage,
    };
    use rstest::{fixture, rstest};
    use serde_json::json;
    use url::Url;

    #[fixture]
    fn base_url() -> Url {
        Url::parse("https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/").unwrap()
    }

    fn page(next: Option<&str>, previous: Option<&str>) -> SearchResultPage {
        let feature: Item = json!({
            "type": "Feature",
            "id": "2021_83_29_2_0019_00003995",
            "collection": "skraafotos2021",
            "links": []
        })
        .as_object()
        .unwrap()
        .clone();
        SearchResultPage {
            features: vec![feature],
            matched: Some(42),
            next: next.map(String::from),
            previous: previous.map(String::from),
            crs: Crs::ETRS89_UTM32N,
            limit: 1,
        }
    }

    #[rstest]
    fn post_search_links(base_url: Url) {
        let item_collection =
            ItemCollection::new(page(Some("abc"), None), &base_url, &Endpoint::PostSearch)
                .unwrap();
        let next = item_collection.link("next").unwrap();
        assert_eq!(
            next.href,
            "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/search"
        );
        assert_eq!(next.method.as_deref(), Some("POST"));
        assert_eq!(next.body.as_ref().unwrap()["pt"], "abc");
        assert_eq!(next.merge, Some(true));
        assert!(item_collection.link("previous").is_none());
        assert_eq!(item_collection.content_crs, Some(Crs::ETRS89_UTM32N));
    }

    #[rstest]
    fn get_search_links_replace_the_token(base_url: Url) {
        let get_search = GetSearch {
            items: GetItems {
                limit: Some("1".into()),
                pt: Some("old".into()),
                ..Default::default()
            },
            collections: Some("skraafotos2021".into()),
            ..Default::default()
        };
        let item_collection = ItemCollection::new(
            page(None, Some("new")),
            &base_url,
            &Endpoint::GetSearch(get_search),
        )
        .unwrap();
        let previous = item_collection.link("previous").unwrap();
        assert_eq!(previous.method.as_deref(), Some("GET"));
        assert!(previous.href.contains("pt=new"));
        assert!(!previous.href.contains("old"));
        assert!(previous.href.contains("collections=skraafotos2021"));
        assert!(previous.body.is_none());
    }

    #[rstest]
    fn items_links(base_url: Url) {
        let item_collection = ItemCollection::new(
            page(Some("abc"), None),
            &base_url,
            &Endpoint::Items {
                collection: "skraafotos2021".into(),
                items: GetItems {
                    limit: Some("1".into()),
                    ..Default::default()
                },
            },
        )
        .unwrap();
        let next = item_collection.link("next").unwrap();
        assert_eq!(
            next.href,
            "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/collections/skraafotos2021/items?limit=1&pt=abc"
        );
        assert!(item_collection.link("parent").is_some());
    }

    #[rstest]
    fn context_and_feature_links(base_url: Url) {
        let item_collection =
            ItemCollection::new(page(None, None), &base_url, &Endpoint::PostSearch).unwrap();
        let context = item_collection.context.unwrap();
        assert_eq!(context.returned, 1);
        assert_eq!(context.limit, 1);
        assert_eq!(context.matched, Some(42));
        let links = item_collection.features[0]["links"].as_array().unwrap();
        assert_eq!(
            links[0]["href"],
            "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/collections/skraafotos2021/items/2021_83_29_2_0019_00003995"
        );
        assert!(links.iter().any(|link| link["rel"] == "license"));
    }

    #[rstest]
    fn serialize(base_url: Url) {
        let value = serde_json::to_value(
            ItemCollection::new(page(None, None), &base_url, &Endpoint::PostSearch).unwrap(),
        )
        .unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["context"], json!({"returned": 1, "limit": 1, "matched": 42}));
        assert!(value.get("content_crs").is_none());
    }
}
