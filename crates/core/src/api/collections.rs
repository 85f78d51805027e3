use super::{GEOJSON_MEDIA_TYPE, JSON_MEDIA_TYPE, Link};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// A STAC collection.
///
/// Collections come out of storage as whatever documents the backend holds,
/// so they're kept as plain JSON objects, like [Item](super::Item).
pub type Collection = Map<String, Value>;

/// The response of `/collections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collections {
    /// The collections, each with its own links.
    pub collections: Vec<Collection>,

    /// Links to this document and the landing page.
    pub links: Vec<Link>,
}

impl Collections {
    /// Assembles a list of collections, adding links to each of them.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::api::{Collection, Collections};
    /// use url::Url;
    ///
    /// let mut collection = Collection::new();
    /// let _ = collection.insert("id".into(), "skraafotos2021".into());
    /// let base_url = Url::parse("https://api.example.com/").unwrap();
    /// let collections = Collections::new(vec![collection], &base_url).unwrap();
    /// assert_eq!(collections.links[2].href, "https://api.example.com/collections");
    /// ```
    pub fn new(mut collections: Vec<Collection>, base_url: &Url) -> Result<Collections> {
        for collection in &mut collections {
            add_collection_links(collection, base_url)?;
        }
        Ok(Collections {
            collections,
            links: vec![
                Link::new(base_url, "root").r#type(JSON_MEDIA_TYPE),
                Link::new(base_url, "parent").r#type(JSON_MEDIA_TYPE),
                Link::new(base_url.join("collections")?, "self").r#type(JSON_MEDIA_TYPE),
            ],
        })
    }
}

/// Adds `self`, `parent`, `items` and `root` links to a collection.
///
/// Stored links are kept, with relative hrefs resolved against `base_url`.
pub fn add_collection_links(collection: &mut Collection, base_url: &Url) -> Result<()> {
    let id = collection
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let href = base_url.join(&format!("collections/{id}"))?;
    let mut links = vec![
        serde_json::to_value(Link::new(&href, "self").r#type(JSON_MEDIA_TYPE))?,
        serde_json::to_value(Link::new(base_url, "parent").r#type(JSON_MEDIA_TYPE))?,
        serde_json::to_value(
            Link::new(base_url.join(&format!("collections/{id}/items"))?, "items")
                .r#type(GEOJSON_MEDIA_TYPE),
        )?,
        serde_json::to_value(Link::new(base_url, "root").r#type(JSON_MEDIA_TYPE))?,
    ];
    if let Some(Value::Array(stored)) = collection.remove("links") {
        for mut link in stored {
            if let Some(href) = link.get("href").and_then(Value::as_str)
                && Url::parse(href).is_err()
            {
                let href = base_url.join(href.trim_start_matches('/'))?;
                link["href"] = href.as_str().into();
            }
            links.push(link);
        }
    }
    let _ = collection.insert("links".to_string(), Value::Array(links));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Collection, Collections, add_collection_links};
    use rstest::{fixture, rstest};
    use serde_json::json;
    use url::Url;

    #[fixture]
    fn base_url() -> Url {
        Url::parse("https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/").unwrap()
    }

    fn collection() -> Collection {
        json!({
            "type": "Collection",
            "id": "skraafotos2021",
            "links": [
                {"rel": "license", "href": "https://dataforsyningen.dk/Vilkaar"},
                {"rel": "describedby", "href": "/docs/skraafotos2021.html"}
            ]
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[rstest]
    fn links(base_url: Url) {
        let mut collection = collection();
        add_collection_links(&mut collection, &base_url).unwrap();
        let links = collection["links"].as_array().unwrap();
        assert_eq!(links.len(), 6);
        assert_eq!(
            links[0]["href"],
            "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/collections/skraafotos2021"
        );
        assert_eq!(
            links[2]["href"],
            "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/collections/skraafotos2021/items"
        );
        assert_eq!(links[4]["href"], "https://dataforsyningen.dk/Vilkaar");
        assert_eq!(
            links[5]["href"],
            "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/docs/skraafotos2021.html"
        );
    }

    #[rstest]
    fn collections(base_url: Url) {
        let value =
            serde_json::to_value(Collections::new(vec![collection()], &base_url).unwrap()).unwrap();
        assert_eq!(value["collections"][0]["id"], "skraafotos2021");
        assert_eq!(
            value["links"][2]["href"],
            "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/collections"
        );
    }
}
