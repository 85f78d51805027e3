use assert_cmd::Command;
use clap::Parser;
use flyfoto_cli::Flyfoto;
use rstest::{fixture, rstest};
use serde_json::Value;
use tracing::Level;
use url::Url;

#[fixture]
fn command() -> Command {
    let mut command = assert_cmd::cargo::cargo_bin_cmd!("flyfoto");
    let _ = command
        .env_remove("DATABASE_URL")
        .arg("--items")
        .arg("data/items.json");
    command
}

fn stdout(command: &mut Command) -> Value {
    let output = command.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn link<'a>(value: &'a Value, rel: &str) -> Option<&'a Value> {
    value["links"]
        .as_array()
        .unwrap()
        .iter()
        .find(|link| link["rel"] == rel)
}

fn token(href: &str) -> String {
    Url::parse(href)
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "pt")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

#[rstest]
fn search_default_sort(mut command: Command) {
    let value = stdout(command.arg("search"));
    assert_eq!(value["type"], "FeatureCollection");
    let features = value["features"].as_array().unwrap();
    assert_eq!(features.len(), 5);
    assert_eq!(features[0]["id"], "2021_83_29_2_0019_00003994");
    assert_eq!(value["context"]["matched"], 5);
    assert!(link(&value, "next").is_none());
}

#[rstest]
fn search_pages(mut command: Command, #[from(command)] mut next_command: Command) {
    let first = stdout(command.args(["search", "--limit", "2"]));
    assert_eq!(first["features"].as_array().unwrap().len(), 2);
    let next = link(&first, "next").unwrap();
    assert_eq!(next["method"], "GET");
    let pt = token(next["href"].as_str().unwrap());

    let second = stdout(next_command.args(["search", "--limit", "2", "--pt", &pt]));
    let ids: Vec<&Value> = second["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|feature| &feature["id"])
        .collect();
    assert_eq!(
        ids,
        ["2021_83_29_2_0019_00003992", "2021_83_29_2_0019_00003991"]
    );
    assert!(link(&second, "previous").is_some());
}

#[rstest]
fn search_filter(mut command: Command) {
    let value = stdout(command.args([
        "search",
        "--filter",
        r#"{"eq": [{"property": "direction"}, "south"]}"#,
    ]));
    let features = value["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert!(
        features
            .iter()
            .all(|feature| feature["properties"]["direction"] == "south")
    );
}

#[rstest]
fn search_ids(mut command: Command) {
    let value = stdout(command.args([
        "search",
        "--ids",
        "2021_83_29_2_0019_00003990,2021_83_29_2_0019_00003993",
    ]));
    assert_eq!(value["features"].as_array().unwrap().len(), 2);
    assert_eq!(value["context"]["matched"], 2);
}

#[rstest]
fn search_body(mut command: Command) {
    let dir = tempfile::tempdir().unwrap();
    let body = dir.path().join("body.json");
    std::fs::write(&body, r#"{"limit": 1, "collections": ["skraafotos2021"]}"#).unwrap();
    let value = stdout(command.arg("search").arg("--body").arg(&body));
    let next = link(&value, "next").unwrap();
    assert_eq!(next["method"], "POST");
    assert_eq!(next["merge"], true);
    assert!(next["body"]["pt"].is_string());
}

#[rstest]
fn search_with_config(mut command: Command) {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"max_limit": 3, "context": false}"#).unwrap();
    let value = stdout(
        command
            .arg("--config")
            .arg(&config)
            .args(["search", "--limit", "100"]),
    );
    assert_eq!(value["features"].as_array().unwrap().len(), 3);
    assert_eq!(value["context"]["limit"], 3);
    assert!(value["context"].get("matched").is_none());
}

#[rstest]
#[case::bbox_and_intersects(&["search", "--bbox", "9,55,10,56", "--intersects", r#"{"type": "Point", "coordinates": [9.5, 55.5]}"#])]
#[case::double_open(&["search", "--datetime", "../.."])]
#[case::unknown_field(&["search", "--filter", r#"{"eq": [{"property": "invalid-field"}, 1]}"#])]
#[case::missing_item(&["item", "skraafotos2021", "not-an-item"])]
#[case::missing_collection(&["items", "not-a-collection"])]
#[case::missing_collection_document(&["collection", "not-a-collection"])]
fn rejected(mut command: Command, #[case] args: &[&str]) {
    let _ = command.args(args).assert().failure();
}

#[rstest]
fn items(mut command: Command) {
    let value = stdout(command.args(["items", "skraafotos2021", "--limit", "1"]));
    let next = link(&value, "next").unwrap();
    assert!(
        next["href"]
            .as_str()
            .unwrap()
            .starts_with("http://localhost:8000/collections/skraafotos2021/items?limit=1&pt=")
    );
}

#[rstest]
fn item(mut command: Command) {
    let value = stdout(command.args([
        "--base-url",
        "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/",
        "item",
        "skraafotos2021",
        "2021_83_29_2_0019_00003990",
    ]));
    assert_eq!(value["id"], "2021_83_29_2_0019_00003990");
    assert_eq!(
        link(&value, "self").unwrap()["href"],
        "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0/collections/skraafotos2021/items/2021_83_29_2_0019_00003990"
    );
    assert!(link(&value, "license").is_some());
}

#[rstest]
fn item_in_utm(mut command: Command) {
    let value = stdout(command.args([
        "item",
        "skraafotos2021",
        "2021_83_29_2_0019_00003990",
        "--crs",
        "http://www.opengis.net/def/crs/EPSG/0/25832",
    ]));
    let easting = value["bbox"][0].as_f64().unwrap();
    assert!(easting > 400_000.0 && easting < 600_000.0);
}

#[rstest]
fn ndjson(mut command: Command) {
    let value = stdout(
        command
            .args(["--items", "data/items.ndjson"])
            .args(["search", "--collections", "skraafotos2019"]),
    );
    assert_eq!(value["features"].as_array().unwrap().len(), 2);
}

#[rstest]
fn collections(mut command: Command) {
    let value = stdout(
        command
            .args(["--items", "data/collections.json"])
            .arg("collections"),
    );
    let collections = value["collections"].as_array().unwrap();
    assert_eq!(collections.len(), 2);
    assert_eq!(collections[0]["id"], "skraafotos2019");
    assert_eq!(collections[1]["title"], "Skråfotos 2021");
    assert_eq!(
        collections[1]["crs"],
        serde_json::json!([
            "http://www.opengis.net/def/crs/OGC/1.3/CRS84",
            "http://www.opengis.net/def/crs/EPSG/0/25832"
        ])
    );
    assert_eq!(
        link(&value, "self").unwrap()["href"],
        "http://localhost:8000/collections"
    );
}

#[rstest]
fn collection(mut command: Command) {
    let value = stdout(command.args(["collection", "skraafotos2021"]));
    assert_eq!(value["id"], "skraafotos2021");
    assert_eq!(value["crs"].as_array().unwrap().len(), 2);
    assert_eq!(
        link(&value, "items").unwrap()["href"],
        "http://localhost:8000/collections/skraafotos2021/items"
    );
}

#[rstest]
fn unservable_config(mut command: Command) {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"supported_crs": ["EPSG:3857"]}"#).unwrap();
    let _ = command
        .arg("--config")
        .arg(&config)
        .arg("search")
        .assert()
        .failure();
}

#[rstest]
fn queryables(mut command: Command) {
    let value = stdout(command.args(["queryables", "skraafotos2021"]));
    assert!(value["properties"]["gsd"].is_object());
    let _ = assert_cmd::cargo::cargo_bin_cmd!("flyfoto")
        .env_remove("DATABASE_URL")
        .args(["queryables", "not-a-collection"])
        .assert()
        .failure();
}

#[test]
fn log_level() {
    let flyfoto = Flyfoto::parse_from(["flyfoto", "queryables"]);
    assert_eq!(flyfoto.log_level(), Some(Level::WARN));

    let flyfoto = Flyfoto::parse_from(["flyfoto", "-vv", "queryables"]);
    assert_eq!(flyfoto.log_level(), Some(Level::DEBUG));

    let flyfoto = Flyfoto::parse_from(["flyfoto", "-q", "queryables"]);
    assert_eq!(flyfoto.log_level(), Some(Level::ERROR));

    let flyfoto = Flyfoto::parse_from(["flyfoto", "-qq", "queryables"]);
    assert_eq!(flyfoto.log_level(), None);
}
