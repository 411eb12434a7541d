//! Models and rows shared by the integration tests.

use datagate::{Gateway, Manifest, ModelDef, PropDef, Request, Response};
use pretty_assertions::assert_eq;
use serde_json::json;

pub const LT: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";
pub const DE: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
pub const NO: &str = "5e2a3c1d-8b4f-4a6e-9c7d-1f0b2e3d4c5a";

pub const VILNIUS: &str = "1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed";
pub const KAUNAS: &str = "2c5ea4c0-4067-41fb-a66e-71f0e5b1cd45";
pub const BERLIN: &str = "3f333df6-90a4-4fda-8dd3-9485d27cee36";

pub const BOOK: &str = "4d1f8f36-52b7-4f2e-a1c5-0d6e4a2b9c11";

/// Every scope the gateway checks.
pub const SCOPES: &[&str] = &[
    "datagate_getall",
    "datagate_getone",
    "datagate_search",
    "datagate_changes",
    "datagate_insert",
    "datagate_upsert",
    "datagate_update",
    "datagate_patch",
    "datagate_delete",
    "datagate_move",
    "datagate_wipe",
];

/// `Country`, `City` referring to it and `Book` with a text title.
pub fn manifest() -> Manifest {
    Manifest::builder()
        .model(
            ModelDef::new("Country")
                .prop(PropDef::new("name", "string").unique())
                .prop(PropDef::new("cities", "backref").to("City")),
        )
        .model(
            ModelDef::new("City")
                .prop(PropDef::new("name", "string").required())
                .prop(PropDef::new("population", "integer"))
                .prop(PropDef::reference("country", "Country")),
        )
        .model(
            ModelDef::new("Book")
                .prop(PropDef::new("title", "text").langs(["en", "lt"]))
                .prop(
                    PropDef::new("status", "integer")
                        .enum_item("draft", 0)
                        .enum_item("published", 1),
                ),
        )
        .build()
        .unwrap()
}

/// Handles `request` with every scope granted.
pub async fn handle(gateway: &Gateway, request: Request) -> Response {
    gateway.handle(request.scopes(SCOPES.iter().copied())).await
}

/// Reads `target`, expecting `200 OK`.
pub async fn get(gateway: &Gateway, target: &str) -> serde_json::Value {
    let response = handle(gateway, Request::get(target)).await;
    assert_eq!(response.status, 200, "GET {target}: {}", response.json());
    response.json()
}

/// Lithuania and Germany.
pub async fn countries(gateway: &Gateway) {
    let response = handle(
        gateway,
        Request::post("/").json(&json!({"_data": [
            {"_type": "Country", "_id": LT, "name": "Lithuania"},
            {"_type": "Country", "_id": DE, "name": "Germany"},
        ]})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
}

/// Vilnius and Kaunas in Lithuania, Berlin in Germany.
pub async fn cities(gateway: &Gateway) {
    countries(gateway).await;
    let response = handle(
        gateway,
        Request::post("/").json(&json!({"_data": [
            {"_type": "City", "_id": VILNIUS, "name": "Vilnius", "country": {"_id": LT}},
            {"_type": "City", "_id": KAUNAS, "name": "Kaunas", "country": {"_id": LT}},
            {"_type": "City", "_id": BERLIN, "name": "Berlin", "country": {"_id": DE}},
        ]})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
}

/// The `name` of every row in `_data`.
pub fn names(body: &serde_json::Value) -> Vec<String> {
    body["_data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap().to_string())
        .collect()
}

/// The code of the first error of an error response.
pub fn error_code(response: &Response) -> String {
    response.json()["errors"][0]["code"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}
