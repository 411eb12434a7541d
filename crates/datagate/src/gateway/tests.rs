use super::*;
use crate::{Memory, ModelDef, PropDef};

use pretty_assertions::assert_eq;
use serde_json::json;

const LT: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";
const DE: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
const VILNIUS: &str = "1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed";
const KAUNAS: &str = "2c5ea4c0-4067-41fb-a66e-71f0e5b1cd45";
const BERLIN: &str = "3f333df6-90a4-4fda-8dd3-9485d27cee36";
const BOOK: &str = "4d1f8f36-52b7-4f2e-a1c5-0d6e4a2b9c11";

const SCOPES: &[&str] = &[
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

async fn gateway() -> Gateway {
    let manifest = Manifest::builder()
        .namespace("geo", "Geography", "Countries and their cities")
        .model(
            ModelDef::new("geo/Country")
                .prop(PropDef::new("name", "string"))
                .prop(PropDef::new("cities", "backref").to("City")),
        )
        .model(
            ModelDef::new("geo/City")
                .prop(PropDef::new("name", "string"))
                .prop(PropDef::reference("country", "Country")),
        )
        .model(
            ModelDef::new("lib/Book")
                .prop(PropDef::new("title", "text").langs(["en", "lt"]))
                .prop(
                    PropDef::new("status", "integer")
                        .enum_item("draft", 0)
                        .enum_item("published", 1),
                ),
        )
        .build()
        .unwrap();

    let gateway = Gateway::builder()
        .manifest(manifest)
        .build(Memory::new())
        .await
        .unwrap();
    gateway.reset_db().await.unwrap();
    gateway
}

async fn handle(gateway: &Gateway, request: Request) -> Response {
    gateway.handle(request.scopes(SCOPES.iter().copied())).await
}

async fn get(gateway: &Gateway, target: &str) -> serde_json::Value {
    let response = handle(gateway, Request::get(target)).await;
    assert_eq!(response.status, 200, "GET {target}: {}", response.json());
    response.json()
}

/// Countries and cities used by most tests.
async fn cities() -> Gateway {
    let gateway = gateway().await;
    let response = handle(
        &gateway,
        Request::post("/").json(&json!({"_data": [
            {"_type": "geo/Country", "_id": LT, "name": "Lithuania"},
            {"_type": "geo/Country", "_id": DE, "name": "Germany"},
            {"_type": "geo/City", "_id": VILNIUS, "name": "Vilnius", "country": {"_id": LT}},
            {"_type": "geo/City", "_id": KAUNAS, "name": "Kaunas", "country": {"_id": LT}},
            {"_type": "geo/City", "_id": BERLIN, "name": "Berlin", "country": {"_id": DE}},
        ]})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
    gateway
}

fn names(body: &serde_json::Value) -> Vec<&str> {
    body["_data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn select_through_a_ref() {
    let gateway = cities().await;
    let body = get(&gateway, "/geo/City?select(name, country.name)&sort(name)").await;
    assert_eq!(
        body,
        json!({"_data": [
            {"name": "Berlin", "country": {"name": "Germany"}},
            {"name": "Kaunas", "country": {"name": "Lithuania"}},
            {"name": "Vilnius", "country": {"name": "Lithuania"}},
        ]})
    );
}

#[tokio::test]
async fn default_select() {
    let gateway = cities().await;
    let body = get(&gateway, "/geo/City?name=\"Berlin\"").await;
    let row = &body["_data"][0];
    assert_eq!(row["_type"], "geo/City");
    assert_eq!(row["_id"], BERLIN);
    assert!(row["_revision"].is_string());
    assert_eq!(row["country"], json!({"_id": DE}));
}

#[tokio::test]
async fn pages_continue_from_the_cursor() {
    let gateway = cities().await;
    let first = get(&gateway, "/geo/City?limit(2)&page(size(2))").await;
    assert_eq!(names(&first), ["Vilnius", "Kaunas"]);

    let next = first["_page"]["next"].as_str().unwrap();
    let rest = get(&gateway, &format!("/geo/City?page(\"{next}\", size(2))")).await;
    assert_eq!(names(&rest), ["Berlin"]);
    assert!(rest.get("_page").is_none());
}

#[tokio::test]
async fn count() {
    let gateway = cities().await;
    let body = get(&gateway, "/geo/City?count()").await;
    assert_eq!(body, json!({"_data": [{"count()": 3}]}));

    let body = get(&gateway, "/geo/City?count()&limit(1)&sort(name)").await;
    assert_eq!(body, json!({"_data": [{"count()": 3}]}));
}

#[tokio::test]
async fn texts_and_enums() {
    let gateway = gateway().await;
    let response = handle(
        &gateway,
        Request::post("/lib/Book").json(&json!({
            "_id": BOOK,
            "title": {"en": "Book", "lt": "Knyga"},
            "status": "published",
        })),
    )
    .await;
    assert_eq!(response.status, 201, "{}", response.json());

    let body = get(&gateway, "/lib/Book?select(title.en)").await;
    assert_eq!(body, json!({"_data": [{"title": {"en": "Book"}}]}));

    let body = get(&gateway, "/lib/Book?select(title, status)").await;
    assert_eq!(
        body,
        json!({"_data": [{"title": {"en": "Book", "lt": "Knyga"}, "status": "published"}]})
    );

    let body = get(&gateway, "/lib/Book?status=\"published\"&select(_id)").await;
    assert_eq!(body, json!({"_data": [{"_id": BOOK}]}));

    let response = handle(&gateway, Request::get("/lib/Book?select(title, title.lt)")).await;
    assert_eq!(response.status, 400);
    assert_eq!(response.json()["errors"][0]["code"], "CannotSelectTextAndSpecifiedLang");
}

#[tokio::test]
async fn get_one_and_subresource() {
    let gateway = cities().await;
    let body = get(&gateway, &format!("/geo/City/{KAUNAS}")).await;
    assert_eq!(body["name"], "Kaunas");
    assert_eq!(body["country"], json!({"_id": LT}));

    let body = get(&gateway, &format!("/geo/City/{KAUNAS}/name")).await;
    assert_eq!(body["name"], "Kaunas");
    assert_eq!(body["_id"], KAUNAS);
    assert!(body.get("country").is_none());

    let response = handle(&gateway, Request::get(&format!("/geo/Country/{KAUNAS}"))).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.json()["errors"][0]["code"], "ItemDoesNotExist");
}

#[tokio::test]
async fn expanded_back_references() {
    let gateway = cities().await;
    let body = get(&gateway, &format!("/geo/Country/{LT}?expand(cities)")).await;
    assert_eq!(body["cities"], json!([{"_id": VILNIUS}, {"_id": KAUNAS}]));

    let body = get(&gateway, "/geo/Country?expand()&select(name, cities)&sort(name)").await;
    assert_eq!(
        body["_data"],
        json!([
            {"name": "Germany", "cities": [{"_id": BERLIN}]},
            {"name": "Lithuania", "cities": [{"_id": VILNIUS}, {"_id": KAUNAS}]},
        ])
    );
}

#[tokio::test]
async fn moved_rows_answer_with_a_redirect() {
    let gateway = cities().await;
    let response = handle(
        &gateway,
        Request::patch(&format!("/geo/City/{KAUNAS}")).json(&json!({"_op": "move", "_id": VILNIUS})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
    assert_eq!(response.json()["redirect"], VILNIUS);

    let response = handle(&gateway, Request::get(&format!("/geo/City/{KAUNAS}"))).await;
    assert_eq!(response.status, 301);
    assert_eq!(response.header("location"), Some(&*format!("/geo/City/{VILNIUS}")));
    assert_eq!(response.json()["_id"], VILNIUS);

    let body = get(&gateway, "/geo/City?select(name)").await;
    assert_eq!(names(&body), ["Vilnius", "Berlin"]);
}

#[tokio::test]
async fn write_responses() {
    let gateway = cities().await;

    let response = handle(
        &gateway,
        Request::patch(&format!("/geo/City/{VILNIUS}")).json(&json!({"name": "Vilna"})),
    )
    .await;
    assert_eq!(response.status, 200);
    let body = response.json();
    assert_eq!(body["_type"], "geo/City");
    assert_eq!(body["_id"], VILNIUS);
    assert_eq!(body["name"], "Vilna");

    let response = handle(&gateway, Request::delete(&format!("/geo/City/{VILNIUS}"))).await;
    assert_eq!(response.status, 204);
    assert_eq!(response.body, None);

    let response = handle(&gateway, Request::delete(&format!("/geo/Country/{LT}"))).await;
    assert_eq!(response.status, 409);
    assert_eq!(response.json()["errors"][0]["code"], "ReferringObjectFound");
}

#[tokio::test]
async fn fault_tolerant_batches_report_errors() {
    let gateway = cities().await;
    let response = handle(
        &gateway,
        Request::post("/geo/City/:fault-tolerant").jsonl(&[
            json!({"name": "Klaipeda", "country": {"_id": LT}}),
            json!({"name": "Hamburg", "country": {"_id": BOOK}}),
        ]),
    )
    .await;
    assert_eq!(response.status, 200);
    let body = response.json();
    assert_eq!(body["_data"].as_array().unwrap().len(), 1);
    assert_eq!(body["_errors"][0]["code"], "ReferencedObjectNotFound");
    assert_eq!(body["_errors"][0]["context"]["id"], BOOK);
}

#[tokio::test]
async fn changes_feed() {
    let gateway = cities().await;
    handle(
        &gateway,
        Request::patch(&format!("/geo/City/{BERLIN}")).json(&json!({"name": "Berlyn"})),
    )
    .await;

    let body = get(&gateway, "/geo/City/:changes").await;
    let ops: Vec<_> = body["_data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|change| change["_op"].as_str().unwrap())
        .collect();
    assert_eq!(ops, ["insert", "insert", "insert", "patch"]);

    let body = get(&gateway, "/geo/City/:changes/-1").await;
    let [change] = body["_data"].as_array().unwrap().as_slice() else {
        panic!("expected one change: {body}");
    };
    assert_eq!(change["_id"], BERLIN);
    assert_eq!(change["name"], "Berlyn");
    assert!(change.get("country").is_none());

    let body = get(&gateway, &format!("/geo/City/{KAUNAS}/:changes")).await;
    assert_eq!(body["_data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn namespaces_list_children_and_models() {
    let gateway = gateway().await;
    let body = get(&gateway, "/:ns").await;
    assert_eq!(
        body["_data"],
        json!([
            {"_type": "ns", "name": "geo/:ns", "title": "Geography", "description": "Countries and their cities"},
            {"_type": "ns", "name": "lib/:ns", "title": "", "description": ""},
        ])
    );

    let body = get(&gateway, "/:ns/:all").await;
    let names: Vec<_> = body["_data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["geo/:ns", "geo/Country", "geo/City", "lib/:ns", "lib/Book"]);
}

#[tokio::test]
async fn wipe_and_check() {
    let gateway = cities().await;

    let response = handle(
        &gateway,
        Request::post("/geo/City/:check").json(&json!({"name": "Riga", "country": {"_id": LT}})),
    )
    .await;
    assert_eq!(response.json(), json!({"status": "OK"}));

    let response = handle(&gateway, Request::delete("/geo/:wipe")).await;
    assert_eq!(response.status, 200, "{}", response.json());

    let body = get(&gateway, "/geo/City?count()").await;
    assert_eq!(body["_data"][0]["count()"], 0);
    let body = get(&gateway, "/geo/City/:changes").await;
    assert_eq!(body["_data"], json!([]));
}

#[tokio::test]
async fn head_and_formats() {
    let gateway = cities().await;

    let response = handle(&gateway, Request::head("/geo/City")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, None);

    let response = handle(&gateway, Request::get("/geo/City?select(name)&sort(name)&format(jsonl)")).await;
    assert_eq!(
        response.render().unwrap(),
        "{\"name\":\"Berlin\"}\n{\"name\":\"Kaunas\"}\n{\"name\":\"Vilnius\"}"
    );

    let response = handle(&gateway, Request::get("/geo/City?format(csv)")).await;
    assert_eq!(response.status, 501);
    assert_eq!(response.json()["errors"][0]["code"], "NotImplementedFeature");
}

#[tokio::test]
async fn missing_scopes() {
    let gateway = cities().await;
    let response = gateway.handle(Request::get("/geo/City").scope("datagate_insert")).await;
    assert_eq!(response.status, 403);
    assert_eq!(response.json()["errors"][0]["code"], "InsufficientPermission");
}
