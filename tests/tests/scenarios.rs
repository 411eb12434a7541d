use pretty_assertions::assert_eq;
use tests::prelude::*;

fn upsert(name: &str, country: &str) -> serde_json::Value {
    json!({
        "_op": "upsert",
        "_type": "City",
        "_where": format!("name=\"{name}\""),
        "name": name,
        "country": {"_id": country},
    })
}

async fn select_with_a_ref(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;

    let body = get(&gateway, "/City?select(name, country.name)&sort(name)").await;
    assert_eq!(
        body,
        json!({"_data": [
            {"name": "Berlin", "country": {"name": "Germany"}},
            {"name": "Kaunas", "country": {"name": "Lithuania"}},
            {"name": "Vilnius", "country": {"name": "Lithuania"}},
        ]})
    );

    // A missing ref reads as null through the join.
    let response = handle(&gateway, Request::post("/City").json(&json!({"name": "Atlantis"}))).await;
    assert_eq!(response.status, 201, "{}", response.json());
    let body = get(&gateway, "/City?name=\"Atlantis\"&select(name, country.name)").await;
    let [row] = body["_data"].as_array().unwrap().as_slice() else {
        panic!("expected one row: {body}");
    };
    assert_eq!(row["name"], "Atlantis");
    assert!(row["country"]["name"].is_null(), "{row}");
}

async fn pages_continue_from_the_cursor(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;

    let first = get(&gateway, "/City?limit(2)&page(size(2))").await;
    assert_eq!(names(&first), ["Vilnius", "Kaunas"]);

    let next = first["_page"]["next"].as_str().unwrap();
    let rest = get(&gateway, &format!("/City?page(\"{next}\", size(2))")).await;
    assert_eq!(names(&rest), ["Berlin"]);
    assert!(rest.get("_page").is_none());
}

async fn count_ignores_pagination(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;

    for target in [
        "/City?count()",
        "/City?count()&limit(1)&sort(name)",
        "/City?count()&page(size(1))",
    ] {
        let body = get(&gateway, target).await;
        assert_eq!(body, json!({"_data": [{"count()": 3}]}), "{target}");
    }
}

async fn repeated_upsert_writes_once(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    countries(&gateway).await;
    handle(
        &gateway,
        Request::post("/Country").json(&json!({"_id": NO, "name": "Norway"})),
    )
    .await;
    let batch = || Request::post("/").json(&json!({"_data": [upsert("Vilnius", LT), upsert("Oslo", NO)]}));

    let first = handle(&gateway, batch()).await;
    assert_eq!(first.status, 200, "{}", first.json());
    let first = first.json();
    for row in first["_data"].as_array().unwrap() {
        assert!(row["_id"].is_string(), "{row}");
        assert!(row["_revision"].is_string(), "{row}");
    }

    let second = handle(&gateway, batch()).await.json();
    for (before, after) in first["_data"]
        .as_array()
        .unwrap()
        .iter()
        .zip(second["_data"].as_array().unwrap())
    {
        assert_eq!(after["_id"], before["_id"]);
        assert_eq!(after["_revision"], before["_revision"]);
        // Nothing changed, so only the identity comes back.
        assert!(after.get("name").is_none(), "{after}");
    }

    let changes = get(&gateway, "/City/:changes").await;
    assert_eq!(changes["_data"].as_array().unwrap().len(), 2);
    let body = get(&gateway, "/City?count()").await;
    assert_eq!(body["_data"][0]["count()"], 2);
}

async fn missing_reference_fails_the_batch(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    countries(&gateway).await;

    let response = handle(
        &gateway,
        Request::post("/").json(&json!({"_data": [upsert("Vilnius", LT), upsert("Oslo", NO)]})),
    )
    .await;
    assert_eq!(response.status, 400, "{}", response.json());
    assert_eq!(error_code(&response), "ReferencedObjectNotFound");
    assert_eq!(response.json()["errors"][0]["context"]["id"], NO);

    // Vilnius was written before Oslo failed, and is gone with it.
    let body = get(&gateway, "/City?count()").await;
    assert_eq!(body["_data"][0]["count()"], 0);
    let changes = get(&gateway, "/City/:changes").await;
    assert_eq!(changes["_data"], json!([]));
}

async fn texts_and_enums(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    let response = handle(
        &gateway,
        Request::post("/Book").json(&json!({
            "_id": BOOK,
            "title": {"en": "Book", "lt": "Knyga"},
            "status": "published",
        })),
    )
    .await;
    assert_eq!(response.status, 201, "{}", response.json());

    let body = get(&gateway, "/Book?select(title.en)").await;
    assert_eq!(body, json!({"_data": [{"title": {"en": "Book"}}]}));

    let body = get(&gateway, "/Book?select(title, status)").await;
    assert_eq!(
        body,
        json!({"_data": [{"title": {"en": "Book", "lt": "Knyga"}, "status": "published"}]})
    );

    let response = handle(&gateway, Request::get("/Book?select(title, title.lt)")).await;
    assert_eq!(response.status, 400);
    assert_eq!(error_code(&response), "CannotSelectTextAndSpecifiedLang");
}

async fn missing_scopes_are_rejected_up_front(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;

    let mut log = test.log();
    log.clear();
    let response = gateway.handle(Request::get("/City").scope("datagate_insert")).await;
    assert_eq!(response.status, 403);
    assert_eq!(error_code(&response), "InsufficientPermission");
    assert!(log.is_empty());
}

tests!(
    select_with_a_ref,
    pages_continue_from_the_cursor,
    count_ignores_pagination,
    repeated_upsert_writes_once,
    missing_reference_fails_the_batch,
    texts_and_enums,
    missing_scopes_are_rejected_up_front,
);
