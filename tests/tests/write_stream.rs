use datagate_core::driver::operation::Transaction;
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

async fn count(gateway: &Gateway, model: &str) -> i64 {
    let body = get(gateway, &format!("/{model}?count()")).await;
    body["_data"][0]["count()"].as_i64().unwrap()
}

async fn unchanged_upserts_send_no_writes(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    countries(&gateway).await;
    let batch = || Request::post("/").json(&json!({"_data": [upsert("Vilnius", LT), upsert("Kaunas", LT)]}));

    let response = handle(&gateway, batch()).await;
    assert_eq!(response.status, 200, "{}", response.json());

    let mut log = test.log();
    log.clear();
    let response = handle(&gateway, batch()).await;
    assert_eq!(response.status, 200, "{}", response.json());

    assert_eq!(log.inserts("City"), 0);
    assert_eq!(log.updates("City"), 0);
    assert_eq!(log.inserts("City/:changelog"), 0);
    assert_eq!(log.transactions(), [Transaction::Start, Transaction::Commit]);
}

async fn changed_upserts_update_and_journal(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;

    let mut log = test.log();
    log.clear();
    let response = handle(
        &gateway,
        Request::post("/").json(&json!({"_data": [
            upsert("Vilnius", DE),
            upsert("Kaunas", LT),
        ]})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
    let body = response.json();
    assert_eq!(body["_data"][0]["country"], json!({"_id": DE}));
    assert!(body["_data"][1].get("country").is_none());

    assert_eq!(log.updates("City"), 1);
    assert_eq!(log.inserts("City/:changelog"), 1);
    assert_eq!(
        log.transactions(),
        [
            Transaction::Start,
            Transaction::Savepoint(0),
            Transaction::ReleaseSavepoint(0),
            Transaction::Commit,
        ]
    );
}

async fn failed_item_rolls_back_the_batch(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    countries(&gateway).await;

    let mut log = test.log();
    log.clear();
    let response = handle(
        &gateway,
        Request::post("/").json(&json!({"_data": [upsert("Vilnius", LT), upsert("Oslo", NO)]})),
    )
    .await;
    assert_eq!(response.status, 400, "{}", response.json());
    assert_eq!(error_code(&response), "ReferencedObjectNotFound");

    // The backend rejected the second insert only.
    assert_eq!(log.failures(), 1);
    assert_eq!(
        log.transactions(),
        [
            Transaction::Start,
            Transaction::Savepoint(0),
            Transaction::ReleaseSavepoint(0),
            Transaction::Savepoint(1),
            Transaction::RollbackToSavepoint(1),
            Transaction::Rollback,
        ]
    );
    assert_eq!(count(&gateway, "City").await, 0);
}

async fn fault_tolerant_batches_keep_good_items(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    countries(&gateway).await;

    let mut log = test.log();
    log.clear();
    let response = handle(
        &gateway,
        Request::post("/:fault-tolerant").json(&json!({"_data": [
            upsert("Vilnius", LT),
            upsert("Oslo", NO),
            upsert("Kaunas", LT),
        ]})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
    let body = response.json();
    assert_eq!(body["_data"].as_array().unwrap().len(), 2);
    assert_eq!(body["_errors"][0]["code"], "ReferencedObjectNotFound");
    assert_eq!(body["_errors"][0]["context"]["id"], NO);

    assert_eq!(
        log.transactions(),
        [
            Transaction::Start,
            Transaction::Savepoint(0),
            Transaction::ReleaseSavepoint(0),
            Transaction::Savepoint(1),
            Transaction::RollbackToSavepoint(1),
            Transaction::Savepoint(2),
            Transaction::ReleaseSavepoint(2),
            Transaction::Commit,
        ]
    );
    assert_eq!(count(&gateway, "City").await, 2);
}

async fn too_many_errors_abort(test: &mut DbTest) {
    let config = Config {
        max_error_count: 2,
        ..Config::default()
    };
    let gateway = test.setup_gateway_with(manifest(), config).await;

    let response = handle(
        &gateway,
        Request::post("/City/:fault-tolerant").jsonl(&[
            json!({"name": "Vilnius"}),
            json!({"population": 1}),
            json!({"population": 2}),
            json!({"name": "Kaunas"}),
        ]),
    )
    .await;
    assert_eq!(response.status, 400, "{}", response.json());
    assert_eq!(error_code(&response), "MissingRequiredProperty");
    assert_eq!(response.json()["errors"].as_array().unwrap().len(), 2);

    assert_eq!(test.log().transactions().last(), Some(&Transaction::Rollback));
    assert_eq!(count(&gateway, "City").await, 0);
}

async fn check_writes_nothing(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    countries(&gateway).await;

    let mut log = test.log();
    log.clear();
    let response = handle(
        &gateway,
        Request::post("/City/:check").json(&json!({"name": "Riga", "country": {"_id": LT}})),
    )
    .await;
    assert_eq!(response.json(), json!({"status": "OK"}));
    assert_eq!(log.inserts("City"), 0);
    assert_eq!(log.transactions(), [Transaction::Start, Transaction::Rollback]);

    let response = handle(&gateway, Request::post("/City/:check").json(&json!({"title": "Riga"}))).await;
    assert_eq!(response.status, 400);
    assert_eq!(error_code(&response), "FieldNotInResource");
}

async fn integrity_errors(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;

    let response = handle(&gateway, Request::post("/Country").json(&json!({"name": "Lithuania"}))).await;
    assert_eq!(response.status, 409, "{}", response.json());
    assert_eq!(error_code(&response), "UniqueConstraint");
    assert_eq!(response.json()["errors"][0]["context"]["property"], "name");

    let response = handle(&gateway, Request::delete(&format!("/Country/{LT}"))).await;
    assert_eq!(response.status, 409, "{}", response.json());
    assert_eq!(error_code(&response), "ReferringObjectFound");
    assert_eq!(response.json()["errors"][0]["context"]["referrer"], "City");

    let response = handle(&gateway, Request::delete(&format!("/City/{BERLIN}"))).await;
    assert_eq!(response.status, 204);
    let response = handle(&gateway, Request::delete(&format!("/Country/{DE}"))).await;
    assert_eq!(response.status, 204);
    assert_eq!(count(&gateway, "Country").await, 1);
}

async fn patch_and_update(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;

    let response = handle(
        &gateway,
        Request::patch(&format!("/City/{VILNIUS}")).json(&json!({"population": 580000})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
    let revision = response.json()["_revision"].clone();

    // A full update clears what it leaves out.
    let response = handle(
        &gateway,
        Request::put(&format!("/City/{VILNIUS}")).json(&json!({"name": "Vilnius"})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
    assert_ne!(response.json()["_revision"], revision);

    let body = get(&gateway, &format!("/City/{VILNIUS}")).await;
    assert_eq!(body["population"], json!(null));
    assert_eq!(body["country"], json!(null));

    let response = handle(
        &gateway,
        Request::patch(&format!("/City/{VILNIUS}")).json(&json!({"_revision": revision, "name": "Vilna"})),
    )
    .await;
    assert_eq!(response.status, 400, "{}", response.json());
}

tests!(
    unchanged_upserts_send_no_writes,
    changed_upserts_update_and_journal,
    failed_item_rolls_back_the_batch,
    fault_tolerant_batches_keep_good_items,
    too_many_errors_abort,
    check_writes_nothing,
    integrity_errors,
    patch_and_update,
);
