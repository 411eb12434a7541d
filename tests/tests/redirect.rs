use datagate_core::driver::Operation;
use pretty_assertions::assert_eq;
use tests::prelude::*;

async fn move_kaunas(gateway: &Gateway) {
    let response = handle(
        gateway,
        Request::patch(&format!("/City/{KAUNAS}")).json(&json!({"_op": "move", "_id": VILNIUS})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
    assert_eq!(response.json()["redirect"], VILNIUS);
}

async fn moved_ids_redirect(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;

    let mut log = test.log();
    log.clear();
    move_kaunas(&gateway).await;
    assert_eq!(log.inserts("City/:redirect"), 1);
    assert_eq!(
        log.count(|op| matches!(op, Operation::Delete(delete) if delete.table == "City")),
        1
    );

    let response = handle(&gateway, Request::get(&format!("/City/{KAUNAS}"))).await;
    assert_eq!(response.status, 301);
    assert_eq!(response.header("location"), Some(&*format!("/City/{VILNIUS}")));
    assert_eq!(response.json()["_id"], VILNIUS);
    assert_eq!(response.json()["name"], "Vilnius");

    let body = get(&gateway, "/City?select(name)&sort(name)").await;
    assert_eq!(names(&body), ["Berlin", "Vilnius"]);
}

async fn writes_follow_moved_ids(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;
    move_kaunas(&gateway).await;

    let response = handle(
        &gateway,
        Request::patch(&format!("/City/{KAUNAS}")).json(&json!({"population": 580000})),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
    assert_eq!(response.json()["_id"], VILNIUS);

    let body = get(&gateway, &format!("/City/{VILNIUS}")).await;
    assert_eq!(body["population"], 580000);
}

async fn invalid_moves(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    cities(&gateway).await;

    let response = handle(
        &gateway,
        Request::patch(&format!("/City/{VILNIUS}")).json(&json!({"_op": "move", "_id": VILNIUS})),
    )
    .await;
    assert_eq!(response.status, 400, "{}", response.json());
    assert_eq!(error_code(&response), "InvalidValue");

    // Berlin still refers to Germany.
    let response = handle(
        &gateway,
        Request::patch(&format!("/Country/{DE}")).json(&json!({"_op": "move", "_id": LT})),
    )
    .await;
    assert_eq!(response.status, 409, "{}", response.json());
    assert_eq!(error_code(&response), "ReferringObjectFound");

    let body = get(&gateway, &format!("/Country/{DE}")).await;
    assert_eq!(body["name"], "Germany");
}

tests!(moved_ids_redirect, writes_follow_moved_ids, invalid_moves);
