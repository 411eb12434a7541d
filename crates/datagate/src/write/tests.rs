use super::*;
use crate::{access::AccessGate, transaction::Conn, url, Config, Memory, Request};

use datagate_core::{
    schema::{db, ModelDef, PropDef},
    stmt::SelectColumn,
    Driver, ErrorCode, Manifest,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std_util::assert_err;

const LT: &str = "1b4e28ba-2fa1-4d3b-a3f5-ef19b5a7633b";
const NO: &str = "6fa459ea-ee8a-4ca4-894e-db77e160355e";
const VILNIUS: &str = "16fd2706-8baf-433b-82eb-8c7fada847da";
const KAUNAS: &str = "886313e1-3b8a-4372-9b90-0c9aee199e5d";

struct Setup {
    cx: Context,
    memory: Memory,
}

async fn setup() -> Setup {
    setup_with(Config::default()).await
}

async fn setup_with(config: Config) -> Setup {
    let manifest = Manifest::builder()
        .model(ModelDef::new("Country").prop(PropDef::new("name", "string").unique()))
        .model(
            ModelDef::new("City")
                .prop(PropDef::new("name", "string").required())
                .prop(PropDef::new("population", "integer"))
                .prop(PropDef::reference("country", "Country")),
        )
        .build()
        .unwrap();
    let memory = Memory::new();
    memory.reset_db(&manifest.db).await.unwrap();

    let config = Arc::new(config);
    let scopes = [
        "insert", "upsert", "update", "patch", "delete", "move", "getone", "getall",
    ]
    .map(|action| format!("datagate_{action}"));
    let cx = Context {
        manifest: Arc::new(manifest),
        capability: memory.capability(),
        gate: AccessGate::new(Arc::new(scopes.into_iter().collect()), &config),
        config,
    };
    Setup { cx, memory }
}

impl Setup {
    async fn write(&self, request: Request) -> Result<Written> {
        let cx = &self.cx;
        let params = url::bind(&cx.manifest, cx.capability.id_format, &cx.config, &request)?;
        let body = Body::decode(&request, params.ns.is_some())?;
        let conn = Conn::new(cx.manifest.clone(), self.memory.connect().await?);
        let wcx = Arc::new(WriteContext::new(cx.clone(), params, conn.begin().await?));
        run(wcx, body).await
    }

    async fn count(&self, table: &str) -> i64 {
        let mut conn = Conn::new(self.cx.manifest.clone(), self.memory.connect().await.unwrap());
        let mut select = Select::new(table, "t0");
        select.push_column(SelectColumn::Count);
        let rows = conn.query(select).await.unwrap();
        rows[0][0].as_i64().unwrap()
    }

    async fn countries(&self) {
        let request = Request::post("/").json(&json!({"_data": [
            {"_type": "Country", "_id": LT, "name": "Lithuania"},
            {"_type": "Country", "_id": NO, "name": "Norway"},
        ]}));
        self.write(request).await.unwrap();
    }
}

fn upsert(name: &str, country: &str) -> serde_json::Value {
    json!({
        "_op": "upsert",
        "_type": "City",
        "_where": format!("name=\"{name}\""),
        "name": name,
        "country": {"_id": country},
    })
}

#[tokio::test]
async fn insert_fills_id_revision_and_changelog() {
    let setup = setup().await;
    setup.countries().await;

    let written = setup
        .write(Request::post("/City").json(&json!({"name": "Vilnius", "country": {"_id": LT}})))
        .await
        .unwrap();

    let [item] = written.items.as_slice() else {
        panic!("expected one item, got {:?}", written.items);
    };
    assert_eq!(item.state, State::Journaled);
    assert_eq!(item.action, Action::Insert);
    assert!(item.id.is_some());
    assert!(item.revision.is_some());
    assert_eq!(item.patch["name"], Value::from("Vilnius"));
    assert_eq!(setup.count("City").await, 1);
    assert_eq!(setup.count(&db::changelog_table("City")).await, 1);
}

#[tokio::test]
async fn repeated_upsert_changes_nothing() {
    let setup = setup().await;
    setup.countries().await;
    let batch = || Request::post("/").json(&json!({"_data": [upsert("Vilnius", LT), upsert("Oslo", NO)]}));

    let first = setup.write(batch()).await.unwrap();
    let actions: Vec<_> = first.items.iter().map(|item| item.action).collect();
    assert_eq!(actions, [Action::Insert, Action::Insert]);

    let second = setup.write(batch()).await.unwrap();
    for (before, after) in first.items.iter().zip(&second.items) {
        assert_eq!(after.action, Action::Patch);
        assert!(after.noop);
        assert!(after.patch.is_empty());
        assert_eq!(after.id, before.id);
        assert_eq!(after.revision, before.revision);
    }
    assert_eq!(setup.count("City").await, 2);
    assert_eq!(setup.count(&db::changelog_table("City")).await, 2);
}

#[tokio::test]
async fn missing_reference_rolls_back_the_batch() {
    let setup = setup().await;
    let request = Request::post("/").json(&json!({"_data": [
        {"_type": "Country", "_id": LT, "name": "Lithuania"},
        upsert("Oslo", NO),
    ]}));

    let err = assert_err!(setup.write(request).await);
    assert!(err.is(ErrorCode::ReferencedObjectNotFound));
    assert_eq!(err.context_map().unwrap()["id"], NO);
    assert_eq!(err.context_map().unwrap()["property"], "country");
    assert_eq!(setup.count("Country").await, 0);
    assert_eq!(setup.count(&db::changelog_table("Country")).await, 0);
}

#[tokio::test]
async fn fault_tolerant_streams_keep_good_items() {
    let setup = setup().await;
    let request = Request::post("/:fault-tolerant").json(&json!({"_data": [
        {"_type": "Country", "_id": LT, "name": "Lithuania"},
        upsert("Oslo", NO),
        {"_type": "City", "name": "Kaunas", "country": {"_id": LT}},
        {"_type": "City", "population": 10},
    ]}));

    let written = setup.write(request).await.unwrap();
    assert_eq!(written.items.len(), 2);
    let codes: Vec<_> = written.errors.iter().map(|err| err.code()).collect();
    assert_eq!(
        codes,
        [
            Some(ErrorCode::ReferencedObjectNotFound),
            Some(ErrorCode::MissingRequiredProperty)
        ]
    );
    assert_eq!(setup.count("Country").await, 1);
    assert_eq!(setup.count("City").await, 1);
}

#[tokio::test]
async fn too_many_errors_abort() {
    let setup = setup_with(Config {
        max_error_count: 2,
        ..Config::default()
    })
    .await;
    let request = Request::post("/City/:fault-tolerant").json(&json!({"_data": [
        {"name": "Vilnius"},
        {"population": 1},
        {"population": 2},
        {"name": "Kaunas"},
    ]}));

    let err = assert_err!(setup.write(request).await);
    assert!(err.is(ErrorCode::MultipleErrors));
    assert_eq!(err.errors().len(), 2);
    assert_eq!(setup.count("City").await, 0);
}

#[tokio::test]
async fn check_writes_nothing() {
    let setup = setup().await;
    let written = setup
        .write(Request::post("/City/:check").json(&json!({"name": "Vilnius"})))
        .await
        .unwrap();
    assert_eq!(written.items[0].state, State::Patched);
    assert_eq!(setup.count("City").await, 0);

    let err = assert_err!(
        setup
            .write(Request::post("/City/:check").json(&json!({"title": "Vilnius"})))
            .await
    );
    assert!(err.is(ErrorCode::FieldNotInResource));
}

#[tokio::test]
async fn patch_and_update() {
    let setup = setup().await;
    setup.countries().await;
    setup
        .write(Request::post("/City").json(&json!({
            "_id": VILNIUS, "name": "Vilnius", "population": 500, "country": {"_id": LT},
        })))
        .await
        .unwrap();

    let written = setup
        .write(Request::patch(&format!("/City/{VILNIUS}")).json(&json!({"population": 550})))
        .await
        .unwrap();
    let patched = &written.items[0];
    assert_eq!(patched.patch.keys().collect::<Vec<_>>(), ["population"]);
    assert_eq!(patched.columns[0].0, "_revision");

    // A full update clears what it leaves out.
    let written = setup
        .write(Request::put(&format!("/City/{VILNIUS}")).json(&json!({"name": "Vilnius"})))
        .await
        .unwrap();
    let updated = &written.items[0];
    assert_eq!(updated.patch["population"], Value::Null);
    assert_eq!(updated.patch["country"], Value::Null);
    assert!(!updated.patch.contains_key("name"));

    let err = assert_err!(
        setup
            .write(Request::patch(&format!("/City/{KAUNAS}")).json(&json!({"name": "Kaunas"})))
            .await
    );
    assert!(err.is(ErrorCode::ItemDoesNotExist));
}

#[tokio::test]
async fn stale_revisions_are_rejected() {
    let setup = setup().await;
    setup
        .write(Request::post("/City").json(&json!({"_id": VILNIUS, "name": "Vilnius"})))
        .await
        .unwrap();

    let err = assert_err!(
        setup
            .write(Request::patch(&format!("/City/{VILNIUS}")).json(&json!({
                "_revision": "0", "name": "Vilna",
            })))
            .await
    );
    assert!(err.is(ErrorCode::InvalidValue));
}

#[tokio::test]
async fn delete_of_a_referenced_row() {
    let setup = setup().await;
    setup.countries().await;
    setup
        .write(Request::post("/City").json(&json!({"name": "Vilnius", "country": {"_id": LT}})))
        .await
        .unwrap();

    let err = assert_err!(setup.write(Request::delete(&format!("/Country/{LT}"))).await);
    assert!(err.is(ErrorCode::ReferringObjectFound));
    assert_eq!(err.context_map().unwrap()["referrer"], "City");

    setup.write(Request::delete(&format!("/Country/{NO}"))).await.unwrap();
    assert_eq!(setup.count("Country").await, 1);
}

#[tokio::test]
async fn unique_values() {
    let setup = setup().await;
    setup.countries().await;
    let err = assert_err!(
        setup
            .write(Request::post("/Country").json(&json!({"name": "Norway"})))
            .await
    );
    assert!(err.is(ErrorCode::UniqueConstraint));
    assert_eq!(err.context_map().unwrap()["property"], "name");
}

#[tokio::test]
async fn where_matching_several_rows() {
    let setup = setup().await;
    setup
        .write(Request::post("/").json(&json!({"_data": [
            {"_type": "City", "_id": VILNIUS, "name": "Vilnius", "population": 10},
            {"_type": "City", "_id": KAUNAS, "name": "Kaunas", "population": 10},
        ]})))
        .await
        .unwrap();

    let request = Request::post("/").json(&json!({"_data": [{
        "_op": "upsert",
        "_type": "City",
        "_where": "population=10",
        "name": "Vilnius",
        "population": 11,
    }]}));
    let err = assert_err!(setup.write(request).await);
    assert!(err.is(ErrorCode::MultipleRowsFound), "{err}");
    assert_eq!(err.context_map().unwrap()["model"], "City");

    // Nothing was changed.
    let request = Request::post("/").json(&json!({"_data": [{
        "_op": "upsert",
        "_type": "City",
        "_where": "population=11",
        "name": "Alytus",
    }]}));
    let written = setup.write(request).await.unwrap();
    assert_eq!(written.items[0].action, Action::Insert);
}

#[tokio::test]
async fn moved_rows_redirect_later_writes() {
    let setup = setup().await;
    setup
        .write(Request::post("/").json(&json!({"_data": [
            {"_type": "City", "_id": VILNIUS, "name": "Vilnius"},
            {"_type": "City", "_id": KAUNAS, "name": "Kaunas"},
        ]})))
        .await
        .unwrap();

    let written = setup
        .write(Request::patch(&format!("/City/{KAUNAS}")).json(&json!({"_op": "move", "_id": VILNIUS})))
        .await
        .unwrap();
    assert_eq!(written.items[0].action, Action::Move);
    assert_eq!(setup.count("City").await, 1);
    assert_eq!(setup.count(&db::redirect_table("City")).await, 1);

    // Writes to the old id land on the row it was moved into.
    let written = setup
        .write(Request::patch(&format!("/City/{KAUNAS}")).json(&json!({"population": 3})))
        .await
        .unwrap();
    assert_eq!(written.items[0].id.as_deref(), Some(VILNIUS));

    let err = assert_err!(
        setup
            .write(Request::patch(&format!("/City/{VILNIUS}")).json(&json!({"_op": "move", "_id": VILNIUS})))
            .await
    );
    assert!(err.is(ErrorCode::InvalidValue));
}

#[test]
fn unflatten_nests_places() {
    let flat: IndexMap<String, Value> = [
        ("name".to_string(), Value::from("Vilnius")),
        ("address.street".to_string(), Value::from("Gedimino")),
        ("address.zip".to_string(), Value::from(1000)),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        Value::Object(unflatten(&flat)),
        datagate_core::object! {
            "name" => "Vilnius",
            "address" => datagate_core::object! { "street" => "Gedimino", "zip" => 1000 },
        }
    );
}
