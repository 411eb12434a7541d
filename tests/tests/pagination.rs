use pretty_assertions::assert_eq;
use tests::prelude::*;

/// Cities with populations; two have none.
async fn populated(gateway: &Gateway) {
    countries(gateway).await;
    let response = handle(
        gateway,
        Request::post("/City").jsonl(&[
            json!({"name": "Vilnius", "population": 580000, "country": {"_id": LT}}),
            json!({"name": "Klaipeda", "country": {"_id": LT}}),
            json!({"name": "Kaunas", "population": 300000, "country": {"_id": LT}}),
            json!({"name": "Berlin", "population": 3600000, "country": {"_id": DE}}),
            json!({"name": "Hamburg", "country": {"_id": DE}}),
            json!({"name": "Alytus", "population": 50000, "country": {"_id": LT}}),
        ]),
    )
    .await;
    assert_eq!(response.status, 200, "{}", response.json());
}

/// Reads `query` page by page, following `_page.next`.
async fn read_pages(gateway: &Gateway, query: &str, size: usize) -> Vec<String> {
    let mut all = vec![];
    let mut target = format!("/City?{query}&limit({size})&page(size({size}))");
    loop {
        let body = get(gateway, &target).await;
        let page = names(&body);
        assert!(page.len() <= size, "{target}: {page:?}");
        all.extend(page);

        let Some(next) = body["_page"]["next"].as_str() else {
            return all;
        };
        target = format!("/City?{query}&limit({size})&page(\"{next}\", size({size}))");
    }
}

/// Rows tied on a null key come in id order, which is random here.
fn sorted(names: &[String]) -> Vec<String> {
    let mut names = names.to_vec();
    names.sort();
    names
}

async fn pages_add_up_to_the_listing(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    populated(&gateway).await;

    for query in [
        "select(name)",
        "select(name)&sort(name)",
        "select(name)&sort(-name)",
        "select(name)&sort(population)",
        "select(name)&sort(-population, name)",
        "select(name)&name!=\"Berlin\"&sort(population)",
    ] {
        let listing = names(&get(&gateway, &format!("/City?{query}")).await);
        let unpaged = names(&get(&gateway, &format!("/City?{query}&page(disable)")).await);
        assert_eq!(listing.len(), unpaged.len(), "{query}");

        for size in [1, 2, 4] {
            assert_eq!(read_pages(&gateway, query, size).await, listing, "{query} size={size}");
        }
    }
}

async fn nulls_sort_last_ascending(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    populated(&gateway).await;

    let ascending = read_pages(&gateway, "select(name)&sort(population)", 2).await;
    assert_eq!(ascending[..4].to_vec(), ["Alytus", "Kaunas", "Vilnius", "Berlin"]);
    assert_eq!(sorted(&ascending[4..]), ["Hamburg", "Klaipeda"]);

    let descending = read_pages(&gateway, "select(name)&sort(-population)", 2).await;
    assert_eq!(sorted(&descending[..2]), ["Hamburg", "Klaipeda"]);
    assert_eq!(descending[2..].to_vec(), ["Berlin", "Vilnius", "Kaunas", "Alytus"]);
}

async fn whole_listing_reads_every_window(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    populated(&gateway).await;

    // Without a limit, every window is read into one response.
    let body = get(&gateway, "/City?select(name)&sort(name)&page(size(2))").await;
    assert_eq!(
        names(&body),
        ["Alytus", "Berlin", "Hamburg", "Kaunas", "Klaipeda", "Vilnius"]
    );
    assert!(body.get("_page").is_none());

    // The last page has fewer rows than the limit.
    let body = get(&gateway, "/City?select(name)&sort(name)&limit(6)&page(size(2))").await;
    assert_eq!(names(&body).len(), 6);
    assert!(body.get("_page").is_none());
}

async fn bad_page_parameters(test: &mut DbTest) {
    let gateway = test.setup_gateway(manifest()).await;
    populated(&gateway).await;

    let response = handle(&gateway, Request::get("/City?page(\"not*a*cursor\")")).await;
    assert_eq!(response.status, 400, "{}", response.json());
    assert_eq!(error_code(&response), "InvalidPageKey");

    let response = handle(&gateway, Request::get("/City?limit(0)")).await;
    assert_eq!(response.status, 400, "{}", response.json());
    assert_eq!(error_code(&response), "InvalidValue");
}

tests!(
    pages_add_up_to_the_listing,
    nulls_sort_last_ascending,
    whole_listing_reads_every_window,
    bad_page_parameters,
);
