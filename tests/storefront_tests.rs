//! End-to-end tests: catalog, registry, planner and executor over the
//! storefront fixture, plus the HTTP routes.

use std::sync::Arc;

use async_graphql::{Request as GraphQLRequest, Variables};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use storefront_graphql::app::{AppState, build_app};
use storefront_graphql::catalog::EntityCatalog;
use storefront_graphql::config::Config;
use storefront_graphql::graphql::{Executor, PageDefaults, RootFields, TypeRegistry};
use storefront_graphql::services::InMemoryDataSource;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/storefront.json");

async fn executor_with(pages: PageDefaults) -> Executor {
    let catalog = Arc::new(EntityCatalog::storefront().unwrap());
    let registry = Arc::new(TypeRegistry::new(catalog.clone()));
    registry.compile_all().unwrap();
    let source = InMemoryDataSource::storefront(catalog);
    source.load_file(FIXTURE).await.unwrap();
    Executor::new(registry, RootFields::storefront(), Arc::new(source), pages)
}

async fn executor() -> Executor {
    executor_with(PageDefaults::default()).await
}

/// Runs `query` and returns the serialized `{ data, errors }` envelope.
async fn run(executor: &Executor, query: &str, variables: Value) -> Value {
    let request = GraphQLRequest::new(query).variables(Variables::from_json(variables));
    serde_json::to_value(executor.execute(request).await).unwrap()
}

fn codes(response: &Value) -> Vec<&str> {
    response["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["extensions"]["code"].as_str())
                .collect()
        })
        .unwrap_or_default()
}

fn is_ok(response: &Value) -> bool {
    response.get("errors").is_none()
}

#[tokio::test]
async fn test_product_lookup_reads_every_namespace() {
    let executor = executor().await;
    let response = run(
        &executor,
        r#"{ product(sku: "MUG-BLK") { id name price material comments(limit: 1) { author } } }"#,
        json!({}),
    )
    .await;
    assert!(is_ok(&response), "{response}");
    assert_eq!(
        response["data"],
        json!({
            "product": {
                "id": "1",
                "name": "Black Mug",
                "price": 12.5,
                "material": "stoneware",
                "comments": [ { "author": "ana" } ]
            }
        })
    );

    let response = run(&executor, r#"{ product(id: "3") { material } }"#, json!({})).await;
    assert_eq!(response["data"], json!({ "product": { "material": "polyester" } }));

    let response = run(&executor, r#"{ product(id: "404") { sku } }"#, json!({})).await;
    assert_eq!(response["data"], json!({ "product": null }));
    assert!(is_ok(&response));
}

#[tokio::test]
async fn test_search_with_and_filter() {
    let executor = executor().await;
    let response = run(
        &executor,
        "{ products(filter: { price: { gt: 15 }, status: { eq: 1 } }) { sku } }",
        json!({}),
    )
    .await;
    assert_eq!(
        response["data"],
        json!({ "products": [ { "sku": "TEE-ORG-M" }, { "sku": "BAG-TOTE" } ] })
    );
}

#[tokio::test]
async fn test_search_with_any_join_and_variables() {
    let executor = executor().await;
    let response = run(
        &executor,
        r#"query Search($filter: ProductFilter) { products(filter: $filter) { sku } }"#,
        json!({ "filter": { "_join": "ANY", "sku": { "eq": "MUG-BLK" }, "status": { "eq": 2 } } }),
    )
    .await;
    assert_eq!(
        response["data"],
        json!({ "products": [ { "sku": "MUG-BLK" }, { "sku": "CAP-RED" } ] })
    );
}

#[tokio::test]
async fn test_unsupported_filter_shape_fails_the_operation() {
    let executor = executor().await;
    let response = run(
        &executor,
        r#"{ products(filter: {
            _join: ANY,
            sku: { eq: "MUG-BLK" },
            _children: [ { status: { eq: 1 }, _children: [ { _join: ANY, sku: { eq: "CAP-RED" }, typeId: { eq: "simple" } } ] } ]
        }) { sku } }"#,
        json!({}),
    )
    .await;
    assert_eq!(response["data"], Value::Null);
    assert_eq!(codes(&response), vec!["UNSUPPORTED_FILTER_SHAPE"]);

    let response = run(&executor, "{ products(filter: { price: { gt: 1, lt: 5 } }) { sku } }", json!({})).await;
    assert_eq!(codes(&response), vec!["FILTER_FORMAT_ERROR"]);
}

#[tokio::test]
async fn test_filters_through_repeating_attributes() {
    let executor = executor().await;
    let response = run(
        &executor,
        r#"{ orders(filter: { items: { product: { sku: { eq: "CAP-RED" } } } }) { id } }"#,
        json!({}),
    )
    .await;
    assert_eq!(response["data"], json!({ "orders": [ { "id": "1100" } ] }));

    // Each constraint could hold for a different item.
    let response = run(
        &executor,
        r#"{ orders(filter: { items: { qty: { gteq: 2 }, product: { sku: { eq: "TEE-ORG-M" } } } }) { id } }"#,
        json!({}),
    )
    .await;
    assert_eq!(response["data"], Value::Null);
    assert_eq!(codes(&response), vec!["UNSUPPORTED_FILTER_SHAPE"]);

    let response = run(
        &executor,
        r#"{ products(filter: { _join: ANY, _children: [ {}, { sku: { eq: "MUG-BLK" } } ] }) { sku } }"#,
        json!({}),
    )
    .await;
    assert_eq!(response["data"]["products"].as_array().map(Vec::len), Some(4));
}

#[tokio::test]
async fn test_root_pagination_defaults_and_cap() {
    let executor = executor_with(PageDefaults {
        default_limit: 2,
        max_limit: 3,
    })
    .await;
    let skus = |response: Value| -> Vec<String> {
        response["data"]["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["sku"].as_str().unwrap().to_string())
            .collect()
    };

    let response = run(&executor, "{ products { sku } }", json!({})).await;
    assert_eq!(skus(response), vec!["MUG-BLK", "TEE-ORG-M"]);
    let response = run(&executor, "{ products(limit: 10) { sku } }", json!({})).await;
    assert_eq!(skus(response).len(), 3);
    let response = run(&executor, "{ products(start: 3) { sku } }", json!({})).await;
    assert_eq!(skus(response), vec!["BAG-TOTE"]);
}

#[tokio::test]
async fn test_nested_windows_and_entities() {
    let executor = executor().await;
    let response = run(
        &executor,
        r#"{ order(id: "1000") {
            items(start: 1, limit: 1) { qty product { sku } options { value } }
            billingAddress { city }
            customer { name }
            paymentInfo { amount }
        } }"#,
        json!({}),
    )
    .await;
    assert!(is_ok(&response), "{response}");
    assert_eq!(
        response["data"],
        json!({
            "order": {
                "items": [
                    { "qty": 1.0, "product": { "sku": "TEE-ORG-M" }, "options": [ { "value": "M" }, { "value": "green" } ] }
                ],
                "billingAddress": { "city": "London" },
                "customer": { "name": "Ada Lovelace" },
                "paymentInfo": [ { "amount": 97.97 } ]
            }
        })
    );
}

#[tokio::test]
async fn test_nested_filters() {
    let executor = executor().await;
    let response = run(
        &executor,
        "{ orders { id items(filter: { qty: { gteq: 2 } }) { id } } }",
        json!({}),
    )
    .await;
    assert_eq!(
        response["data"],
        json!({
            "orders": [
                { "id": "1000", "items": [ { "id": "1001" }, { "id": "1003" } ] },
                { "id": "1100", "items": [] }
            ]
        })
    );

    let response = run(
        &executor,
        r#"{ orders(filter: { billingAddress: { city: { eq: "London" } } }) { id shippingAddress { city } } }"#,
        json!({}),
    )
    .await;
    assert_eq!(
        response["data"],
        json!({ "orders": [ { "id": "1000", "shippingAddress": { "city": "London" } } ] })
    );

    let response = run(
        &executor,
        r#"{ customer(id: "11") { name addresses(filter: { city: { like: "new%" } }) { zip } orders { id } } }"#,
        json!({}),
    )
    .await;
    assert_eq!(
        response["data"],
        json!({ "customer": { "name": "Grace Hopper", "addresses": [ { "zip": "10001" } ], "orders": [] } })
    );
}

#[tokio::test]
async fn test_fragments_and_typename() {
    let executor = executor().await;
    let response = run(
        &executor,
        r#"query { __typename ...Root }
           fragment Root on Query { product(id: "2") { ...Fields } }
           fragment Fields on Product { __typename sku }"#,
        json!({}),
    )
    .await;
    assert_eq!(
        response["data"],
        json!({ "__typename": "Query", "product": { "__typename": "Product", "sku": "TEE-ORG-M" } })
    );
}

#[tokio::test]
async fn test_request_shape_errors() {
    let executor = executor().await;
    let cases = [
        (r#"{ p: product(id: "1") { id } }"#, "UNSUPPORTED_OPERATION"),
        (r#"{ product(id: "1") { nope } }"#, "SCHEMA_ERROR"),
        ("{ widgets { id } }", "SCHEMA_ERROR"),
        (r#"{ product(id: "1", color: "red") { id } }"#, "BAD_USER_INPUT"),
        ("{ customer { id } }", "BAD_USER_INPUT"),
        ("{ products(limit: -1) { id } }", "BAD_USER_INPUT"),
    ];
    for (query, code) in cases {
        let response = run(&executor, query, json!({})).await;
        assert_eq!(response["data"], Value::Null, "{query}");
        assert_eq!(codes(&response), vec![code], "{query}");
    }
}

#[tokio::test]
async fn test_place_order() {
    let executor = executor().await;
    let response = run(
        &executor,
        r#"mutation Place($order: OrderInput!) {
            placeOrder(order: $order) { id shippingMethod items { id qty options { attribute value } } }
        }"#,
        json!({
            "order": {
                "shippingMethod": "express",
                "items": [ { "qty": 1, "options": [ { "attribute": "size", "value": "L" } ] } ],
                "billingAddress": { "country": "FR", "city": "Lyon", "street": "3 quai Saint-Antoine", "zip": "69002" }
            }
        }),
    )
    .await;
    assert!(is_ok(&response), "{response}");
    let order = &response["data"]["placeOrder"];
    let id = order["id"].as_str().unwrap().to_string();
    assert_eq!(order["shippingMethod"], json!("express"));
    assert_eq!(order["items"][0]["qty"], json!(1.0));
    assert!(order["items"][0]["id"].is_string());
    assert_eq!(order["items"][0]["options"], json!([ { "attribute": "size", "value": "L" } ]));

    let response = run(
        &executor,
        "query Find($id: ID!) { order(id: $id) { billingAddress { city } } }",
        json!({ "id": id }),
    )
    .await;
    assert_eq!(response["data"], json!({ "order": { "billingAddress": { "city": "Lyon" } } }));

    let response = run(
        &executor,
        r#"mutation { placeOrder(order: { items: [] }) { id } }"#,
        json!({}),
    )
    .await;
    assert_eq!(response["data"], Value::Null);
    assert_eq!(codes(&response), vec!["BAD_USER_INPUT"]);
}

#[tokio::test]
async fn test_null_violation_nulls_the_root_field() {
    let catalog = Arc::new(EntityCatalog::storefront().unwrap());
    let source = InMemoryDataSource::storefront(catalog.clone());
    source
        .load_json(json!({ "Order": [ { "id": "1", "items": [] } ] }))
        .unwrap();
    let executor = Executor::new(
        Arc::new(TypeRegistry::new(catalog)),
        RootFields::storefront(),
        Arc::new(source),
        PageDefaults::default(),
    );

    let response = run(&executor, r#"{ order(id: "1") { shippingMethod } }"#, json!({})).await;
    assert_eq!(response["data"], json!({ "order": null }));
    assert_eq!(codes(&response), vec!["NULL_VIOLATION"]);
    assert_eq!(response["errors"][0]["path"], json!(["order"]));

    let response = run(&executor, "{ orders { shippingMethod } }", json!({})).await;
    assert_eq!(response["data"], Value::Null);
    assert_eq!(codes(&response), vec!["NULL_VIOLATION"]);
}

async fn app() -> axum::Router {
    let executor = executor().await;
    build_app(AppState {
        config: Arc::new(Config::from_vars(|_| None).unwrap()),
        executor: Arc::new(executor),
    })
}

async fn body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_http_graphql_post() {
    let request = Request::builder()
        .method("POST")
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "query": "query($sku: String) { product(sku: $sku) { id } }", "variables": { "sku": "CAP-RED" } })
                .to_string(),
        ))
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let envelope: Value = serde_json::from_slice(&body(response).await).unwrap();
    assert_eq!(envelope, json!({ "data": { "product": { "id": "3" } } }));

    let request = Request::builder()
        .method("POST")
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "query": "{ product { id } }" }).to_string()))
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();
    let envelope: Value = serde_json::from_slice(&body(response).await).unwrap();
    assert_eq!(envelope["data"], Value::Null);
    assert_eq!(envelope["errors"][0]["extensions"]["code"], json!("BAD_USER_INPUT"));
}

#[tokio::test]
async fn test_http_introspection_for_graphiql() {
    let request = Request::builder()
        .method("POST")
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "query": "{ __schema { queryType { name } types { name } } }" }).to_string(),
        ))
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let envelope: Value = serde_json::from_slice(&body(response).await).unwrap();
    assert!(envelope.get("errors").is_none(), "{envelope}");
    assert_eq!(envelope["data"]["__schema"]["queryType"]["name"], json!("Query"));
    let types = envelope["data"]["__schema"]["types"].as_array().unwrap();
    for name in ["Product", "OrderInput", "OrderFilter", "StringFilter", "AnyAll"] {
        assert!(types.iter().any(|ty| ty["name"] == name), "{name}");
    }
}

#[tokio::test]
async fn test_http_auxiliary_routes() {
    let response = app()
        .await
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: Value = serde_json::from_slice(&body(response).await).unwrap();
    assert_eq!(health["status"], json!("healthy"));

    let response = app()
        .await
        .oneshot(Request::builder().uri("/graphql/sdl").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sdl = String::from_utf8(body(response).await).unwrap();
    assert!(sdl.contains("type Query {"));
    assert!(sdl.contains("placeOrder(order: OrderInput!): Order"));

    let response = app()
        .await
        .oneshot(Request::builder().uri("/graphql").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/graphql")
                .header(header::ACCEPT, "text/html")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
