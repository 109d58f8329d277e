//! Integration tests for the API server.

use std::str::FromStr;
use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use catalog::{InMemoryCatalog, Product};
use common::{Money, ProductId, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryDatabase;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    db: InMemoryDatabase,
    catalog: InMemoryCatalog,
}

fn setup() -> TestApp {
    let (state, db, catalog) = api::create_in_memory_state();
    let app = api::create_app(state, get_metrics_handle());
    TestApp { app, db, catalog }
}

impl TestApp {
    fn product(&self, price: &str) -> ProductId {
        let product = Product::new(ProductId::new(), "Widget", Money::from_str(price).unwrap());
        let id = product.id;
        self.catalog.insert(product);
        id
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<UserId>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

fn checkout_body() -> Value {
    json!({
        "payment": {"method": "card"},
        "delivery": {"address": "1 Main St", "firstName": "Ada", "lastName": "Lovelace"},
        "comments": "ring twice"
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let user = UserId::new();
    app.send("GET", "/api/profile/cart", Some(user), None).await;

    let response = app
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("carts_created_total"));
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = setup();

    let (status, json) = app.send("GET", "/api/profile/cart", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().unwrap().contains("x-user-id"));
}

#[tokio::test]
async fn test_get_cart_creates_empty_cart() {
    let app = setup();
    let user = UserId::new();

    let (status, json) = app.send("GET", "/api/profile/cart", Some(user), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cart"]["status"], "OPEN");
    assert_eq!(json["cart"]["items"], json!([]));
    assert_eq!(json["total"], "0.00");
    assert_eq!(app.db.open_cart_count(user).await, 1);
}

#[tokio::test]
async fn test_add_items_and_get_priced_cart() {
    let app = setup();
    let user = UserId::new();
    let p1 = app.product("10.00");
    let p2 = app.product("25.00");

    let (status, json) = app
        .send(
            "POST",
            "/api/profile/cart/items",
            Some(user),
            Some(json!({"productId": p1.to_string(), "count": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);

    let (_, json) = app
        .send(
            "POST",
            "/api/profile/cart/items",
            Some(user),
            Some(json!({"productId": p1.to_string(), "count": 1})),
        )
        .await;
    assert_eq!(json["count"], 2);

    app.send(
        "POST",
        "/api/profile/cart/items",
        Some(user),
        Some(json!({"productId": p2.to_string(), "count": 1})),
    )
    .await;

    let (status, json) = app.send("GET", "/api/profile/cart", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cart"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(json["total"], "45.00");
}

#[tokio::test]
async fn test_add_item_validation() {
    let app = setup();

    let (status, json) = app
        .send(
            "POST",
            "/api/profile/cart/items",
            Some(UserId::new()),
            Some(json!({"productId": "not-a-uuid", "count": -2})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["fields"]["productId"][0], "must be a UUID");
    assert_eq!(json["fields"]["count"][0], "must be at least 1");
}

#[tokio::test]
async fn test_set_count_and_remove() {
    let app = setup();
    let user = UserId::new();
    let p = app.product("3.00");
    let item_uri = format!("/api/profile/cart/items/{p}");
    app.send(
        "POST",
        "/api/profile/cart/items",
        Some(user),
        Some(json!({"productId": p.to_string(), "count": 1})),
    )
    .await;

    let (status, json) = app
        .send("PUT", &item_uri, Some(user), Some(json!({"count": 7})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 7);

    let (status, _) = app
        .send("PUT", &item_uri, Some(user), Some(json!({"count": 0})))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send("DELETE", &item_uri, Some(user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_product_id_in_path() {
    let app = setup();

    let (status, _) = app
        .send(
            "DELETE",
            "/api/profile/cart/items/not-a-uuid",
            Some(UserId::new()),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_cart() {
    let app = setup();
    let user = UserId::new();
    app.send("GET", "/api/profile/cart", Some(user), None).await;

    let (status, _) = app
        .send("DELETE", "/api/profile/cart", Some(user), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.db.cart_count().await, 0);

    let (status, _) = app
        .send("DELETE", "/api/profile/cart", Some(user), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_and_read_order() {
    let app = setup();
    let user = UserId::new();
    let p1 = app.product("10.00");
    let p2 = app.product("25.00");
    for (p, count) in [(p1, 2), (p2, 1)] {
        app.send(
            "POST",
            "/api/profile/cart/items",
            Some(user),
            Some(json!({"productId": p.to_string(), "count": count})),
        )
        .await;
    }

    let (status, order) = app
        .send(
            "POST",
            "/api/profile/cart/checkout",
            Some(user),
            Some(checkout_body()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["total"], "45.00");
    assert_eq!(order["status"], "OPEN");
    assert_eq!(order["comments"], "ring twice");

    let order_uri = format!("/api/profile/order/{}", order["id"].as_str().unwrap());
    let (status, fetched) = app.send("GET", &order_uri, Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], order["id"]);

    let (status, _) = app.send("GET", &order_uri, Some(UserId::new()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The next cart access starts a fresh, empty cart.
    let (_, cart) = app.send("GET", "/api/profile/cart", Some(user), None).await;
    assert_eq!(cart["cart"]["items"], json!([]));
    assert_ne!(cart["cart"]["id"], order["cartId"]);
}

#[tokio::test]
async fn test_checkout_validation() {
    let app = setup();

    let (status, json) = app
        .send(
            "POST",
            "/api/profile/cart/checkout",
            Some(UserId::new()),
            Some(json!({"payment": {}, "delivery": {"address": ""}})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["fields"]["payment.method"][0], "is required");
    assert_eq!(json["fields"]["delivery.address"][0], "must not be empty");
}

#[tokio::test]
async fn test_checkout_without_cart_is_not_found() {
    let app = setup();

    let (status, _) = app
        .send(
            "POST",
            "/api/profile/cart/checkout",
            Some(UserId::new()),
            Some(checkout_body()),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_with_unpriced_item_is_bad_gateway() {
    let app = setup();
    let user = UserId::new();
    app.send(
        "POST",
        "/api/profile/cart/items",
        Some(user),
        Some(json!({"productId": ProductId::new().to_string(), "count": 1})),
    )
    .await;

    let (status, _) = app
        .send(
            "POST",
            "/api/profile/cart/checkout",
            Some(user),
            Some(checkout_body()),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(app.db.order_count().await, 0);
}

#[tokio::test]
async fn test_checkout_transaction_failure_is_service_unavailable() {
    let app = setup();
    let user = UserId::new();
    let p = app.product("1.00");
    app.send(
        "POST",
        "/api/profile/cart/items",
        Some(user),
        Some(json!({"productId": p.to_string(), "count": 1})),
    )
    .await;

    app.db.fail_next_cart_status_update();
    let (status, _) = app
        .send(
            "POST",
            "/api/profile/cart/checkout",
            Some(user),
            Some(checkout_body()),
        )
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.db.order_count().await, 0);
    assert_eq!(app.db.open_cart_count(user).await, 1);
}

#[tokio::test]
async fn test_patch_order() {
    let app = setup();
    let user = UserId::new();
    let p = app.product("5.00");
    app.send(
        "POST",
        "/api/profile/cart/items",
        Some(user),
        Some(json!({"productId": p.to_string(), "count": 1})),
    )
    .await;
    let (_, order) = app
        .send(
            "POST",
            "/api/profile/cart/checkout",
            Some(user),
            Some(checkout_body()),
        )
        .await;
    let order_uri = format!("/api/profile/order/{}", order["id"].as_str().unwrap());

    let patch = json!({"status": "APPROVED"});
    let (status, updated) = app.send("PATCH", &order_uri, Some(user), Some(patch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "APPROVED");
    assert_eq!(updated["total"], "5.00");

    let patch = json!({"total": "0.01"});
    let (status, json) = app.send("PATCH", &order_uri, Some(user), Some(patch)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("total"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = setup();

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/profile/cart/items")
                .header("x-user-id", UserId::new().to_string())
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_total_is_bad_request() {
    let app = setup();
    let user = UserId::new();
    let product_id = app.product("10000000000000000000000000000");
    app.send(
        "POST",
        "/api/profile/cart/items",
        Some(user),
        Some(json!({"productId": product_id.to_string(), "count": 10})),
    )
    .await;

    let (status, body) = app
        .send("GET", "/api/profile/cart", Some(user), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("out of range"));

    let (status, _) = app
        .send(
            "POST",
            "/api/profile/cart/checkout",
            Some(user),
            Some(checkout_body()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.db.order_count().await, 0);
}
