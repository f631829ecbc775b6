//! Integration tests for the API server.

use std::sync::Arc;
use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::ProductId;
use metrics_exporter_prometheus::PrometheusHandle;
use orders::clients::ProductInfo;
use payments::SimulatedGateway;
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

async fn setup_with(gateway: SimulatedGateway) -> (axum::Router, api::DefaultState) {
    let state = api::create_default_state(Arc::new(gateway));
    state
        .catalog
        .add_product(ProductInfo {
            id: ProductId::new(1),
            name: "Widget".to_string(),
            sku: "SKU-001".to_string(),
            main_image_url: String::new(),
            price: 10.0,
            stock: 100,
            is_in_stock: true,
        })
        .await;
    let app = api::create_app(state.state.clone(), get_metrics_handle());
    (app, state)
}

async fn setup() -> (axum::Router, api::DefaultState) {
    setup_with(SimulatedGateway::always_approve()).await
}

fn authed_as(builder: axum::http::request::Builder, user_id: &str) -> axum::http::request::Builder {
    builder
        .header("X-Forwarded-From-Gateway", "true")
        .header("X-User-ID", user_id)
        .header("X-User-Nome", "Maria Silva")
        .header("X-User-Email", "maria@example.com")
}

fn authed(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    authed_as(builder, "1")
}

fn admin(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    authed_as(builder, "999").header("X-User-Is-Admin", "true")
}

fn json_body(value: serde_json::Value) -> Body {
    Body::from(serde_json::to_string(&value).unwrap())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn order_request() -> serde_json::Value {
    serde_json::json!({
        "items": [{ "product_id": 1, "quantity": 2 }],
        "shipping_address": {
            "street": "Rua das Flores",
            "number": "100",
            "complement": "",
            "neighborhood": "Centro",
            "city": "São Paulo",
            "state": "SP",
            "zip_code": "01000000"
        },
        "shipping_cost": 500
    })
}

async fn place_order(app: &axum::Router) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            authed(Request::builder().method("POST").uri("/orders"))
                .header("content-type", "application/json")
                .body(json_body(order_request()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

fn payment_request(order_id: &str) -> serde_json::Value {
    serde_json::json!({
        "order_id": order_id,
        "method": "credit_card",
        "card_number": "4111111111114242",
        "card_holder_name": "MARIA SILVA",
        "card_cvv": "123",
        "installments": 1
    })
}

async fn pay(app: &axum::Router, order_id: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            authed(Request::builder().method("POST").uri("/payments"))
                .header("content-type", "application/json")
                .body(json_body(payment_request(order_id)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn get_order(app: &axum::Router, order_id: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            authed(Request::builder().uri(format!("/orders/{order_id}")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_requests_without_gateway_headers_are_rejected() {
    let (app, _) = setup().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Identity headers alone are not trusted without the gateway marker.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders")
                .header("X-User-ID", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_order_computes_totals() {
    let (app, state) = setup().await;

    let order = place_order(&app).await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["subtotal"], 2000);
    assert_eq!(order["total"], 2500);
    assert_eq!(order["items_count"], 2);
    assert_eq!(order["order_number"].as_str().unwrap().len(), 8);
    assert_eq!(order["status_history"].as_array().unwrap().len(), 1);

    // Stock reserved for the two units.
    let reservations = state.stock.reservations().await;
    assert_eq!(reservations, vec![(ProductId::new(1), 2)]);
}

#[tokio::test]
async fn test_create_order_for_unknown_product_fails() {
    let (app, _) = setup().await;

    let mut request = order_request();
    request["items"][0]["product_id"] = serde_json::json!(42);
    let response = app
        .oneshot(
            authed(Request::builder().method("POST").uri("/orders"))
                .header("content-type", "application/json")
                .body(json_body(request))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _) = setup().await;
    let fake_id = uuid::Uuid::new_v4();

    let response = app
        .oneshot(
            authed(Request::builder().uri(format!("/orders/{fake_id}")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(
            authed(Request::builder().uri("/orders/not-a-uuid"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_users_orders_are_hidden() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    let response = app
        .oneshot(
            authed_as(Request::builder().uri(format!("/orders/{order_id}")), "2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cancel_order_releases_stock() {
    let (app, state) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            authed(
                Request::builder()
                    .method("POST")
                    .uri(format!("/orders/{order_id}/cancel")),
            )
            .header("content-type", "application/json")
            .body(json_body(serde_json::json!({ "reason": "changed my mind" })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cancelled = body_json(response).await;
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(state.stock.releases().await, vec![(ProductId::new(1), 2)]);

    // A cancelled order rejects further transitions.
    let response = app
        .oneshot(
            admin(
                Request::builder()
                    .method("POST")
                    .uri(format!("/orders/{order_id}/update-status")),
            )
            .header("content-type", "application/json")
            .body(json_body(serde_json::json!({ "status": "shipped" })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_status_requires_admin() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    let response = app
        .oneshot(
            authed(
                Request::builder()
                    .method("POST")
                    .uri(format!("/orders/{order_id}/update-status")),
            )
            .header("content-type", "application/json")
            .body(json_body(serde_json::json!({ "status": "shipped" })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_ships_order_with_tracking_code() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    for status in ["confirmed", "processing"] {
        let response = app
            .clone()
            .oneshot(
                admin(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/orders/{order_id}/update-status")),
                )
                .header("content-type", "application/json")
                .body(json_body(serde_json::json!({ "status": status })))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(
            admin(
                Request::builder()
                    .method("POST")
                    .uri(format!("/orders/{order_id}/update-status")),
            )
            .header("content-type", "application/json")
            .body(json_body(serde_json::json!({
                "status": "shipped",
                "tracking_code": "BR123456789"
            })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let shipped = body_json(response).await;
    assert_eq!(shipped["status"], "shipped");
    assert_eq!(shipped["tracking_code"], "BR123456789");
    assert_eq!(shipped["can_be_cancelled"], false);
}

#[tokio::test]
async fn test_card_payment_confirms_order() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    let payment = pay(&app, order_id).await;
    assert_eq!(payment["status"], "approved");
    assert_eq!(payment["amount"], 2500);
    assert_eq!(payment["card"]["last4"], "4242");
    assert_eq!(payment["card"]["brand"], "Visa");
    assert!(payment["gateway_transaction_id"].as_str().is_some());

    let order = get_order(&app, order_id).await;
    assert_eq!(order["status"], "confirmed");
}

#[tokio::test]
async fn test_declined_payment_leaves_order_pending() {
    let (app, _) = setup_with(SimulatedGateway::always_decline()).await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            authed(Request::builder().method("POST").uri("/payments"))
                .header("content-type", "application/json")
                .body(json_body(payment_request(order_id)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let payment = body_json(response).await;
    assert_eq!(payment["status"], "declined");
    assert!(payment["decline_reason"].as_str().is_some());

    let order = get_order(&app, order_id).await;
    assert_eq!(order["status"], "pending");
}

#[tokio::test]
async fn test_second_payment_for_paid_order_conflicts() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();
    pay(&app, order_id).await;

    let response = app
        .oneshot(
            authed(Request::builder().method("POST").uri("/payments"))
                .header("content-type", "application/json")
                .body(json_body(payment_request(order_id)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invalid_card_rejected() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    let mut request = payment_request(order_id);
    request["card_number"] = serde_json::json!("4111");
    let response = app
        .oneshot(
            authed(Request::builder().method("POST").uri("/payments"))
                .header("content-type", "application/json")
                .body(json_body(request))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_refund_cancels_order() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();
    let payment = pay(&app, order_id).await;
    let payment_id = payment["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            authed(
                Request::builder()
                    .method("POST")
                    .uri(format!("/payments/{payment_id}/request-refund")),
            )
            .header("content-type", "application/json")
            .body(json_body(serde_json::json!({ "reason": "customer gave up" })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let refunded = body_json(response).await;
    assert_eq!(refunded["status"], "refunded");
    assert_eq!(refunded["refunded_amount"], 2500);
    assert_eq!(refunded["refunds"].as_array().unwrap().len(), 1);

    let order = get_order(&app, order_id).await;
    assert_eq!(order["status"], "cancelled");

    // Refunding again conflicts.
    let response = app
        .oneshot(
            authed(
                Request::builder()
                    .method("POST")
                    .uri(format!("/payments/{payment_id}/request-refund")),
            )
            .header("content-type", "application/json")
            .body(json_body(serde_json::json!({})))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_partial_refund_keeps_order_confirmed() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();
    let payment = pay(&app, order_id).await;
    let payment_id = payment["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            authed(
                Request::builder()
                    .method("POST")
                    .uri(format!("/payments/{payment_id}/request-refund")),
            )
            .header("content-type", "application/json")
            .body(json_body(serde_json::json!({
                "amount": 1000,
                "reason": "damaged item"
            })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let partial = body_json(response).await;
    assert_eq!(partial["status"], "approved");
    assert_eq!(partial["refunded_amount"], 1000);

    let order = get_order(&app, order_id).await;
    assert_eq!(order["status"], "confirmed");
}

#[tokio::test]
async fn test_pix_payment_settled_by_admin() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            authed(Request::builder().method("POST").uri("/payments"))
                .header("content-type", "application/json")
                .body(json_body(serde_json::json!({
                    "order_id": order_id,
                    "method": "pix"
                })))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let payment = body_json(response).await;
    assert_eq!(payment["status"], "pending");
    assert_eq!(payment["pix"]["code"].as_str().unwrap().len(), 32);
    let payment_id = payment["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            admin(
                Request::builder()
                    .method("POST")
                    .uri(format!("/payments/{payment_id}/update-status")),
            )
            .header("content-type", "application/json")
            .body(json_body(serde_json::json!({
                "status": "approved",
                "comment": "pix settled"
            })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let order = get_order(&app, order_id).await;
    assert_eq!(order["status"], "confirmed");
}

#[tokio::test]
async fn test_unpaid_pix_payment_declined_by_admin_with_reason() {
    let (app, _) = setup().await;
    let order = place_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            authed(Request::builder().method("POST").uri("/payments"))
                .header("content-type", "application/json")
                .body(json_body(serde_json::json!({
                    "order_id": order_id,
                    "method": "pix"
                })))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let payment = body_json(response).await;
    let payment_id = payment["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            admin(
                Request::builder()
                    .method("POST")
                    .uri(format!("/payments/{payment_id}/update-status")),
            )
            .header("content-type", "application/json")
            .body(json_body(serde_json::json!({
                "status": "declined",
                "comment": "charge expired",
                "decline_reason": "PIX charge expired unpaid"
            })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let declined = body_json(response).await;
    assert_eq!(declined["status"], "declined");
    assert_eq!(declined["decline_reason"], "PIX charge expired unpaid");

    let order = get_order(&app, order_id).await;
    assert_eq!(order["status"], "pending");
}

#[tokio::test]
async fn test_statistics_require_admin() {
    let (app, _) = setup().await;

    let response = app
        .clone()
        .oneshot(
            authed(Request::builder().uri("/orders/statistics"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(
            admin(Request::builder().uri("/orders/statistics"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_orders_scoped_to_caller() {
    let (app, _) = setup().await;
    place_order(&app).await;

    let response = app
        .clone()
        .oneshot(
            authed(Request::builder().uri("/orders"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mine = body_json(response).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    // A different user sees nothing.
    let response = app
        .oneshot(
            authed_as(Request::builder().uri("/orders"), "2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let theirs = body_json(response).await;
    assert_eq!(theirs.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
