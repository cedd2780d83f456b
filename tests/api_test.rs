//! HTTP-level tests over the in-memory store. No database or docker needed.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use farmconnect::auth::{sign_webhook, Role, TokenSigner, SIGNATURE_HEADER};
use farmconnect::infrastructure::memory_store::MemoryStore;
use farmconnect::{configure, AppState};
use serde_json::{json, Value};
use uuid::Uuid;

const TOKEN_SECRET: &str = "test-token-secret";
const WEBHOOK_SECRET: &str = "test-webhook-secret";

struct Parties {
    farmer: String,
    trader: String,
    transporter: String,
}

fn parties() -> Parties {
    let signer = TokenSigner::new(TOKEN_SECRET);
    Parties {
        farmer: signer.issue(Uuid::new_v4(), Role::Farmer).unwrap(),
        trader: signer.issue(Uuid::new_v4(), Role::Trader).unwrap(),
        transporter: signer.issue(Uuid::new_v4(), Role::Transporter).unwrap(),
    }
}

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(
                    Arc::new(MemoryStore::new()),
                    WEBHOOK_SECRET,
                )))
                .app_data(web::Data::new(TokenSigner::new(TOKEN_SECRET)))
                .configure(configure),
        )
        .await
    };
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

macro_rules! send {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        let json: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }};
}

fn webhook(order_id: &str, payment_type: &str, status: &str, amount: &Value) -> test::TestRequest {
    let body = serde_json::to_vec(&json!({
        "orderId": order_id,
        "type": payment_type,
        "status": status,
        "gatewayPaymentId": format!("pay_{}", Uuid::new_v4().simple()),
        "amount": amount,
    }))
    .unwrap();
    let signature = sign_webhook(WEBHOOK_SECRET, &body).unwrap();
    test::TestRequest::post()
        .uri("/api/payments/webhook")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(body)
}

macro_rules! place_order {
    ($app:expr, $p:expr) => {{
        let (status, crop) = send!(
            $app,
            test::TestRequest::post()
                .uri("/api/crops")
                .insert_header(bearer(&$p.farmer))
                .set_json(json!({
                    "name": "Basmati rice",
                    "unit": "kg",
                    "quantity": 500,
                    "pricePerUnit": "10"
                }))
        );
        assert_eq!(status, StatusCode::CREATED);

        let (status, order) = send!(
            $app,
            test::TestRequest::post()
                .uri("/api/orders/create")
                .insert_header(bearer(&$p.trader))
                .set_json(json!({
                    "cropId": crop["id"],
                    "quantity": 100,
                    "deliveryAddress": "Market yard 4"
                }))
        );
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["orderStatus"], "Pending");
        order["id"].as_str().unwrap().to_string()
    }};
}

#[actix_web::test]
async fn health_needs_no_token() {
    let app = app!();
    let (status, body) = send!(app, test::TestRequest::get().uri("/health"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn missing_or_forged_token_is_unauthenticated() {
    let app = app!();
    let (status, body) = send!(app, test::TestRequest::get().uri("/api/orders"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "Unauthenticated");

    let forged = TokenSigner::new("another-secret")
        .issue(Uuid::new_v4(), Role::Trader)
        .unwrap();
    let (status, _) = send!(
        app,
        test::TestRequest::get()
            .uri("/api/orders")
            .insert_header(bearer(&forged))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn wrong_role_is_forbidden() {
    let app = app!();
    let p = parties();
    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/api/crops")
            .insert_header(bearer(&p.trader))
            .set_json(json!({
                "name": "Wheat",
                "unit": "kg",
                "quantity": 10,
                "pricePerUnit": "5"
            }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "Unauthorized");
}

#[actix_web::test]
async fn out_of_order_action_reports_current_state() {
    let app = app!();
    let p = parties();
    let order_id = place_order!(app, p);

    let (status, body) = send!(
        app,
        test::TestRequest::put()
            .uri(&format!("/api/orders/ready/{order_id}"))
            .insert_header(bearer(&p.farmer))
    );
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "InvalidTransition");
    assert_eq!(body["currentState"], "Pending");
}

#[actix_web::test]
async fn strangers_cannot_read_an_order() {
    let app = app!();
    let p = parties();
    let order_id = place_order!(app, p);
    let stranger = TokenSigner::new(TOKEN_SECRET)
        .issue(Uuid::new_v4(), Role::Trader)
        .unwrap();

    let (status, _) = send!(
        app,
        test::TestRequest::get()
            .uri(&format!("/api/orders/{order_id}"))
            .insert_header(bearer(&stranger))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn webhook_with_bad_signature_is_rejected() {
    let app = app!();
    let p = parties();
    let order_id = place_order!(app, p);

    let body = serde_json::to_vec(&json!({
        "orderId": order_id,
        "type": "advance",
        "status": "completed",
        "gatewayPaymentId": "pay_forged",
        "amount": "300"
    }))
    .unwrap();
    let (status, _) = send!(
        app,
        test::TestRequest::post()
            .uri("/api/payments/webhook")
            .insert_header(("Content-Type", "application/json"))
            .insert_header((SIGNATURE_HEADER, "00ff"))
            .set_payload(body.clone())
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send!(
        app,
        test::TestRequest::post()
            .uri("/api/payments/webhook")
            .insert_header(("Content-Type", "application/json"))
            .set_payload(body)
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, order) = send!(
        app,
        test::TestRequest::get()
            .uri(&format!("/api/orders/{order_id}"))
            .insert_header(bearer(&p.trader))
    );
    assert_eq!(order["orderStatus"], "Pending");
}

#[actix_web::test]
async fn order_runs_from_placement_to_completion() {
    let app = app!();
    let p = parties();
    let order_id = place_order!(app, p);

    let (status, agreement) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/agreements/farmer-sign/{order_id}"))
            .insert_header(bearer(&p.farmer))
            .set_json(json!({
                "qualityCommitment": "Sorted, under 12% moisture",
                "qualityGrade": "A",
                "digitalSignature": "F. Armer"
            }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agreement["fullySigned"], false);

    let (status, agreement) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/agreements/trader-sign/{order_id}"))
            .insert_header(bearer(&p.trader))
            .set_json(json!({ "digitalSignature": "T. Rader" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agreement["fullySigned"], true);

    let (status, advance) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/payments/initiate/{order_id}"))
            .insert_header(bearer(&p.trader))
            .set_json(json!({ "type": "advance" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(advance["status"], "pending");

    let (status, applied) = send!(
        app,
        webhook(&order_id, "advance", "completed", &advance["amount"])
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(applied["outcome"], "applied");

    let (status, order) = send!(
        app,
        test::TestRequest::put()
            .uri(&format!("/api/orders/ready/{order_id}"))
            .insert_header(bearer(&p.farmer))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["orderStatus"], "Ready for Pickup");

    let (status, delivery) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/transport/accept/{order_id}"))
            .insert_header(bearer(&p.transporter))
            .set_json(json!({
                "vehicleType": "truck",
                "vehicleNumber": "mh12ab1234",
                "deliveryFee": "250"
            }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(delivery["vehicleNumber"], "MH12AB1234");
    let delivery_id = delivery["id"].as_str().unwrap().to_string();

    let (status, _) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/transport/location/{delivery_id}"))
            .insert_header(bearer(&p.transporter))
            .set_json(json!({ "latitude": 18.52, "longitude": 73.85 }))
    );
    assert_eq!(status, StatusCode::CREATED);

    for step in ["Picked Up", "In Transit", "Delivered"] {
        let (status, delivery) = send!(
            app,
            test::TestRequest::put()
                .uri(&format!("/api/transport/status/{delivery_id}"))
                .insert_header(bearer(&p.transporter))
                .set_json(json!({ "status": step }))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(delivery["status"], step);
    }

    let (status, locations) = send!(
        app,
        test::TestRequest::get()
            .uri(&format!("/api/transport/location/order/{order_id}"))
            .insert_header(bearer(&p.trader))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(locations.as_array().unwrap().len(), 1);

    let (status, final_payment) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/payments/initiate/{order_id}"))
            .insert_header(bearer(&p.trader))
            .set_json(json!({ "type": "final" }))
    );
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send!(
        app,
        webhook(&order_id, "final", "completed", &final_payment["amount"])
    );
    assert_eq!(status, StatusCode::OK);

    let (_, order) = send!(
        app,
        test::TestRequest::get()
            .uri(&format!("/api/orders/{order_id}"))
            .insert_header(bearer(&p.farmer))
    );
    assert_eq!(order["orderStatus"], "Completed");
    assert_eq!(order["paymentStatus"], "Full Paid");
    assert_eq!(order["allowedActions"], json!([]));

    let (_, payments) = send!(
        app,
        test::TestRequest::get()
            .uri(&format!("/api/payments/order/{order_id}"))
            .insert_header(bearer(&p.trader))
    );
    let payments = payments.as_array().unwrap();
    assert_eq!(payments.len(), 2);
    assert!(payments.iter().all(|p| p["status"] == "completed"));
}

#[actix_web::test]
async fn unknown_status_filter_is_a_validation_error() {
    let app = app!();
    let p = parties();
    let (status, body) = send!(
        app,
        test::TestRequest::get()
            .uri("/api/orders?status=Shipped")
            .insert_header(bearer(&p.trader))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");
}

#[actix_web::test]
async fn huge_page_number_returns_an_empty_page() {
    let app = app!();
    let p = parties();
    place_order!(app, p);

    let (status, body) = send!(
        app,
        test::TestRequest::get()
            .uri("/api/orders?page=9223372036854775807&limit=100")
            .insert_header(bearer(&p.trader))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"], json!([]));
}
