use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use fulfillment_coordinator::api::rest::router;
use fulfillment_coordinator::engine::notify::{LoggingGateway, OtpSender};
use fulfillment_coordinator::error::AppError;
use fulfillment_coordinator::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

#[derive(Default)]
struct CapturedCodes {
    codes: Mutex<Vec<String>>,
}

impl OtpSender for CapturedCodes {
    fn send_code(
        &self,
        _contact: &str,
        code: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.codes.lock().unwrap().push(code.to_string());
        Ok(())
    }
}

fn setup() -> axum::Router {
    router(Arc::new(AppState::new(1024)))
}

fn setup_with_codes() -> (axum::Router, Arc<CapturedCodes>) {
    let codes = Arc::new(CapturedCodes::default());
    let state = AppState::new(1024).with_collaborators(Arc::new(LoggingGateway), codes.clone());
    (router(Arc::new(state)), codes)
}

fn staff_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    principal_request("x-staff-id", Uuid::new_v4(), method, uri, body)
}

fn driver_request(driver: Uuid, method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    principal_request("x-driver-id", driver, method, uri, body)
}

fn principal_request(
    header: &str,
    principal: Uuid,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header, principal.to_string());

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn receive_order(app: &axum::Router, external_ref: &str, customer_id: Uuid) -> Value {
    let res = app
        .clone()
        .oneshot(staff_request(
            "POST",
            "/warehouse-orders",
            Some(json!({
                "external_order_ref": external_ref,
                "customer_id": customer_id,
                "customer_contact": "customer@example.com",
                "lines": [
                    { "item_ref": "apples", "unit_of_measure": "kg", "requested_amount": 5.0 },
                    { "item_ref": "bananas", "unit_of_measure": "kg", "requested_amount": 2.0 }
                ]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

async fn set_warehouse_status(app: &axum::Router, id: &str, status: &str) -> Value {
    let res = app
        .clone()
        .oneshot(staff_request(
            "PATCH",
            &format!("/warehouse-orders/{id}/status"),
            Some(json!({ "status": status })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

async fn ready_order(app: &axum::Router, external_ref: &str) -> (String, Uuid) {
    let customer_id = Uuid::new_v4();
    let order = receive_order(app, external_ref, customer_id).await;
    let id = order["id"].as_str().unwrap().to_string();
    set_warehouse_status(app, &id, "ReadyForDriverAssignment").await;
    (id, customer_id)
}

async fn assign_driver(app: &axum::Router, warehouse_order_id: &str, driver: Uuid) -> Value {
    let res = app
        .clone()
        .oneshot(staff_request(
            "POST",
            "/assignments",
            Some(json!({
                "warehouse_order_ids": [warehouse_order_id],
                "driver_id": driver
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["results"][0]["ok"], true);
    body["results"][0]["driver_order"].clone()
}

async fn warehouse_status(app: &axum::Router, id: &str) -> Value {
    let res = app
        .clone()
        .oneshot(staff_request("GET", &format!("/warehouse-orders/{id}"), None))
        .await
        .unwrap();
    body_json(res).await["status"].clone()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["warehouse_orders"], 0);
    assert_eq!(body["driver_orders"], 0);
    assert_eq!(body["pending_skip_requests"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_driver_orders"));
}

#[tokio::test]
async fn staff_routes_require_principal() {
    let app = setup();
    let response = app.oneshot(get_request("/warehouse-orders")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "unauthorized");
}

#[tokio::test]
async fn received_order_is_draft_with_items() {
    let app = setup();
    let order = receive_order(&app, "SO-100", Uuid::new_v4()).await;

    assert_eq!(order["status"], "Draft");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(order["items"][0]["warehouse_confirmed_amount"], 5.0);
}

#[tokio::test]
async fn duplicate_intake_returns_409() {
    let app = setup();
    receive_order(&app, "SO-101", Uuid::new_v4()).await;

    let res = app
        .oneshot(staff_request(
            "POST",
            "/warehouse-orders",
            Some(json!({
                "external_order_ref": "SO-101",
                "customer_id": Uuid::new_v4(),
                "customer_contact": "customer@example.com",
                "lines": [{ "item_ref": "apples", "unit_of_measure": "kg", "requested_amount": 1.0 }]
            })),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn negative_warehouse_amount_returns_400() {
    let app = setup();
    let order = receive_order(&app, "SO-102", Uuid::new_v4()).await;
    let id = order["id"].as_str().unwrap();
    let item_id = order["items"][0]["id"].as_str().unwrap();

    let res = app
        .oneshot(staff_request(
            "PATCH",
            &format!("/warehouse-orders/{id}/items/{item_id}"),
            Some(json!({ "confirmed_amount": -3.0 })),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["kind"], "validation_error");
}

#[tokio::test]
async fn repeated_status_change_is_idempotent() {
    let app = setup();
    let order = receive_order(&app, "SO-103", Uuid::new_v4()).await;
    let id = order["id"].as_str().unwrap();

    let first = set_warehouse_status(&app, id, "ReadyForDriverAssignment").await;
    let second = set_warehouse_status(&app, id, "ReadyForDriverAssignment").await;

    assert_eq!(first["status"], "ReadyForDriverAssignment");
    assert_eq!(first["updated_at"], second["updated_at"]);
}

#[tokio::test]
async fn batch_assignment_reports_per_order() {
    let app = setup();
    let (first, _) = ready_order(&app, "SO-110").await;
    let draft = receive_order(&app, "SO-111", Uuid::new_v4()).await;
    let draft_id = draft["id"].as_str().unwrap().to_string();
    let (third, _) = ready_order(&app, "SO-112").await;

    let res = app
        .clone()
        .oneshot(staff_request(
            "POST",
            "/assignments",
            Some(json!({
                "warehouse_order_ids": [first, draft_id, third],
                "driver_id": Uuid::new_v4()
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[1]["ok"], false);
    assert_eq!(results[1]["kind"], "invalid_state");
    assert_eq!(results[2]["ok"], true);

    assert_eq!(warehouse_status(&app, &first).await, "AssignedToDriver");
    assert_eq!(warehouse_status(&app, &draft_id).await, "Draft");
    assert_eq!(warehouse_status(&app, &third).await, "AssignedToDriver");
}

#[tokio::test]
async fn full_delivery_flow() {
    let app = setup();
    let (warehouse_id, _) = ready_order(&app, "SO-120").await;
    let driver = Uuid::new_v4();

    let driver_order = assign_driver(&app, &warehouse_id, driver).await;
    assert_eq!(driver_order["status"], "Pending");
    let driver_order_id = driver_order["id"].as_str().unwrap().to_string();
    assert_eq!(warehouse_status(&app, &warehouse_id).await, "AssignedToDriver");

    let res = app
        .clone()
        .oneshot(driver_request(
            driver,
            "PATCH",
            &format!("/driver/orders/{driver_order_id}/status"),
            Some(json!({ "status": "Dispatched" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let dispatched = body_json(res).await;
    assert!(!dispatched["delivery_start_time"].is_null());
    assert_eq!(warehouse_status(&app, &warehouse_id).await, "Dispatched");

    let res = app
        .clone()
        .oneshot(driver_request(
            driver,
            "GET",
            &format!("/driver/orders/{driver_order_id}/items"),
            None,
        ))
        .await
        .unwrap();
    let items = body_json(res).await;
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);

    let res = app
        .clone()
        .oneshot(driver_request(
            driver,
            "POST",
            &format!("/driver/orders/{driver_order_id}/confirm-items"),
            Some(json!({
                "items": [
                    { "item_id": items[0]["id"], "status": "Rejected", "confirmed_amount": 0.0 },
                    { "item_id": items[1]["id"], "status": "Confirmed", "confirmed_amount": 2.0 }
                ]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let confirmed = body_json(res).await;
    assert_eq!(confirmed["order"]["is_customer_confirmed"], true);
    assert_eq!(confirmed["items"][0]["status"], "Rejected");
    assert_eq!(confirmed["items"][0]["customer_confirmed_amount"], 0.0);

    let res = app
        .clone()
        .oneshot(driver_request(
            driver,
            "POST",
            &format!("/driver/orders/{driver_order_id}/confirm-driver"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let delivered = body_json(res).await;
    assert_eq!(delivered["outcome"], "delivered");
    assert_eq!(delivered["order"]["status"], "Delivered");
    assert_eq!(delivered["order"]["is_driver_confirmed"], true);
    assert_eq!(warehouse_status(&app, &warehouse_id).await, "Delivered");

    let res = app
        .clone()
        .oneshot(driver_request(
            driver,
            "POST",
            &format!("/driver/orders/{driver_order_id}/skip-requests"),
            Some(json!({ "reason": "customer not home" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["kind"], "order_delivered");
    assert_eq!(warehouse_status(&app, &warehouse_id).await, "Delivered");
}

#[tokio::test]
async fn driver_confirmation_waits_on_customer() {
    let app = setup();
    let (warehouse_id, _) = ready_order(&app, "SO-121").await;
    let driver = Uuid::new_v4();
    let driver_order = assign_driver(&app, &warehouse_id, driver).await;
    let driver_order_id = driver_order["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(driver_request(
            driver,
            "PATCH",
            &format!("/driver/orders/{driver_order_id}/status"),
            Some(json!({ "status": "Dispatched" })),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(driver_request(
            driver,
            "POST",
            &format!("/driver/orders/{driver_order_id}/confirm-driver"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body = body_json(res).await;
    assert_eq!(body["outcome"], "waiting_on_customer");
    assert_eq!(body["order"]["status"], "Dispatched");
}

#[tokio::test]
async fn another_driver_cannot_touch_the_order() {
    let app = setup();
    let (warehouse_id, _) = ready_order(&app, "SO-122").await;
    let driver_order = assign_driver(&app, &warehouse_id, Uuid::new_v4()).await;
    let driver_order_id = driver_order["id"].as_str().unwrap();

    let res = app
        .oneshot(driver_request(
            Uuid::new_v4(),
            "PATCH",
            &format!("/driver/orders/{driver_order_id}/status"),
            Some(json!({ "status": "Dispatched" })),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn skip_request_accepted_returns_order_to_queue() {
    let app = setup();
    let (warehouse_id, _) = ready_order(&app, "SO-130").await;
    let driver = Uuid::new_v4();
    let driver_order = assign_driver(&app, &warehouse_id, driver).await;
    let driver_order_id = driver_order["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(driver_request(
            driver,
            "POST",
            &format!("/driver/orders/{driver_order_id}/skip-requests"),
            Some(json!({ "reason": "vehicle breakdown" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let request = body_json(res).await;
    assert_eq!(request["status"], "Pending");
    let request_id = request["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(staff_request(
            "POST",
            &format!("/skip-requests/{request_id}/resolve"),
            Some(json!({ "decision": "Accepted", "admin_reply": "reassigning" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "Accepted");

    let res = app
        .clone()
        .oneshot(staff_request(
            "GET",
            &format!("/warehouse-orders/{warehouse_id}/driver-orders"),
            None,
        ))
        .await
        .unwrap();
    let history = body_json(res).await;
    assert_eq!(history[0]["status"], "SkippedByWarehouse");
    assert_eq!(
        warehouse_status(&app, &warehouse_id).await,
        "ReadyForDriverAssignment"
    );
}

#[tokio::test]
async fn empty_skip_reason_returns_400() {
    let app = setup();
    let (warehouse_id, _) = ready_order(&app, "SO-131").await;
    let driver = Uuid::new_v4();
    let driver_order = assign_driver(&app, &warehouse_id, driver).await;
    let driver_order_id = driver_order["id"].as_str().unwrap();

    let res = app
        .oneshot(driver_request(
            driver,
            "POST",
            &format!("/driver/orders/{driver_order_id}/skip-requests"),
            Some(json!({ "reason": "" })),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reissued_code_replaces_the_first() {
    let (app, codes) = setup_with_codes();
    let (warehouse_id, _) = ready_order(&app, "SO-140").await;
    let driver = Uuid::new_v4();
    let driver_order = assign_driver(&app, &warehouse_id, driver).await;
    let driver_order_id = driver_order["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let res = app
            .clone()
            .oneshot(driver_request(
                driver,
                "POST",
                &format!("/driver/orders/{driver_order_id}/otp"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["sent_to"], "customer@example.com");
        assert!(body.get("code").is_none());
    }

    let (first, second) = {
        let codes = codes.codes.lock().unwrap();
        (codes[0].clone(), codes[1].clone())
    };

    if first != second {
        let res = app
            .clone()
            .oneshot(driver_request(
                driver,
                "POST",
                &format!("/driver/orders/{driver_order_id}/otp/validate"),
                Some(json!({ "code": first })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["kind"], "invalid_or_expired");
    }

    let res = app
        .clone()
        .oneshot(driver_request(
            driver,
            "POST",
            &format!("/driver/orders/{driver_order_id}/otp/validate"),
            Some(json!({ "code": second })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["is_otp_confirmed"], true);

    let res = app
        .oneshot(driver_request(
            driver,
            "POST",
            &format!("/driver/orders/{driver_order_id}/otp"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn driver_sees_only_open_orders_by_default() {
    let app = setup();
    let driver = Uuid::new_v4();
    let (first, _) = ready_order(&app, "SO-150").await;
    let (second, _) = ready_order(&app, "SO-151").await;
    assign_driver(&app, &first, driver).await;
    assign_driver(&app, &second, driver).await;

    app.clone()
        .oneshot(staff_request(
            "DELETE",
            &format!("/warehouse-orders/{first}/assignment"),
            None,
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(driver_request(driver, "GET", "/driver/orders", None))
        .await
        .unwrap();
    let open = body_json(res).await;
    assert_eq!(open.as_array().unwrap().len(), 1);
    assert_eq!(open[0]["warehouse_order_id"], second);

    let res = app
        .oneshot(driver_request(
            driver,
            "GET",
            "/driver/orders?include_closed=true",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 2);
}
