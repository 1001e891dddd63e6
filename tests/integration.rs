use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pump_dispatch::api::rest::router;
use pump_dispatch::engine::notify::EmailMessage;
use pump_dispatch::state::AppState;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

const ADMIN_PIN: &str = "9999";

fn setup() -> (axum::Router, mpsc::Receiver<EmailMessage>) {
    let (state, rx) = AppState::new(1024, 64, Some(ADMIN_PIN.to_string()));
    (router(Arc::new(state)), rx)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
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

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

fn signature() -> Value {
    json!({
        "url": "https://files.example.com/signatures/sig.png",
        "sha256": "a".repeat(64)
    })
}

struct Fixture {
    pharmacy_id: String,
    pharmacy_pin: String,
    employee_id: String,
    customer_id: String,
}

async fn register_pharmacy(app: &axum::Router, name: &str) -> (String, String) {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/pharmacies",
            json!({
                "name": name,
                "license_code": "LIC-100",
                "email": "ops@pharmacy.example.com",
                "country": "Mexico",
                "state": "Jalisco",
                "city": "Guadalajara",
                "address": "Av. Juarez 100"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (
        body["pharmacy"]["id"].as_str().unwrap().to_string(),
        body["pin"].as_str().unwrap().to_string(),
    )
}

async fn fixture(app: &axum::Router) -> Fixture {
    let (pharmacy_id, pharmacy_pin) = register_pharmacy(app, "Central").await;

    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/employees",
            json!({
                "full_name": "Ana Ruiz",
                "job_title": "Pharmacist",
                "pharmacy_pin": pharmacy_pin
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let employee_id = body["employee"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        json_request(
            "POST",
            &format!("/pharmacies/{pharmacy_id}/customers"),
            json!({
                "employee_id": employee_id,
                "name": "Hospital Norte",
                "email": "Care@Hospital.Example.com",
                "country": "Mexico",
                "state": "Jalisco",
                "city": "Zapopan",
                "address": "Calle 5"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let customer_id = body["id"].as_str().unwrap().to_string();

    Fixture {
        pharmacy_id,
        pharmacy_pin,
        employee_id,
        customer_id,
    }
}

async fn register_pump(app: &axum::Router, fx: &Fixture, number: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            &format!("/pharmacies/{}/pumps", fx.pharmacy_id),
            json!({ "employee_id": fx.employee_id, "pump_number": number, "brand": "baxter" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

async fn create_order(app: &axum::Router, fx: &Fixture, pump_ids: &[&str]) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/orders",
            json!({
                "employee_id": fx.employee_id,
                "customer_id": fx.customer_id,
                "pump_ids": pump_ids
            }),
        ),
    )
    .await
}

async fn connected_driver(app: &axum::Router, fx: &Fixture) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/drivers",
            json!({
                "full_name": "Luis Gomez",
                "country": "Mexico",
                "state": "Jalisco",
                "city": "Guadalajara",
                "plate_number": "JAL-123"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let driver_id = body["driver"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        json_request(
            "POST",
            &format!("/drivers/{driver_id}/pharmacies"),
            json!({ "pin": fx.pharmacy_pin }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "connected");

    driver_id
}

async fn drive_to_delivery(
    app: &axum::Router,
    order_id: &str,
    driver_id: &str,
    previous_pumps: Value,
) -> Value {
    for step in ["accept", "depart"] {
        let (status, _) = send(
            app,
            json_request(
                "POST",
                &format!("/orders/{order_id}/{step}"),
                json!({ "driver_id": driver_id }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "step {step}");
    }

    let (status, _) = send(
        app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/pickup"),
            json!({
                "driver_id": driver_id,
                "employee_signature": signature(),
                "driver_signature": signature()
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/deliver"),
            json!({
                "driver_id": driver_id,
                "customer_signature": signature(),
                "driver_signature": signature(),
                "location": { "lat": 20.67, "lng": -103.35 },
                "ip": "10.0.0.8",
                "legal_pdf_url": "https://files.example.com/legal/order.pdf",
                "previous_pumps": previous_pumps
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn pump_status(app: &axum::Router, fx: &Fixture, pump_number: &str) -> String {
    let (_, body) = send(
        app,
        get_request(&format!("/pharmacies/{}/pumps", fx.pharmacy_id)),
    )
    .await;
    body.as_array()
        .unwrap()
        .iter()
        .find(|pump| pump["pump_number"] == pump_number)
        .unwrap()["status"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _rx) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pharmacies"], 0);
    assert_eq!(body["pumps"], 0);
    assert_eq!(body["orders"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _rx) = setup();
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
    assert!(body.contains("orders_created_total"));
}

#[tokio::test]
async fn login_resolves_roles_and_rejects_unknown_pin() {
    let (app, _rx) = setup();

    let (status, body) = send(&app, json_request("POST", "/auth/login", json!({ "pin": "0000" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "INVALID PIN");

    let (status, body) = send(&app, json_request("POST", "/auth/login", json!({ "pin": ADMIN_PIN }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "ADMIN");

    let fx = fixture(&app).await;
    let (status, body) = send(
        &app,
        json_request("POST", "/auth/login", json!({ "pin": fx.pharmacy_pin })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "PHARMACY");
    assert_eq!(body["pharmacy_id"], fx.pharmacy_id.as_str());
}

#[tokio::test]
async fn employee_registration_with_wrong_pharmacy_pin_is_rejected() {
    let (app, _rx) = setup();
    register_pharmacy(&app, "Central").await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/employees",
            json!({
                "full_name": "Ana Ruiz",
                "job_title": "Pharmacist",
                "pharmacy_pin": "0000"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pump_numbers_are_normalized_and_unique_per_pharmacy() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    register_pump(&app, &fx, " bx-100 ").await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/pharmacies/{}/pumps", fx.pharmacy_id),
            json!({ "employee_id": fx.employee_id, "pump_number": "BX-100" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(pump_status(&app, &fx, "BX-100").await, "AVAILABLE");
}

#[tokio::test]
async fn create_order_assigns_pumps() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;

    let (status, body) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "PENDING");
    assert_eq!(body["order"]["pump_numbers"][0], "BX-100");
    assert_eq!(body["pump_update_failures"].as_array().unwrap().len(), 0);
    assert_eq!(pump_status(&app, &fx, "BX-100").await, "ASSIGNED");

    let (_, movements) = send(&app, get_request(&format!("/pumps/{pump_id}/movements"))).await;
    assert_eq!(movements[0]["action"], "ASSIGNED");
    assert_eq!(movements[0]["role"], "EMPLOYEE");
}

#[tokio::test]
async fn double_booking_a_pump_returns_409() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;

    let (status, _) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["unavailable_pumps"][0], "BX-100");
}

#[tokio::test]
async fn concurrent_orders_for_the_same_pump_book_it_once() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;

    let ids = [pump_id.as_str()];
    let (first, second) = tokio::join!(
        create_order(&app, &fx, &ids),
        create_order(&app, &fx, &ids)
    );
    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let (_, orders) = send(&app, get_request(&format!("/pharmacies/{}/orders", fx.pharmacy_id))).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn selectable_listing_hides_booked_pumps() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let booked = register_pump(&app, &fx, "BX-100").await;
    register_pump(&app, &fx, "BX-200").await;
    create_order(&app, &fx, &[booked.as_str()]).await;

    let (_, body) = send(
        &app,
        get_request(&format!("/pharmacies/{}/pumps?selectable=true", fx.pharmacy_id)),
    )
    .await;
    let numbers: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|pump| pump["pump_number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["BX-200"]);
}

#[tokio::test]
async fn scanner_resolves_urls_and_reports_unknown_codes() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    register_pump(&app, &fx, "BX-100").await;
    register_pump(&app, &fx, "BX-200").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/pharmacies/{}/pumps/scan", fx.pharmacy_id),
            json!({ "input": "https://tags.example.com/p?pump=bx-200\nZZ-999" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"][0]["pump_number"], "BX-200");
    assert_eq!(body["not_found"][0], "ZZ-999");
}

#[tokio::test]
async fn full_delivery_flow_moves_pumps_and_records_audit() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;
    let driver_id = connected_driver(&app, &fx).await;

    let (_, created) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();

    let (_, driver_orders) = send(&app, get_request(&format!("/drivers/{driver_id}/orders"))).await;
    assert_eq!(driver_orders["available"][0]["id"], order_id.as_str());

    let delivered = drive_to_delivery(&app, &order_id, &driver_id, json!([])).await;
    assert_eq!(delivered["order"]["status"], "DELIVERED");
    assert_eq!(delivered["order"]["delivery"]["delivered_from_ip"], "10.0.0.8");
    assert_eq!(pump_status(&app, &fx, "BX-100").await, "DELIVERED");

    let (status, pickup) = send(&app, get_request(&format!("/orders/{order_id}/pickup"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pickup["driver_id"], driver_id.as_str());

    let (_, movements) = send(&app, get_request(&format!("/pumps/{pump_id}/movements"))).await;
    let actions: Vec<&str> = movements
        .as_array()
        .unwrap()
        .iter()
        .map(|movement| movement["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["ASSIGNED", "PICKED_UP", "DELIVERED"]);

    let (_, backups) = send(&app, get_request(&format!("/pharmacies/{}/deliveries", fx.pharmacy_id))).await;
    assert_eq!(backups.as_array().unwrap().len(), 1);

    let (status, shared) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/share-pdf"),
            json!({ "to": "legal@hospital.example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shared["queued"], true);
}

#[tokio::test]
async fn skipping_a_lifecycle_step_returns_409() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;
    let driver_id = connected_driver(&app, &fx).await;

    let (_, created) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();

    send(
        &app,
        json_request("POST", &format!("/orders/{order_id}/accept"), json!({ "driver_id": driver_id })),
    )
    .await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/deliver"),
            json!({
                "driver_id": driver_id,
                "customer_signature": signature(),
                "driver_signature": signature(),
                "location": { "lat": 20.67, "lng": -103.35 }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "order cannot move from ASSIGNED to DELIVERED");
}

#[tokio::test]
async fn accepting_a_taken_order_returns_409() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;
    let first = connected_driver(&app, &fx).await;
    let second = connected_driver(&app, &fx).await;

    let (_, created) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/orders/{order_id}/accept"), json!({ "driver_id": first })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/orders/{order_id}/accept"), json!({ "driver_id": second })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancelling_an_order_releases_its_pumps() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;

    let (_, created) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/cancel"),
            json!({ "actor_id": fx.employee_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "CANCELLED");
    assert_eq!(pump_status(&app, &fx, "BX-100").await, "AVAILABLE");

    let (status, _) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn returned_pump_goes_through_maintenance_back_to_stock() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let first_pump = register_pump(&app, &fx, "BX-100").await;
    let second_pump = register_pump(&app, &fx, "BX-200").await;
    let driver_id = connected_driver(&app, &fx).await;

    let (_, first) = create_order(&app, &fx, &[first_pump.as_str()]).await;
    let first_id = first["order"]["id"].as_str().unwrap().to_string();
    drive_to_delivery(&app, &first_id, &driver_id, json!([])).await;

    let (_, second) = create_order(&app, &fx, &[second_pump.as_str()]).await;
    assert_eq!(second["order"]["customer_previous_pumps"][0], "BX-100");
    let second_id = second["order"]["id"].as_str().unwrap().to_string();
    drive_to_delivery(
        &app,
        &second_id,
        &driver_id,
        json!([{ "pump_number": "bx-100", "returned": true }]),
    )
    .await;

    let (_, returns) = send(
        &app,
        get_request(&format!("/pharmacies/{}/returns?filter=pending", fx.pharmacy_id)),
    )
    .await;
    assert_eq!(returns["orders"][0]["id"], second_id.as_str());

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{second_id}/returns"),
            json!({ "employee_id": fx.employee_id, "pump_number": "BX-100" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pump_status(&app, &fx, "BX-100").await, "IN_MAINTENANCE");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{second_id}/returns"),
            json!({ "employee_id": fx.employee_id, "pump_number": "BX-100" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["order"]["previous_pumps_return_to_pharmacy"]
            .as_array()
            .unwrap()
            .len(),
        1
    );

    let (_, due) = send(&app, get_request(&format!("/pharmacies/{}/maintenance", fx.pharmacy_id))).await;
    assert_eq!(due[0]["pump_number"], "BX-100");

    let (status, _) = create_order(&app, &fx, &[first_pump.as_str()]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/pumps/{first_pump}/maintenance"),
            json!({ "cleaned": true, "calibrated": true, "inspected": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "AVAILABLE");
    assert_eq!(body["maintenance_due"], false);

    let (_, returns) = send(
        &app,
        get_request(&format!("/pharmacies/{}/returns?filter=returned", fx.pharmacy_id)),
    )
    .await;
    assert_eq!(returns["counts"]["returned"], 1);
}

#[tokio::test]
async fn delivery_requires_reason_for_unreturned_pumps() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;
    let driver_id = connected_driver(&app, &fx).await;

    let (_, created) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();
    for step in ["accept", "depart"] {
        send(
            &app,
            json_request("POST", &format!("/orders/{order_id}/{step}"), json!({ "driver_id": driver_id })),
        )
        .await;
    }
    send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/pickup"),
            json!({
                "driver_id": driver_id,
                "employee_signature": signature(),
                "driver_signature": signature()
            }),
        ),
    )
    .await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/deliver"),
            json!({
                "driver_id": driver_id,
                "customer_signature": signature(),
                "driver_signature": signature(),
                "location": { "lat": 20.67, "lng": -103.35 },
                "previous_pumps": [{ "pump_number": "BX-050", "returned": false }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pump_on_active_order_cannot_be_deleted() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;
    create_order(&app, &fx, &[pump_id.as_str()]).await;

    let response = app
        .clone()
        .oneshot(delete_request(&format!(
            "/pumps/{pump_id}?employee_id={}",
            fx.employee_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reconcile_dry_run_reports_without_writing() {
    let (state, _rx) = AppState::new(1024, 64, None);
    let shared = Arc::new(state);
    let app = router(shared.clone());
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;

    {
        let id: uuid::Uuid = pump_id.parse().unwrap();
        let mut pump = shared.pumps.get_mut(&id).unwrap();
        pump.status = pump_dispatch::models::pump::PumpStatus::InMaintenance;
        pump.maintenance.cleaned = true;
        pump.maintenance.calibrated = true;
        pump.maintenance.inspected = true;
    }

    let (status, report) = send(
        &app,
        json_request("POST", "/maintenance/reconcile", json!({ "dry_run": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["updated"], 1);
    assert_eq!(pump_status(&app, &fx, "BX-100").await, "IN_MAINTENANCE");

    let (_, report) = send(
        &app,
        json_request("POST", "/maintenance/reconcile", json!({ "dry_run": false })),
    )
    .await;
    assert_eq!(report["updated"], 1);
    assert_eq!(pump_status(&app, &fx, "BX-100").await, "AVAILABLE");
}

#[tokio::test]
async fn order_creation_publishes_status_event() {
    let (state, _rx) = AppState::new(1024, 64, None);
    let shared = Arc::new(state);
    let mut events = shared.events_tx.subscribe();
    let app = router(shared.clone());
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;

    create_order(&app, &fx, &[pump_id.as_str()]).await;

    let event = events.try_recv().unwrap();
    let event = serde_json::to_value(&event).unwrap();
    assert_eq!(event["type"], "order_status");
    assert_eq!(event["status"], "PENDING");
}

#[tokio::test]
async fn cancelled_pumps_are_not_pending_return() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let cancelled_pump = register_pump(&app, &fx, "BX-100").await;
    let next_pump = register_pump(&app, &fx, "BX-200").await;

    let (_, first) = create_order(&app, &fx, &[cancelled_pump.as_str()]).await;
    let first_id = first["order"]["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{first_id}/cancel"),
            json!({ "actor_id": fx.employee_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, second) = create_order(&app, &fx, &[next_pump.as_str()]).await;
    assert_eq!(
        second["order"]["customer_previous_pumps"].as_array().unwrap().len(),
        0
    );
    let second_id = second["order"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{second_id}/returns"),
            json!({ "employee_id": fx.employee_id, "pump_number": "BX-100" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(pump_status(&app, &fx, "BX-100").await, "AVAILABLE");
}

#[tokio::test]
async fn in_stock_pump_reported_by_driver_cannot_be_returned() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let delivered_pump = register_pump(&app, &fx, "BX-100").await;
    register_pump(&app, &fx, "BX-300").await;
    let driver_id = connected_driver(&app, &fx).await;

    let (_, created) = create_order(&app, &fx, &[delivered_pump.as_str()]).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();
    drive_to_delivery(
        &app,
        &order_id,
        &driver_id,
        json!([{ "pump_number": "BX-300", "returned": true }]),
    )
    .await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/returns"),
            json!({ "employee_id": fx.employee_id, "pump_number": "BX-300" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(pump_status(&app, &fx, "BX-300").await, "AVAILABLE");
}

#[tokio::test]
async fn returning_an_unregistered_pump_reports_update_failure() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;
    let driver_id = connected_driver(&app, &fx).await;

    let (_, created) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();
    drive_to_delivery(
        &app,
        &order_id,
        &driver_id,
        json!([{ "pump_number": "BX-050", "returned": true }]),
    )
    .await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/returns"),
            json!({ "employee_id": fx.employee_id, "pump_number": "bx-050" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pump_update_failures"][0], "BX-050");
    assert_eq!(
        body["order"]["previous_pumps_return_to_pharmacy"][0]["returned_to_pharmacy"],
        true
    );
}

#[tokio::test]
async fn order_and_delivery_emails_are_queued() {
    let (app, mut rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;
    let driver_id = connected_driver(&app, &fx).await;

    let (_, created) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();

    let created_notice = rx.try_recv().unwrap();
    assert_eq!(created_notice.to, "ops@pharmacy.example.com");
    assert!(created_notice.html.contains("BX-100"));

    drive_to_delivery(&app, &order_id, &driver_id, json!([])).await;

    let confirmation = rx.try_recv().unwrap();
    assert_eq!(confirmation.to, "care@hospital.example.com");
    assert!(confirmation.subject.starts_with("Delivery confirmed"));
    assert!(confirmation.html.contains("https://files.example.com/legal/order.pdf"));

    send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/share-pdf"),
            json!({ "to": "legal@hospital.example.com" }),
        ),
    )
    .await;

    let shared = rx.try_recv().unwrap();
    assert_eq!(shared.to, "legal@hospital.example.com");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn tracking_lists_each_driver_once_with_latest_order() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let first_pump = register_pump(&app, &fx, "BX-100").await;
    let second_pump = register_pump(&app, &fx, "BX-200").await;
    let driver_id = connected_driver(&app, &fx).await;

    let (_, first) = create_order(&app, &fx, &[first_pump.as_str()]).await;
    let first_id = first["order"]["id"].as_str().unwrap().to_string();
    let (_, second) = create_order(&app, &fx, &[second_pump.as_str()]).await;
    let second_id = second["order"]["id"].as_str().unwrap().to_string();

    for order_id in [&first_id, &second_id] {
        let (status, _) = send(
            &app,
            json_request(
                "POST",
                &format!("/orders/{order_id}/accept"),
                json!({ "driver_id": driver_id }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{second_id}/depart"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;

    let (status, _) = send(
        &app,
        Request::builder()
            .method("PATCH")
            .uri(format!("/drivers/{driver_id}/location"))
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "location": { "lat": 20.7, "lng": -103.4 } }).to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, tracking) = send(
        &app,
        get_request(&format!("/pharmacies/{}/tracking", fx.pharmacy_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = tracking.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["driver_id"], driver_id.as_str());
    assert_eq!(entries[0]["order_id"], second_id.as_str());
    assert_eq!(entries[0]["status"], "ON_WAY_TO_PHARMACY");
    assert_eq!(entries[0]["location"]["lat"], 20.7);
}

#[tokio::test]
async fn connecting_twice_reports_already_connected() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let driver_id = connected_driver(&app, &fx).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/drivers/{driver_id}/pharmacies"),
            json!({ "pin": fx.pharmacy_pin }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_connected");
    assert_eq!(body["pharmacy_id"], fx.pharmacy_id.as_str());

    let (_, pharmacies) = send(&app, get_request(&format!("/drivers/{driver_id}/pharmacies"))).await;
    assert_eq!(pharmacies.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn return_reminder_is_set_copied_to_orders_and_cleared() {
    let (app, _rx) = setup();
    let fx = fixture(&app).await;
    let pump_id = register_pump(&app, &fx, "BX-100").await;

    let (status, customer) = send(
        &app,
        json_request(
            "PUT",
            &format!("/customers/{}/reminder", fx.customer_id),
            json!({ "employee_id": fx.employee_id, "note": " bring back bx-050 " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customer["return_reminder_note"], "BRING BACK BX-050");
    assert_eq!(customer["return_reminder_by"], "ANA RUIZ");

    let (_, created) = create_order(&app, &fx, &[pump_id.as_str()]).await;
    assert_eq!(created["order"]["return_reminder_note"], "BRING BACK BX-050");

    let response = app
        .clone()
        .oneshot(delete_request(&format!(
            "/customers/{}/reminder?employee_id={}",
            fx.customer_id, fx.employee_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let customer = body_json(response).await;
    assert_eq!(customer["return_reminder_note"], "");
}
