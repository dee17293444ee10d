use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use retrato_core::{GenerationId, OrderId};
use retrato_model::{Generation, GenerationStatus, OrderStatus, PixStatus, PortraitStyle};
use retrato_store::{Bucket, Db, MediaStore};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::clients::{Mailer, PixGateway};
use crate::fakes::{FakeMailer, FakePixGateway, FakePortraitEngine};
use crate::{build_router, ApiConfig, AppState};

struct TestApp {
    state: AppState,
    router: Router,
    engine: Arc<FakePortraitEngine>,
    gateway: Arc<FakePixGateway>,
    mailer: Arc<FakeMailer>,
    _media_dir: TempDir,
}

fn sample_jpeg() -> Vec<u8> {
    let img = RgbImage::from_pixel(96, 120, Rgb([90, 70, 50]));
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, 90);
    encoder
        .encode(img.as_raw(), 96, 120, image::ExtendedColorType::Rgb8)
        .expect("encode fixture");
    out
}

fn test_config() -> ApiConfig {
    ApiConfig {
        public_base_url: "http://testserver".to_string(),
        admin_key: "adm-test-key".to_string(),
        signing_secret: "0123456789abcdef0123456789abcdef".to_string(),
        webhook_secret: Some("whsec-test".to_string()),
        ..ApiConfig::default()
    }
}

fn mk_app_with(config: ApiConfig, engine: FakePortraitEngine) -> TestApp {
    let db = Arc::new(Db::open_in_memory().expect("open db"));
    let media_dir = tempfile::tempdir().expect("tempdir");
    let media = Arc::new(MediaStore::new(media_dir.path().to_path_buf()));
    let engine = Arc::new(engine);
    let gateway = Arc::new(FakePixGateway::default());
    let mailer = Arc::new(FakeMailer::default());
    let state = AppState::new(
        db,
        media,
        engine.clone(),
        gateway.clone(),
        mailer.clone(),
        config,
    );
    let router = build_router(state.clone());
    TestApp {
        state,
        router,
        engine,
        gateway,
        mailer,
        _media_dir: media_dir,
    }
}

fn mk_app() -> TestApp {
    mk_app_with(test_config(), FakePortraitEngine::returning(sample_jpeg()))
}

async fn request(app: &TestApp, req: Request<Body>) -> axum::response::Response {
    app.router.clone().oneshot(req).await.expect("infallible")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn multipart_request(image: &[u8], mime: &str, style: Option<&str>) -> Request<Body> {
    let boundary = "retrato-test-boundary";
    let mut body: Vec<u8> = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; \
             filename=\"pet.jpg\"\r\nContent-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(b"\r\n");
    if let Some(style) = style {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"style\"\r\n\r\n{style}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri("/v1/generate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn seed_completed_generation(app: &TestApp) -> GenerationId {
    let id = GenerationId::generate();
    let clean_key = format!("{id}/clean.jpg");
    let preview_key = format!("{id}/preview.jpg");
    app.state
        .media
        .put(Bucket::Generated, &clean_key, &sample_jpeg())
        .expect("seed clean media");
    app.state
        .media
        .put(Bucket::Watermarked, &preview_key, b"preview-bytes")
        .expect("seed preview media");
    app.state
        .db
        .insert_generation(&Generation {
            id,
            style: PortraitStyle::Renaissance,
            status: GenerationStatus::Completed,
            original_path: format!("{id}/original.jpg"),
            generated_path: Some(clean_key),
            watermarked_path: Some(preview_key),
            created_at: Utc::now(),
        })
        .expect("seed generation");
    id
}

fn customer_json(email: &str) -> Value {
    json!({
        "name": "Ana Paula Souza",
        "email": email,
        "cellphone": "11999990000",
        "tax_id": "390.533.447-05",
    })
}

fn shipping_json() -> Value {
    json!({
        "street": "Av. Paulista",
        "number": "1000",
        "neighborhood": "Bela Vista",
        "city": "Sao Paulo",
        "state": "SP",
        "zip": "01310-100",
    })
}

fn digital_checkout_body(generation: GenerationId, email: &str) -> Value {
    json!({
        "product": "digital",
        "generation_id": generation.to_string(),
        "customer": customer_json(email),
    })
}

fn canvas_checkout_body(generation: GenerationId, email: &str) -> Value {
    json!({
        "product": "canvas",
        "generation_id": generation.to_string(),
        "size": "40x60cm",
        "customer": customer_json(email),
        "shipping_address": shipping_json(),
    })
}

async fn place_order(app: &TestApp, body: &Value) -> (OrderId, String) {
    let response = request(app, post_json("/v1/checkout", body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    let order_id = OrderId::parse(payload["order_id"].as_str().expect("order_id"))
        .expect("order id parses");
    let pix_id = payload["pix_id"].as_str().expect("pix_id").to_string();
    (order_id, pix_id)
}

async fn poll_status(app: &TestApp, pix_id: &str, order_id: OrderId) -> Value {
    let response = request(
        app,
        get(&format!(
            "/v1/checkout/status?pix_id={pix_id}&order_id={order_id}"
        )),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn healthz_answers_with_request_id() {
    let app = mk_app();
    let response = request(&app, get("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn inbound_request_ids_are_propagated() {
    let app = mk_app();
    let req = Request::builder()
        .uri("/healthz")
        .header("x-request-id", "req-from-client")
        .body(Body::empty())
        .expect("request");
    let response = request(&app, req).await;
    assert_eq!(
        response.headers().get("x-request-id").expect("header"),
        "req-from-client"
    );
}

#[tokio::test]
async fn generate_stores_preview_and_completes_the_record() {
    let app = mk_app();
    let response = request(
        &app,
        multipart_request(&sample_jpeg(), "image/jpeg", Some("baroque")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;

    let id = GenerationId::parse(payload["generation_id"].as_str().expect("generation_id"))
        .expect("generation id parses");
    let preview_url = payload["preview_url"].as_str().expect("preview_url");
    assert_eq!(preview_url, &format!("http://testserver/v1/preview/{id}"));

    let generation = app
        .state
        .db
        .generation(id)
        .expect("read generation")
        .expect("generation exists");
    assert_eq!(generation.status, GenerationStatus::Completed);
    assert_eq!(generation.style, PortraitStyle::Baroque);
    assert_eq!(
        generation.generated_path.as_deref(),
        Some(format!("{id}/clean.jpg").as_str())
    );
    assert_eq!(app.engine.render_calls.load(Ordering::Relaxed), 1);

    let preview = request(&app, get(&format!("/v1/preview/{id}"))).await;
    assert_eq!(preview.status(), StatusCode::OK);
    assert_eq!(
        preview.headers().get("content-type").expect("content type"),
        "image/jpeg"
    );
    let bytes = to_bytes(preview.into_body(), usize::MAX).await.expect("body");
    assert_eq!(
        image::guess_format(&bytes).expect("format"),
        image::ImageFormat::Jpeg
    );
}

#[tokio::test]
async fn preview_supports_conditional_requests() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);

    let response = request(&app, get(&format!("/v1/preview/{generation}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response
        .headers()
        .get("etag")
        .expect("etag")
        .to_str()
        .expect("ascii")
        .to_string();

    let req = Request::builder()
        .uri(format!("/v1/preview/{generation}"))
        .header("if-none-match", &etag)
        .body(Body::empty())
        .expect("request");
    let response = request(&app, req).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    let missing = request(
        &app,
        get(&format!("/v1/preview/{}", GenerationId::generate())),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generate_rejects_unsupported_formats_without_calling_the_engine() {
    let app = mk_app();
    let response = request(&app, multipart_request(b"GIF89a", "image/gif", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.engine.render_calls.load(Ordering::Relaxed), 0);

    let missing = request(
        &app,
        Request::builder()
            .method("POST")
            .uri("/v1/generate")
            .header(
                header::CONTENT_TYPE,
                "multipart/form-data; boundary=retrato-test-boundary",
            )
            .body(Body::from("--retrato-test-boundary--\r\n"))
            .expect("request"),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_engine_failure_is_bad_gateway() {
    let app = mk_app_with(test_config(), FakePortraitEngine::failing());
    let response = request(&app, multipart_request(&sample_jpeg(), "image/jpeg", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = json_body(response).await;
    assert_eq!(payload["error"]["code"], "upstream_failed");
}

#[tokio::test]
async fn checkout_validates_payloads() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);

    let mut bad_product = digital_checkout_body(generation, "a@example.com");
    bad_product["product"] = json!("poster");
    let response = request(&app, post_json("/v1/checkout", &bad_product)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut missing_shipping = canvas_checkout_body(generation, "a@example.com");
    missing_shipping
        .as_object_mut()
        .expect("object")
        .remove("shipping_address");
    let response = request(&app, post_json("/v1/checkout", &missing_shipping)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut bad_size = canvas_checkout_body(generation, "a@example.com");
    bad_size["size"] = json!("21x30cm");
    let response = request(&app, post_json("/v1/checkout", &bad_size)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut sized_digital = digital_checkout_body(generation, "a@example.com");
    sized_digital["size"] = json!("30x40cm");
    let response = request(&app, post_json("/v1/checkout", &sized_digital)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let unknown = digital_checkout_body(GenerationId::generate(), "a@example.com");
    let response = request(&app, post_json("/v1/checkout", &unknown)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(app.gateway.create_calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn checkout_requires_a_completed_generation() {
    let app = mk_app();
    let id = GenerationId::generate();
    app.state
        .db
        .insert_generation(&Generation {
            id,
            style: PortraitStyle::Renaissance,
            status: GenerationStatus::Generating,
            original_path: format!("{id}/original.jpg"),
            generated_path: None,
            watermarked_path: None,
            created_at: Utc::now(),
        })
        .expect("seed generation");

    let response = request(
        &app,
        post_json("/v1/checkout", &digital_checkout_body(id, "a@example.com")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checkout_creates_a_pending_order_with_charge_data() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);

    let response = request(
        &app,
        post_json(
            "/v1/checkout",
            &digital_checkout_body(generation, "ana@example.com"),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert!(payload["br_code"].as_str().expect("br_code").starts_with("0002"));
    assert!(payload["br_code_base64"]
        .as_str()
        .expect("br_code_base64")
        .starts_with("data:image/png;base64,"));
    assert_eq!(payload["amount_cents"], 2900);

    let order_id =
        OrderId::parse(payload["order_id"].as_str().expect("order_id")).expect("parses");
    let order = app
        .state
        .db
        .order(order_id)
        .expect("read order")
        .expect("order exists");
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.charge_id, payload["pix_id"].as_str().expect("pix_id"));
    assert_eq!(order.price_cents, 2900);

    let customer = app
        .state
        .db
        .customer_by_email("ana@example.com")
        .expect("read customer")
        .expect("customer exists");
    assert_eq!(customer.gateway_customer_id.as_deref(), Some("cust_fake"));

    let charge = app.gateway.last_charge.lock().await.clone().expect("charge sent");
    assert_eq!(charge.amount_cents, 2900);
    assert_eq!(charge.customer.tax_id, "390.533.447-05");
}

#[tokio::test]
async fn checkout_reuses_the_customer_row_for_a_known_email() {
    let app = mk_app();
    let first_generation = seed_completed_generation(&app);
    let second_generation = seed_completed_generation(&app);

    let (first_order, _) =
        place_order(&app, &digital_checkout_body(first_generation, "ana@example.com")).await;
    let (second_order, _) =
        place_order(&app, &canvas_checkout_body(second_generation, "ana@example.com")).await;

    let first = app.state.db.order(first_order).expect("read").expect("exists");
    let second = app.state.db.order(second_order).expect("read").expect("exists");
    assert_eq!(first.customer_id, second.customer_id);
}

#[tokio::test]
async fn checkout_gateway_failure_is_bad_gateway() {
    let mut app = mk_app();
    let generation = seed_completed_generation(&app);
    let failing_gateway: Arc<dyn PixGateway> = Arc::new(FakePixGateway {
        fail_create: true,
        ..FakePixGateway::default()
    });
    app.state.gateway = failing_gateway;
    app.router = build_router(app.state.clone());

    let response = request(
        &app,
        post_json(
            "/v1/checkout",
            &digital_checkout_body(generation, "ana@example.com"),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn status_poll_requires_both_identifiers() {
    let app = mk_app();
    let response = request(&app, get("/v1/checkout/status?pix_id=abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_status_passes_through_without_fulfillment() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;

    let payload = poll_status(&app, &pix_id, order_id).await;
    assert_eq!(payload["status"], "PENDING");

    let order = app.state.db.order(order_id).expect("read").expect("exists");
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert!(app.mailer.sent.lock().await.is_empty());
}

#[tokio::test]
async fn paid_digital_order_is_delivered_with_a_download_email_exactly_once() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;

    *app.gateway.status.lock().await = PixStatus::Paid;
    let payload = poll_status(&app, &pix_id, order_id).await;
    assert_eq!(payload["status"], "PAID");

    let order = app.state.db.order(order_id).expect("read").expect("exists");
    assert_eq!(order.status, OrderStatus::Delivered);
    assert!(order.paid_at.is_some());
    assert!(order
        .notes
        .as_deref()
        .expect("notes recorded")
        .contains("/v1/download?order="));

    {
        let sent = app.mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");
        assert!(sent[0].html.contains("/v1/download?order="));
    }

    // Poll again: the pending_payment guard makes fulfillment a no-op.
    poll_status(&app, &pix_id, order_id).await;
    assert_eq!(app.mailer.sent.lock().await.len(), 1);
}

#[tokio::test]
async fn paid_physical_order_moves_to_processing_with_a_confirmation_email() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &canvas_checkout_body(generation, "bruno@example.com")).await;

    *app.gateway.status.lock().await = PixStatus::Paid;
    poll_status(&app, &pix_id, order_id).await;

    let order = app.state.db.order(order_id).expect("read").expect("exists");
    assert_eq!(order.status, OrderStatus::Processing);
    assert!(order.paid_at.is_some());

    let sent = app.mailer.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("Quadro Canvas"));
    assert!(sent[0].html.contains("R$ 199,00"));
}

#[tokio::test]
async fn a_failed_email_never_blocks_fulfillment() {
    let mut app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;

    let failing_mailer: Arc<dyn Mailer> = Arc::new(FakeMailer::failing());
    app.state.mailer = failing_mailer;
    app.router = build_router(app.state.clone());

    *app.gateway.status.lock().await = PixStatus::Paid;
    let payload = poll_status(&app, &pix_id, order_id).await;
    assert_eq!(payload["status"], "PAID");

    let order = app.state.db.order(order_id).expect("read").expect("exists");
    assert_eq!(order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn simulated_payments_are_refused_unless_enabled() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;

    let response = request(
        &app,
        get(&format!(
            "/v1/checkout/status?pix_id={pix_id}&order_id={order_id}&simulate=true"
        )),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn simulated_payments_skip_the_gateway_when_enabled() {
    let config = ApiConfig {
        allow_simulated_payments: true,
        ..test_config()
    };
    let app = mk_app_with(config, FakePortraitEngine::returning(sample_jpeg()));
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;

    let response = request(
        &app,
        get(&format!(
            "/v1/checkout/status?pix_id={pix_id}&order_id={order_id}&simulate=true"
        )),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["status"], "PAID");
    assert_eq!(app.gateway.status_calls.load(Ordering::Relaxed), 0);

    let order = app.state.db.order(order_id).expect("read").expect("exists");
    assert_eq!(order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn webhook_rejects_a_bad_secret() {
    let app = mk_app();
    let response = request(
        &app,
        post_json(
            "/v1/webhook?secret=wrong",
            &json!({ "event": "billing.paid", "data": { "id": "pix_char_1" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_fulfills_the_order_behind_the_charge() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;

    let response = request(
        &app,
        post_json(
            "/v1/webhook?secret=whsec-test",
            &json!({ "event": "billing.paid", "data": { "id": pix_id } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["received"], true);

    let order = app.state.db.order(order_id).expect("read").expect("exists");
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(app.mailer.sent.lock().await.len(), 1);
}

#[tokio::test]
async fn webhook_acks_unknown_events_and_charges() {
    let app = mk_app();

    let response = request(
        &app,
        post_json(
            "/v1/webhook?secret=whsec-test",
            &json!({ "event": "billing.created", "data": { "id": "pix_char_1" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = request(
        &app,
        post_json(
            "/v1/webhook?secret=whsec-test",
            &json!({ "event": "billing.paid", "data": { "id": "pix_char_unknown" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.mailer.sent.lock().await.is_empty());
}

#[tokio::test]
async fn admin_endpoints_require_the_key() {
    let app = mk_app();
    let response = request(&app, get("/v1/admin/orders")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/v1/admin/orders")
        .header("x-admin-key", "not-the-key")
        .body(Body::empty())
        .expect("request");
    let response = request(&app, req).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_listing_pages_and_filters() {
    let app = mk_app();
    for i in 0..3 {
        let generation = seed_completed_generation(&app);
        let (order_id, _) = place_order(
            &app,
            &digital_checkout_body(generation, &format!("buyer{i}@example.com")),
        )
        .await;
        if i == 0 {
            app.state
                .db
                .mark_order_paid(order_id, OrderStatus::Paid, Utc::now())
                .expect("pay");
        }
    }

    let req = Request::builder()
        .uri("/v1/admin/orders")
        .header("x-admin-key", "adm-test-key")
        .body(Body::empty())
        .expect("request");
    let response = request(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["total"], 3);
    assert_eq!(payload["page"], 1);
    assert_eq!(payload["total_pages"], 1);
    let orders = payload["orders"].as_array().expect("orders");
    assert_eq!(orders.len(), 3);
    assert!(orders[0]["customer"]["email"].is_string());
    assert!(orders[0]["generation"]["style"].is_string());

    let req = Request::builder()
        .uri("/v1/admin/orders?status=paid")
        .header("x-admin-key", "adm-test-key")
        .body(Body::empty())
        .expect("request");
    let payload = json_body(request(&app, req).await).await;
    assert_eq!(payload["total"], 1);

    let req = Request::builder()
        .uri("/v1/admin/orders?status=bogus")
        .header("x-admin-key", "adm-test-key")
        .body(Body::empty())
        .expect("request");
    let response = request(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_shipping_update_sends_the_tracking_email() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &canvas_checkout_body(generation, "bruno@example.com")).await;

    *app.gateway.status.lock().await = PixStatus::Paid;
    poll_status(&app, &pix_id, order_id).await;
    assert_eq!(app.mailer.sent.lock().await.len(), 1);

    let req = Request::builder()
        .method("PATCH")
        .uri("/v1/admin/orders")
        .header("x-admin-key", "adm-test-key")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "order_id": order_id.to_string(),
                "status": "shipped",
                "tracking_code": "BR123456789BR",
            })
            .to_string(),
        ))
        .expect("request");
    let response = request(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);

    let order = app.state.db.order(order_id).expect("read").expect("exists");
    assert_eq!(order.status, OrderStatus::Shipped);
    assert_eq!(order.tracking_code.as_deref(), Some("BR123456789BR"));
    assert!(order.shipped_at.is_some());

    let sent = app.mailer.sent.lock().await;
    assert_eq!(sent.len(), 2);
    assert!(sent[1].subject.contains("BR123456789BR"));
    assert_eq!(sent[1].to, "bruno@example.com");
}

#[tokio::test]
async fn admin_update_rejects_unknown_status_strings() {
    let app = mk_app();
    let req = Request::builder()
        .method("PATCH")
        .uri("/v1/admin/orders")
        .header("x-admin-key", "adm-test-key")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "order_id": OrderId::generate().to_string(), "status": "SHIPPED" })
                .to_string(),
        ))
        .expect("request");
    let response = request(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signed_download_serves_the_clean_portrait() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;
    *app.gateway.status.lock().await = PixStatus::Paid;
    poll_status(&app, &pix_id, order_id).await;

    let expires = Utc::now().timestamp() + 60;
    let url = app
        .state
        .signer
        .download_url("http://testserver", order_id, expires);
    let path = url.strip_prefix("http://testserver").expect("local path");

    let response = request(&app, get(path)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").expect("content type"),
        "image/jpeg"
    );
    let disposition = response
        .headers()
        .get("content-disposition")
        .expect("disposition")
        .to_str()
        .expect("ascii");
    assert!(disposition.contains(&format!("retrato-{order_id}.jpg")));
}

#[tokio::test]
async fn download_rejects_expired_and_tampered_tokens() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;
    *app.gateway.status.lock().await = PixStatus::Paid;
    poll_status(&app, &pix_id, order_id).await;

    let expired = Utc::now().timestamp() - 10;
    let sig = app.state.signer.sign_download(order_id, expired);
    let response = request(
        &app,
        get(&format!("/v1/download?order={order_id}&exp={expired}&sig={sig}")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let expires = Utc::now().timestamp() + 60;
    let response = request(
        &app,
        get(&format!(
            "/v1/download?order={order_id}&exp={expires}&sig=deadbeef"
        )),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn download_requires_payment() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, _) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;

    let expires = Utc::now().timestamp() + 60;
    let sig = app.state.signer.sign_download(order_id, expires);
    let response = request(
        &app,
        get(&format!("/v1/download?order={order_id}&exp={expires}&sig={sig}")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn account_view_lists_own_orders_with_download_links() {
    let app = mk_app();
    let generation = seed_completed_generation(&app);
    let (order_id, pix_id) =
        place_order(&app, &digital_checkout_body(generation, "ana@example.com")).await;
    *app.gateway.status.lock().await = PixStatus::Paid;
    poll_status(&app, &pix_id, order_id).await;

    let other_generation = seed_completed_generation(&app);
    place_order(
        &app,
        &digital_checkout_body(other_generation, "someone-else@example.com"),
    )
    .await;

    let expires = Utc::now().timestamp() + 600;
    let sig = app.state.signer.sign_account("ana@example.com", expires);
    let response = request(
        &app,
        get(&format!(
            "/v1/account/orders?email=ana@example.com&exp={expires}&sig={sig}"
        )),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    let orders = payload["orders"].as_array().expect("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["order_id"], order_id.to_string());
    assert_eq!(orders[0]["status"], "delivered");
    assert!(orders[0]["download_url"]
        .as_str()
        .expect("download url")
        .contains("/v1/download?order="));
}

#[tokio::test]
async fn account_view_rejects_bad_tokens() {
    let app = mk_app();
    let expires = Utc::now().timestamp() + 600;
    let sig = app.state.signer.sign_account("other@example.com", expires);
    let response = request(
        &app,
        get(&format!(
            "/v1/account/orders?email=ana@example.com&exp={expires}&sig={sig}"
        )),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn metrics_expose_route_counters() {
    let app = mk_app();
    request(&app, get("/healthz")).await;
    request(&app, get("/healthz")).await;
    let response = request(&app, get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(text.contains("retrato_requests_total{route=\"/healthz\",status=\"200\"} 2"));
}
