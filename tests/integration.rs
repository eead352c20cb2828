use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use storefront_orders::api::rest::router;
use storefront_orders::config::Config;
use storefront_orders::engine::lifecycle::NewOrder;
use storefront_orders::engine::transitions::TransitionPolicy;
use storefront_orders::error::AppError;
use storefront_orders::identity::IdentityProvider;
use storefront_orders::models::order::{
    LocalizedText, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ProductSnapshot,
    ShippingAddress,
};
use storefront_orders::models::user::{Identity, UserProfile};
use storefront_orders::notify::{run_notification_dispatcher, NotifyError, PushTransport};
use storefront_orders::state::AppState;
use storefront_orders::store::memory::MemoryRecordStore;
use storefront_orders::store::{RecordStore, StoreError, ORDERS, USERS};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Memory store whose writes and owner queries can be switched off.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryRecordStore,
    fail_writes: AtomicBool,
    fail_queries: AtomicBool,
}

impl FlakyStore {
    fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn create(
        &self,
        collection: &str,
        record: Value,
        id: Option<&str>,
    ) -> Result<String, StoreError> {
        self.check()?;
        self.inner.create(collection, record, id).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update(collection, id, patch).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Vec<Value>, StoreError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        self.inner.query_by_owner(collection, owner_id).await
    }
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, String, Value)>>,
}

impl RecordingTransport {
    fn titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, title, _)| title.clone())
            .collect()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(
        &self,
        token: &str,
        title: &str,
        _body: &str,
        payload: Value,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), title.to_string(), payload));
        Ok(())
    }
}

struct FailingTransport;

#[async_trait]
impl PushTransport for FailingTransport {
    async fn send(&self, _: &str, _: &str, _: &str, _: Value) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("push gateway rejected request".to_string()))
    }
}

struct PanickingTransport;

#[async_trait]
impl PushTransport for PanickingTransport {
    async fn send(&self, _: &str, _: &str, _: &str, _: Value) -> Result<(), NotifyError> {
        panic!("transport blew up");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn state_with(
    backend: Arc<dyn RecordStore>,
    transport: Arc<dyn PushTransport>,
    config: Config,
) -> Arc<AppState> {
    let state = Arc::new(AppState::new(&config, backend, transport));
    tokio::spawn(run_notification_dispatcher(
        state.dispatcher.clone(),
        state.engine.subscribe(),
    ));
    state
}

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = state_with(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(RecordingTransport::default()),
        Config::default(),
    );
    (router(state.clone()), state)
}

fn sign_in(state: &AppState, user_id: &str) -> Identity {
    let identity = Identity {
        id: user_id.to_string(),
        profile: UserProfile::default(),
    };
    state.session.sign_in(identity.clone());
    identity
}

fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Noura".to_string(),
        phone: "+966533333333".to_string(),
        line1: "Prince Sultan Rd".to_string(),
        line2: None,
        city: "Jeddah".to_string(),
        location: None,
    }
}

fn product_p() -> ProductSnapshot {
    ProductSnapshot {
        id: "P".to_string(),
        name: LocalizedText::new("Saffron", "زعفران"),
        image_url: None,
    }
}

fn scenario_a_order() -> NewOrder {
    NewOrder {
        items: vec![OrderItem {
            product: product_p(),
            quantity: 2,
            price: 9.99,
        }],
        total: 19.98,
        address: address(),
        payment_method: PaymentMethod::Cash,
    }
}

fn order_body() -> Value {
    json!({
        "items": [{
            "product": { "id": "P", "name": { "en": "Saffron", "ar": "زعفران" } },
            "quantity": 2,
            "price": 9.99
        }],
        "total": 19.98,
        "address": {
            "name": "Noura",
            "phone": "+966533333333",
            "line1": "Prince Sultan Rd",
            "city": "Jeddah",
            "location": { "lat": 21.54, "lng": 39.17 }
        },
        "paymentMethod": "apple_pay"
    })
}

async fn seed_push_token(backend: &dyn RecordStore, user_id: &str, token: &str) {
    backend
        .create(USERS, json!({ "pushToken": token }), Some(user_id))
        .await
        .unwrap();
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..50 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
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

// ---------------------------------------------------------------------------
// Engine scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_a_new_order_is_pending_with_single_history_entry() {
    let (_app, state) = setup();
    sign_in(&state, "u1");

    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.status_history.len(), 1);
    assert_eq!(order.status_history[0].status, OrderStatus::Pending);
    assert!(!order.order_number.is_empty());
    assert!(!order.tracking_number.is_empty());
    assert_eq!(order.total, 19.98);
    assert_eq!(state.engine.get_user_orders("u1")[0].id, order.id);
}

#[tokio::test]
async fn scenario_b_shipped_then_delivered_appends_history() {
    let (_app, state) = setup();
    sign_in(&state, "u1");
    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    state
        .engine
        .update_order_status(&order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    let delivered = state
        .engine
        .update_order_status(&order.id, OrderStatus::Delivered)
        .await
        .unwrap()
        .unwrap();

    let statuses: Vec<_> = delivered.status_history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![OrderStatus::Pending, OrderStatus::Shipped, OrderStatus::Delivered]
    );
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.order_number, order.order_number);
    assert_eq!(delivered.tracking_number, order.tracking_number);
    assert!(delivered.updated_at >= order.updated_at);
}

#[tokio::test]
async fn scenario_c_failing_transport_does_not_affect_transition() {
    let backend = Arc::new(MemoryRecordStore::new());
    seed_push_token(backend.as_ref(), "u1", "tok-u1").await;
    let state = state_with(backend.clone(), Arc::new(FailingTransport), Config::default());
    sign_in(&state, "u1");

    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();
    let updated = state
        .engine
        .update_order_status(&order.id, OrderStatus::Processing)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Processing);

    let persisted = backend.get(ORDERS, &order.id).await.unwrap().unwrap();
    assert_eq!(persisted["status"], "processing");
    assert_eq!(
        state.engine.get_order_by_id(&order.id).unwrap().status,
        OrderStatus::Processing
    );

    let failures = state.metrics.notifications_total.with_label_values(&["error"]);
    assert!(eventually(|| failures.get() == 2).await);
}

#[tokio::test]
async fn panicking_transport_leaves_later_notifications_and_transitions_intact() {
    let backend = Arc::new(MemoryRecordStore::new());
    seed_push_token(backend.as_ref(), "u1", "tok-u1").await;
    let state = state_with(backend, Arc::new(PanickingTransport), Config::default());
    sign_in(&state, "u1");

    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let updated = state
        .engine
        .update_order_status(&order.id, OrderStatus::Cancelled)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn scenario_d_unknown_order_is_distinguishable_and_harmless() {
    let (_app, state) = setup();
    sign_in(&state, "u1");
    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    let result = state
        .engine
        .update_order_status("does-not-exist", OrderStatus::Shipped)
        .await
        .unwrap();
    assert!(result.is_none());

    assert_eq!(state.engine.get_order_by_id(&order.id).unwrap(), order);
    assert_eq!(state.engine.get_user_orders("u1").len(), 1);
}

#[tokio::test]
async fn repeated_status_is_not_idempotent() {
    let (_app, state) = setup();
    sign_in(&state, "u1");
    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    for _ in 0..2 {
        state
            .engine
            .update_order_status(&order.id, OrderStatus::Processing)
            .await
            .unwrap();
    }

    let cached = state.engine.get_order_by_id(&order.id).unwrap();
    assert_eq!(cached.status_history.len(), 3);
    assert_eq!(cached.status_history[1].status, OrderStatus::Processing);
    assert_eq!(cached.status_history[2].status, OrderStatus::Processing);
}

#[tokio::test]
async fn permissive_policy_allows_reopening_terminal_orders() {
    let (_app, state) = setup();
    sign_in(&state, "u1");
    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    state
        .engine
        .update_order_status(&order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    let reopened = state
        .engine
        .update_order_status(&order.id, OrderStatus::Processing)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reopened.status, OrderStatus::Processing);
    assert_eq!(reopened.status_history.len(), 3);
}

#[tokio::test]
async fn cache_matches_persisted_record_after_each_mutation() {
    let backend = Arc::new(MemoryRecordStore::new());
    let state = state_with(
        backend.clone(),
        Arc::new(RecordingTransport::default()),
        Config::default(),
    );
    sign_in(&state, "u1");
    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    for status in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::OutForDelivery] {
        state
            .engine
            .update_order_status(&order.id, status)
            .await
            .unwrap();

        let persisted = backend.get(ORDERS, &order.id).await.unwrap().unwrap();
        let cached = serde_json::to_value(state.engine.get_order_by_id(&order.id).unwrap()).unwrap();
        assert_eq!(cached["status"], persisted["status"]);
        assert_eq!(cached["statusHistory"], persisted["statusHistory"]);
        assert_eq!(cached["updatedAt"], persisted["updatedAt"]);
    }
}

#[tokio::test]
async fn persistence_failure_on_create_leaves_no_trace() {
    let backend = Arc::new(FlakyStore::default());
    seed_push_token(backend.as_ref(), "u1", "tok-u1").await;
    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(backend.clone(), transport.clone(), Config::default());
    sign_in(&state, "u1");

    backend.fail_writes(true);
    let result = state.engine.create_order("u1", scenario_a_order()).await;

    assert!(matches!(
        result,
        Err(AppError::Storage(StoreError::Unavailable(_)))
    ));
    assert!(state.engine.get_user_orders("u1").is_empty());
    assert!(backend.query_by_owner(ORDERS, "u1").await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(transport.titles().is_empty());
}

#[tokio::test]
async fn persistence_failure_on_update_keeps_cached_state() {
    let backend = Arc::new(FlakyStore::default());
    let state = state_with(
        backend.clone(),
        Arc::new(RecordingTransport::default()),
        Config::default(),
    );
    sign_in(&state, "u1");
    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    backend.fail_writes(true);
    let result = state
        .engine
        .update_order_status(&order.id, OrderStatus::Shipped)
        .await;
    assert!(matches!(result, Err(AppError::Storage(_))));

    let cached = state.engine.get_order_by_id(&order.id).unwrap();
    assert_eq!(cached, order);
}

#[tokio::test]
async fn order_and_tracking_numbers_are_unique_within_a_run() {
    let (_app, state) = setup();
    sign_in(&state, "u1");

    let mut order_numbers = HashSet::new();
    let mut tracking_numbers = HashSet::new();
    for _ in 0..25 {
        let order = state
            .engine
            .create_order("u1", scenario_a_order())
            .await
            .unwrap();
        assert!(order_numbers.insert(order.order_number));
        assert!(tracking_numbers.insert(order.tracking_number));
    }
}

#[tokio::test]
async fn reload_after_sign_out_reproduces_items_address_and_history() {
    let (_app, state) = setup();
    let identity = sign_in(&state, "u1");
    let first = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();
    let second = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();
    state
        .engine
        .update_order_status(&first.id, OrderStatus::Shipped)
        .await
        .unwrap();
    let before = state.engine.get_order_by_id(&first.id).unwrap();

    state.session.sign_out();
    state.engine.on_identity_changed(None).await.unwrap();
    assert!(state.engine.get_user_orders("u1").is_empty());

    state.session.sign_in(identity.clone());
    state.engine.on_identity_changed(Some(&identity)).await.unwrap();

    let after = state.engine.get_order_by_id(&first.id).unwrap();
    assert_eq!(after.items, before.items);
    assert_eq!(after.address, before.address);
    assert_eq!(after.status_history, before.status_history);

    let ids: Vec<_> = state
        .engine
        .get_user_orders("u1")
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn owner_is_notified_on_creation_and_every_transition() {
    let backend = Arc::new(MemoryRecordStore::new());
    seed_push_token(backend.as_ref(), "u1", "tok-u1").await;
    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(backend, transport.clone(), Config::default());
    sign_in(&state, "u1");

    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();
    assert!(eventually(|| transport.titles().len() == 1).await);

    state
        .engine
        .update_order_status(&order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert!(eventually(|| transport.titles().len() == 2).await);

    let titles = transport.titles();
    assert_eq!(titles[0], "🛍️ Order placed");
    assert_eq!(titles[1], "🚚 Order shipped");

    let sent = transport.sent.lock().unwrap();
    assert!(sent.iter().all(|(token, _, _)| token == "tok-u1"));
    assert_eq!(sent[1].2["orderId"], order.id.as_str());
    assert_eq!(sent[1].2["status"], "shipped");
}

#[tokio::test]
async fn web_platform_never_calls_transport() {
    let backend = Arc::new(MemoryRecordStore::new());
    seed_push_token(backend.as_ref(), "u1", "tok-u1").await;
    let transport = Arc::new(RecordingTransport::default());
    let config = Config {
        platform: "web".parse().unwrap(),
        ..Config::default()
    };
    let state = state_with(backend, transport.clone(), config);
    sign_in(&state, "u1");

    state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    let skipped = state
        .metrics
        .notifications_total
        .with_label_values(&["skipped_platform"]);
    assert!(eventually(|| skipped.get() == 1).await);
    assert!(transport.titles().is_empty());
}

#[tokio::test]
async fn strict_policy_is_opt_in_via_config() {
    let config = Config {
        transition_policy: TransitionPolicy::Strict,
        ..Config::default()
    };
    let state = state_with(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(RecordingTransport::default()),
        config,
    );
    sign_in(&state, "u1");
    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    let result = state
        .engine
        .update_order_status(&order.id, OrderStatus::Shipped)
        .await;
    assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
}

// ---------------------------------------------------------------------------
// HTTP surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["signedIn"], false);
    assert_eq!(body["orders"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
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
    assert!(body.contains("cached_orders"));
}

#[tokio::test]
async fn create_order_requires_sign_in() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("signed in"));
}

#[tokio::test]
async fn sign_in_create_and_list_orders() {
    let (app, _state) = setup();

    let res = app
        .clone()
        .oneshot(json_request("POST", "/session", json!({ "userId": "u1" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["orders"], 0);

    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let order = body_json(res).await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["paymentStatus"], "pending");
    assert_eq!(order["paymentMethod"], "apple_pay");
    assert_eq!(order["userId"], "u1");
    assert_eq!(order["statusHistory"].as_array().unwrap().len(), 1);
    assert_eq!(order["statusHistory"][0]["status"], "pending");
    assert!(order["statusHistory"][0]["description"]["ar"].is_string());
    assert_eq!(order["address"]["location"]["lat"], 21.54);
    assert!(order["orderNumber"].as_str().unwrap().starts_with("ORD-"));

    let res = app.oneshot(get_request("/orders")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let orders = body_json(res).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["id"], order["id"]);
}

#[tokio::test]
async fn create_order_with_no_items_returns_400() {
    let (app, state) = setup();
    sign_in(&state, "u1");

    let mut body = order_body();
    body["items"] = json!([]);
    let response = app
        .oneshot(json_request("POST", "/orders", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_status_over_http() {
    let (app, state) = setup();
    sign_in(&state, "u1");
    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/orders/{}/status", order.id),
            json!({ "status": "out_for_delivery" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "out_for_delivery");
    assert_eq!(body["statusHistory"].as_array().unwrap().len(), 2);

    let res = app
        .oneshot(get_request(&format!("/orders/{}", order.id)))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "out_for_delivery");
}

#[tokio::test]
async fn update_status_of_unknown_order_returns_404() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "PATCH",
            "/orders/missing/status",
            json!({ "status": "shipped" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_status_with_unknown_status_is_rejected() {
    let (app, state) = setup();
    sign_in(&state, "u1");
    let order = state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/orders/{}/status", order.id),
            json!({ "status": "returned" }),
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(state.engine.get_order_by_id(&order.id).unwrap(), order);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let (app, _state) = setup();
    let response = app
        .oneshot(get_request("/orders/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sign_out_clears_orders() {
    let (app, state) = setup();
    sign_in(&state, "u1");
    state
        .engine
        .create_order("u1", scenario_a_order())
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app.oneshot(get_request("/health")).await.unwrap();
    let body = body_json(res).await;
    assert_eq!(body["signedIn"], false);
    assert_eq!(body["orders"], 0);
}

#[tokio::test]
async fn store_outage_surfaces_as_503() {
    let backend = Arc::new(FlakyStore::default());
    let state = state_with(
        backend.clone(),
        Arc::new(RecordingTransport::default()),
        Config::default(),
    );
    let app = router(state.clone());
    sign_in(&state, "u1");
    backend.fail_writes(true);

    let response = app
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn failed_sign_in_does_not_expose_previous_users_orders() {
    let backend = Arc::new(FlakyStore::default());
    let state = state_with(
        backend.clone(),
        Arc::new(RecordingTransport::default()),
        Config::default(),
    );
    let app = router(state.clone());

    let res = app
        .clone()
        .oneshot(json_request("POST", "/session", json!({ "userId": "alice" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();
    let alice_order = body_json(res).await["id"].as_str().unwrap().to_string();

    backend.fail_queries(true);
    let res = app
        .clone()
        .oneshot(json_request("POST", "/session", json!({ "userId": "bob" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert!(state.session.current().is_none());
    assert!(state.engine.get_order_by_id(&alice_order).is_none());

    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{alice_order}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .oneshot(json_request(
            "PATCH",
            &format!("/orders/{alice_order}/status"),
            json!({ "status": "cancelled" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let persisted = backend.get(ORDERS, &alice_order).await.unwrap().unwrap();
    assert_eq!(persisted["status"], "pending");
}

#[tokio::test]
async fn oversized_delivery_offset_is_a_config_error_not_a_crash() {
    let config = Config {
        estimated_delivery_days: i64::MAX,
        ..Config::default()
    };
    let state = state_with(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(RecordingTransport::default()),
        config,
    );
    let app = router(state.clone());
    sign_in(&state, "u1");

    let response = app
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(state.engine.get_user_orders("u1").is_empty());
}
