//! End-to-end tests for the order desk.
//!
//! Everything runs in process against [`MemoryStore`] and scripted push
//! channels; no database or provider credentials are needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p orderdesk-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `order_lifecycle` - Transitions, edits, totals, history, concurrency
//! - `event_bus` - Subscription timing and publish-after-commit
//! - `push_dispatch` - Locale grouping and destination pruning
//! - `http_api` - Routes driven through the full router

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::post,
};
use tower::ServiceExt;
use tower_sessions::Session;

use orderdesk_core::{CatalogItemId, Locale, Money, StaffId, StaffRole};
use orderdesk_server::config::OrderdeskConfig;
use orderdesk_server::db::MemoryStore;
use orderdesk_server::events::EventBus;
use orderdesk_server::middleware::{create_session_layer, set_current_staff};
use orderdesk_server::models::{Actor, CurrentStaff};
use orderdesk_server::routes;
use orderdesk_server::services::push::Destination;
use orderdesk_server::services::{
    CheckoutItem, CheckoutRequest, DeliveryOutcome, OrderLifecycle, PushChannel, PushError,
    PushPayload, StreamRegistry,
};
use orderdesk_server::state::AppState;

/// A wired-up order desk on the in-memory store.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub bus: EventBus,
    pub lifecycle: OrderLifecycle,
    pub streams: StreamRegistry,
    pub config: OrderdeskConfig,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let config = OrderdeskConfig::for_local("http://127.0.0.1:3002", locale("ro"));
        let store = Arc::new(MemoryStore::new());
        let bus = EventBus::new();
        let lifecycle = OrderLifecycle::new(store.clone(), store.clone(), bus.clone());
        let streams =
            StreamRegistry::new(bus.clone(), config.stream.keepalive, config.stream.buffer);

        Self {
            store,
            bus,
            lifecycle,
            streams,
            config,
        }
    }

    #[must_use]
    pub fn state(&self) -> AppState {
        AppState::new(
            self.config.clone(),
            self.lifecycle.clone(),
            self.streams.clone(),
            self.store.clone(),
            None,
        )
    }

    /// The full router plus `POST /test/login`, which stores the posted
    /// staff member in the session the way the account service does.
    #[must_use]
    pub fn router(&self) -> Router {
        let layer = create_session_layer(tower_sessions::MemoryStore::default(), &self.config);

        routes::build_router(self.state(), layer.clone()).merge(
            Router::new()
                .route("/test/login", post(test_login))
                .layer(layer),
        )
    }

    /// Add a catalog item priced in whole units.
    pub fn catalog_item(&self, name: &str, price: i64) -> CatalogItemId {
        self.store
            .add_catalog_item(name, Money::from_minor(price * 100), true)
    }

    /// Checkout request for `items` (catalog id, quantity).
    #[must_use]
    pub fn checkout_request(items: &[(CatalogItemId, i64)]) -> CheckoutRequest {
        CheckoutRequest {
            customer_name: "Ion Popescu".to_string(),
            customer_phone: "+373 69 123 456".to_string(),
            email: None,
            address: Some("str. Ştefan cel Mare 1, Chişinău".to_string()),
            comment: None,
            delivery_type: None,
            payment_method: None,
            items: items
                .iter()
                .map(|&(id, quantity)| CheckoutItem {
                    id,
                    quantity: Some(quantity),
                })
                .collect(),
        }
    }
}

async fn test_login(session: Session, Json(staff): Json<CurrentStaff>) -> StatusCode {
    match set_current_staff(&session, &staff).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Parse a locale known to be valid.
#[must_use]
pub fn locale(tag: &str) -> Locale {
    Locale::parse(tag).expect("valid locale")
}

/// An operator who may run the order desk.
#[must_use]
pub fn operator(id: i64, name: &str) -> CurrentStaff {
    CurrentStaff {
        id: StaffId::new(id),
        name: name.to_string(),
        role: StaffRole::Staff,
    }
}

/// History actor for `operator(id, name)`.
#[must_use]
pub fn actor(id: i64, name: &str) -> Actor {
    operator(id, name).actor()
}

/// Send one request through `app` and decode the JSON body (`Null` when the
/// body is empty or not JSON).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// JSON request with an optional session cookie.
#[must_use]
pub fn json_request(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: &serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// GET request with an optional session cookie.
#[must_use]
pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("valid request")
}

/// Log `staff` in and return the session cookie (`name=value`).
pub async fn login(app: &Router, staff: &CurrentStaff) -> String {
    let body = serde_json::to_value(staff).expect("serializable staff");
    let response = app
        .clone()
        .oneshot(json_request("POST", "/test/login", None, &body))
        .await
        .expect("router is infallible");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie set")
        .to_str()
        .expect("ascii cookie");
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

/// One recorded `send_batch` call.
#[derive(Debug, Clone)]
pub struct SentBatch {
    pub identities: Vec<String>,
    pub title: String,
}

/// Push channel with scripted per-destination outcomes. Unscripted
/// destinations are delivered.
pub struct FakeChannel {
    max_batch: usize,
    outcomes: Mutex<HashMap<String, DeliveryOutcome>>,
    calls: Mutex<Vec<SentBatch>>,
}

impl FakeChannel {
    #[must_use]
    pub fn new(max_batch: usize) -> Arc<Self> {
        Arc::new(Self {
            max_batch,
            outcomes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Report `outcome` for `identity` from now on.
    pub fn script(&self, identity: &str, outcome: DeliveryOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.to_string(), outcome);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<SentBatch> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `identity` was part of a batch.
    #[must_use]
    pub fn attempts(&self, identity: &str) -> usize {
        self.calls()
            .iter()
            .filter(|batch| batch.identities.iter().any(|i| i == identity))
            .count()
    }
}

#[async_trait]
impl<D: Destination> PushChannel<D> for FakeChannel {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn max_batch(&self) -> usize {
        self.max_batch
    }

    async fn send_batch(
        &self,
        batch: &[D],
        payload: &PushPayload,
    ) -> Result<Vec<DeliveryOutcome>, PushError> {
        let outcomes = {
            let scripted = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
            batch
                .iter()
                .map(|d| {
                    scripted
                        .get(d.identity())
                        .cloned()
                        .unwrap_or(DeliveryOutcome::Delivered)
                })
                .collect()
        };

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentBatch {
                identities: batch.iter().map(|d| d.identity().to_string()).collect(),
                title: payload.title.clone(),
            });

        Ok(outcomes)
    }
}
