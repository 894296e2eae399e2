#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use boutique_api::config::ServerConfig;
use boutique_api::pos::connections::ConnectionInput;
use boutique_api::pos::ConnectionManager;
use boutique_api::router::build_app_router;
use boutique_api::state::AppState;
use boutique_core::crypto::TokenVault;
use boutique_core::normalized::{LineItem, NormalizedOrder, NormalizedTransaction};
use boutique_core::provider::PosProvider;
use boutique_core::signature::{sign_hmac_sha256, SignatureEncoding};
use boutique_core::types::Timestamp;
use boutique_db::models::pos_connection::PosConnection;
use boutique_db::models::store::Store;
use boutique_db::repositories::StoreRepo;
use boutique_pos::adapter::{
    AuthorizationOptions, MerchantInfo, MerchantLocation, OAuthTokens, ProviderOptions,
    WebhookRequest, WebhookValidation,
};
use boutique_pos::config::{
    LightspeedConfig, PosConfig, Secret, ShopifyConfig, SquareConfig, SquareEnvironment,
    DEFAULT_SHOPIFY_API_VERSION,
};
use boutique_pos::lightspeed::LightspeedAdapter;
use boutique_pos::shopify::ShopifyAdapter;
use boutique_pos::square::SquareAdapter;
use boutique_pos::{PosAdapter, PosError, ProviderRegistry};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

pub const APP_BASE_URL: &str = "http://localhost:3000";
pub const FRONTEND_ORIGIN: &str = "http://localhost:5173";
pub const ENCRYPTION_KEY: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub const SQUARE_SIGNATURE_KEY: &str = "square-signature-key";
pub const SHOPIFY_WEBHOOK_SECRET: &str = "shopify-webhook-secret";
pub const LIGHTSPEED_WEBHOOK_SECRET: &str = "lightspeed-webhook-secret";

pub const MERCHANT_ID: &str = "MERCHANT_1";
pub const LOCATION_ID: &str = "LOC_1";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Server configuration with every provider configured and fixed secrets.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![FRONTEND_ORIGIN.to_string()],
        request_timeout_secs: 30,
        app_base_url: APP_BASE_URL.to_string(),
        encryption_key: Secret::new(ENCRYPTION_KEY),
        pos: PosConfig {
            square: Some(SquareConfig {
                app_id: "sq0idp-test".to_string(),
                app_secret: Secret::new("square-app-secret"),
                webhook_signature_key: Secret::new(SQUARE_SIGNATURE_KEY),
                environment: SquareEnvironment::Sandbox,
            }),
            shopify: Some(ShopifyConfig {
                client_id: "shopify-client".to_string(),
                client_secret: Secret::new("shopify-client-secret"),
                webhook_secret: Secret::new(SHOPIFY_WEBHOOK_SECRET),
                api_version: DEFAULT_SHOPIFY_API_VERSION.to_string(),
            }),
            lightspeed: Some(LightspeedConfig {
                client_id: "lightspeed-client".to_string(),
                client_secret: Secret::new("lightspeed-client-secret"),
                webhook_secret: Secret::new(LIGHTSPEED_WEBHOOK_SECRET),
            }),
            ..PosConfig::default()
        },
    }
}

// ---------------------------------------------------------------------------
// Stub adapter
// ---------------------------------------------------------------------------

/// Wraps a real adapter so URL building, signature checks and payload
/// parsing run for real, while every call that would reach the network is
/// answered locally.
pub struct StubAdapter {
    inner: Arc<dyn PosAdapter>,
    /// When set, `get_order` fails with a provider API error.
    pub fail_orders: AtomicBool,
    pub order_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    /// Expiry reported for exchanged tokens.
    pub token_expires_at: Option<Timestamp>,
}

impl StubAdapter {
    pub fn new(inner: Arc<dyn PosAdapter>) -> Self {
        Self {
            inner,
            fail_orders: AtomicBool::new(false),
            order_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            token_expires_at: Some(Utc::now() + Duration::days(30)),
        }
    }

    pub fn set_fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    pub fn order_calls(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PosAdapter for StubAdapter {
    fn provider(&self) -> PosProvider {
        self.inner.provider()
    }

    fn authorization_url(
        &self,
        store_public_id: &str,
        redirect_uri: &str,
        options: &AuthorizationOptions,
    ) -> Result<String, PosError> {
        self.inner
            .authorization_url(store_public_id, redirect_uri, options)
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
        options: &ProviderOptions,
    ) -> Result<OAuthTokens, PosError> {
        if code == "bad-code" {
            return Err(PosError::Api {
                provider: self.provider(),
                status: 400,
                message: "invalid_grant".to_string(),
            });
        }
        Ok(OAuthTokens {
            access_token: format!("access-for-{code}"),
            refresh_token: Some(format!("refresh-for-{code}")),
            expires_at: self.token_expires_at,
            shop_domain: options.shop.clone(),
            extra: json!({ "merchantId": MERCHANT_ID }),
        })
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<OAuthTokens, PosError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(OAuthTokens {
            access_token: format!("refreshed-from-{refresh_token}"),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::days(30)),
            ..Default::default()
        })
    }

    async fn merchant_info(
        &self,
        _access_token: &str,
        _options: &ProviderOptions,
    ) -> Result<MerchantInfo, PosError> {
        Ok(MerchantInfo {
            merchant_id: MERCHANT_ID.to_string(),
            business_name: "Demo Boutique".to_string(),
            locations: vec![MerchantLocation {
                id: LOCATION_ID.to_string(),
                name: "Main Street".to_string(),
            }],
        })
    }

    async fn get_order(
        &self,
        _access_token: &str,
        order_id: &str,
        _options: &ProviderOptions,
    ) -> Result<NormalizedOrder, PosError> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(PosError::Api {
                provider: self.provider(),
                status: 503,
                message: "upstream unavailable, token=abc".to_string(),
            });
        }
        Ok(NormalizedOrder {
            external_order_id: order_id.to_string(),
            provider: self.provider(),
            total_amount: 2599,
            currency: "USD".to_string(),
            line_items: vec![LineItem {
                name: "Silk Scarf".to_string(),
                quantity: 1,
                amount: 2599,
            }],
            created_at: None,
            location_id: Some(LOCATION_ID.to_string()),
            raw_payload: json!({ "order": { "id": order_id } }),
        })
    }

    fn validate_webhook(&self, request: &WebhookRequest<'_>, secret: &str) -> WebhookValidation {
        self.inner.validate_webhook(request, secret)
    }

    fn parse_transaction(&self, payload: &serde_json::Value) -> Option<NormalizedTransaction> {
        self.inner.parse_transaction(payload)
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Application state plus handles on the stub adapters behind it.
pub struct TestApp {
    pub state: AppState,
    stubs: HashMap<PosProvider, Arc<StubAdapter>>,
}

impl TestApp {
    /// A fresh router over the shared state. `oneshot` consumes the router,
    /// so build one per request.
    pub fn router(&self) -> Router {
        build_app_router(self.state.clone(), &self.state.config)
    }

    pub fn stub(&self, provider: PosProvider) -> &StubAdapter {
        &self.stubs[&provider]
    }
}

/// Full application with stubbed adapters for all three providers.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let config = test_config();
    let client = reqwest::Client::new();

    let inner: [Arc<dyn PosAdapter>; 3] = [
        Arc::new(SquareAdapter::new(
            config.pos.square.clone().expect("square configured"),
            client.clone(),
        )),
        Arc::new(ShopifyAdapter::new(
            config.pos.shopify.clone().expect("shopify configured"),
            client.clone(),
        )),
        Arc::new(LightspeedAdapter::new(
            config.pos.lightspeed.clone().expect("lightspeed configured"),
            client,
        )),
    ];

    let mut registry = ProviderRegistry::new();
    let mut stubs = HashMap::new();
    for adapter in inner {
        let stub = Arc::new(StubAdapter::new(adapter));
        stubs.insert(stub.provider(), Arc::clone(&stub));
        registry.register(stub);
    }

    let vault = TokenVault::from_hex_key(ENCRYPTION_KEY).expect("valid test key");
    let state = AppState {
        pool,
        config: Arc::new(config),
        registry: Arc::new(registry),
        vault: Arc::new(vault),
    };
    TestApp { state, stubs }
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

pub async fn create_store(pool: &PgPool, public_id: &str) -> Store {
    StoreRepo::create(pool, public_id, "Demo Boutique")
        .await
        .expect("store insert")
}

/// Connect `store` to `provider` the way a finished OAuth flow would.
pub async fn connect(
    app: &TestApp,
    store: &Store,
    provider: PosProvider,
    location_id: Option<&str>,
) -> PosConnection {
    ConnectionManager::new(&app.state)
        .upsert(ConnectionInput {
            store_id: store.id,
            provider,
            merchant_id: MERCHANT_ID.to_string(),
            location_id: location_id.map(str::to_string),
            shop_domain: None,
            tokens: OAuthTokens {
                access_token: "seed-access".to_string(),
                refresh_token: Some("seed-refresh".to_string()),
                expires_at: Some(Utc::now() + Duration::days(30)),
                ..Default::default()
            },
            metadata: json!({ "businessName": "Demo Boutique" }),
        })
        .await
        .expect("connection upsert")
}

// ---------------------------------------------------------------------------
// Webhook payloads
// ---------------------------------------------------------------------------

/// A Square `payment.updated` event.
pub fn square_payment_event(event_id: &str, order_id: &str, status: &str) -> serde_json::Value {
    json!({
        "merchant_id": MERCHANT_ID,
        "type": "payment.updated",
        "event_id": event_id,
        "created_at": "2026-03-01T12:00:00Z",
        "data": {
            "type": "payment",
            "id": "PAY_1",
            "object": {
                "payment": {
                    "id": "PAY_1",
                    "order_id": order_id,
                    "location_id": LOCATION_ID,
                    "status": status,
                    "amount_money": { "amount": 2599, "currency": "USD" },
                    "created_at": "2026-03-01T12:00:00Z"
                }
            }
        }
    })
}

/// Square signs the notification URL followed by the raw body.
pub fn square_signature(secret: &str, body: &[u8]) -> String {
    let mut message = format!("{APP_BASE_URL}/api/v1/pos/webhook/square").into_bytes();
    message.extend_from_slice(body);
    sign_hmac_sha256(secret.as_bytes(), &message, SignatureEncoding::Base64)
}

/// POST a signed Square delivery.
pub async fn post_square_webhook(app: &TestApp, body: &serde_json::Value) -> Response {
    post_square_webhook_signed_with(app, body, SQUARE_SIGNATURE_KEY).await
}

pub async fn post_square_webhook_signed_with(
    app: &TestApp,
    body: &serde_json::Value,
    secret: &str,
) -> Response {
    let raw = serde_json::to_vec(body).expect("serialize webhook body");
    let signature = square_signature(secret, &raw);
    post_raw(
        app.router(),
        "/api/v1/pos/webhook/square",
        raw,
        &[("x-square-hmacsha256-signature", signature.as_str())],
    )
    .await
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Request::builder().method("GET").uri(uri).body(Body::empty())).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    send(app, Request::builder().method("DELETE").uri(uri).body(Body::empty())).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    json_request(app, "POST", uri, body).await
}

pub async fn patch_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    json_request(app, "PATCH", uri, body).await
}

/// POST exact bytes with extra headers, as providers deliver webhooks.
pub async fn post_raw(app: Router, uri: &str, body: Vec<u8>, headers: &[(&str, &str)]) -> Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::from(body))).await
}

async fn json_request(app: Router, method: &str, uri: &str, body: serde_json::Value) -> Response {
    send(
        app,
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
    )
    .await
}

async fn send(app: Router, request: Result<Request<Body>, axum::http::Error>) -> Response {
    app.oneshot(request.expect("valid request"))
        .await
        .expect("infallible router")
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// The `Location` header of a redirect.
pub fn location(response: &Response) -> String {
    assert_eq!(response.status(), StatusCode::FOUND);
    response
        .headers()
        .get("location")
        .expect("location header")
        .to_str()
        .expect("ascii location")
        .to_string()
}
