//! Integration tests for the OAuth start and callback endpoints.

mod common;

use axum::http::StatusCode;
use boutique_api::pos::ConnectionManager;
use boutique_core::audit::event_types;
use boutique_core::oauth_state::OAuthState;
use boutique_core::provider::PosProvider;
use boutique_db::repositories::{AuditEventRepo, PosConnectionRepo};
use common::{body_json, get, location};
use sqlx::PgPool;

const STORE: &str = "store_demo123456";

/// Callback URI with properly form-encoded query parameters.
fn callback_uri(provider: &str, params: &[(&str, &str)]) -> String {
    let url = reqwest::Url::parse_with_params(
        &format!("http://localhost/api/v1/pos/oauth/{provider}/callback"),
        params,
    )
    .unwrap();
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}

fn query_value(url: &str, key: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

// ---------------------------------------------------------------------------
// Test: callback exchanges the code and stores an encrypted connection
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn square_callback_creates_active_connection(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let store = common::create_store(&pool, STORE).await;

    let state = OAuthState::new(STORE, PosProvider::Square).encode();
    let uri = callback_uri("square", &[("code", "abc"), ("state", state.as_str())]);
    let response = get(app.router(), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let connection = &json["data"]["connection"];
    assert_eq!(connection["provider"], "SQUARE");
    assert_eq!(connection["merchantId"], common::MERCHANT_ID);
    assert_eq!(connection["isActive"], true);
    assert_eq!(connection["hasAccessToken"], true);
    assert!(connection["locationId"].is_null());
    assert_eq!(connection["metadata"]["businessName"], "Demo Boutique");
    assert_eq!(connection["metadata"]["locations"][0]["id"], common::LOCATION_ID);
    assert_eq!(json["data"]["merchant"]["businessName"], "Demo Boutique");

    let body = json.to_string();
    assert!(!body.contains("access-for-abc"), "token leaked: {body}");
    assert!(!body.contains("refresh-for-abc"), "token leaked: {body}");

    let stored = PosConnectionRepo::find_for_store(&pool, store.id, "SQUARE")
        .await
        .unwrap()
        .expect("connection row");
    assert!(stored.is_active);
    assert_ne!(stored.access_token_encrypted, "access-for-abc");
    assert_ne!(
        stored.refresh_token_encrypted.as_deref(),
        Some("refresh-for-abc")
    );

    let token = ConnectionManager::new(&app.state)
        .get_access_token(stored.id)
        .await
        .unwrap();
    assert_eq!(token, "access-for-abc");

    let audit = AuditEventRepo::list_for_store(&pool, store.id).await.unwrap();
    let connected = audit
        .iter()
        .find(|e| e.event_type == event_types::POS_CONNECTED)
        .expect("POS_CONNECTED audit event");
    assert_eq!(connected.payload["provider"], "SQUARE");
    assert_eq!(connected.payload["merchantId"], common::MERCHANT_ID);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reconnecting_replaces_the_existing_connection(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let store = common::create_store(&pool, STORE).await;
    let old = common::connect(&app, &store, PosProvider::Square, Some("LOC_OLD")).await;

    let state = OAuthState::new(STORE, PosProvider::Square).encode();
    let uri = callback_uri("square", &[("code", "second"), ("state", state.as_str())]);
    assert_eq!(get(app.router(), &uri).await.status(), StatusCode::OK);

    let stored = PosConnectionRepo::find_for_store(&pool, store.id, "SQUARE")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, old.id);
    let token = ConnectionManager::new(&app.state)
        .get_access_token(stored.id)
        .await
        .unwrap();
    assert_eq!(token, "access-for-second");
}

// ---------------------------------------------------------------------------
// Test: callback state validation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_state_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let mut state = OAuthState::new(STORE, PosProvider::Square);
    state.timestamp -= 2 * 60 * 60 * 1000;
    let uri = callback_uri("square", &[("code", "abc"), ("state", state.encode().as_str())]);
    let response = get(app.router(), &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "STATE_EXPIRED");

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pos_connections")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn state_with_out_of_range_timestamp_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let mut state = OAuthState::new(STORE, PosProvider::Square);
    state.timestamp = i64::MIN;
    let uri = callback_uri("square", &[("code", "abc"), ("state", state.encode().as_str())]);
    let response = get(app.router(), &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "STATE_EXPIRED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn state_for_another_provider_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let state = OAuthState::new(STORE, PosProvider::Shopify).encode();
    let uri = callback_uri("square", &[("code", "abc"), ("state", state.as_str())]);
    let response = get(app.router(), &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_STATE");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn garbage_state_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);

    let uri = callback_uri("square", &[("code", "abc"), ("state", "not-a-state")]);
    let response = get(app.router(), &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_STATE");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_code_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let state = OAuthState::new(STORE, PosProvider::Square).encode();
    let uri = callback_uri("square", &[("state", state.as_str())]);
    let response = get(app.router(), &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing authorization code");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn denied_consent_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let state = OAuthState::new(STORE, PosProvider::Square).encode();
    let uri = callback_uri(
        "square",
        &[
            ("error", "access_denied"),
            ("error_description", "user_denied"),
            ("state", state.as_str()),
        ],
    );
    let response = get(app.router(), &uri).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_code_exchange_is_sanitized(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let state = OAuthState::new(STORE, PosProvider::Square).encode();
    let uri = callback_uri("square", &[("code", "bad-code"), ("state", state.as_str())]);
    let response = get(app.router(), &uri).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PROVIDER_ERROR");
    assert!(!json.to_string().contains("invalid_grant"));
}

// ---------------------------------------------------------------------------
// Test: return URL handling
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn callback_redirects_to_allowed_return_url(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let return_url = format!("{}/settings/pos?tab=square", common::FRONTEND_ORIGIN);
    let state = OAuthState::new(STORE, PosProvider::Square)
        .with_return_url(Some(return_url.clone()))
        .encode();
    let uri = callback_uri("square", &[("code", "abc"), ("state", state.as_str())]);
    let response = get(app.router(), &uri).await;

    let target = location(&response);
    assert!(target.starts_with(&return_url), "unexpected target {target}");
    assert_eq!(query_value(&target, "tab").as_deref(), Some("square"));
    assert_eq!(query_value(&target, "status").as_deref(), Some("success"));
    assert_eq!(query_value(&target, "provider").as_deref(), Some("SQUARE"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn callback_failure_still_redirects_with_error_status(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let return_url = format!("{}/settings/pos", common::FRONTEND_ORIGIN);
    let state = OAuthState::new(STORE, PosProvider::Square)
        .with_return_url(Some(return_url))
        .encode();
    let uri = callback_uri("square", &[("code", "bad-code"), ("state", state.as_str())]);
    let response = get(app.router(), &uri).await;

    let target = location(&response);
    assert_eq!(query_value(&target, "status").as_deref(), Some("error"));
    assert_eq!(
        query_value(&target, "message").as_deref(),
        Some("Failed to connect POS account")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn foreign_return_url_in_state_is_ignored(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let state = OAuthState::new(STORE, PosProvider::Square)
        .with_return_url(Some("https://evil.example.com/phish".to_string()))
        .encode();
    let uri = callback_uri("square", &[("code", "abc"), ("state", state.as_str())]);
    let response = get(app.router(), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("location").is_none());
}

// ---------------------------------------------------------------------------
// Test: starting the flow
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_redirects_to_provider_with_state(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let response = get(
        app.router(),
        &format!("/api/v1/pos/oauth/square/start?storePublicId={STORE}"),
    )
    .await;

    let target = location(&response);
    assert!(target.starts_with("https://connect.squareupsandbox.com/oauth2/authorize"));
    assert_eq!(query_value(&target, "client_id").as_deref(), Some("sq0idp-test"));

    let state = OAuthState::decode(&query_value(&target, "state").unwrap()).unwrap();
    assert_eq!(state.store_public_id, STORE);
    assert_eq!(state.provider, PosProvider::Square);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn authorization_url_endpoint_returns_json(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let response = get(
        app.router(),
        &format!(
            "/api/v1/pos/oauth/shopify/url?storePublicId={STORE}&shop=demo-boutique"
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let url = json["data"]["url"].as_str().unwrap();
    assert!(url.starts_with("https://demo-boutique.myshopify.com/admin/oauth/authorize"));
    assert_eq!(
        query_value(url, "redirect_uri").as_deref(),
        Some("http://localhost:3000/api/v1/pos/oauth/shopify/callback")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_rejects_unknown_store_provider_and_return_url(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let unknown_store = get(
        app.router(),
        "/api/v1/pos/oauth/square/start?storePublicId=store_missing0000",
    )
    .await;
    assert_eq!(unknown_store.status(), StatusCode::NOT_FOUND);

    let unknown_provider = get(
        app.router(),
        &format!("/api/v1/pos/oauth/clover/start?storePublicId={STORE}"),
    )
    .await;
    assert_eq!(unknown_provider.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(unknown_provider).await["code"], "UNSUPPORTED_PROVIDER");

    let foreign_return = get(
        app.router(),
        &format!(
            "/api/v1/pos/oauth/square/start?storePublicId={STORE}\
             &returnUrl=https%3A%2F%2Fevil.example.com%2F"
        ),
    )
    .await;
    assert_eq!(foreign_return.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn shopify_start_requires_shop(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    common::create_store(&pool, STORE).await;

    let response = get(
        app.router(),
        &format!("/api/v1/pos/oauth/shopify/start?storePublicId={STORE}"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Shop domain is required for Shopify");
}
