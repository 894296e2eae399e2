//! Integration tests for connection management endpoints and token reads.

mod common;

use axum::http::StatusCode;
use boutique_api::pos::connections::ConnectionInput;
use boutique_api::pos::ConnectionManager;
use boutique_core::audit::event_types;
use boutique_core::provider::PosProvider;
use boutique_db::repositories::{AuditEventRepo, PosConnectionRepo};
use boutique_pos::adapter::OAuthTokens;
use chrono::{Duration, Utc};
use common::{body_json, delete, get, patch_json};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Test: GET /pos/providers
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn providers_lists_registered_adapters(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app.router(), "/api/v1/pos/providers").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"], json!(["SQUARE", "SHOPIFY", "LIGHTSPEED"]));
}

// ---------------------------------------------------------------------------
// Test: listing never exposes tokens
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_connections_hides_tokens(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let store = common::create_store(&pool, "store_demo123456").await;
    common::connect(&app, &store, PosProvider::Square, None).await;
    common::connect(&app, &store, PosProvider::Lightspeed, None).await;

    let response = get(app.router(), "/api/v1/pos/connections/store_demo123456").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = json["data"].as_array().expect("data should be an array");
    assert_eq!(data.len(), 2);
    for conn in data {
        assert_eq!(conn["hasAccessToken"], true);
        assert!(conn.get("accessTokenEncrypted").is_none());
        assert!(conn.get("access_token_encrypted").is_none());
    }
    let body = json.to_string();
    assert!(!body.contains("seed-access"));
    assert!(!body.contains("seed-refresh"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_connections_for_unknown_store_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app.router(), "/api/v1/pos/connections/store_missing0000").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: DELETE deactivates and audits
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn disconnect_deactivates_connection(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let store = common::create_store(&pool, "store_demo123456").await;
    let conn = common::connect(&app, &store, PosProvider::Square, None).await;

    let response = delete(
        app.router(),
        "/api/v1/pos/connections/store_demo123456/square",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let stored = PosConnectionRepo::find_by_id(&pool, conn.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_active);

    let listed = body_json(get(app.router(), "/api/v1/pos/connections/store_demo123456").await).await;
    assert_eq!(listed["data"], json!([]));

    // Inactive connections no longer yield tokens.
    let err = ConnectionManager::new(&app.state)
        .get_access_token(conn.id)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");

    let audit = AuditEventRepo::list_for_store(&pool, store.id).await.unwrap();
    assert!(audit
        .iter()
        .any(|e| e.event_type == event_types::POS_DISCONNECTED));

    let again = delete(
        app.router(),
        "/api/v1/pos/connections/store_demo123456/square",
    )
    .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: PATCH pins a location
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn set_location_pins_connection(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let store = common::create_store(&pool, "store_demo123456").await;
    common::connect(&app, &store, PosProvider::Square, None).await;

    let response = patch_json(
        app.router(),
        "/api/v1/pos/connections/store_demo123456/square/location",
        json!({ "locationId": "LOC_9" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["locationId"], "LOC_9");

    let found = PosConnectionRepo::find_active_by_location(&pool, "SQUARE", "LOC_9")
        .await
        .unwrap();
    assert_eq!(found.map(|c| c.store_id), Some(store.id));

    let audit = AuditEventRepo::list_for_store(&pool, store.id).await.unwrap();
    let pinned = audit
        .iter()
        .find(|e| e.event_type == event_types::POS_LOCATION_SET)
        .expect("POS_LOCATION_SET audit event");
    assert_eq!(pinned.payload["locationId"], "LOC_9");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn set_location_rejects_blank_and_missing_connection(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let store = common::create_store(&pool, "store_demo123456").await;
    common::connect(&app, &store, PosProvider::Square, None).await;

    let blank = patch_json(
        app.router(),
        "/api/v1/pos/connections/store_demo123456/square/location",
        json!({ "locationId": "  " }),
    )
    .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(blank).await["code"], "VALIDATION_ERROR");

    let missing = patch_json(
        app.router(),
        "/api/v1/pos/connections/store_demo123456/shopify/location",
        json!({ "locationId": "LOC_9" }),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: tokens close to expiry are refreshed on read
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn expiring_token_is_refreshed_and_refresh_token_kept(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let store = common::create_store(&pool, "store_demo123456").await;
    let manager = ConnectionManager::new(&app.state);

    let conn = manager
        .upsert(ConnectionInput {
            store_id: store.id,
            provider: PosProvider::Square,
            merchant_id: common::MERCHANT_ID.to_string(),
            location_id: None,
            shop_domain: None,
            tokens: OAuthTokens {
                access_token: "old-access".to_string(),
                refresh_token: Some("keep-me".to_string()),
                expires_at: Some(Utc::now() + Duration::hours(2)),
                ..Default::default()
            },
            metadata: json!({}),
        })
        .await
        .unwrap();

    let token = manager.get_access_token(conn.id).await.unwrap();
    assert_eq!(token, "refreshed-from-keep-me");
    assert_eq!(app.stub(PosProvider::Square).refresh_calls(), 1);

    let stored = PosConnectionRepo::find_by_id(&pool, conn.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.token_expires_at.unwrap() > Utc::now() + Duration::days(29));
    let refresh = app
        .state
        .vault
        .decrypt(stored.refresh_token_encrypted.as_deref().unwrap())
        .unwrap();
    assert_eq!(refresh, "keep-me");

    // Fresh now, so the second read does not refresh again.
    let again = manager.get_access_token(conn.id).await.unwrap();
    assert_eq!(again, "refreshed-from-keep-me");
    assert_eq!(app.stub(PosProvider::Square).refresh_calls(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn tampered_ciphertext_is_an_error_not_a_missing_token(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let store = common::create_store(&pool, "store_demo123456").await;
    let conn = common::connect(&app, &store, PosProvider::Square, None).await;

    sqlx::query("UPDATE pos_connections SET access_token_encrypted = 'AAAA' WHERE id = $1")
        .bind(conn.id)
        .execute(&pool)
        .await
        .unwrap();

    let result = ConnectionManager::new(&app.state)
        .get_access_token(conn.id)
        .await;
    assert!(result.is_err());
}
