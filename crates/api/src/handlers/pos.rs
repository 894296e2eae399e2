//! Handlers for the `/pos` resource: provider listing, the OAuth flow,
//! webhook ingestion and connection management.
//!
//! Handlers stay thin. The work happens in [`crate::pos`].

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use boutique_core::audit::event_types;
use boutique_core::error::CoreError;
use boutique_core::provider::PosProvider;
use boutique_db::models::store::Store;
use boutique_db::repositories::StoreRepo;
use boutique_pos::adapter::MerchantInfo;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::pos::audit;
use crate::pos::connections::ConnectionView;
use crate::pos::oauth::{redirect_target, CallbackParams};
use crate::pos::webhooks::{InboundWebhook, WebhookError};
use crate::pos::{ConnectionManager, OAuthFlow, WebhookProcessor};
use crate::response::{DataResponse, WebhookAck};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeQuery {
    pub store_public_id: String,
    pub shop: Option<String>,
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub shop: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizationUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectedResponse {
    pub connection: ConnectionView,
    pub merchant: MerchantInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLocationRequest {
    pub location_id: String,
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// GET /api/v1/pos/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<DataResponse<Vec<PosProvider>>> {
    Json(DataResponse {
        data: state.registry.list_supported(),
    })
}

// ---------------------------------------------------------------------------
// OAuth
// ---------------------------------------------------------------------------

/// GET /api/v1/pos/oauth/{provider}/start
///
/// Redirect the merchant to the provider's consent screen.
pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<AuthorizeQuery>,
) -> AppResult<Response> {
    let url = OAuthFlow::new(&state)
        .authorization_url(
            &provider,
            &params.store_public_id,
            params.shop,
            params.return_url,
        )
        .await?;
    Ok(found(url))
}

/// GET /api/v1/pos/oauth/{provider}/url
///
/// Same as `start`, but returns the URL for front-ends that navigate
/// themselves.
pub async fn oauth_url(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<AuthorizeQuery>,
) -> AppResult<Json<DataResponse<AuthorizationUrl>>> {
    let url = OAuthFlow::new(&state)
        .authorization_url(
            &provider,
            &params.store_public_id,
            params.shop,
            params.return_url,
        )
        .await?;
    Ok(Json(DataResponse {
        data: AuthorizationUrl { url },
    }))
}

/// GET /api/v1/pos/oauth/{provider}/callback
///
/// Redirects to the return URL from the state when there is one, otherwise
/// answers with JSON.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    let outcome = OAuthFlow::new(&state)
        .handle_callback(
            &provider,
            CallbackParams {
                code: query.code,
                state: query.state,
                shop: query.shop,
                error: query.error,
                error_description: query.error_description,
            },
        )
        .await?;

    if let Some(return_url) = outcome.return_url {
        return Ok(found(redirect_target(
            return_url,
            outcome.provider,
            &outcome.result,
        )));
    }

    let account = outcome.result?;
    Ok(Json(DataResponse {
        data: ConnectedResponse {
            connection: account.connection.into(),
            merchant: account.merchant,
        },
    })
    .into_response())
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// POST /api/v1/pos/webhook/{provider}
///
/// The body is taken as raw bytes because signatures cover the exact bytes
/// the provider sent.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let notification_url = format!("{}{path}", state.config.app_base_url);

    let result = WebhookProcessor::new(&state)
        .process(&InboundWebhook {
            provider: &provider,
            body: &body,
            headers: &headers,
            notification_url: &notification_url,
        })
        .await;

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(WebhookAck::ok(outcome.event_id(), outcome.message())),
        )
            .into_response(),
        Err(WebhookError::InvalidSignature) => (
            StatusCode::UNAUTHORIZED,
            Json(WebhookAck::rejected("Invalid signature")),
        )
            .into_response(),
        Err(WebhookError::MissingEventId) => (
            StatusCode::BAD_REQUEST,
            Json(WebhookAck::rejected("Missing event ID")),
        )
            .into_response(),
        Err(WebhookError::Rejected(err)) => err.into_response(),
        Err(WebhookError::Failed { event_id, .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(WebhookAck {
                ok: false,
                event_id: Some(event_id),
                message: Some("Webhook processing failed".to_string()),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// GET /api/v1/pos/connections/{store_public_id}
pub async fn list_connections(
    State(state): State<AppState>,
    Path(store_public_id): Path<String>,
) -> AppResult<Json<DataResponse<Vec<ConnectionView>>>> {
    let store = find_store(&state, &store_public_id).await?;
    let connections = ConnectionManager::new(&state)
        .list_for_store(store.id)
        .await?;
    Ok(Json(DataResponse {
        data: connections.into_iter().map(ConnectionView::from).collect(),
    }))
}

/// DELETE /api/v1/pos/connections/{store_public_id}/{provider}
pub async fn disconnect(
    State(state): State<AppState>,
    Path((store_public_id, provider)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let provider: PosProvider = provider.parse()?;
    let store = find_store(&state, &store_public_id).await?;

    ConnectionManager::new(&state)
        .disconnect(store.id, provider)
        .await?;

    audit::record(
        &state.pool,
        store.id,
        event_types::POS_DISCONNECTED,
        json!({ "provider": provider.as_str() }),
        None,
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/pos/connections/{store_public_id}/{provider}/location
pub async fn set_location(
    State(state): State<AppState>,
    Path((store_public_id, provider)): Path<(String, String)>,
    Json(input): Json<SetLocationRequest>,
) -> AppResult<Json<DataResponse<ConnectionView>>> {
    let provider: PosProvider = provider.parse()?;
    let store = find_store(&state, &store_public_id).await?;
    let manager = ConnectionManager::new(&state);

    let conn = manager
        .get_for_store(store.id, provider)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| CoreError::not_found("PosConnection", provider))?;
    let updated = manager.set_location_id(conn.id, &input.location_id).await?;

    audit::record(
        &state.pool,
        store.id,
        event_types::POS_LOCATION_SET,
        json!({
            "provider": provider.as_str(),
            "connectionId": updated.id,
            "locationId": updated.location_id,
        }),
        None,
    )
    .await;
    Ok(Json(DataResponse {
        data: updated.into(),
    }))
}

// ── Private helpers ──────────────────────────────────────────────────────

async fn find_store(state: &AppState, public_id: &str) -> AppResult<Store> {
    StoreRepo::find_by_public_id(&state.pool, public_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Store", public_id)))
}

/// 302 to `url`.
fn found(url: String) -> Response {
    (StatusCode::FOUND, [(LOCATION, url)]).into_response()
}
