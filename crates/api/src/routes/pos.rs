//! Route definitions for POS integrations, mounted at `/pos`.

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::handlers::pos;
use crate::state::AppState;

/// ```text
/// GET    /providers                                       -> list_providers
/// GET    /oauth/{provider}/start                          -> oauth_start
/// GET    /oauth/{provider}/url                            -> oauth_url
/// GET    /oauth/{provider}/callback                       -> oauth_callback
/// POST   /webhook/{provider}                              -> receive_webhook
/// GET    /connections/{store_public_id}                   -> list_connections
/// DELETE /connections/{store_public_id}/{provider}        -> disconnect
/// PATCH  /connections/{store_public_id}/{provider}/location -> set_location
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/providers", get(pos::list_providers))
        .route("/oauth/{provider}/start", get(pos::oauth_start))
        .route("/oauth/{provider}/url", get(pos::oauth_url))
        .route("/oauth/{provider}/callback", get(pos::oauth_callback))
        .route("/webhook/{provider}", post(pos::receive_webhook))
        .route("/connections/{store_public_id}", get(pos::list_connections))
        .route(
            "/connections/{store_public_id}/{provider}",
            delete(pos::disconnect),
        )
        .route(
            "/connections/{store_public_id}/{provider}/location",
            patch(pos::set_location),
        )
}
