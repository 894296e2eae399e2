pub mod health;
pub mod pos;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /pos/providers                                     list configured providers
///
/// /pos/oauth/{provider}/start                        redirect to provider consent (GET)
/// /pos/oauth/{provider}/url                          consent URL as JSON (GET)
/// /pos/oauth/{provider}/callback                     provider redirect target (GET)
///
/// /pos/webhook/{provider}                            signed provider deliveries (POST)
///
/// /pos/connections/{store_public_id}                 list active connections
/// /pos/connections/{store_public_id}/{provider}      disconnect (DELETE)
/// /pos/connections/{store_public_id}/{provider}/location
///                                                    pin location (PATCH)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/pos", pos::router())
}
