//! OAuth Flow Controller.
//!
//! Starts the authorization-code flow for a store and finishes it on
//! callback: verify the state, exchange the code, look up the merchant and
//! save the connection.

use boutique_core::audit::event_types;
use boutique_core::error::CoreError;
use boutique_core::oauth_state::OAuthState;
use boutique_core::provider::PosProvider;
use boutique_db::models::pos_connection::PosConnection;
use boutique_db::models::store::Store;
use boutique_db::repositories::StoreRepo;
use boutique_pos::adapter::{AuthorizationOptions, MerchantInfo, ProviderOptions};
use chrono::Utc;
use serde_json::json;

use super::audit;
use super::connections::{ConnectionInput, ConnectionManager};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Query parameters a provider sends back to the callback URL.
#[derive(Debug, Default, Clone)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub shop: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// A completed connection.
#[derive(Debug)]
pub struct ConnectedAccount {
    pub connection: PosConnection,
    pub merchant: MerchantInfo,
}

/// Result of a callback plus where to send the merchant afterwards.
#[derive(Debug)]
pub struct CallbackOutcome {
    pub provider: PosProvider,
    /// Validated front-end URL carried in the state, if any.
    pub return_url: Option<reqwest::Url>,
    pub result: AppResult<ConnectedAccount>,
}

pub struct OAuthFlow<'a> {
    state: &'a AppState,
}

impl<'a> OAuthFlow<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Build the provider consent URL for `store_public_id`.
    pub async fn authorization_url(
        &self,
        provider_segment: &str,
        store_public_id: &str,
        shop: Option<String>,
        return_url: Option<String>,
    ) -> AppResult<String> {
        let (_, adapter) = self.state.registry.resolve(provider_segment)?;
        let store = self.find_store(store_public_id).await?;

        if let Some(url) = return_url.as_deref() {
            if self.allowed_return_url(url).is_none() {
                return Err(AppError::BadRequest(
                    "returnUrl must point at an allowed origin".into(),
                ));
            }
        }

        let redirect_uri = self.state.config.oauth_callback_url(provider_segment);
        let url = adapter.authorization_url(
            &store.public_id,
            &redirect_uri,
            &AuthorizationOptions { shop, return_url },
        )?;
        Ok(url)
    }

    /// Finish the flow. Errors are returned inside the outcome so the caller
    /// can still redirect to the return URL when the state carried one.
    pub async fn handle_callback(
        &self,
        provider_segment: &str,
        params: CallbackParams,
    ) -> AppResult<CallbackOutcome> {
        let (provider, _) = self.state.registry.resolve(provider_segment)?;

        // The state is decoded up front so failures can still use its
        // return URL. Verification happens inside `connect`.
        let decoded = params.state.as_deref().map(OAuthState::decode);
        let return_url = match &decoded {
            Some(Ok(state)) if state.provider == provider => state
                .return_url
                .as_deref()
                .and_then(|url| self.allowed_return_url(url)),
            _ => None,
        };

        let result = self.connect(provider, provider_segment, &params, decoded).await;
        if let Err(err) = &result {
            tracing::warn!(provider = %provider, error = %err, "OAuth callback failed");
        }

        Ok(CallbackOutcome {
            provider,
            return_url,
            result,
        })
    }

    async fn connect(
        &self,
        provider: PosProvider,
        provider_segment: &str,
        params: &CallbackParams,
        decoded: Option<Result<OAuthState, boutique_core::oauth_state::StateError>>,
    ) -> AppResult<ConnectedAccount> {
        if let Some(error) = params.error.as_deref() {
            let detail = params.error_description.as_deref().unwrap_or(error);
            return Err(CoreError::Unauthorized(format!(
                "Authorization was not granted: {detail}"
            ))
            .into());
        }

        let Some(decoded) = decoded else {
            return Err(AppError::BadRequest("Missing state".into()));
        };
        let oauth_state = decoded?;
        oauth_state.verify(provider, Utc::now().timestamp_millis())?;

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing authorization code".into()))?;

        let store = self.find_store(&oauth_state.store_public_id).await?;
        let (_, adapter) = self.state.registry.resolve(provider_segment)?;

        let options = ProviderOptions {
            shop: oauth_state.shop_domain.clone().or_else(|| params.shop.clone()),
        };
        let redirect_uri = self.state.config.oauth_callback_url(provider_segment);

        let tokens = adapter.exchange_code(code, &redirect_uri, &options).await?;
        let merchant = adapter
            .merchant_info(&tokens.access_token, &options)
            .await?;

        let shop_domain = tokens.shop_domain.clone().or(options.shop.clone());
        let access_token = tokens.access_token.clone();
        let connection = ConnectionManager::new(self.state)
            .upsert(ConnectionInput {
                store_id: store.id,
                provider,
                merchant_id: merchant.merchant_id.clone(),
                location_id: None,
                shop_domain: shop_domain.clone(),
                metadata: json!({
                    "businessName": merchant.business_name,
                    "locations": merchant.locations,
                    "grant": tokens.extra,
                }),
                tokens,
            })
            .await?;

        // Best effort: a shop without subscriptions can be fixed by reconnecting.
        let callback_url = self.state.config.webhook_url(provider_segment);
        let webhook_options = ProviderOptions { shop: shop_domain };
        if let Err(e) = adapter
            .register_webhooks(&access_token, &webhook_options, &callback_url)
            .await
        {
            tracing::warn!(provider = %provider, error = %e, "Webhook registration failed");
        }

        tracing::info!(
            store_id = store.id,
            provider = %provider,
            merchant_id = %merchant.merchant_id,
            connection_id = connection.id,
            "POS account connected",
        );
        audit::record(
            &self.state.pool,
            store.id,
            event_types::POS_CONNECTED,
            json!({
                "provider": provider.as_str(),
                "merchantId": merchant.merchant_id,
                "connectionId": connection.id,
            }),
            None,
        )
        .await;

        Ok(ConnectedAccount {
            connection,
            merchant,
        })
    }

    async fn find_store(&self, public_id: &str) -> AppResult<Store> {
        StoreRepo::find_by_public_id(&self.state.pool, public_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Store", public_id).into())
    }

    /// Parse `raw` and accept it only when its origin is one of the
    /// configured front-end origins or this server's own base URL.
    fn allowed_return_url(&self, raw: &str) -> Option<reqwest::Url> {
        let url = reqwest::Url::parse(raw).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let origin = url.origin().ascii_serialization();
        let config = &self.state.config;
        let allowed = config
            .cors_origins
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(config.app_base_url.as_str()))
            .any(|o| o.trim_end_matches('/') == origin);
        allowed.then_some(url)
    }
}

/// Append the outcome of a callback to the merchant's return URL.
pub fn redirect_target(
    mut return_url: reqwest::Url,
    provider: PosProvider,
    result: &AppResult<ConnectedAccount>,
) -> String {
    {
        let mut query = return_url.query_pairs_mut();
        match result {
            Ok(_) => {
                query
                    .append_pair("status", "success")
                    .append_pair("provider", provider.as_str());
            }
            Err(_) => {
                query
                    .append_pair("status", "error")
                    .append_pair("provider", provider.as_str())
                    .append_pair("message", "Failed to connect POS account");
            }
        }
    }
    return_url.into()
}
